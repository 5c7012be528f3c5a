//! HTTP client for llama-server's native completion API.
//!
//! Prompts are rendered by the caller, so the raw `/completion` endpoint is
//! used rather than the chat endpoint: the server must not apply its own
//! chat template on top of ours.

use serde::{Deserialize, Serialize};

use crate::error::LocalAIError;
use crate::DEFAULT_PORT;

/// Client for communicating with llama-server.
#[derive(Clone)]
pub struct LlamaCppClient {
    client: reqwest::Client,
    base_url: String,
}

/// A raw completion request.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Fully rendered prompt text.
    pub prompt: String,
    /// Maximum number of tokens to predict.
    pub n_predict: i32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Strings that end generation when produced.
    pub stop: Vec<String>,
    stream: bool,
}

impl CompletionRequest {
    /// Create a request with default sampling settings.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            n_predict: 512,
            temperature: 0.7,
            stop: Vec::new(),
            stream: false,
        }
    }

    pub fn with_max_tokens(mut self, n_predict: i32) -> Self {
        self.n_predict = n_predict;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_stop<I, S>(mut self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop = stop.into_iter().map(Into::into).collect();
        self
    }
}

/// Response from the `/completion` endpoint.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
    #[serde(default)]
    #[allow(dead_code)]
    stop: bool,
}

impl LlamaCppClient {
    /// Create a new client with default URL (localhost:11436).
    pub fn new() -> Self {
        Self::with_url(format!("http://127.0.0.1:{}", DEFAULT_PORT))
    }

    /// Create a new client with a custom URL.
    pub fn with_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a new client with a custom port on localhost.
    pub fn with_port(port: u16) -> Self {
        Self::with_url(format!("http://127.0.0.1:{}", port))
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the server is running and healthy.
    pub async fn check_health(&self) -> Result<(), LocalAIError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    LocalAIError::ServerNotRunning(self.base_url.clone())
                } else {
                    LocalAIError::Http(e)
                }
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LocalAIError::ServerNotRunning(self.base_url.clone()))
        }
    }

    /// Send a completion request to the server and return the generated text.
    ///
    /// A `503 Service Unavailable` answer means every server slot is taken
    /// and is reported as [`LocalAIError::Busy`].
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, LocalAIError> {
        let url = format!("{}/completion", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LocalAIError::ServerNotRunning(self.base_url.clone())
                } else {
                    LocalAIError::Http(e)
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(LocalAIError::Busy(self.base_url.clone()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LocalAIError::Api(format!("{}: {}", status, text)));
        }

        let completion: CompletionResponse = response.json().await?;
        Ok(completion.content)
    }
}

impl Default for LlamaCppClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_url() {
        let client = LlamaCppClient::new();
        assert_eq!(client.base_url(), "http://127.0.0.1:11436");
    }

    #[test]
    fn test_custom_url_drops_trailing_slash() {
        let client = LlamaCppClient::with_url("http://192.168.1.100:8080/");
        assert_eq!(client.base_url(), "http://192.168.1.100:8080");
    }

    #[test]
    fn test_custom_port() {
        let client = LlamaCppClient::with_port(9000);
        assert_eq!(client.base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_request_serializes_llama_server_fields() {
        let request = CompletionRequest::new("<|im_start|>user\nHi<|im_end|>\n")
            .with_max_tokens(64)
            .with_temperature(0.2)
            .with_stop(["<|im_end|>"]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["n_predict"], 64);
        assert_eq!(json["stop"][0], "<|im_end|>");
        assert_eq!(json["stream"], false);
        assert!(json["prompt"].as_str().unwrap().contains("Hi"));
    }

    #[test]
    fn test_response_ignores_extra_fields() {
        let body = r#"{"content":" Hello!","stop":true,"tokens_predicted":3}"#;
        let response: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.content, " Hello!");
    }
}
