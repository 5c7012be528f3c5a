//! Chat configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::negotiator::BusyPolicy;
use crate::template::DEFAULT_SYSTEM_PROMPT;
use atom_local_ai::{paths, DEFAULT_MODEL_FILENAME, DEFAULT_PORT};

/// Configuration for the chat bot.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Model file name inside `models_dir`
    pub model_filename: String,
    /// Directory holding model files
    pub models_dir: PathBuf,
    /// System instruction rendered by every template
    pub system_prompt: String,
    /// Existing llama-server to use instead of spawning one
    pub server_url: Option<String>,
    /// llama-server binary (default: the one in the data directory)
    pub server_binary: Option<PathBuf>,
    /// Port for a spawned llama-server
    pub port: u16,
    /// Context window for a spawned llama-server
    pub ctx_size: u32,
    /// Maximum tokens per completion
    pub max_tokens: i32,
    /// Sampling temperature
    pub temperature: f32,
    /// Most messages the primary session keeps for prompt rendering
    pub history_limit: usize,
    /// How long to wait for a spawned server to become healthy
    pub startup_timeout: Duration,
    /// What a busy engine reply does to the negotiation
    pub busy_policy: BusyPolicy,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model_filename: DEFAULT_MODEL_FILENAME.to_string(),
            models_dir: paths::models_dir(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            server_url: None,
            server_binary: None,
            port: DEFAULT_PORT,
            ctx_size: 2048,
            max_tokens: 512,
            temperature: 0.7,
            history_limit: 8,
            startup_timeout: Duration::from_secs(60),
            busy_policy: BusyPolicy::Advance,
        }
    }
}

impl ChatConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let model_filename = std::env::var("ATOM_MODEL").unwrap_or(defaults.model_filename);

        let models_dir = std::env::var("ATOM_MODELS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.models_dir);

        let system_prompt =
            std::env::var("ATOM_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt);

        let server_url = std::env::var("ATOM_SERVER_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let server_binary = std::env::var("ATOM_LLAMA_SERVER").ok().map(PathBuf::from);

        let port = std::env::var("ATOM_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let max_tokens = std::env::var("ATOM_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_tokens);

        let temperature = std::env::var("ATOM_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.temperature);

        let history_limit = std::env::var("ATOM_HISTORY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.history_limit);

        Self {
            model_filename,
            models_dir,
            system_prompt,
            server_url,
            server_binary,
            port,
            max_tokens,
            temperature,
            history_limit,
            ..defaults
        }
    }

    /// Full path of the model file.
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(&self.model_filename)
    }

    /// Create a builder for configuration.
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder::default()
    }
}

/// Builder for chat configuration.
#[derive(Debug, Default)]
pub struct ChatConfigBuilder {
    config: ChatConfig,
}

impl ChatConfigBuilder {
    pub fn model_filename(mut self, filename: impl Into<String>) -> Self {
        self.config.model_filename = filename.into();
        self
    }

    pub fn models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.models_dir = dir.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = Some(url.into());
        self
    }

    pub fn server_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.server_binary = Some(path.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn ctx_size(mut self, ctx_size: u32) -> Self {
        self.config.ctx_size = ctx_size;
        self
    }

    pub fn max_tokens(mut self, tokens: i32) -> Self {
        self.config.max_tokens = tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn history_limit(mut self, max_messages: usize) -> Self {
        self.config.history_limit = max_messages;
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.config.startup_timeout = timeout;
        self
    }

    pub fn busy_policy(mut self, policy: BusyPolicy) -> Self {
        self.config.busy_policy = policy;
        self
    }

    pub fn build(self) -> ChatConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.model_filename, DEFAULT_MODEL_FILENAME);
        assert_eq!(config.system_prompt, "You are a helpful assistant.");
        assert!(config.server_url.is_none());
        assert_eq!(config.busy_policy, BusyPolicy::Advance);
        assert_eq!(config.history_limit, 8);
    }

    #[test]
    fn test_builder() {
        let config = ChatConfig::builder()
            .models_dir("/tmp/models")
            .model_filename("other.gguf")
            .server_url("http://127.0.0.1:8080")
            .max_tokens(64)
            .build();

        assert_eq!(config.model_path(), PathBuf::from("/tmp/models/other.gguf"));
        assert_eq!(config.server_url.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(config.max_tokens, 64);
    }
}
