//! [`ModelEngine`] backed by a llama.cpp server.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::engine::{EngineError, ModelEngine, Session, BUSY_SENTINEL};
use crate::history::ConversationHistory;
use crate::template::Template;
use atom_local_ai::{CompletionRequest, LlamaCppClient, LlamaCppServer, LocalAIError};

/// Engine talking to one llama-server. All sessions share the server, and
/// only one of them may have a completion in flight at a time.
pub struct LocalEngine {
    client: LlamaCppClient,
    server: Option<LlamaCppServer>,
    in_flight: Arc<Mutex<()>>,
    max_tokens: i32,
    temperature: f32,
}

impl LocalEngine {
    /// Use a llama-server that is already running at `url`.
    pub fn attach(url: impl Into<String>, config: &ChatConfig) -> Self {
        Self {
            client: LlamaCppClient::with_url(url),
            server: None,
            in_flight: Arc::new(Mutex::new(())),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Start a llama-server for the configured model and wait until it
    /// answers health checks.
    pub async fn launch(config: &ChatConfig) -> Result<Self, EngineError> {
        let model = config.model_path();
        if !model.exists() {
            return Err(EngineError::ModelNotFound(model));
        }

        let mut server = LlamaCppServer::new(&model)
            .with_port(config.port)
            .with_ctx_size(config.ctx_size);
        if let Some(binary) = &config.server_binary {
            server = server.with_binary(binary);
        }
        server.start()?;
        server.wait_ready(config.startup_timeout).await?;

        Ok(Self {
            client: server.client(),
            server: Some(server),
            in_flight: Arc::new(Mutex::new(())),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Attach to `config.server_url` when set, otherwise launch a server.
    pub async fn from_config(config: &ChatConfig) -> Result<Self, EngineError> {
        match &config.server_url {
            Some(url) => {
                info!("Using llama-server at {}", url);
                Ok(Self::attach(url.clone(), config))
            }
            None => Self::launch(config).await,
        }
    }

    /// Whether this engine owns the server process.
    pub fn owns_server(&self) -> bool {
        self.server.is_some()
    }
}

#[async_trait]
impl ModelEngine for LocalEngine {
    async fn load(
        &self,
        model: &Path,
        template: &Template,
    ) -> Result<Box<dyn Session>, EngineError> {
        if !model.exists() {
            return Err(EngineError::ModelNotFound(model.to_path_buf()));
        }
        if let Some(server) = &self.server {
            if server.model() != model {
                return Err(EngineError::Load(format!(
                    "server is serving {}, not {}",
                    server.model().display(),
                    model.display()
                )));
            }
        }
        self.client.check_health().await?;

        debug!("Loaded session for template {}", template.name());
        Ok(Box::new(LocalSession {
            client: self.client.clone(),
            template: template.clone(),
            history: ConversationHistory::new(),
            in_flight: Arc::clone(&self.in_flight),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }))
    }
}

/// A template binding over the shared server.
pub struct LocalSession {
    client: LlamaCppClient,
    template: Template,
    history: ConversationHistory,
    in_flight: Arc<Mutex<()>>,
    max_tokens: i32,
    temperature: f32,
}

#[async_trait]
impl Session for LocalSession {
    fn template(&self) -> &Template {
        &self.template
    }

    fn history(&self) -> &ConversationHistory {
        &self.history
    }

    async fn complete(&mut self, prompt: &str) -> String {
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!("Completion already in flight, reporting busy");
            return BUSY_SENTINEL.to_string();
        };

        let request = CompletionRequest::new(self.render(prompt))
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_stop(self.template.stop_sequences().iter().copied());

        match self.client.complete(&request).await {
            Ok(text) => text,
            Err(LocalAIError::Busy(url)) => {
                warn!("llama-server at {} is busy", url);
                BUSY_SENTINEL.to_string()
            }
            Err(e) => {
                warn!("Completion failed under {}: {}", self.template.name(), e);
                String::new()
            }
        }
    }

    fn history_mut(&mut self) -> &mut ConversationHistory {
        &mut self.history
    }
}

impl Drop for LocalSession {
    fn drop(&mut self) {
        debug!("Released session for template {}", self.template.name());
    }
}
