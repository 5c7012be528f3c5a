//! The inference engine boundary.
//!
//! The chat bot only needs two things from an engine: load a model file under
//! a template, and ask the resulting session for a completion. Everything
//! else about model execution stays behind these traits.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::history::ConversationHistory;
use crate::template::Template;
use atom_local_ai::LocalAIError;

/// Reply a session gives instead of a completion while the engine is
/// occupied by another request.
pub const BUSY_SENTINEL: &str = "LLM is being used";

/// Errors from loading a session.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),
    #[error("failed to load model: {0}")]
    Load(String),
    #[error(transparent)]
    LocalAI(#[from] LocalAIError),
}

/// A model loaded under one template.
#[async_trait]
pub trait Session: Send {
    /// Template this session formats prompts with.
    fn template(&self) -> &Template;

    /// Prior exchanges the session renders before each prompt.
    fn history(&self) -> &ConversationHistory;

    /// The exact text the model would receive for `prompt`.
    fn render(&self, prompt: &str) -> String {
        self.template().render(prompt, self.history())
    }

    /// Complete `prompt`. Never fails: engine trouble surfaces as an empty
    /// string or [`BUSY_SENTINEL`].
    async fn complete(&mut self, prompt: &str) -> String;

    fn history_mut(&mut self) -> &mut ConversationHistory;

    /// Append an accepted exchange, keeping at most `max_messages` messages
    /// so the rendered prompt stays inside the model's context window.
    fn record_exchange(&mut self, user: &str, assistant: &str, max_messages: usize) {
        self.history_mut().push_exchange(user, assistant, max_messages);
    }
}

/// Something that can load sessions from a model file.
#[async_trait]
pub trait ModelEngine: Send + Sync {
    async fn load(&self, model: &Path, template: &Template)
        -> Result<Box<dyn Session>, EngineError>;
}
