//! # Atom chat core
//!
//! Turns a user prompt into a displayable reply using a local model whose
//! chat format is not known up front.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │  User prompt │ --> │    Negotiator    │ --> │  Sanitizer   │ --> reply
//! └──────────────┘     │ chatML → llama → │     └──────────────┘
//!                      │      alpaca      │
//!                      └────────┬─────────┘
//!                               │
//!                     ┌─────────┴─────────┐
//!                     │ ModelEngine       │
//!                     │ (llama-server)    │
//!                     └───────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use atom_chat::{ChatBot, ChatConfig, ChatController, LocalEngine};
//! use std::sync::Arc;
//!
//! let config = ChatConfig::from_env();
//! let engine = Arc::new(LocalEngine::from_config(&config).await?);
//! let bot = Arc::new(ChatBot::new(engine, &config).await?);
//! let chat = ChatController::new(bot);
//!
//! let reply = chat.send("Hi").await?;
//! println!("{}", reply.text);
//! ```

mod bot;
mod config;
mod engine;
mod history;
mod local;
mod negotiator;
mod sanitizer;
mod template;

pub use bot::{display_text, ChatBot, ChatController, ChatError, Reply, NO_RESPONSE};
pub use config::{ChatConfig, ChatConfigBuilder};
pub use engine::{EngineError, ModelEngine, Session, BUSY_SENTINEL};
pub use history::{ConversationHistory, Message, Role};
pub use local::{LocalEngine, LocalSession};
pub use negotiator::{
    AttemptOutcome, BusyPolicy, CompletionAttempt, NegotiationReport, Negotiator,
};
pub use sanitizer::{sanitize, DENYLIST};
pub use template::{Template, DEFAULT_SYSTEM_PROMPT};

// Re-export local AI types
pub use atom_local_ai::{
    paths as local_ai_paths, LocalAIError, ModelInfo, ModelManager, DEFAULT_MODEL_FILENAME,
    DEFAULT_MODEL_NAME, DEFAULT_PORT as DEFAULT_LOCAL_AI_PORT,
};
