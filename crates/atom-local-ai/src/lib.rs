//! llama.cpp backend for Atom.
//!
//! This crate owns everything on the far side of the inference boundary:
//! locating the bundled GGUF model, running a `llama-server` process for it,
//! and sending raw prompt completions to that server.

mod client;
mod error;
mod model;
pub mod paths;
mod server;

pub use client::{CompletionRequest, LlamaCppClient};
pub use error::LocalAIError;
pub use model::{ModelInfo, ModelManager};
pub use server::LlamaCppServer;

/// Default port for the local llama-server instance.
pub const DEFAULT_PORT: u16 = 11436;

/// Default model name for the chat bot.
pub const DEFAULT_MODEL_NAME: &str = "tinyllama-1.1b-chat";

/// Default model filename.
pub const DEFAULT_MODEL_FILENAME: &str = "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf";
