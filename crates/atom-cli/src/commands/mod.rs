//! CLI commands.

pub mod ask;
pub mod chat;
pub mod info;
pub mod model;

use atom_chat::{ChatBot, ChatConfig, ChatError, EngineError, LocalEngine};
use std::sync::Arc;

/// Start the engine and load the primary session.
pub(crate) async fn start_bot(config: &ChatConfig) -> miette::Result<Arc<ChatBot>> {
    let engine = LocalEngine::from_config(config)
        .await
        .map_err(|e| startup_error(&ChatError::Startup(e)))?;

    let bot = ChatBot::new(Arc::new(engine), config)
        .await
        .map_err(|e| startup_error(&e))?;

    Ok(Arc::new(bot))
}

fn startup_error(err: &ChatError) -> miette::Report {
    match err {
        ChatError::Startup(EngineError::ModelNotFound(path)) => miette::miette!(
            "Model not found at {}\n\n\
             Download it with: atom model pull\n\
             Or point ATOM_MODELS_DIR / ATOM_MODEL at an existing .gguf file.",
            path.display()
        ),
        other => miette::miette!("{}", other),
    }
}
