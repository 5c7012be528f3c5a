//! Model management commands.

use atom_chat::{local_ai_paths, ChatConfig, ModelManager};
use std::path::Path;

fn manager() -> ModelManager {
    ModelManager::with_dir(ChatConfig::from_env().models_dir)
}

/// List installed models.
pub(crate) fn list() -> miette::Result<()> {
    let manager = manager();
    let models = manager
        .list_installed()
        .map_err(|e| miette::miette!("Failed to list models: {}", e))?;

    if models.is_empty() {
        println!("No models installed.");
        println!();
        println!("To install the default model, run:");
        println!("  atom model pull");
        return Ok(());
    }

    println!("Installed models:");
    for model in models {
        println!("  - {}", model);
    }

    println!();
    println!("Models directory: {}", manager.dir().display());

    Ok(())
}

/// Pull/download a model.
pub(crate) async fn pull(path: Option<&Path>) -> miette::Result<()> {
    let manager = manager();

    if let Some(source_path) = path {
        if !source_path.exists() {
            return Err(miette::miette!("File not found: {}", source_path.display()));
        }

        let ext = source_path.extension().and_then(|e| e.to_str());
        if ext != Some("gguf") {
            return Err(miette::miette!(
                "Expected a .gguf file, got: {}",
                source_path.display()
            ));
        }

        println!("Installing model from: {}", source_path.display());
        let dest = manager
            .install_from_path(source_path)
            .map_err(|e| miette::miette!("Failed to install model: {}", e))?;

        println!("Model installed to: {}", dest.display());
    } else {
        let model = ModelManager::default_model();

        if manager.is_installed(&model.filename) {
            println!("Model '{}' is already installed.", model.name);
            return Ok(());
        }

        println!("Downloading model: {}", model.name);
        println!("This may take a while depending on your connection...");
        println!();

        let path = manager
            .download(&model)
            .await
            .map_err(|e| miette::miette!("Failed to download model: {}", e))?;

        println!();
        println!("Model downloaded successfully!");
        println!("Location: {}", path.display());
    }

    Ok(())
}

/// Show information about models and paths.
pub(crate) fn info() -> miette::Result<()> {
    let config = ChatConfig::from_env();
    let manager = ModelManager::with_dir(&config.models_dir);

    println!("Atom Local AI Configuration");
    println!("===========================");
    println!();
    println!(
        "Data directory:   {}",
        local_ai_paths::atom_data_dir().display()
    );
    println!("Models directory: {}", config.models_dir.display());
    println!("Binaries:         {}", local_ai_paths::bin_dir().display());
    println!();

    let server_binary = config
        .server_binary
        .clone()
        .unwrap_or_else(local_ai_paths::llama_server_path);
    println!("Server binary:    {}", server_binary.display());
    println!("  Exists: {}", server_binary.exists());
    if let Some(url) = &config.server_url {
        println!("Server URL:       {} (external)", url);
    } else {
        println!("Server port:      {}", config.port);
    }
    println!();

    println!("Model:            {}", config.model_filename);
    println!(
        "  Installed: {}",
        manager.is_installed(&config.model_filename)
    );

    Ok(())
}
