//! Atom CLI - chat with a local language model from the terminal.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// Atom - a local chat bot
#[derive(Parser)]
#[command(name = "atom")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat
    Chat {
        /// Print replies at once instead of typing them out
        #[arg(long)]
        no_typing: bool,
    },

    /// Ask a single question and print the reply
    Ask {
        /// The question
        prompt: String,
    },

    /// Manage local models
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    /// Show information about the Atom installation
    Info,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// List installed models
    List,
    /// Download the default model, or install a local .gguf file
    Pull {
        /// Local .gguf file to install instead of downloading
        path: Option<PathBuf>,
    },
    /// Show model paths and settings
    Info,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| miette::miette!("Failed to create async runtime: {}", e))?;

    match cli.command {
        Commands::Chat { no_typing } => runtime.block_on(commands::chat::run(!no_typing)),
        Commands::Ask { prompt } => runtime.block_on(commands::ask::run(&prompt)),
        Commands::Model { command } => match command {
            ModelCommands::List => commands::model::list(),
            ModelCommands::Pull { path } => runtime.block_on(commands::model::pull(path.as_deref())),
            ModelCommands::Info => commands::model::info(),
        },
        Commands::Info => commands::info::run(),
    }
}
