//! Info command - show information about the Atom installation.

use atom_chat::{ChatConfig, Template, DEFAULT_LOCAL_AI_PORT};

pub(crate) fn run() -> miette::Result<()> {
    let config = ChatConfig::from_env();

    println!("Atom Chat Bot");
    println!("=============");
    println!();
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("Components:");
    println!("  atom-local-ai  - llama-server process, model files, completion client");
    println!("  atom-chat      - Template negotiation and response sanitation");
    println!("  atom-cli       - Terminal front end");
    println!();

    println!("Template order:");
    for (i, template) in Template::defaults(&config.system_prompt).iter().enumerate() {
        let note = if i == 0 { " (primary)" } else { "" };
        println!("  {}. {}{}", i + 1, template.name(), note);
    }
    println!();

    println!("System prompt:  {}", config.system_prompt);
    println!("Model file:     {}", config.model_path().display());
    println!("Default port:   {}", DEFAULT_LOCAL_AI_PORT);

    Ok(())
}
