//! One-shot question.

use atom_chat::{display_text, ChatConfig, ConversationHistory};

pub(crate) async fn run(prompt: &str) -> miette::Result<()> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(miette::miette!("Nothing to ask"));
    }

    let config = ChatConfig::from_env();
    let bot = super::start_bot(&config).await?;

    let raw = bot
        .generate_response(prompt)
        .await
        .map_err(|e| miette::miette!("Response task failed: {}", e))?;

    let mut history = ConversationHistory::new();
    history.push_user(prompt);

    println!("{}", display_text(&raw, &history));
    Ok(())
}
