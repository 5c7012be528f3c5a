//! Interactive chat.

use atom_chat::{ChatConfig, ChatController, ChatError};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Delay between characters when typing a reply out.
const TYPING_INTERVAL: Duration = Duration::from_millis(18);

/// How often the typing indicator advances.
const INDICATOR_TICK: Duration = Duration::from_millis(500);

pub(crate) async fn run(typing: bool) -> miette::Result<()> {
    let config = ChatConfig::from_env();
    let bot = super::start_bot(&config).await?;
    let chat = ChatController::new(bot);

    println!("Atom chatbot");
    println!("Type a message and press Enter. /quit to leave.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| miette::miette!("Failed to read input: {}", e))?
        else {
            break;
        };
        if matches!(line.trim(), "/quit" | "/exit") {
            break;
        }

        let indicator = typing_indicator();
        let result = chat.send(&line).await;
        indicator.finish_and_clear();

        match result {
            Ok(reply) => {
                if typing {
                    type_out(&reply.text).await;
                } else {
                    println!("{}", reply.text);
                }
                println!();
            }
            Err(ChatError::EmptyPrompt) => continue,
            Err(e) => eprintln!("error: {}", e),
        }
    }

    Ok(())
}

/// Spinner shown while a reply is being generated.
fn typing_indicator() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["   ", ".  ", ".. ", "...", ""])
            .template("{msg}{spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Atom is typing");
    pb.enable_steady_tick(INDICATOR_TICK);
    pb
}

/// Print `text` one character at a time.
async fn type_out(text: &str) {
    let mut stdout = std::io::stdout();
    for ch in text.chars() {
        print!("{}", ch);
        stdout.flush().ok();
        tokio::time::sleep(TYPING_INTERVAL).await;
    }
    println!();
}
