//! Prompt templates.
//!
//! A template turns the user's prompt, the prior conversation and a system
//! instruction into the exact text a chat-tuned model expects, including its
//! special tokens.

use crate::history::{ConversationHistory, Role};

/// System instruction used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Chat prompt formats understood by the bundled model family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    /// `<|im_start|>role ... <|im_end|>` turns.
    ChatMl { system: String },
    /// `[INST] ... [/INST]` turns with a `<<SYS>>` block.
    Llama { system: String },
    /// `### Instruction:` / `### Response:` sections.
    Alpaca { system: String },
}

impl Template {
    pub fn chat_ml(system: impl Into<String>) -> Self {
        Template::ChatMl {
            system: system.into(),
        }
    }

    pub fn llama(system: impl Into<String>) -> Self {
        Template::Llama {
            system: system.into(),
        }
    }

    pub fn alpaca(system: impl Into<String>) -> Self {
        Template::Alpaca {
            system: system.into(),
        }
    }

    /// The candidate list in priority order. The first entry is the template
    /// of the long-lived primary session.
    pub fn defaults(system: &str) -> Vec<Template> {
        vec![
            Template::chat_ml(system),
            Template::llama(system),
            Template::alpaca(system),
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Template::ChatMl { .. } => "chatML",
            Template::Llama { .. } => "llama",
            Template::Alpaca { .. } => "alpaca",
        }
    }

    pub fn system(&self) -> &str {
        match self {
            Template::ChatMl { system }
            | Template::Llama { system }
            | Template::Alpaca { system } => system,
        }
    }

    /// Strings that mark the end of the model's turn.
    pub fn stop_sequences(&self) -> &'static [&'static str] {
        match self {
            Template::ChatMl { .. } => &["<|im_end|>"],
            Template::Llama { .. } => &["</s>"],
            Template::Alpaca { .. } => &["###"],
        }
    }

    /// Render `prompt` after `history` in this template's format, ending with
    /// the header that opens the assistant's turn.
    pub fn render(&self, prompt: &str, history: &ConversationHistory) -> String {
        match self {
            Template::ChatMl { system } => render_chat_ml(system, prompt, history),
            Template::Llama { system } => render_llama(system, prompt, history),
            Template::Alpaca { system } => render_alpaca(system, prompt, history),
        }
    }
}

fn render_chat_ml(system: &str, prompt: &str, history: &ConversationHistory) -> String {
    let mut out = String::new();
    if !system.is_empty() {
        out.push_str(&format!("<|im_start|>system\n{}<|im_end|>\n", system));
    }
    for message in history.messages() {
        out.push_str(&format!(
            "<|im_start|>{}\n{}<|im_end|>\n",
            message.role, message.content
        ));
    }
    out.push_str(&format!(
        "<|im_start|>user\n{}<|im_end|>\n<|im_start|>assistant\n",
        prompt
    ));
    out
}

fn render_llama(system: &str, prompt: &str, history: &ConversationHistory) -> String {
    // The system block rides inside the first [INST] of the conversation.
    let mut sys_block = if system.is_empty() {
        String::new()
    } else {
        format!("<<SYS>>\n{}\n<</SYS>>\n\n", system)
    };

    let mut out = String::new();
    for message in history.messages() {
        match message.role {
            Role::User => {
                out.push_str(&format!(
                    "<s>[INST] {}{} [/INST]",
                    std::mem::take(&mut sys_block),
                    message.content
                ));
            }
            Role::Assistant => {
                out.push_str(&format!(" {} </s>", message.content));
            }
        }
    }
    out.push_str(&format!("<s>[INST] {}{} [/INST]", sys_block, prompt));
    out
}

fn render_alpaca(system: &str, prompt: &str, history: &ConversationHistory) -> String {
    let mut out = String::new();
    if !system.is_empty() {
        out.push_str(system);
        out.push_str("\n\n");
    }
    for message in history.messages() {
        match message.role {
            Role::User => {
                out.push_str(&format!("### Instruction:\n{}\n\n", message.content));
            }
            Role::Assistant => {
                out.push_str(&format!("### Response:\n{}\n\n", message.content));
            }
        }
    }
    out.push_str(&format!("### Instruction:\n{}\n\n### Response:\n", prompt));
    out
}
