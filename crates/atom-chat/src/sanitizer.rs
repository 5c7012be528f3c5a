//! Response sanitation.
//!
//! Small chat models routinely leak their template into the output: role
//! markers, end-of-turn tokens, a copy of the question. [`sanitize`] strips
//! those so the text can be shown as-is.

use crate::history::ConversationHistory;

/// Fragments removed wherever they appear in a completion.
pub const DENYLIST: &[&str] = &[
    "<|im_start|>user",
    "<|im_end|>",
    "<|im_start|>assistant",
    "<|user|>",
    "<assistant>",
    "user:",
    "assistant:",
    "\0",
];

const ROLE_LABELS: &[&str] = &["assistant:", "user:"];

/// Clean a raw completion for display.
///
/// The cleaning pass is repeated until the text stops changing, so the result
/// is a fixed point: sanitizing it again returns it unchanged. Every pass that
/// changes the text makes it shorter, so this terminates.
pub fn sanitize(raw: &str, history: &ConversationHistory) -> String {
    let echo = history.last_user_message().filter(|m| !m.is_empty());
    let mut current = clean_once(raw, echo);
    loop {
        let next = clean_once(&current, echo);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_once(text: &str, echo: Option<&str>) -> String {
    let mut cleaned = text.to_string();
    for token in DENYLIST {
        cleaned = cleaned.replace(token, "");
    }

    if let Some(rest) = echo.and_then(|echo| strip_echo(&cleaned, echo)) {
        cleaned = rest.trim().to_string();
    }

    let mut cleaned = collapse_blank_lines(cleaned.trim());
    if let Some(rest) = strip_role_label(&cleaned) {
        cleaned = rest.to_string();
    }
    cleaned
}

/// Strip `echo` from the start of `text` when it is followed by whitespace or
/// nothing. "Hi! How can I help?" does not echo "Hi".
fn strip_echo<'t>(text: &'t str, echo: &str) -> Option<&'t str> {
    let rest = text.strip_prefix(echo)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

/// Collapse runs of three or more newlines to two.
fn collapse_blank_lines(text: &str) -> String {
    let mut out = text.to_string();
    while out.contains("\n\n\n") {
        out = out.replace("\n\n\n", "\n\n");
    }
    out
}

/// Strip one leading role label and the whitespace after it.
fn strip_role_label(text: &str) -> Option<&str> {
    ROLE_LABELS
        .iter()
        .find_map(|label| text.strip_prefix(label))
        .map(str::trim_start)
}
