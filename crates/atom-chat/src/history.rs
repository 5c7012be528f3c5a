//! Conversation history shared by sessions and the sanitizer.

use std::fmt;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// A single exchanged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered sequence of prior messages, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    /// Append a user/assistant pair, then drop the oldest pairs until at
    /// most `max_messages` messages remain.
    pub fn push_exchange(&mut self, user: &str, assistant: &str, max_messages: usize) {
        self.push_user(user);
        self.push_assistant(assistant);
        let excess = self.messages.len().saturating_sub(max_messages);
        // Round up to whole pairs so the history still opens with a user turn.
        let drop = (excess + excess % 2).min(self.messages.len());
        self.messages.drain(..drop);
    }

    /// Text of the most recent user message, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl FromIterator<Message> for ConversationHistory {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_user_message_skips_assistant_turns() {
        let mut history = ConversationHistory::new();
        assert_eq!(history.last_user_message(), None);

        history.push_user("first");
        history.push_assistant("reply");
        history.push_user("second");
        history.push_assistant("another reply");

        assert_eq!(history.last_user_message(), Some("second"));
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn test_push_exchange_drops_oldest_pairs() {
        let mut history = ConversationHistory::new();
        for i in 0..10 {
            history.push_exchange(&format!("q{}", i), &format!("a{}", i), 8);
        }

        assert_eq!(history.len(), 8);
        assert_eq!(history.messages()[0], Message::user("q6"));
        assert_eq!(history.messages()[7], Message::assistant("a9"));
    }

    #[test]
    fn test_push_exchange_odd_limit_keeps_whole_pairs() {
        let mut history = ConversationHistory::new();
        history.push_exchange("q0", "a0", 3);
        history.push_exchange("q1", "a1", 3);

        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[0].role, Role::User);

        history.push_exchange("q2", "a2", 0);
        assert!(history.is_empty());
    }

    #[test]
    fn test_collect_and_role_names() {
        let history: ConversationHistory =
            vec![Message::user("q"), Message::assistant("a")].into_iter().collect();
        assert_eq!(history.messages()[0].role.to_string(), "user");
        assert_eq!(history.messages()[1].role.to_string(), "assistant");
        assert_eq!(history.last_user_message(), Some("q"));
    }
}
