//! Bounded ring of recent user messages.

use std::collections::VecDeque;
use std::sync::Arc;

use super::message::ChatMessage;

/// Number of user messages retained when no limit is configured.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// The last `limit` user-authored messages, oldest first.
///
/// System messages are ignored by [`History::record`].
#[derive(Debug, Clone)]
pub struct History {
    messages: VecDeque<Arc<ChatMessage>>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Record a message, evicting the oldest when full.
    ///
    /// Returns `false` when the message was not retained (system messages or a
    /// zero limit).
    pub fn record(&mut self, message: Arc<ChatMessage>) -> bool {
        if !message.is_user() || self.limit == 0 {
            return false;
        }
        if self.messages.len() == self.limit {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ChatMessage>> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(text: &str) -> Arc<ChatMessage> {
        Arc::new(ChatMessage::user(text, "usr_a", "alice"))
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut history = History::default();
        for i in 1..=51 {
            history.record(user(&i.to_string()));
        }

        assert_eq!(history.len(), 50);
        let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
        let expected: Vec<String> = (2..=51).map(|i| i.to_string()).collect();
        assert_eq!(texts, expected);
    }

    #[test]
    fn test_system_messages_not_recorded() {
        let mut history = History::new(5);
        assert!(!history.record(Arc::new(ChatMessage::welcome("alice"))));
        assert!(!history.record(Arc::new(ChatMessage::left("alice"))));
        assert!(history.is_empty());
    }

    #[test]
    fn test_zero_limit_keeps_nothing() {
        let mut history = History::new(0);
        assert!(!history.record(user("hi")));
        assert_eq!(history.len(), 0);
    }
}
