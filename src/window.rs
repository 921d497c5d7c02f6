//! Context window selection
//!
//! Bounds how much conversation history is exposed to any model call.

use crate::models::Message;

/// Selects the most recent bounded suffix of a session's history.
#[derive(Debug, Clone, Copy)]
pub struct ContextWindow {
    max_messages: usize,
}

impl ContextWindow {
    pub fn new(max_messages: usize) -> Self {
        Self { max_messages }
    }

    /// Last `max_messages` messages, oldest to newest, content untouched.
    /// Shorter histories come back unchanged.
    pub fn select<'a>(&self, history: &'a [Message]) -> &'a [Message] {
        let start = history.len().saturating_sub(self.max_messages);
        &history[start..]
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;
    use uuid::Uuid;

    fn build_history(count: usize) -> Vec<Message> {
        let session_id = Uuid::new_v4();
        (0..count)
            .map(|i| {
                Message::new(
                    session_id,
                    if i % 2 == 0 { MessageRole::User } else { MessageRole::Assistant },
                    format!("message {}", i),
                    None,
                )
            })
            .collect()
    }

    #[test]
    fn long_history_yields_exactly_the_last_n_in_order() {
        let history = build_history(25);
        let window = ContextWindow::new(10);

        let selected = window.select(&history);

        assert_eq!(selected.len(), 10);
        assert_eq!(selected[0].content, "message 15");
        assert_eq!(selected[9].content, "message 24");
        for (a, b) in selected.iter().zip(&history[15..]) {
            assert_eq!(a.message_id, b.message_id);
        }
    }

    #[test]
    fn short_history_is_returned_unchanged() {
        let history = build_history(4);
        let window = ContextWindow::new(10);

        let selected = window.select(&history);

        assert_eq!(selected.len(), 4);
        assert_eq!(selected[0].content, "message 0");
    }

    #[test]
    fn empty_history_is_fine() {
        let window = ContextWindow::new(10);
        assert!(window.select(&[]).is_empty());
    }
}
