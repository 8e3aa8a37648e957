//! Token counting capability

use crate::message::Message;
use std::sync::Arc;

/// Pluggable per-message token counter.
pub type TokenCounter = Arc<dyn Fn(&Message) -> u64 + Send + Sync>;

/// Default heuristic: `ceil(content_chars / 3.5)`.
pub fn default_token_counter(message: &Message) -> u64 {
    let chars = message.content_chars();
    if chars == 0 {
        return 0;
    }
    (chars as f64 / 3.5).ceil() as u64
}

/// Sum a counter over a sequence, falling back to the default heuristic.
pub fn count_sequence(messages: &[Message], counter: Option<&TokenCounter>) -> u64 {
    messages
        .iter()
        .map(|m| match counter {
            Some(c) => c(m),
            None => default_token_counter(m),
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_counter_empty() {
        let msg = Message::user("m1", "");
        assert_eq!(default_token_counter(&msg), 0);
    }

    #[test]
    fn test_default_counter_rounds_up() {
        // 7 chars / 3.5 = 2.0 exactly; 8 chars rounds up to 3
        assert_eq!(default_token_counter(&Message::user("m1", "abcdefg")), 2);
        assert_eq!(default_token_counter(&Message::user("m2", "abcdefgh")), 3);
    }

    #[test]
    fn test_count_sequence_custom_counter() {
        let messages = vec![Message::user("m1", "aaaa"), Message::user("m2", "bb")];
        let counter: TokenCounter = Arc::new(|m: &Message| m.content_len() as u64);
        assert_eq!(count_sequence(&messages, Some(&counter)), 6);
        assert_eq!(count_sequence(&messages, None), 2 + 1);
    }
}
