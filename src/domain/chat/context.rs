//! Context window trimming for outbound conversations.

use super::message::Message;

/// Returns the last `window` messages of `history`, oldest dropped first.
///
/// The caller's history is left untouched.
pub fn trim_context(history: &[Message], window: usize) -> Vec<Message> {
    let start = history.len().saturating_sub(window);
    history[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn history(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("q{}", i))
                } else {
                    Message::assistant(format!("a{}", i))
                }
            })
            .collect()
    }

    #[test]
    fn keeps_short_history_intact() {
        let h = history(3);
        assert_eq!(trim_context(&h, 20), h);
    }

    #[test]
    fn trims_twenty_five_to_last_twenty() {
        let h = history(25);
        let trimmed = trim_context(&h, 20);

        assert_eq!(trimmed.len(), 20);
        assert_eq!(trimmed[0].content, "a5");
        assert_eq!(trimmed[19].content, "q24");
        assert_eq!(h.len(), 25);
    }

    #[test]
    fn zero_window_yields_nothing() {
        assert!(trim_context(&history(4), 0).is_empty());
    }

    proptest! {
        #[test]
        fn output_is_suffix_of_bounded_length(len in 0usize..80, window in 0usize..40) {
            let h = history(len);
            let trimmed = trim_context(&h, window);

            prop_assert_eq!(trimmed.len(), len.min(window));
            prop_assert_eq!(&trimmed[..], &h[len - trimmed.len()..]);
        }
    }
}
