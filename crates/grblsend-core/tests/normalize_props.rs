//! Property tests for command normalization

use grblsend_core::{normalize, Command};
use proptest::prelude::*;

proptest! {
    #[test]
    fn normalize_is_idempotent(raw in "[ \\tGXYZFM0-9.;()a-z-]{0,40}") {
        let once = normalize(&raw);
        prop_assert_eq!(normalize(once), once);
    }

    #[test]
    fn normalized_text_has_no_comment_or_padding(raw in "[ \\tGXYZFM0-9.;()a-z-]{0,40}") {
        let text = normalize(&raw);
        prop_assert!(!text.contains(';'));
        prop_assert_eq!(text.trim(), text);
        prop_assert!(!text.starts_with('('));
    }

    #[test]
    fn command_parse_agrees_with_normalize(raw in "[ \\tG0-9X;]{0,20}") {
        match Command::parse(&raw) {
            Some(cmd) => prop_assert_eq!(cmd.as_str(), normalize(&raw)),
            None => prop_assert!(normalize(&raw).is_empty()),
        }
    }
}
