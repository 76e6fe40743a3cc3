//! Extracts @mentions from post content, grounded on
//! `social-service/src/services/mention_parser.rs`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static MENTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([a-zA-Z0-9_]+)").expect("invalid mention regex"));

/// Deduplicated list of lowercase handles mentioned, in first-occurrence
/// order.
pub fn extract_mentions(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    MENTION_REGEX
        .captures_iter(content)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_lowercase()))
        .filter(|handle| seen.insert(handle.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_dedupes() {
        let content = "@alice said hi to @bob, then @alice replied";
        assert_eq!(extract_mentions(content), vec!["alice", "bob"]);
    }

    #[test]
    fn normalizes_case() {
        let content = "@Alice and @ALICE";
        assert_eq!(extract_mentions(content), vec!["alice"]);
    }

    #[test]
    fn no_mentions() {
        assert!(extract_mentions("hello world").is_empty());
    }
}
