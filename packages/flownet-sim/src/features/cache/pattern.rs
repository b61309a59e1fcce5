//! Glob-style key patterns
//!
//! A single `*` wildcard is supported: `"*"` matches everything,
//! `"prefix*"` / `"*suffix"` / `"prefix*suffix"` match on the respective
//! ends, and a pattern without `*` is an exact match.

/// Match `key` against `pattern`
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    match pattern.find('*') {
        None => pattern == key,
        Some(star) => {
            let (prefix, suffix) = (&pattern[..star], &pattern[star + 1..]);
            key.len() >= prefix.len() + suffix.len()
                && key.starts_with(prefix)
                && key.ends_with(suffix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_exact_match() {
        assert!(pattern_matches("solve:dinic:abc", "solve:dinic:abc"));
        assert!(!pattern_matches("solve:dinic:abc", "solve:dinic:abd"));
    }

    #[test]
    fn test_match_all() {
        assert!(pattern_matches("*", ""));
        assert!(pattern_matches("*", "anything"));
    }

    #[test]
    fn test_prefix() {
        assert!(pattern_matches("solve:*", "solve:dinic:abc"));
        assert!(!pattern_matches("solve:*", "stats:dinic:abc"));
    }

    #[test]
    fn test_suffix() {
        assert!(pattern_matches("*:abc", "solve:dinic:abc"));
        assert!(!pattern_matches("*:abc", "solve:dinic:abd"));
    }

    #[test]
    fn test_prefix_and_suffix() {
        assert!(pattern_matches("solve:*:abc", "solve:dinic:abc"));
        assert!(!pattern_matches("solve:*:abc", "solve:dinic:abd"));
        // Overlap is not allowed: key must be at least prefix + suffix long
        assert!(!pattern_matches("solve:*:solve", "solve:solve"));
        assert!(pattern_matches("ab*ba", "abba"));
        assert!(!pattern_matches("ab*ba", "aba"));
    }

    proptest! {
        // matches("prefix*suffix", x) iff x starts with prefix, ends with
        // suffix, and is long enough for both without overlap
        #[test]
        fn prop_prefix_suffix_law(prefix in "[a-z:]{0,8}", suffix in "[a-z:]{0,8}", key in "[a-z:]{0,24}") {
            let pattern = format!("{}*{}", prefix, suffix);
            let expected = key.len() >= prefix.len() + suffix.len()
                && key.starts_with(&prefix)
                && key.ends_with(&suffix);
            prop_assert_eq!(pattern_matches(&pattern, &key), expected);
        }
    }
}
