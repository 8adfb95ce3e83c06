//! `@handle` extraction for notify fan-out.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// `@` followed by a dotted account identifier (dot-separated parts of ASCII
/// alphanumerics joined by `-`/`_`). Boundaries are checked separately since
/// the regex crate has no lookaround.
static MENTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@((?:(?:[a-zA-Z0-9]+[\-_])*[a-zA-Z0-9]+\.)*(?:[a-zA-Z0-9]+[\-_])*[a-zA-Z0-9]+)")
        .unwrap()
});

const MIN_HANDLE_LEN: usize = 2;
const MAX_HANDLE_LEN: usize = 64;

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Distinct lower-cased handles mentioned in `text`, in order of appearance.
///
/// A mention must not be preceded by a word character or backtick and must not
/// be followed by a word character, `/` or backtick, which rules out emails,
/// paths like `@alice.near/widget/x` and code-quoted handles.
pub fn extract_mentions(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut mentions = Vec::new();

    for caps in MENTION_PATTERN.captures_iter(text) {
        let (Some(full), Some(handle)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        let before = text[..full.start()].chars().next_back();
        if before.is_some_and(|c| is_word_char(c) || c == '`') {
            continue;
        }
        let after = text[full.end()..].chars().next();
        if after.is_some_and(|c| is_word_char(c) || c == '/' || c == '`') {
            continue;
        }

        let len = handle.as_str().chars().count();
        if !(MIN_HANDLE_LEN..=MAX_HANDLE_LEN).contains(&len) {
            continue;
        }

        let handle = handle.as_str().to_lowercase();
        if seen.insert(handle.clone()) {
            mentions.push(handle);
        }
    }

    mentions
}

/// Merge mention lists case-insensitively, keeping first-seen order and
/// dropping `exclude` (the bot's own account).
pub fn merge_mentions<'a>(
    lists: impl IntoIterator<Item = &'a String>,
    exclude: &str,
) -> Vec<String> {
    let exclude = exclude.to_lowercase();
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .map(|m| m.to_lowercase())
        .filter(|m| *m != exclude && seen.insert(m.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_handles_and_skips_paths() {
        let mentions = extract_mentions("hello @alice.near and @bo, see code.near/x");
        assert_eq!(mentions, vec!["alice.near", "bo"]);

        // Slash-adjacent handle is a widget path, not a mention
        assert!(extract_mentions("open @alice.near/widget/Feed").is_empty());
    }

    #[test]
    fn test_handle_length_bounds() {
        assert!(extract_mentions("hi @a").is_empty());

        let max = "a".repeat(64);
        assert_eq!(extract_mentions(&format!("hi @{}", max)), vec![max.clone()]);

        let too_long = "a".repeat(65);
        assert!(extract_mentions(&format!("hi @{}", too_long)).is_empty());
    }

    #[test]
    fn test_boundaries() {
        assert!(extract_mentions("mail me at bob@example.near").is_empty());
        assert!(extract_mentions("run `@alice.near` in code").is_empty());
        assert!(extract_mentions("`@alice.near").is_empty());
        assert_eq!(extract_mentions("(@alice.near)"), vec!["alice.near"]);
        assert_eq!(extract_mentions("thanks @alice.near."), vec!["alice.near"]);
        assert_eq!(extract_mentions("@root.near at start"), vec!["root.near"]);
    }

    #[test]
    fn test_case_insensitive_dedup() {
        let mentions = extract_mentions("@Alice.Near @alice.near @ALICE.NEAR @bob-x_y.near");
        assert_eq!(mentions, vec!["alice.near", "bob-x_y.near"]);
    }

    #[test]
    fn test_non_ascii_never_forms_a_handle() {
        // Arabic-Indic digit three: one char, two bytes
        assert!(extract_mentions("hi @\u{0663} there").is_empty());
        // Kelvin sign would case-fold to `k`
        assert!(extract_mentions("hi @\u{212A}x.near there").is_empty());
        assert!(extract_mentions("hi @\u{0663}\u{0663}").is_empty());
        assert_eq!(extract_mentions("héllo @alice.near"), vec!["alice.near"]);
    }

    #[test]
    fn test_merge_mentions_excludes_self() {
        let text = vec!["alice.near".to_string(), "bot.near".to_string()];
        let extra = vec!["Alice.near".to_string(), "carol.near".to_string()];
        let merged = merge_mentions(text.iter().chain(extra.iter()), "Bot.near");
        assert_eq!(merged, vec!["alice.near", "carol.near"]);
    }
}
