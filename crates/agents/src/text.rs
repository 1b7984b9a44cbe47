//! Small text helpers shared by the agents and the orchestrator.

use regex::Regex;
use std::sync::LazyLock;

static ISSUE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][A-Z0-9]+-\d+\b").unwrap());

static SPRINT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsprint\s*(?:id\s*)?#?\s*(\d+)\b").unwrap());

static BOARD_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bboard\s*(?:id\s*)?#?\s*(\d+)\b").unwrap());

/// Issue keys (`PROJ-12`) in order of first appearance.
pub fn extract_issue_keys(text: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for m in ISSUE_KEY.find_iter(text) {
        if !keys.iter().any(|k| k == m.as_str()) {
            keys.push(m.as_str().to_string());
        }
    }
    keys
}

/// "sprint 42" / "sprint #42"
pub fn extract_sprint_id(text: &str) -> Option<u64> {
    SPRINT_ID
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// "board 7" / "board #7"
pub fn extract_board_id(text: &str) -> Option<u64> {
    BOARD_ID
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// `- item` lines, or `empty` when there is nothing to list.
pub fn bullet_list<S: AsRef<str>>(items: &[S], empty: &str) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    items
        .iter()
        .map(|i| format!("- {}", i.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut to `max_chars` characters, marking the cut with "...".
pub fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", s[..idx].trim_end()),
        None => s.to_string(),
    }
}

/// Split prose into trimmed sentences.
pub fn sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?', ';', '\n'])
        .map(str::trim)
        .filter(|s| s.chars().count() > 3)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_issue_keys_dedupes() {
        assert_eq!(
            extract_issue_keys("See PROJ-12 and AB2-3, again PROJ-12. not proj-4"),
            vec!["PROJ-12", "AB2-3"]
        );
    }

    #[test]
    fn test_extract_ids() {
        assert_eq!(extract_sprint_id("status of Sprint 42 please"), Some(42));
        assert_eq!(extract_sprint_id("sprint #7"), Some(7));
        assert_eq!(extract_sprint_id("this sprint"), None);
        assert_eq!(extract_board_id("on board 3"), Some(3));
        assert_eq!(extract_board_id("dashboard 9"), None);
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate("héllo world", 5), "héllo...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_bullets_and_sentences() {
        assert_eq!(bullet_list(&["a", "b"], "none"), "- a\n- b");
        assert_eq!(bullet_list::<&str>(&[], "none"), "none");
        assert_eq!(
            sentences("Root cause found. Fixed by retry!  ok"),
            vec!["Root cause found", "Fixed by retry"]
        );
    }
}
