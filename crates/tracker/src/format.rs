//! Pretty-printing and document helpers for tracker data.

use crate::models::{Board, Issue, IssuePage, Sprint};
use chrono::{DateTime, FixedOffset};
use serde_json::{json, Value};

const RULE: &str = "----------------------------------------";

/// Render a page of issues as `Key / Summary / Status / Assignee` blocks.
pub fn format_issue_page(page: &IssuePage) -> String {
    if page.issues.is_empty() {
        return "No issues found".into();
    }

    let mut out = format!("Found {} issues:\n", page.issues.len());
    for issue in &page.issues {
        out.push_str(&format_issue(issue));
        out.push_str(RULE);
        out.push('\n');
    }
    out
}

pub fn format_issue(issue: &Issue) -> String {
    format!(
        "Key: {}\nSummary: {}\nStatus: {}\nAssignee: {}\n",
        issue.key,
        issue.fields.summary,
        issue.status_name(),
        issue.assignee_name()
    )
}

pub fn format_boards(boards: &[Board]) -> String {
    boards
        .iter()
        .map(|b| {
            format!(
                "ID: {}, Name: {}, Type: {}",
                b.id,
                b.name,
                b.board_type.as_deref().unwrap_or("N/A")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_sprints(sprints: &[Sprint]) -> String {
    sprints
        .iter()
        .map(|s| format!("ID: {}, Name: {}, State: {}", s.id, s.name, s.state.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Link to an issue in the tracker's web UI.
pub fn browse_url(base_url: &str, issue_key: &str) -> String {
    format!("{}/browse/{}", base_url.trim_end_matches('/'), issue_key)
}

/// Link to a single comment on an issue.
pub fn comment_url(base_url: &str, issue_key: &str, comment_id: &str) -> String {
    format!(
        "{}?focusedCommentId={}",
        browse_url(base_url, issue_key),
        comment_id
    )
}

/// Parse the timestamp formats the tracker emits (RFC 3339, or `+0000` offsets).
pub fn parse_jira_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
}

/// Wrap plain text in a minimal Atlassian document, one paragraph per block.
pub fn to_adf(text: &str) -> Value {
    let paragraphs: Vec<Value> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let mut content = Vec::new();
            for (i, line) in p.lines().enumerate() {
                if i > 0 {
                    content.push(json!({ "type": "hardBreak" }));
                }
                if !line.is_empty() {
                    content.push(json!({ "type": "text", "text": line }));
                }
            }
            json!({ "type": "paragraph", "content": content })
        })
        .collect();

    json!({ "type": "doc", "version": 1, "content": paragraphs })
}

/// Flatten an Atlassian document (or a plain string) to text.
pub fn adf_to_text(value: &Value) -> String {
    let mut out = String::new();
    match value {
        Value::String(s) => out.push_str(s),
        other => collect_text(other, &mut out),
    }

    let mut cleaned = String::with_capacity(out.len());
    let mut blank_run = 0;
    for line in out.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        cleaned.push_str(line);
        cleaned.push('\n');
    }
    cleaned.trim().to_string()
}

fn collect_text(node: &Value, out: &mut String) {
    match node {
        Value::Object(map) => {
            let node_type = map.get("type").and_then(Value::as_str).unwrap_or("");
            if node_type == "hardBreak" {
                out.push('\n');
            }
            if let Some(text) = map.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
            if let Some(children) = map.get("content") {
                collect_text(children, out);
            }
            if matches!(
                node_type,
                "paragraph" | "heading" | "listItem" | "codeBlock" | "blockquote" | "rule"
            ) {
                out.push('\n');
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_text(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IssueFields, IssueStatus, JiraUser};

    #[test]
    fn test_format_empty_page() {
        assert_eq!(format_issue_page(&IssuePage::default()), "No issues found");
    }

    #[test]
    fn test_format_issue_page() {
        let page = IssuePage {
            issues: vec![Issue {
                key: "PROJ-1".into(),
                fields: IssueFields {
                    summary: "Login".into(),
                    status: Some(IssueStatus {
                        name: "In Progress".into(),
                        status_category: None,
                    }),
                    assignee: Some(JiraUser {
                        display_name: "Ana".into(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }],
            ..Default::default()
        };

        let out = format_issue_page(&page);
        assert!(out.starts_with("Found 1 issues:"));
        assert!(out.contains("Key: PROJ-1"));
        assert!(out.contains("Status: In Progress"));
        assert!(out.contains("Assignee: Ana"));
    }

    #[test]
    fn test_adf_roundtrip_text() {
        let doc = to_adf("First line\nsecond line\n\nNext paragraph");
        let text = adf_to_text(&doc);
        assert_eq!(text, "First line\nsecond line\nNext paragraph");
    }

    #[test]
    fn test_adf_plain_string() {
        assert_eq!(adf_to_text(&json!("  plain body ")), "plain body");
    }

    #[test]
    fn test_to_adf_skips_empty_paragraphs() {
        let doc = to_adf("\n\n\n");
        assert_eq!(doc["content"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_links() {
        assert_eq!(
            browse_url("https://x.atlassian.net/", "PROJ-9"),
            "https://x.atlassian.net/browse/PROJ-9"
        );
        assert_eq!(
            comment_url("https://x.atlassian.net", "PROJ-9", "100"),
            "https://x.atlassian.net/browse/PROJ-9?focusedCommentId=100"
        );
    }

    #[test]
    fn test_parse_jira_datetime_formats() {
        assert!(parse_jira_datetime("2024-03-01T10:00:00.000Z").is_some());
        assert!(parse_jira_datetime("2024-03-01T10:00:00.000+0000").is_some());
        assert!(parse_jira_datetime("yesterday").is_none());
    }
}
