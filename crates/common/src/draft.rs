//! Review-only decomposition drafts.
//!
//! A [`DecompositionDraft`] is pure data: nothing in it can reach the tracker.
//! The only way to get something the issue publisher accepts is
//! [`DecompositionDraft::approve`], which yields an [`ApprovedDraft`] that
//! cannot be constructed or deserialized anywhere else.

use crate::{Result, SprintMindError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const MIN_DRAFT_ITEMS: usize = 3;
pub const MAX_DRAFT_ITEMS: usize = 12;

const SUGGESTED_PREFIX: &str = "Suggested: ";

/// A generated value that must never be presented as authoritative.
///
/// Displays and serializes with a `Suggested: ` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggested(String);

impl Suggested {
    pub fn new(value: impl fmt::Display) -> Self {
        let raw = value.to_string();
        Self(strip_prefix(&raw).to_string())
    }

    /// The underlying value without the label.
    pub fn value(&self) -> &str {
        &self.0
    }
}

fn strip_prefix(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.get(..10) {
        Some(head) if head.eq_ignore_ascii_case("suggested:") => trimmed[10..].trim_start(),
        _ => trimmed,
    }
}

impl fmt::Display for Suggested {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", SUGGESTED_PREFIX, self.0)
    }
}

impl Serialize for Suggested {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Suggested {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let raw = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        Ok(Suggested::new(raw))
    }
}

/// One proposed child item of an epic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftItem {
    pub title: String,

    #[serde(default)]
    pub acceptance_criteria: Vec<String>,

    pub suggested_estimate: Suggested,

    pub suggested_owner: Suggested,

    /// Issue type name, e.g. "Story" or "Task"
    #[serde(rename = "type", default = "default_item_type")]
    pub item_type: String,
}

pub fn default_item_type() -> String {
    "Story".into()
}

/// Structured breakdown of an epic, awaiting human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic_key: Option<String>,

    pub epic_title: String,

    pub items: Vec<DraftItem>,

    #[serde(default)]
    pub assumptions: Vec<String>,

    #[serde(default)]
    pub risks: Vec<String>,

    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl DecompositionDraft {
    /// Check the structural invariants of a draft.
    pub fn validate(&self) -> Result<()> {
        let count = self.items.len();
        if !(MIN_DRAFT_ITEMS..=MAX_DRAFT_ITEMS).contains(&count) {
            return Err(SprintMindError::Agent(format!(
                "Draft must contain between {} and {} items, found {}",
                MIN_DRAFT_ITEMS, MAX_DRAFT_ITEMS, count
            )));
        }
        if let Some(item) = self.items.iter().find(|i| i.title.trim().is_empty()) {
            return Err(SprintMindError::Agent(format!(
                "Draft item with empty title (estimate {})",
                item.suggested_estimate
            )));
        }
        Ok(())
    }

    /// Record a human approval. This is the only way to obtain an
    /// [`ApprovedDraft`].
    pub fn approve(self, reviewer: impl Into<String>) -> Result<ApprovedDraft> {
        let reviewer = reviewer.into();
        if reviewer.trim().is_empty() {
            return Err(SprintMindError::Agent(
                "Approving a draft requires a named reviewer".into(),
            ));
        }
        self.validate()?;

        Ok(ApprovedDraft {
            draft: self,
            reviewer,
            approved_at: Utc::now(),
        })
    }
}

/// A draft a human has signed off on.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovedDraft {
    draft: DecompositionDraft,
    reviewer: String,
    approved_at: DateTime<Utc>,
}

impl ApprovedDraft {
    pub fn draft(&self) -> &DecompositionDraft {
        &self.draft
    }

    pub fn reviewer(&self) -> &str {
        &self.reviewer
    }

    pub fn approved_at(&self) -> DateTime<Utc> {
        self.approved_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str) -> DraftItem {
        DraftItem {
            title: title.into(),
            acceptance_criteria: vec!["works".into()],
            suggested_estimate: Suggested::new("3 points"),
            suggested_owner: Suggested::new("unassigned"),
            item_type: default_item_type(),
        }
    }

    fn draft(n: usize) -> DecompositionDraft {
        DecompositionDraft {
            epic_key: Some("PROJ-1".into()),
            epic_title: "Checkout".into(),
            items: (0..n).map(|i| item(&format!("Item {}", i))).collect(),
            assumptions: vec![],
            risks: vec![],
            dependencies: vec![],
        }
    }

    #[test]
    fn test_suggested_display_and_serialize() {
        let s = Suggested::new("5 points");
        assert_eq!(s.to_string(), "Suggested: 5 points");
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"Suggested: 5 points\"");
        assert_eq!(s.value(), "5 points");
    }

    #[test]
    fn test_suggested_never_double_prefixed() {
        let s = Suggested::new("Suggested: Ana");
        assert_eq!(s.to_string(), "Suggested: Ana");

        let parsed: Suggested = serde_json::from_str("\"suggested: Ben\"").unwrap();
        assert_eq!(parsed.to_string(), "Suggested: Ben");

        let numeric: Suggested = serde_json::from_str("3").unwrap();
        assert_eq!(numeric.to_string(), "Suggested: 3");
    }

    #[test]
    fn test_validate_bounds() {
        assert!(draft(2).validate().is_err());
        assert!(draft(3).validate().is_ok());
        assert!(draft(12).validate().is_ok());
        assert!(draft(13).validate().is_err());
    }

    #[test]
    fn test_approve_requires_reviewer() {
        assert!(draft(3).approve("  ").is_err());

        let approved = draft(3).approve("pm@example.com").unwrap();
        assert_eq!(approved.reviewer(), "pm@example.com");
        assert_eq!(approved.draft().items.len(), 3);
    }

    #[test]
    fn test_approve_rejects_invalid_draft() {
        assert!(draft(1).approve("pm").is_err());
    }

    #[test]
    fn test_item_type_field_name() {
        let json = serde_json::to_value(item("A")).unwrap();
        assert_eq!(json["type"], "Story");
        assert_eq!(json["suggested_owner"], "Suggested: unassigned");
    }
}
