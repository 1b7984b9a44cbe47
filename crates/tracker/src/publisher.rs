//! Human-gated issue creation.
//!
//! [`IssuePublisher::publish`] only accepts an [`ApprovedDraft`], which can
//! only be produced by `DecompositionDraft::approve`. No other code path in
//! SprintMind calls [`TrackerWrite::create_issue`].

use crate::client::TrackerWrite;
use crate::models::{CreatedIssue, NewIssue};
use serde::Serialize;
use sprintmind_common::{ApprovedDraft, DraftItem};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct PublishFailure {
    pub title: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishReport {
    pub created: Vec<CreatedIssue>,
    pub failures: Vec<PublishFailure>,
}

impl PublishReport {
    pub fn created_keys(&self) -> Vec<&str> {
        self.created.iter().map(|c| c.key.as_str()).collect()
    }
}

pub struct IssuePublisher {
    writer: Arc<dyn TrackerWrite>,
}

impl IssuePublisher {
    pub fn new(writer: Arc<dyn TrackerWrite>) -> Self {
        Self { writer }
    }

    /// Create one issue per approved item, in draft order.
    ///
    /// A failed item is recorded and the remaining items are still attempted.
    pub async fn publish(
        &self,
        approved: &ApprovedDraft,
        project_key: &str,
        issue_type_override: Option<&str>,
    ) -> PublishReport {
        let draft = approved.draft();
        info!(
            epic = %draft.epic_title,
            items = draft.items.len(),
            reviewer = %approved.reviewer(),
            project_key,
            "Publishing approved draft"
        );

        let mut report = PublishReport::default();
        for item in &draft.items {
            let new_issue = NewIssue {
                project_key: project_key.to_string(),
                summary: item.title.clone(),
                description: describe(item, approved),
                issue_type: issue_type_override
                    .map(str::to_string)
                    .unwrap_or_else(|| item.item_type.clone()),
            };

            match self.writer.create_issue(&new_issue).await {
                Ok(created) => {
                    info!(key = %created.key, title = %item.title, "Created issue");
                    report.created.push(created);
                }
                Err(e) => {
                    warn!(title = %item.title, error = %e, "Failed to create issue");
                    report.failures.push(PublishFailure {
                        title: item.title.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }
}

fn describe(item: &DraftItem, approved: &ApprovedDraft) -> String {
    let mut description = String::new();

    if !item.acceptance_criteria.is_empty() {
        description.push_str("Acceptance criteria:\n");
        for criterion in &item.acceptance_criteria {
            description.push_str(&format!("- {}\n", criterion));
        }
        description.push('\n');
    }

    description.push_str(&format!(
        "Estimate ({})\nOwner ({})\n\n",
        item.suggested_estimate, item.suggested_owner
    ));

    if let Some(epic_key) = &approved.draft().epic_key {
        description.push_str(&format!("Part of epic {}.\n", epic_key));
    }
    description.push_str(&format!(
        "Drafted by SprintMind, approved by {} on {}.",
        approved.reviewer(),
        approved.approved_at().format("%Y-%m-%d")
    ));

    description
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TrackerError, TrackerResult};
    use async_trait::async_trait;
    use sprintmind_common::{DecompositionDraft, Suggested};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingWriter {
        created: Mutex<Vec<NewIssue>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl TrackerWrite for RecordingWriter {
        async fn create_issue(&self, issue: &NewIssue) -> TrackerResult<CreatedIssue> {
            if self.fail_on.as_deref() == Some(issue.summary.as_str()) {
                return Err(TrackerError::Status {
                    operation: "create_issue",
                    status: 400,
                    body: "bad field".into(),
                });
            }
            let mut created = self.created.lock().unwrap();
            created.push(issue.clone());
            Ok(CreatedIssue {
                id: created.len().to_string(),
                key: format!("PROJ-{}", 100 + created.len()),
                self_url: String::new(),
            })
        }
    }

    fn approved() -> ApprovedDraft {
        DecompositionDraft {
            epic_key: Some("PROJ-1".into()),
            epic_title: "Checkout".into(),
            items: ["Cart", "Payment", "Receipt"]
                .iter()
                .map(|t| DraftItem {
                    title: t.to_string(),
                    acceptance_criteria: vec![format!("{} works", t)],
                    suggested_estimate: Suggested::new("3 points"),
                    suggested_owner: Suggested::new("Ana"),
                    item_type: "Story".into(),
                })
                .collect(),
            assumptions: vec![],
            risks: vec![],
            dependencies: vec![],
        }
        .approve("lead")
        .unwrap()
    }

    #[tokio::test]
    async fn test_publish_creates_in_order() {
        let writer = Arc::new(RecordingWriter::default());
        let publisher = IssuePublisher::new(writer.clone());

        let report = publisher.publish(&approved(), "PROJ", None).await;

        assert_eq!(report.created_keys(), vec!["PROJ-101", "PROJ-102", "PROJ-103"]);
        assert!(report.failures.is_empty());

        let created = writer.created.lock().unwrap();
        assert_eq!(created[0].summary, "Cart");
        assert_eq!(created[0].issue_type, "Story");
        assert!(created[0].description.contains("Suggested: 3 points"));
        assert!(created[0].description.contains("approved by lead"));
        assert!(created[0].description.contains("Part of epic PROJ-1"));
    }

    #[tokio::test]
    async fn test_publish_continues_after_failure() {
        let writer = Arc::new(RecordingWriter {
            fail_on: Some("Payment".into()),
            ..Default::default()
        });
        let publisher = IssuePublisher::new(writer);

        let report = publisher.publish(&approved(), "PROJ", Some("Task")).await;

        assert_eq!(report.created.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].title, "Payment");
    }
}
