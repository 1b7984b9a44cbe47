//! Knowledge extractor agent: "has this happened before, and how did we fix it?"

use crate::text::{bullet_list, sentences, truncate};
use async_trait::async_trait;
use sprintmind_common::{Agent, AgentReport, AgentRequest, Capability, ContextUpdate, Result};
use sprintmind_knowledge::{KnowledgeConfig, KnowledgeDoc, KnowledgeIndex, ScoredDoc};
use sprintmind_tracker::format::{adf_to_text, browse_url, comment_url};
use sprintmind_tracker::{Issue, Page, TrackerRead};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

pub const SUMMARY_LABEL: &str = "Answer Summary";
pub const REFERENCES_LABEL: &str = "Relevant References";
pub const REUSE_LABEL: &str = "Suggested Reuse";

const KNOWLEDGE_EXTRACTOR_PROMPT: &str = r#"You are SprintMind's Knowledge Extractor, the team's semantic knowledge base over historical issues and comments.

- Return the most relevant matches for a question, not just keyword hits.
- Summarize the context into a clear, concise answer with supporting issue keys and links.
- Extract lessons learned and reusable fixes or workarounds.

Output sections: Answer Summary, Relevant References, Suggested Reuse.
"#;

/// Fields requested from the search endpoint.
pub const SEARCH_FIELDS: &[&str] = &[
    "summary",
    "description",
    "comment",
    "status",
    "resolution",
    "updated",
    "issuetype",
];

const MAX_QUERY_TERMS: usize = 8;

const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "any", "are", "as", "at", "be", "before", "by", "can", "did",
    "do", "does", "for", "from", "had", "has", "have", "how", "i", "in", "is", "it", "last",
    "me", "of", "on", "or", "our", "similar", "that", "the", "there", "this", "time", "to",
    "was", "we", "were", "what", "when", "which", "who", "why", "with", "you", "fix", "fixed",
    "find", "search", "happened", "history", "past", "tickets", "ticket", "issues", "issue",
    "related", "show", "tell", "ever",
];

/// Phrases that mark a sentence as a reusable solution.
const REUSE_PHRASES: &[&str] = &[
    "fixed by",
    "workaround",
    "resolved by",
    "solution",
    "root cause",
    "the fix",
];

/// Knowledge extractor agent.
pub struct KnowledgeExtractorAgent {
    tracker: Arc<dyn TrackerRead>,
    index: KnowledgeIndex,
    config: KnowledgeConfig,
}

impl KnowledgeExtractorAgent {
    pub fn new(tracker: Arc<dyn TrackerRead>, index: KnowledgeIndex, config: KnowledgeConfig) -> Self {
        Self {
            tracker,
            index,
            config,
        }
    }
}

/// Lowercase search terms with stop words removed, first-seen order.
pub fn query_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric() && c != '-' && c != '_') {
        let word = word.trim_matches(|c| c == '-' || c == '_').to_lowercase();
        if word.chars().count() < 3 || STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        if !terms.contains(&word) {
            terms.push(word);
        }
        if terms.len() == MAX_QUERY_TERMS {
            break;
        }
    }
    terms
}

fn escape_jql(term: &str) -> String {
    term.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `text ~ "a" OR text ~ "b" ORDER BY updated DESC`
pub fn build_jql<S: AsRef<str>>(terms: &[S]) -> String {
    let clauses: Vec<String> = terms
        .iter()
        .map(|t| format!("text ~ \"{}\"", escape_jql(t.as_ref())))
        .collect();
    format!("{} ORDER BY updated DESC", clauses.join(" OR "))
}

fn issue_document(issue: &Issue) -> KnowledgeDoc {
    let mut body = issue
        .fields
        .description
        .as_ref()
        .map(adf_to_text)
        .unwrap_or_default();
    for comment in issue.comments() {
        if let Some(text) = comment.body.as_ref().map(adf_to_text) {
            if !text.is_empty() {
                body.push('\n');
                body.push_str(&text);
            }
        }
    }
    KnowledgeDoc::new(&issue.key, &issue.fields.summary, body)
}

fn is_reusable(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    REUSE_PHRASES.iter().any(|p| lower.contains(p))
}

/// A reusable sentence and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ReuseHint {
    pub issue_key: String,
    pub sentence: String,
    pub comment_id: Option<String>,
}

/// Solution-like sentences from comments first, then the description.
pub fn reuse_hints(issue: &Issue) -> Vec<ReuseHint> {
    let mut hints = Vec::new();

    for comment in issue.comments() {
        let Some(text) = comment.body.as_ref().map(adf_to_text) else {
            continue;
        };
        for sentence in sentences(&text).into_iter().filter(|s| is_reusable(s)) {
            hints.push(ReuseHint {
                issue_key: issue.key.clone(),
                sentence,
                comment_id: Some(comment.id.clone()).filter(|id| !id.is_empty()),
            });
        }
    }

    if let Some(text) = issue.fields.description.as_ref().map(adf_to_text) {
        for sentence in sentences(&text).into_iter().filter(|s| is_reusable(s)) {
            hints.push(ReuseHint {
                issue_key: issue.key.clone(),
                sentence,
                comment_id: None,
            });
        }
    }

    hints
}

fn status_line(issue: &Issue) -> String {
    match issue.fields.resolution.as_ref().map(|r| r.name.as_str()) {
        Some(resolution) if !resolution.is_empty() => {
            format!("{} / {}", issue.status_name(), resolution)
        }
        _ => issue.status_name().to_string(),
    }
}

#[async_trait]
impl Agent for KnowledgeExtractorAgent {
    fn id(&self) -> &str {
        "knowledge_extractor"
    }

    fn name(&self) -> &str {
        "Knowledge Extractor"
    }

    fn capability(&self) -> Capability {
        Capability::Retrieval
    }

    fn system_prompt(&self) -> &str {
        KNOWLEDGE_EXTRACTOR_PROMPT
    }

    async fn run(&self, request: &AgentRequest) -> Result<AgentReport> {
        let report = AgentReport::new(self.id(), self.name());
        let question = request.text.trim();

        let terms = query_terms(question);
        if terms.is_empty() {
            return Ok(report.section(
                SUMMARY_LABEL,
                "No related history found: the question has no searchable terms. \
                 Mention the component, error or feature you are looking for.",
            ));
        }

        let jql = build_jql(&terms);
        info!(agent = %self.id(), jql = %jql, "Searching issue history");

        let page = self
            .tracker
            .search_issues(&jql, Page::first(self.config.candidate_limit), Some(SEARCH_FIELDS))
            .await?;

        let docs: Vec<KnowledgeDoc> = page.issues.iter().map(issue_document).collect();
        let ranked: Vec<ScoredDoc> = self
            .index
            .rank(
                question,
                &docs,
                self.config.max_results,
                self.config.min_similarity,
            )
            .await?;
        debug!(candidates = docs.len(), matches = ranked.len(), "Ranked history");

        if ranked.is_empty() {
            return Ok(report.section(
                SUMMARY_LABEL,
                format!("No related history found for \"{}\".", truncate(question, 120)),
            ));
        }

        let by_key: HashMap<&str, &Issue> =
            page.issues.iter().map(|i| (i.key.as_str(), i)).collect();
        let base_url = self.tracker.base_url();

        let mut summary = vec![format!(
            "Found {} related issue(s). Closest matches:",
            ranked.len()
        )];
        let mut references = Vec::new();
        let mut reuse = Vec::new();

        for scored in &ranked {
            let Some(issue) = by_key.get(scored.doc.id.as_str()) else {
                continue;
            };

            summary.push(format!(
                "- {} {} [{}] (relevance {:.2})",
                issue.key,
                issue.fields.summary,
                status_line(issue),
                scored.score
            ));

            references.push(format!("{}: {}", issue.key, browse_url(base_url, &issue.key)));

            for hint in reuse_hints(issue) {
                if let Some(id) = &hint.comment_id {
                    references.push(format!(
                        "{} comment: {}",
                        issue.key,
                        comment_url(base_url, &issue.key, id)
                    ));
                }
                reuse.push(format!("{} ({})", hint.sentence, hint.issue_key));
            }
        }
        dedup_in_order(&mut references);
        dedup_in_order(&mut reuse);

        let mut report = report
            .section(SUMMARY_LABEL, summary.join("\n"))
            .section(REFERENCES_LABEL, bullet_list(&references, "None"));
        if !reuse.is_empty() {
            report = report.section(REUSE_LABEL, bullet_list(&reuse, ""));
        }

        Ok(report.with_context_update(ContextUpdate {
            issue_keys: ranked.iter().map(|s| s.doc.id.clone()).collect(),
            ..Default::default()
        }))
    }
}

/// Drop repeats anywhere in the list, keeping first occurrences in order.
fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sprintmind_tracker::models::{Comment, CommentPage};
    use sprintmind_tracker::IssueFields;

    #[test]
    fn test_dedup_in_order_drops_distant_repeats() {
        let mut references = vec![
            "PAY-1: https://acme.atlassian.net/browse/PAY-1".to_string(),
            "PAY-2: https://acme.atlassian.net/browse/PAY-2".to_string(),
            "PAY-1: https://acme.atlassian.net/browse/PAY-1".to_string(),
            "PAY-2: https://acme.atlassian.net/browse/PAY-2".to_string(),
        ];
        dedup_in_order(&mut references);
        assert_eq!(
            references,
            vec![
                "PAY-1: https://acme.atlassian.net/browse/PAY-1",
                "PAY-2: https://acme.atlassian.net/browse/PAY-2",
            ]
        );
    }

    #[test]
    fn test_query_terms_drop_stop_words() {
        assert_eq!(
            query_terms("How did we fix the login timeout last time?"),
            vec!["login", "timeout"]
        );
        assert!(query_terms("has this happened before?").is_empty());
    }

    #[test]
    fn test_build_jql_escapes_quotes() {
        assert_eq!(
            build_jql(&["login", "say \"hi\""]),
            "text ~ \"login\" OR text ~ \"say \\\"hi\\\"\" ORDER BY updated DESC"
        );
    }

    #[test]
    fn test_reuse_hints_prefer_comments() {
        let issue = Issue {
            key: "PAY-1".into(),
            fields: IssueFields {
                summary: "Webhook duplicates".into(),
                description: Some(json!("Root cause: missing idempotency key. Nothing else")),
                comment: Some(CommentPage {
                    comments: vec![Comment {
                        id: "100".into(),
                        body: Some(json!("We tried retries. Fixed by deduping on event id.")),
                        ..Default::default()
                    }],
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        let hints = reuse_hints(&issue);
        assert_eq!(hints.len(), 2);
        assert_eq!(hints[0].sentence, "Fixed by deduping on event id");
        assert_eq!(hints[0].comment_id.as_deref(), Some("100"));
        assert_eq!(hints[1].sentence, "Root cause: missing idempotency key");
        assert!(hints[1].comment_id.is_none());
    }
}
