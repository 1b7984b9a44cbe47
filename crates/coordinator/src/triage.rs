//! Deterministic intent classification.
//!
//! Each capability has a weighted keyword table. Text is lowercased and split
//! into words; a keyword matches whole words (multi-word keywords match
//! consecutive words, and a trailing plural `s` is accepted). Every capability
//! whose score reaches [`SELECT_THRESHOLD`] is selected.

use crate::routing::RouteDecision;
use sprintmind_agents::text::{extract_board_id, extract_issue_keys, extract_sprint_id};
use sprintmind_common::{Capability, ContextUpdate, ConversationContext};
use tracing::debug;

pub const SELECT_THRESHOLD: f32 = 1.0;

const REPORTING_KEYWORDS: &[(&str, f32)] = &[
    ("sprint", 1.0),
    ("standup", 1.0),
    ("stand up", 1.0),
    ("status", 0.5),
    ("blocked", 1.0),
    ("blocker", 1.0),
    ("risk", 1.0),
    ("velocity", 1.0),
    ("burndown", 1.0),
    ("health", 0.5),
    ("progress", 0.5),
    ("overdue", 1.0),
    ("workload", 1.0),
];

const DECOMPOSITION_KEYWORDS: &[(&str, f32)] = &[
    ("epic", 1.0),
    ("decompose", 1.0),
    ("break down", 1.0),
    ("breakdown", 1.0),
    ("split", 0.5),
    ("stories", 0.5),
    ("subtasks", 1.0),
    ("backlog", 0.5),
];

const RETRIEVAL_KEYWORDS: &[(&str, f32)] = &[
    ("before", 0.5),
    ("history", 1.0),
    ("similar", 1.0),
    ("last time", 1.0),
    ("how did we", 1.0),
    ("fix", 0.5),
    ("workaround", 1.0),
    ("happened", 1.0),
    ("past", 0.5),
    ("search", 0.5),
    ("find", 0.5),
];

const FOLLOW_UP_WORDS: &[&str] = &["it", "that"];

const APPROVAL_PHRASES: &[&str] = &["approve", "approved", "looks good", "lgtm"];

pub const APPROVAL_ENDPOINT: &str = "/api/v1/drafts/approve";

const GREETING: &str = "Hi, I'm SprintMind. I can help with:\n\
- Sprint reporting: \"What's blocked in the current sprint?\"\n\
- Epic decomposition: \"Break down epic PROJ-12 into stories\"\n\
- History search: \"Have we seen webhook timeouts before, and how did we fix it?\"";

fn keywords(capability: Capability) -> &'static [(&'static str, f32)] {
    match capability {
        Capability::Reporting => REPORTING_KEYWORDS,
        Capability::Decomposition => DECOMPOSITION_KEYWORDS,
        Capability::Retrieval => RETRIEVAL_KEYWORDS,
    }
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\'').to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

fn word_matches(word: &str, keyword: &str) -> bool {
    word == keyword || word.strip_suffix('s') == Some(keyword)
}

fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let parts: Vec<&str> = phrase.split_whitespace().collect();
    if parts.is_empty() || parts.len() > words.len() {
        return false;
    }
    words.windows(parts.len()).any(|window| {
        let last = parts.len() - 1;
        window.iter().zip(&parts).enumerate().all(|(i, (w, p))| {
            if i == last {
                word_matches(w, p)
            } else {
                w == p
            }
        })
    })
}

/// Keyword-table score for one capability.
pub fn score(text: &str, capability: Capability) -> f32 {
    let words = words(text);
    keywords(capability)
        .iter()
        .filter(|(kw, _)| contains_phrase(&words, kw))
        .map(|(_, weight)| weight)
        .sum()
}

/// Sprint, board and issue keys named in the text.
pub fn extract_context(text: &str) -> ContextUpdate {
    ContextUpdate {
        sprint_id: extract_sprint_id(text),
        board_id: extract_board_id(text),
        issue_keys: extract_issue_keys(text),
        ..Default::default()
    }
}

/// Rule-based classifier. Stateless; the previous turn's plan is passed in.
#[derive(Debug, Clone, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(
        &self,
        text: &str,
        context: &ConversationContext,
        previous_plan: &[Capability],
    ) -> RouteDecision {
        let extracted = extract_context(text);
        let words = words(text);

        if let Some(draft) = &context.pending_draft {
            if APPROVAL_PHRASES.iter().any(|p| contains_phrase(&words, p)) {
                let epic = draft
                    .epic_key
                    .as_deref()
                    .unwrap_or(draft.epic_title.as_str());
                return RouteDecision::direct(format!(
                    "The draft for {} ({} items) is waiting for approval. Nothing is created \
                     from chat: call POST {} with your name as reviewer to publish it.",
                    epic,
                    draft.items.len(),
                    APPROVAL_ENDPOINT
                ))
                .with_context(extracted);
            }
        }

        let scores: Vec<(Capability, f32)> = Capability::ALL
            .iter()
            .map(|c| (*c, score(text, *c)))
            .collect();
        debug!(?scores, "Intent scores");

        let selected: Vec<Capability> = scores
            .iter()
            .filter(|(_, s)| *s >= SELECT_THRESHOLD)
            .map(|(c, _)| *c)
            .collect();

        if !selected.is_empty() {
            let top = scores.iter().map(|(_, s)| *s).fold(0.0_f32, f32::max);
            let names: Vec<&str> = selected.iter().map(|c| c.as_str()).collect();
            return RouteDecision::agents(
                selected,
                format!("Keyword match: {}", names.join(", ")),
                0.5 + top / 4.0,
            )
            .with_context(extracted);
        }

        let follow_up = FOLLOW_UP_WORDS
            .iter()
            .any(|w| words.iter().any(|word| word == w));
        if follow_up && !previous_plan.is_empty() {
            return RouteDecision::agents(
                previous_plan.iter().copied(),
                "Follow-up to the previous turn",
                0.5,
            )
            .with_context(extracted);
        }

        RouteDecision::direct(GREETING).with_context(extracted)
    }
}
