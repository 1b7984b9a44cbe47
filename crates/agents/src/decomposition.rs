//! Epic decomposer agent.
//!
//! Turns an epic into a review-only [`DecompositionDraft`] of 3 to 12 items.
//! The agent holds read access to the tracker at most; publishing a draft
//! requires a human approval handled elsewhere.
//!
//! With a model configured the draft comes from the model's JSON answer.
//! Without one, or when the answer is unusable, the epic text is sliced
//! heuristically. Either way the result goes through [`normalize_draft`].

use crate::text::{bullet_list, extract_issue_keys, sentences, truncate};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use sprintmind_common::{
    default_item_type, Agent, AgentReport, AgentRequest, Capability, ConversationContext,
    DecompositionDraft, DraftItem, Result, Suggested, MAX_DRAFT_ITEMS, MIN_DRAFT_ITEMS,
};
use sprintmind_llm::{LlmClient, LlmRequest};
use sprintmind_tracker::format::adf_to_text;
use sprintmind_tracker::{TrackerErrorKind, TrackerRead};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

pub const EPIC_LABEL: &str = "Epic";
pub const ITEMS_LABEL: &str = "Proposed Items";
pub const ASSUMPTIONS_LABEL: &str = "Assumptions";
pub const RISKS_LABEL: &str = "Risks & Dependencies";
pub const REVIEW_LABEL: &str = "Review Required";

const EPIC_DECOMPOSER_PROMPT: &str = r#"You are SprintMind's Epic Decomposer. You turn an epic into a REVIEW-ONLY draft breakdown for product owners and tech leads. You never create or modify issues.

Objectives:
1. Convert the epic into 3-12 small, testable items (stories and/or subtasks).
2. Give acceptance criteria, a suggested estimate and a suggested owner for each item. Estimates and owners are suggestions, never authoritative.
3. Identify assumptions, dependencies, risks and non-functional needs.

Constraints:
- Follow INVEST. Split by value slices (workflow steps, API/UI surfaces, scenarios, integrations, qualities), not engineering to-do lists.
- Prefer "Story" items; use "Task" if the project has no Story type.
- If crucial information is missing, state it in assumptions and keep scope conservative.

Answer with a single JSON object:
{"items":[{"title":"","acceptance_criteria":[""],"suggested_estimate":"","suggested_owner":"","type":"Story"}],"assumptions":[""],"risks":[""],"dependencies":[""]}
"#;

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(.+)$").unwrap());

static CONJUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+and\s+|\s*,\s*").unwrap());

static COMMAND_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:please\s+)?(?:decompose|break\s+down|split)(?:\s+(?:the|this|an|our))?(?:\s+epic)?\s*(?:into\s+stories)?\s*[:\-]?\s*")
        .unwrap()
});

/// Keyword → risk sentence.
const RISK_KEYWORDS: &[(&[&str], &str)] = &[
    (
        &["integration", "integrate", "third-party", "third party", "external", "vendor"],
        "External integration may slip on partner availability or API limits",
    ),
    (
        &["migration", "migrate", "legacy"],
        "Data migration needs a rollback plan and a dry run",
    ),
    (
        &["performance", "latency", "scale", "throughput"],
        "Performance targets are not quantified yet",
    ),
    (
        &["security", "auth", "payment", "pii", "gdpr", "permission"],
        "Security or compliance review required before release",
    ),
];

const DEPENDENCY_PHRASES: &[&str] = &["depends on", "requires", "after", "blocked by"];

/// Non-functional slices used to pad thin epics.
const PADDING_SLICES: &[&str] = &[
    "Error handling and edge cases",
    "Monitoring and alerting",
    "Rollout plan behind a feature flag",
];

/// The epic as the agent understands it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpicInput {
    pub key: Option<String>,
    pub title: String,
    pub description: String,
    pub notes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ModelDraft {
    #[serde(default)]
    items: Vec<ModelItem>,
    #[serde(default)]
    assumptions: Vec<String>,
    #[serde(default)]
    risks: Vec<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ModelItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    acceptance_criteria: Vec<String>,
    #[serde(default, alias = "estimate")]
    suggested_estimate: Option<serde_json::Value>,
    #[serde(default, alias = "owner")]
    suggested_owner: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    item_type: Option<String>,
}

/// Epic decomposer agent.
pub struct EpicDecomposerAgent {
    tracker: Option<Arc<dyn TrackerRead>>,
    llm: Option<Arc<dyn LlmClient>>,
}

impl EpicDecomposerAgent {
    pub fn new() -> Self {
        Self {
            tracker: None,
            llm: None,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn TrackerRead>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_llm(mut self, llm: Option<Arc<dyn LlmClient>>) -> Self {
        self.llm = llm;
        self
    }

    async fn load_epic(&self, text: &str) -> Result<EpicInput> {
        let mut epic = epic_from_text(text);

        let (Some(key), Some(tracker)) = (epic.key.clone(), self.tracker.as_ref()) else {
            return Ok(epic);
        };

        match tracker.get_issue(&key).await {
            Ok(issue) => {
                epic.title = issue.fields.summary.clone();
                epic.description = issue
                    .fields
                    .description
                    .as_ref()
                    .map(adf_to_text)
                    .unwrap_or_default();
            }
            Err(e) if e.kind() == TrackerErrorKind::NotFound => {
                epic.notes.push(format!(
                    "Epic {} was not found; the breakdown is based on the request text only",
                    key
                ));
            }
            Err(e) => return Err(e.into()),
        }
        Ok(epic)
    }

    async fn model_draft(&self, llm: &dyn LlmClient, epic: &EpicInput) -> Option<ModelDraft> {
        let prompt = format!(
            "Epic{}: {}\n\nDescription:\n{}",
            epic.key.as_deref().map(|k| format!(" {}", k)).unwrap_or_default(),
            epic.title,
            if epic.description.is_empty() {
                "(none provided)"
            } else {
                epic.description.as_str()
            }
        );

        let response = match llm.complete(LlmRequest::prompt(EPIC_DECOMPOSER_PROMPT, prompt)).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Model call failed, using heuristic slicing");
                return None;
            }
        };

        match parse_model_draft(&response.content) {
            Some(draft) if !draft.items.is_empty() => Some(draft),
            _ => {
                warn!(model = llm.model_name(), "Model answer was not a usable draft");
                None
            }
        }
    }
}

impl Default for EpicDecomposerAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for EpicDecomposerAgent {
    fn id(&self) -> &str {
        "epic_decomposer"
    }

    fn name(&self) -> &str {
        "Epic Decomposer"
    }

    fn capability(&self) -> Capability {
        Capability::Decomposition
    }

    fn system_prompt(&self) -> &str {
        EPIC_DECOMPOSER_PROMPT
    }

    async fn run(&self, request: &AgentRequest) -> Result<AgentReport> {
        let epic = self.load_epic(&request.text).await?;
        info!(agent = %self.id(), epic = %epic.title, key = ?epic.key, "Decomposing epic");

        let model = match &self.llm {
            Some(llm) => self.model_draft(llm.as_ref(), &epic).await,
            None => None,
        };

        let mut extra_assumptions = epic.notes.clone();
        let (items, risks, dependencies) = match model {
            Some(model) => {
                debug!(items = model.items.len(), "Using model draft");
                extra_assumptions.extend(model.assumptions);
                let items = model
                    .items
                    .into_iter()
                    .map(|i| ProtoItem {
                        title: i.title,
                        acceptance_criteria: i.acceptance_criteria,
                        estimate: i.suggested_estimate.and_then(value_text),
                        owner: i.suggested_owner.and_then(value_text),
                        item_type: i.item_type,
                    })
                    .collect();
                (items, model.risks, model.dependencies)
            }
            None => {
                if self.llm.is_some() {
                    extra_assumptions
                        .push("Model output was unusable; items were sliced heuristically".into());
                }
                let items = slice_epic(&epic).into_iter().map(ProtoItem::from_slice).collect();
                (items, Vec::new(), Vec::new())
            }
        };

        let draft = normalize_draft(
            &epic,
            items,
            &request.context,
            extra_assumptions,
            risks,
            dependencies,
        );

        Ok(AgentReport::new(self.id(), self.name())
            .section(EPIC_LABEL, epic_section(&epic))
            .section(ITEMS_LABEL, items_section(&draft))
            .section(ASSUMPTIONS_LABEL, bullet_list(&draft.assumptions, "None"))
            .section(RISKS_LABEL, risks_section(&draft))
            .section(REVIEW_LABEL, review_section(&draft))
            .with_draft(draft))
    }
}

/// Pull the epic key, title and description out of the request itself.
pub fn epic_from_text(text: &str) -> EpicInput {
    let key = extract_issue_keys(text).into_iter().next();
    let stripped = COMMAND_WORDS.replace(text.trim(), "").to_string();

    let mut lines = stripped.lines();
    let first = lines.next().unwrap_or("").trim();
    let rest: String = lines.collect::<Vec<_>>().join("\n").trim().to_string();

    let (title, description) = if rest.is_empty() {
        // "Checkout revamp: cart, payment and receipts" style
        match first.split_once(':') {
            Some((t, d)) if !t.trim().is_empty() && !d.trim().is_empty() => {
                (t.trim().to_string(), d.trim().to_string())
            }
            _ => (first.to_string(), String::new()),
        }
    } else {
        (first.trim_end_matches(':').trim().to_string(), rest)
    };

    let title = match &key {
        Some(k) if title.trim() == k => String::new(),
        _ => title,
    };

    EpicInput {
        key,
        title,
        description,
        notes: Vec::new(),
    }
}

/// Value slices from the epic's description (or title).
pub fn slice_epic(epic: &EpicInput) -> Vec<String> {
    let source = if epic.description.trim().is_empty() {
        epic.title.as_str()
    } else {
        epic.description.as_str()
    };

    let bullets: Vec<String> = source
        .lines()
        .filter_map(|l| BULLET.captures(l))
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .collect();

    let mut slices = if bullets.is_empty() {
        sentences(source)
    } else {
        bullets
    };

    if slices.len() < MIN_DRAFT_ITEMS {
        slices = slices
            .iter()
            .flat_map(|s| CONJUNCTION.split(s).map(str::trim).map(str::to_string).collect::<Vec<_>>())
            .filter(|s| s.chars().count() >= 3)
            .collect();
    }

    let mut unique: Vec<String> = Vec::new();
    for slice in slices {
        let slice = capitalize(slice.trim_end_matches(['.', ';', ':']));
        if !unique.iter().any(|u| u.eq_ignore_ascii_case(&slice)) {
            unique.push(slice);
        }
    }
    unique
}

fn capitalize(s: &str) -> String {
    let mut chars = s.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// An item before normalization.
#[derive(Debug, Clone, Default)]
pub struct ProtoItem {
    pub title: String,
    pub acceptance_criteria: Vec<String>,
    pub estimate: Option<String>,
    pub owner: Option<String>,
    pub item_type: Option<String>,
}

impl ProtoItem {
    fn from_slice(title: String) -> Self {
        Self {
            title,
            ..Default::default()
        }
    }
}

/// The roster spelling of `wanted`, if it names a team member.
fn roster_member(roster: &[String], wanted: &str) -> Option<String> {
    let wanted = Suggested::new(wanted);
    roster
        .iter()
        .find(|member| member.trim().eq_ignore_ascii_case(wanted.value()))
        .cloned()
}

fn value_text(value: serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => return None,
        other => other.to_string(),
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn default_criteria(title: &str) -> Vec<String> {
    vec![
        format!("{} works end to end for the intended user", title),
        "Failures surface a clear message and leave data consistent".to_string(),
        "Covered by automated tests".to_string(),
    ]
}

/// Fibonacci-style estimate from the number of acceptance criteria.
fn heuristic_estimate(criteria: usize) -> &'static str {
    match criteria {
        0..=1 => "2 points",
        2 => "3 points",
        3 => "5 points",
        _ => "8 points",
    }
}

/// Enforce the draft invariants: 3-12 items, labeled suggestions, owners from
/// the roster, and explicit assumptions for anything that had to be guessed.
pub fn normalize_draft(
    epic: &EpicInput,
    items: Vec<ProtoItem>,
    context: &ConversationContext,
    mut assumptions: Vec<String>,
    risks: Vec<String>,
    dependencies: Vec<String>,
) -> DecompositionDraft {
    let epic_name = if epic.title.trim().is_empty() {
        epic.key.clone().unwrap_or_else(|| "the epic".to_string())
    } else {
        epic.title.clone()
    };

    let mut items: Vec<ProtoItem> = items
        .into_iter()
        .filter(|i| !i.title.trim().is_empty())
        .map(|mut i| {
            i.title = truncate(i.title.trim(), 120);
            i
        })
        .collect();
    let mut seen: Vec<String> = Vec::new();
    items.retain(|i| {
        let lower = i.title.to_lowercase();
        if seen.contains(&lower) {
            false
        } else {
            seen.push(lower);
            true
        }
    });

    if items.len() < MIN_DRAFT_ITEMS {
        let padded_from = items.len();
        for slice in PADDING_SLICES {
            if items.len() >= MIN_DRAFT_ITEMS {
                break;
            }
            items.push(ProtoItem::from_slice(format!("{} for {}", slice, epic_name)));
        }
        assumptions.push(format!(
            "The epic yielded {} distinct slice(s); non-functional items were added to reach {}",
            padded_from, MIN_DRAFT_ITEMS
        ));
    }

    if items.len() > MAX_DRAFT_ITEMS {
        let deferred: Vec<String> = items
            .drain(MAX_DRAFT_ITEMS..)
            .map(|i| i.title)
            .collect();
        assumptions.push(format!(
            "{} further slice(s) deferred to a follow-up breakdown: {}",
            deferred.len(),
            deferred.join("; ")
        ));
    }

    if epic.description.trim().is_empty() {
        assumptions.push("The epic has no description; scope was inferred from the title only".into());
    }

    let roster = &context.team_members;
    if roster.is_empty() {
        assumptions.push("Team roster unknown; owners are left unassigned".into());
    }

    if items.iter().any(|i| i.estimate.is_none()) {
        let points_known = context
            .metrics
            .as_ref()
            .map(|m| m.committed_points.is_some())
            .unwrap_or(false);
        if !points_known {
            assumptions.push(
                "No story point scale is known for this team; estimates use a 2-3-5-8 scale".into(),
            );
        }
    }

    if items.iter().any(|i| i.item_type.as_deref().map(str::trim).unwrap_or("").is_empty()) {
        assumptions.push(
            "Project issue types were not checked; items default to Story (use Task if Story is unavailable)"
                .into(),
        );
    }

    let items = items
        .into_iter()
        .enumerate()
        .map(|(n, proto)| {
            let acceptance_criteria = if proto.acceptance_criteria.iter().all(|c| c.trim().is_empty()) {
                default_criteria(&proto.title)
            } else {
                proto
                    .acceptance_criteria
                    .into_iter()
                    .filter(|c| !c.trim().is_empty())
                    .collect()
            };

            let estimate = proto
                .estimate
                .unwrap_or_else(|| heuristic_estimate(acceptance_criteria.len()).to_string());

            let owner = if roster.is_empty() {
                "unassigned".to_string()
            } else {
                proto
                    .owner
                    .as_deref()
                    .and_then(|wanted| roster_member(roster, wanted))
                    .unwrap_or_else(|| roster[n % roster.len()].clone())
            };

            DraftItem {
                title: proto.title,
                acceptance_criteria,
                suggested_estimate: Suggested::new(estimate),
                suggested_owner: Suggested::new(owner),
                item_type: proto
                    .item_type
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(default_item_type),
            }
        })
        .collect();

    let epic_text = format!("{}\n{}", epic.title, epic.description);
    let mut all_risks = risks;
    for risk in detect_risks(&epic_text) {
        push_unique(&mut all_risks, risk);
    }
    let mut all_dependencies = dependencies;
    for dependency in detect_dependencies(&epic_text, epic.key.as_deref()) {
        push_unique(&mut all_dependencies, dependency);
    }

    DecompositionDraft {
        epic_key: epic.key.clone(),
        epic_title: epic_name,
        items,
        assumptions,
        risks: all_risks,
        dependencies: all_dependencies,
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    let value = value.trim().to_string();
    if !value.is_empty() && !list.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
        list.push(value);
    }
}

pub fn detect_risks(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    RISK_KEYWORDS
        .iter()
        .filter(|(words, _)| words.iter().any(|w| lower.contains(w)))
        .map(|(_, risk)| risk.to_string())
        .collect()
}

pub fn detect_dependencies(text: &str, epic_key: Option<&str>) -> Vec<String> {
    let mut deps: Vec<String> = sentences(text)
        .into_iter()
        .filter(|s| {
            let lower = format!(" {} ", s.to_lowercase());
            DEPENDENCY_PHRASES
                .iter()
                .any(|p| lower.contains(&format!(" {} ", p)))
        })
        .collect();

    for key in extract_issue_keys(text) {
        if Some(key.as_str()) != epic_key {
            deps.push(format!("Linked issue {}", key));
        }
    }
    deps
}

/// Accepts bare JSON or JSON wrapped in prose or a code fence.
fn parse_model_draft(content: &str) -> Option<ModelDraft> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

fn epic_section(epic: &EpicInput) -> String {
    let heading = match (&epic.key, epic.title.is_empty()) {
        (Some(key), false) => format!("{}: {}", key, epic.title),
        (Some(key), true) => key.clone(),
        (None, _) => epic.title.clone(),
    };
    let description = if epic.description.trim().is_empty() {
        "(no description)".to_string()
    } else {
        truncate(epic.description.trim(), 400)
    };
    format!("{}\n{}", heading, description)
}

fn items_section(draft: &DecompositionDraft) -> String {
    draft
        .items
        .iter()
        .enumerate()
        .map(|(n, item)| {
            let criteria = item
                .acceptance_criteria
                .iter()
                .map(|c| format!("   - {}", c))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "{}. [{}] {}\n   Acceptance criteria:\n{}\n   Estimate ({}) | Owner ({})",
                n + 1,
                item.item_type,
                item.title,
                criteria,
                item.suggested_estimate,
                item.suggested_owner
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn risks_section(draft: &DecompositionDraft) -> String {
    format!(
        "Risks:\n{}\nDependencies:\n{}",
        bullet_list(&draft.risks, "- None identified"),
        bullet_list(&draft.dependencies, "- None identified")
    )
}

fn review_section(draft: &DecompositionDraft) -> String {
    format!(
        "This is a review-only draft. Nothing was written to the tracker. \
         Approve it to create {} issue(s).",
        draft.items.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epic_from_text_with_colon() {
        let epic = epic_from_text("Decompose epic: Checkout revamp: cart, payment and receipts");
        assert_eq!(epic.title, "Checkout revamp");
        assert_eq!(epic.description, "cart, payment and receipts");
        assert!(epic.key.is_none());
    }

    #[test]
    fn test_epic_from_text_with_key_only() {
        let epic = epic_from_text("break down PROJ-12");
        assert_eq!(epic.key.as_deref(), Some("PROJ-12"));
        assert!(epic.title.is_empty());
    }

    #[test]
    fn test_slice_bullets() {
        let epic = EpicInput {
            title: "Onboarding".into(),
            description: "Goals:\n- Sign up with email\n- Verify email\n2) Pick a plan\n* Invite team".into(),
            ..Default::default()
        };
        assert_eq!(
            slice_epic(&epic),
            vec!["Sign up with email", "Verify email", "Pick a plan", "Invite team"]
        );
    }

    #[test]
    fn test_slice_conjunctions_when_thin() {
        let epic = EpicInput {
            title: "Checkout".into(),
            description: "cart, payment and receipts".into(),
            ..Default::default()
        };
        assert_eq!(slice_epic(&epic), vec!["Cart", "Payment", "Receipts"]);
    }

    #[test]
    fn test_normalize_pads_and_records_assumptions() {
        let epic = EpicInput {
            title: "Dark mode".into(),
            ..Default::default()
        };
        let draft = normalize_draft(
            &epic,
            vec![ProtoItem::from_slice("Dark mode".into())],
            &ConversationContext::default(),
            vec![],
            vec![],
            vec![],
        );

        assert_eq!(draft.items.len(), 3);
        assert_eq!(draft.items[1].title, "Error handling and edge cases for Dark mode");
        assert!(draft
            .items
            .iter()
            .all(|i| i.suggested_owner.to_string() == "Suggested: unassigned"));
        assert!(draft.assumptions.iter().any(|a| a.contains("no description")));
        assert!(draft.assumptions.iter().any(|a| a.contains("roster unknown")));
        assert!(draft.assumptions.iter().any(|a| a.contains("story point scale")));
        assert!(draft.assumptions.iter().any(|a| a.contains("default to Story")));
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_normalize_truncates_and_round_robins_owners() {
        let epic = EpicInput {
            title: "Big epic".into(),
            description: "lots".into(),
            ..Default::default()
        };
        let items = (1..=15)
            .map(|n| ProtoItem::from_slice(format!("Slice {}", n)))
            .collect();
        let context = ConversationContext {
            team_members: vec!["Ana".into(), "Ben".into()],
            ..Default::default()
        };

        let draft = normalize_draft(&epic, items, &context, vec![], vec![], vec![]);
        assert_eq!(draft.items.len(), MAX_DRAFT_ITEMS);
        assert_eq!(draft.items[0].suggested_owner.value(), "Ana");
        assert_eq!(draft.items[1].suggested_owner.value(), "Ben");
        assert_eq!(draft.items[2].suggested_owner.value(), "Ana");
        assert!(draft
            .assumptions
            .iter()
            .any(|a| a.starts_with("3 further slice(s) deferred")));
    }

    #[test]
    fn test_model_owner_kept_only_when_on_roster() {
        let epic = EpicInput {
            title: "Search".into(),
            description: "Find things".into(),
            ..Default::default()
        };
        let proto = |title: &str, owner: Option<&str>| ProtoItem {
            title: title.into(),
            owner: owner.map(String::from),
            ..Default::default()
        };
        let items = vec![
            proto("Index documents", Some("Suggested: ben")),
            proto("Query API", Some("Zoe")),
            proto("Results page", None),
        ];
        let context = ConversationContext {
            team_members: vec!["Ana".into(), "Ben".into()],
            ..Default::default()
        };

        let draft = normalize_draft(&epic, items, &context, vec![], vec![], vec![]);
        let owners: Vec<&str> = draft.items.iter().map(|i| i.suggested_owner.value()).collect();
        assert_eq!(owners, vec!["Ben", "Ben", "Ana"]);
    }

    #[test]
    fn test_model_labels_are_not_doubled() {
        let epic = EpicInput {
            title: "Search".into(),
            description: "Find things".into(),
            ..Default::default()
        };
        let items = vec![ProtoItem {
            title: "Index documents".into(),
            acceptance_criteria: vec!["Indexed within 1 min".into()],
            estimate: Some("Suggested: 5 points".into()),
            owner: None,
            item_type: Some("Task".into()),
        }];
        let draft = normalize_draft(&epic, items, &ConversationContext::default(), vec![], vec![], vec![]);
        assert_eq!(draft.items[0].suggested_estimate.to_string(), "Suggested: 5 points");
        assert_eq!(draft.items[0].item_type, "Task");
    }

    #[test]
    fn test_detect_risks_and_dependencies() {
        let text = "Integrate the payment vendor. This depends on the new auth service. See OPS-4.";
        let risks = detect_risks(text);
        assert_eq!(risks.len(), 2);
        let deps = detect_dependencies(text, Some("PROJ-1"));
        assert_eq!(
            deps,
            vec!["This depends on the new auth service", "Linked issue OPS-4"]
        );
    }

    #[test]
    fn test_parse_model_draft_in_fence() {
        let content = "Here you go:\n```json\n{\"items\":[{\"title\":\"A\",\"estimate\":3}],\"risks\":[\"r\"]}\n```";
        let draft = parse_model_draft(content).unwrap();
        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].title, "A");
        assert_eq!(
            draft.items[0].suggested_estimate.clone().and_then(value_text).as_deref(),
            Some("3")
        );
        assert!(parse_model_draft("no json here").is_none());
    }
}
