//! Integration tests for the orchestrator's classify, route and merge pipeline.
//!
//! Agents are scripted stand-ins so no tracker or model is needed.

use async_trait::async_trait;
use sprintmind_common::{
    Agent, AgentReport, AgentRequest, Capability, ContextUpdate, ConversationContext,
    DecompositionDraft, DraftItem, Result, SprintMindError, Suggested,
};
use sprintmind_coordinator::{
    IntentKind, Orchestrator, OrchestratorPhase, SessionKey, SessionStore, ERROR_LABEL,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct ScriptedAgent {
    id: &'static str,
    name: &'static str,
    capability: Capability,
    labels: Vec<&'static str>,
    update: ContextUpdate,
    draft: Option<DecompositionDraft>,
    fail: bool,
    delay: Option<Duration>,
    seen: Mutex<Vec<ConversationContext>>,
}

impl ScriptedAgent {
    fn new(capability: Capability) -> Self {
        let (id, name, labels) = match capability {
            Capability::Reporting => (
                "sprint_manager",
                "Sprint Manager",
                vec!["Daily Standup Summary", "Risk Alerts", "Sprint Health Insights", "Suggested Actions"],
            ),
            Capability::Retrieval => (
                "knowledge_extractor",
                "Knowledge Extractor",
                vec!["Answer Summary", "Relevant References"],
            ),
            Capability::Decomposition => (
                "epic_decomposer",
                "Epic Decomposer",
                vec!["Epic", "Proposed Items", "Assumptions", "Risks & Dependencies", "Review Required"],
            ),
        };
        Self {
            id,
            name,
            capability,
            labels,
            update: ContextUpdate::default(),
            draft: None,
            fail: false,
            delay: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn with_update(mut self, update: ContextUpdate) -> Self {
        self.update = update;
        self
    }

    fn with_draft(mut self, draft: DecompositionDraft) -> Self {
        self.draft = Some(draft);
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn last_seen(&self) -> ConversationContext {
        self.seen.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn id(&self) -> &str {
        self.id
    }

    fn name(&self) -> &str {
        self.name
    }

    fn capability(&self) -> Capability {
        self.capability
    }

    fn system_prompt(&self) -> &str {
        "scripted"
    }

    async fn run(&self, request: &AgentRequest) -> Result<AgentReport> {
        self.seen.lock().unwrap().push(request.context.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(SprintMindError::Tracker("get_sprints: HTTP 503: down".into()));
        }
        let mut report = AgentReport::new(self.id, self.name);
        for label in &self.labels {
            report = report.section(*label, format!("{} body", label));
        }
        report = report.with_context_update(self.update.clone());
        if let Some(draft) = &self.draft {
            report = report.with_draft(draft.clone());
        }
        Ok(report)
    }
}

fn draft() -> DecompositionDraft {
    let item = |t: &str| DraftItem {
        title: t.into(),
        acceptance_criteria: vec!["works".into()],
        suggested_estimate: Suggested::new("3 points"),
        suggested_owner: Suggested::new("Ana"),
        item_type: "Story".into(),
    };
    DecompositionDraft {
        epic_key: Some("PROJ-9".into()),
        epic_title: "Guest checkout".into(),
        items: vec![item("Pay as guest"), item("Email receipt"), item("Guest order lookup")],
        assumptions: vec!["Team roster from sprint 42".into()],
        risks: vec![],
        dependencies: vec![],
    }
}

struct Harness {
    orchestrator: Orchestrator,
    reporting: Arc<ScriptedAgent>,
    retrieval: Arc<ScriptedAgent>,
    decomposition: Arc<ScriptedAgent>,
}

fn harness(reporting: ScriptedAgent) -> Harness {
    let reporting = Arc::new(reporting);
    let retrieval = Arc::new(ScriptedAgent::new(Capability::Retrieval));
    let decomposition =
        Arc::new(ScriptedAgent::new(Capability::Decomposition).with_draft(draft()));

    let orchestrator = Orchestrator::new(Arc::new(SessionStore::new(Duration::from_secs(60))))
        .with_agent(reporting.clone())
        .with_agent(retrieval.clone())
        .with_agent(decomposition.clone());

    Harness {
        orchestrator,
        reporting,
        retrieval,
        decomposition,
    }
}

fn roster_update() -> ContextUpdate {
    ContextUpdate {
        sprint_id: Some(42),
        team_members: vec!["Ana".into(), "Bo".into()],
        ..Default::default()
    }
}

async fn session(orchestrator: &Orchestrator) -> SessionKey {
    let key = SessionKey::new("sprintmind", "U1", "s1");
    orchestrator.sessions().create(key.clone(), None).await;
    key
}

// ============================================================================
// Routing and merge
// ============================================================================

#[tokio::test]
async fn test_composite_turn_merges_in_fixed_order() {
    let h = harness(ScriptedAgent::new(Capability::Reporting).with_update(roster_update()));
    let key = session(&h.orchestrator).await;

    let merged = h
        .orchestrator
        .handle(&key, "Break down epic PROJ-9 and tell me what's blocked in the sprint")
        .await
        .unwrap();

    assert_eq!(merged.intent, Some(IntentKind::Composite));
    assert_eq!(
        merged.plan,
        vec![Capability::Reporting, Capability::Decomposition]
    );

    let names: Vec<&str> = merged.sections.iter().map(|s| s.agent_name.as_str()).collect();
    assert_eq!(names.len(), 4 + 5);
    assert!(names[..4].iter().all(|n| *n == "Sprint Manager"));
    assert!(names[4..].iter().all(|n| *n == "Epic Decomposer"));

    // Every label exactly once.
    let mut labels: Vec<&str> = merged.sections.iter().map(|s| s.label.as_str()).collect();
    labels.sort();
    labels.dedup();
    assert_eq!(labels.len(), 9);

    // Decomposition saw the roster produced by reporting on the same turn.
    assert_eq!(h.decomposition.last_seen().team_members, vec!["Ana", "Bo"]);
    assert!(h.retrieval.seen.lock().unwrap().is_empty());

    let rendered = merged.render();
    let sprint_at = rendered.find("## Sprint Manager").unwrap();
    let epic_at = rendered.find("## Epic Decomposer").unwrap();
    assert!(sprint_at < epic_at);

    assert_eq!(
        merged.phases,
        vec![
            OrchestratorPhase::Idle,
            OrchestratorPhase::Classifying,
            OrchestratorPhase::Routing,
            OrchestratorPhase::Merging,
            OrchestratorPhase::Responding,
            OrchestratorPhase::Idle,
        ]
    );
}

#[tokio::test]
async fn test_same_intents_same_order_every_time() {
    let h = harness(ScriptedAgent::new(Capability::Reporting));
    let key = session(&h.orchestrator).await;

    let a = h
        .orchestrator
        .handle(&key, "search history for similar sprint risk and decompose the epic")
        .await
        .unwrap();
    let b = h
        .orchestrator
        .handle(&key, "decompose the epic, sprint risk, search history for similar")
        .await
        .unwrap();

    let labels = |m: &sprintmind_coordinator::MergedResponse| {
        m.sections
            .iter()
            .map(|s| format!("{}/{}", s.agent_id, s.label))
            .collect::<Vec<_>>()
    };
    assert_eq!(a.plan, vec![Capability::Reporting, Capability::Retrieval, Capability::Decomposition]);
    assert_eq!(labels(&a), labels(&b));
}

#[tokio::test]
async fn test_failing_agent_becomes_error_section() {
    let h = harness(ScriptedAgent::new(Capability::Reporting).failing());
    let key = session(&h.orchestrator).await;

    let merged = h
        .orchestrator
        .handle(&key, "sprint risks? and have we seen this before in history?")
        .await
        .unwrap();

    assert_eq!(merged.sections[0].label, ERROR_LABEL);
    assert_eq!(merged.sections[0].agent_name, "Sprint Manager");
    assert!(merged.sections[0].body.contains("HTTP 503"));
    assert_eq!(
        merged
            .sections
            .iter()
            .filter(|s| s.label == ERROR_LABEL)
            .count(),
        1
    );
    assert_eq!(merged.sections[1].agent_name, "Knowledge Extractor");
}

#[tokio::test]
async fn test_missing_agent_is_reported() {
    let orchestrator = Orchestrator::new(Arc::new(SessionStore::new(Duration::from_secs(60))))
        .with_agent(Arc::new(ScriptedAgent::new(Capability::Retrieval)));
    let key = session(&orchestrator).await;

    let merged = orchestrator
        .handle(&key, "break down the epic")
        .await
        .unwrap();

    assert_eq!(merged.sections.len(), 1);
    assert_eq!(merged.sections[0].label, ERROR_LABEL);
    assert!(merged.sections[0].body.contains("decomposition"));
}

// ============================================================================
// Sessions and context
// ============================================================================

#[tokio::test]
async fn test_context_persists_across_turns() {
    let h = harness(ScriptedAgent::new(Capability::Reporting).with_update(roster_update()));
    let key = session(&h.orchestrator).await;

    h.orchestrator
        .handle(&key, "standup for board 7 please")
        .await
        .unwrap();

    // Second turn mentions neither sprint nor board.
    h.orchestrator
        .handle(&key, "has this happened before?")
        .await
        .unwrap();

    let seen = h.retrieval.last_seen();
    assert_eq!(seen.sprint_id, Some(42));
    assert_eq!(seen.board_id, Some(7));
    assert_eq!(seen.team_members, vec!["Ana", "Bo"]);
    assert_eq!(h.reporting.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_follow_up_reuses_previous_plan() {
    let h = harness(ScriptedAgent::new(Capability::Reporting));
    let key = session(&h.orchestrator).await;

    h.orchestrator
        .handle(&key, "any similar incidents in the history?")
        .await
        .unwrap();
    let merged = h
        .orchestrator
        .handle(&key, "and what about that one?")
        .await
        .unwrap();

    assert_eq!(merged.plan, vec![Capability::Retrieval]);
    assert_eq!(h.retrieval.seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_draft_pending_then_approval_is_direct() {
    let h = harness(ScriptedAgent::new(Capability::Reporting));
    let key = session(&h.orchestrator).await;

    let merged = h
        .orchestrator
        .handle(&key, "decompose epic PROJ-9")
        .await
        .unwrap();
    assert!(merged.draft.is_some());

    let session = h.orchestrator.sessions().get(&key).await.unwrap();
    assert_eq!(session.context.pending_draft.as_ref().unwrap().items.len(), 3);

    let reply = h
        .orchestrator
        .handle(&key, "looks good, approve it")
        .await
        .unwrap();
    assert!(reply.sections.is_empty());
    assert!(reply.render().contains("/api/v1/drafts/approve"));
    assert_eq!(
        reply.phases,
        vec![
            OrchestratorPhase::Idle,
            OrchestratorPhase::Classifying,
            OrchestratorPhase::Responding,
            OrchestratorPhase::Idle,
        ]
    );

    // Chat never publishes: the draft is still pending.
    assert!(h
        .orchestrator
        .sessions()
        .take_pending_draft(&key)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_approval_during_turn_is_not_undone() {
    let h = harness(
        ScriptedAgent::new(Capability::Reporting)
            .with_update(roster_update())
            .slow(Duration::from_millis(300)),
    );
    let key = session(&h.orchestrator).await;

    h.orchestrator
        .handle(&key, "decompose epic PROJ-9")
        .await
        .unwrap();

    let sessions = h.orchestrator.sessions();
    let approve_mid_turn = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let delta = serde_json::json!({"tone": "brief"});
        sessions
            .apply_state_delta(&key, delta.as_object().unwrap())
            .await
            .unwrap();
        sessions.take_pending_draft(&key).await.unwrap()
    };
    let (turn, taken) = tokio::join!(
        h.orchestrator
            .handle(&key, "What's blocked in the current sprint?"),
        approve_mid_turn
    );
    assert_eq!(turn.unwrap().plan, vec![Capability::Reporting]);
    assert!(taken.is_some());

    // The turn keeps its own changes and everything written meanwhile.
    assert!(sessions.take_pending_draft(&key).await.unwrap().is_none());
    let session = sessions.get(&key).await.unwrap();
    assert_eq!(session.context.sprint_id, Some(42));
    assert_eq!(session.context.team_members, vec!["Ana", "Bo"]);
    assert_eq!(session.context.state["tone"], serde_json::json!("brief"));
    assert_eq!(session.last_plan, vec![Capability::Reporting]);
}

#[tokio::test]
async fn test_greeting_and_unknown_session() {
    let h = harness(ScriptedAgent::new(Capability::Reporting));
    let key = session(&h.orchestrator).await;

    let reply = h.orchestrator.handle(&key, "hello!").await.unwrap();
    assert!(reply.render().starts_with("Hi, I'm SprintMind"));
    assert_eq!(reply.intent, None);

    let missing = SessionKey::new("sprintmind", "U2", "nope");
    assert!(matches!(
        h.orchestrator.handle(&missing, "sprint status").await,
        Err(SprintMindError::Session(_))
    ));
}
