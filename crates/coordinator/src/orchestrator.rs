//! The orchestrator: classify, route, merge, respond.

use crate::config::SprintMindConfig;
use crate::routing::{AgentRoute, IntentKind, RouteDecision};
use crate::session::{SessionKey, SessionStore, TurnRecord};
use crate::triage::IntentClassifier;
use serde::Serialize;
use sprintmind_agents::{
    EpicDecomposerAgent, KnowledgeExtractorAgent, SequentialWorkflow, SprintManagerAgent,
};
use sprintmind_common::{
    Agent, AgentRequest, Capability, ConversationContext, DecompositionDraft, Result,
    SprintMindError,
};
use sprintmind_knowledge::{embedder_from_config, KnowledgeIndex};
use sprintmind_llm::build_llm_client;
use sprintmind_tracker::TrackerRead;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument, Span};

/// Label of the single section an agent gets when it fails.
pub const ERROR_LABEL: &str = "Error";

/// Where a turn is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorPhase {
    Idle,
    Classifying,
    Routing,
    Merging,
    Responding,
}

impl OrchestratorPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorPhase::Idle => "idle",
            OrchestratorPhase::Classifying => "classifying",
            OrchestratorPhase::Routing => "routing",
            OrchestratorPhase::Merging => "merging",
            OrchestratorPhase::Responding => "responding",
        }
    }

    /// Direct replies go straight from Classifying to Responding.
    pub fn can_advance_to(self, next: OrchestratorPhase) -> bool {
        use OrchestratorPhase::*;
        matches!(
            (self, next),
            (Idle, Classifying)
                | (Classifying, Routing)
                | (Classifying, Responding)
                | (Routing, Merging)
                | (Merging, Responding)
                | (Responding, Idle)
        )
    }
}

impl fmt::Display for OrchestratorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records phase changes on the turn's span.
struct PhaseTracker {
    span: Span,
    phase: OrchestratorPhase,
    history: Vec<OrchestratorPhase>,
}

impl PhaseTracker {
    fn new(span: Span) -> Self {
        Self {
            span,
            phase: OrchestratorPhase::Idle,
            history: vec![OrchestratorPhase::Idle],
        }
    }

    fn advance(&mut self, next: OrchestratorPhase) {
        if !self.phase.can_advance_to(next) {
            warn!(from = %self.phase, to = %next, "Unexpected phase transition");
        }
        self.phase = next;
        self.history.push(next);
        self.span.record("phase", next.as_str());
        debug!(phase = %next, "Phase");
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentSection {
    pub agent_id: String,
    pub agent_name: String,
    pub label: String,
    pub body: String,
}

/// The merged answer to one turn.
#[derive(Debug, Clone, Serialize)]
pub struct MergedResponse {
    pub intent: Option<IntentKind>,
    pub plan: Vec<Capability>,
    /// Set for replies that did not invoke any agent
    pub direct: Option<String>,
    pub sections: Vec<AgentSection>,
    /// Draft produced this turn, now pending approval in the session
    pub draft: Option<DecompositionDraft>,
    pub phases: Vec<OrchestratorPhase>,
}

impl MergedResponse {
    fn direct(text: String) -> Self {
        Self {
            intent: None,
            plan: Vec::new(),
            direct: Some(text),
            sections: Vec::new(),
            draft: None,
            phases: Vec::new(),
        }
    }

    /// Markdown: `## Agent` headings, then `*label*` and body per section.
    pub fn render(&self) -> String {
        if let Some(text) = &self.direct {
            return text.clone();
        }
        self.by_agent()
            .into_iter()
            .map(|(_, name, body)| format!("## {}\n\n{}", name, body))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// `(agent_id, agent_name, rendered sections)` per agent, in plan order.
    pub fn by_agent(&self) -> Vec<(String, String, String)> {
        let mut grouped: Vec<(String, String, Vec<String>)> = Vec::new();
        for section in &self.sections {
            let block = format!("*{}*\n{}", section.label, section.body);
            match grouped.last_mut() {
                Some((id, _, blocks)) if *id == section.agent_id => blocks.push(block),
                _ => grouped.push((
                    section.agent_id.clone(),
                    section.agent_name.clone(),
                    vec![block],
                )),
            }
        }
        grouped
            .into_iter()
            .map(|(id, name, blocks)| (id, name, blocks.join("\n\n")))
            .collect()
    }
}

/// Classifies each turn, runs the planned agents and merges their output.
pub struct Orchestrator {
    agents: HashMap<Capability, Arc<dyn Agent>>,
    classifier: IntentClassifier,
    sessions: Arc<SessionStore>,
}

impl Orchestrator {
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self {
            agents: HashMap::new(),
            classifier: IntentClassifier::new(),
            sessions,
        }
    }

    /// Register an agent for its capability, replacing any previous one.
    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.insert(agent.capability(), agent);
        self
    }

    /// Wire the three capability agents from configuration.
    pub fn from_config(
        config: &SprintMindConfig,
        tracker: Arc<dyn TrackerRead>,
        sessions: Arc<SessionStore>,
    ) -> Result<Self> {
        let llm = build_llm_client(&config.llm)?;
        let embedder = embedder_from_config(&config.knowledge)?;

        let reporting = SprintManagerAgent::new(tracker.clone())
            .with_default_board(config.tracker.default_board_id);
        let retrieval = KnowledgeExtractorAgent::new(
            tracker.clone(),
            KnowledgeIndex::new(embedder),
            config.knowledge.clone(),
        );
        let decomposition = EpicDecomposerAgent::new()
            .with_tracker(tracker)
            .with_llm(llm);

        info!(
            llm = config.llm.is_enabled(),
            embedding_model = %config.knowledge.embedding_model,
            "Orchestrator configured"
        );

        Ok(Self::new(sessions)
            .with_agent(Arc::new(reporting))
            .with_agent(Arc::new(retrieval))
            .with_agent(Arc::new(decomposition)))
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn agent(&self, capability: Capability) -> Option<&Arc<dyn Agent>> {
        self.agents.get(&capability)
    }

    pub fn classify(
        &self,
        text: &str,
        context: &ConversationContext,
        previous_plan: &[Capability],
    ) -> RouteDecision {
        self.classifier.classify(text, context, previous_plan)
    }

    /// Handle one user turn in an existing session.
    pub async fn handle(&self, key: &SessionKey, text: &str) -> Result<MergedResponse> {
        let span = info_span!("turn", session = %key, phase = tracing::field::Empty);
        self.handle_turn(key, text, span.clone()).instrument(span).await
    }

    async fn handle_turn(&self, key: &SessionKey, text: &str, span: Span) -> Result<MergedResponse> {
        let mut phases = PhaseTracker::new(span);

        let session = self
            .sessions
            .get(key)
            .await
            .ok_or_else(|| SprintMindError::Session(format!("Session not found: {}", key)))?;

        phases.advance(OrchestratorPhase::Classifying);
        let decision = self.classify(text, &session.context, &session.last_plan);
        info!(
            route = ?decision.route,
            confidence = decision.confidence,
            reasoning = %decision.reasoning,
            "Classified request"
        );

        let mut updates = vec![decision.extracted_context.clone()];
        let mut context = session.context;
        context.apply(decision.extracted_context.clone());

        let plan = match decision.route {
            AgentRoute::Direct { response } => {
                phases.advance(OrchestratorPhase::Responding);
                let turn = TurnRecord {
                    updates,
                    ..Default::default()
                };
                self.sessions.update_context(key, turn).await?;
                phases.advance(OrchestratorPhase::Idle);
                let mut merged = MergedResponse::direct(response);
                merged.phases = phases.history;
                return Ok(merged);
            }
            AgentRoute::Agents { plan } => plan,
        };

        phases.advance(OrchestratorPhase::Routing);
        let mut workflow = SequentialWorkflow::new(format!("turn-{}", key.session_id))
            .continue_on_error(true);
        let mut missing = Vec::new();
        for capability in &plan {
            match self.agents.get(capability) {
                Some(agent) => workflow = workflow.add_agent(agent.clone()),
                None => missing.push(*capability),
            }
        }

        let result = workflow
            .run(AgentRequest::new(text).with_context(context))
            .await;

        phases.advance(OrchestratorPhase::Merging);
        let mut sections = Vec::new();
        let mut draft = None;
        let mut steps = result.step_results.iter();

        for capability in &plan {
            if missing.contains(capability) {
                warn!(capability = %capability, "No agent registered");
                sections.push(AgentSection {
                    agent_id: capability.as_str().to_string(),
                    agent_name: capability.as_str().to_string(),
                    label: ERROR_LABEL.to_string(),
                    body: format!("No agent is configured for {}.", capability),
                });
                continue;
            }
            let Some(step) = steps.next() else {
                break;
            };
            match &step.outcome {
                Ok(report) => {
                    sections.extend(report.sections.iter().map(|s| AgentSection {
                        agent_id: step.agent_id.clone(),
                        agent_name: step.agent_name.clone(),
                        label: s.label.clone(),
                        body: s.body.clone(),
                    }));
                    updates.push(report.context_update.clone());
                    if report.draft.is_some() {
                        draft = report.draft.clone();
                    }
                }
                Err(message) => sections.push(AgentSection {
                    agent_id: step.agent_id.clone(),
                    agent_name: step.agent_name.clone(),
                    label: ERROR_LABEL.to_string(),
                    body: format!("{} failed: {}", step.agent_name, message),
                }),
            }
        }

        phases.advance(OrchestratorPhase::Responding);
        let turn = TurnRecord {
            updates,
            draft: draft.clone(),
            plan: plan.clone(),
        };
        self.sessions.update_context(key, turn).await?;

        debug!(
            sections = sections.len(),
            duration_ms = result.duration_ms,
            "Merged agent output"
        );
        phases.advance(OrchestratorPhase::Idle);

        Ok(MergedResponse {
            intent: IntentKind::from_plan(&plan),
            plan,
            direct: None,
            sections,
            draft,
            phases: phases.history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(agent: &str, label: &str, body: &str) -> AgentSection {
        AgentSection {
            agent_id: agent.to_lowercase(),
            agent_name: agent.into(),
            label: label.into(),
            body: body.into(),
        }
    }

    #[test]
    fn test_render_groups_by_agent() {
        let merged = MergedResponse {
            intent: Some(IntentKind::Composite),
            plan: vec![Capability::Reporting, Capability::Retrieval],
            direct: None,
            sections: vec![
                section("Sprint Manager", "Risk Alerts", "- PROJ-3 is blocked"),
                section("Sprint Manager", "Suggested Actions", "- Unblock PROJ-3"),
                section("Knowledge Extractor", "Answer Summary", "Found 1"),
            ],
            draft: None,
            phases: vec![],
        };

        assert_eq!(
            merged.render(),
            "## Sprint Manager\n\n*Risk Alerts*\n- PROJ-3 is blocked\n\n*Suggested Actions*\n- Unblock PROJ-3\n\n\
             ## Knowledge Extractor\n\n*Answer Summary*\nFound 1"
        );
        assert_eq!(merged.by_agent().len(), 2);
    }

    #[test]
    fn test_direct_renders_verbatim() {
        assert_eq!(MergedResponse::direct("Hi".into()).render(), "Hi");
    }

    #[test]
    fn test_phase_transitions() {
        use OrchestratorPhase::*;
        assert!(Idle.can_advance_to(Classifying));
        assert!(Classifying.can_advance_to(Responding));
        assert!(Merging.can_advance_to(Responding));
        assert!(!Idle.can_advance_to(Merging));
        assert!(!Responding.can_advance_to(Routing));
    }
}
