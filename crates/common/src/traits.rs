//! Core agent traits and capabilities.
//!
//! These traits are defined in `sprintmind-common` so that both the
//! coordinator and agent crates can reference them without circular
//! dependencies.

use crate::{ContextUpdate, ConversationContext, DecompositionDraft, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of things an agent can do for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Sprint status, risks and health
    Reporting,
    /// Epic to child-item breakdown (review only)
    Decomposition,
    /// Historical knowledge lookup
    Retrieval,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::Reporting,
        Capability::Decomposition,
        Capability::Retrieval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Reporting => "reporting",
            Capability::Decomposition => "decomposition",
            Capability::Retrieval => "retrieval",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an agent is asked to do.
#[derive(Debug, Clone, Default)]
pub struct AgentRequest {
    /// The user's text for this turn
    pub text: String,

    /// Session context as of this agent's invocation
    pub context: ConversationContext,
}

impl AgentRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: ConversationContext::default(),
        }
    }

    pub fn with_context(mut self, context: ConversationContext) -> Self {
        self.context = context;
        self
    }
}

/// A labeled block of agent output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub label: String,
    pub body: String,
}

impl ReportSection {
    pub fn new(label: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            body: body.into(),
        }
    }
}

/// Everything an agent hands back to the orchestrator.
#[derive(Debug, Clone)]
pub struct AgentReport {
    pub agent_id: String,
    pub agent_name: String,
    pub sections: Vec<ReportSection>,
    pub context_update: ContextUpdate,

    /// Only the decomposition agent fills this in
    pub draft: Option<DecompositionDraft>,
}

impl AgentReport {
    pub fn new(agent_id: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            sections: Vec::new(),
            context_update: ContextUpdate::default(),
            draft: None,
        }
    }

    pub fn section(mut self, label: impl Into<String>, body: impl Into<String>) -> Self {
        self.sections.push(ReportSection::new(label, body));
        self
    }

    pub fn with_context_update(mut self, update: ContextUpdate) -> Self {
        self.context_update = update;
        self
    }

    pub fn with_draft(mut self, draft: DecompositionDraft) -> Self {
        self.draft = Some(draft);
        self
    }

    /// Plain-text rendering of all sections.
    pub fn to_text(&self) -> String {
        self.sections
            .iter()
            .map(|s| format!("*{}*\n{}", s.label, s.body))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// The core agent trait that all capability agents implement.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Get the agent's unique identifier.
    fn id(&self) -> &str;

    /// Get the agent's human-readable name.
    fn name(&self) -> &str;

    /// The capability this agent serves.
    fn capability(&self) -> Capability;

    /// Instructions given to a hosted model when the agent uses one.
    fn system_prompt(&self) -> &str;

    /// Handle one request.
    async fn run(&self, request: &AgentRequest) -> Result<AgentReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_ordering_is_stable() {
        let mut caps = vec![Capability::Retrieval, Capability::Reporting, Capability::Decomposition];
        caps.sort();
        assert_eq!(caps, Capability::ALL.to_vec());
    }

    #[test]
    fn test_report_builder() {
        let report = AgentReport::new("sprint_manager", "Sprint Manager")
            .section("Risk Alerts", "None")
            .section("Suggested Actions", "Keep going");

        assert_eq!(report.sections.len(), 2);
        assert!(report.draft.is_none());
        assert_eq!(
            report.to_text(),
            "*Risk Alerts*\nNone\n\n*Suggested Actions*\nKeep going"
        );
    }

    #[test]
    fn test_capability_serde() {
        assert_eq!(
            serde_json::to_string(&Capability::Decomposition).unwrap(),
            "\"decomposition\""
        );
    }
}
