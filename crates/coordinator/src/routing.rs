//! Routing decisions and the fixed merge order.

use serde::{Deserialize, Serialize};
use sprintmind_common::{Capability, ContextUpdate};

/// The order in which agents run and their sections are merged.
///
/// Status first, then history, then the (longest) decomposition draft.
pub const MERGE_ORDER: [Capability; 3] = [
    Capability::Reporting,
    Capability::Retrieval,
    Capability::Decomposition,
];

fn merge_rank(capability: Capability) -> usize {
    MERGE_ORDER
        .iter()
        .position(|c| *c == capability)
        .unwrap_or(MERGE_ORDER.len())
}

/// Sort by [`MERGE_ORDER`] and drop duplicates.
pub fn ordered_plan(capabilities: impl IntoIterator<Item = Capability>) -> Vec<Capability> {
    let mut plan: Vec<Capability> = capabilities.into_iter().collect();
    plan.sort_by_key(|c| merge_rank(*c));
    plan.dedup();
    plan
}

/// Coarse shape of a classified request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Reporting,
    Decomposition,
    Retrieval,
    Composite,
}

impl IntentKind {
    pub fn from_plan(plan: &[Capability]) -> Option<Self> {
        match plan {
            [] => None,
            [Capability::Reporting] => Some(IntentKind::Reporting),
            [Capability::Decomposition] => Some(IntentKind::Decomposition),
            [Capability::Retrieval] => Some(IntentKind::Retrieval),
            _ => Some(IntentKind::Composite),
        }
    }
}

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentRoute {
    /// Answer without invoking an agent
    Direct { response: String },

    /// Run these agents in this order (never empty)
    Agents { plan: Vec<Capability> },
}

/// The result of classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub route: AgentRoute,

    pub reasoning: String,

    /// 0.0 - 1.0
    pub confidence: f32,

    /// Sprint, board and issue keys found in the request text
    #[serde(default)]
    pub extracted_context: ContextUpdate,
}

impl RouteDecision {
    pub fn direct(response: impl Into<String>) -> Self {
        Self {
            route: AgentRoute::Direct {
                response: response.into(),
            },
            reasoning: "Direct response, no agent needed".into(),
            confidence: 1.0,
            extracted_context: ContextUpdate::default(),
        }
    }

    /// Route to agents. Falls back to a direct reply when `capabilities` is empty.
    pub fn agents(
        capabilities: impl IntoIterator<Item = Capability>,
        reasoning: impl Into<String>,
        confidence: f32,
    ) -> Self {
        let plan = ordered_plan(capabilities);
        if plan.is_empty() {
            return Self::direct("Nothing to route.");
        }
        Self {
            route: AgentRoute::Agents { plan },
            reasoning: reasoning.into(),
            confidence: confidence.clamp(0.0, 1.0),
            extracted_context: ContextUpdate::default(),
        }
    }

    pub fn with_context(mut self, extracted: ContextUpdate) -> Self {
        self.extracted_context = extracted;
        self
    }

    /// The agents to run, empty for a direct reply.
    pub fn plan(&self) -> &[Capability] {
        match &self.route {
            AgentRoute::Agents { plan } => plan,
            AgentRoute::Direct { .. } => &[],
        }
    }

    pub fn kind(&self) -> Option<IntentKind> {
        IntentKind::from_plan(self.plan())
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.route, AgentRoute::Direct { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Capability::*;

    #[test]
    fn test_plan_order_is_fixed() {
        // Every permutation of the full set yields the same plan.
        let perms = [
            [Reporting, Retrieval, Decomposition],
            [Decomposition, Retrieval, Reporting],
            [Retrieval, Decomposition, Reporting],
            [Decomposition, Reporting, Retrieval],
        ];
        for perm in perms {
            assert_eq!(ordered_plan(perm), MERGE_ORDER.to_vec());
        }
        assert_eq!(
            ordered_plan([Decomposition, Reporting, Decomposition]),
            vec![Reporting, Decomposition]
        );
    }

    #[test]
    fn test_intent_kind() {
        assert_eq!(IntentKind::from_plan(&[]), None);
        assert_eq!(IntentKind::from_plan(&[Retrieval]), Some(IntentKind::Retrieval));
        assert_eq!(
            IntentKind::from_plan(&[Reporting, Decomposition]),
            Some(IntentKind::Composite)
        );
    }

    #[test]
    fn test_empty_agents_becomes_direct() {
        let decision = RouteDecision::agents([], "nothing", 0.9);
        assert!(decision.is_direct());
        assert!(decision.plan().is_empty());
    }

    #[test]
    fn test_route_serializes_tagged() {
        let decision = RouteDecision::agents([Retrieval, Reporting], "both", 0.8);
        let json = serde_json::to_value(&decision.route).unwrap();
        assert_eq!(json["type"], "agents");
        assert_eq!(json["plan"], serde_json::json!(["reporting", "retrieval"]));
    }
}
