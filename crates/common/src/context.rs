//! Conversation context carried across turns of a session.

use crate::draft::DecompositionDraft;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of sprint progress computed by the reporting agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SprintMetrics {
    pub committed: usize,
    pub done: usize,
    pub in_progress: usize,
    pub blocked: usize,
    pub remaining: usize,

    /// Story points, when the tracker exposes them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed_points: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_points: Option<f64>,
}

impl SprintMetrics {
    /// Fraction of committed issues that are done (0.0 when nothing is committed).
    pub fn completion_ratio(&self) -> f64 {
        if self.committed == 0 {
            0.0
        } else {
            self.done as f64 / self.committed as f64
        }
    }
}

/// The implicit context bag that accompanies every request in a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprint_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<u64>,

    /// Display names of known team members, in first-seen order
    #[serde(default)]
    pub team_members: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<SprintMetrics>,

    /// Issue keys mentioned or surfaced during the conversation
    #[serde(default)]
    pub issue_keys: Vec<String>,

    /// Decomposition draft waiting for human approval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_draft: Option<DecompositionDraft>,

    /// Free-form state delivered through the runtime's `stateDelta`
    #[serde(default)]
    pub state: BTreeMap<String, serde_json::Value>,
}

impl ConversationContext {
    /// Apply an update produced by an agent or extracted from the request text.
    pub fn apply(&mut self, update: ContextUpdate) {
        if let Some(sprint_id) = update.sprint_id {
            self.sprint_id = Some(sprint_id);
        }
        if let Some(board_id) = update.board_id {
            self.board_id = Some(board_id);
        }
        for member in update.team_members {
            push_unique(&mut self.team_members, member);
        }
        if let Some(metrics) = update.metrics {
            self.metrics = Some(metrics);
        }
        for key in update.issue_keys {
            push_unique(&mut self.issue_keys, key);
        }
    }

    /// Merge a JSON state delta. Known keys update the typed fields, the rest
    /// land in `state`.
    pub fn apply_state_delta(&mut self, delta: &serde_json::Map<String, serde_json::Value>) {
        for (key, value) in delta {
            match key.as_str() {
                "sprint_id" | "sprintId" => {
                    if let Some(id) = as_u64(value) {
                        self.sprint_id = Some(id);
                    }
                }
                "board_id" | "boardId" => {
                    if let Some(id) = as_u64(value) {
                        self.board_id = Some(id);
                    }
                }
                "team_members" | "teamMembers" => {
                    if let Some(members) = value.as_array() {
                        for member in members.iter().filter_map(|m| m.as_str()) {
                            push_unique(&mut self.team_members, member.to_string());
                        }
                    }
                }
                _ => {
                    self.state.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// Changes an agent wants folded into the session context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextUpdate {
    pub sprint_id: Option<u64>,
    pub board_id: Option<u64>,
    pub team_members: Vec<String>,
    pub metrics: Option<SprintMetrics>,
    pub issue_keys: Vec<String>,
}

impl ContextUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ContextUpdate::default()
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.iter().any(|existing| existing == &value) {
        list.push(value);
    }
}

fn as_u64(value: &serde_json::Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}
