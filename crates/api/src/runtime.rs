//! The orchestration runtime protocol.
//!
//! Wire types for the session and `/run` endpoints, plus the [`AgentRuntime`]
//! trait the chat bridge talks to. [`HttpRuntime`] speaks the protocol to a
//! remote server; [`LocalRuntime`] calls the orchestrator in-process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sprintmind_common::{ConversationContext, SprintMindError};
use sprintmind_coordinator::{MergedResponse, Orchestrator, Session, SessionKey};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default)]
    pub role: String,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::text(text)],
            role: "user".into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::text(text)],
            role: "model".into(),
        }
    }

    /// Text parts joined by newlines.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub new_message: Content,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub state_delta: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub author: String,
    pub invocation_id: String,
    #[serde(default)]
    pub content: Content,
    pub timestamp: f64,
}

/// A session as the runtime endpoints report it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    pub state: serde_json::Map<String, serde_json::Value>,
    pub last_update_time: f64,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            id: session.key.session_id.clone(),
            app_name: session.key.app_name.clone(),
            user_id: session.key.user_id.clone(),
            state: session_state(&session.context),
            last_update_time: epoch_seconds(session.last_activity),
        }
    }
}

/// Flatten a context into the runtime's state map: free-form keys first,
/// then the typed fields that are set.
pub fn session_state(context: &ConversationContext) -> serde_json::Map<String, serde_json::Value> {
    let mut state: serde_json::Map<String, serde_json::Value> = context
        .state
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    if let Some(id) = context.sprint_id {
        state.insert("sprint_id".into(), id.into());
    }
    if let Some(id) = context.board_id {
        state.insert("board_id".into(), id.into());
    }
    if !context.team_members.is_empty() {
        state.insert("team_members".into(), context.team_members.clone().into());
    }
    if !context.issue_keys.is_empty() {
        state.insert("issue_keys".into(), context.issue_keys.clone().into());
    }
    if let Some(metrics) = &context.metrics {
        if let Ok(value) = serde_json::to_value(metrics) {
            state.insert("metrics".into(), value);
        }
    }
    if let Some(draft) = &context.pending_draft {
        if let Ok(value) = serde_json::to_value(draft) {
            state.insert("pending_draft".into(), value);
        }
    }
    state
}

fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

/// Events for one turn: the merged response first, then one per agent.
pub fn events_for(app_name: &str, merged: &MergedResponse) -> Vec<Event> {
    let invocation_id = format!("e-{}", Uuid::new_v4());
    let timestamp = epoch_seconds(Utc::now());
    let event = |author: &str, text: String| Event {
        id: Uuid::new_v4().to_string(),
        author: author.to_string(),
        invocation_id: invocation_id.clone(),
        content: Content::model(text),
        timestamp,
    };

    let mut events = vec![event(app_name, merged.render())];
    if merged.direct.is_none() {
        for (agent_id, name, body) in merged.by_agent() {
            events.push(event(&agent_id, format!("## {}\n\n{}", name, body)));
        }
    }
    events
}

/// The first non-empty text part across the events.
pub fn first_text(events: &[Event]) -> Option<String> {
    events
        .iter()
        .flat_map(|e| e.content.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .find(|t| !t.trim().is_empty())
        .map(str::to_string)
}

#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The runtime answered with a non-success status.
    #[error("{status} {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::Status { status: 404, .. })
    }
}

impl From<SprintMindError> for RuntimeError {
    fn from(e: SprintMindError) -> Self {
        let status = match e {
            SprintMindError::Session(_) => 404,
            _ => 500,
        };
        RuntimeError::Status {
            status,
            body: e.to_string(),
        }
    }
}

/// What the chat bridge needs from an orchestration runtime.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Create (or refresh) a session for a user.
    async fn create_session(&self, user_id: &str, session_id: &str) -> Result<(), RuntimeError>;

    /// Run one user message and return the resulting events.
    async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        text: &str,
    ) -> Result<Vec<Event>, RuntimeError>;
}

/// Runtime reached over HTTP.
pub struct HttpRuntime {
    http_client: reqwest::Client,
    base_url: String,
    app_name: String,
    api_key: Option<String>,
}

impl HttpRuntime {
    pub fn new(base_url: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_name: app_name.into(),
            api_key: None,
        }
    }

    /// Send `Authorization: Bearer <key>` with every call.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.http_client.post(url);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RuntimeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RuntimeError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AgentRuntime for HttpRuntime {
    async fn create_session(&self, user_id: &str, session_id: &str) -> Result<(), RuntimeError> {
        let url = format!(
            "{}/apps/{}/users/{}/sessions/{}",
            self.base_url, self.app_name, user_id, session_id
        );
        let response = self
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| RuntimeError::Transport(e.to_string()))?;
        Self::check(response).await.map_err(|e| {
            warn!(user_id, error = %e, "Runtime refused to create session");
            e
        })?;
        debug!(user_id, session_id, "Created runtime session");
        Ok(())
    }

    async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        text: &str,
    ) -> Result<Vec<Event>, RuntimeError> {
        let request = RunRequest {
            app_name: self.app_name.clone(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            new_message: Content::user(text),
            streaming: false,
            state_delta: serde_json::Map::new(),
        };
        let response = self
            .post(&format!("{}/run", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| RuntimeError::Transport(e.to_string()))?;
        let response = Self::check(response).await?;
        response
            .json::<Vec<Event>>()
            .await
            .map_err(|e| RuntimeError::Decode(e.to_string()))
    }
}

/// Runtime backed by the in-process orchestrator and its session store.
pub struct LocalRuntime {
    orchestrator: Arc<Orchestrator>,
    app_name: String,
}

impl LocalRuntime {
    pub fn new(orchestrator: Arc<Orchestrator>, app_name: impl Into<String>) -> Self {
        Self {
            orchestrator,
            app_name: app_name.into(),
        }
    }

    fn key(&self, user_id: &str, session_id: &str) -> SessionKey {
        SessionKey::new(self.app_name.as_str(), user_id, session_id)
    }
}

#[async_trait]
impl AgentRuntime for LocalRuntime {
    async fn create_session(&self, user_id: &str, session_id: &str) -> Result<(), RuntimeError> {
        self.orchestrator
            .sessions()
            .create(self.key(user_id, session_id), None)
            .await;
        Ok(())
    }

    async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        text: &str,
    ) -> Result<Vec<Event>, RuntimeError> {
        let merged = self
            .orchestrator
            .handle(&self.key(user_id, session_id), text)
            .await?;
        Ok(events_for(&self.app_name, &merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sprintmind_coordinator::SessionStore;
    use std::time::Duration;

    #[test]
    fn test_run_request_wire_format() {
        let request: RunRequest = serde_json::from_value(json!({
            "appName": "sprintmind",
            "userId": "U1",
            "sessionId": "s1",
            "newMessage": {"parts": [{"text": "sprint status"}], "role": "user"},
            "streaming": false,
            "stateDelta": {"board_id": 7}
        }))
        .unwrap();

        assert_eq!(request.new_message.joined_text(), "sprint status");
        assert_eq!(request.state_delta["board_id"], json!(7));

        // stateDelta and streaming are optional
        let minimal: RunRequest = serde_json::from_value(json!({
            "appName": "sprintmind",
            "userId": "U1",
            "sessionId": "s1",
            "newMessage": {"parts": [{"text": "hi"}], "role": "user"}
        }))
        .unwrap();
        assert!(minimal.state_delta.is_empty());
    }

    #[test]
    fn test_first_text_skips_empty_parts() {
        let event = |parts: Vec<Part>| Event {
            id: "1".into(),
            author: "sprintmind".into(),
            invocation_id: "e-1".into(),
            content: Content {
                parts,
                role: "model".into(),
            },
            timestamp: 0.0,
        };
        let events = vec![
            event(vec![Part { text: None }, Part::text("  ")]),
            event(vec![Part::text("first answer")]),
            event(vec![Part::text("second answer")]),
        ];
        assert_eq!(first_text(&events).as_deref(), Some("first answer"));
        assert_eq!(first_text(&[]), None);
    }

    #[test]
    fn test_session_state_flattens_context() {
        let mut context = ConversationContext {
            sprint_id: Some(42),
            team_members: vec!["Ana".into()],
            ..Default::default()
        };
        context.state.insert("tone".into(), json!("brief"));

        let state = session_state(&context);
        assert_eq!(state["sprint_id"], json!(42));
        assert_eq!(state["team_members"], json!(["Ana"]));
        assert_eq!(state["tone"], json!("brief"));
        assert!(!state.contains_key("board_id"));
    }

    #[test]
    fn test_status_error_formats_as_status_and_body() {
        let err = RuntimeError::Status {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(err.to_string(), "502 bad gateway");
        assert!(!err.is_not_found());

        let missing: RuntimeError = SprintMindError::Session("Session not found: x".into()).into();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_local_runtime_greets_in_new_session() {
        let orchestrator = Arc::new(Orchestrator::new(Arc::new(SessionStore::new(
            Duration::from_secs(60),
        ))));
        let runtime = LocalRuntime::new(orchestrator, "sprintmind");

        assert!(runtime.run("U1", "s1", "hello").await.unwrap_err().is_not_found());

        runtime.create_session("U1", "s1").await.unwrap();
        let events = runtime.run("U1", "s1", "hello").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].author, "sprintmind");
        assert!(first_text(&events).unwrap().starts_with("Hi, I'm SprintMind"));
    }
}
