//! HTTP route handlers for the API.

use crate::bridge::EventPayload;
use crate::runtime::{events_for, Event, RunRequest, SessionView};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sprintmind_common::SprintMindError;
use sprintmind_coordinator::SessionKey;
use sprintmind_tracker::PublishFailure;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub llm_configured: bool,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        llm_configured: state.llm_configured,
    })
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip)]
    pub status: StatusCode,
}

impl ErrorResponse {
    fn new(status: StatusCode, code: &'static str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code,
            status,
        }
    }

    fn unknown_app(app_name: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "APP_NOT_FOUND",
            format!("Unknown app: {}", app_name),
        )
    }
}

impl From<SprintMindError> for ErrorResponse {
    fn from(e: SprintMindError) -> Self {
        match e {
            SprintMindError::Session(msg) => {
                Self::new(StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", msg)
            }
            other => {
                error!(error = %other, "Request failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    other.to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

fn check_app(state: &AppState, app_name: &str) -> Result<(), ErrorResponse> {
    if app_name == state.app_name {
        Ok(())
    } else {
        Err(ErrorResponse::unknown_app(app_name))
    }
}

/// Create a session, or return the existing one. An optional JSON object
/// body is applied as initial state.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Path((app_name, user_id, session_id)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Json<SessionView>, ErrorResponse> {
    check_app(&state, &app_name)?;

    let initial = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(serde_json::Value::Object(map)) if !map.is_empty() => Some(map),
            Ok(_) => None,
            Err(e) => {
                return Err(ErrorResponse::new(
                    StatusCode::BAD_REQUEST,
                    "INVALID_STATE",
                    format!("Session state must be a JSON object: {}", e),
                ))
            }
        }
    };
    let key = SessionKey::new(app_name, user_id, session_id);
    let session = state
        .orchestrator
        .sessions()
        .create(key, initial.as_ref())
        .await;

    Ok(Json(SessionView::from(&session)))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path((app_name, user_id, session_id)): Path<(String, String, String)>,
) -> Result<Json<SessionView>, ErrorResponse> {
    check_app(&state, &app_name)?;

    let key = SessionKey::new(app_name, user_id, session_id);
    match state.orchestrator.sessions().get(&key).await {
        Some(session) => Ok(Json(SessionView::from(&session))),
        None => Err(ErrorResponse::new(
            StatusCode::NOT_FOUND,
            "SESSION_NOT_FOUND",
            format!("Session not found: {}", key),
        )),
    }
}

/// Run one user message through the orchestrator.
pub async fn run(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> Result<Json<Vec<Event>>, ErrorResponse> {
    check_app(&state, &request.app_name)?;

    let key = SessionKey::new(
        request.app_name.as_str(),
        request.user_id.as_str(),
        request.session_id.as_str(),
    );
    let sessions = state.orchestrator.sessions();
    if !request.state_delta.is_empty() {
        sessions.apply_state_delta(&key, &request.state_delta).await?;
    }

    let text = request.new_message.joined_text();
    info!(
        session = %key,
        streaming = request.streaming,
        content_preview = %text.chars().take(50).collect::<String>(),
        "Run request"
    );

    let merged = state.orchestrator.handle(&key, &text).await?;
    let events = events_for(&state.app_name, &merged);
    debug!(session = %key, events = events.len(), "Run complete");
    Ok(Json(events))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub reviewer: String,
    #[serde(default)]
    pub project_key: Option<String>,
    #[serde(default)]
    pub issue_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveResponse {
    pub epic: String,
    pub reviewer: String,
    pub project_key: String,
    pub created: Vec<String>,
    pub failures: Vec<PublishFailure>,
}

/// Approve the session's pending draft and create its issues.
pub async fn approve_draft(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ApproveRequest>,
) -> Result<Json<ApproveResponse>, ErrorResponse> {
    check_app(&state, &request.app_name)?;

    let Some(publisher) = &state.publisher else {
        return Err(ErrorResponse::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "TRACKER_NOT_CONFIGURED",
            "The tracker is not configured; drafts cannot be published",
        ));
    };
    if request.reviewer.trim().is_empty() {
        return Err(ErrorResponse::new(
            StatusCode::BAD_REQUEST,
            "REVIEWER_REQUIRED",
            "Approving a draft requires a named reviewer",
        ));
    }
    let Some(project_key) = request
        .project_key
        .clone()
        .or_else(|| state.default_project_key.clone())
    else {
        return Err(ErrorResponse::new(
            StatusCode::BAD_REQUEST,
            "PROJECT_REQUIRED",
            "No projectKey given and no default project configured",
        ));
    };

    let key = SessionKey::new(
        request.app_name.as_str(),
        request.user_id.as_str(),
        request.session_id.as_str(),
    );
    let Some(draft) = state.orchestrator.sessions().take_pending_draft(&key).await? else {
        return Err(ErrorResponse::new(
            StatusCode::CONFLICT,
            "NO_PENDING_DRAFT",
            format!("No draft is pending approval in session {}", key),
        ));
    };

    let approved = draft.approve(request.reviewer.as_str()).map_err(|e| {
        warn!(session = %key, error = %e, "Pending draft rejected at approval");
        ErrorResponse::new(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_DRAFT", e.to_string())
    })?;

    let report = publisher
        .publish(&approved, &project_key, request.issue_type.as_deref())
        .await;
    info!(
        session = %key,
        reviewer = %request.reviewer,
        created = report.created.len(),
        failed = report.failures.len(),
        "Draft published"
    );

    Ok(Json(ApproveResponse {
        epic: approved.draft().epic_title.clone(),
        reviewer: request.reviewer,
        project_key,
        created: report.created_keys().into_iter().map(str::to_string).collect(),
        failures: report.failures,
    }))
}

/// Chat webhook. Always answers 200 once the payload parses as JSON.
pub async fn slack_events(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    match EventPayload::from_value(body) {
        EventPayload::UrlVerification { challenge } => {
            ([(header::CONTENT_TYPE, "text/plain")], challenge).into_response()
        }
        EventPayload::EventCallback { event } => {
            match &state.bridge {
                Some(bridge) => {
                    bridge.handle_event(&event).await;
                }
                None => warn!("Chat event received but the bridge is disabled"),
            }
            StatusCode::OK.into_response()
        }
        EventPayload::Other => StatusCode::OK.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            version: "0.1.0",
            uptime_seconds: 100,
            llm_configured: false,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("\"llm_configured\":false"));
    }

    #[test]
    fn test_approve_request_optional_fields() {
        let request: ApproveRequest = serde_json::from_str(
            r#"{"appName": "sprintmind", "userId": "U1", "sessionId": "s1", "reviewer": "Ana"}"#,
        )
        .unwrap();
        assert_eq!(request.reviewer, "Ana");
        assert!(request.project_key.is_none());
        assert!(request.issue_type.is_none());
    }

    #[test]
    fn test_session_error_maps_to_404() {
        let response: ErrorResponse = SprintMindError::Session("Session not found: a/b/c".into()).into();
        assert_eq!(response.status, StatusCode::NOT_FOUND);

        let response: ErrorResponse = SprintMindError::Agent("boom".into()).into();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
