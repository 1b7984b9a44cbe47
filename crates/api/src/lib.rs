//! HTTP surface for SprintMind.
//!
//! # Endpoints
//!
//! ## Runtime
//! - `POST /apps/{app}/users/{user}/sessions/{session}` - Create or fetch a session
//! - `GET /apps/{app}/users/{user}/sessions/{session}` - Get a session
//! - `POST /run` - Run one user message, returns events
//!
//! ## Human gate
//! - `POST /api/v1/drafts/approve` - Approve and publish the pending draft
//!
//! ## Chat
//! - `POST /slack/events` - Chat webhook (URL verification and messages)
//!
//! ## Core
//! - `GET /health` - Health check
//!
//! # Architecture
//!
//! ```text
//! Chat workspace
//!    │  /slack/events
//!    ▼
//! ┌─────────────────┐      AgentRuntime       ┌─────────────────┐
//! │   ChatBridge    │ ──────────────────────► │  Local or HTTP  │
//! └─────────────────┘                         │    runtime      │
//!                                             └────────┬────────┘
//!                                                      ▼
//!                                             ┌─────────────────┐
//!                                             │  Orchestrator   │
//!                                             └─────────────────┘
//! ```

pub mod auth;
pub mod bridge;
pub mod routes;
pub mod runtime;
pub mod state;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use auth::ApiKeyConfig;
pub use bridge::{BridgeOutcome, ChatBridge, ChatError, ChatPoster, SlackClient};
pub use runtime::{AgentRuntime, Event, HttpRuntime, LocalRuntime, RuntimeError};
pub use state::AppState;

/// Create the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let session_path = "/apps/{app}/users/{user}/sessions/{session}";

    Router::new()
        .route("/health", get(routes::health))
        .route(
            session_path,
            post(routes::create_session).get(routes::get_session),
        )
        .route("/run", post(routes::run))
        .route("/api/v1/drafts/approve", post(routes::approve_draft))
        .route("/slack/events", post(routes::slack_events))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server on the given address.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let router = create_router(state);

    info!(%addr, "Starting SprintMind server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
