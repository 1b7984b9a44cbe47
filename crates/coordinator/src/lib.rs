//! Orchestration for SprintMind.
//!
//! The coordinator is the central brain that:
//! 1. Receives a user turn for a session
//! 2. Classifies it with a deterministic keyword classifier
//! 3. Runs the planned capability agents in a fixed order, passing context forward
//! 4. Merges their labeled sections into one response
//!
//! # Architecture
//!
//! ```text
//! User turn
//!      │
//!      ▼
//! ┌─────────────────┐
//! │  Orchestrator   │  ◄── IntentClassifier + SessionStore
//! │  (this crate)   │
//! └────────┬────────┘
//!          │ MERGE_ORDER
//!    ┌─────┴──────┬──────────────┐
//!    ▼            ▼              ▼
//! [Sprint     [Knowledge     [Epic
//!  Manager]    Extractor]     Decomposer]
//! ```

pub mod config;
pub mod orchestrator;
pub mod routing;
pub mod session;
pub mod triage;

pub use config::{ChatConfig, ServerConfig, SessionConfig, SprintMindConfig};
pub use orchestrator::{AgentSection, MergedResponse, Orchestrator, OrchestratorPhase, ERROR_LABEL};
pub use routing::{ordered_plan, AgentRoute, IntentKind, RouteDecision, MERGE_ORDER};
pub use session::{Session, SessionKey, SessionStore, TurnRecord};
pub use triage::{IntentClassifier, APPROVAL_ENDPOINT};
