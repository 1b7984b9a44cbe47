//! Common types and traits shared across SprintMind crates.
//!
//! This crate provides the foundational abstractions that the orchestrator,
//! the capability agents and the tracker publisher use to communicate.

pub mod context;
pub mod draft;
pub mod error;
pub mod traits;

pub use context::{ContextUpdate, ConversationContext, SprintMetrics};
pub use draft::{
    default_item_type, ApprovedDraft, DecompositionDraft, DraftItem, Suggested, MAX_DRAFT_ITEMS,
    MIN_DRAFT_ITEMS,
};
pub use error::{Result, SprintMindError};
pub use traits::{Agent, AgentReport, AgentRequest, Capability, ReportSection};
