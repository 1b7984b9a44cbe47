//! Capability agents for SprintMind.
//!
//! - **Sprint Manager** (reporting): standups, risk alerts, sprint health
//! - **Epic Decomposer** (decomposition): review-only breakdown drafts
//! - **Knowledge Extractor** (retrieval): "has this happened before?"
//!
//! Agents read from the tracker through `TrackerRead` and never write to it.
//! Writing approved drafts is the publisher's job.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SEQUENTIAL WORKFLOW                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────┐  context  ┌─────────┐  context  ┌─────────┐   │
//! │  │ Sprint  │ ────────► │Knowledge│ ────────► │  Epic   │   │
//! │  │ Manager │           │Extractor│           │Decompose│   │
//! │  └────┬────┘           └────┬────┘           └────┬────┘   │
//! │       │                     │                     │        │
//! │       ▼                     ▼                     ▼        │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │                 Tracker (read only)                 │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod decomposition;
pub mod reporting;
pub mod retrieval;
pub mod text;
pub mod workflow;

pub use decomposition::{EpicDecomposerAgent, EpicInput};
pub use reporting::{RiskAlert, SprintManagerAgent, WorkState};
pub use retrieval::{KnowledgeExtractorAgent, ReuseHint};
pub use workflow::{SequentialWorkflow, StepResult, WorkflowResult};
