//! Typed client for the project-tracking REST API (boards, sprints, issues).
//!
//! Reads and writes are split into two traits so that components can be
//! handed exactly the access they need:
//!
//! - [`TrackerRead`]: board, sprint, issue and search operations
//! - [`TrackerWrite`]: issue creation, only reachable through
//!   [`IssuePublisher`] with an approved draft
//!
//! ```text
//!   Agents ──► TrackerRead ──┐
//!                            ├──► JiraClient ──► REST API (basic auth)
//!   IssuePublisher ──► TrackerWrite ┘
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod models;
pub mod publisher;

pub use client::{first_active, JiraClient, TrackerRead, TrackerWrite};
pub use config::TrackerConfig;
pub use error::{OrEmpty, TrackerError, TrackerErrorKind, TrackerResult};
pub use models::{
    Board, Comment, CreatedIssue, Issue, IssueFields, IssueLink, IssuePage, JiraUser, NewIssue,
    Page, Sprint, SprintState,
};
pub use publisher::{IssuePublisher, PublishFailure, PublishReport};
