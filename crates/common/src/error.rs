//! Error types for SprintMind.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SprintMindError {
    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Tracker error: {0}")]
    Tracker(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Knowledge error: {0}")]
    Knowledge(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SprintMindError>;
