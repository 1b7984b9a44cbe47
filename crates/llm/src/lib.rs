//! Hosted model access for agents that draft text.
//!
//! Agents never require a model: when [`build_llm_client`] returns `None`
//! they fall back to deterministic heuristics.

pub mod client;
pub mod config;
pub mod openai;

pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};
pub use config::{build_llm_client, LlmConfig};
pub use openai::OpenAiClient;
