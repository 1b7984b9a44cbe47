//! Knowledge configuration.

use serde::{Deserialize, Serialize};

/// Name that selects the built-in [`crate::HashingEmbedder`].
pub const HASHING_MODEL: &str = "hashing";

/// Settings for the retrieval agent's ranking step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// `"hashing"` or a fastembed model name such as `all-MiniLM-L6-v2`
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Maximum matches reported back to the user
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Matches scoring below this are dropped
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    /// How many issues the tracker search may return for ranking
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: u32,
}

fn default_embedding_model() -> String {
    HASHING_MODEL.to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_min_similarity() -> f32 {
    0.1
}

fn default_candidate_limit() -> u32 {
    25
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            embedding_model: default_embedding_model(),
            max_results: default_max_results(),
            min_similarity: default_min_similarity(),
            candidate_limit: default_candidate_limit(),
        }
    }
}
