//! Relevance ranking over historical issues.
//!
//! The retrieval agent turns tracker search results into [`KnowledgeDoc`]s
//! and asks a [`KnowledgeIndex`] which of them best match the question.
//!
//! ```text
//!   query ──┐
//!           ├──► Embedder ──► cosine similarity ──► ScoredDoc (top N)
//!   docs ───┘      │
//!                  ├── HashingEmbedder (default, deterministic)
//!                  └── FastEmbedder    (fastembed model, lazy)
//! ```

pub mod embedding;
pub mod index;
pub mod types;

pub use embedding::{embedder_from_config, Embedder, EmbeddingError, FastEmbedder, HashingEmbedder};
pub use index::{cosine_similarity, KnowledgeDoc, KnowledgeIndex, ScoredDoc};
pub use types::KnowledgeConfig;
