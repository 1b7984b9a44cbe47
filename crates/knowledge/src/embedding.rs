//! Embedding generation for relevance ranking.
//!
//! Two embedders are provided:
//!
//! - [`HashingEmbedder`]: feature hashing over words, stems and character
//!   trigrams. Deterministic, offline and fast. The default.
//! - [`FastEmbedder`]: a fastembed sentence model (all-MiniLM-L6-v2 unless
//!   configured otherwise), loaded on first use.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use once_cell::sync::OnceCell;
use sprintmind_common::{Result, SprintMindError};
use thiserror::Error;
use tokio::task;
use tracing::{debug, info, instrument};

use crate::types::{KnowledgeConfig, HASHING_MODEL};

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("Failed to generate embeddings: {0}")]
    Generation(String),

    #[error("Blocking task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl From<EmbeddingError> for SprintMindError {
    fn from(err: EmbeddingError) -> Self {
        SprintMindError::Knowledge(err.to_string())
    }
}

/// Turns text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;
}

/// Pick the embedder named in the configuration.
pub fn embedder_from_config(config: &KnowledgeConfig) -> Result<Arc<dyn Embedder>> {
    let name = config.embedding_model.trim();
    if name.is_empty() || name.eq_ignore_ascii_case(HASHING_MODEL) {
        info!("Using hashing embedder for knowledge ranking");
        return Ok(Arc::new(HashingEmbedder::default()));
    }

    let embedder = FastEmbedder::from_model_str(name)?;
    info!(model = name, dimension = embedder.dimension(), "Using fastembed model for knowledge ranking");
    Ok(Arc::new(embedder))
}

// ============================================================================
// Hashing embedder
// ============================================================================

const DEFAULT_HASH_DIMENSION: usize = 512;
const WORD_WEIGHT: f32 = 1.0;
const STEM_WEIGHT: f32 = 0.6;
const TRIGRAM_WEIGHT: f32 = 0.3;

/// Deterministic bag-of-features embedder.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed a single text synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for word in tokenize(text) {
            self.add_feature(&mut vector, "w", &word, WORD_WEIGHT);

            let stem = stem(&word);
            if stem != word {
                self.add_feature(&mut vector, "w", stem, STEM_WEIGHT);
            }

            let padded: Vec<char> = format!("#{}#", word).chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut vector, "t", &gram, TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], namespace: &str, feature: &str, weight: f32) {
        let hash = fnv1a(namespace.as_bytes(), feature.as_bytes());
        let bucket = (hash % self.dimension as u64) as usize;
        // One hash bit picks the sign so that collisions tend to cancel out.
        let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a(namespace: &[u8], feature: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET;
    for byte in namespace.iter().chain(b":").chain(feature) {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Lowercase alphanumeric words, including issue-key style tokens.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
        .map(|w| w.trim_matches(|c| c == '-' || c == '_').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Strip a few common English suffixes so "timeouts" meets "timeout".
pub(crate) fn stem(word: &str) -> &str {
    for suffix in ["ing", "ed", "es", "s"] {
        if let Some(stripped) = word.strip_suffix(suffix) {
            if stripped.chars().count() >= 3 {
                return stripped;
            }
        }
    }
    word
}

// ============================================================================
// fastembed
// ============================================================================

/// Sentence embedding model backed by fastembed.
///
/// The model is not loaded until the first embedding call and is shared by
/// all later calls.
pub struct FastEmbedder {
    model_name: EmbeddingModel,
    dimension: usize,
    model: OnceCell<Arc<TextEmbedding>>,
}

impl FastEmbedder {
    pub fn new(model_name: EmbeddingModel) -> Self {
        let dimension = match model_name {
            EmbeddingModel::AllMiniLML6V2 | EmbeddingModel::AllMiniLML6V2Q => 384,
            EmbeddingModel::AllMiniLML12V2 | EmbeddingModel::AllMiniLML12V2Q => 384,
            EmbeddingModel::BGESmallENV15 | EmbeddingModel::BGESmallENV15Q => 384,
            EmbeddingModel::BGEBaseENV15 | EmbeddingModel::BGEBaseENV15Q => 768,
            EmbeddingModel::BGELargeENV15 | EmbeddingModel::BGELargeENV15Q => 1024,
            EmbeddingModel::NomicEmbedTextV1 | EmbeddingModel::NomicEmbedTextV15 => 768,
            EmbeddingModel::MultilingualE5Small => 384,
            EmbeddingModel::MultilingualE5Base => 768,
            EmbeddingModel::MultilingualE5Large => 1024,
            _ => 384,
        };

        Self {
            model_name,
            dimension,
            model: OnceCell::new(),
        }
    }

    /// Resolve a model from its common name.
    pub fn from_model_str(model_name: &str) -> std::result::Result<Self, EmbeddingError> {
        let model = match model_name {
            "all-MiniLM-L6-v2" | "AllMiniLML6V2" => EmbeddingModel::AllMiniLML6V2,
            "all-MiniLM-L6-v2-q" | "AllMiniLML6V2Q" => EmbeddingModel::AllMiniLML6V2Q,
            "all-MiniLM-L12-v2" | "AllMiniLML12V2" => EmbeddingModel::AllMiniLML12V2,
            "bge-small-en-v1.5" | "BGESmallENV15" => EmbeddingModel::BGESmallENV15,
            "bge-base-en-v1.5" | "BGEBaseENV15" => EmbeddingModel::BGEBaseENV15,
            "bge-large-en-v1.5" | "BGELargeENV15" => EmbeddingModel::BGELargeENV15,
            "nomic-embed-text-v1.5" | "NomicEmbedTextV15" => EmbeddingModel::NomicEmbedTextV15,
            "multilingual-e5-small" | "MultilingualE5Small" => EmbeddingModel::MultilingualE5Small,
            _ => {
                return Err(EmbeddingError::ModelInit(format!(
                    "Unknown embedding model: '{}'. Use 'hashing' or a model such as all-MiniLM-L6-v2, bge-small-en-v1.5",
                    model_name
                )));
            }
        };
        Ok(Self::new(model))
    }

    #[instrument(skip(self))]
    fn get_or_init_model(&self) -> std::result::Result<Arc<TextEmbedding>, EmbeddingError> {
        self.model
            .get_or_try_init(|| {
                info!(model = ?self.model_name, "Initializing embedding model");

                let mut options = InitOptions::new(self.model_name.clone());
                options.show_download_progress = false;
                let model = TextEmbedding::try_new(options)
                    .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;

                info!(model = ?self.model_name, dimension = self.dimension, "Embedding model ready");
                Ok(Arc::new(model))
            })
            .cloned()
    }
}

impl Default for FastEmbedder {
    fn default() -> Self {
        Self::new(EmbeddingModel::AllMiniLML6V2)
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    #[instrument(skip(self, texts), fields(batch_size = texts.len()))]
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.get_or_init_model()?;
        let texts: Vec<String> = texts.iter().map(|s| s.to_string()).collect();

        // fastembed is synchronous
        let embeddings = task::spawn_blocking(move || {
            model
                .embed(texts, None)
                .map_err(|e| EmbeddingError::Generation(e.to_string()))
        })
        .await
        .map_err(EmbeddingError::from)??;

        debug!(
            batch_size = embeddings.len(),
            dimension = embeddings.first().map(|e| e.len()).unwrap_or(0),
            "Generated batch embeddings"
        );

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
