//! Ranking documents against a query.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sprintmind_common::{Result, SprintMindError};
use tracing::debug;

use crate::embedding::{Embedder, HashingEmbedder};

/// A piece of history that can be matched against a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDoc {
    /// Usually the issue key
    pub id: String,
    pub title: String,
    pub body: String,
}

impl KnowledgeDoc {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
        }
    }

    fn embedding_text(&self) -> String {
        if self.body.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n{}", self.title, self.body)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDoc {
    pub doc: KnowledgeDoc,
    pub score: f32,
}

/// Cosine similarity; 0.0 when either vector has zero length or norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Embeds documents on demand and orders them by similarity to a query.
#[derive(Clone)]
pub struct KnowledgeIndex {
    embedder: Arc<dyn Embedder>,
}

impl KnowledgeIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Best matches first. Ties keep the input order.
    pub async fn rank(
        &self,
        query: &str,
        docs: &[KnowledgeDoc],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<ScoredDoc>> {
        if docs.is_empty() || limit == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = docs.iter().map(KnowledgeDoc::embedding_text).collect();
        let mut inputs: Vec<&str> = Vec::with_capacity(texts.len() + 1);
        inputs.push(query);
        inputs.extend(texts.iter().map(String::as_str));

        let embeddings = self.embedder.embed_batch(&inputs).await?;
        if embeddings.len() != inputs.len() {
            return Err(SprintMindError::Knowledge(format!(
                "embedder returned {} vectors for {} inputs",
                embeddings.len(),
                inputs.len()
            )));
        }

        let (query_vec, doc_vecs) = embeddings.split_at(1);
        let mut scored: Vec<ScoredDoc> = docs
            .iter()
            .zip(doc_vecs)
            .map(|(doc, vec)| ScoredDoc {
                doc: doc.clone(),
                score: cosine_similarity(&query_vec[0], vec),
            })
            .filter(|s| s.score >= min_similarity)
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(limit);

        debug!(
            candidates = docs.len(),
            kept = scored.len(),
            top_score = scored.first().map(|s| s.score).unwrap_or(0.0),
            "Ranked knowledge documents"
        );

        Ok(scored)
    }
}

impl Default for KnowledgeIndex {
    fn default() -> Self {
        Self::new(Arc::new(HashingEmbedder::default()))
    }
}
