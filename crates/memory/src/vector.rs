//! In-memory vector store.
//!
//! Texts are embedded as hashed term-frequency vectors and ranked by cosine
//! similarity. Good enough for recall across a single process; a real
//! embedding model can sit behind the same [`VectorStore`] trait.

use async_trait::async_trait;
use convoke_core::error::MemoryError;
use convoke_core::memory::{VectorHit, VectorStore};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::RwLock;

const DIMENSIONS: usize = 256;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Hashed bag-of-words embedding.
pub fn embed(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMENSIONS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        v[(hasher.finish() as usize) % DIMENSIONS] += 1.0;
    }
    v
}

struct Entry {
    id: String,
    text: String,
    embedding: Vec<f32>,
}

#[derive(Clone, Default)]
pub struct InMemoryVectorStore {
    entries: Arc<RwLock<Vec<Entry>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, id: &str, text: &str) -> Result<(), MemoryError> {
        let mut entries = self.entries.write().await;
        entries.retain(|e| e.id != id);
        entries.push(Entry {
            id: id.to_string(),
            text: text.to_string(),
            embedding: embed(text),
        });
        Ok(())
    }

    async fn query(&self, text: &str, limit: usize) -> Result<Vec<VectorHit>, MemoryError> {
        let query = embed(text);
        let entries = self.entries.read().await;
        let mut hits: Vec<VectorHit> = entries
            .iter()
            .map(|e| VectorHit {
                id: e.id.clone(),
                text: e.text.clone(),
                score: cosine_similarity(&e.embedding, &query),
            })
            .filter(|h| h.score > 0.0)
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}
