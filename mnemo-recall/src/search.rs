//! Hybrid ranked retrieval over the memory document.
//!
//! With an embedding provider, records are scored by cosine similarity
//! between the query vector and their stored vectors; records without a
//! usable vector fall back to a fixed substring-match score. Without a
//! provider, retrieval is plain case-insensitive substring matching.
//!
//! A stored vector whose dimension does not match the current query vector
//! is treated exactly like a missing vector. Dimension drift is expected
//! after a model change and must degrade, not crash; `mnemo reindex` is the
//! recovery path.

use crate::store::{JsonStore, Layer, MemoryRecord};
use anyhow::Result;
use mnemo_embed::EmbeddingProvider;
use std::cmp::Ordering;
use std::sync::Arc;

/// Score assigned to a record that has no usable embedding but contains the
/// query as a substring.
const KEYWORD_FALLBACK_SCORE: f32 = 0.5;

/// One ranked search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub layer: Layer,
    pub key: String,
    pub record: MemoryRecord,
    /// Cosine similarity in `[-1, 1]`, the fixed substring fallback score,
    /// or `None` in keyword-only mode.
    pub score: Option<f32>,
}

/// Hybrid search over a store, with an optional embedding capability.
pub struct SearchEngine<'s> {
    store: &'s JsonStore,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl<'s> SearchEngine<'s> {
    pub fn new(store: &'s JsonStore, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { store, embedder }
    }

    /// Whether semantic ranking is available.
    pub fn has_semantic(&self) -> bool {
        self.embedder.is_some()
    }

    /// Rank stored records against `query` and return the first `top_k`.
    ///
    /// Ties are broken by document iteration order (layer, then key), which
    /// is stable across runs.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if let Some(embedder) = &self.embedder {
            match embedder.embed_text(query).await {
                Ok(query_vec) => return self.semantic_search(query, &query_vec, top_k),
                Err(err) => {
                    // Embedding failures never abort a search.
                    tracing::warn!("query embedding failed, falling back to keywords: {err}");
                }
            }
        }
        self.keyword_search(query, top_k)
    }

    fn semantic_search(
        &self,
        query: &str,
        query_vec: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let doc = self.store.snapshot()?;
        let query_lower = query.to_lowercase();

        let mut hits: Vec<SearchHit> = Vec::new();
        for (layer, key, record) in doc.iter() {
            let usable_embedding = record
                .embedding
                .as_deref()
                .filter(|emb| emb.len() == query_vec.len());

            let score = match usable_embedding {
                Some(embedding) => Some(cosine_similarity(query_vec, embedding)),
                None if record.content.to_lowercase().contains(&query_lower) => {
                    Some(KEYWORD_FALLBACK_SCORE)
                }
                None => continue,
            };

            hits.push(SearchHit {
                layer,
                key: key.clone(),
                record: record.clone(),
                score,
            });
        }

        // Stable sort: equal scores keep document order.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    fn keyword_search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let doc = self.store.snapshot()?;
        let query_lower = query.to_lowercase();

        let mut hits: Vec<SearchHit> = Vec::new();
        for (layer, key, record) in doc.iter() {
            if record.content.to_lowercase().contains(&query_lower)
                || key.to_lowercase().contains(&query_lower)
            {
                hits.push(SearchHit {
                    layer,
                    key: key.clone(),
                    record: record.clone(),
                    score: None,
                });
            }
        }
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Cosine similarity between two equal-length vectors, in `[-1, 1]`.
/// Zero-magnitude vectors score 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
