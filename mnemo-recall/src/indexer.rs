//! Mutation of existing records: tags, content, and embedding reindex.

use crate::store::{JsonStore, Layer, MIN_CONTENT_CHARS, StoreError};
use anyhow::{Result, anyhow};
use chrono::Utc;
use mnemo_embed::EmbeddingProvider;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Outcome of a full reindex pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReindexReport {
    /// Records whose embedding was recomputed.
    pub updated: usize,
    /// Records examined.
    pub total: usize,
}

/// Mutates tags and derived metadata on existing records.
pub struct Indexer<'s> {
    store: &'s JsonStore,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl<'s> Indexer<'s> {
    pub fn new(store: &'s JsonStore, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { store, embedder }
    }

    /// Merge `tags` into the record's tag set. Returns how many tags were
    /// actually new. Bumps `updated` and counts the touch in `accessed`.
    pub fn add_tags(&self, key: &str, layer: Layer, tags: &[String]) -> Result<usize> {
        let added = self.store.with_exclusive(|doc| {
            let record = doc.get_mut(layer, key).ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
                layer: Some(layer),
            })?;

            let before = record.tags.len();
            record.tags.extend(tags.iter().cloned());
            record.updated = Utc::now();
            record.accessed += 1;
            Ok(record.tags.len() - before)
        })?;
        Ok(added)
    }

    /// Replace a record's content.
    ///
    /// Content shorter than 20 characters (trimmed) is rejected without
    /// touching the record. On success `accessed` resets to 0, `updated` is
    /// bumped, and the embedding is refreshed best-effort: an embedding
    /// failure logs a warning and stores the record without a vector.
    pub async fn update_content(&self, key: &str, layer: Layer, new_content: &str) -> Result<()> {
        let length = new_content.trim().chars().count();
        if length < MIN_CONTENT_CHARS {
            return Err(StoreError::ContentTooShort {
                length,
                minimum: MIN_CONTENT_CHARS,
            }
            .into());
        }

        let embedding = match &self.embedder {
            Some(embedder) => match embedder.embed_text(new_content).await {
                Ok(vector) => Some(vector),
                Err(err) => {
                    tracing::warn!("failed to embed updated content for '{key}': {err}");
                    None
                }
            },
            None => None,
        };

        self.store.with_exclusive(|doc| {
            let record = doc.get_mut(layer, key).ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
                layer: Some(layer),
            })?;

            record.content = new_content.to_string();
            record.updated = Utc::now();
            record.accessed = 0;
            record.embedding = embedding;
            Ok(())
        })?;
        Ok(())
    }

    /// Recompute the embedding of every record with non-empty content,
    /// overwriting whatever was stored before. Used after a model change.
    ///
    /// Individual failures are logged and skipped; the pass never aborts on
    /// a single record.
    pub async fn reindex_all(&self) -> Result<ReindexReport> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| anyhow!("no embedding provider available; cannot reindex"))?;

        let snapshot = self.store.snapshot()?;
        let total = snapshot.len();

        // Embed outside the lock; apply in one locked pass afterwards.
        let mut computed: Vec<(Layer, String, Vec<f32>)> = Vec::new();
        for (layer, key, record) in snapshot.iter() {
            if record.content.trim().is_empty() {
                continue;
            }
            match embedder.embed_text(&record.content).await {
                Ok(vector) => computed.push((layer, key.clone(), vector)),
                Err(err) => {
                    tracing::warn!("failed to embed '{key}' in layer '{layer}': {err}");
                }
            }
        }

        let updated = self.store.with_exclusive(|doc| {
            let mut updated = 0;
            for (layer, key, vector) in computed {
                if let Some(record) = doc.get_mut(layer, &key) {
                    record.embedding = Some(vector);
                    updated += 1;
                }
            }
            Ok(updated)
        })?;

        Ok(ReindexReport { updated, total })
    }
}

/// Normalize a tag list into the stored set form.
pub fn tag_set(tags: &[String]) -> BTreeSet<String> {
    tags.iter().cloned().collect()
}
