//! Segmentation-driven ingest: raw text (or a file) in, one record per
//! fragment out.
//!
//! Richness scoring sizes the output: a flat note becomes one record, a
//! structured document fans out into up to ten. Embeddings are attached
//! best-effort per batch; an embedding failure stores the fragments without
//! vectors rather than failing the ingest.

use crate::extract::extract_file;
use crate::store::{JsonStore, Layer, NewMemory};
use anyhow::Result;
use mnemo_embed::EmbeddingProvider;
use mnemo_segment::{Segmenter, fragment_bounds};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Explicit fragment-count bounds; unspecified bounds are derived from the
/// content's richness score.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    pub min_fragments: Option<usize>,
    pub max_fragments: Option<usize>,
}

/// Segment `content` and store one record per fragment, with fresh
/// timestamped keys. Returns the keys created, in fragment order.
///
/// This is the `add` path: free-form notes get the same adaptive
/// segmentation as processed files, just without file-derived keys.
pub async fn ingest_note(
    store: &JsonStore,
    embedder: Option<&Arc<dyn EmbeddingProvider>>,
    segmenter: &Segmenter,
    content: &str,
    layer: Layer,
    tags: &BTreeSet<String>,
    source: Option<&str>,
) -> Result<Vec<String>> {
    let richness = segmenter.richness(content);
    let (auto_min, auto_max) = fragment_bounds(richness);
    let fragments = segmenter.segment(content, auto_min, auto_max);

    let embeddings = embed_fragments(embedder, &fragments).await;

    let mut keys = Vec::with_capacity(fragments.len());
    for (fragment, embedding) in fragments.into_iter().zip(embeddings) {
        let key = store.insert(
            layer,
            NewMemory {
                content: fragment,
                tags: tags.clone(),
                source: source.map(str::to_string),
                key: None,
                embedding,
            },
        )?;
        keys.push(key);
    }
    Ok(keys)
}

/// Segment `content` extracted from a file and store one record per
/// fragment under `<stem>_<NN>` keys, tagged with the stem. Returns the
/// number of records created.
pub async fn ingest_text(
    store: &JsonStore,
    embedder: Option<&Arc<dyn EmbeddingProvider>>,
    segmenter: &Segmenter,
    content: &str,
    layer: Layer,
    stem: &str,
    source: Option<&str>,
    options: IngestOptions,
) -> Result<usize> {
    let richness = segmenter.richness(content);
    let (auto_min, auto_max) = fragment_bounds(richness);
    let min_fragments = options.min_fragments.unwrap_or(auto_min);
    let max_fragments = options.max_fragments.unwrap_or(auto_max);

    tracing::info!(
        "content richness {richness}/10, creating {min_fragments}-{max_fragments} memories"
    );

    let fragments = segmenter.segment(content, min_fragments, max_fragments);
    if fragments.is_empty() {
        tracing::warn!("no meaningful content extracted");
        return Ok(0);
    }

    let embeddings = embed_fragments(embedder, &fragments).await;

    let mut created = 0;
    for (i, (fragment, embedding)) in fragments.into_iter().zip(embeddings).enumerate() {
        store.insert(
            layer,
            NewMemory {
                content: fragment,
                tags: BTreeSet::from([stem.to_string()]),
                source: source.map(str::to_string),
                key: Some(format!("{stem}_{:02}", i + 1)),
                embedding,
            },
        )?;
        created += 1;
    }
    Ok(created)
}

/// Extract a file and ingest the result. Returns the number of records
/// created.
pub async fn process_file(
    store: &JsonStore,
    embedder: Option<&Arc<dyn EmbeddingProvider>>,
    segmenter: &Segmenter,
    path: &Path,
    layer: Layer,
    options: IngestOptions,
) -> Result<usize> {
    tracing::info!("processing {}", path.display());
    let content = extract_file(path).await?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());

    ingest_text(
        store,
        embedder,
        segmenter,
        &content,
        layer,
        &stem,
        Some(&path.to_string_lossy()),
        options,
    )
    .await
}

/// Embed all fragments in one batch, best-effort. Any failure (or no
/// provider at all) yields `None` embeddings across the board.
async fn embed_fragments(
    embedder: Option<&Arc<dyn EmbeddingProvider>>,
    fragments: &[String],
) -> Vec<Option<Vec<f32>>> {
    let Some(embedder) = embedder else {
        return vec![None; fragments.len()];
    };
    if fragments.is_empty() {
        return Vec::new();
    }

    match embedder.embed_texts(fragments).await {
        Ok(result) if result.len() == fragments.len() => {
            result.embeddings.into_iter().map(Some).collect()
        }
        Ok(result) => {
            tracing::warn!(
                "embedder returned {} vectors for {} fragments; storing without embeddings",
                result.len(),
                fragments.len()
            );
            vec![None; fragments.len()]
        }
        Err(err) => {
            tracing::warn!("failed to generate embeddings: {err}");
            vec![None; fragments.len()]
        }
    }
}
