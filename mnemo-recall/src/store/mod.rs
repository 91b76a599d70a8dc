//! Storage layer for mnemo-recall
//!
//! This module defines the data model ([`Layer`], [`MemoryRecord`],
//! [`MemoryDocument`]) and the error taxonomy shared by every store
//! operation. The concrete JSON-file store lives in [`json_store`].
//!
//! ## Consistency contract
//!
//! - The whole document is one serialization unit: loaded fully, rewritten
//!   fully, never patched in place.
//! - `(layer, key)` identifies a record; a key is unique only within its
//!   layer, and collisions on insert are resolved by deterministic `_1`
//!   suffixing.
//! - Document iteration is deterministic (layer order, then key order).
//!   Search tie-breaking relies on this.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

pub mod json_store;

pub use json_store::{JsonStore, StoreConfig};

/// Minimum content length (in characters, after trimming) accepted by
/// content updates.
pub const MIN_CONTENT_CHARS: usize = 20;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Fixed set of categories partitioning the key space.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Core,
    Cognitive,
    Behavioral,
    Contextual,
    State,
}

impl Layer {
    /// All layers, in document iteration order.
    pub const ALL: [Layer; 5] = [
        Layer::Core,
        Layer::Cognitive,
        Layer::Behavioral,
        Layer::Contextual,
        Layer::State,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Core => "core",
            Layer::Cognitive => "cognitive",
            Layer::Behavioral => "behavioral",
            Layer::Contextual => "contextual",
            Layer::State => "state",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub content: String,
    pub layer: Layer,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub accessed: u64,
    /// Embedding vector for semantic search. Absent when no provider was
    /// available at write time; a stored vector whose dimension no longer
    /// matches the current model is treated as absent by consumers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Input for inserting a new memory into the store.
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub content: String,
    pub tags: BTreeSet<String>,
    pub source: Option<String>,
    /// Explicit key; when `None` a timestamped key is generated.
    pub key: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

/// The whole on-disk document: `layer -> key -> record`.
///
/// `BTreeMap`s keep serialization and iteration deterministic, so a
/// load/save cycle with no mutation is byte-stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryDocument {
    layers: BTreeMap<Layer, BTreeMap<String, MemoryRecord>>,
}

impl MemoryDocument {
    /// Number of records across all layers.
    pub fn len(&self) -> usize {
        self.layers.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records in one layer, keyed.
    pub fn layer(&self, layer: Layer) -> Option<&BTreeMap<String, MemoryRecord>> {
        self.layers.get(&layer)
    }

    pub fn get(&self, layer: Layer, key: &str) -> Option<&MemoryRecord> {
        self.layers.get(&layer).and_then(|l| l.get(key))
    }

    pub fn get_mut(&mut self, layer: Layer, key: &str) -> Option<&mut MemoryRecord> {
        self.layers.get_mut(&layer).and_then(|l| l.get_mut(key))
    }

    pub fn contains(&self, layer: Layer, key: &str) -> bool {
        self.get(layer, key).is_some()
    }

    pub fn insert(&mut self, layer: Layer, key: String, record: MemoryRecord) {
        self.layers.entry(layer).or_default().insert(key, record);
    }

    pub fn remove(&mut self, layer: Layer, key: &str) -> Option<MemoryRecord> {
        let removed = self.layers.get_mut(&layer).and_then(|l| l.remove(key));
        if let Some(entries) = self.layers.get(&layer)
            && entries.is_empty()
        {
            self.layers.remove(&layer);
        }
        removed
    }

    /// Layers that currently hold `key`, in layer order.
    pub fn layers_containing(&self, key: &str) -> Vec<Layer> {
        self.layers
            .iter()
            .filter(|(_, entries)| entries.contains_key(key))
            .map(|(layer, _)| *layer)
            .collect()
    }

    /// Iterate every record in deterministic document order.
    pub fn iter(&self) -> impl Iterator<Item = (Layer, &String, &MemoryRecord)> {
        self.layers.iter().flat_map(|(layer, entries)| {
            entries.iter().map(move |(key, record)| (*layer, key, record))
        })
    }

    /// Per-layer record counts, for listing.
    pub fn layer_counts(&self) -> Vec<(Layer, usize)> {
        self.layers
            .iter()
            .map(|(layer, entries)| (*layer, entries.len()))
            .collect()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.layers.clear();
    }
}

/// Error taxonomy for store operations.
///
/// Only [`StoreError::Corrupted`] is fatal; the CLI entry point decides to
/// terminate on it after the backup file exists. Everything else is an
/// outcome the caller can act on.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Key (or layer) absent. Non-fatal.
    #[error("memory '{key}' not found{}", fmt_layer(.layer))]
    NotFound { key: String, layer: Option<Layer> },

    /// Key present in more than one layer and no layer was specified.
    /// The caller must retry with an explicit layer.
    #[error("key '{key}' exists in multiple layers ({}); specify one with --layer", fmt_layers(.layers))]
    Ambiguous { key: String, layers: Vec<Layer> },

    /// The document failed to parse. A backup copy was written next to the
    /// original before this was raised.
    #[error("memory file {} is corrupted; backed up to {}. Fix or remove the file manually.", .path.display(), .backup.display())]
    Corrupted { path: PathBuf, backup: PathBuf },

    /// Content below the minimum length on an update. The record is
    /// unchanged.
    #[error("content too short: {length} chars (minimum {minimum})")]
    ContentTooShort { length: usize, minimum: usize },

    /// Bulk deletion attempted without explicit confirmation.
    #[error("refusing to delete all memories without explicit confirmation (--yes)")]
    DeletionNotConfirmed,

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

fn fmt_layer(layer: &Option<Layer>) -> String {
    match layer {
        Some(layer) => format!(" in layer '{layer}'"),
        None => " in any layer".to_string(),
    }
}

fn fmt_layers(layers: &[Layer]) -> String {
    layers
        .iter()
        .map(Layer::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(layer: Layer, content: &str) -> MemoryRecord {
        let now = Utc::now();
        MemoryRecord {
            content: content.to_string(),
            layer,
            tags: BTreeSet::new(),
            source: None,
            created: now,
            updated: now,
            accessed: 0,
            embedding: None,
        }
    }

    #[test]
    fn test_document_iteration_is_layer_then_key_order() {
        let mut doc = MemoryDocument::default();
        doc.insert(Layer::State, "b".into(), record(Layer::State, "state b"));
        doc.insert(Layer::Core, "z".into(), record(Layer::Core, "core z"));
        doc.insert(Layer::Core, "a".into(), record(Layer::Core, "core a"));

        let keys: Vec<(Layer, &str)> = doc.iter().map(|(l, k, _)| (l, k.as_str())).collect();
        assert_eq!(
            keys,
            vec![
                (Layer::Core, "a"),
                (Layer::Core, "z"),
                (Layer::State, "b")
            ]
        );
    }

    #[test]
    fn test_layers_containing() {
        let mut doc = MemoryDocument::default();
        doc.insert(Layer::Core, "dup".into(), record(Layer::Core, "one"));
        doc.insert(Layer::State, "dup".into(), record(Layer::State, "two"));
        doc.insert(Layer::Core, "solo".into(), record(Layer::Core, "three"));

        assert_eq!(doc.layers_containing("dup"), vec![Layer::Core, Layer::State]);
        assert_eq!(doc.layers_containing("solo"), vec![Layer::Core]);
        assert!(doc.layers_containing("missing").is_empty());
    }

    #[test]
    fn test_remove_prunes_empty_layers() {
        let mut doc = MemoryDocument::default();
        doc.insert(Layer::Core, "only".into(), record(Layer::Core, "x"));
        assert!(doc.remove(Layer::Core, "only").is_some());
        assert!(doc.is_empty());
        assert!(doc.layer_counts().is_empty());
    }

    #[test]
    fn test_layer_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Layer::Cognitive).unwrap(), "\"cognitive\"");
        let parsed: Layer = serde_json::from_str("\"state\"").unwrap();
        assert_eq!(parsed, Layer::State);
    }

    #[test]
    fn test_record_json_omits_absent_optionals() {
        let rec = record(Layer::Core, "some content");
        let json = serde_json::to_string(&rec).unwrap();
        assert!(!json.contains("embedding"));
        assert!(!json.contains("source"));
    }
}
