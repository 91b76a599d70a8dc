//! JSON-file backed store implementation.
//!
//! One pretty-printed UTF-8 JSON document holds every memory. Every
//! operation loads the whole document, mutates it in memory, and rewrites
//! it as a unit; an advisory exclusive lock on a sidecar `.lock` file spans
//! each load–mutate–save sequence so concurrent invocations exclude each
//! other (mutual exclusion only, no FIFO ordering).
//!
//! A document that fails to parse is a fatal condition: the file is copied
//! to a `.bak` sibling and [`StoreError::Corrupted`] is returned. Losing
//! accumulated memories is worse than a failed command, so nothing is ever
//! silently discarded or overwritten.

use super::{Layer, MemoryDocument, MemoryRecord, NewMemory, Result, StoreError};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// Environment variable selecting the storage directory.
pub const DATA_DIR_ENV: &str = "MNEMO_DATA_DIR";

/// Default directory name under the user's home directory.
const DEFAULT_DIR_NAME: &str = ".mnemo";

/// Where the store keeps its files.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    data_dir: PathBuf,
}

impl StoreConfig {
    /// Build a configuration for an explicit directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Resolve the storage directory: explicit override, else the
    /// `MNEMO_DATA_DIR` environment variable, else `~/.mnemo`.
    ///
    /// This is the only place the environment is consulted; the store
    /// itself always receives an explicit path.
    pub fn resolve(override_dir: Option<PathBuf>) -> Self {
        let data_dir = override_dir
            .or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(DEFAULT_DIR_NAME)
            });
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the memory document.
    pub fn memory_file(&self) -> PathBuf {
        self.data_dir.join("memories.json")
    }

    /// Path of the sidecar lock file.
    pub fn lock_file(&self) -> PathBuf {
        self.data_dir.join("memories.json.lock")
    }

    /// Path the document is backed up to when it fails to parse.
    pub fn backup_file(&self) -> PathBuf {
        self.data_dir.join("memories.json.bak")
    }
}

/// The JSON-document store.
pub struct JsonStore {
    config: StoreConfig,
}

impl JsonStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Load the whole document.
    ///
    /// A missing file is an empty document. A file that fails to parse is
    /// backed up to `memories.json.bak` and reported as
    /// [`StoreError::Corrupted`].
    pub fn load(&self) -> Result<MemoryDocument> {
        let path = self.config.memory_file();
        if !path.exists() {
            return Ok(MemoryDocument::default());
        }

        let raw = fs::read_to_string(&path)?;
        match serde_json::from_str(&raw) {
            Ok(doc) => Ok(doc),
            Err(parse_err) => {
                let backup = self.config.backup_file();
                tracing::error!(
                    "memory file {} failed to parse: {parse_err}",
                    path.display()
                );
                if let Err(copy_err) = fs::copy(&path, &backup) {
                    tracing::error!(
                        "could not back up corrupted file to {}: {copy_err}",
                        backup.display()
                    );
                }
                Err(StoreError::Corrupted { path, backup })
            }
        }
    }

    /// Rewrite the whole document.
    pub fn save(&self, doc: &MemoryDocument) -> Result<()> {
        fs::create_dir_all(self.config.data_dir())?;
        let serialized = serde_json::to_string_pretty(doc)?;
        fs::write(self.config.memory_file(), serialized)?;
        Ok(())
    }

    /// Run `f` against the document under the advisory exclusive lock,
    /// saving afterwards. The lock is held only for this
    /// load–mutate–save sequence. An error from `f` skips the save.
    pub(crate) fn with_exclusive<R>(
        &self,
        f: impl FnOnce(&mut MemoryDocument) -> Result<R>,
    ) -> Result<R> {
        fs::create_dir_all(self.config.data_dir())?;
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.config.lock_file())?;
        let mut lock = fd_lock::RwLock::new(lock_file);
        let _guard = lock.write()?;

        let mut doc = self.load()?;
        let out = f(&mut doc)?;
        self.save(&doc)?;
        Ok(out)
    }

    /// Read-only view of the document. No lock, no access counting.
    pub fn snapshot(&self) -> Result<MemoryDocument> {
        self.load()
    }

    /// Insert a new memory, returning the key it was stored under.
    ///
    /// Without an explicit key a timestamped one is generated
    /// (`mem_<MMDD_HHMM>_<SS><micros>`). Either way, a key already present
    /// in the layer gets `_1` appended until it is unique.
    pub fn insert(&self, layer: Layer, new: NewMemory) -> Result<String> {
        let now = Utc::now();
        let mut key = new
            .key
            .unwrap_or_else(|| format!("mem_{}", now.format("%m%d_%H%M_%S%6f")));

        self.with_exclusive(|doc| {
            while doc.contains(layer, &key) {
                key = format!("{key}_1");
            }
            doc.insert(
                layer,
                key.clone(),
                MemoryRecord {
                    content: new.content,
                    layer,
                    tags: new.tags,
                    source: new.source,
                    created: now,
                    updated: now,
                    accessed: 0,
                    embedding: new.embedding,
                },
            );
            Ok(key.clone())
        })
    }

    /// Fetch a record, bumping and persisting its access counter.
    ///
    /// With no layer given, all layers are scanned: exactly one hit returns
    /// the record, zero hits is [`StoreError::NotFound`], and more than one
    /// is [`StoreError::Ambiguous`].
    pub fn get(&self, key: &str, layer: Option<Layer>) -> Result<MemoryRecord> {
        self.with_exclusive(|doc| {
            let layer = resolve_layer(doc, key, layer)?;
            let record = doc.get_mut(layer, key).ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
                layer: Some(layer),
            })?;
            record.accessed += 1;
            Ok(record.clone())
        })
    }

    /// Delete a record, following the same disambiguation rules as
    /// [`Self::get`]. Returns the layer it was deleted from.
    pub fn delete(&self, key: &str, layer: Option<Layer>) -> Result<Layer> {
        self.with_exclusive(|doc| {
            let layer = resolve_layer(doc, key, layer)?;
            doc.remove(layer, key).ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
                layer: Some(layer),
            })?;
            Ok(layer)
        })
    }

    /// Delete every memory. Refuses to run unless `confirmed` is true.
    pub fn delete_all(&self, confirmed: bool) -> Result<()> {
        if !confirmed {
            return Err(StoreError::DeletionNotConfirmed);
        }
        self.with_exclusive(|doc| {
            doc.clear();
            Ok(())
        })
    }
}

/// Resolve which layer holds `key`, erroring on zero or multiple candidates
/// when the caller did not pin one down.
fn resolve_layer(doc: &MemoryDocument, key: &str, layer: Option<Layer>) -> Result<Layer> {
    match layer {
        Some(layer) => {
            if doc.contains(layer, key) {
                Ok(layer)
            } else {
                Err(StoreError::NotFound {
                    key: key.to_string(),
                    layer: Some(layer),
                })
            }
        }
        None => {
            let candidates = doc.layers_containing(key);
            match candidates.as_slice() {
                [] => Err(StoreError::NotFound {
                    key: key.to_string(),
                    layer: None,
                }),
                [only] => Ok(*only),
                multiple => Err(StoreError::Ambiguous {
                    key: key.to_string(),
                    layers: multiple.to_vec(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> JsonStore {
        JsonStore::new(StoreConfig::new(dir))
    }

    fn note(content: &str) -> NewMemory {
        NewMemory {
            content: content.to_string(),
            ..Default::default()
        }
    }

    fn keyed(content: &str, key: &str) -> NewMemory {
        NewMemory {
            content: content.to_string(),
            key: Some(key.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_file_loads_as_empty_document() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_insert_then_get_roundtrip() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let key = store
            .insert(Layer::Cognitive, keyed("remember the milk", "milk"))
            .unwrap();
        assert_eq!(key, "milk");

        let record = store.get("milk", Some(Layer::Cognitive)).unwrap();
        assert_eq!(record.content, "remember the milk");
        assert_eq!(record.layer, Layer::Cognitive);
    }

    #[test]
    fn test_accessed_counter_tracks_gets_exactly() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.insert(Layer::Core, keyed("counted content", "k")).unwrap();

        for expected in 1..=3u64 {
            let record = store.get("k", Some(Layer::Core)).unwrap();
            assert_eq!(record.accessed, expected);
        }

        // The increment is persisted, not just in-memory.
        let record = store.snapshot().unwrap().get(Layer::Core, "k").cloned().unwrap();
        assert_eq!(record.accessed, 3);
    }

    #[test]
    fn test_key_collision_gets_suffixed() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let first = store.insert(Layer::Core, keyed("first body", "dup")).unwrap();
        let second = store.insert(Layer::Core, keyed("second body", "dup")).unwrap();
        let third = store.insert(Layer::Core, keyed("third body", "dup")).unwrap();

        assert_eq!(first, "dup");
        assert_eq!(second, "dup_1");
        assert_eq!(third, "dup_1_1");

        // Same key in a different layer is not a collision.
        let other_layer = store.insert(Layer::State, keyed("state body", "dup")).unwrap();
        assert_eq!(other_layer, "dup");
    }

    #[test]
    fn test_generated_keys_are_timestamped() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let key = store.insert(Layer::Cognitive, note("auto keyed")).unwrap();
        assert!(key.starts_with("mem_"));
    }

    #[test]
    fn test_get_without_layer_scans_all_layers() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.insert(Layer::Behavioral, keyed("habit notes", "habit")).unwrap();

        let record = store.get("habit", None).unwrap();
        assert_eq!(record.layer, Layer::Behavioral);
    }

    #[test]
    fn test_get_ambiguous_key_requires_layer() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.insert(Layer::Core, keyed("core copy", "dup")).unwrap();
        store.insert(Layer::State, keyed("state copy", "dup")).unwrap();

        let err = store.get("dup", None).unwrap_err();
        match err {
            StoreError::Ambiguous { key, layers } => {
                assert_eq!(key, "dup");
                assert_eq!(layers, vec![Layer::Core, Layer::State]);
            }
            other => panic!("expected Ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn test_ambiguous_delete_leaves_both_records_intact() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.insert(Layer::Core, keyed("core copy", "dup")).unwrap();
        store.insert(Layer::State, keyed("state copy", "dup")).unwrap();

        assert!(matches!(
            store.delete("dup", None),
            Err(StoreError::Ambiguous { .. })
        ));

        let doc = store.snapshot().unwrap();
        assert!(doc.contains(Layer::Core, "dup"));
        assert!(doc.contains(Layer::State, "dup"));
    }

    #[test]
    fn test_delete_with_layer_removes_only_that_copy() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.insert(Layer::Core, keyed("core copy", "dup")).unwrap();
        store.insert(Layer::State, keyed("state copy", "dup")).unwrap();

        let deleted_from = store.delete("dup", Some(Layer::Core)).unwrap();
        assert_eq!(deleted_from, Layer::Core);

        let doc = store.snapshot().unwrap();
        assert!(!doc.contains(Layer::Core, "dup"));
        assert!(doc.contains(Layer::State, "dup"));
    }

    #[test]
    fn test_delete_missing_key_is_not_found() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(matches!(
            store.delete("ghost", None),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_all_requires_confirmation() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.insert(Layer::Core, keyed("precious data", "keep")).unwrap();

        assert!(matches!(
            store.delete_all(false),
            Err(StoreError::DeletionNotConfirmed)
        ));
        assert_eq!(store.snapshot().unwrap().len(), 1);

        store.delete_all(true).unwrap();
        assert!(store.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_save_load_cycle_is_byte_stable() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.insert(Layer::Core, keyed("alpha content", "a")).unwrap();
        store.insert(Layer::State, keyed("zeta content", "z")).unwrap();

        let bytes_before = fs::read(store.config().memory_file()).unwrap();
        let doc = store.load().unwrap();
        store.save(&doc).unwrap();
        let bytes_after = fs::read(store.config().memory_file()).unwrap();

        assert_eq!(bytes_before, bytes_after);
    }

    #[test]
    fn test_corrupted_file_is_backed_up_and_fatal() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(store.config().memory_file(), "{ not valid json !").unwrap();

        let err = store.load().unwrap_err();
        match err {
            StoreError::Corrupted { path, backup } => {
                assert_eq!(path, store.config().memory_file());
                assert!(backup.exists());
                assert_eq!(fs::read_to_string(backup).unwrap(), "{ not valid json !");
            }
            other => panic!("expected Corrupted, got {other:?}"),
        }

        // The original is untouched so it can be repaired manually.
        assert!(store.config().memory_file().exists());
    }
}
