//! mnemo-recall: layered persistent note store with hybrid retrieval
//!
//! This crate holds the stateful half of mnemo: a single JSON document of
//! `(layer, key) -> record` entries, plus the components that feed and query
//! it.
//!
//! ## Key Modules
//!
//! - **[`store`]**: the memory document, its record types, and the
//!   lock-guarded JSON store with corruption backup
//! - **[`search`]**: hybrid ranked retrieval (cosine similarity with
//!   substring keyword fallback)
//! - **[`indexer`]**: tag and content mutation on existing records,
//!   plus full embedding reindex
//! - **[`extract`]**: text extraction from binary documents via the
//!   `markitdown` subprocess
//! - **[`pipeline`]**: segmentation-driven ingest of raw text and files
//!
//! ## Architecture
//!
//! ```text
//! Files → extract → Segmenter → fragments → JsonStore (memories.json)
//!                                  ↑              ↓
//!            EmbeddingProvider (optional)    SearchEngine / Indexer
//! ```
//!
//! Everything runs load → mutate → save against the whole document, under
//! an advisory exclusive lock scoped to that sequence. Two concurrent
//! invocations exclude each other; nothing stronger is promised.

pub mod extract;
pub mod indexer;
pub mod pipeline;
pub mod search;
pub mod store;
