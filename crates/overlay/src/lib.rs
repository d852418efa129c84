//! # Overlay - indexed store of pending local document mutations
//!
//! An overlay is the net effect of every not-yet-acknowledged local write to
//! one document, tagged with the largest write batch folded into it. This
//! crate keeps overlays in an [`OrderedStore`](engine::OrderedStore) behind
//! four tables that are only ever changed together:
//!
//! ```text
//!   save_overlays / remove_overlays_for_batch
//!                     |
//!                     v
//!               writer.rs  (one WriteBatch per call)
//!      ┌──────────┬──────┴─────┬──────────────┐
//!      v          v            v              v
//!   primary   collection     group          batch
//!   doc ->    coll+id ->     group+batch    batch+doc
//!   record    batch_id       +doc -> ""     -> ""
//! ```
//!
//! | Module               | Purpose                                          |
//! |----------------------|--------------------------------------------------|
//! | [`model`]            | Paths, `DocumentKey`, `Mutation`, `Overlay`      |
//! | [`codec`]            | Order-preserving keys and the primary record     |
//! | `primary`            | Point lookups, source of truth                   |
//! | `collection_index`   | Per-collection prefix scans                      |
//! | `group_index`        | Batch-ordered group scans, batch-atomic pages    |
//! | `batch_index`        | Exact-match enumeration for batch removal        |
//! | `writer`             | Stages every mutation as one atomic batch        |
//! | [`IndexedOverlayStore`] | The index-backed [`OverlayStore`]             |
//! | [`MemoryOverlayStore`]  | Map-backed [`OverlayStore`]                   |
//!
//! ## Example
//!
//! ```rust
//! use engine::MemStore;
//! use overlay::{DocumentKey, IndexedOverlayStore, Mutation, MutationMap, OverlayStore};
//!
//! let mut cache = IndexedOverlayStore::new(MemStore::new());
//! let key = DocumentKey::parse("rooms/r1").unwrap();
//!
//! let mut batch = MutationMap::new();
//! batch.insert(key.clone(), Mutation::from("set name=lobby"));
//! cache.save_overlays(7, &batch).unwrap();
//!
//! let overlay = cache.get_overlay(&key).unwrap().unwrap();
//! assert_eq!(overlay.largest_batch_id, 7);
//!
//! cache.remove_overlays_for_batch(7).unwrap();
//! assert!(cache.get_overlay(&key).unwrap().is_none());
//! ```
pub mod codec;
pub mod error;
pub mod model;

mod batch_index;
mod collection_index;
mod group_index;
mod indexed;
mod memory;
mod primary;
mod writer;

pub use error::{OverlayError, Result};
pub use indexed::IndexedOverlayStore;
pub use memory::MemoryOverlayStore;
pub use model::{
    BatchId, DocumentKey, Mutation, MutationMap, Overlay, OverlayMap, ResourcePath,
    UNKNOWN_BATCH_ID,
};

/// The overlay cache consumed by the sync layer.
///
/// Callers serialize access. Every mutating call either applies fully or
/// leaves the cache unchanged.
pub trait OverlayStore {
    /// The overlay for `key`, if one exists.
    fn get_overlay(&self, key: &DocumentKey) -> Result<Option<Overlay>>;

    /// Creates or replaces the overlay of every document in `overlays`, all
    /// tagged with `largest_batch_id`.
    fn save_overlays(&mut self, largest_batch_id: BatchId, overlays: &MutationMap) -> Result<()>;

    /// Removes every overlay whose batch id is exactly `batch_id`. Overlays
    /// since replaced by a later batch are untouched. Returns how many were
    /// removed; an unused id removes nothing.
    fn remove_overlays_for_batch(&mut self, batch_id: BatchId) -> Result<usize>;

    /// Overlays of documents directly in `collection` with a batch id
    /// greater than `since_batch_id`.
    fn get_overlays_in_collection(
        &self,
        collection: &ResourcePath,
        since_batch_id: BatchId,
    ) -> Result<OverlayMap>;

    /// Overlays in every collection with id `group_id` and a batch id greater
    /// than `since_batch_id`, taken in batch order.
    ///
    /// Stops once at least `count` documents are collected and the next one
    /// belongs to a different batch, so a batch is never split across pages.
    /// Fewer than `count` results means the group is exhausted.
    fn get_overlays_in_collection_group(
        &self,
        group_id: &str,
        since_batch_id: BatchId,
        count: usize,
    ) -> Result<OverlayMap>;

    /// Point lookups for several documents. Absent documents are left out.
    fn get_overlays_for_keys(&self, keys: &[DocumentKey]) -> Result<OverlayMap> {
        let mut out = OverlayMap::new();
        for key in keys {
            if let Some(overlay) = self.get_overlay(key)? {
                out.insert(key.clone(), overlay);
            }
        }
        Ok(out)
    }

    /// Number of stored overlays.
    fn overlay_count(&self) -> Result<usize>;
}

#[cfg(test)]
mod tests;
