//! [`IndexedOverlayStore`]: the overlay cache over any [`OrderedStore`].
use std::collections::{BTreeMap, BTreeSet};

use engine::OrderedStore;

use crate::error::{OverlayError, Result};
use crate::model::{BatchId, DocumentKey, MutationMap, OverlayMap, ResourcePath};
use crate::{batch_index, collection_index, group_index, primary, writer, Overlay, OverlayStore};

/// Overlay cache backed by four tables in one ordered store.
///
/// Every mutating call issues exactly one [`OrderedStore::write`], so readers
/// never see the primary and secondary indexes disagree.
#[derive(Debug)]
pub struct IndexedOverlayStore<S> {
    store: S,
}

impl<S: OrderedStore> IndexedOverlayStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct access to the underlying store. Writing through it bypasses
    /// the index invariants.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Audits every table against the primary index.
    ///
    /// Each overlay must have exactly one entry in each secondary index,
    /// carrying its batch id, and no secondary entry may lack an overlay.
    /// Returns the number of overlays checked.
    pub fn verify_indexes(&self) -> Result<usize> {
        let overlays: BTreeMap<DocumentKey, BatchId> = primary::scan_all(&self.store)?
            .into_iter()
            .map(|o| (o.key, o.largest_batch_id))
            .collect();

        let expect = |key: &DocumentKey, batch_id: BatchId, table: &str| -> Result<()> {
            match overlays.get(key) {
                Some(&b) if b == batch_id => Ok(()),
                Some(&b) => Err(OverlayError::inconsistent(
                    key,
                    format!("{} has batch {} but overlay has {}", table, batch_id, b),
                )),
                None => Err(OverlayError::inconsistent(
                    key,
                    format!("{} entry without overlay", table),
                )),
            }
        };
        let complete = |seen: &BTreeSet<DocumentKey>, table: &str| -> Result<()> {
            match overlays.keys().find(|k| !seen.contains(*k)) {
                Some(missing) => Err(OverlayError::inconsistent(
                    missing,
                    format!("overlay missing from {}", table),
                )),
                None => Ok(()),
            }
        };

        let mut seen = BTreeSet::new();
        for (key, batch_id) in collection_index::scan_all(&self.store)? {
            expect(&key, batch_id, "collection index")?;
            seen.insert(key);
        }
        complete(&seen, "collection index")?;

        seen.clear();
        for (group, batch_id, key) in group_index::scan_all(&self.store)? {
            expect(&key, batch_id, "group index")?;
            if group != key.collection_group() {
                return Err(OverlayError::inconsistent(
                    &key,
                    format!("filed under group {:?}", group),
                ));
            }
            if !seen.insert(key.clone()) {
                return Err(OverlayError::inconsistent(&key, "duplicate group index entry"));
            }
        }
        complete(&seen, "group index")?;

        seen.clear();
        for (batch_id, key) in batch_index::scan_all(&self.store)? {
            expect(&key, batch_id, "batch index")?;
            if !seen.insert(key.clone()) {
                return Err(OverlayError::inconsistent(&key, "duplicate batch index entry"));
            }
        }
        complete(&seen, "batch index")?;

        Ok(overlays.len())
    }

    /// Resolves index hits against the primary index. A hit with no overlay,
    /// or with a different batch id, is an inconsistency.
    fn join(&self, hits: Vec<(DocumentKey, BatchId)>, table: &str) -> Result<OverlayMap> {
        let mut out = OverlayMap::new();
        for (key, batch_id) in hits {
            let overlay = primary::read(&self.store, &key)?.ok_or_else(|| {
                OverlayError::inconsistent(&key, format!("{} entry without overlay", table))
            })?;
            if overlay.largest_batch_id != batch_id {
                return Err(OverlayError::inconsistent(
                    &key,
                    format!(
                        "{} has batch {} but overlay has {}",
                        table, batch_id, overlay.largest_batch_id
                    ),
                ));
            }
            out.insert(key, overlay);
        }
        Ok(out)
    }
}

impl<S: OrderedStore> OverlayStore for IndexedOverlayStore<S> {
    fn get_overlay(&self, key: &DocumentKey) -> Result<Option<Overlay>> {
        primary::read(&self.store, key)
    }

    fn save_overlays(&mut self, largest_batch_id: BatchId, overlays: &MutationMap) -> Result<()> {
        if overlays.is_empty() {
            return Ok(());
        }
        let batch = writer::stage_save(&self.store, largest_batch_id, overlays)?;
        self.store.write(batch)?;
        log::debug!(
            "saved {} overlays for batch {}",
            overlays.len(),
            largest_batch_id
        );
        Ok(())
    }

    fn remove_overlays_for_batch(&mut self, batch_id: BatchId) -> Result<usize> {
        let (batch, removed) = writer::stage_remove(&self.store, batch_id)?;
        if removed.is_empty() {
            return Ok(0);
        }
        self.store.write(batch)?;
        log::debug!("removed {} overlays of batch {}", removed.len(), batch_id);
        Ok(removed.len())
    }

    fn get_overlays_in_collection(
        &self,
        collection: &ResourcePath,
        since_batch_id: BatchId,
    ) -> Result<OverlayMap> {
        let hits = collection_index::scan(&self.store, collection, since_batch_id)?;
        self.join(hits, "collection index")
    }

    fn get_overlays_in_collection_group(
        &self,
        group_id: &str,
        since_batch_id: BatchId,
        count: usize,
    ) -> Result<OverlayMap> {
        let hits = group_index::scan(&self.store, group_id, since_batch_id, count)?;
        self.join(hits, "group index")
    }

    fn overlay_count(&self) -> Result<usize> {
        primary::count(&self.store)
    }
}
