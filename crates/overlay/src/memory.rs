//! [`MemoryOverlayStore`]: maps only, no ordered store underneath.
use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::model::{BatchId, DocumentKey, MutationMap, Overlay, OverlayMap, ResourcePath};
use crate::OverlayStore;

/// Map-backed overlay cache with the same observable behavior as
/// [`IndexedOverlayStore`](crate::IndexedOverlayStore).
#[derive(Debug, Default, Clone)]
pub struct MemoryOverlayStore {
    overlays: BTreeMap<DocumentKey, Overlay>,
    by_batch: BTreeMap<BatchId, BTreeSet<DocumentKey>>,
}

impl MemoryOverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn unlink(&mut self, key: &DocumentKey, batch_id: BatchId) {
        if let Some(keys) = self.by_batch.get_mut(&batch_id) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_batch.remove(&batch_id);
            }
        }
    }
}

impl OverlayStore for MemoryOverlayStore {
    fn get_overlay(&self, key: &DocumentKey) -> Result<Option<Overlay>> {
        Ok(self.overlays.get(key).cloned())
    }

    fn save_overlays(&mut self, largest_batch_id: BatchId, overlays: &MutationMap) -> Result<()> {
        for (key, mutation) in overlays {
            let overlay = Overlay::new(key.clone(), mutation.clone(), largest_batch_id);
            if let Some(previous) = self.overlays.insert(key.clone(), overlay) {
                self.unlink(key, previous.largest_batch_id);
            }
            self.by_batch
                .entry(largest_batch_id)
                .or_default()
                .insert(key.clone());
        }
        Ok(())
    }

    fn remove_overlays_for_batch(&mut self, batch_id: BatchId) -> Result<usize> {
        let keys = self.by_batch.remove(&batch_id).unwrap_or_default();
        for key in &keys {
            self.overlays.remove(key);
        }
        Ok(keys.len())
    }

    fn get_overlays_in_collection(
        &self,
        collection: &ResourcePath,
        since_batch_id: BatchId,
    ) -> Result<OverlayMap> {
        Ok(self
            .overlays
            .iter()
            .filter(|(key, o)| key.has_collection(collection) && o.largest_batch_id > since_batch_id)
            .map(|(key, o)| (key.clone(), o.clone()))
            .collect())
    }

    fn get_overlays_in_collection_group(
        &self,
        group_id: &str,
        since_batch_id: BatchId,
        count: usize,
    ) -> Result<OverlayMap> {
        let mut out = OverlayMap::new();
        let Some(first) = since_batch_id.checked_add(1) else {
            return Ok(out);
        };

        for keys in self.by_batch.range(first..).map(|(_, keys)| keys) {
            let mut in_group = keys
                .iter()
                .filter(|key| key.collection_group() == group_id)
                .peekable();
            if in_group.peek().is_none() {
                continue;
            }
            // whole batches only
            if out.len() >= count {
                break;
            }
            for key in in_group {
                if let Some(overlay) = self.overlays.get(key) {
                    out.insert(key.clone(), overlay.clone());
                }
            }
        }
        Ok(out)
    }

    fn overlay_count(&self) -> Result<usize> {
        Ok(self.overlays.len())
    }
}
