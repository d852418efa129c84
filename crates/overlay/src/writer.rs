//! Batch writer: turns one overlay-cache mutation into one atomic
//! [`WriteBatch`] touching all four tables.
//!
//! Staging only reads. Nothing becomes visible until the caller hands the
//! returned batch to [`OrderedStore::write`], which applies it whole or not
//! at all.
use engine::{OrderedStore, WriteBatch};

use crate::error::{OverlayError, Result};
use crate::model::{BatchId, DocumentKey, MutationMap, Overlay};
use crate::{batch_index, collection_index, group_index, primary};

/// Stages `save_overlays(largest_batch_id, overlays)`.
///
/// A document that already has an overlay loses its old secondary entries
/// first: the group and batch indexes embed the batch id in the key, so a
/// new batch id means a new key, not a new value.
pub(crate) fn stage_save<S: OrderedStore + ?Sized>(
    store: &S,
    largest_batch_id: BatchId,
    overlays: &MutationMap,
) -> Result<WriteBatch> {
    let mut batch = WriteBatch::new();
    for (key, mutation) in overlays {
        if let Some(previous) = primary::read(store, key)? {
            stage_unindex(&mut batch, &previous);
        }
        primary::stage_put(&mut batch, key, largest_batch_id, mutation);
        collection_index::stage_put(&mut batch, key, largest_batch_id);
        group_index::stage_put(&mut batch, key, largest_batch_id);
        batch_index::stage_put(&mut batch, key, largest_batch_id);
    }
    Ok(batch)
}

/// Stages removal of every overlay whose current batch id is exactly
/// `batch_id`. Returns the batch and the documents it removes.
pub(crate) fn stage_remove<S: OrderedStore + ?Sized>(
    store: &S,
    batch_id: BatchId,
) -> Result<(WriteBatch, Vec<DocumentKey>)> {
    let keys = batch_index::keys_for_batch(store, batch_id)?;

    let mut batch = WriteBatch::new();
    for key in &keys {
        let overlay = primary::read(store, key)?.ok_or_else(|| {
            OverlayError::inconsistent(key, format!("batch {} entry has no overlay", batch_id))
        })?;
        if overlay.largest_batch_id != batch_id {
            return Err(OverlayError::inconsistent(
                key,
                format!(
                    "batch index says {} but overlay has {}",
                    batch_id, overlay.largest_batch_id
                ),
            ));
        }
        primary::stage_delete(&mut batch, key);
        stage_unindex(&mut batch, &overlay);
    }
    Ok((batch, keys))
}

fn stage_unindex(batch: &mut WriteBatch, overlay: &Overlay) {
    collection_index::stage_delete(batch, &overlay.key);
    group_index::stage_delete(batch, &overlay.key, overlay.largest_batch_id);
    batch_index::stage_delete(batch, &overlay.key, overlay.largest_batch_id);
}
