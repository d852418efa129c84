//! Largest-batch-id index: (batch id, document) -> marker.
//!
//! Lets batch removal enumerate exactly the documents whose current overlay
//! belongs to one batch, without touching any other batch's entries.
use engine::{OrderedStore, WriteBatch};

use crate::codec;
use crate::error::{OverlayError, Result};
use crate::model::{BatchId, DocumentKey};

pub(crate) fn stage_put(batch: &mut WriteBatch, key: &DocumentKey, batch_id: BatchId) {
    batch.put(codec::batch_key(batch_id, key), Vec::new());
}

pub(crate) fn stage_delete(batch: &mut WriteBatch, key: &DocumentKey, batch_id: BatchId) {
    batch.delete(codec::batch_key(batch_id, key));
}

/// Documents indexed under exactly `batch_id`.
pub(crate) fn keys_for_batch<S: OrderedStore + ?Sized>(
    store: &S,
    batch_id: BatchId,
) -> Result<Vec<DocumentKey>> {
    let mut out = Vec::new();
    for entry in store.iterate(&codec::batch_prefix(batch_id))? {
        let (k, _) = entry?;
        let (entry_batch, key) = codec::decode_batch_key(&k)?;
        if entry_batch != batch_id {
            return Err(OverlayError::corrupt(
                codec::BATCH_TABLE,
                format!("batch {} entry under prefix of batch {}", entry_batch, batch_id),
            ));
        }
        out.push(key);
    }
    Ok(out)
}

pub(crate) fn scan_all<S: OrderedStore + ?Sized>(store: &S) -> Result<Vec<(BatchId, DocumentKey)>> {
    let mut out = Vec::new();
    for entry in store.iterate(&[codec::TAG_BATCH])? {
        let (k, _) = entry?;
        out.push(codec::decode_batch_key(&k)?);
    }
    Ok(out)
}
