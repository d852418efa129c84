//! Collection-group range index: (group, batch id, document) -> marker.
//!
//! Keys sort by batch id first inside a group, so a forward scan from
//! `since_batch_id + 1` visits documents in exactly the order pages are cut.
//!
//! ## Batch-atomic pagination
//!
//! Once `count` documents have been collected the scan keeps going until the
//! batch id changes. A page therefore never ends in the middle of a batch:
//! if it holds any document of its highest batch, it holds all of them.
use engine::{OrderedStore, WriteBatch};

use crate::codec::{self, GROUP_TABLE};
use crate::error::{OverlayError, Result};
use crate::model::{BatchId, DocumentKey};

pub(crate) fn stage_put(batch: &mut WriteBatch, key: &DocumentKey, batch_id: BatchId) {
    batch.put(codec::group_key(key, batch_id), Vec::new());
}

pub(crate) fn stage_delete(batch: &mut WriteBatch, key: &DocumentKey, batch_id: BatchId) {
    batch.delete(codec::group_key(key, batch_id));
}

pub(crate) fn scan<S: OrderedStore + ?Sized>(
    store: &S,
    group: &str,
    since_batch_id: BatchId,
    count: usize,
) -> Result<Vec<(DocumentKey, BatchId)>> {
    // nothing can be newer than i32::MAX
    let Some(first) = since_batch_id.checked_add(1) else {
        return Ok(Vec::new());
    };

    let prefix = codec::group_prefix(group);
    let start = codec::group_start(group, first);

    let mut out: Vec<(DocumentKey, BatchId)> = Vec::new();
    for entry in store.scan(&prefix, &start)? {
        let (k, _) = entry?;
        let (entry_group, batch_id, key) = codec::decode_group_key(&k)?;
        if entry_group != group {
            return Err(OverlayError::corrupt(
                GROUP_TABLE,
                format!("entry for group {:?} under prefix of {:?}", entry_group, group),
            ));
        }

        let last_batch = out.last().map(|(_, b)| *b);
        if out.len() >= count && last_batch != Some(batch_id) {
            break;
        }
        out.push((key, batch_id));
    }
    Ok(out)
}

/// Returns `(group, batch_id, document)` for every entry.
pub(crate) fn scan_all<S: OrderedStore + ?Sized>(
    store: &S,
) -> Result<Vec<(String, BatchId, DocumentKey)>> {
    let mut out = Vec::new();
    for entry in store.iterate(&[codec::TAG_GROUP])? {
        let (k, _) = entry?;
        out.push(codec::decode_group_key(&k)?);
    }
    Ok(out)
}
