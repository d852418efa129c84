//! Collection range index: (collection path, document id) -> batch id.
//!
//! Entries for one collection are contiguous, so a per-collection read is a
//! single prefix scan. Subcollections never match because their encoded path
//! continues with another segment where the scanned prefix ends.
use engine::{OrderedStore, WriteBatch};

use crate::codec::{self, COLLECTION_TABLE};
use crate::error::Result;
use crate::model::{BatchId, DocumentKey, ResourcePath};

pub(crate) fn stage_put(batch: &mut WriteBatch, key: &DocumentKey, batch_id: BatchId) {
    batch.put(codec::collection_key(key), codec::encode_batch_id(batch_id).to_vec());
}

pub(crate) fn stage_delete(batch: &mut WriteBatch, key: &DocumentKey) {
    batch.delete(codec::collection_key(key));
}

/// Documents directly in `collection` whose batch id is `> since_batch_id`,
/// in document order.
pub(crate) fn scan<S: OrderedStore + ?Sized>(
    store: &S,
    collection: &ResourcePath,
    since_batch_id: BatchId,
) -> Result<Vec<(DocumentKey, BatchId)>> {
    let mut out = Vec::new();
    for entry in store.iterate(&codec::collection_prefix(collection))? {
        let (k, v) = entry?;
        let key = codec::decode_collection_key(&k)?;
        let batch_id = codec::decode_batch_id(&v, COLLECTION_TABLE)?;
        if batch_id > since_batch_id {
            out.push((key, batch_id));
        }
    }
    Ok(out)
}

pub(crate) fn scan_all<S: OrderedStore + ?Sized>(store: &S) -> Result<Vec<(DocumentKey, BatchId)>> {
    let mut out = Vec::new();
    for entry in store.iterate(&[codec::TAG_COLLECTION])? {
        let (k, v) = entry?;
        let batch_id = codec::decode_batch_id(&v, COLLECTION_TABLE)?;
        out.push((codec::decode_collection_key(&k)?, batch_id));
    }
    Ok(out)
}
