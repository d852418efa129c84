//! Primary index: document key -> (batch id, mutation).
//!
//! Source of truth for point lookups. Every secondary entry must agree with
//! the batch id stored here.
use engine::{OrderedStore, WriteBatch};

use crate::codec;
use crate::error::Result;
use crate::model::{BatchId, DocumentKey, Mutation, Overlay};

pub(crate) fn read<S: OrderedStore + ?Sized>(store: &S, key: &DocumentKey) -> Result<Option<Overlay>> {
    let Some(raw) = store.get(&codec::primary_key(key))? else {
        return Ok(None);
    };
    let (batch_id, mutation) = codec::decode_record(&raw)?;
    Ok(Some(Overlay::new(key.clone(), mutation, batch_id)))
}

pub(crate) fn stage_put(batch: &mut WriteBatch, key: &DocumentKey, batch_id: BatchId, mutation: &Mutation) {
    batch.put(codec::primary_key(key), codec::encode_record(batch_id, mutation));
}

pub(crate) fn stage_delete(batch: &mut WriteBatch, key: &DocumentKey) {
    batch.delete(codec::primary_key(key));
}

/// Every stored overlay, in document order.
pub(crate) fn scan_all<S: OrderedStore + ?Sized>(store: &S) -> Result<Vec<Overlay>> {
    let mut out = Vec::new();
    for entry in store.iterate(&codec::primary_table_prefix())? {
        let (k, v) = entry?;
        let key = codec::decode_primary_key(&k)?;
        let (batch_id, mutation) = codec::decode_record(&v)?;
        out.push(Overlay::new(key, mutation, batch_id));
    }
    Ok(out)
}

pub(crate) fn count<S: OrderedStore + ?Sized>(store: &S) -> Result<usize> {
    let mut n = 0;
    for entry in store.iterate(&codec::primary_table_prefix())? {
        entry?;
        n += 1;
    }
    Ok(n)
}
