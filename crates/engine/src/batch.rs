/// Atomic write batches.
///
/// A [`WriteBatch`] is an ordered list of puts and deletes that an
/// [`OrderedStore`](crate::OrderedStore) applies all-or-nothing. Ops run in
/// insertion order, so deleting a key and then putting it again inside the
/// same batch leaves the put.
use anyhow::Result;
use memtable::Memtable;
use wal::BatchOp;

use crate::{MAX_KEY_SIZE, MAX_VALUE_SIZE};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put { key, value });
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Del { key });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Sum of key and value bytes across all ops.
    pub fn approx_size(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match op {
                BatchOp::Put { key, value } => key.len() + value.len(),
                BatchOp::Del { key } => key.len(),
            })
            .sum()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    /// Rejects the whole batch if any op carries an empty or oversized key,
    /// or an oversized value. Nothing is applied when this fails.
    pub fn validate(&self) -> Result<()> {
        for op in &self.ops {
            let key = op.key();
            anyhow::ensure!(!key.is_empty(), "key must not be empty");
            anyhow::ensure!(
                key.len() <= MAX_KEY_SIZE,
                "key too large: {} bytes (max {})",
                key.len(),
                MAX_KEY_SIZE
            );
            if let BatchOp::Put { value, .. } = op {
                anyhow::ensure!(
                    value.len() <= MAX_VALUE_SIZE,
                    "value too large: {} bytes (max {})",
                    value.len(),
                    MAX_VALUE_SIZE
                );
            }
        }
        Ok(())
    }
}

/// Applies `ops` to `mem` in order.
pub(crate) fn apply_ops<'a, I>(mem: &mut Memtable, ops: I)
where
    I: IntoIterator<Item = &'a BatchOp>,
{
    for op in ops {
        match op {
            BatchOp::Put { key, value } => mem.put(key.clone(), value.clone()),
            BatchOp::Del { key } => {
                mem.delete(key);
            }
        }
    }
}
