/// Non-durable [`OrderedStore`] backed directly by a [`Memtable`].
use anyhow::Result;
use memtable::Memtable;

use crate::batch::apply_ops;
use crate::{OrderedStore, ScanIter, WriteBatch};

#[derive(Debug, Default)]
pub struct MemStore {
    mem: Memtable,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }
}

impl OrderedStore for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.mem.get(key).map(<[u8]>::to_vec))
    }

    fn scan<'a>(&'a self, prefix: &[u8], start: &[u8]) -> Result<ScanIter<'a>> {
        Ok(Box::new(
            self.mem
                .range_from(prefix, start)
                .map(|(k, v)| Ok((k.to_vec(), v.to_vec()))),
        ))
    }

    fn write(&mut self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        batch.validate()?;
        apply_ops(&mut self.mem, batch.ops());
        Ok(())
    }
}
