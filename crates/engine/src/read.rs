/// Read path and the [`OrderedStore`] implementation for [`Engine`].
///
/// The memtable holds the full live state, so point lookups and scans never
/// touch disk.
use anyhow::Result;

use crate::{Engine, OrderedStore, ScanIter, WriteBatch};

impl Engine {
    /// Looks up a key, returning its current value.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.mem.get(key).map(<[u8]>::to_vec))
    }
}

impl OrderedStore for Engine {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Engine::get(self, key)
    }

    fn scan<'a>(&'a self, prefix: &[u8], start: &[u8]) -> Result<ScanIter<'a>> {
        Ok(Box::new(
            self.mem
                .range_from(prefix, start)
                .map(|(k, v)| Ok((k.to_vec(), v.to_vec()))),
        ))
    }

    fn write(&mut self, batch: WriteBatch) -> Result<()> {
        self.write_batch(batch)
    }
}
