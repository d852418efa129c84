use anyhow::{bail, Result};
use engine::{MemStore, OrderedStore, ScanIter, WriteBatch};

use crate::*;

pub fn doc(path: &str) -> DocumentKey {
    DocumentKey::parse(path).unwrap()
}

pub fn coll(path: &str) -> ResourcePath {
    ResourcePath::parse(path).unwrap()
}

pub fn mutations(pairs: &[(&str, &str)]) -> MutationMap {
    pairs
        .iter()
        .map(|(path, m)| (doc(path), Mutation::from(*m)))
        .collect()
}

pub fn paths(map: &OverlayMap) -> Vec<String> {
    map.keys().map(ToString::to_string).collect()
}

pub fn indexed() -> IndexedOverlayStore<MemStore> {
    IndexedOverlayStore::new(MemStore::new())
}

/// Every raw `(key, value)` pair in the store.
pub fn dump<S: OrderedStore>(store: &S) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    store.iterate(b"")?.collect()
}

/// Wraps a store and fails every `write` while armed.
#[derive(Debug, Default)]
pub struct FailingStore<S> {
    pub inner: S,
    pub fail_writes: bool,
    pub failed: usize,
}

impl<S> FailingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_writes: false,
            failed: 0,
        }
    }
}

impl<S: OrderedStore> OrderedStore for FailingStore<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn scan<'a>(&'a self, prefix: &[u8], start: &[u8]) -> Result<ScanIter<'a>> {
        self.inner.scan(prefix, start)
    }

    fn write(&mut self, batch: WriteBatch) -> Result<()> {
        if self.fail_writes {
            self.failed += 1;
            bail!("injected write failure ({} ops dropped)", batch.len());
        }
        self.inner.write(batch)
    }
}
