//! # Memtable - ordered in-memory key-value table
//!
//! Holds the live state of the ordered store: every key maps to its current
//! value, deletes remove the key outright. Iteration is ascending by raw byte
//! order, which is what the overlay indexes rely on for prefix scans.

use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Debug, Clone, Default)]
pub struct Memtable {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    approx_size: usize,
}

impl Memtable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value stored under `key`.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        let key_len = key.len();
        let val_len = value.len();
        match self.map.insert(key, value) {
            Some(old) => {
                // key bytes were already counted
                self.approx_size = self.approx_size.saturating_sub(old.len()) + val_len;
            }
            None => self.approx_size += key_len + val_len,
        }
    }

    /// Remove `key`. Returns `true` if it was present.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        match self.map.remove(key) {
            Some(old) => {
                self.approx_size = self.approx_size.saturating_sub(key.len() + old.len());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.map.get(key).map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    /// Ordered iterator over every entry.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.map.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Ordered iterator over keys that start with `prefix` and are `>= start`.
    ///
    /// A `start` that sorts before `prefix` is clamped to `prefix`.
    pub fn range_from(
        &self,
        prefix: &[u8],
        start: &[u8],
    ) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        let lower = if start > prefix { start } else { prefix };
        let prefix = prefix.to_vec();
        self.map
            .range::<[u8], _>((Bound::Included(lower), Bound::Unbounded))
            .take_while(move |(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Approximate heap footprint: total key plus value bytes.
    pub fn approx_size(&self) -> usize {
        self.approx_size
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drop every entry, keeping nothing.
    pub fn clear(&mut self) {
        self.map.clear();
        self.approx_size = 0;
    }
}
