// =============================================================================
// Matrixon Timeline - Storage Abstraction Module
// =============================================================================
//
// Project: Matrixon - Ultra High Performance Matrix NextServer (Synapse Alternative)
// Author: arkSong (arksong2018@gmail.com) - Founder of Matrixon Innovation Project
// Contributors: Matrixon Development Team
// Date: 2024-12-11
// Version: 0.11.0-alpha
// License: Apache 2.0 / MIT
//
// Description:
//   Ordered byte-keyed trees backing the timeline store. Keys are built from
//   identifiers joined with 0xff; numeric parts are big-endian so that
//   prefix scans return them in numeric order. Transactions write into a
//   per-tree journal layered over the committed tree.
//
// =============================================================================

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Serialize};

use crate::{Error, Result};

/// One named keyspace.
#[derive(Clone, Debug, Default)]
pub struct KvTree {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl KvTree {
    pub const fn new() -> Self {
        Self { map: BTreeMap::new() }
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.map.get(key).map(Vec::as_slice)
    }

    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.map.insert(key, value);
    }

    pub fn remove(&mut self, key: &[u8]) {
        self.map.remove(key);
    }

    /// Entries whose key starts with `prefix`, in key order.
    pub fn scan_prefix<'a>(&'a self, prefix: &[u8]) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + 'a {
        let prefix = prefix.to_vec();
        self.map
            .range(prefix.clone()..)
            .take_while(move |(key, _)| key.starts_with(&prefix))
            .map(|(key, value)| (key.as_slice(), value.as_slice()))
    }

    /// Replays the writes of a finished transaction.
    pub fn apply(&mut self, journal: Journal) {
        for (key, write) in journal.writes {
            match write {
                Some(value) => {
                    self.map.insert(key, value);
                }
                None => {
                    self.map.remove(&key);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Pending writes of one tree. `None` marks a removal.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl Journal {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// A committed tree seen through the journal of a running transaction.
///
/// Reads check the journal first. Writes only ever touch the journal, so
/// dropping the layer is a rollback.
#[derive(Clone, Debug)]
pub struct Layer<'a> {
    base: &'a KvTree,
    journal: Journal,
}

impl<'a> Layer<'a> {
    pub fn over(base: &'a KvTree) -> Self {
        Self {
            base,
            journal: Journal::default(),
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        match self.journal.writes.get(key) {
            Some(write) => write.as_deref(),
            None => self.base.get(key),
        }
    }

    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.journal.writes.insert(key, Some(value));
    }

    pub fn remove(&mut self, key: &[u8]) {
        self.journal.writes.insert(key.to_vec(), None);
    }

    /// Entries whose key starts with `prefix`, in key order, with pending
    /// writes and removals applied.
    pub fn scan_prefix<'s>(&'s self, prefix: &[u8]) -> impl Iterator<Item = (&'s [u8], &'s [u8])> + 's {
        let mut merged: BTreeMap<&'s [u8], Option<&'s [u8]>> = self
            .base
            .scan_prefix(prefix)
            .map(|(key, value)| (key, Some(value)))
            .collect();
        merged.extend(
            self.journal
                .writes
                .range(prefix.to_vec()..)
                .take_while(|(key, _)| key.starts_with(prefix))
                .map(|(key, write)| (key.as_slice(), write.as_deref())),
        );
        merged
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value)))
    }

    /// Adds one to the big-endian counter under `key` and returns the new
    /// value. A missing counter starts at 0, so the first call returns 1.
    pub fn increment(&mut self, key: &[u8]) -> Result<u64> {
        let current = match self.get(key) {
            Some(bytes) => u64_from_bytes(bytes)
                .ok_or_else(|| Error::bad_database("Counter has an invalid length."))?,
            None => 0,
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| Error::bad_database("Counter overflowed."))?;
        self.insert(key.to_vec(), next.to_be_bytes().to_vec());
        Ok(next)
    }

    pub fn into_journal(self) -> Journal {
        self.journal
    }
}

/// Joins key parts with the 0xff separator.
pub fn key(parts: &[&[u8]]) -> Vec<u8> {
    let mut key = Vec::with_capacity(parts.iter().map(|part| part.len() + 1).sum());
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(0xff);
        }
        key.extend_from_slice(part);
    }
    key
}

/// `parts` as a key prefix, separator included.
pub fn prefix(parts: &[&[u8]]) -> Vec<u8> {
    let mut prefix = key(parts);
    prefix.push(0xff);
    prefix
}

pub fn u64_from_bytes(bytes: &[u8]) -> Option<u64> {
    <[u8; 8]>::try_from(bytes).ok().map(u64::from_be_bytes)
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Deserializes a stored record. A record that does not parse is a
/// corrupt database, not a caller error.
pub fn decode<T: DeserializeOwned>(bytes: &[u8], what: &'static str) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|_| Error::bad_database(what))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kv_tree_basic_operations() {
        let mut tree = KvTree::default();
        tree.insert(b"key1".to_vec(), b"value1".to_vec());

        assert_eq!(tree.get(b"key1"), Some(&b"value1"[..]));
        assert_eq!(tree.get(b"missing"), None);

        tree.remove(b"key1");
        assert!(tree.is_empty());
    }

    #[test]
    fn test_scan_prefix_stops_at_boundary() {
        let mut tree = KvTree::default();
        tree.insert(key(&[b"room1", b"a"]), vec![1]);
        tree.insert(key(&[b"room1", b"b"]), vec![2]);
        tree.insert(key(&[b"room10", b"a"]), vec![3]);
        tree.insert(key(&[b"room2", b"a"]), vec![4]);

        let scan = prefix(&[b"room1"]);
        let values: Vec<_> = tree.scan_prefix(&scan).map(|(_, v)| v[0]).collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_big_endian_keys_sort_numerically() {
        let mut tree = KvTree::default();
        for n in [256u64, 1, 65_536, 2] {
            tree.insert(key(&[b"r", &n.to_be_bytes()]), Vec::new());
        }

        let scan = prefix(&[b"r"]);
        let order: Vec<u64> = tree
            .scan_prefix(&scan)
            .map(|(k, _)| u64_from_bytes(&k[scan.len()..]).unwrap())
            .collect();
        assert_eq!(order, vec![1, 2, 256, 65_536]);
    }

    #[test]
    fn test_increment() {
        let base = KvTree::new();
        let mut layer = Layer::over(&base);
        assert_eq!(layer.increment(b"c").unwrap(), 1);
        assert_eq!(layer.increment(b"c").unwrap(), 2);

        layer.insert(b"bad".to_vec(), vec![1, 2, 3]);
        assert!(matches!(layer.increment(b"bad"), Err(Error::Database(_))));
    }

    #[test]
    fn test_layer_reads_through_pending_writes() {
        let mut base = KvTree::default();
        base.insert(key(&[b"room1", b"a"]), vec![1]);
        base.insert(key(&[b"room1", b"b"]), vec![2]);
        base.insert(key(&[b"room1", b"c"]), vec![3]);

        let mut layer = Layer::over(&base);
        layer.remove(&key(&[b"room1", b"a"]));
        layer.insert(key(&[b"room1", b"b"]), vec![20]);
        layer.insert(key(&[b"room1", b"ba"]), vec![25]);
        layer.insert(key(&[b"room2", b"a"]), vec![99]);

        assert_eq!(layer.get(&key(&[b"room1", b"a"])), None);
        assert_eq!(layer.get(&key(&[b"room1", b"c"])), Some(&[3u8][..]));
        let scan = prefix(&[b"room1"]);
        let values: Vec<_> = layer.scan_prefix(&scan).map(|(_, v)| v[0]).collect();
        assert_eq!(values, vec![20, 25, 3]);
        // Nothing reached the committed tree yet.
        assert_eq!(base.get(&key(&[b"room1", b"b"])), Some(&[2u8][..]));
    }

    #[test]
    fn test_apply_replays_journal() {
        let mut base = KvTree::default();
        base.insert(b"gone".to_vec(), vec![1]);
        base.insert(b"kept".to_vec(), vec![2]);

        let mut layer = Layer::over(&base);
        layer.remove(b"gone");
        layer.insert(b"new".to_vec(), vec![3]);
        let journal = layer.into_journal();
        assert!(!journal.is_empty());
        base.apply(journal);

        assert_eq!(base.get(b"gone"), None);
        assert_eq!(base.get(b"kept"), Some(&[2u8][..]));
        assert_eq!(base.get(b"new"), Some(&[3u8][..]));
        assert_eq!(base.len(), 2);
    }
}
