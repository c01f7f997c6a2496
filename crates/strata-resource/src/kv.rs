use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::snapshot::{Snapshot, SnapshotKind};
use crate::store::ResourceStore;

/// Key-value resource store.
pub type KeyValueStore<V> = ResourceStore<IndexedTable<V>>;

/// A key-value table that also assigns each key a stable integer index.
///
/// Indices survive save and load. A removed key frees its slot, and the
/// slot is reused by the next new key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexedTable<V> {
    slots: Vec<Option<(String, V)>>,
    index: BTreeMap<String, usize>,
    free: Vec<usize>,
}

impl<V> Default for IndexedTable<V> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: BTreeMap::new(),
            free: Vec::new(),
        }
    }
}

impl<V> IndexedTable<V> {
    /// Insert or replace the value for `key`. Returns the key's index.
    pub fn upsert(&mut self, key: impl Into<String>, value: V) -> usize {
        let key = key.into();
        if let Some(&slot) = self.index.get(&key) {
            self.slots[slot] = Some((key, value));
            return slot;
        }
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some((key.clone(), value));
                slot
            }
            None => {
                self.slots.push(Some((key.clone(), value)));
                self.slots.len() - 1
            }
        };
        self.index.insert(key, slot);
        slot
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index_of(key).and_then(|slot| self.get_by_index(slot))
    }

    pub fn get_by_index(&self, index: usize) -> Option<&V> {
        self.slots.get(index)?.as_ref().map(|(_, value)| value)
    }

    pub fn key_of(&self, index: usize) -> Option<&str> {
        self.slots.get(index)?.as_ref().map(|(key, _)| key.as_str())
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let slot = self.index.remove(key)?;
        let (_, value) = self.slots[slot].take()?;
        self.free.push(slot);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }
}

impl<V> Snapshot for IndexedTable<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    const KIND: SnapshotKind = SnapshotKind::KeyValue;
    const RESOURCE: &'static str = "kv.bin";

    fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
