/// Key-addressed access into mapping structures.
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use crate::slot::ValueSlot;

/// A mapping whose entries can be recorded and replayed by key.
///
/// Key presence plays the role that path existence plays for records.
pub trait KeyedMap {
    type Key: Clone + 'static;
    type Value: Clone + 'static;

    fn lookup(&self, key: &Self::Key) -> Option<&Self::Value>;
    fn put(&mut self, key: Self::Key, value: Self::Value);
    fn remove_key(&mut self, key: &Self::Key);

    /// Reads the slot for `key`.
    fn slot(&self, key: &Self::Key) -> ValueSlot<Self::Value> {
        ValueSlot::from_option(self.lookup(key).cloned())
    }

    /// Inserts or removes `key` depending on the slot's presence flag.
    fn write_slot(&mut self, key: &Self::Key, slot: &ValueSlot<Self::Value>) {
        match slot.as_present() {
            Some(value) => self.put(key.clone(), value.clone()),
            None => self.remove_key(key),
        }
    }
}

impl<K, V, S> KeyedMap for HashMap<K, V, S>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
    S: BuildHasher,
{
    type Key = K;
    type Value = V;

    fn lookup(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn put(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn remove_key(&mut self, key: &K) {
        self.remove(key);
    }
}

impl<K, V> KeyedMap for BTreeMap<K, V>
where
    K: Ord + Clone + 'static,
    V: Clone + 'static,
{
    type Key = K;
    type Value = V;

    fn lookup(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn put(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn remove_key(&mut self, key: &K) {
        self.remove(key);
    }
}
