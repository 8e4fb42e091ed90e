//! Insertion-ordered dedup tables
//!
//! A table assigns each distinct key the position it was first inserted at.
//! Tables are filled in one tree walk before anything is written, so the
//! compiled order depends only on walk order.

use std::collections::HashMap;
use std::hash::Hash;

use crate::scene::LightSetId;

/// Content-addressed table: equal values share one entry.
#[derive(Clone, Debug)]
pub struct ValueTable<K> {
    index: HashMap<K, usize>,
    values: Vec<K>,
}

impl<K: Copy + Eq + Hash> ValueTable<K> {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            values: Vec::new(),
        }
    }

    /// Position of `key`, inserting it at the end when unseen.
    pub fn insert(&mut self, key: K) -> usize {
        let values = &mut self.values;
        *self.index.entry(key).or_insert_with(|| {
            values.push(key);
            values.len() - 1
        })
    }

    pub fn get(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn values(&self) -> &[K] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Copy + Eq + Hash> Default for ValueTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Light sets are shared by reference: ids are identities, so two sets with
/// equal contents but different ids get separate entries.
pub type IdentityTable = ValueTable<LightSetId>;

/// String table keyed by content, for texture names.
#[derive(Clone, Debug, Default)]
pub struct NameTable {
    index: HashMap<String, usize>,
    names: Vec<String>,
}

impl NameTable {
    pub fn insert(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        self.names.push(name.to_owned());
        self.index.insert(name.to_owned(), self.names.len() - 1);
        self.names.len() - 1
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}
