//! Presence index over identity keys

use std::collections::HashSet;
use std::hash::Hash;

/// The set of identity keys of every item resident in a queue. Only the owning queue touches it.
#[derive(Debug)]
pub(crate) struct MembershipIndex<K> {
    keys: HashSet<K>,
}

impl<K: Hash + Eq> MembershipIndex<K> {
    pub fn new() -> Self {
        return MembershipIndex { keys: HashSet::new() };
    }

    /// Returns false if the key was already present
    #[inline]
    pub fn insert(&mut self, key: K) -> bool {
        return self.keys.insert(key);
    }

    #[inline]
    pub fn remove(&mut self, key: &K) -> bool {
        return self.keys.remove(key);
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        return self.keys.contains(key);
    }

    #[inline]
    pub fn len(&self) -> usize {
        return self.keys.len();
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Replaces the whole content with `keys`
    pub fn rebuild(&mut self, keys: impl IntoIterator<Item = K>) {
        self.keys = keys.into_iter().collect();
    }
}
