//! Identity keys used to detect duplicate items
//!
//! A queue never compares items to decide whether one is already queued, it compares their identity keys.
//! The default [`HashKey`] reduces an item to a 64 bit hash, which means two unequal items with the same hash
//! are treated as duplicates and the second one is rejected. Use [`EqKey`] when that is not acceptable.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Derives the identity key of an item
pub trait IdentityKey<T> {
    /// The key kept in the membership index
    type Key: Hash + Eq;

    /// Returns the key for `item`. Must be deterministic for the lifetime of the queue
    fn key(&self, item: &T) -> Self::Key;
}

/// Identity is the item's hash. Unequal items with colliding hashes are duplicates of each other
#[derive(Debug, Default, Clone, Copy)]
pub struct HashKey;

impl<T: Hash> IdentityKey<T> for HashKey {
    type Key = u64;

    #[inline]
    fn key(&self, item: &T) -> u64 {
        // DefaultHasher::new always starts from the same keys so the result is stable within a process
        let mut hasher = DefaultHasher::new();
        item.hash(&mut hasher);
        return hasher.finish();
    }
}

/// Identity is full equality. The index holds a clone of every queued item
#[derive(Debug, Default, Clone, Copy)]
pub struct EqKey;

impl<T: Hash + Eq + Clone> IdentityKey<T> for EqKey {
    type Key = T;

    #[inline]
    fn key(&self, item: &T) -> T {
        return item.clone();
    }
}

/// Identity computed by a closure, for items identified by a field such as a job id
#[derive(Clone, Copy)]
pub struct FnKey<F> {
    f: F,
}

impl<F> FnKey<F> {
    /// Wraps the key function `f`
    pub fn new(f: F) -> Self {
        return FnKey { f: f };
    }
}

impl<T, R, F> IdentityKey<T> for FnKey<F>
where
    F: Fn(&T) -> R,
    R: Hash + Eq,
{
    type Key = R;

    #[inline]
    fn key(&self, item: &T) -> R {
        return (self.f)(item);
    }
}
