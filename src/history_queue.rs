//! Non-blocking queue that remembers what it has already seen
use crate::buffer::RPBuffer;
use crate::error::QueueError;
use crate::fifo_buffer::FifoBuffer;
use crate::index::MembershipIndex;
use crate::key::{HashKey, IdentityKey};
use crate::queue::RPQueue;
use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Identity keys of admitted items, oldest first. Keys of items still queued are never forgotten,
/// so the window can hold more than `limit` keys while they are pending.
struct History<Q> {
    index: MembershipIndex<Q>,
    order: VecDeque<Q>,
    limit: Option<usize>,
}

impl<Q: Hash + Eq + Clone> History<Q> {
    fn remember(&mut self, key: Q) {
        self.index.insert(key.clone());
        self.order.push_back(key);
    }

    fn over_limit(&self) -> bool {
        return match self.limit {
            Some(limit) => self.order.len() > limit,
            None => false,
        };
    }

    /// Forgets the oldest keys not in `queued` until the window is back within its limit
    fn trim(&mut self, queued: &MembershipIndex<Q>) {
        let limit = match self.limit {
            Some(limit) => limit,
            None => return,
        };

        let mut position = 0;
        while self.order.len() > limit && position < self.order.len() {
            if queued.contains(&self.order[position]) {
                position = position + 1;
                continue;
            }
            if let Some(oldest) = self.order.remove(position) {
                self.index.remove(&oldest);
            }
        }
    }

    fn clear(&mut self) {
        self.index.clear();
        self.order.clear();
    }
}

struct Inner<T, Q> {
    items: FifoBuffer<T>,
    history: History<Q>,
}

/// An unbounded, thread safe FIFO queue that rejects any item whose identity key it has admitted before,
/// even after that item left the queue.
///
/// The history can be bounded with [`HistoryQueue::with_history_limit`]. Once over the limit, the oldest
/// keys of items that already left the queue are forgotten first, which makes those items acceptable again.
/// An item is never forgotten while it is still queued, so the queue itself never holds duplicates.
///
/// ```
/// use uniquepool::{HistoryQueue, RPQueue};
///
/// let q = HistoryQueue::<&str>::new();
///
/// assert!(q.try_add("crawl /index.html"));
/// assert_eq!(Some("crawl /index.html"), q.poll_head());
///
/// // no longer queued but still remembered
/// assert!(!q.contains(&"crawl /index.html"));
/// assert!(q.contained(&"crawl /index.html"));
/// assert!(!q.try_add("crawl /index.html"));
/// ```
pub struct HistoryQueue<T, K: IdentityKey<T> = HashKey> {
    inner: Mutex<Inner<T, K::Key>>,
    key: K,
}

impl<T: Hash> HistoryQueue<T> {
    /// Creates a queue with an unbounded history keyed by item hash
    pub fn new() -> Self {
        return HistoryQueue::with_key(HashKey, None);
    }

    /// Creates a queue that remembers at most `limit` identity keys of items no longer queued, plus the keys
    /// of everything queued. The queue itself stays unbounded
    pub fn with_history_limit(limit: usize) -> Self {
        return HistoryQueue::with_key(HashKey, Some(limit));
    }

    /// Creates a queue admitting `items` in order with a history of at most `limit` keys, or unbounded if None
    pub fn from_items(items: impl IntoIterator<Item = T>, limit: Option<usize>) -> Self {
        let q: Self = HistoryQueue::with_key(HashKey, limit);
        q.add_all(items);
        return q;
    }
}

impl<T, K> HistoryQueue<T, K>
where
    K: IdentityKey<T>,
    K::Key: Clone,
{
    /// Creates an empty queue using `key` for identity and remembering at most `limit` keys
    pub fn with_key(key: K, limit: Option<usize>) -> Self {
        return HistoryQueue {
            inner: Mutex::new(Inner {
                items: FifoBuffer::unbounded(),
                history: History {
                    index: MembershipIndex::new(),
                    order: VecDeque::new(),
                    limit: limit,
                },
            }),
            key: key,
        };
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Inner<T, K::Key>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Self::forget_departed(&self.key, &mut inner);
        return inner;
    }

    fn forget_departed(key: &K, inner: &mut Inner<T, K::Key>) {
        if !inner.history.over_limit() {
            return;
        }

        let items = &inner.items;
        let mut queued = MembershipIndex::new();
        queued.rebuild((0..items.len()).filter_map(|i| items.get(i)).map(|item| key.key(item)));
        inner.history.trim(&queued);
    }

    /// Returns true if the item was admitted before and is still remembered, whether or not it is queued now
    pub fn contained(&self, item: &T) -> bool {
        let key = self.key.key(item);
        return self.lock().history.index.contains(&key);
    }

    /// Returns true if every item in `items` is remembered
    pub fn contained_all(&self, items: &[T]) -> bool {
        let keys: Vec<K::Key> = items.iter().map(|item| self.key.key(item)).collect();
        let inner = self.lock();
        return keys.iter().all(|key| inner.history.index.contains(key));
    }

    /// Returns the number of remembered identity keys
    pub fn history_len(&self) -> usize {
        return self.lock().history.index.len();
    }

    /// Admits every item not remembered yet, in order. Returns true if anything was added
    pub fn add_all(&self, items: impl IntoIterator<Item = T>) -> bool {
        let batch: Vec<(K::Key, T)> = items.into_iter().map(|item| (self.key.key(&item), item)).collect();

        let mut inner = self.lock();
        let mut added = false;
        for (key, item) in batch {
            added = Self::admit(&self.key, &mut inner, key, item) || added;
        }
        return added;
    }

    fn admit(key_of: &K, inner: &mut Inner<T, K::Key>, key: K::Key, item: T) -> bool {
        if inner.history.index.contains(&key) {
            trace!("rejected item already in history");
            return false;
        }

        // unbounded, never full
        if inner.items.offer(item).is_err() {
            return false;
        }
        inner.history.remember(key);
        Self::forget_departed(key_of, inner);
        return true;
    }

    /// Returns a copy of the head of the queue without removing it
    pub fn peek_head(&self) -> Option<T>
    where
        T: Clone,
    {
        return self.lock().items.peek().cloned();
    }

    /// Same as [`HistoryQueue::peek_head`] but fails with [`QueueError::Empty`] if the queue is empty
    pub fn element(&self) -> Result<T, QueueError>
    where
        T: Clone,
    {
        return self.peek_head().ok_or(QueueError::Empty);
    }

    /// Removes the first queued item equal to `item`. The history keeps it
    pub fn remove(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let mut inner = self.lock();
        let position = (0..inner.items.len()).position(|i| inner.items.get(i) == Some(item));
        return match position {
            Some(position) => inner.items.remove_at(position).is_some(),
            None => false,
        };
    }

    /// Returns true if every item in `items` is queued right now
    pub fn contains_all(&self, items: &[T]) -> bool
    where
        T: PartialEq,
    {
        let inner = self.lock();
        return items.iter().all(|item| (0..inner.items.len()).any(|i| inner.items.get(i) == Some(item)));
    }

    /// Removes every queued item equal to one in `items`. Returns true if the queue changed
    pub fn remove_all(&self, items: &[T]) -> bool
    where
        T: PartialEq,
    {
        return self.lock().items.retain(|item| !items.contains(item)) > 0;
    }

    /// Keeps only the queued items equal to one in `items`. Returns true if the queue changed
    pub fn retain_all(&self, items: &[T]) -> bool
    where
        T: PartialEq,
    {
        return self.lock().items.retain(|item| items.contains(item)) > 0;
    }

    /// Removes every queued item. The history is kept
    pub fn clear(&self) {
        self.lock().items.clear();
    }

    /// Removes every queued item and forgets the history as well
    pub fn clear_with_history(&self) {
        let mut inner = self.lock();
        inner.items.clear();
        inner.history.clear();
    }

    /// Forgets the history. Queued items stay, but are no longer protected against being added again
    pub fn clear_history(&self) {
        self.lock().history.clear();
    }

    /// Returns a copy of the queued items in FIFO order
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let inner = self.lock();
        return (0..inner.items.len()).filter_map(|i| inner.items.get(i)).cloned().collect();
    }
}

impl<T, K> RPQueue<T> for HistoryQueue<T, K>
where
    T: PartialEq,
    K: IdentityKey<T>,
    K::Key: Clone,
{
    #[inline]
    fn capacity(&self) -> Option<usize> {
        return None;
    }

    #[inline]
    fn len(&self) -> usize {
        return self.lock().items.len();
    }

    fn try_add(&self, item: T) -> bool {
        let key = self.key.key(&item);
        return Self::admit(&self.key, &mut self.lock(), key, item);
    }

    fn poll_head(&self) -> Option<T> {
        return self.lock().items.take();
    }

    /// Checks the queued items only, not the history
    fn contains(&self, item: &T) -> bool {
        let inner = self.lock();
        return (0..inner.items.len()).any(|i| inner.items.get(i) == Some(item));
    }
}
