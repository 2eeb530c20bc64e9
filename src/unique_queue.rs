//! Concurrent blocking queue that rejects duplicate items
use crate::buffer::{DrainSink, RPBuffer};
use crate::builder::UniqueQueueBuilder;
use crate::cursor::Cursor;
use crate::error::{QueueError, SinkRejected};
use crate::fifo_buffer::FifoBuffer;
use crate::index::MembershipIndex;
use crate::key::{HashKey, IdentityKey};
use crate::queue::RPQueue;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Storage and membership index, always locked together
pub(crate) struct State<B, Q> {
    pub(crate) buffer: B,
    pub(crate) index: MembershipIndex<Q>,
    /// bumped on every structural change, cursors use it to detect concurrent modification
    pub(crate) modifications: u64,
    interrupts: u64,
    closed: bool,
}

enum Admission<T, Q> {
    Added,
    Duplicate,
    Full(T, Q),
}

impl<B, Q: Hash + Eq> State<B, Q> {
    /// The accept/reject decision. Storage and index change together or not at all
    fn admit<T>(&mut self, key: Q, item: T) -> Admission<T, Q>
    where
        B: RPBuffer<T>,
    {
        if self.index.contains(&key) {
            return Admission::Duplicate;
        }

        return match self.buffer.offer(item) {
            Ok(_) => {
                self.index.insert(key);
                self.modifications = self.modifications + 1;
                Admission::Added
            }
            Err(item) => Admission::Full(item, key),
        };
    }
}

/// Wraps a drain sink and records the identity of every item the sink actually accepted
struct KeyRecorder<'a, S: ?Sized, K, Q> {
    sink: &'a mut S,
    key: &'a K,
    keys: Vec<Q>,
}

impl<'a, T, S, K, Q> DrainSink<T> for KeyRecorder<'a, S, K, Q>
where
    S: DrainSink<T> + ?Sized,
    K: IdentityKey<T, Key = Q>,
{
    fn accept(&mut self, item: T) -> Result<(), SinkRejected<T>> {
        let key = self.key.key(&item);
        self.sink.accept(item)?;
        self.keys.push(key);
        return Ok(());
    }
}

/// A thread safe FIFO queue, bounded or unbounded, that refuses items whose identity key is already queued.
///
/// Every item's identity key is kept in a membership index next to the storage so `contains` and the
/// duplicate check never scan the queue. Both structures live behind one lock and every mutating
/// operation, bulk ones included, updates them together.
///
/// ```
/// use uniquepool::{RPQueue, UniqueBlockingQueue};
///
/// fn main() {
///     let q = UniqueBlockingQueue::<&str>::new();
///
///     assert!(q.try_add("resize image 1"));
///     assert!(q.try_add("resize image 2"));
///
///     // still pending, so it is coalesced
///     assert!(!q.try_add("resize image 1"));
///     assert_eq!(2, q.len());
///
///     assert_eq!(Some("resize image 1"), q.poll_head());
///
///     // gone from the queue, it can be queued again
///     assert!(q.try_add("resize image 1"));
/// }
/// ```
pub struct UniqueBlockingQueue<T, K: IdentityKey<T> = HashKey, B = FifoBuffer<T>> {
    state: Mutex<State<B, K::Key>>,
    pub(crate) key: K,
    not_empty: Condvar,
    not_full: Condvar,
    _item: PhantomData<fn() -> T>,
}

impl<T: Hash> UniqueBlockingQueue<T> {
    /// Creates an unbounded queue keyed by item hash
    pub fn new() -> Self {
        return UniqueBlockingQueue::from_buffer(FifoBuffer::unbounded(), HashKey);
    }

    /// Creates a queue keyed by item hash holding at most `capacity` items
    pub fn bounded(capacity: usize) -> Result<Self, QueueError> {
        return UniqueQueueBuilder::new().capacity(capacity).build();
    }

    /// Creates an unbounded queue holding `items` in order. Later duplicates in `items` are dropped
    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        return UniqueBlockingQueue::from_buffer(items.into_iter().collect(), HashKey);
    }
}

impl<T, K: IdentityKey<T>, B: RPBuffer<T>> UniqueBlockingQueue<T, K, B> {
    /// Creates a queue over an existing buffer. The first occurrence of every identity key is kept
    /// and later items with the same key are removed from the buffer
    pub fn from_buffer(mut buffer: B, key: K) -> Self {
        let mut index = MembershipIndex::new();
        let dropped = buffer.retain(|item| index.insert(key.key(item)));
        if dropped > 0 {
            debug!(dropped, "dropped duplicate seed items");
        }

        return UniqueBlockingQueue {
            state: Mutex::new(State {
                buffer: buffer,
                index: index,
                modifications: 0,
                interrupts: 0,
                closed: false,
            }),
            key: key,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            _item: PhantomData,
        };
    }

    /// Poisoning is ignored, a panicking caller must not make the queue unusable for everyone else
    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, State<B, K::Key>> {
        return self.state.lock().unwrap_or_else(PoisonError::into_inner);
    }

    /// Returns how many more items fit in the queue or None if it is unbounded
    pub fn remaining_capacity(&self) -> Option<usize> {
        let state = self.lock();
        return state.buffer.capacity().map(|capacity| capacity.saturating_sub(state.buffer.len()));
    }

    /// Adds an item, waiting up to `timeout` for room if the queue is full.
    /// Returns `Ok(false)` if the item is a duplicate or the timeout elapsed
    pub fn offer_timeout(&self, item: T, timeout: Duration) -> Result<bool, QueueError> {
        return self.insert_wait(item, Instant::now().checked_add(timeout));
    }

    /// Adds an item, waiting for room as long as needed. Returns `Ok(false)` if the item is a duplicate
    pub fn put(&self, item: T) -> Result<bool, QueueError> {
        return self.insert_wait(item, None);
    }

    fn insert_wait(&self, item: T, deadline: Option<Instant>) -> Result<bool, QueueError> {
        let mut key = self.key.key(&item);
        let mut item = item;

        let mut state = self.lock();
        let epoch = state.interrupts;
        loop {
            if state.closed {
                return Err(QueueError::Closed);
            }
            if state.interrupts != epoch {
                debug!("insert wait interrupted");
                return Err(QueueError::Interrupted);
            }

            match state.admit(key, item) {
                Admission::Added => {
                    drop(state);
                    self.not_empty.notify_one();
                    return Ok(true);
                }
                Admission::Duplicate => {
                    trace!("rejected duplicate item");
                    return Ok(false);
                }
                Admission::Full(rejected, rejected_key) => {
                    item = rejected;
                    key = rejected_key;
                }
            }

            state = match deadline {
                None => self.not_full.wait(state).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    self.not_full.wait_timeout(state, deadline - now).unwrap_or_else(PoisonError::into_inner).0
                }
            };
        }
    }

    /// Removes the head of the queue, waiting as long as needed for an item to arrive
    pub fn take(&self) -> Result<T, QueueError> {
        return match self.remove_wait(None)? {
            Some(item) => Ok(item),
            // an untimed wait only ends with an item or an error
            None => Err(QueueError::Empty),
        };
    }

    /// Removes the head of the queue, waiting up to `timeout` for an item to arrive.
    /// Returns `Ok(None)` if the timeout elapsed
    pub fn poll_timeout(&self, timeout: Duration) -> Result<Option<T>, QueueError> {
        return self.remove_wait(Instant::now().checked_add(timeout));
    }

    fn remove_wait(&self, deadline: Option<Instant>) -> Result<Option<T>, QueueError> {
        let mut state = self.lock();
        let epoch = state.interrupts;
        loop {
            if state.interrupts != epoch {
                debug!("remove wait interrupted");
                return Err(QueueError::Interrupted);
            }

            if let Some(item) = self.pop_locked(&mut state) {
                drop(state);
                self.notify_removed();
                return Ok(Some(item));
            }

            if state.closed {
                return Err(QueueError::Closed);
            }

            state = match deadline {
                None => self.not_empty.wait(state).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    self.not_empty.wait_timeout(state, deadline - now).unwrap_or_else(PoisonError::into_inner).0
                }
            };
        }
    }

    /// Wakes producers waiting for room
    #[inline]
    pub(crate) fn notify_removed(&self) {
        self.not_full.notify_all();
    }

    fn pop_locked(&self, state: &mut State<B, K::Key>) -> Option<T> {
        let item = state.buffer.take()?;
        state.index.remove(&self.key.key(&item));
        state.modifications = state.modifications + 1;
        return Some(item);
    }

    /// Returns a copy of the head of the queue without removing it
    pub fn peek_head(&self) -> Option<T>
    where
        T: Clone,
    {
        return self.lock().buffer.peek().cloned();
    }

    /// Same as [`UniqueBlockingQueue::peek_head`] but fails with [`QueueError::Empty`] if the queue is empty
    pub fn element(&self) -> Result<T, QueueError>
    where
        T: Clone,
    {
        return self.peek_head().ok_or(QueueError::Empty);
    }

    /// Returns true if every item in `items` is in the queue, according to the membership index
    pub fn contains_all(&self, items: &[T]) -> bool {
        let keys: Vec<K::Key> = items.iter().map(|item| self.key.key(item)).collect();
        let state = self.lock();
        return keys.iter().all(|key| state.index.contains(key));
    }

    /// Removes the first queued item equal to `item`. The membership index only changes if an equal
    /// item was actually found in storage
    pub fn remove(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let mut state = self.lock();
        let position = (0..state.buffer.len()).position(|i| state.buffer.get(i) == Some(item));
        let removed = match position {
            Some(position) => state.buffer.remove_at(position),
            None => None,
        };

        return match removed {
            Some(removed) => {
                state.index.remove(&self.key.key(&removed));
                state.modifications = state.modifications + 1;
                drop(state);
                self.notify_removed();
                true
            }
            None => false,
        };
    }

    /// Adds every item that is not a duplicate, in order, as a single atomic batch.
    /// Returns true if anything was added.
    ///
    /// On a bounded queue the batch stops at the first item that does not fit and that item, along with
    /// everything after it, is dropped. Use [`UniqueBlockingQueue::remaining_capacity`] beforehand, or
    /// [`UniqueBlockingQueue::put`] per item, when nothing may be lost.
    pub fn add_all(&self, items: impl IntoIterator<Item = T>) -> bool {
        let batch: Vec<(K::Key, T)> = items.into_iter().map(|item| (self.key.key(&item), item)).collect();

        let mut state = self.lock();
        if state.closed {
            return false;
        }

        let mut added = 0;
        let mut rejected = 0;
        for (key, item) in batch {
            match state.admit(key, item) {
                Admission::Added => added = added + 1,
                Admission::Duplicate => rejected = rejected + 1,
                Admission::Full(_, _) => {
                    debug!(added, "queue full, dropping the rest of the batch");
                    break;
                }
            }
        }
        drop(state);

        if rejected > 0 {
            trace!(rejected, "rejected duplicate items in batch");
        }
        if added > 0 {
            self.not_empty.notify_all();
        }
        return added > 0;
    }

    /// Removes every queued item equal to one in `items`. Returns true if the queue changed
    pub fn remove_all(&self, items: &[T]) -> bool
    where
        T: PartialEq,
    {
        return self.retain(|item| !items.contains(item));
    }

    /// Keeps only the queued items equal to one in `items`. Returns true if the queue changed
    pub fn retain_all(&self, items: &[T]) -> bool
    where
        T: PartialEq,
    {
        return self.retain(|item| items.contains(item));
    }

    /// Keeps only the queued items for which `f` returns true. Returns true if the queue changed
    pub fn retain<F: FnMut(&T) -> bool>(&self, f: F) -> bool {
        let mut state = self.lock();
        let removed = state.buffer.retain(f);
        if removed == 0 {
            return false;
        }

        self.reindex(&mut state);
        state.modifications = state.modifications + 1;
        drop(state);

        debug!(removed, "rebuilt membership index after bulk removal");
        self.notify_removed();
        return true;
    }

    fn reindex(&self, state: &mut State<B, K::Key>) {
        let buffer = &state.buffer;
        let key = &self.key;
        let keys = (0..buffer.len()).filter_map(|i| buffer.get(i)).map(|item| key.key(item));
        state.index.rebuild(keys);
    }

    /// Removes every item
    pub fn clear(&self) {
        let mut state = self.lock();
        state.buffer.clear();
        state.index.clear();
        state.modifications = state.modifications + 1;
        drop(state);
        self.notify_removed();
    }

    /// Moves every item into `sink` in FIFO order. See [`UniqueBlockingQueue::drain_to_max`]
    pub fn drain_to<S: DrainSink<T> + ?Sized>(&self, sink: &mut S) -> Result<usize, QueueError> {
        return self.drain_to_max(sink, usize::MAX);
    }

    /// Moves up to `max` items from the head of the queue into `sink` in FIFO order and returns how many moved.
    ///
    /// If the transfer fails part way, the items the sink already accepted have left the queue and their
    /// keys are removed from the membership index before the failure is returned as
    /// [`QueueError::TransferFailed`]. Items that were not transferred stay queued.
    pub fn drain_to_max<S: DrainSink<T> + ?Sized>(&self, sink: &mut S, max: usize) -> Result<usize, QueueError> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let mut recorder = KeyRecorder {
            sink: sink,
            key: &self.key,
            keys: Vec::new(),
        };
        let result = state.buffer.drain_into(&mut recorder, max);

        let transferred = recorder.keys.len();
        for key in recorder.keys.iter() {
            state.index.remove(key);
        }
        if transferred > 0 {
            state.modifications = state.modifications + 1;
        }
        drop(guard);

        if transferred > 0 {
            self.notify_removed();
        }

        return match result {
            Ok(_) => Ok(transferred),
            Err(source) => {
                warn!(transferred, error = %source, "drain failed, membership index reconciled");
                Err(QueueError::TransferFailed {
                    transferred: transferred,
                    source: source,
                })
            }
        };
    }

    /// Returns a copy of the queued items in FIFO order
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let state = self.lock();
        return (0..state.buffer.len()).filter_map(|i| state.buffer.get(i)).cloned().collect();
    }

    /// Iterates over a snapshot of the queue taken now. Later changes to the queue are not seen
    pub fn iter(&self) -> std::vec::IntoIter<T>
    where
        T: Clone,
    {
        return self.to_vec().into_iter();
    }

    /// Opens a cursor that walks the live queue and can remove the item it just returned.
    /// The cursor fails with [`QueueError::ConcurrentModification`] once anything else changes the queue
    pub fn cursor(&self) -> Cursor<'_, T, K, B> {
        let expected = self.lock().modifications;
        return Cursor::new(self, expected);
    }

    /// Wakes every thread blocked in `put`, `take`, `offer_timeout` or `poll_timeout` and makes them
    /// return [`QueueError::Interrupted`]. Waits that start after this call are not affected
    pub fn interrupt(&self) {
        let mut state = self.lock();
        state.interrupts = state.interrupts + 1;
        drop(state);

        debug!("interrupting blocked waiters");
        self.not_empty.notify_all();
        self.notify_removed();
    }

    /// Stops accepting items. Blocked and future insertions fail with [`QueueError::Closed`],
    /// queued items can still be removed
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        drop(state);

        debug!("queue closed");
        self.not_empty.notify_all();
        self.notify_removed();
    }

    /// Returns true once [`UniqueBlockingQueue::close`] was called
    pub fn is_closed(&self) -> bool {
        return self.lock().closed;
    }
}

impl<T, K: IdentityKey<T>, B: RPBuffer<T>> RPQueue<T> for UniqueBlockingQueue<T, K, B> {
    #[inline]
    fn capacity(&self) -> Option<usize> {
        return self.lock().buffer.capacity();
    }

    #[inline]
    fn len(&self) -> usize {
        return self.lock().buffer.len();
    }

    fn try_add(&self, item: T) -> bool {
        let key = self.key.key(&item);

        let mut state = self.lock();
        if state.closed {
            return false;
        }

        return match state.admit(key, item) {
            Admission::Added => {
                drop(state);
                self.not_empty.notify_one();
                true
            }
            Admission::Duplicate => {
                trace!("rejected duplicate item");
                false
            }
            Admission::Full(_, _) => false,
        };
    }

    fn poll_head(&self) -> Option<T> {
        let mut state = self.lock();
        let item = self.pop_locked(&mut state)?;
        drop(state);

        self.notify_removed();
        return Some(item);
    }

    /// Answered by the membership index alone, so two items with the same identity key are
    /// indistinguishable here
    fn contains(&self, item: &T) -> bool {
        let key = self.key.key(item);
        return self.lock().index.contains(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::key::EqKey;
    use std::hash::Hasher;
    use std::sync::{Arc, Barrier};
    use std::thread;

    /// Checks storage and membership index agree
    fn assert_consistent<T, K: IdentityKey<T>, B: RPBuffer<T>>(q: &UniqueBlockingQueue<T, K, B>) {
        let state = q.lock();
        let mut keys = MembershipIndex::new();
        for i in 0..state.buffer.len() {
            let item = state.buffer.get(i).unwrap();
            let key = q.key.key(item);
            assert!(state.index.contains(&key), "queued item missing from the index");
            assert!(keys.insert(key), "two queued items share an identity key");
        }
        assert_eq!(state.buffer.len(), state.index.len());
    }

    fn queue_of(items: Vec<u32>) -> UniqueBlockingQueue<u32> {
        return UniqueBlockingQueue::from_items(items);
    }

    /// Unequal values sharing the same hash
    #[derive(Debug, Clone, PartialEq)]
    struct Collides(u32);

    impl Hash for Collides {
        fn hash<H: Hasher>(&self, state: &mut H) {
            state.write_u8(7);
        }
    }

    /// Storage that fails a drain after moving `fail_after` items
    struct FailingBuffer {
        inner: FifoBuffer<u32>,
        fail_after: usize,
    }

    impl RPBuffer<u32> for FailingBuffer {
        fn capacity(&self) -> Option<usize> {
            return self.inner.capacity();
        }

        fn len(&self) -> usize {
            return self.inner.len();
        }

        fn offer(&mut self, item: u32) -> Result<usize, u32> {
            return self.inner.offer(item);
        }

        fn take(&mut self) -> Option<u32> {
            return self.inner.take();
        }

        fn get(&self, index: usize) -> Option<&u32> {
            return self.inner.get(index);
        }

        fn remove_at(&mut self, index: usize) -> Option<u32> {
            return self.inner.remove_at(index);
        }

        fn retain<F: FnMut(&u32) -> bool>(&mut self, f: F) -> usize {
            return self.inner.retain(f);
        }

        fn drain_into<S: DrainSink<u32> + ?Sized>(&mut self, sink: &mut S, max: usize) -> Result<usize, BoxError> {
            let moved = self.inner.drain_into(sink, max.min(self.fail_after))?;
            if moved == self.fail_after {
                return Err("storage failure".into());
            }
            return Ok(moved);
        }

        fn clear(&mut self) {
            self.inner.clear();
        }
    }

    /// Accepts `room` items then refuses everything
    struct LimitedSink {
        room: usize,
        items: Vec<u32>,
    }

    impl DrainSink<u32> for LimitedSink {
        fn accept(&mut self, item: u32) -> Result<(), SinkRejected<u32>> {
            if self.items.len() == self.room {
                return Err(SinkRejected::new(item, "sink is full"));
            }
            self.items.push(item);
            return Ok(());
        }
    }

    #[test]
    fn test_uq_rejects_duplicate() {
        let q = UniqueBlockingQueue::<&str>::new();

        assert!(q.try_add("x"));
        assert!(!q.try_add("x"));

        assert_eq!(1, q.len());
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_fifo_order() {
        let q = UniqueBlockingQueue::<char>::new();
        q.try_add('a');
        q.try_add('b');
        q.try_add('c');

        assert_eq!(Some('a'), q.poll_head());
        assert_eq!(Some('b'), q.poll_head());
        assert_eq!(Some('c'), q.poll_head());
        assert_eq!(None, q.poll_head());
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_readd_after_removal() {
        let q = queue_of(vec![1]);

        assert_eq!(1, q.remove_head().unwrap());
        assert!(!q.contains(&1));
        assert!(q.try_add(1));
        assert!(q.contains(&1));
    }

    #[test]
    fn test_uq_hash_collision_is_duplicate() {
        let q = UniqueBlockingQueue::<Collides>::new();

        assert!(q.try_add(Collides(1)));
        assert!(!q.try_add(Collides(2)));
        assert!(q.contains(&Collides(2)));
        assert_eq!(1, q.len());
    }

    #[test]
    fn test_uq_eq_key_tells_collisions_apart() {
        let q: UniqueBlockingQueue<String, EqKey> = UniqueQueueBuilder::new().key(EqKey).build().unwrap();

        assert!(q.try_add(String::from("a")));
        assert!(q.try_add(String::from("b")));
        assert!(!q.try_add(String::from("a")));
        assert_eq!(2, q.len());
    }

    #[test]
    fn test_uq_bounded_full() {
        let q = UniqueBlockingQueue::<u32>::bounded(2).unwrap();

        assert!(q.try_add(1));
        assert!(q.try_add(2));
        assert!(!q.try_add(3));

        assert!(!q.contains(&3));
        assert_eq!(Some(0), q.remaining_capacity());
        assert_eq!(Some(2), q.capacity());
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_empty_signals() {
        let q = UniqueBlockingQueue::<u32>::new();

        assert_eq!(None, q.poll_head());
        assert_eq!(None, q.peek_head());
        assert!(matches!(q.remove_head(), Err(QueueError::Empty)));
        assert!(matches!(q.element(), Err(QueueError::Empty)));
        assert!(q.is_empty());
        assert_eq!(None, q.remaining_capacity());
    }

    #[test]
    fn test_uq_peek_does_not_remove() {
        let q = queue_of(vec![4, 5]);

        assert_eq!(Some(4), q.peek_head());
        assert_eq!(4, q.element().unwrap());
        assert_eq!(2, q.len());
        assert!(q.contains(&4));
    }

    #[test]
    fn test_uq_remove_structural() {
        let q = queue_of(vec![1, 2, 3]);

        assert!(q.remove(&2));
        assert!(!q.remove(&2));
        assert!(!q.contains(&2));

        assert_eq!(vec![1, 3], q.to_vec());
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_remove_key_match_without_structural_match() {
        let q = UniqueBlockingQueue::<Collides>::new();
        q.try_add(Collides(1));

        // same identity key but not equal, so nothing is removed and the index stays as it is
        assert!(!q.remove(&Collides(2)));
        assert!(q.contains(&Collides(1)));
        assert_eq!(1, q.len());
    }

    #[test]
    fn test_uq_add_all_rejects_duplicates() {
        let q = UniqueBlockingQueue::<char>::new();

        assert!(q.add_all(vec!['a', 'b', 'a']));

        assert_eq!(2, q.len());
        assert_eq!(2, q.lock().index.len());
        assert!(q.contains(&'a'));
        assert!(q.contains(&'b'));
        assert!(!q.add_all(vec!['a', 'b']));
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_add_all_stops_when_full() {
        let q = UniqueBlockingQueue::<u32>::bounded(2).unwrap();

        assert!(q.add_all(vec![1, 2, 3]));

        assert_eq!(vec![1, 2], q.to_vec());
        assert!(!q.contains(&3));

        // duplicates are skipped, everything after the first item that does not fit is dropped
        assert_eq!(Some(1), q.poll_head());
        assert!(q.add_all(vec![2, 3, 4, 5]));
        assert_eq!(vec![2, 3], q.to_vec());
        assert!(!q.contains(&4));
        assert!(!q.contains(&5));
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_remove_all_retain_all() {
        let q = queue_of(vec![1, 2, 3, 4, 5]);

        assert!(q.remove_all(&[2, 4, 9]));
        assert!(!q.remove_all(&[9]));
        assert_eq!(vec![1, 3, 5], q.to_vec());
        assert_consistent(&q);

        assert!(q.retain_all(&[3, 5]));
        assert!(!q.retain_all(&[3, 5]));
        assert_eq!(vec![3, 5], q.to_vec());
        assert!(!q.contains(&1));
        assert_consistent(&q);

        assert!(q.contains_all(&[3, 5]));
        assert!(!q.contains_all(&[1, 3]));
    }

    #[test]
    fn test_uq_retain_predicate_and_clear() {
        let q = queue_of((1..=10).collect());

        assert!(q.retain(|item| item % 3 == 0));
        assert_eq!(vec![3, 6, 9], q.to_vec());
        assert_consistent(&q);

        q.clear();
        assert!(q.is_empty());
        assert!(!q.contains(&3));
        assert!(q.try_add(3));
    }

    #[test]
    fn test_uq_from_items_first_wins() {
        let q = queue_of(vec![3, 1, 3, 2, 1]);

        assert_eq!(vec![3, 1, 2], q.to_vec());
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_drain_all() {
        let q = queue_of(vec![1, 2, 3]);
        let mut sink = Vec::new();

        assert_eq!(3, q.drain_to(&mut sink).unwrap());

        assert_eq!(vec![1, 2, 3], sink);
        assert!(q.is_empty());
        assert!(!q.contains(&1));
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_drain_max() {
        let q = queue_of(vec![1, 2, 3]);
        let mut sink = std::collections::VecDeque::new();

        assert_eq!(2, q.drain_to_max(&mut sink, 2).unwrap());

        assert_eq!(vec![1, 2], Vec::from(sink));
        assert_eq!(vec![3], q.to_vec());
        assert!(!q.contains(&2));
        assert!(q.contains(&3));
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_drain_storage_failure_reconciles() {
        let mut buffer = FailingBuffer {
            inner: FifoBuffer::unbounded(),
            fail_after: 2,
        };
        for item in 1..=5 {
            buffer.offer(item).unwrap();
        }
        let q = UniqueBlockingQueue::from_buffer(buffer, HashKey);
        let mut sink = Vec::new();

        let err = q.drain_to(&mut sink).unwrap_err();

        match err {
            QueueError::TransferFailed { transferred, source } => {
                assert_eq!(2, transferred);
                assert_eq!("storage failure", source.to_string());
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(vec![1, 2], sink);
        assert_eq!(vec![3, 4, 5], q.to_vec());
        assert!(!q.contains(&1));
        assert!(!q.contains(&2));
        assert!(q.contains_all(&[3, 4, 5]));
        assert_consistent(&q);

        // the queue stays usable after the failure
        assert!(q.try_add(1));
        assert_eq!(Some(3), q.poll_head());
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_drain_sink_failure_reconciles() {
        let q = queue_of(vec![1, 2, 3, 4, 5]);
        let mut sink = LimitedSink { room: 2, items: Vec::new() };

        let err = q.drain_to(&mut sink).unwrap_err();

        assert!(matches!(err, QueueError::TransferFailed { transferred: 2, .. }));
        assert_eq!(vec![1, 2], sink.items);
        assert_eq!(vec![3, 4, 5], q.to_vec());
        assert!(!q.contains(&1));
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_take_blocks_until_put() {
        let q = Arc::new(UniqueBlockingQueue::<u32>::new());

        let tq = q.clone();
        let taker = thread::spawn(move || {
            return tq.take().unwrap();
        });

        thread::sleep(Duration::from_millis(20));
        assert_eq!(0, q.len());
        assert!(q.put(42).unwrap());

        assert_eq!(42, taker.join().unwrap());
        assert_eq!(0, q.len());
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_put_blocks_until_room() {
        let q = Arc::new(UniqueBlockingQueue::<u32>::bounded(1).unwrap());
        q.put(1).unwrap();

        let tq = q.clone();
        let putter = thread::spawn(move || {
            return tq.put(2).unwrap();
        });

        thread::sleep(Duration::from_millis(20));
        assert_eq!(vec![1], q.to_vec());
        assert_eq!(1, q.take().unwrap());

        assert!(putter.join().unwrap());
        assert_eq!(vec![2], q.to_vec());
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_put_duplicate_does_not_block() {
        let q = UniqueBlockingQueue::<u32>::bounded(1).unwrap();
        q.put(1).unwrap();

        // full, but a duplicate is rejected right away
        assert!(!q.put(1).unwrap());
        assert!(!q.offer_timeout(1, Duration::from_secs(10)).unwrap());
    }

    #[test]
    fn test_uq_offer_timeout_when_full() {
        let wait = Duration::from_millis(20);
        let q = UniqueBlockingQueue::<char>::bounded(1).unwrap();
        q.try_add('a');

        let now = Instant::now();
        let added = q.offer_timeout('b', wait).unwrap();
        let elapsed = now.elapsed();

        assert!(!added);
        assert!(elapsed >= wait, "didn't block for sufficient time. Expected {} actual {}", wait.as_millis(), elapsed.as_millis());
        assert_eq!(vec!['a'], q.to_vec());
        assert!(!q.contains(&'b'));
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_poll_timeout_when_empty() {
        let wait = Duration::from_millis(20);
        let q = UniqueBlockingQueue::<u32>::new();

        let now = Instant::now();
        assert_eq!(None, q.poll_timeout(wait).unwrap());
        assert!(now.elapsed() >= wait);

        q.try_add(9);
        assert_eq!(Some(9), q.poll_timeout(wait).unwrap());
    }

    #[test]
    fn test_uq_interrupt_take() {
        let q = Arc::new(UniqueBlockingQueue::<u32>::new());

        let tq = q.clone();
        let taker = thread::spawn(move || {
            return tq.take();
        });

        thread::sleep(Duration::from_millis(20));
        q.interrupt();

        assert!(matches!(taker.join().unwrap(), Err(QueueError::Interrupted)));

        // later waits are not affected
        q.try_add(1);
        assert_eq!(1, q.take().unwrap());
    }

    #[test]
    fn test_uq_interrupt_put_leaves_queue_unchanged() {
        let q = Arc::new(UniqueBlockingQueue::<u32>::bounded(1).unwrap());
        q.try_add(1);

        let tq = q.clone();
        let putter = thread::spawn(move || {
            return tq.put(2);
        });

        thread::sleep(Duration::from_millis(20));
        q.interrupt();

        assert!(matches!(putter.join().unwrap(), Err(QueueError::Interrupted)));
        assert_eq!(vec![1], q.to_vec());
        assert!(!q.contains(&2));
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_close() {
        let q = UniqueBlockingQueue::<u32>::new();
        q.try_add(1);

        q.close();
        assert!(q.is_closed());

        assert!(!q.try_add(2));
        assert!(!q.add_all(vec![3]));
        assert!(matches!(q.put(2), Err(QueueError::Closed)));

        // queued items are still delivered, then takers are released
        assert_eq!(1, q.take().unwrap());
        assert!(matches!(q.take(), Err(QueueError::Closed)));
        assert!(matches!(q.poll_timeout(Duration::from_secs(10)), Err(QueueError::Closed)));
    }

    #[test]
    fn test_uq_close_releases_blocked_taker() {
        let q = Arc::new(UniqueBlockingQueue::<u32>::new());

        let tq = q.clone();
        let taker = thread::spawn(move || {
            return tq.take();
        });

        thread::sleep(Duration::from_millis(20));
        q.close();

        assert!(matches!(taker.join().unwrap(), Err(QueueError::Closed)));
    }

    #[test]
    fn test_uq_mt_duplicate_race() {
        let thread_count = 8;
        let q = Arc::new(UniqueBlockingQueue::<&str>::new());
        let barrier = Arc::new(Barrier::new(thread_count));

        let mut jhv = Vec::new();
        for _ in 0..thread_count {
            let tq = q.clone();
            let tb = barrier.clone();
            jhv.push(thread::spawn(move || {
                tb.wait();
                return tq.try_add("same job");
            }));
        }

        let accepted = jhv.into_iter().map(|jh| jh.join().unwrap()).filter(|added| *added).count();

        assert_eq!(1, accepted);
        assert_eq!(1, q.len());
        assert_consistent(&q);
    }

    #[test]
    fn test_uq_mt_producers_consumers() {
        let producers = 4;
        let per_producer = 500;
        let q = Arc::new(UniqueBlockingQueue::<usize>::bounded(16).unwrap());

        let mut jhv = Vec::new();
        for p in 0..producers {
            let tq = q.clone();
            jhv.push(thread::spawn(move || {
                for i in 0..per_producer {
                    // every item is put twice, the second is a duplicate unless already consumed
                    let item = p * per_producer + i;
                    tq.put(item).unwrap();
                    tq.try_add(item);
                }
            }));
        }

        let tq = q.clone();
        let consumer = thread::spawn(move || {
            let mut seen = std::collections::HashSet::new();
            while seen.len() < producers * per_producer {
                let item = tq.take().unwrap();
                seen.insert(item);
            }
            return seen.len();
        });

        for jh in jhv {
            jh.join().unwrap();
        }
        assert_eq!(producers * per_producer, consumer.join().unwrap());

        // leftovers are re-added items, consistency must still hold once everything settled
        assert_consistent(&q);
    }
}
