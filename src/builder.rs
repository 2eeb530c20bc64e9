//! Builder for duplicate rejecting queues
use crate::buffer::RPBuffer;
use crate::error::QueueError;
use crate::fifo_buffer::FifoBuffer;
use crate::index::MembershipIndex;
use crate::key::{HashKey, IdentityKey};
use crate::unique_queue::UniqueBlockingQueue;
use std::sync::Arc;

/// The Builder for [`UniqueBlockingQueue`]
///
/// ```
/// use uniquepool::{RPQueue, UniqueQueueBuilder};
///
/// let q = UniqueQueueBuilder::new().capacity(4).seed(vec!["a", "b", "a"]).build().unwrap();
///
/// assert_eq!(Some(4), q.capacity());
/// assert_eq!(2, q.len());
/// ```
pub struct UniqueQueueBuilder<T, K = HashKey> {
    capacity: Option<usize>,
    seed: Vec<T>,
    key: K,
}

impl<T> UniqueQueueBuilder<T, HashKey> {
    /// Create a new builder for an unbounded queue keyed by item hash
    pub fn new() -> Self {
        return UniqueQueueBuilder {
            capacity: None,
            seed: Vec::new(),
            key: HashKey,
        };
    }
}

impl<T, K> UniqueQueueBuilder<T, K> {
    /// Bound the queue to `capacity` items
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        return self;
    }

    /// Items the queue starts with, in order. Only the first item of each identity key is kept
    pub fn seed(mut self, items: impl IntoIterator<Item = T>) -> Self {
        self.seed.extend(items);
        return self;
    }

    /// Use `key` to derive identity keys instead of the item hash
    pub fn key<N: IdentityKey<T>>(self, key: N) -> UniqueQueueBuilder<T, N> {
        return UniqueQueueBuilder {
            capacity: self.capacity,
            seed: self.seed,
            key: key,
        };
    }
}

impl<T, K: IdentityKey<T>> UniqueQueueBuilder<T, K> {
    /// Build the queue. Fails if the capacity is zero or the distinct seed items don't fit
    pub fn build(self) -> Result<UniqueBlockingQueue<T, K>, QueueError> {
        let UniqueQueueBuilder { capacity, seed, key } = self;

        let mut seen = MembershipIndex::new();
        let seed: Vec<T> = seed.into_iter().filter(|item| seen.insert(key.key(item))).collect();

        let seeded = seed.len();
        let mut buffer = match capacity {
            Some(0) => return Err(QueueError::InvalidCapacity),
            Some(capacity) => FifoBuffer::bounded(capacity),
            None => FifoBuffer::unbounded(),
        };
        for item in seed {
            if buffer.offer(item).is_err() {
                return Err(QueueError::SeedExceedsCapacity {
                    capacity: buffer.capacity().unwrap_or(seeded),
                    seeded: seeded,
                });
            }
        }

        return Ok(UniqueBlockingQueue::from_buffer(buffer, key));
    }

    /// Build the queue wrapped in an Arc
    pub fn build_arc(self) -> Result<Arc<UniqueBlockingQueue<T, K>>, QueueError> {
        return self.build().map(Arc::new);
    }
}
