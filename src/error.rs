//! Errors raised by the queues

use std::error::Error;
use std::fmt;

/// Boxed error carried by failed transfers
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Failures that callers of a queue must handle. Duplicates, full queues and timeouts are not errors,
/// they are reported through the return value of the operation instead.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The operation requires an element but the queue is empty
    #[error("queue is empty")]
    Empty,

    /// A blocking wait was cancelled by [`crate::UniqueBlockingQueue::interrupt`]
    #[error("blocking wait was interrupted")]
    Interrupted,

    /// The queue was closed and no longer accepts items
    #[error("queue is closed")]
    Closed,

    /// `remove` was called on a cursor with no current element
    #[error("cursor has no current element to remove")]
    InvalidIteratorState,

    /// The queue was structurally modified by another caller while a cursor was open
    #[error("queue was modified while the cursor was open")]
    ConcurrentModification,

    /// A drain stopped part way. The items already transferred have left the queue
    #[error("transfer failed after {transferred} items: {source}")]
    TransferFailed {
        /// Number of items moved into the sink before the failure
        transferred: usize,
        /// The failure raised by the sink or the storage
        #[source]
        source: BoxError,
    },

    /// A bounded queue needs room for at least one item
    #[error("queue capacity must be greater than zero")]
    InvalidCapacity,

    /// More distinct seed items than the queue can hold
    #[error("{seeded} seed items do not fit in a queue of capacity {capacity}")]
    SeedExceedsCapacity {
        /// The configured capacity
        capacity: usize,
        /// Distinct items in the seed
        seeded: usize,
    },
}

/// Returned by a [`crate::DrainSink`] that refuses an item. The item is handed back so it can stay in storage.
pub struct SinkRejected<T> {
    /// The refused item
    pub item: T,
    /// Why the sink refused it
    pub cause: BoxError,
}

impl<T> SinkRejected<T> {
    /// Creates a rejection for `item`
    pub fn new(item: T, cause: impl Into<BoxError>) -> Self {
        return SinkRejected { item: item, cause: cause.into() };
    }
}

impl<T> fmt::Debug for SinkRejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.debug_struct("SinkRejected").field("cause", &self.cause).finish();
    }
}
