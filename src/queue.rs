//! Traits for queues

use crate::error::QueueError;

/// RPQueue trait for duplicate rejecting queues. None of these methods block
pub trait RPQueue<T> {
    /// Returns the maximum number of items the queue can hold or None if it is unbounded
    fn capacity(&self) -> Option<usize>;

    /// Returns the number of items in the queue
    fn len(&self) -> usize;

    /// Adds an item at the tail of the queue. Returns false without changing the queue if an item with
    /// the same identity is already known to the queue or if there is no room for it
    fn try_add(&self, item: T) -> bool;

    /// Removes and returns the head of the queue or None if the queue is empty
    fn poll_head(&self) -> Option<T>;

    /// Returns true if the item is currently in the queue
    fn contains(&self, item: &T) -> bool;

    /// Returns true if the queue has no items
    #[inline]
    fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// Same as [`RPQueue::try_add`]
    #[inline]
    fn offer(&self, item: T) -> bool {
        return self.try_add(item);
    }

    /// Removes and returns the head of the queue, failing with [`QueueError::Empty`] if there is none
    #[inline]
    fn remove_head(&self) -> Result<T, QueueError> {
        return self.poll_head().ok_or(QueueError::Empty);
    }
}
