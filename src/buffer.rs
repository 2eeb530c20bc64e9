//! Traits for buffers and drain sinks

use crate::error::{BoxError, SinkRejected};
use std::collections::VecDeque;
use std::sync::mpsc::Sender;

/// FIFO storage backing a queue. Implementations are not synchronized, the owning queue serializes access.
pub trait RPBuffer<T> {
    /// Returns the maximum allowed number of items in the buffer or None if it is unbounded
    fn capacity(&self) -> Option<usize>;

    /// Returns the number of items in the buffer
    fn len(&self) -> usize;

    /// Appends an item at the tail, returning the number of items in the buffer.
    /// The item is handed back if the buffer is full
    fn offer(&mut self, item: T) -> Result<usize, T>;

    /// Removes the head item returning None if the buffer is empty
    fn take(&mut self) -> Option<T>;

    /// Returns the item at `index` counting from the head
    fn get(&self, index: usize) -> Option<&T>;

    /// Removes the item at `index` counting from the head
    fn remove_at(&mut self, index: usize) -> Option<T>;

    /// Keeps only the items for which `f` returns true, in order. Returns how many were removed
    fn retain<F: FnMut(&T) -> bool>(&mut self, f: F) -> usize;

    /// Moves up to `max` items from the head into `sink`, in order, returning how many were moved.
    /// An item refused by the sink must stay at the head of the buffer.
    /// Items moved before a failure stay moved.
    fn drain_into<S: DrainSink<T> + ?Sized>(&mut self, sink: &mut S, max: usize) -> Result<usize, BoxError>;

    /// Removes every item
    fn clear(&mut self);

    /// Returns the head item without removing it
    #[inline]
    fn peek(&self) -> Option<&T> {
        return self.get(0);
    }

    /// Returns true if the buffer holds no items
    #[inline]
    fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// Returns true if the buffer is bounded and holds as many items as it can
    #[inline]
    fn is_full(&self) -> bool {
        return match self.capacity() {
            Some(capacity) => self.len() >= capacity,
            None => false,
        };
    }
}

/// Destination of a drain
pub trait DrainSink<T> {
    /// Takes ownership of `item` or hands it back with the reason it was refused
    fn accept(&mut self, item: T) -> Result<(), SinkRejected<T>>;
}

impl<T> DrainSink<T> for Vec<T> {
    #[inline]
    fn accept(&mut self, item: T) -> Result<(), SinkRejected<T>> {
        self.push(item);
        return Ok(());
    }
}

impl<T> DrainSink<T> for VecDeque<T> {
    #[inline]
    fn accept(&mut self, item: T) -> Result<(), SinkRejected<T>> {
        self.push_back(item);
        return Ok(());
    }
}

/// Hands drained items to another thread. Fails once the receiver is gone
impl<T> DrainSink<T> for Sender<T> {
    fn accept(&mut self, item: T) -> Result<(), SinkRejected<T>> {
        return self.send(item).map_err(|err| SinkRejected::new(err.0, "receiver disconnected"));
    }
}
