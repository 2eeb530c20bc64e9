//! Growable FIFO buffer, bounded or unbounded

use crate::buffer::{DrainSink, RPBuffer};
use crate::error::BoxError;
use std::collections::VecDeque;
use std::iter::FromIterator;

/// A FIFO buffer over a ring of items. Items are owned by the buffer until they are taken out of it
#[derive(Debug)]
pub struct FifoBuffer<T> {
    items: VecDeque<T>,
    capacity: Option<usize>,
}

impl<T> FifoBuffer<T> {
    /// Creates a buffer with no capacity limit
    pub fn unbounded() -> Self {
        return FifoBuffer {
            items: VecDeque::new(),
            capacity: None,
        };
    }

    /// Creates a buffer holding at most `capacity` items
    pub fn bounded(capacity: usize) -> Self {
        return FifoBuffer {
            // don't trust a huge capacity enough to allocate all of it upfront
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity: Some(capacity),
        };
    }
}

/// Collects into an unbounded buffer, keeping the iteration order
impl<T> FromIterator<T> for FifoBuffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(items: I) -> Self {
        return FifoBuffer {
            items: items.into_iter().collect(),
            capacity: None,
        };
    }
}

impl<T> RPBuffer<T> for FifoBuffer<T> {
    #[inline]
    fn capacity(&self) -> Option<usize> {
        return self.capacity;
    }

    #[inline]
    fn len(&self) -> usize {
        return self.items.len();
    }

    #[inline]
    fn offer(&mut self, item: T) -> Result<usize, T> {
        if self.is_full() {
            return Err(item);
        }

        self.items.push_back(item);
        return Ok(self.items.len());
    }

    #[inline]
    fn take(&mut self) -> Option<T> {
        return self.items.pop_front();
    }

    #[inline]
    fn get(&self, index: usize) -> Option<&T> {
        return self.items.get(index);
    }

    fn remove_at(&mut self, index: usize) -> Option<T> {
        return self.items.remove(index);
    }

    fn retain<F: FnMut(&T) -> bool>(&mut self, f: F) -> usize {
        let before = self.items.len();
        self.items.retain(f);
        return before - self.items.len();
    }

    fn drain_into<S: DrainSink<T> + ?Sized>(&mut self, sink: &mut S, max: usize) -> Result<usize, BoxError> {
        let mut moved = 0;
        while moved < max {
            let item = match self.items.pop_front() {
                Some(item) => item,
                None => break,
            };

            if let Err(rejected) = sink.accept(item) {
                self.items.push_front(rejected.item);
                return Err(rejected.cause);
            }
            moved = moved + 1;
        }
        return Ok(moved);
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}
