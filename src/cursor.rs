//! Cursor over a live queue with removal of the current item

use crate::buffer::RPBuffer;
use crate::error::QueueError;
use crate::key::IdentityKey;
use crate::unique_queue::UniqueBlockingQueue;

/// Walks a [`UniqueBlockingQueue`] from head to tail and can remove the item it last returned.
///
/// The lock is only held inside each call, so other threads keep working on the queue. Any structural change
/// not made through this cursor invalidates it and every later call fails with
/// [`QueueError::ConcurrentModification`].
///
/// ```
/// use uniquepool::{RPQueue, UniqueBlockingQueue};
///
/// let q = UniqueBlockingQueue::from_items(vec![1, 2, 3, 4]);
/// let mut cursor = q.cursor();
///
/// while let Some(item) = cursor.advance().unwrap() {
///     if item % 2 == 0 {
///         cursor.remove().unwrap();
///     }
/// }
///
/// assert_eq!(vec![1, 3], q.to_vec());
/// assert!(!q.contains(&2));
/// ```
pub struct Cursor<'q, T, K: IdentityKey<T>, B> {
    queue: &'q UniqueBlockingQueue<T, K, B>,
    // index of the next item to return
    position: usize,
    current: Option<K::Key>,
    expected_modifications: u64,
}

impl<'q, T, K: IdentityKey<T>, B: RPBuffer<T>> Cursor<'q, T, K, B> {
    pub(crate) fn new(queue: &'q UniqueBlockingQueue<T, K, B>, expected_modifications: u64) -> Self {
        return Cursor {
            queue: queue,
            position: 0,
            current: None,
            expected_modifications: expected_modifications,
        };
    }

    /// Returns a copy of the next item or None past the tail
    pub fn advance(&mut self) -> Result<Option<T>, QueueError>
    where
        T: Clone,
    {
        let state = self.queue.lock();
        if state.modifications != self.expected_modifications {
            return Err(QueueError::ConcurrentModification);
        }

        return match state.buffer.get(self.position) {
            Some(item) => {
                self.current = Some(self.queue.key.key(item));
                self.position = self.position + 1;
                Ok(Some(item.clone()))
            }
            None => {
                self.current = None;
                Ok(None)
            }
        };
    }

    /// Removes the item returned by the last call to [`Cursor::advance`] from the queue.
    /// Fails with [`QueueError::InvalidIteratorState`] if there is no such item or it was already removed
    pub fn remove(&mut self) -> Result<(), QueueError> {
        let current = self.current.take().ok_or(QueueError::InvalidIteratorState)?;

        let mut state = self.queue.lock();
        if state.modifications != self.expected_modifications {
            return Err(QueueError::ConcurrentModification);
        }

        self.position = self.position - 1;
        if state.buffer.remove_at(self.position).is_none() {
            return Err(QueueError::InvalidIteratorState);
        }
        state.index.remove(&current);
        state.modifications = state.modifications + 1;
        self.expected_modifications = state.modifications;
        drop(state);

        self.queue.notify_removed();
        return Ok(());
    }
}

impl<'q, T: Clone, K: IdentityKey<T>, B: RPBuffer<T>> Iterator for Cursor<'q, T, K, B> {
    type Item = Result<T, QueueError>;

    fn next(&mut self) -> Option<Self::Item> {
        return self.advance().transpose();
    }
}
