//! Blocking FIFO queues that coalesce duplicate items
#![warn(missing_docs)]
mod buffer;
mod builder;
mod cursor;
mod error;
mod fifo_buffer;
mod history_queue;
mod index;
mod key;
mod queue;
mod unique_queue;

pub use buffer::{DrainSink, RPBuffer};
pub use builder::UniqueQueueBuilder;
pub use cursor::Cursor;
pub use error::{BoxError, QueueError, SinkRejected};
pub use fifo_buffer::FifoBuffer;
pub use history_queue::HistoryQueue;
pub use key::{EqKey, FnKey, HashKey, IdentityKey};
pub use queue::RPQueue;
pub use unique_queue::UniqueBlockingQueue;
