//! A bounded, priority-aware message queue. Messages are
//! fixed-capacity slots shared through memory that may be mapped in
//! one process (unnamed queues) or independently in several processes
//! (named queues, backed by `shared_memory`). Blocking send/receive are
//! gated by a pair of POSIX counting semaphores; a single named mutex
//! serializes mutation of the node list.
//!
//! The safe, typed API lives in [`MsgQueue`]. A C-ABI surface matching
//! the original VxWorks call signatures is exposed under [`ffi`] for
//! callers that need the raw, integer-returning form.

mod error;
mod layout;
mod name_mangle;
mod queue;
mod region;
mod slot_pool;
mod sync;

pub mod ffi;

pub use error::{QueueError, Result};
pub use layout::{Priority, QueueOptions, Timeout};
pub use queue::{MsgQueue, QueueStat};
