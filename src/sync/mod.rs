//! The two OS synchronization primitives the queue engine composes:
//! named counting semaphores and a named mutex.

pub mod mutex;
pub mod sem;

pub use mutex::NamedMutex;
pub use sem::NamedSemaphore;
