//! The single named mutex protecting header and node-list mutations.
//! Named queues back it with a second small `shared_memory` segment
//! (reusing the same mechanism `Region` uses for the main region);
//! unnamed queues back it with a heap-boxed private mutex.

use std::cell::Cell;

use shared_memory::{Shmem, ShmemConf};

use crate::error::{QueueError, Result};

enum Backing {
    /// `is_creator` marks the handle that initialized the
    /// `pthread_mutex_t` in this segment; only it may destroy the
    /// object, since peer handles attached to the same segment may
    /// still be live.
    Shared { shmem: Shmem, is_creator: bool },
    Owned(Box<libc::pthread_mutex_t>),
}

pub struct NamedMutex {
    ptr: *mut libc::pthread_mutex_t,
    backing: Backing,
    closed: Cell<bool>,
}

// SAFETY: the pthread mutex itself provides the cross-thread/process
// synchronization; the Rust wrapper only ever reaches into it through
// `lock`/`unlock`, never aliasing the pointee directly.
unsafe impl Send for NamedMutex {}
unsafe impl Sync for NamedMutex {}

const MUTEX_REGION_SIZE: usize = std::mem::size_of::<libc::pthread_mutex_t>();

impl NamedMutex {
    /// Open-or-create the named mutex segment, initializing the
    /// `pthread_mutex_t` only when we are the creator.
    pub fn open_or_create(name: &str) -> Result<Self> {
        let (shmem, created) = match ShmemConf::new().size(MUTEX_REGION_SIZE).os_id(name).create() {
            Ok(s) => (s, true),
            Err(_) => {
                let s = ShmemConf::new()
                    .size(MUTEX_REGION_SIZE)
                    .os_id(name)
                    .open()
                    .map_err(|e| QueueError::generic(format!("opening mutex segment '{name}': {e}")))?;
                (s, false)
            }
        };

        let ptr = shmem.as_ptr() as *mut libc::pthread_mutex_t;
        if created {
            init_mutex(ptr, true)?;
        }
        Ok(Self {
            ptr,
            backing: Backing::Shared { shmem, is_creator: created },
            closed: Cell::new(false),
        })
    }

    /// Attach to an already-created named mutex segment.
    pub fn attach_existing(name: &str) -> Result<Self> {
        let shmem = ShmemConf::new()
            .size(MUTEX_REGION_SIZE)
            .os_id(name)
            .open()
            .map_err(|_| QueueError::NotFound(format!("mutex '{name}' does not exist")))?;
        let ptr = shmem.as_ptr() as *mut libc::pthread_mutex_t;
        Ok(Self {
            ptr,
            backing: Backing::Shared { shmem, is_creator: false },
            closed: Cell::new(false),
        })
    }

    /// A process-private mutex for unnamed (intra-process) queues.
    pub fn create_anonymous() -> Result<Self> {
        let mut boxed: Box<libc::pthread_mutex_t> = Box::new(unsafe { std::mem::zeroed() });
        init_mutex(boxed.as_mut(), false)?;
        let ptr = boxed.as_mut() as *mut libc::pthread_mutex_t;
        Ok(Self { ptr, backing: Backing::Owned(boxed), closed: Cell::new(false) })
    }

    /// Take the mutex, waiting indefinitely; only the gating semaphore
    /// wait honors a timeout.
    ///
    /// An `EOWNERDEAD` result (a previous holder died without
    /// unlocking) is surfaced as a plain error without repairing the
    /// mutex — a queue with a crashed holder is left unusable rather
    /// than silently patched up.
    pub fn lock(&self) -> Result<()> {
        let rc = unsafe { libc::pthread_mutex_lock(self.ptr) };
        match rc {
            0 => Ok(()),
            e if e == libc::EOWNERDEAD => {
                Err(QueueError::generic("mutex abandoned by a previous holder"))
            }
            e => Err(QueueError::generic(format!("pthread_mutex_lock failed: errno {e}"))),
        }
    }

    pub fn unlock(&self) -> Result<()> {
        let rc = unsafe { libc::pthread_mutex_unlock(self.ptr) };
        if rc != 0 {
            return Err(QueueError::generic(format!(
                "pthread_mutex_unlock failed: errno {rc}"
            )));
        }
        Ok(())
    }

    /// Explicitly release this handle's reference, reporting failure.
    /// Idempotent: `Drop` calls the same routine as a safety net for
    /// handles dropped without an explicit `close()`, and the second
    /// call is a no-op.
    pub fn close(self) -> Result<()> {
        self.close_internal()
    }

    /// Destroys the `pthread_mutex_t` only for the segment's creator or
    /// a process-private mutex; a non-creator handle attached to a
    /// shared segment just lets its mapping drop, since a peer handle
    /// may still be holding or waiting on the same mutex.
    fn close_internal(&self) -> Result<()> {
        if self.closed.replace(true) {
            return Ok(());
        }
        let should_destroy = match &self.backing {
            Backing::Shared { is_creator, .. } => *is_creator,
            Backing::Owned(_) => true,
        };
        if should_destroy && unsafe { libc::pthread_mutex_destroy(self.ptr) } != 0 {
            return Err(QueueError::generic(format!(
                "pthread_mutex_destroy failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
        // `self.backing`'s own Drop (Shmem unmapping/unlinking, or the
        // Box freeing) runs right after this returns, releasing storage.
    }
}

impl Drop for NamedMutex {
    fn drop(&mut self) {
        let _ = self.close_internal();
    }
}

fn init_mutex(ptr: *mut libc::pthread_mutex_t, process_shared: bool) -> Result<()> {
    unsafe {
        let mut attr: libc::pthread_mutexattr_t = std::mem::zeroed();
        if libc::pthread_mutexattr_init(&mut attr) != 0 {
            return Err(QueueError::generic("pthread_mutexattr_init failed"));
        }
        if process_shared {
            libc::pthread_mutexattr_setpshared(&mut attr, libc::PTHREAD_PROCESS_SHARED);
        }
        libc::pthread_mutexattr_setrobust(&mut attr, libc::PTHREAD_MUTEX_ROBUST);
        let rc = libc::pthread_mutex_init(ptr, &attr);
        libc::pthread_mutexattr_destroy(&mut attr);
        if rc != 0 {
            return Err(QueueError::generic(format!("pthread_mutex_init failed: errno {rc}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_lock_unlock_round_trips() {
        let mutex = NamedMutex::create_anonymous().unwrap();
        mutex.lock().unwrap();
        mutex.unlock().unwrap();
    }
}
