//! The two named counting semaphores, `fillCount` and `emptyCount`,
//! that gate send/receive against a full or empty queue. Wraps a
//! single POSIX semaphore (`sem: *mut libc::sem_t`,
//! `sem_open`/`sem_wait`/`sem_post`/`sem_trywait`/`sem_close`), with
//! an anonymous (intra-process) form and a millisecond timeout.

use std::cell::Cell;
use std::ffi::CString;

use crate::error::{QueueError, Result};
use crate::layout::Timeout;

enum Backing {
    /// Cross-process: opened via `sem_open`, closed via `sem_close`,
    /// unlinked via `sem_unlink` by whichever handle created it.
    Named { os_name: CString, is_creator: bool },
    /// Intra-process: heap-owned anonymous semaphore, initialized
    /// with `pshared = 0`.
    Owned(Box<libc::sem_t>),
}

pub struct NamedSemaphore {
    sem: *mut libc::sem_t,
    backing: Backing,
    closed: Cell<bool>,
}

// SAFETY: the semaphore is either backed by a POSIX named object
// (inherently safe to share across threads/processes) or a heap
// allocation we never alias mutably outside libc's own synchronization.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Open-or-create a named semaphore, mirroring `Region`'s
    /// first-creator-initializes discipline: we try `O_CREAT|O_EXCL`
    /// first so we can tell whether we are the creator.
    pub fn open_or_create(name: &str, initial: u32) -> Result<Self> {
        let os_name = posix_name(name)?;

        let sem = unsafe {
            libc::sem_open(
                os_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                0o666,
                initial,
            )
        };

        let (sem, is_creator) = if sem == libc::SEM_FAILED {
            if unsafe { *libc::__errno_location() } != libc::EEXIST {
                return Err(QueueError::generic(format!(
                    "sem_open({name}) failed: {}",
                    std::io::Error::last_os_error()
                )));
            }
            // Someone else created it first; attach to the existing one.
            let sem = unsafe { libc::sem_open(os_name.as_ptr(), 0) };
            if sem == libc::SEM_FAILED {
                return Err(QueueError::generic(format!(
                    "sem_open({name}) (attach) failed: {}",
                    std::io::Error::last_os_error()
                )));
            }
            (sem, false)
        } else {
            (sem, true)
        };

        Ok(Self {
            sem,
            backing: Backing::Named { os_name, is_creator },
            closed: Cell::new(false),
        })
    }

    /// Attach to an existing named semaphore without creating it.
    pub fn attach_existing(name: &str) -> Result<Self> {
        let os_name = posix_name(name)?;
        let sem = unsafe { libc::sem_open(os_name.as_ptr(), 0) };
        if sem == libc::SEM_FAILED {
            return Err(QueueError::NotFound(format!("semaphore '{name}' does not exist")));
        }
        Ok(Self {
            sem,
            backing: Backing::Named { os_name, is_creator: false },
            closed: Cell::new(false),
        })
    }

    /// Create an anonymous, process-private semaphore.
    pub fn create_anonymous(initial: u32) -> Result<Self> {
        let mut boxed: Box<libc::sem_t> = Box::new(unsafe { std::mem::zeroed() });
        let rc = unsafe { libc::sem_init(boxed.as_mut(), 0, initial) };
        if rc != 0 {
            return Err(QueueError::generic(format!(
                "sem_init failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        let sem = boxed.as_mut() as *mut libc::sem_t;
        Ok(Self { sem, backing: Backing::Owned(boxed), closed: Cell::new(false) })
    }

    /// Wait on the semaphore, honoring `Timeout::Forever` or a
    /// millisecond bound.
    pub fn wait(&self, timeout: Timeout) -> Result<()> {
        let rc = match timeout {
            Timeout::Forever => unsafe { libc::sem_wait(self.sem) },
            Timeout::Millis(0) => unsafe { libc::sem_trywait(self.sem) },
            Timeout::Millis(ms) => {
                let deadline = deadline_from_now(ms);
                unsafe { libc::sem_timedwait(self.sem, &deadline) }
            }
        };

        if rc == 0 {
            return Ok(());
        }

        let errno = unsafe { *libc::__errno_location() };
        if errno == libc::ETIMEDOUT || errno == libc::EAGAIN {
            Err(QueueError::TimedOut)
        } else {
            Err(QueueError::generic(format!(
                "sem_wait failed: {}",
                std::io::Error::last_os_error()
            )))
        }
    }

    /// Increment the semaphore's value by one.
    pub fn post(&self) -> Result<()> {
        let rc = unsafe { libc::sem_post(self.sem) };
        if rc != 0 {
            return Err(QueueError::generic(format!(
                "sem_post failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    /// Explicitly release this handle's reference, reporting failure.
    /// Idempotent: the ordinary `Drop` impl calls the same routine as a
    /// safety net for handles dropped without an explicit `close()`,
    /// and the second call is a no-op.
    pub fn close(self) -> Result<()> {
        self.close_internal()
    }

    fn close_internal(&self) -> Result<()> {
        if self.closed.replace(true) {
            return Ok(());
        }
        match &self.backing {
            Backing::Named { os_name, is_creator } => {
                let closed = unsafe { libc::sem_close(self.sem) };
                let mut unlinked = 0;
                if *is_creator {
                    unlinked = unsafe { libc::sem_unlink(os_name.as_ptr()) };
                }
                if closed != 0 || unlinked != 0 {
                    return Err(QueueError::generic(format!(
                        "closing semaphore failed: {}",
                        std::io::Error::last_os_error()
                    )));
                }
                Ok(())
            }
            Backing::Owned(boxed) => {
                let ptr = boxed.as_ref() as *const libc::sem_t as *mut libc::sem_t;
                if unsafe { libc::sem_destroy(ptr) } != 0 {
                    return Err(QueueError::generic(format!(
                        "sem_destroy failed: {}",
                        std::io::Error::last_os_error()
                    )));
                }
                Ok(())
            }
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        let _ = self.close_internal();
    }
}

/// POSIX named semaphores must start with `/` and contain no further
/// slashes.
fn posix_name(name: &str) -> Result<CString> {
    let full = format!("/{name}");
    CString::new(full).map_err(|_| QueueError::InvalidArg("semaphore name contains a NUL byte".into()))
}

fn deadline_from_now(ms: u64) -> libc::timespec {
    let mut now = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) };
    let add_sec = (ms / 1000) as libc::time_t;
    let add_nsec = (ms % 1000) as i64 * 1_000_000;
    let mut nsec = now.tv_nsec + add_nsec;
    let mut sec = now.tv_sec + add_sec;
    if nsec >= 1_000_000_000 {
        nsec -= 1_000_000_000;
        sec += 1;
    }
    libc::timespec { tv_sec: sec, tv_nsec: nsec }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_post_then_wait_forever_succeeds() {
        let sem = NamedSemaphore::create_anonymous(0).unwrap();
        sem.post().unwrap();
        sem.wait(Timeout::Forever).unwrap();
    }

    #[test]
    fn anonymous_wait_zero_on_empty_times_out() {
        let sem = NamedSemaphore::create_anonymous(0).unwrap();
        let err = sem.wait(Timeout::Millis(0)).unwrap_err();
        assert!(matches!(err, QueueError::TimedOut));
    }

    #[test]
    fn anonymous_wait_with_short_timeout_times_out() {
        let sem = NamedSemaphore::create_anonymous(0).unwrap();
        let err = sem.wait(Timeout::Millis(10)).unwrap_err();
        assert!(matches!(err, QueueError::TimedOut));
    }
}
