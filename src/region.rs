//! Opens or creates the backing memory region for a queue. Named
//! queues map a `shared_memory::Shmem`; unnamed queues own an
//! equivalent zero-filled private buffer.

use shared_memory::{Shmem, ShmemConf};

use crate::error::{QueueError, Result};

enum Backing {
    Shared(Shmem),
    Owned(Box<[u8]>),
}

pub struct Region {
    backing: Backing,
    size: usize,
}

// SAFETY: the region is either an OS-backed shared mapping (safe to
// share by construction) or a private heap buffer this handle owns
// exclusively until another thread/process attaches via the same
// named segment, at which point all mutation is mutex-guarded by the
// queue engine above this module.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// For a named queue: request a shared region of exactly `size`
    /// bytes. The OS either creates it (we zero-fill) or hands back an
    /// existing one (we do not touch its contents here — the caller
    /// cross-checks the magic before deciding whether to initialize).
    ///
    /// For an unnamed queue (`name = None`): always allocates a fresh
    /// zero-filled private buffer and reports `was_created = true`.
    pub fn create_or_attach(name: Option<&str>, size: usize) -> Result<(Self, bool)> {
        match name {
            None => {
                let buf = vec![0u8; size].into_boxed_slice();
                Ok((Self { backing: Backing::Owned(buf), size }, true))
            }
            Some(name) => {
                let (shmem, was_created) = match ShmemConf::new().size(size).os_id(name).create() {
                    Ok(s) => (s, true),
                    Err(_) => {
                        let s = ShmemConf::new()
                            .size(size)
                            .os_id(name)
                            .open()
                            .map_err(|e| {
                                QueueError::generic(format!("opening shared region '{name}': {e}"))
                            })?;
                        (s, false)
                    }
                };
                Ok((Self { backing: Backing::Shared(shmem), size }, was_created))
            }
        }
    }

    /// Open an existing named region without creating it and without
    /// knowing its size up front (`MsgQueue::open` only has a name, not
    /// a capacity). The region's real size is discovered from the OS
    /// object itself.
    pub fn attach_existing(name: &str) -> Result<Self> {
        let shmem = ShmemConf::new()
            .os_id(name)
            .open()
            .map_err(|_| QueueError::NotFound(format!("shared region '{name}' does not exist")))?;
        let size = shmem.len();
        Ok(Self { backing: Backing::Shared(shmem), size })
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        match &self.backing {
            Backing::Shared(shmem) => shmem.as_ptr(),
            Backing::Owned(buf) => buf.as_ptr() as *mut u8,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

// Region's Drop is implicit: `Shmem`'s own Drop unmaps (and unlinks
// when it is the owner) the shared segment; `Box<[u8]>`'s Drop frees
// the private buffer outright.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnamed_region_is_zero_filled_and_reports_created() {
        let (region, created) = Region::create_or_attach(None, 64).unwrap();
        assert!(created);
        let slice = unsafe { std::slice::from_raw_parts(region.as_mut_ptr(), 64) };
        assert!(slice.iter().all(|&b| b == 0));
    }
}
