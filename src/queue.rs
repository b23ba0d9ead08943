//! The queue engine: composes `Region` + `QueueView` (layout) +
//! `slot_pool` + the semaphore pair + the mutex into the
//! create/open/delete/send/receive/stat/show protocol.

use tracing::{debug, warn};

use crate::error::{QueueError, Result};
use crate::layout::{total_size, Priority, QueueOptions, QueueView, Timeout, MAGIC, VERSION};
use crate::name_mangle::{mangle, MangledNames};
use crate::region::Region;
use crate::slot_pool;
use crate::sync::{NamedMutex, NamedSemaphore};

/// User-visible snapshot returned by `stat()`.
#[derive(Debug, Clone)]
pub struct QueueStat {
    pub version: [u8; 8],
    pub capacity: i32,
    pub max_len: u32,
    pub options: i32,
    pub msg_num: i32,
    pub send_times: i32,
    pub recv_times: i32,
}

/// A handle to a message queue, shared between threads of one process
/// or (for named queues) mapped independently in several processes.
pub struct MsgQueue {
    view: QueueView,
    region: Region,
    sem_fill: NamedSemaphore,
    sem_empty: NamedSemaphore,
    mutex: NamedMutex,
}

impl MsgQueue {
    /// Create (or attach to an already-created) message queue.
    pub fn create(
        capacity: i32,
        max_len: u32,
        options: QueueOptions,
        name: Option<&str>,
    ) -> Result<Self> {
        if capacity <= 0 {
            return Err(QueueError::InvalidArg(format!(
                "capacity must be > 0, got {capacity}"
            )));
        }
        if max_len == 0 {
            return Err(QueueError::InvalidArg("max_len must be > 0".into()));
        }

        let size = total_size(capacity, max_len);
        let mangled = name.map(mangle).transpose()?;

        let region = match &mangled {
            None => Region::create_or_attach(None, size)?.0,
            Some(m) => Region::create_or_attach(Some(&m.shmem), size)?.0,
        };

        // SAFETY: `region` owns a buffer of at least `size` bytes for
        // as long as `self` is alive.
        let view = unsafe { QueueView::new(region.as_mut_ptr(), capacity, max_len) };

        // Unnamed queues are always fresh; named queues initialize only
        // when the magic does not already match an earlier creator.
        if mangled.is_none() || !view.is_initialized() {
            view.init();
            view.header_mut().options = options as i32;
        } else {
            view.validate(capacity, max_len, options as i32)?;
        }

        let (sem_fill, sem_empty, mutex) = match &mangled {
            None => (
                NamedSemaphore::create_anonymous(0)?,
                NamedSemaphore::create_anonymous(capacity as u32)?,
                NamedMutex::create_anonymous()?,
            ),
            Some(m) => (
                NamedSemaphore::open_or_create(&m.sem_producer, 0)?,
                NamedSemaphore::open_or_create(&m.sem_consumer, capacity as u32)?,
                NamedMutex::open_or_create(&m.mutex)?,
            ),
        };

        Ok(Self { view, region, sem_fill, sem_empty, mutex })
    }

    /// Open a queue a prior `create()` call (in this or another
    /// process) already made.
    pub fn open(name: &str) -> Result<Self> {
        let mangled: MangledNames = mangle(name)?;
        let region = Region::attach_existing(&mangled.shmem)?;

        // Peek the header to discover capacity/max_len before we can
        // build a validated QueueView over the rest of the region.
        let header_ptr = region.as_mut_ptr() as *const crate::layout::Header;
        let (capacity, max_len, magic, version) = unsafe {
            let header = &*header_ptr;
            (header.capacity, header.max_len, header.magic, header.version)
        };

        if magic != MAGIC || version != VERSION {
            return Err(QueueError::CorruptHandle(
                "magic or version mismatch on open".into(),
            ));
        }
        if region.size() < total_size(capacity, max_len) {
            return Err(QueueError::CorruptHandle(
                "region smaller than its own declared layout".into(),
            ));
        }

        let view = unsafe { QueueView::new(region.as_mut_ptr(), capacity, max_len) };

        let sem_fill = NamedSemaphore::attach_existing(&mangled.sem_producer)?;
        let sem_empty = NamedSemaphore::attach_existing(&mangled.sem_consumer)?;
        let mutex = NamedMutex::attach_existing(&mangled.mutex)?;

        Ok(Self { view, region, sem_fill, sem_empty, mutex })
    }

    /// Send a message, blocking the caller until a free slot is
    /// available or `timeout` expires.
    pub fn send(&self, buf: &[u8], timeout: Timeout, priority: Priority) -> Result<()> {
        if buf.len() > self.view.max_len() as usize {
            return Err(QueueError::InvalidArg(format!(
                "message of {} bytes exceeds max_len {}",
                buf.len(),
                self.view.max_len()
            )));
        }

        // There is a free slot iff emptyCount can be taken.
        self.sem_empty.wait(timeout)?;

        // Restore the permit if the mutex can't be taken, so a failed
        // send doesn't leak a slot nobody will ever fill.
        if let Err(err) = self.mutex.lock() {
            if let Err(post_err) = self.sem_empty.post() {
                warn!("failed to restore emptyCount permit after mutex failure: {post_err}");
            }
            return Err(err);
        }

        let idx = slot_pool::allocate(&self.view);
        self.view.payload_slot(idx)[..buf.len()].copy_from_slice(buf);
        self.view.node_mut(idx).length = buf.len() as u32;

        match priority {
            Priority::Normal => slot_pool::link_normal(&self.view, idx),
            Priority::Urgent => slot_pool::link_urgent(&self.view, idx),
        }

        let header = self.view.header_mut();
        header.msg_num += 1;
        header.send_times += 1;

        if let Err(err) = self.mutex.unlock() {
            // The message is already queued and counters are
            // consistent; only the mutex release itself failed.
            return Err(err);
        }

        self.sem_fill.post()?;
        debug!(bytes = buf.len(), ?priority, "message sent");
        Ok(())
    }

    /// Receive the head of the queue into `buf`, blocking until a
    /// message is available or `timeout` expires. Returns the number
    /// of bytes actually copied (`min(buf.len(), node.length)`); if
    /// `buf` is smaller than the message, the tail is discarded.
    pub fn receive(&self, buf: &mut [u8], timeout: Timeout) -> Result<usize> {
        self.sem_fill.wait(timeout)?;

        if let Err(err) = self.mutex.lock() {
            if let Err(post_err) = self.sem_fill.post() {
                warn!("failed to restore fillCount permit after mutex failure: {post_err}");
            }
            return Err(err);
        }

        let idx = self.view.header().tail;
        let msg_len = self.view.node(idx).length as usize;
        let copy_len = buf.len().min(msg_len);
        buf[..copy_len].copy_from_slice(&self.view.payload_slot(idx)[..copy_len]);

        slot_pool::unlink_for_receive(&self.view);

        let header = self.view.header_mut();
        header.msg_num -= 1;
        header.recv_times += 1;

        if let Err(err) = self.mutex.unlock() {
            return Err(err);
        }

        self.sem_empty.post()?;
        debug!(bytes = copy_len, truncated = copy_len < msg_len, "message received");
        Ok(copy_len)
    }

    /// Copy the user-visible header fields. No mutex: a consistent
    /// snapshot is not promised, fields are read once each.
    pub fn stat(&self) -> QueueStat {
        let header = self.view.header();
        QueueStat {
            version: header.version,
            capacity: header.capacity,
            max_len: header.max_len,
            options: header.options,
            msg_num: header.msg_num,
            send_times: header.send_times,
            recv_times: header.recv_times,
        }
    }

    /// Write the stat fields as text to stdout.
    pub fn show(&self) {
        let stat = self.stat();
        let version = String::from_utf8_lossy(&stat.version);
        println!("msgQueue.version      = {version}");
        println!("msgQueue.maxMsg       = {}", stat.capacity);
        println!("msgQueue.maxMsgLength = {}", stat.max_len);
        println!("msgQueue.msgNum       = {}", stat.msg_num);
        println!("msgQueue.options      = {}", stat.options);
        println!("msgQueue.recvTimes    = {}", stat.recv_times);
        println!("msgQueue.sendTimes    = {}", stat.send_times);
        debug!(?stat.capacity, ?stat.max_len, ?stat.msg_num, "queue status shown");
    }

    /// Close this handle's references to the OS objects. Every close
    /// is attempted regardless of whether an earlier one failed; the
    /// region's contents are never wiped, since other handles may
    /// still be live. Returns the first failure, if any, after all
    /// closes have been attempted.
    pub fn delete(self) -> Result<()> {
        let MsgQueue { region, sem_fill, sem_empty, mutex, .. } = self;

        let mut first_err = None;
        let mut note = |result: Result<()>| {
            if let Err(err) = result {
                warn!("delete: close step failed: {err}");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        };

        note(sem_fill.close());
        note(sem_empty.close());
        note(mutex.close());
        drop(region);

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
