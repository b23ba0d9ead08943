//! On-region binary layout: header, node array, payload array.

use crate::error::{QueueError, Result};

pub const VERSION_LEN: usize = 8;
pub const MAGIC_LEN: usize = 12;

/// No-such-index marker used throughout the free/used lists.
pub const SENTINEL: i32 = -1;

/// Exact-equality version string stamped into every freshly created
/// region.
pub const VERSION: [u8; VERSION_LEN] = *b"VXMQ0001";

/// Exact-equality magic pattern distinguishing an initialized region
/// from all-zero (never-initialized) bytes.
pub const MAGIC: [u8; MAGIC_LEN] = [
    0x56, 0x58, 0x4d, 0x51, 0xa5, 0x5a, 0x3c, 0xc3, 0x81, 0x18, 0x99, 0x42,
];

/// Message queue options: strict arrival order, or urgent-jumps-ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum QueueOptions {
    Fifo = 0,
    Priority = 1,
}

impl QueueOptions {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(QueueOptions::Fifo),
            1 => Some(QueueOptions::Priority),
            _ => None,
        }
    }
}

/// Send priority: normal arrival order, or head-of-line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Priority {
    Normal = 0,
    Urgent = 1,
}

impl Priority {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Priority::Normal),
            1 => Some(Priority::Urgent),
            _ => None,
        }
    }
}

/// Blocking timeout passed to `send`/`receive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    Forever,
    Millis(u64),
}

impl Timeout {
    /// Reconstruct a `Timeout` from the raw `WAIT_FOREVER (-1)` /
    /// non-negative-milliseconds convention used by the raw `ffi` API.
    pub fn from_raw(raw: i64) -> Self {
        if raw < 0 {
            Timeout::Forever
        } else {
            Timeout::Millis(raw as u64)
        }
    }
}

/// Region header at fixed offset 0.
#[repr(C)]
pub struct Header {
    pub version: [u8; VERSION_LEN],
    pub magic: [u8; MAGIC_LEN],
    pub capacity: i32,
    pub max_len: u32,
    pub options: i32,
    pub msg_num: i32,
    pub send_times: i32,
    pub recv_times: i32,
    pub head: i32,
    pub tail: i32,
    pub free: i32,
}

/// One node descriptor; `capacity` of these sit immediately after the
/// header.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Node {
    pub length: u32,
    pub index: i32,
    pub free: i32,
    pub used: i32,
}

pub const HEADER_SIZE: usize = std::mem::size_of::<Header>();
pub const NODE_SIZE: usize = std::mem::size_of::<Node>();

/// Total byte size of the region for a given capacity/max_len.
pub fn total_size(capacity: i32, max_len: u32) -> usize {
    HEADER_SIZE + (capacity as usize) * NODE_SIZE + (capacity as usize) * (max_len as usize)
}

/// A typed view over a raw region buffer. Does not own the memory;
/// `base` must stay valid for the view's lifetime, which the owning
/// `Region`/`MsgQueue` guarantee.
#[derive(Clone, Copy)]
pub struct QueueView {
    base: *mut u8,
    capacity: i32,
    max_len: u32,
}

// SAFETY: QueueView is a bare set of offsets into memory the caller
// (MsgQueue) already guarantees is valid for cross-thread/process
// access, guarded by the queue's own mutex for mutation.
unsafe impl Send for QueueView {}
unsafe impl Sync for QueueView {}

impl QueueView {
    /// # Safety
    /// `base` must point to a buffer of at least
    /// `total_size(capacity, max_len)` bytes, valid for as long as the
    /// returned view is used.
    pub unsafe fn new(base: *mut u8, capacity: i32, max_len: u32) -> Self {
        Self { base, capacity, max_len }
    }

    pub fn capacity(&self) -> i32 {
        self.capacity
    }

    pub fn max_len(&self) -> u32 {
        self.max_len
    }

    pub fn header(&self) -> &Header {
        unsafe { &*(self.base as *const Header) }
    }

    #[allow(clippy::mut_from_ref)]
    pub fn header_mut(&self) -> &mut Header {
        unsafe { &mut *(self.base as *mut Header) }
    }

    fn node_ptr(&self, index: i32) -> *mut Node {
        debug_assert!(index >= 0 && index < self.capacity);
        unsafe { (self.base.add(HEADER_SIZE) as *mut Node).add(index as usize) }
    }

    pub fn node(&self, index: i32) -> &Node {
        unsafe { &*self.node_ptr(index) }
    }

    #[allow(clippy::mut_from_ref)]
    pub fn node_mut(&self, index: i32) -> &mut Node {
        unsafe { &mut *self.node_ptr(index) }
    }

    fn payload_ptr(&self, index: i32) -> *mut u8 {
        debug_assert!(index >= 0 && index < self.capacity);
        let payload_base = HEADER_SIZE + (self.capacity as usize) * NODE_SIZE;
        unsafe {
            self.base
                .add(payload_base + (index as usize) * (self.max_len as usize))
        }
    }

    /// Byte slice for node `index`'s payload slot (full `max_len`).
    pub fn payload_slot(&self, index: i32) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.payload_ptr(index), self.max_len as usize) }
    }

    /// Zero the entire region and lay down a fresh free list.
    pub fn init(&self) {
        unsafe {
            std::ptr::write_bytes(self.base, 0, total_size(self.capacity, self.max_len));
        }
        let header = self.header_mut();
        header.version = VERSION;
        header.magic = MAGIC;
        header.capacity = self.capacity;
        header.max_len = self.max_len;
        header.msg_num = 0;
        header.send_times = 0;
        header.recv_times = 0;
        header.head = SENTINEL;
        header.tail = SENTINEL;
        header.free = if self.capacity > 0 { 0 } else { SENTINEL };

        for i in 0..self.capacity {
            let node = self.node_mut(i);
            node.length = 0;
            node.index = i;
            node.free = if i + 1 < self.capacity { i + 1 } else { SENTINEL };
            node.used = SENTINEL;
        }
    }

    /// Validate that an already-initialized region (non-zero magic)
    /// agrees with the caller's parameters. A second creator attaching
    /// under the same name with a different capacity, max_len, or
    /// options is a configuration error, not silently accepted.
    pub fn validate(
        &self,
        expected_capacity: i32,
        expected_max_len: u32,
        expected_options: i32,
    ) -> Result<()> {
        let header = self.header();
        if header.magic != MAGIC {
            return Err(QueueError::CorruptHandle("magic mismatch".into()));
        }
        if header.version != VERSION {
            return Err(QueueError::CorruptHandle("version mismatch".into()));
        }
        if header.capacity != expected_capacity || header.max_len != expected_max_len {
            return Err(QueueError::CorruptHandle(format!(
                "layout mismatch: region has capacity={} max_len={}, caller requested capacity={} max_len={}",
                header.capacity, header.max_len, expected_capacity, expected_max_len
            )));
        }
        if header.options != expected_options {
            return Err(QueueError::CorruptHandle(format!(
                "options mismatch: region has options={}, caller requested options={}",
                header.options, expected_options
            )));
        }
        Ok(())
    }

    /// True when the region's magic is exactly `MAGIC` (i.e. it has
    /// already been initialized by some creator).
    pub fn is_initialized(&self) -> bool {
        self.header().magic == MAGIC
    }
}
