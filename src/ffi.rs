//! Raw, integer-returning entry points matching the original VxWorks
//! call surface verbatim (`create`/`open`/`delete`/`send`/`receive`/
//! `stat`/`show`), exposed here under the source's literal names
//! (`msgQCreateEx`, `msgQOpen`, ...). A handle is an opaque, non-null
//! pointer; `NULL` signals failure from `create`/`open`, `-1` signals
//! failure everywhere else, `0` signals success. This module never
//! panics across the boundary: every internal error collapses to the
//! sentinel return.

use std::os::raw::c_char;
use std::ptr;

use crate::layout::{Priority, QueueOptions, Timeout};
use crate::queue::{MsgQueue, QueueStat};

/// Opaque handle returned by `msgQCreateEx`/`msgQOpen`.
pub type MsgQId = *mut MsgQueue;

/// `WAIT_FOREVER` sentinel, re-exported for callers of the raw API.
pub const WAIT_FOREVER: i64 = -1;

unsafe fn name_from_raw(name: *const c_char) -> Option<String> {
    if name.is_null() {
        return None;
    }
    Some(unsafe { std::ffi::CStr::from_ptr(name) }.to_string_lossy().into_owned())
}

/// Create (or attach to an already-created) message queue.
///
/// # Safety
/// `name` must be either null or a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn msgQCreateEx(
    capacity: i32,
    max_len: u32,
    options: i32,
    name: *const c_char,
) -> MsgQId {
    let Some(options) = QueueOptions::from_raw(options) else {
        return ptr::null_mut();
    };
    let name = unsafe { name_from_raw(name) };
    match MsgQueue::create(capacity, max_len, options, name.as_deref()) {
        Ok(queue) => Box::into_raw(Box::new(queue)),
        Err(_) => ptr::null_mut(),
    }
}

/// Open a queue a prior `create()` call already made.
///
/// # Safety
/// `name` must be a valid, non-null NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn msgQOpen(name: *const c_char) -> MsgQId {
    let Some(name) = (unsafe { name_from_raw(name) }) else {
        return ptr::null_mut();
    };
    match MsgQueue::open(&name) {
        Ok(queue) => Box::into_raw(Box::new(queue)),
        Err(_) => ptr::null_mut(),
    }
}

/// Close `id`'s references to the underlying OS objects.
///
/// # Safety
/// `id` must be a handle previously returned by `msgQCreateEx`/
/// `msgQOpen` and not already passed to `msgQDelete`.
#[no_mangle]
pub unsafe extern "C" fn msgQDelete(id: MsgQId) -> i32 {
    if id.is_null() {
        return -1;
    }
    let queue = unsafe { Box::from_raw(id) };
    match queue.delete() {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Send `n_bytes` from `buf` with the given `timeout_ms`/`priority`.
///
/// # Safety
/// `id` must be a live handle; `buf` must point to at least `n_bytes`
/// readable bytes.
#[no_mangle]
pub unsafe extern "C" fn msgQSend(
    id: MsgQId,
    buf: *const u8,
    n_bytes: u32,
    timeout_ms: i64,
    priority: i32,
) -> i32 {
    if id.is_null() || (buf.is_null() && n_bytes != 0) {
        return -1;
    }
    let Some(priority) = Priority::from_raw(priority) else {
        return -1;
    };
    let queue = unsafe { &*id };
    let slice = unsafe { std::slice::from_raw_parts(buf, n_bytes as usize) };
    match queue.send(slice, Timeout::from_raw(timeout_ms), priority) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Receive into `buf` (capacity `max_n_bytes`), returning the number of
/// bytes copied, or `-1` on failure.
///
/// # Safety
/// `id` must be a live handle; `buf` must point to at least
/// `max_n_bytes` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn msgQReceive(
    id: MsgQId,
    buf: *mut u8,
    max_n_bytes: u32,
    timeout_ms: i64,
) -> i32 {
    if id.is_null() || (buf.is_null() && max_n_bytes != 0) {
        return -1;
    }
    let queue = unsafe { &*id };
    let slice = unsafe { std::slice::from_raw_parts_mut(buf, max_n_bytes as usize) };
    match queue.receive(slice, Timeout::from_raw(timeout_ms)) {
        Ok(copied) => copied as i32,
        Err(_) => -1,
    }
}

/// Raw mirror of [`QueueStat`], `#[repr(C)]` for the FFI boundary.
#[repr(C)]
pub struct MsgQStat {
    pub version: [u8; 8],
    pub capacity: i32,
    pub max_len: u32,
    pub options: i32,
    pub msg_num: i32,
    pub send_times: i32,
    pub recv_times: i32,
}

impl From<QueueStat> for MsgQStat {
    fn from(stat: QueueStat) -> Self {
        MsgQStat {
            version: stat.version,
            capacity: stat.capacity,
            max_len: stat.max_len,
            options: stat.options,
            msg_num: stat.msg_num,
            send_times: stat.send_times,
            recv_times: stat.recv_times,
        }
    }
}

/// Copy the current stat fields into `*out`.
///
/// # Safety
/// `id` must be a live handle; `out` must point to a valid, writable
/// `MsgQStat`.
#[no_mangle]
pub unsafe extern "C" fn msgQStat(id: MsgQId, out: *mut MsgQStat) -> i32 {
    if id.is_null() || out.is_null() {
        return -1;
    }
    let queue = unsafe { &*id };
    unsafe { ptr::write(out, queue.stat().into()) };
    0
}

/// Write the stat fields as text to stdout.
///
/// # Safety
/// `id` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn msgQShow(id: MsgQId) -> i32 {
    if id.is_null() {
        return -1;
    }
    let queue = unsafe { &*id };
    queue.show();
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_send_receive_delete_round_trip_through_raw_api() {
        unsafe {
            let id = msgQCreateEx(4, 16, QueueOptions::Fifo as i32, ptr::null());
            assert!(!id.is_null());

            let payload = b"hello";
            let rc = msgQSend(id, payload.as_ptr(), payload.len() as u32, WAIT_FOREVER, Priority::Normal as i32);
            assert_eq!(rc, 0);

            let mut buf = [0u8; 16];
            let n = msgQReceive(id, buf.as_mut_ptr(), buf.len() as u32, WAIT_FOREVER);
            assert_eq!(n, payload.len() as i32);
            assert_eq!(&buf[..n as usize], payload);

            assert_eq!(msgQDelete(id), 0);
        }
    }

    #[test]
    fn create_rejects_invalid_options() {
        unsafe {
            let id = msgQCreateEx(4, 16, 99, ptr::null());
            assert!(id.is_null());
        }
    }

    #[test]
    fn open_of_nonexistent_name_returns_null() {
        unsafe {
            let name = std::ffi::CString::new("does-not-exist-ffi").unwrap();
            let id = msgQOpen(name.as_ptr());
            assert!(id.is_null());
        }
    }
}
