//! The intrusive free/used index lists threaded through the node
//! array. All mutations here must happen under the queue mutex; this
//! module has no locking of its own.

use crate::layout::{QueueView, SENTINEL};

/// Pop the head of the free list. Precondition: `header.free !=
/// SENTINEL`, guaranteed by the caller having already taken an
/// `emptyCount` permit.
pub fn allocate(view: &QueueView) -> i32 {
    let header = view.header_mut();
    debug_assert_ne!(header.free, SENTINEL, "allocate() called with an empty free list");

    let idx = header.free;
    let node = view.node_mut(idx);
    header.free = node.free;
    node.free = SENTINEL;
    node.used = SENTINEL;
    idx
}

/// Append `node_index` at the head side of the used list (grows
/// towards `header.head`, the side normal sends push onto).
pub fn link_normal(view: &QueueView, node_index: i32) {
    let header = view.header_mut();
    if header.head == SENTINEL {
        header.head = node_index;
        header.tail = node_index;
    } else {
        let prev_head = header.head;
        view.node_mut(prev_head).used = node_index;
        header.head = node_index;
    }
}

/// Insert `node_index` at the tail side of the used list, ahead of
/// every pending normal message.
pub fn link_urgent(view: &QueueView, node_index: i32) {
    let header = view.header_mut();
    if header.head == SENTINEL {
        header.head = node_index;
        header.tail = node_index;
    } else {
        view.node_mut(node_index).used = header.tail;
        header.tail = node_index;
    }
}

/// Pop the tail of the used list, pushing it back onto the free list.
/// Returns the popped node index.
pub fn unlink_for_receive(view: &QueueView) -> i32 {
    let header = view.header_mut();
    debug_assert_ne!(header.tail, SENTINEL, "unlink_for_receive() called on an empty queue");

    let idx = header.tail;
    let node = view.node_mut(idx);
    header.tail = node.used;
    node.used = SENTINEL;
    node.free = header.free;
    header.free = idx;

    if header.tail == SENTINEL {
        header.head = SENTINEL;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::total_size;

    fn view_over(buf: &mut [u8], capacity: i32, max_len: u32) -> QueueView {
        let view = unsafe { QueueView::new(buf.as_mut_ptr(), capacity, max_len) };
        view.init();
        view
    }

    #[test]
    fn allocate_and_receive_round_trip_fifo() {
        let mut buf = vec![0u8; total_size(4, 8)];
        let view = view_over(&mut buf, 4, 8);

        let a = allocate(&view);
        link_normal(&view, a);
        let b = allocate(&view);
        link_normal(&view, b);

        // FIFO: a was inserted first, so it's consumed first.
        assert_eq!(unlink_for_receive(&view), a);
        assert_eq!(unlink_for_receive(&view), b);
        assert_eq!(view.header().tail, SENTINEL);
        assert_eq!(view.header().head, SENTINEL);
    }

    #[test]
    fn urgent_jumps_ahead_of_pending_normal() {
        let mut buf = vec![0u8; total_size(4, 8)];
        let view = view_over(&mut buf, 4, 8);

        let a = allocate(&view);
        link_normal(&view, a);
        let urgent = allocate(&view);
        link_urgent(&view, urgent);

        assert_eq!(unlink_for_receive(&view), urgent);
        assert_eq!(unlink_for_receive(&view), a);
    }

    #[test]
    fn node_index_conservation_across_full_cycle() {
        let mut buf = vec![0u8; total_size(4, 8)];
        let view = view_over(&mut buf, 4, 8);

        let mut allocated = Vec::new();
        for _ in 0..4 {
            let idx = allocate(&view);
            link_normal(&view, idx);
            allocated.push(idx);
        }
        assert_eq!(view.header().free, SENTINEL);

        let mut received = Vec::new();
        for _ in 0..4 {
            received.push(unlink_for_receive(&view));
        }
        allocated.sort_unstable();
        received.sort_unstable();
        assert_eq!(allocated, received);
        assert_eq!(allocated, vec![0, 1, 2, 3]);
    }
}
