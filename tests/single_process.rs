//! Concurrency scenarios 1 and 2 against unnamed (intra-process) queues
//! — the full send/receive engine, exercised without a second OS
//! process.

use std::sync::Arc;
use std::thread;

use ipcbus::{MsgQueue, Priority, QueueOptions, Timeout};

#[test]
fn single_producer_single_consumer_capacity_one_preserves_order_and_count() {
    let queue = Arc::new(
        MsgQueue::create(1, 8, QueueOptions::Fifo, None).expect("create unnamed queue"),
    );

    const N: u64 = 10_000;

    let producer_queue = Arc::clone(&queue);
    let producer = thread::spawn(move || {
        for seq in 0..N {
            producer_queue
                .send(&seq.to_be_bytes(), Timeout::Forever, Priority::Normal)
                .expect("send");
        }
    });

    let consumer_queue = Arc::clone(&queue);
    let consumer = thread::spawn(move || {
        let mut received = Vec::with_capacity(N as usize);
        let mut buf = [0u8; 8];
        for _ in 0..N {
            let n = consumer_queue.receive(&mut buf, Timeout::Forever).expect("receive");
            assert_eq!(n, 8);
            received.push(u64::from_be_bytes(buf));
        }
        received
    });

    producer.join().unwrap();
    let received = consumer.join().unwrap();

    assert_eq!(received.len(), N as usize);
    assert_eq!(received, (0..N).collect::<Vec<_>>());

    let stat = queue.stat();
    assert_eq!(stat.msg_num, 0);
    assert_eq!(stat.send_times, N as i32);
    assert_eq!(stat.recv_times, N as i32);
}

#[test]
fn alternating_priority_into_capacity_three_delivers_all_payloads_with_bounded_depth() {
    let queue = Arc::new(
        MsgQueue::create(3, 16, QueueOptions::Priority, None).expect("create unnamed queue"),
    );

    let producer_queue = Arc::clone(&queue);
    let producer = thread::spawn(move || {
        for i in 0..100 {
            let payload = format!("ab-{i:08}");
            let priority = if i % 2 == 0 { Priority::Normal } else { Priority::Urgent };
            producer_queue.send(payload.as_bytes(), Timeout::Forever, priority).expect("send");
            assert!(producer_queue.stat().msg_num <= 3);
        }
    });

    let consumer_queue = Arc::clone(&queue);
    let consumer = thread::spawn(move || {
        let mut received = Vec::with_capacity(100);
        let mut buf = [0u8; 16];
        for _ in 0..100 {
            thread::sleep(std::time::Duration::from_micros(50));
            let n = consumer_queue.receive(&mut buf, Timeout::Forever).expect("receive");
            assert!(consumer_queue.stat().msg_num <= 3);
            received.push(String::from_utf8_lossy(&buf[..n]).into_owned());
        }
        received
    });

    producer.join().unwrap();
    let mut received = consumer.join().unwrap();

    let mut expected: Vec<String> = (0..100).map(|i| format!("ab-{i:08}")).collect();
    received.sort();
    expected.sort();
    assert_eq!(received, expected);
}

#[test]
fn receive_into_undersized_buffer_truncates_and_keeps_queue_consistent() {
    let queue = MsgQueue::create(2, 32, QueueOptions::Fifo, None).expect("create unnamed queue");

    queue.send(b"hello, world", Timeout::Forever, Priority::Normal).expect("send");
    queue.send(b"second message", Timeout::Forever, Priority::Normal).expect("send");

    let mut small = [0u8; 5];
    let n = queue.receive(&mut small, Timeout::Forever).expect("receive");
    assert_eq!(n, 5);
    assert_eq!(&small, b"hello");

    let mut buf = [0u8; 32];
    let n = queue.receive(&mut buf, Timeout::Forever).expect("receive");
    assert_eq!(&buf[..n], b"second message");
}

#[test]
fn send_with_zero_timeout_on_full_queue_fails_without_consuming_depth() {
    let queue = MsgQueue::create(1, 8, QueueOptions::Fifo, None).expect("create unnamed queue");
    queue.send(b"one", Timeout::Forever, Priority::Normal).expect("send");

    let before = queue.stat().msg_num;
    let err = queue.send(b"two", Timeout::Millis(0), Priority::Normal).unwrap_err();
    assert!(matches!(err, ipcbus::QueueError::TimedOut));
    assert_eq!(queue.stat().msg_num, before);
}
