//! Concurrency stress for the memory log: many producers and readers
//! interleaved against one consumer, checking the eviction arithmetic and
//! that readers never observe a torn generation.
//!
//! Run with: `cargo test --test memlog_stress`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use cradle::memlog::{self, Sink};

const CAPACITY: usize = 64;
const PRODUCERS: usize = 8;
const LINES_PER_PRODUCER: usize = 250;

async fn wait_for_total(handle: &memlog::MemoryLogHandle, total: u64) {
    for _ in 0..1000 {
        let size = handle.size().await;
        if size.evicted + size.current as u64 == total {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let size = handle.size().await;
    panic!(
        "consumer never absorbed {total} lines (current={}, evicted={})",
        size.current, size.evicted
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_producers_and_readers() {
    let cancel = CancellationToken::new();
    let (handle, consumer) = memlog::channel("stress", CAPACITY, Sink::Stdout, cancel.clone());
    let consumer_task = tokio::spawn(consumer.run());

    let mut producers = Vec::new();
    for p in 0..PRODUCERS {
        let handle = handle.clone();
        producers.push(tokio::spawn(async move {
            for i in 0..LINES_PER_PRODUCER {
                handle.emit(format!("producer {p} line {i}"));
                if i % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }

    // Readers hammer the shared lock while the consumer appends. Every
    // observation must be internally consistent.
    let mut readers = Vec::new();
    for _ in 0..4 {
        let handle = handle.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..200 {
                let size = handle.size().await;
                assert!(size.current <= size.max);
                assert_eq!(size.max, CAPACITY);
                assert!(size.evicted % CAPACITY as u64 == 0);

                let entries = handle.tail(CAPACITY).await;
                for (i, window) in entries.windows(2).enumerate() {
                    assert_eq!(
                        window[1].id,
                        window[0].id + 1,
                        "non-contiguous ids at offset {i}"
                    );
                }

                tokio::task::yield_now().await;
            }
        }));
    }

    for task in producers {
        task.await.unwrap();
    }
    for task in readers {
        task.await.unwrap();
    }

    let total = (PRODUCERS * LINES_PER_PRODUCER) as u64;
    wait_for_total(&handle, total).await;

    // Appends are serialized by the single consumer, so the generation
    // arithmetic is exact regardless of producer interleaving.
    let size = handle.size().await;
    let expected_flushes = (total - 1) / CAPACITY as u64;
    assert_eq!(size.evicted, expected_flushes * CAPACITY as u64);
    assert_eq!(size.current as u64, total - size.evicted);

    // head/tail agree and hold original append order
    let head = handle.head(size.current).await;
    let tail = handle.tail(size.current).await;
    assert_eq!(head.len(), size.current);
    assert_eq!(tail.len(), size.current);
    assert_eq!(head.first().map(|e| e.id), Some(0));
    for (a, b) in head.iter().zip(tail.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.line, b.line);
    }

    cancel.cancel();
    consumer_task.await.unwrap();
}

#[tokio::test]
async fn test_dump_during_load() {
    let cancel = CancellationToken::new();
    let (handle, consumer) = memlog::channel("stress", 32, Sink::Stdout, cancel.clone());
    let consumer_task = tokio::spawn(consumer.run());

    for i in 0..20 {
        handle.emit(format!("line {i}"));
    }
    handle.request_dump();

    // The dump flushes everything queued before it and starts a fresh
    // generation whose first entry is the dump trailer.
    for _ in 0..1000 {
        let size = handle.size().await;
        if size.evicted == 20 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let size = handle.size().await;
    assert_eq!(size.evicted, 20);
    assert_eq!(size.current, 1);

    let trailer = &handle.head(1).await[0];
    assert_eq!(trailer.id, 0);
    assert!(
        trailer.line.contains("API driven memory log dump"),
        "trailer: {}",
        trailer.line
    );

    cancel.cancel();
    consumer_task.await.unwrap();
}
