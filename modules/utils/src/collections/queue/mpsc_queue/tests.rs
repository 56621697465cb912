use std::{
  sync::{Arc, Barrier},
  thread,
};

use super::MpscQueue;

#[test]
fn poll_on_empty_queue_returns_none() {
  let queue: MpscQueue<u64> = MpscQueue::new();
  assert!(unsafe { queue.poll() }.is_none());
  assert!(!unsafe { queue.has_pending() });
}

#[test]
fn fifo_ordering_is_preserved_for_a_single_producer() {
  let queue = MpscQueue::new();
  for i in 0..100_u64 {
    queue.push(i);
  }
  for i in 0..100_u64 {
    assert_eq!(unsafe { queue.poll() }, Some(i));
  }
  assert!(unsafe { queue.poll() }.is_none());
}

#[test]
fn has_pending_tracks_visible_successors() {
  let queue = MpscQueue::new();
  assert!(!unsafe { queue.has_pending() });
  queue.push(1_u64);
  assert!(unsafe { queue.has_pending() });
  assert_eq!(unsafe { queue.poll() }, Some(1));
  assert!(!unsafe { queue.has_pending() });
}

#[test]
fn concurrent_producers_deliver_everything_in_per_producer_order() {
  const PRODUCERS: u64 = 4;
  const ITEMS_PER_PRODUCER: u64 = 10_000;
  const ROUNDS: usize = 20;

  for _ in 0..ROUNDS {
    let queue = Arc::new(MpscQueue::new());
    let barrier = Arc::new(Barrier::new(PRODUCERS as usize));

    let mut handles = Vec::new();
    for producer in 0..PRODUCERS {
      let q = Arc::clone(&queue);
      let b = Arc::clone(&barrier);
      handles.push(thread::spawn(move || {
        b.wait();
        for seq in 0..ITEMS_PER_PRODUCER {
          q.push(producer * ITEMS_PER_PRODUCER + seq);
        }
      }));
    }

    let mut collected = Vec::with_capacity((PRODUCERS * ITEMS_PER_PRODUCER) as usize);
    while collected.len() < (PRODUCERS * ITEMS_PER_PRODUCER) as usize {
      if let Some(value) = unsafe { queue.poll() } {
        collected.push(value);
      } else {
        thread::yield_now();
      }
    }
    for h in handles {
      h.join().unwrap();
    }
    assert!(unsafe { queue.poll() }.is_none());

    for producer in 0..PRODUCERS {
      let base = producer * ITEMS_PER_PRODUCER;
      let from_producer: Vec<u64> =
        collected.iter().copied().filter(|&v| v >= base && v < base + ITEMS_PER_PRODUCER).collect();
      let expected: Vec<u64> = (base..base + ITEMS_PER_PRODUCER).collect();
      assert_eq!(from_producer, expected, "per-producer FIFO violated for producer {producer}");
    }
  }
}

#[test]
fn dropping_a_non_empty_queue_releases_payloads() {
  let queue = MpscQueue::new();
  for i in 0..16 {
    queue.push(Arc::new(i));
  }
  let probe = Arc::new(42);
  queue.push(Arc::clone(&probe));
  drop(queue);
  assert_eq!(Arc::strong_count(&probe), 1);
}
