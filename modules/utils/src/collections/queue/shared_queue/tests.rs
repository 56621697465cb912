use std::{
  sync::{
    Arc, Barrier,
    atomic::{AtomicBool, Ordering},
  },
  thread,
};

use super::SharedQueue;

#[test]
fn pop_on_empty_queue_returns_none() {
  let queue: SharedQueue<u64> = SharedQueue::new();
  assert!(queue.pop().is_none());
  assert!(queue.is_empty());
}

#[test]
fn fifo_ordering_is_preserved_for_a_single_producer() {
  let queue = SharedQueue::new();
  for i in 0..100_u64 {
    queue.push(i);
  }
  assert!(!queue.is_empty());
  for i in 0..100_u64 {
    assert_eq!(queue.pop(), Some(i));
  }
  assert!(queue.pop().is_none());
}

#[test]
fn concurrent_producers_and_consumers_deliver_exactly_once() {
  const PRODUCERS: u64 = 4;
  const CONSUMERS: usize = 4;
  const ITEMS_PER_PRODUCER: u64 = 5_000;
  const TOTAL: usize = (PRODUCERS * ITEMS_PER_PRODUCER) as usize;
  const ROUNDS: usize = 20;

  for _ in 0..ROUNDS {
    let queue = Arc::new(SharedQueue::new());
    let done = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(PRODUCERS as usize + CONSUMERS));

    let mut producers = Vec::new();
    for producer in 0..PRODUCERS {
      let q = Arc::clone(&queue);
      let b = Arc::clone(&barrier);
      producers.push(thread::spawn(move || {
        b.wait();
        for seq in 0..ITEMS_PER_PRODUCER {
          q.push(producer * ITEMS_PER_PRODUCER + seq);
        }
      }));
    }

    let mut consumers = Vec::new();
    for _ in 0..CONSUMERS {
      let q = Arc::clone(&queue);
      let b = Arc::clone(&barrier);
      let d = Arc::clone(&done);
      consumers.push(thread::spawn(move || {
        b.wait();
        let mut collected = Vec::new();
        loop {
          match q.pop() {
            | Some(value) => collected.push(value),
            | None if d.load(Ordering::Acquire) => break,
            | None => thread::yield_now(),
          }
        }
        collected
      }));
    }

    for h in producers {
      h.join().unwrap();
    }
    done.store(true, Ordering::Release);

    let per_consumer: Vec<Vec<u64>> = consumers.into_iter().map(|h| h.join().unwrap()).collect();

    // Within each consumer's output, items from the same producer must
    // appear in push order.
    for (cidx, seq) in per_consumer.iter().enumerate() {
      for producer in 0..PRODUCERS {
        let base = producer * ITEMS_PER_PRODUCER;
        let from_producer: Vec<u64> =
          seq.iter().copied().filter(|&v| v >= base && v < base + ITEMS_PER_PRODUCER).collect();
        for w in from_producer.windows(2) {
          assert!(w[0] < w[1], "FIFO violated: consumer {cidx}, producer {producer}");
        }
      }
    }

    let mut all: Vec<u64> = per_consumer.into_iter().flatten().collect();
    while let Some(v) = queue.pop() {
      all.push(v);
    }
    all.sort_unstable();
    let expected: Vec<u64> = (0..PRODUCERS * ITEMS_PER_PRODUCER).collect();
    assert_eq!(all.len(), TOTAL);
    assert_eq!(all, expected, "every element must be delivered exactly once");
  }
}

#[test]
fn dropping_a_non_empty_queue_releases_payloads() {
  let queue = SharedQueue::new();
  let probe = Arc::new(7_u32);
  for _ in 0..8 {
    queue.push(Arc::clone(&probe));
  }
  assert!(queue.pop().is_some());
  drop(queue);
  // One clone was popped and dropped above; the rest died with the queue.
  // Retired sentinels hold no payloads, so only `probe` itself remains.
  assert_eq!(Arc::strong_count(&probe), 1);
}
