//! Bounded-mailbox scenarios: capacity under contention and dead letters.

use std::{
  sync::{Arc, Barrier, Mutex},
  thread,
  time::{Duration, Instant},
};

use axon_actor_rs::core::{BoundedActor, DeadLetterSink, Rejected, Strategy, Task};

/// Holds scheduled runs until released; stands in for a paused consumer.
#[derive(Default)]
struct PausedConsumer {
  held: Mutex<Vec<Task>>,
}

impl PausedConsumer {
  fn resume(&self) {
    let drained: Vec<Task> = std::mem::take(&mut *self.held.lock().unwrap());
    for task in drained {
      task();
    }
  }
}

impl Strategy for PausedConsumer {
  fn run(&self, task: Task) -> Result<(), Rejected> {
    self.held.lock().unwrap().push(task);
    Ok(())
  }
}

#[derive(Default)]
struct CapturingSink {
  letters: Mutex<Vec<u64>>,
}

impl DeadLetterSink<u64> for CapturingSink {
  fn record(&self, envelope: u64) {
    self.letters.lock().unwrap().push(envelope);
  }
}

#[test]
fn contended_producers_stay_within_the_capacity_window() {
  const BOUND: usize = 10;
  const PRODUCERS: usize = 10;
  const ATTEMPTS: usize = 2;
  const ROUNDS: usize = 20;

  for _ in 0..ROUNDS {
    let consumer = Arc::new(PausedConsumer::default());
    let delivered = Arc::new(Mutex::new(Vec::new()));

    let actor = {
      let delivered = Arc::clone(&delivered);
      BoundedActor::builder(BOUND, move |m: u64| {
        delivered.lock().unwrap().push(m);
        Ok(())
      })
      .strategy(Arc::clone(&consumer))
      .build()
    };

    let barrier = Arc::new(Barrier::new(PRODUCERS));
    let mut handles = Vec::new();
    for producer in 0..PRODUCERS {
      let actor = actor.clone();
      let barrier = Arc::clone(&barrier);
      handles.push(thread::spawn(move || {
        barrier.wait();
        let mut accepted = Vec::new();
        for attempt in 0..ATTEMPTS {
          let value = (producer * ATTEMPTS + attempt) as u64;
          if actor.try_send(value).is_ok() {
            accepted.push(value);
          }
        }
        accepted
      }));
    }

    let accepted: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    assert!(accepted.len() >= BOUND, "at least the capacity must be admitted");
    assert!(accepted.len() <= PRODUCERS * ATTEMPTS, "soft ceiling window");

    // Resume the consumer: every accepted message arrives exactly once.
    consumer.resume();
    let deadline = Instant::now() + Duration::from_secs(10);
    while delivered.lock().unwrap().len() < accepted.len() {
      assert!(Instant::now() < deadline, "delivery must complete after resume");
      thread::yield_now();
    }

    let mut delivered = delivered.lock().unwrap().clone();
    let mut expected = accepted.clone();
    delivered.sort_unstable();
    expected.sort_unstable();
    assert_eq!(delivered, expected);
  }
}

#[test]
fn overflow_goes_to_the_dead_letter_sink_and_nothing_is_lost() {
  const BOUND: usize = 10;

  let consumer = Arc::new(PausedConsumer::default());
  let sink = Arc::new(CapturingSink::default());
  let delivered = Arc::new(Mutex::new(Vec::new()));

  let actor = {
    let delivered = Arc::clone(&delivered);
    BoundedActor::builder(BOUND, move |m: u64| {
      delivered.lock().unwrap().push(m);
      Ok(())
    })
    .strategy(Arc::clone(&consumer))
    .dead_letters(Arc::clone(&sink) as Arc<dyn DeadLetterSink<u64>>)
    .build()
  };

  for m in 0..25_u64 {
    actor.send(m);
  }

  let dead: Vec<u64> = sink.letters.lock().unwrap().clone();
  assert_eq!(dead.len(), 15, "everything beyond the bound is dead-lettered");

  consumer.resume();
  let deadline = Instant::now() + Duration::from_secs(10);
  while delivered.lock().unwrap().len() < BOUND {
    assert!(Instant::now() < deadline);
    thread::yield_now();
  }

  let mut seen: Vec<u64> = delivered.lock().unwrap().clone();
  seen.extend(dead);
  seen.sort_unstable();
  assert_eq!(seen, (0..25).collect::<Vec<_>>(), "every send is either delivered or dead-lettered");
}
