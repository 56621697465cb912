use std::{
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  thread,
  time::Duration,
};

use axon_utils_rs::concurrent::CountDownLatch;

use super::FixedThreadPool;
use crate::std::executor::Executor;

#[test]
fn submitted_tasks_run_exactly_once() {
  const TASKS: usize = 1_000;
  let pool = FixedThreadPool::new(4).unwrap();
  let counter = Arc::new(AtomicUsize::new(0));
  let latch = Arc::new(CountDownLatch::new(TASKS));

  for _ in 0..TASKS {
    let c = Arc::clone(&counter);
    let l = Arc::clone(&latch);
    pool
      .execute(Box::new(move || {
        c.fetch_add(1, Ordering::Relaxed);
        l.count_down();
      }))
      .unwrap();
  }

  assert!(latch.wait_timeout(Duration::from_secs(30)));
  assert_eq!(counter.load(Ordering::Relaxed), TASKS);
}

#[test]
fn workers_carry_the_pool_name() {
  let pool = FixedThreadPool::builder().pool_size(1).name("named").build().unwrap();
  let latch = Arc::new(CountDownLatch::new(1));
  let observed = Arc::new(std::sync::Mutex::new(String::new()));

  let l = Arc::clone(&latch);
  let o = Arc::clone(&observed);
  pool
    .execute(Box::new(move || {
      *o.lock().unwrap() = thread::current().name().unwrap_or_default().to_string();
      l.count_down();
    }))
    .unwrap();

  assert!(latch.wait_timeout(Duration::from_secs(10)));
  assert_eq!(observed.lock().unwrap().as_str(), "named-worker-0");
}

#[test]
fn execute_after_shutdown_hands_the_task_back() {
  let pool = FixedThreadPool::new(1).unwrap();
  pool.shutdown();
  let refused = pool.execute(Box::new(|| {})).unwrap_err();
  // The caller can still run the returned task.
  refused.into_task()();
}

#[test]
fn shutdown_is_idempotent_and_stop_is_forward_only() {
  let pool = FixedThreadPool::new(2).unwrap();
  pool.shutdown();
  pool.shutdown();
  assert!(pool.is_shutdown());
  let drained = pool.shutdown_now();
  assert!(drained.is_empty());
  assert!(pool.await_termination(Duration::from_secs(10)));
  assert!(pool.is_terminated());
}

#[test]
fn termination_completes_after_graceful_shutdown() {
  let pool = FixedThreadPool::new(4).unwrap();
  let counter = Arc::new(AtomicUsize::new(0));
  for _ in 0..100 {
    let c = Arc::clone(&counter);
    pool.execute(Box::new(move || {
      c.fetch_add(1, Ordering::Relaxed);
    }))
    .unwrap();
  }
  pool.shutdown();
  assert!(pool.await_termination(Duration::from_secs(30)));
  assert!(pool.is_terminated());
  assert_eq!(counter.load(Ordering::Relaxed), 100, "graceful shutdown drains visible work");
}

#[test]
fn a_panicking_task_reaches_the_hook_and_spares_the_worker() {
  let panics = Arc::new(AtomicUsize::new(0));
  let hook_panics = Arc::clone(&panics);
  let pool = FixedThreadPool::builder()
    .pool_size(1)
    .on_panic(move |_| {
      hook_panics.fetch_add(1, Ordering::Relaxed);
    })
    .build()
    .unwrap();

  let latch = Arc::new(CountDownLatch::new(1));
  pool.execute(Box::new(|| panic!("boom"))).unwrap();
  let l = Arc::clone(&latch);
  pool.execute(Box::new(move || l.count_down())).unwrap();

  assert!(latch.wait_timeout(Duration::from_secs(10)), "the worker must survive the panic");
  assert_eq!(panics.load(Ordering::Relaxed), 1);
}

#[test]
fn parked_workers_wake_for_late_submissions() {
  let pool = FixedThreadPool::builder().pool_size(2).park_threshold(1).build().unwrap();
  // Give the workers time to fall through to the monitor stage.
  thread::sleep(Duration::from_millis(100));

  let latch = Arc::new(CountDownLatch::new(1));
  let l = Arc::clone(&latch);
  pool.execute(Box::new(move || l.count_down())).unwrap();
  assert!(latch.wait_timeout(Duration::from_secs(10)));
}

#[test]
fn await_termination_times_out_while_workers_live() {
  let pool = FixedThreadPool::new(1).unwrap();
  assert!(!pool.await_termination(Duration::from_millis(50)));
  assert!(!pool.is_terminated());
  pool.shutdown();
  assert!(pool.await_termination(Duration::from_secs(10)));
}
