//! Fixed worker pool over one shared task queue.

use std::{
  hint, io,
  panic::{self, AssertUnwindSafe},
  sync::{Arc, Condvar, Mutex, MutexGuard, atomic::fence},
  thread,
  time::Duration,
};

use axon_utils_rs::{collections::queue::SharedQueue, concurrent::CountDownLatch};
use portable_atomic::{AtomicU64, AtomicUsize, Ordering};

use super::{
  Executor,
  pool_state::{PoolPhase, PoolState, WorkerRegistry},
};
use crate::core::{Rejected, Strategy, Task, error::render_panic};

#[cfg(test)]
mod tests;

static POOL_SEQ: AtomicU64 = AtomicU64::new(0);

/// How long a worker sits in one monitor wait before re-checking the queue.
/// Bounded parks are the second belt against a lost notification.
const MONITOR_WAIT: Duration = Duration::from_millis(50);
const NANO_PARK: Duration = Duration::from_nanos(1);
const DEFAULT_PARK_THRESHOLD: u32 = 100;
const DEFAULT_SPIN: i64 = 128;

type PanicHook = Box<dyn Fn(&str) + Send + Sync>;

/// Fixed worker pool draining a single shared MPSC task queue.
///
/// Idle workers back off in three stages: busy spins (tuned per worker by a
/// signed moving average), nanosecond parks up to `park_threshold`, then a
/// monitor wait. Producers notify the monitor only when the parked counter
/// says somebody is actually in the third stage.
pub struct FixedThreadPool {
  core: Arc<PoolCore>,
}

struct PoolCore {
  name:           String,
  queue:          SharedQueue<Task>,
  state:          PoolState,
  parked:         AtomicUsize,
  monitor:        Mutex<()>,
  work_ready:     Condvar,
  termination:    CountDownLatch,
  registry:       WorkerRegistry,
  park_threshold: u32,
  initial_spin:   i64,
  on_panic:       PanicHook,
}

impl PoolCore {
  fn lock_monitor(&self) -> MutexGuard<'_, ()> {
    match self.monitor.lock() {
      | Ok(guard) => guard,
      | Err(poisoned) => poisoned.into_inner(),
    }
  }

  fn wake_all(&self) {
    let _guard = self.lock_monitor();
    self.work_ready.notify_all();
  }
}

impl FixedThreadPool {
  /// Starts building a pool.
  #[must_use]
  pub fn builder() -> FixedThreadPoolBuilder {
    FixedThreadPoolBuilder {
      pool_size:      None,
      name:           None,
      park_threshold: DEFAULT_PARK_THRESHOLD,
      spin:           DEFAULT_SPIN,
      on_panic:       None,
    }
  }

  /// Creates a pool of `pool_size` workers with default settings.
  ///
  /// # Errors
  ///
  /// Returns the error of the worker thread that could not be spawned.
  pub fn new(pool_size: usize) -> io::Result<Arc<Self>> {
    Self::builder().pool_size(pool_size).build()
  }

  /// Returns the pool name used for worker thread names.
  #[must_use]
  pub fn name(&self) -> &str {
    &self.core.name
  }
}

impl Executor for FixedThreadPool {
  fn execute(&self, task: Task) -> Result<(), Rejected> {
    if !self.core.state.is_running() {
      return Err(Rejected::new(task));
    }
    self.core.queue.push(task);
    // Pairs with the fence a worker issues between registering as parked
    // and its final emptiness check: either we observe the parked worker
    // and notify, or it observes our push and stays up.
    fence(std::sync::atomic::Ordering::SeqCst);
    if self.core.parked.load(Ordering::Relaxed) > 0 {
      let _guard = self.core.lock_monitor();
      self.core.work_ready.notify_one();
    }
    Ok(())
  }

  fn shutdown(&self) {
    if self.core.state.advance(PoolPhase::ShuttingDown) {
      tracing::debug!(pool = %self.core.name, "shutdown requested");
      self.core.wake_all();
    }
  }

  fn shutdown_now(&self) -> Vec<Task> {
    self.core.state.advance(PoolPhase::ShuttingDown);
    if self.core.state.advance(PoolPhase::Stopped) {
      tracing::debug!(pool = %self.core.name, "stop requested");
    }
    self.core.wake_all();
    let mut drained = Vec::new();
    while let Some(task) = self.core.queue.pop() {
      drained.push(task);
    }
    drained
  }

  fn is_shutdown(&self) -> bool {
    !self.core.state.is_running()
  }

  fn is_terminated(&self) -> bool {
    self.is_shutdown() && self.core.termination.count() == 0
  }

  fn await_termination(&self, timeout: Duration) -> bool {
    if self.core.registry.take_current() {
      // Called from one of our own workers: count it out instead of
      // deadlocking on its exit.
      self.core.termination.count_down();
    }
    self.core.termination.wait_timeout(timeout)
  }
}

impl Strategy for FixedThreadPool {
  fn run(&self, task: Task) -> Result<(), Rejected> {
    self.execute(task)
  }
}

impl Drop for FixedThreadPool {
  fn drop(&mut self) {
    // Let workers drain and exit instead of parking forever.
    self.shutdown();
  }
}

/// Configuration for [`FixedThreadPool`].
pub struct FixedThreadPoolBuilder {
  pool_size:      Option<usize>,
  name:           Option<String>,
  park_threshold: u32,
  spin:           i64,
  on_panic:       Option<PanicHook>,
}

impl FixedThreadPoolBuilder {
  /// Worker count; defaults to the number of available CPUs.
  #[must_use]
  pub fn pool_size(mut self, pool_size: usize) -> Self {
    self.pool_size = Some(pool_size);
    self
  }

  /// Pool name; worker threads are named `<name>-worker-<i>`.
  #[must_use]
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Nanosecond parks an idle worker performs before a monitor wait.
  #[must_use]
  pub fn park_threshold(mut self, park_threshold: u32) -> Self {
    self.park_threshold = park_threshold;
    self
  }

  /// Initial spin budget; the per-worker tuner adjusts it from there.
  #[must_use]
  pub fn spin(mut self, spin: i64) -> Self {
    self.spin = spin;
    self
  }

  /// Hook receiving rendered panics that escape submitted tasks; defaults
  /// to a `tracing` error event.
  #[must_use]
  pub fn on_panic(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
    self.on_panic = Some(Box::new(hook));
    self
  }

  /// Builds the pool and starts its workers.
  ///
  /// # Errors
  ///
  /// Returns the error of the worker thread that could not be spawned; the
  /// pool is stopped in that case and already-started workers exit.
  pub fn build(self) -> io::Result<Arc<FixedThreadPool>> {
    let pool_size = self.pool_size.unwrap_or_else(default_pool_size).max(1);
    let name = self.name.unwrap_or_else(|| format!("fixed-pool-{}", POOL_SEQ.fetch_add(1, Ordering::Relaxed) + 1));
    let core = Arc::new(PoolCore {
      name,
      queue: SharedQueue::new(),
      state: PoolState::new(),
      parked: AtomicUsize::new(0),
      monitor: Mutex::new(()),
      work_ready: Condvar::new(),
      termination: CountDownLatch::new(pool_size),
      registry: WorkerRegistry::new(),
      park_threshold: self.park_threshold,
      initial_spin: self.spin,
      on_panic: self.on_panic.unwrap_or_else(default_panic_hook),
    });

    for index in 0..pool_size {
      let worker_core = Arc::clone(&core);
      let spawned = thread::Builder::new()
        .name(format!("{}-worker-{index}", core.name))
        .spawn(move || worker_loop(&worker_core));
      if let Err(error) = spawned {
        core.state.advance(PoolPhase::Stopped);
        core.wake_all();
        return Err(error);
      }
    }

    Ok(Arc::new(FixedThreadPool { core }))
  }
}

fn default_pool_size() -> usize {
  thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1)
}

fn default_panic_hook() -> PanicHook {
  Box::new(|message| tracing::error!("task panicked: {message}"))
}

fn worker_loop(core: &Arc<PoolCore>) {
  core.registry.register_current();
  tracing::trace!(pool = %core.name, "worker started");
  let mut backoff = Backoff::new(core.initial_spin, core.park_threshold);
  loop {
    match core.queue.pop() {
      | Some(task) => {
        backoff.on_task();
        run_task(core, task);
        if core.state.phase() == PoolPhase::Stopped {
          break;
        }
      },
      | None => match core.state.phase() {
        | PoolPhase::Running => backoff.on_empty(core),
        | PoolPhase::ShuttingDown => {
          // Re-checked after the state load: submissions sequenced before
          // the shutdown transition are visible here.
          if core.queue.is_empty() {
            break;
          }
        },
        | PoolPhase::Stopped => break,
      },
    }
  }
  core.registry.deregister_current();
  core.termination.count_down();
  tracing::trace!(pool = %core.name, "worker exited");
}

fn run_task(core: &PoolCore, task: Task) {
  if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
    (core.on_panic)(&render_panic(payload.as_ref()));
  }
}

/// Per-worker idle backoff ladder with a tuned spin stage.
struct Backoff {
  /// Spin budget before the park stages. The tuner may drive this
  /// negative; the magnitude is still the budget ("delay the next park by
  /// this many no-op iterations"), so the sign is kept.
  optimal_spins:  i64,
  spun:           i64,
  parks:          u32,
  park_threshold: u32,
}

impl Backoff {
  fn new(initial_spin: i64, park_threshold: u32) -> Self {
    Self { optimal_spins: initial_spin, spun: 0, parks: 0, park_threshold }
  }

  fn on_task(&mut self) {
    // Signed moving average over the spins the last task arrival cost.
    self.optimal_spins -= (self.spun + self.optimal_spins) / 2;
    self.spun = 0;
    self.parks = 0;
  }

  fn on_empty(&mut self, core: &PoolCore) {
    if self.spun < self.optimal_spins.unsigned_abs() as i64 {
      hint::spin_loop();
      self.spun += 1;
      return;
    }
    if self.parks < self.park_threshold {
      thread::park_timeout(NANO_PARK);
      self.parks += 1;
      return;
    }

    core.parked.fetch_add(1, Ordering::SeqCst);
    // Pairs with the fence in `execute`; see there.
    fence(std::sync::atomic::Ordering::SeqCst);
    if core.queue.is_empty() && core.state.is_running() {
      let guard = core.lock_monitor();
      if core.queue.is_empty() && core.state.is_running() {
        let _ = core.work_ready.wait_timeout(guard, MONITOR_WAIT);
      }
    }
    core.parked.fetch_sub(1, Ordering::SeqCst);
    self.parks = 0;
  }
}
