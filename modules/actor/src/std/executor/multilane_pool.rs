//! Fixed worker pool over sharded task lanes.

use std::{
  cell::Cell,
  hint, io,
  panic::{self, AssertUnwindSafe},
  sync::Arc,
  thread,
  time::Duration,
};

use axon_utils_rs::{
  collections::queue::SharedQueue,
  concurrent::{CountDownLatch, PermitGate},
};
use portable_atomic::{AtomicU64, AtomicUsize, Ordering};

use super::{
  Executor,
  pool_state::{PoolPhase, PoolState, WorkerRegistry},
};
use crate::core::{Rejected, Strategy, Task, error::render_panic};


static POOL_SEQ: AtomicU64 = AtomicU64::new(0);
static NEXT_THREAD_TOKEN: AtomicUsize = AtomicUsize::new(0);

thread_local! {
  static THREAD_TOKEN: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Stable per-thread token standing in for a numeric thread id; lanes are
/// picked as `token & (lanes - 1)`.
fn thread_token() -> usize {
  THREAD_TOKEN.with(|token| {
    if let Some(assigned) = token.get() {
      assigned
    } else {
      let assigned = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
      token.set(Some(assigned));
      assigned
    }
  })
}

const fn lane_for(token: usize, mask: usize) -> usize {
  token & mask
}

/// Largest power of two not exceeding `min(pool_size, cpus)`.
fn lane_count_for(pool_size: usize, cpus: usize) -> usize {
  let upper = pool_size.min(cpus).max(1);
  1 << upper.ilog2()
}

/// How long a worker sits in one gate wait before re-scanning the lanes.
const GATE_WAIT: Duration = Duration::from_millis(50);

type PanicHook = Box<dyn Fn(&str) + Send + Sync>;

/// Fixed worker pool over `2^k` sharded task lanes.
///
/// Submitters enqueue onto the lane their thread token hashes to and
/// release one gate permit; workers drain their home lane first and scan
/// the others in index-xor order. After each executed task a worker polls a
/// few extra rounds (`256 / cpus`) before paying for a gate re-acquisition.
pub struct MultilanePool {
  core: Arc<LaneCore>,
}

struct LaneCore {
  name:        String,
  lanes:       Box<[SharedQueue<Task>]>,
  mask:        usize,
  pool_size:   usize,
  gate:        PermitGate,
  state:       PoolState,
  termination: CountDownLatch,
  registry:    WorkerRegistry,
  bonus_polls: u32,
  on_panic:    PanicHook,
}

impl LaneCore {
  fn poll_lanes(&self, home: usize) -> Option<Task> {
    for offset in 0..self.lanes.len() {
      // Power-of-two lane count keeps `home ^ offset` in range.
      if let Some(task) = self.lanes[home ^ offset].pop() {
        return Some(task);
      }
    }
    None
  }

  fn all_lanes_empty(&self) -> bool {
    self.lanes.iter().all(SharedQueue::is_empty)
  }

  fn wake_all(&self) {
    self.gate.release(self.pool_size);
  }
}

impl MultilanePool {
  /// Starts building a pool.
  #[must_use]
  pub fn builder() -> MultilanePoolBuilder {
    MultilanePoolBuilder { pool_size: None, name: None, on_panic: None }
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

  /// Returns the number of task lanes (a power of two).
  #[must_use]
  pub fn lane_count(&self) -> usize {
    self.core.lanes.len()
  }
}

impl Executor for MultilanePool {
  fn execute(&self, task: Task) -> Result<(), Rejected> {
    if !self.core.state.is_running() {
      return Err(Rejected::new(task));
    }
    self.core.lanes[lane_for(thread_token(), self.core.mask)].push(task);
    self.core.gate.release(1);
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
    for lane in self.core.lanes.iter() {
      while let Some(task) = lane.pop() {
        drained.push(task);
      }
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
      self.core.termination.count_down();
    }
    self.core.termination.wait_timeout(timeout)
  }
}

impl Strategy for MultilanePool {
  fn run(&self, task: Task) -> Result<(), Rejected> {
    self.execute(task)
  }
}

impl Drop for MultilanePool {
  fn drop(&mut self) {
    // Let workers drain and exit instead of parking forever.
    self.shutdown();
  }
}

/// Configuration for [`MultilanePool`].
pub struct MultilanePoolBuilder {
  pool_size: Option<usize>,
  name:      Option<String>,
  on_panic:  Option<PanicHook>,
}

impl MultilanePoolBuilder {
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
  pub fn build(self) -> io::Result<Arc<MultilanePool>> {
    let cpus = available_cpus();
    let pool_size = self.pool_size.unwrap_or(cpus).max(1);
    let lane_count = lane_count_for(pool_size, cpus);
    let name =
      self.name.unwrap_or_else(|| format!("multilane-pool-{}", POOL_SEQ.fetch_add(1, Ordering::Relaxed) + 1));

    let lanes: Box<[SharedQueue<Task>]> = (0..lane_count).map(|_| SharedQueue::new()).collect();
    let core = Arc::new(LaneCore {
      name,
      lanes,
      mask: lane_count - 1,
      pool_size,
      gate: PermitGate::new(pool_size),
      state: PoolState::new(),
      termination: CountDownLatch::new(pool_size),
      registry: WorkerRegistry::new(),
      bonus_polls: (256 / cpus as u32).max(1),
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

    Ok(Arc::new(MultilanePool { core }))
  }
}

fn available_cpus() -> usize {
  thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1)
}

fn default_panic_hook() -> PanicHook {
  Box::new(|message| tracing::error!("task panicked: {message}"))
}

fn worker_loop(core: &Arc<LaneCore>) {
  core.registry.register_current();
  tracing::trace!(pool = %core.name, "worker started");
  let home = lane_for(thread_token(), core.mask);
  'live: loop {
    while let Some(task) = core.poll_lanes(home) {
      run_task(core, task);
      if core.state.phase() == PoolPhase::Stopped {
        break 'live;
      }
    }

    // A short poll burst amortises the cost of re-acquiring the gate right
    // after a task ran.
    let mut found = false;
    for _ in 0..core.bonus_polls {
      hint::spin_loop();
      if let Some(task) = core.poll_lanes(home) {
        run_task(core, task);
        if core.state.phase() == PoolPhase::Stopped {
          break 'live;
        }
        found = true;
        break;
      }
    }
    if found {
      continue;
    }

    match core.state.phase() {
      | PoolPhase::Running => {
        let _ = core.gate.acquire_timeout(GATE_WAIT);
      },
      | PoolPhase::ShuttingDown => {
        if core.all_lanes_empty() {
          break;
        }
      },
      | PoolPhase::Stopped => break,
    }
  }
  core.registry.deregister_current();
  core.termination.count_down();
  tracing::trace!(pool = %core.name, "worker exited");
}

fn run_task(core: &LaneCore, task: Task) {
  if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
    (core.on_panic)(&render_panic(payload.as_ref()));
  }
}
