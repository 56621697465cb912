//! Fixed worker pools multiplexing runnable tasks.
//!
//! Two variants with identical lifecycle semantics: [`FixedThreadPool`]
//! drains one shared queue with spin/park/monitor backoff, and
//! [`MultilanePool`] shards submissions across power-of-two lanes picked by
//! producer identity, waiting on a permit gate. Actors reach either one
//! through the blanket [`Strategy`](crate::core::Strategy) implementation
//! for `Arc<E: Executor>`.

mod fixed_thread_pool;
mod multilane_pool;
mod pool_state;

use std::time::Duration;

pub use fixed_thread_pool::{FixedThreadPool, FixedThreadPoolBuilder};
pub use multilane_pool::{MultilanePool, MultilanePoolBuilder};

use crate::core::{Rejected, Task};

/// A fixed pool of worker threads executing submitted tasks.
///
/// Lifecycle is forward-only: running → shutting down → stopped. Both
/// transitions are idempotent; termination is complete once every worker
/// has exited.
pub trait Executor: Send + Sync + 'static {
  /// Submits a task for execution.
  ///
  /// # Errors
  ///
  /// Returns [`Rejected`] (carrying the task back) once shutdown has begun.
  fn execute(&self, task: Task) -> Result<(), Rejected>;

  /// Begins a graceful shutdown: visible work is drained, new submissions
  /// are rejected. Idempotent.
  fn shutdown(&self);

  /// Stops the pool: workers exit after their in-flight task and the
  /// undrained backlog is returned. Implies [`Self::shutdown`].
  fn shutdown_now(&self) -> Vec<Task>;

  /// Returns `true` once shutdown has begun.
  fn is_shutdown(&self) -> bool;

  /// Returns `true` once shutdown has begun and every worker has exited.
  fn is_terminated(&self) -> bool;

  /// Blocks until every worker has exited or the timeout elapses; returns
  /// `true` on termination. A worker of this very pool calling this counts
  /// itself out first instead of deadlocking on its own exit.
  fn await_termination(&self, timeout: Duration) -> bool;
}
