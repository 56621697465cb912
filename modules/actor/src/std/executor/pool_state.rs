//! Shared lifecycle machinery for the fixed pools.

use std::{
  sync::{Mutex, MutexGuard},
  thread::{self, ThreadId},
};

use hashbrown::HashSet;
use portable_atomic::{AtomicU8, Ordering};

#[cfg(test)]
mod tests;

/// Pool lifecycle phase. Transitions are forward-only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum PoolPhase {
  /// Accepting and executing submissions.
  Running      = 0,
  /// Rejecting submissions; workers drain visible work and exit.
  ShuttingDown = 1,
  /// Rejecting submissions; workers exit after their in-flight task.
  Stopped      = 2,
}

impl PoolPhase {
  const fn as_u8(self) -> u8 {
    self as u8
  }

  const fn from_u8(value: u8) -> Self {
    match value {
      | 2 => Self::Stopped,
      | 1 => Self::ShuttingDown,
      | _ => Self::Running,
    }
  }
}

/// Monotone three-valued lifecycle word.
pub(crate) struct PoolState {
  phase: AtomicU8,
}

impl PoolState {
  pub(crate) fn new() -> Self {
    Self { phase: AtomicU8::new(PoolPhase::Running.as_u8()) }
  }

  pub(crate) fn phase(&self) -> PoolPhase {
    PoolPhase::from_u8(self.phase.load(Ordering::Acquire))
  }

  pub(crate) fn is_running(&self) -> bool {
    self.phase() == PoolPhase::Running
  }

  /// Advances the phase to `target` unless it is already there (or past).
  /// Returns `true` when this call performed the transition.
  pub(crate) fn advance(&self, target: PoolPhase) -> bool {
    let mut current = self.phase.load(Ordering::Acquire);
    while current < target.as_u8() {
      match self.phase.compare_exchange(current, target.as_u8(), Ordering::AcqRel, Ordering::Acquire) {
        | Ok(_) => return true,
        | Err(observed) => current = observed,
      }
    }
    false
  }
}

/// Threads currently acting as workers of one pool.
///
/// `await_termination` consults this to let a worker count itself out of
/// the termination latch instead of waiting on its own exit.
pub(crate) struct WorkerRegistry {
  ids: Mutex<HashSet<ThreadId, ahash::RandomState>>,
}

impl WorkerRegistry {
  pub(crate) fn new() -> Self {
    Self { ids: Mutex::new(HashSet::default()) }
  }

  pub(crate) fn register_current(&self) {
    self.lock().insert(thread::current().id());
  }

  pub(crate) fn deregister_current(&self) {
    self.lock().remove(&thread::current().id());
  }

  /// Removes the calling thread from the registry; `true` when it was a
  /// registered worker (the removal keeps a second call from double
  /// counting).
  pub(crate) fn take_current(&self) -> bool {
    self.lock().remove(&thread::current().id())
  }

  fn lock(&self) -> MutexGuard<'_, HashSet<ThreadId, ahash::RandomState>> {
    match self.ids.lock() {
      | Ok(guard) => guard,
      | Err(poisoned) => poisoned.into_inner(),
    }
  }
}
