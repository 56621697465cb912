use std::{
  sync::{Condvar, Mutex, MutexGuard},
  time::{Duration, Instant},
};


/// Saturating permit gate.
///
/// Workers block in [`Self::acquire_timeout`] until a producer has released
/// a permit. The permit count saturates at a cap fixed at construction, so
/// releases are idempotent under load: a burst of producers cannot bank
/// more wake-ups than there are workers to wake.
pub struct PermitGate {
  permits:   Mutex<usize>,
  cap:       usize,
  available: Condvar,
}

impl PermitGate {
  /// Creates a gate with zero permits and the given saturation cap.
  ///
  /// # Panics
  ///
  /// Panics when `cap` is zero.
  #[must_use]
  pub fn new(cap: usize) -> Self {
    assert!(cap > 0, "cap must be at least 1");
    Self { permits: Mutex::new(0), cap, available: Condvar::new() }
  }

  /// Releases `n` permits (saturating at the cap) and wakes waiters.
  pub fn release(&self, n: usize) {
    if n == 0 {
      return;
    }
    let mut permits = self.lock();
    *permits = (*permits + n).min(self.cap);
    if n == 1 {
      self.available.notify_one();
    } else {
      self.available.notify_all();
    }
  }

  /// Takes one permit, blocking until one is available or the timeout
  /// elapses. Returns `true` when a permit was taken.
  pub fn acquire_timeout(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut permits = self.lock();
    while *permits == 0 {
      let Some(remaining) = deadline.checked_duration_since(Instant::now()).filter(|d| !d.is_zero()) else {
        return false;
      };
      permits = match self.available.wait_timeout(permits, remaining) {
        | Ok((guard, _)) => guard,
        | Err(poisoned) => poisoned.into_inner().0,
      };
    }
    *permits -= 1;
    true
  }

  /// Takes one permit without blocking. Returns `true` on success.
  pub fn try_acquire(&self) -> bool {
    let mut permits = self.lock();
    if *permits == 0 {
      return false;
    }
    *permits -= 1;
    true
  }

  fn lock(&self) -> MutexGuard<'_, usize> {
    match self.permits.lock() {
      | Ok(guard) => guard,
      | Err(poisoned) => poisoned.into_inner(),
    }
  }
}
