//! The scheduling cell: at-most-one-run message processing over a mailbox.

use std::{
  panic::{self, AssertUnwindSafe},
  sync::{Arc, Mutex, MutexGuard, atomic::fence},
};

use axon_utils_rs::collections::queue::OfferError;
use portable_atomic::{AtomicU8, Ordering};

use crate::core::{ActorError, Mailbox, Strategy, error::render_panic};


/// Default number of messages drained per scheduled run.
pub const DEFAULT_BATCH_SIZE: usize = 1_024;

/// No run is scheduled or in progress; a producer may claim the cell.
const IDLE: u8 = 1;
/// A run is queued on the strategy or currently draining.
const ACTIVE: u8 = 0;

pub(crate) type Handler<T> = Box<dyn FnMut(T) -> Result<(), ActorError> + Send>;
pub(crate) type ErrorHook = Box<dyn Fn(&ActorError) + Send + Sync>;

/// Mailbox plus run state plus handler: the shared core of both actor
/// flavours.
///
/// The `state` word is the suspension flag: producers that win the
/// IDLE→ACTIVE transition schedule a batch; everyone else relies on the
/// running batch to observe their enqueue. The batch marks itself idle only
/// after an empty observation and then re-checks the mailbox, closing the
/// race with a producer that enqueued in between.
pub(crate) struct ActorCell<T, Q>
where
  T: Send + 'static,
  Q: Mailbox<T>, {
  mailbox:    Q,
  state:      AtomicU8,
  // Uncontended by the at-most-one-run invariant; the mutex exists to make
  // the FnMut handler shareable, not to serialise (the state word does that).
  handler:    Mutex<Handler<T>>,
  on_error:   ErrorHook,
  batch_size: usize,
  strategy:   Box<dyn Strategy>,
}

impl<T, Q> ActorCell<T, Q>
where
  T: Send + 'static,
  Q: Mailbox<T>,
{
  pub(crate) fn new(
    mailbox: Q,
    handler: Handler<T>,
    on_error: ErrorHook,
    batch_size: usize,
    strategy: Box<dyn Strategy>,
  ) -> Self {
    Self {
      mailbox,
      state: AtomicU8::new(IDLE),
      handler: Mutex::new(handler),
      on_error,
      batch_size: batch_size.max(1),
      strategy,
    }
  }

  /// Enqueues a message and wakes the cell if no run is active.
  pub(crate) fn send(self_arc: &Arc<Self>, message: T) -> Result<(), OfferError<T>> {
    self_arc.mailbox.offer(message)?;
    // Pairs with the fence in `run_batch`: either this CAS observes the
    // consumer's idle store (and wins the wake), or the consumer's
    // post-idle re-check observes our published link.
    fence(std::sync::atomic::Ordering::SeqCst);
    if self_arc.state.compare_exchange(IDLE, ACTIVE, Ordering::AcqRel, Ordering::Acquire).is_ok() {
      Self::schedule(self_arc);
    }
    Ok(())
  }

  /// Submits one batch run to the strategy.
  ///
  /// A refused submission restores the cell to idle so a later send can
  /// recover; the failure stays with the dispatch layer and is never
  /// surfaced to senders.
  fn schedule(self_arc: &Arc<Self>) {
    let cell = Arc::clone(self_arc);
    if let Err(rejected) = self_arc.strategy.run(Box::new(move || Self::run_batch(&cell))) {
      self_arc.state.store(IDLE, Ordering::Release);
      tracing::error!("dispatch failed: {rejected}; actor idled for recovery");
    }
  }

  /// Drains up to `batch_size` messages, then either yields back to the
  /// strategy or parks the cell.
  fn run_batch(self_arc: &Arc<Self>) {
    let mut processed = 0_usize;
    {
      let mut handler = self_arc.lock_handler();
      while processed < self_arc.batch_size {
        // SAFETY: the ACTIVE state makes this thread the cell's only
        // consumer until it stores IDLE below.
        let Some(message) = (unsafe { self_arc.mailbox.poll() }) else {
          break;
        };
        processed += 1;
        self_arc.invoke(&mut handler, message);
      }
    }

    // SAFETY: still the single consumer.
    if processed == self_arc.batch_size && unsafe { self_arc.mailbox.has_pending() } {
      // Budget exhausted with work left: go back through the strategy so
      // sibling actors on the same executor get a turn.
      Self::schedule(self_arc);
      return;
    }

    self_arc.state.store(IDLE, Ordering::Release);
    fence(std::sync::atomic::Ordering::SeqCst);
    // SAFETY: a racing producer that already won the flag is *scheduled*,
    // not draining; it cannot poll before this run returns, and this run
    // polls no further. The re-check below only claims consumption again
    // by winning the flag back.
    if unsafe { self_arc.mailbox.has_pending() }
      && self_arc.state.compare_exchange(IDLE, ACTIVE, Ordering::AcqRel, Ordering::Acquire).is_ok()
    {
      Self::schedule(self_arc);
    }
  }

  fn invoke(&self, handler: &mut MutexGuard<'_, Handler<T>>, message: T) {
    match panic::catch_unwind(AssertUnwindSafe(|| (**handler)(message))) {
      | Ok(Ok(())) => {},
      | Ok(Err(error)) => self.report(&error),
      | Err(payload) => self.report(&ActorError::HandlerPanic(render_panic(payload.as_ref()))),
    }
  }

  /// Routes a handler failure to the error hook. A hook that itself panics
  /// aborts the in-flight batch: the cell is restored to idle and the
  /// panic resumes into the executor's containment.
  fn report(&self, error: &ActorError) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| (self.on_error)(error))) {
      self.state.store(IDLE, Ordering::SeqCst);
      panic::resume_unwind(payload);
    }
  }

  fn lock_handler(&self) -> MutexGuard<'_, Handler<T>> {
    match self.handler.lock() {
      | Ok(guard) => guard,
      | Err(poisoned) => poisoned.into_inner(),
    }
  }

  #[cfg(test)]
  pub(crate) fn is_idle(&self) -> bool {
    self.state.load(Ordering::SeqCst) == IDLE
  }
}
