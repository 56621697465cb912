//! The seam between the queue family and the scheduling cell.

use axon_utils_rs::collections::queue::{BoundedQueue, MpscQueue, OfferError};

/// Message store behind an actor.
///
/// Producers call [`Self::offer`] from any thread; the scheduling cell is
/// the single logical consumer of [`Self::poll`] and [`Self::has_pending`],
/// serialised by its run flag.
pub trait Mailbox<T>: Send + Sync + 'static {
  /// Attempts to enqueue a message.
  ///
  /// # Errors
  ///
  /// Bounded implementations return [`OfferError::Full`] carrying the
  /// message back; unbounded implementations never fail.
  fn offer(&self, message: T) -> Result<(), OfferError<T>>;

  /// Dequeues the next message visible to the consumer.
  ///
  /// # Safety
  ///
  /// At most one thread may be inside `poll` or [`Self::has_pending`] at a
  /// time. The scheduling cell upholds this with its at-most-one-run
  /// invariant.
  unsafe fn poll(&self) -> Option<T>;

  /// Returns `true` when a published successor is visible.
  ///
  /// # Safety
  ///
  /// Same single-consumer contract as [`Self::poll`].
  unsafe fn has_pending(&self) -> bool;
}

impl<T: Send + 'static> Mailbox<T> for MpscQueue<T> {
  fn offer(&self, message: T) -> Result<(), OfferError<T>> {
    self.push(message);
    Ok(())
  }

  unsafe fn poll(&self) -> Option<T> {
    // SAFETY: forwarded single-consumer contract.
    unsafe { MpscQueue::poll(self) }
  }

  unsafe fn has_pending(&self) -> bool {
    // SAFETY: forwarded single-consumer contract.
    unsafe { MpscQueue::has_pending(self) }
  }
}

impl<T: Send + 'static> Mailbox<T> for BoundedQueue<T> {
  fn offer(&self, message: T) -> Result<(), OfferError<T>> {
    self.try_push(message)
  }

  unsafe fn poll(&self) -> Option<T> {
    // The bounded queue's dequeue is safe under competing consumers; the
    // single-consumer contract is simply stronger than it needs.
    self.pop()
  }

  unsafe fn has_pending(&self) -> bool {
    !self.is_empty()
  }
}
