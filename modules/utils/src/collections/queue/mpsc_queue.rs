use std::{
  ptr,
  sync::atomic::{AtomicPtr, Ordering},
};

#[cfg(test)]
mod tests;

struct Node<T> {
  next:    AtomicPtr<Node<T>>,
  payload: Option<T>,
}

impl<T> Node<T> {
  fn alloc(payload: Option<T>) -> *mut Self {
    Box::into_raw(Box::new(Self { next: AtomicPtr::new(ptr::null_mut()), payload }))
  }
}

/// Unbounded multi-producer single-consumer queue.
///
/// Producers swap a fresh node into `head` and then publish the previous
/// head's `next` link with a release store; the consumer follows `next`
/// links from `tail`, which always points at an already-consumed sentinel.
/// Between a producer's swap and its link store the consumer may observe
/// `tail.next == null` while the queue is logically non-empty; callers must
/// treat that as "temporarily empty".
///
/// Node memory is managed manually: the consumer frees the outgoing
/// sentinel as it advances. This is sound without deferred reclamation
/// because the consumer can never step past a node whose `next` is still
/// unpublished, so a producer's `prev` pointer stays alive until its link
/// store has been made visible.
pub struct MpscQueue<T> {
  head: AtomicPtr<Node<T>>,
  tail: AtomicPtr<Node<T>>,
}

unsafe impl<T: Send> Send for MpscQueue<T> {}
unsafe impl<T: Send> Sync for MpscQueue<T> {}

impl<T> MpscQueue<T> {
  /// Creates an empty queue holding only the sentinel node.
  #[must_use]
  pub fn new() -> Self {
    let sentinel = Node::alloc(None);
    Self { head: AtomicPtr::new(sentinel), tail: AtomicPtr::new(sentinel) }
  }

  /// Enqueues an element. Safe for any number of concurrent producers.
  pub fn push(&self, payload: T) {
    let node = Node::alloc(Some(payload));
    let prev = self.head.swap(node, Ordering::AcqRel);
    // SAFETY: `prev` cannot have been freed: the consumer only frees nodes
    // it has stepped past, and it cannot step past `prev` until this store
    // publishes the successor link.
    unsafe { (*prev).next.store(node, Ordering::Release) };
  }

  /// Dequeues the next element, or `None` when no successor is visible.
  ///
  /// # Safety
  ///
  /// At most one thread may call `poll` (or [`Self::has_pending`]) at a
  /// time. Callers serialise consumers externally; the actor layer does so
  /// with its scheduling flag.
  pub unsafe fn poll(&self) -> Option<T> {
    let tail = self.tail.load(Ordering::Relaxed);
    // SAFETY: `tail` is the sentinel owned by the single consumer; nobody
    // else frees it.
    let next = unsafe { (*tail).next.load(Ordering::Acquire) };
    if next.is_null() {
      return None;
    }
    // Only the consumer writes `tail`, so a relaxed store suffices.
    self.tail.store(next, Ordering::Relaxed);
    // SAFETY: `next` was published by a producer's release store and is now
    // owned by the consumer; taking the payload clears the slot so the
    // value is not retained by the new sentinel.
    let payload = unsafe { (*next).payload.take() };
    // SAFETY: the outgoing sentinel is unreachable to every producer (they
    // only touch `head` and their own freshly swapped-out predecessor).
    drop(unsafe { Box::from_raw(tail) });
    payload
  }

  /// Returns `true` when a published successor is visible to the consumer.
  ///
  /// # Safety
  ///
  /// Same single-consumer contract as [`Self::poll`].
  pub unsafe fn has_pending(&self) -> bool {
    let tail = self.tail.load(Ordering::Relaxed);
    // SAFETY: sentinel liveness as in `poll`.
    !unsafe { (*tail).next.load(Ordering::Acquire) }.is_null()
  }
}

impl<T> Default for MpscQueue<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Drop for MpscQueue<T> {
  fn drop(&mut self) {
    // Exclusive access via &mut self: free the sentinel and any
    // undelivered suffix.
    let mut node = *self.tail.get_mut();
    while !node.is_null() {
      // SAFETY: every node in the chain was allocated via Box::into_raw and
      // is reachable exactly once from here.
      let boxed = unsafe { Box::from_raw(node) };
      node = boxed.next.load(Ordering::Relaxed);
    }
  }
}
