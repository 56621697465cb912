use std::{cell::UnsafeCell, mem::MaybeUninit, sync::atomic::Ordering};

use crossbeam_epoch::{self as epoch, Atomic, Owned};
use crossbeam_utils::CachePadded;

#[cfg(test)]
mod tests;

struct Node<T> {
  next:    Atomic<Node<T>>,
  payload: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Node<T> {
  fn sentinel() -> Owned<Self> {
    Owned::new(Self { next: Atomic::null(), payload: UnsafeCell::new(MaybeUninit::uninit()) })
  }

  fn with_payload(payload: T) -> Owned<Self> {
    Owned::new(Self { next: Atomic::null(), payload: UnsafeCell::new(MaybeUninit::new(payload)) })
  }
}

/// Unbounded linked queue with the MPSC producer protocol and a CAS-based
/// dequeue that tolerates competing consumers.
///
/// This is the task-queue building block of the executors: every worker in a
/// pool polls the same queue (or the same lane), so the dequeue side
/// advances `tail` by CAS and the loser retries. Unlinked sentinels are
/// retired through epoch-based reclamation, since a losing consumer may
/// still be reading the node a winner just unlinked.
///
/// The producer and consumer pointers are padded onto separate cache lines;
/// lanes of the multilane executor store these queues in an array, so the
/// padding also keeps adjacent lanes from sharing a line.
pub struct SharedQueue<T> {
  head: CachePadded<Atomic<Node<T>>>,
  tail: CachePadded<Atomic<Node<T>>>,
}

unsafe impl<T: Send> Send for SharedQueue<T> {}
unsafe impl<T: Send> Sync for SharedQueue<T> {}

impl<T> SharedQueue<T> {
  /// Creates an empty queue holding only the sentinel node.
  #[must_use]
  pub fn new() -> Self {
    let queue = Self { head: CachePadded::new(Atomic::null()), tail: CachePadded::new(Atomic::null()) };
    // SAFETY: the queue is not shared yet, so an unprotected guard is fine.
    let guard = unsafe { epoch::unprotected() };
    let sentinel = Node::sentinel().into_shared(guard);
    queue.head.store(sentinel, Ordering::Relaxed);
    queue.tail.store(sentinel, Ordering::Relaxed);
    queue
  }

  /// Enqueues an element. Safe for any number of concurrent producers.
  pub fn push(&self, payload: T) {
    let guard = &epoch::pin();
    let node = Node::with_payload(payload).into_shared(guard);
    let prev = self.head.swap(node, Ordering::AcqRel, guard);
    // SAFETY: `prev` is protected by the pinned guard; the release store
    // publishes the successor link for consumers' acquire loads.
    unsafe { prev.deref() }.next.store(node, Ordering::Release);
  }

  /// Dequeues an element, or `None` when no successor is visible.
  ///
  /// Any number of threads may call this concurrently; the CAS winner owns
  /// the successor's payload.
  pub fn pop(&self) -> Option<T> {
    let guard = &epoch::pin();
    loop {
      let tail = self.tail.load(Ordering::Acquire, guard);
      // SAFETY: `tail` is protected by the guard; it is never null.
      let next = unsafe { tail.deref() }.next.load(Ordering::Acquire, guard);
      if next.is_null() {
        return None;
      }
      if self.tail.compare_exchange(tail, next, Ordering::AcqRel, Ordering::Acquire, guard).is_ok() {
        // SAFETY: winning the CAS grants exclusive claim on the successor's
        // payload slot; `next` becomes the new sentinel with a logically
        // vacant slot.
        let payload = unsafe { (*next.deref().payload.get()).assume_init_read() };
        // SAFETY: the outgoing sentinel is unlinked; epoch reclamation
        // keeps it alive for any consumer still holding the pointer.
        unsafe { guard.defer_destroy(tail) };
        return Some(payload);
      }
    }
  }

  /// Returns `true` when no published successor is visible.
  #[must_use]
  pub fn is_empty(&self) -> bool {
    let guard = &epoch::pin();
    let tail = self.tail.load(Ordering::Acquire, guard);
    // SAFETY: guard-protected, never null.
    unsafe { tail.deref() }.next.load(Ordering::Acquire, guard).is_null()
  }
}

impl<T> Default for SharedQueue<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Drop for SharedQueue<T> {
  fn drop(&mut self) {
    // SAFETY: &mut self guarantees no concurrent access; the sentinel's
    // payload slot is vacant, every successor still owns its payload.
    let guard = unsafe { epoch::unprotected() };
    let mut node = self.tail.load(Ordering::Relaxed, guard);
    let mut is_sentinel = true;
    while !node.is_null() {
      let next = unsafe { node.deref() }.next.load(Ordering::Relaxed, guard);
      let mut owned = unsafe { node.into_owned() };
      if !is_sentinel {
        unsafe { owned.payload.get_mut().assume_init_drop() };
      }
      drop(owned);
      is_sentinel = false;
      node = next;
    }
  }
}
