use std::{cell::UnsafeCell, mem::MaybeUninit, sync::atomic::Ordering};

use crossbeam_epoch::{self as epoch, Atomic, Owned};
use crossbeam_utils::CachePadded;

use super::queue_error::OfferError;


struct Node<T> {
  next:    Atomic<Node<T>>,
  count:   u64,
  payload: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Node<T> {
  fn sentinel() -> Owned<Self> {
    Owned::new(Self { next: Atomic::null(), count: 0, payload: UnsafeCell::new(MaybeUninit::uninit()) })
  }
}

/// Bounded non-blocking queue: MPSC-style enqueue with a capacity ceiling,
/// CAS-based dequeue tolerating competing consumers.
///
/// Every node carries a count assigned monotonically at enqueue time; the
/// live queue length is `head.count - tail.count`. The capacity check reads
/// `tail.count` without linearising it against the head CAS, so the bound
/// is a soft ceiling: a few extra elements can slip in while a consumer is
/// concurrently advancing `tail`. With consumers quiescent the ceiling is
/// strict.
pub struct BoundedQueue<T> {
  head:  CachePadded<Atomic<Node<T>>>,
  tail:  CachePadded<Atomic<Node<T>>>,
  bound: u64,
}

unsafe impl<T: Send> Send for BoundedQueue<T> {}
unsafe impl<T: Send> Sync for BoundedQueue<T> {}

impl<T> BoundedQueue<T> {
  /// Creates an empty queue that admits at most `bound` elements.
  ///
  /// # Panics
  ///
  /// Panics when `bound` is zero.
  #[must_use]
  pub fn new(bound: usize) -> Self {
    assert!(bound > 0, "bound must be at least 1");
    let queue = Self {
      head:  CachePadded::new(Atomic::null()),
      tail:  CachePadded::new(Atomic::null()),
      bound: bound as u64,
    };
    // SAFETY: the queue is not shared yet.
    let guard = unsafe { epoch::unprotected() };
    let sentinel = Node::sentinel().into_shared(guard);
    queue.head.store(sentinel, Ordering::Relaxed);
    queue.tail.store(sentinel, Ordering::Relaxed);
    queue
  }

  /// Returns the capacity the queue was created with.
  #[must_use]
  pub fn bound(&self) -> usize {
    self.bound as usize
  }

  /// Attempts to enqueue an element.
  ///
  /// # Errors
  ///
  /// Returns [`OfferError::Full`] carrying the element back when the queue
  /// is at capacity.
  pub fn try_push(&self, payload: T) -> Result<(), OfferError<T>> {
    let guard = &epoch::pin();
    let mut node =
      Owned::new(Node { next: Atomic::null(), count: 0, payload: UnsafeCell::new(MaybeUninit::new(payload)) });
    loop {
      let head = self.head.load(Ordering::Acquire, guard);
      let tail = self.tail.load(Ordering::Acquire, guard);
      // SAFETY: both pointers are guard-protected; a retired tail stays
      // alive until every pinned reader is done with it.
      let head_count = unsafe { head.deref() }.count;
      let tail_count = unsafe { tail.deref() }.count;
      if head_count.saturating_sub(tail_count) >= self.bound {
        let cell = node.into_box().payload;
        // SAFETY: the payload was written at allocation and never taken.
        let payload = unsafe { cell.into_inner().assume_init() };
        return Err(OfferError::Full { payload, bound: self.bound as usize });
      }
      node.count = head_count + 1;
      match self.head.compare_exchange(head, node, Ordering::AcqRel, Ordering::Acquire, guard) {
        | Ok(new) => {
          // SAFETY: guard-protected; the release store publishes the link.
          unsafe { head.deref() }.next.store(new, Ordering::Release);
          return Ok(());
        },
        | Err(failure) => node = failure.new,
      }
    }
  }

  /// Dequeues an element, or `None` when no successor is visible.
  ///
  /// Any number of threads may call this concurrently.
  pub fn pop(&self) -> Option<T> {
    let guard = &epoch::pin();
    loop {
      let tail = self.tail.load(Ordering::Acquire, guard);
      // SAFETY: guard-protected, never null.
      let next = unsafe { tail.deref() }.next.load(Ordering::Acquire, guard);
      if next.is_null() {
        return None;
      }
      if self.tail.compare_exchange(tail, next, Ordering::AcqRel, Ordering::Acquire, guard).is_ok() {
        // SAFETY: the CAS winner owns the successor's payload slot.
        let payload = unsafe { (*next.deref().payload.get()).assume_init_read() };
        // SAFETY: unlinked; epoch reclamation covers racing readers (both
        // consumers and producers reading `tail.count`).
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

impl<T> Drop for BoundedQueue<T> {
  fn drop(&mut self) {
    // SAFETY: &mut self guarantees no concurrent access; only the sentinel
    // has a vacant payload slot.
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
