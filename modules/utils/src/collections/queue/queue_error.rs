//! Error definitions shared by the queue family.

/// Errors produced when offering an element to a queue.
#[derive(Debug, thiserror::Error)]
pub enum OfferError<T> {
  /// The queue is at capacity. The rejected element is handed back so the
  /// caller can reroute it (dead-letter it, retry, or drop it explicitly).
  #[error("queue is full (bound {bound})")]
  Full {
    /// The element that could not be enqueued.
    payload: T,
    /// The capacity the queue was created with.
    bound:   usize,
  },
}

impl<T> OfferError<T> {
  /// Consumes the error and returns the rejected element.
  pub fn into_payload(self) -> T {
    match self {
      | Self::Full { payload, .. } => payload,
    }
  }
}
