//! Destinations for envelopes a bounded mailbox refused.

use portable_atomic::{AtomicU64, Ordering};

/// Records envelopes that could not be delivered.
///
/// A sink is handed to a bounded actor at construction; `send` routes every
/// rejected envelope here. Implementations must be cheap and non-blocking
/// because they run on the producer's thread.
pub trait DeadLetterSink<T>: Send + Sync + 'static {
  /// Records one undeliverable envelope.
  fn record(&self, envelope: T);
}

/// Default sink: counts rejections and reports them through `tracing`.
#[derive(Default)]
pub struct LoggingDeadLetterSink {
  recorded: AtomicU64,
}

impl LoggingDeadLetterSink {
  /// Creates a sink with a zeroed counter.
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the number of envelopes recorded so far.
  #[must_use]
  pub fn recorded(&self) -> u64 {
    self.recorded.load(Ordering::Relaxed)
  }
}

impl<T: Send + 'static> DeadLetterSink<T> for LoggingDeadLetterSink {
  fn record(&self, envelope: T) {
    let total = self.recorded.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::warn!(total, "mailbox full, envelope dropped to dead letters");
    drop(envelope);
  }
}
