//! Actor front types: the unbounded and bounded mailbox flavours.

use std::sync::Arc;

use axon_utils_rs::collections::queue::{BoundedQueue, MpscQueue, OfferError};

use crate::core::{
  ActorError,
  actor_cell::{ActorCell, DEFAULT_BATCH_SIZE, ErrorHook, Handler},
  dead_letter::{DeadLetterSink, LoggingDeadLetterSink},
  strategy::{Strategy, Trampoline},
};


/// Single-consumer actor over an unbounded MPSC mailbox.
///
/// `send` is total: it never refuses an envelope and never blocks (beyond
/// node allocation). Handles are cheap to clone and share the same cell.
pub struct Actor<T: Send + 'static> {
  cell: Arc<ActorCell<T, MpscQueue<T>>>,
}

impl<T: Send + 'static> Clone for Actor<T> {
  fn clone(&self) -> Self {
    Self { cell: Arc::clone(&self.cell) }
  }
}

impl<T: Send + 'static> Actor<T> {
  /// Starts building an actor around `handler`.
  pub fn builder(handler: impl FnMut(T) -> Result<(), ActorError> + Send + 'static) -> ActorBuilder<T> {
    ActorBuilder {
      handler:    Box::new(handler),
      on_error:   None,
      batch_size: DEFAULT_BATCH_SIZE,
      strategy:   None,
    }
  }

  /// Enqueues a message; the handler observes sends from one producer
  /// thread in the order they were made.
  pub fn send(&self, message: T) {
    // The unbounded mailbox never refuses an envelope.
    let _ = ActorCell::send(&self.cell, message);
  }
}

/// Configuration for [`Actor`].
pub struct ActorBuilder<T: Send + 'static> {
  handler:    Handler<T>,
  on_error:   Option<ErrorHook>,
  batch_size: usize,
  strategy:   Option<Box<dyn Strategy>>,
}

impl<T: Send + 'static> ActorBuilder<T> {
  /// Hook receiving handler failures; defaults to a `tracing` error event.
  #[must_use]
  pub fn on_error(mut self, hook: impl Fn(&ActorError) + Send + Sync + 'static) -> Self {
    self.on_error = Some(Box::new(hook));
    self
  }

  /// Maximum messages drained per scheduled run before yielding.
  #[must_use]
  pub fn batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size;
    self
  }

  /// Strategy the actor schedules its runs on; defaults to [`Trampoline`].
  #[must_use]
  pub fn strategy(mut self, strategy: impl Strategy) -> Self {
    self.strategy = Some(Box::new(strategy));
    self
  }

  /// Builds the actor.
  #[must_use]
  pub fn build(self) -> Actor<T> {
    let cell = ActorCell::new(
      MpscQueue::new(),
      self.handler,
      self.on_error.unwrap_or_else(default_error_hook),
      self.batch_size,
      self.strategy.unwrap_or_else(|| Box::new(Trampoline)),
    );
    Actor { cell: Arc::new(cell) }
  }
}

/// Single-consumer actor over a bounded mailbox.
///
/// Enqueues that would exceed the bound are either returned to the caller
/// ([`Self::try_send`]) or routed to the dead-letter sink ([`Self::send`]).
pub struct BoundedActor<T: Send + 'static> {
  cell:         Arc<ActorCell<T, BoundedQueue<T>>>,
  dead_letters: Arc<dyn DeadLetterSink<T>>,
  bound:        usize,
}

impl<T: Send + 'static> Clone for BoundedActor<T> {
  fn clone(&self) -> Self {
    Self { cell: Arc::clone(&self.cell), dead_letters: Arc::clone(&self.dead_letters), bound: self.bound }
  }
}

impl<T: Send + 'static> BoundedActor<T> {
  /// Starts building a bounded actor with the given mailbox capacity.
  pub fn builder(
    bound: usize,
    handler: impl FnMut(T) -> Result<(), ActorError> + Send + 'static,
  ) -> BoundedActorBuilder<T> {
    BoundedActorBuilder {
      bound,
      handler: Box::new(handler),
      dead_letters: None,
      on_error: None,
      batch_size: DEFAULT_BATCH_SIZE,
      strategy: None,
    }
  }

  /// Attempts to enqueue a message.
  ///
  /// # Errors
  ///
  /// Returns [`OfferError::Full`] carrying the message back when the
  /// mailbox is at capacity.
  pub fn try_send(&self, message: T) -> Result<(), OfferError<T>> {
    ActorCell::send(&self.cell, message)
  }

  /// Enqueues a message, routing it to the dead-letter sink when the
  /// mailbox is at capacity.
  pub fn send(&self, message: T) {
    if let Err(refused) = ActorCell::send(&self.cell, message) {
      self.dead_letters.record(refused.into_payload());
    }
  }

  /// Returns the mailbox capacity.
  #[must_use]
  pub fn bound(&self) -> usize {
    self.bound
  }
}

/// Configuration for [`BoundedActor`].
pub struct BoundedActorBuilder<T: Send + 'static> {
  bound:        usize,
  handler:      Handler<T>,
  dead_letters: Option<Arc<dyn DeadLetterSink<T>>>,
  on_error:     Option<ErrorHook>,
  batch_size:   usize,
  strategy:     Option<Box<dyn Strategy>>,
}

impl<T: Send + 'static> BoundedActorBuilder<T> {
  /// Destination for envelopes the mailbox refuses; defaults to
  /// [`LoggingDeadLetterSink`].
  #[must_use]
  pub fn dead_letters(mut self, sink: Arc<dyn DeadLetterSink<T>>) -> Self {
    self.dead_letters = Some(sink);
    self
  }

  /// Hook receiving handler failures; defaults to a `tracing` error event.
  #[must_use]
  pub fn on_error(mut self, hook: impl Fn(&ActorError) + Send + Sync + 'static) -> Self {
    self.on_error = Some(Box::new(hook));
    self
  }

  /// Maximum messages drained per scheduled run before yielding.
  #[must_use]
  pub fn batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size;
    self
  }

  /// Strategy the actor schedules its runs on; defaults to [`Trampoline`].
  #[must_use]
  pub fn strategy(mut self, strategy: impl Strategy) -> Self {
    self.strategy = Some(Box::new(strategy));
    self
  }

  /// Builds the actor.
  ///
  /// # Panics
  ///
  /// Panics when the configured bound is zero.
  #[must_use]
  pub fn build(self) -> BoundedActor<T> {
    let cell = ActorCell::new(
      BoundedQueue::new(self.bound),
      self.handler,
      self.on_error.unwrap_or_else(default_error_hook),
      self.batch_size,
      self.strategy.unwrap_or_else(|| Box::new(Trampoline)),
    );
    BoundedActor {
      cell:         Arc::new(cell),
      dead_letters: self.dead_letters.unwrap_or_else(|| Arc::new(LoggingDeadLetterSink::new())),
      bound:        self.bound,
    }
  }
}

fn default_error_hook() -> ErrorHook {
  Box::new(|error| tracing::error!("actor handler error: {error}"))
}
