//! Error definitions for actor dispatch.

use std::fmt;

use crate::core::strategy::Task;

/// Failure surfaced by a message handler.
///
/// Handler failures are delivered to the actor's error hook and never
/// disturb mailbox state; the batch continues with the next message.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
  /// The handler returned an application-level failure.
  #[error("handler failed: {0}")]
  Handler(String),
  /// The handler panicked; the payload is the rendered panic message.
  #[error("handler panicked: {0}")]
  HandlerPanic(String),
}

impl ActorError {
  /// Creates a handler failure from any displayable cause.
  pub fn handler(cause: impl fmt::Display) -> Self {
    Self::Handler(cause.to_string())
  }
}

/// Error returned when a task is submitted past executor shutdown.
///
/// The rejected task is handed back so the caller can run it elsewhere or
/// drop it deliberately.
#[derive(thiserror::Error)]
#[error("task rejected: executor is shut down")]
pub struct Rejected {
  task: Task,
}

impl Rejected {
  /// Wraps the task that could not be submitted.
  #[must_use]
  pub fn new(task: Task) -> Self {
    Self { task }
  }

  /// Consumes the error and returns the rejected task.
  #[must_use]
  pub fn into_task(self) -> Task {
    self.task
  }
}

impl fmt::Debug for Rejected {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Rejected").finish_non_exhaustive()
  }
}

/// Best-effort rendering of a caught panic payload.
pub(crate) fn render_panic(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    String::from("opaque panic payload")
  }
}
