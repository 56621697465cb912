//! Dispatch strategies.
//!
//! A [`Strategy`] is the single coupling point between actors and execution
//! resources: one operation, "run this closure". Actors require only that a
//! strategy eventually runs every submission exactly once and reports
//! submission failures to the caller of [`Strategy::run`], never to the
//! message sender.

use std::{cell::RefCell, collections::VecDeque, sync::Arc};

use crate::core::error::Rejected;


/// A unit of work handed to a strategy or executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs closures on some execution resource.
pub trait Strategy: Send + Sync + 'static {
  /// Runs `task` exactly once, now or later.
  ///
  /// # Errors
  ///
  /// Returns [`Rejected`] when the backing resource refuses the submission
  /// (an executor past shutdown). The task is handed back inside the error.
  fn run(&self, task: Task) -> Result<(), Rejected>;
}

impl<S: Strategy + ?Sized> Strategy for Arc<S> {
  fn run(&self, task: Task) -> Result<(), Rejected> {
    (**self).run(task)
  }
}

/// Synchronous strategy: runs every submission on the calling thread.
///
/// Nested submissions recurse; prefer [`Trampoline`] when handlers send to
/// other actors (or back to themselves).
#[derive(Clone, Copy, Debug, Default)]
pub struct CallerRuns;

impl Strategy for CallerRuns {
  fn run(&self, task: Task) -> Result<(), Rejected> {
    task();
    Ok(())
  }
}

thread_local! {
  static TRAMPOLINE: RefCell<TrampolineState> = RefCell::new(TrampolineState {
    draining: false,
    pending:  VecDeque::new(),
  });
}

struct TrampolineState {
  draining: bool,
  pending:  VecDeque<Task>,
}

/// Thread-bounded synchronous strategy.
///
/// The first submission on a thread drains a thread-local run queue;
/// submissions made while draining are queued instead of recursed into, so
/// arbitrarily deep send chains use constant stack.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trampoline;

impl Strategy for Trampoline {
  fn run(&self, task: Task) -> Result<(), Rejected> {
    let entered = TRAMPOLINE.with(|state| {
      let mut state = state.borrow_mut();
      if state.draining {
        state.pending.push_back(task);
        None
      } else {
        state.draining = true;
        Some(task)
      }
    });

    let Some(task) = entered else {
      return Ok(());
    };

    // Clears the draining flag even when a task unwinds; tasks still queued
    // at that point are picked up by the next submission on this thread.
    let _guard = DrainGuard;

    task();
    loop {
      let next = TRAMPOLINE.with(|state| state.borrow_mut().pending.pop_front());
      let Some(next) = next else {
        return Ok(());
      };
      next();
    }
  }
}

struct DrainGuard;

impl Drop for DrainGuard {
  fn drop(&mut self) {
    TRAMPOLINE.with(|state| state.borrow_mut().draining = false);
  }
}
