#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unreachable_pub)]
#![allow(unknown_lints)]

//! Entry point crate for the axon concurrency workspace.
//!
//! Re-exports the member crates under stable names: [`utils`] for the
//! lock-free queue family and coordination primitives, [`actor`] for
//! actors, strategies, and the fixed-pool executors. The [`prelude`]
//! gathers the handful of types most programs touch.

pub use axon_actor_rs as actor;
pub use axon_utils_rs as utils;

/// The types most programs start from.
pub mod prelude {
  pub use axon_actor_rs::{
    core::{Actor, ActorError, BoundedActor, CallerRuns, DeadLetterSink, Strategy, Task, Trampoline},
    std::executor::{Executor, FixedThreadPool, MultilanePool},
  };
  pub use axon_utils_rs::{
    collections::queue::{BoundedQueue, MpscQueue, OfferError, SharedQueue},
    concurrent::{CountDownLatch, PermitGate},
  };
}
