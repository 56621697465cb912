/// Actor front types over the scheduling cell.
pub mod actor;
/// The scheduling cell shared by every mailbox flavour.
pub mod actor_cell;
/// Dead-letter destinations for rejected envelopes.
pub mod dead_letter;
/// Error definitions for actors and dispatch.
pub mod error;
/// The mailbox seam between queues and the scheduling cell.
pub mod mailbox;
/// Dispatch strategies binding actors to execution resources.
pub mod strategy;

pub use actor::{Actor, ActorBuilder, BoundedActor, BoundedActorBuilder};
pub use dead_letter::{DeadLetterSink, LoggingDeadLetterSink};
pub use error::{ActorError, Rejected};
pub use mailbox::Mailbox;
pub use strategy::{CallerRuns, Strategy, Task, Trampoline};
