use super::{PoolPhase, PoolState, WorkerRegistry};

#[test]
fn fresh_state_is_running() {
  let state = PoolState::new();
  assert_eq!(state.phase(), PoolPhase::Running);
  assert!(state.is_running());
}

#[test]
fn advance_is_forward_only_and_idempotent() {
  let state = PoolState::new();
  assert!(state.advance(PoolPhase::ShuttingDown));
  assert!(!state.advance(PoolPhase::ShuttingDown), "second shutdown is a no-op");
  assert!(state.advance(PoolPhase::Stopped));
  assert!(!state.advance(PoolPhase::ShuttingDown), "the phase never moves backwards");
  assert_eq!(state.phase(), PoolPhase::Stopped);
}

#[test]
fn advance_can_skip_straight_to_stopped() {
  let state = PoolState::new();
  assert!(state.advance(PoolPhase::Stopped));
  assert_eq!(state.phase(), PoolPhase::Stopped);
}

#[test]
fn registry_takes_the_current_thread_only_once() {
  let registry = WorkerRegistry::new();
  assert!(!registry.take_current());
  registry.register_current();
  assert!(registry.take_current());
  assert!(!registry.take_current(), "a taken worker must not be counted twice");
}

#[test]
fn deregister_removes_the_current_thread() {
  let registry = WorkerRegistry::new();
  registry.register_current();
  registry.deregister_current();
  assert!(!registry.take_current());
}
