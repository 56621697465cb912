/// Count-down latch for termination tracking.
pub mod count_down_latch;
/// Saturating permit gate for worker parking.
pub mod permit_gate;

pub use count_down_latch::CountDownLatch;
pub use permit_gate::PermitGate;
