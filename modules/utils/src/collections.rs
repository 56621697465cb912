/// Lock-free queue implementations and their error types.
pub mod queue;
