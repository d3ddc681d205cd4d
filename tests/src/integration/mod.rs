pub mod concurrency;
pub mod poll_flow;
