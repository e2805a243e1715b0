//! Bounded polling and retry primitives.
//!
//! These are the only suspension points in the orchestrator: every wait on
//! external state goes through [`wait_until`] and every retried mutation
//! through [`retry`].

mod poll;
mod retry;

pub use poll::{WaitPolicy, wait_until};
pub use retry::{RetryPolicy, retry};
