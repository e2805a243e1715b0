//! Release context and its persistence.
//!
//! The context replaces ad-hoc environment exports between invocations:
//! every stage reads the resolved values it needs from it and returns a
//! new context with its own result recorded.

mod context;
mod request;
mod store;

pub use context::{CONTEXT_FORMAT_VERSION, ReleaseContext};
pub use request::ReleaseRequest;
pub use store::{ContextStore, DEFAULT_CONTEXT_FILE};
