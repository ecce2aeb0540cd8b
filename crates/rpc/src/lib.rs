//! Pocket RPC
//!
//! Timed HTTP exchanges with dispatchers and serving nodes, and the
//! classification of their replies into typed errors.

mod classify;
mod dispatcher;

pub use classify::{classify_failure, error_envelope, extract_code};
pub use dispatcher::{RelayDispatcher, RpcResult};
