//! Pocket Routing
//!
//! Tracks the dispatcher nodes a client can ask for session assignments.

mod registry;

pub use registry::{normalize, NodeRegistry, DISPATCHERS_KEY};
