//! Pocket Session
//!
//! Session queues keyed by (AAT, chain) and the manager that fills them from
//! dispatchers.

mod manager;
mod queue;
mod store;

pub use manager::{SessionEvent, SessionManager, SESSIONS_KEY};
pub use queue::Queue;
pub use store::{Lookup, SessionStore};
