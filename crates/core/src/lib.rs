//! Pocket Core Types
//!
//! Data model, configuration, error taxonomy and persistence seams shared by
//! the routing, session, RPC and client crates.

mod config;
mod error;
mod keybase;
mod node;
mod random;
mod relay;
mod session;
mod store;

pub use config::*;
pub use error::*;
pub use keybase::*;
pub use node::*;
pub use random::*;
pub use relay::*;
pub use session::*;
pub use store::*;
