//! Pocket Client
//!
//! Relay orchestration on top of the routing, session and RPC crates.
//!
//! ```ignore
//! let pocket = Pocket::builder()
//!     .dispatcher(Url::parse("https://dispatch-1.example.com")?)
//!     .keybase(Arc::new(Ed25519Keybase::generate()))
//!     .build()?;
//!
//! let response = pocket
//!     .send_relay(&aat, "0021", RelayPayload::new(body).method("POST"), None)
//!     .await?;
//! ```

mod builder;
mod keybase;
mod pocket;
mod round;

pub use builder::PocketBuilder;
pub use keybase::{verify_signature, Ed25519Keybase};
pub use pocket::Pocket;
pub use round::{select_node, RelayRound};
