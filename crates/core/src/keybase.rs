//! Signing seam
//!
//! Account import, unlock and key storage live outside the runtime. The
//! orchestrator only needs the client public key and a way to sign digests.

use crate::Result;

pub trait Keybase: Send + Sync {
    /// Hex-encoded public key of the unlocked client account
    fn client_public_key(&self) -> String;

    /// Sign `message`, returning the hex-encoded signature
    fn sign(&self, message: &[u8]) -> Result<String>;
}
