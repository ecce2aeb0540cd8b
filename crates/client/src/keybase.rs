//! Ed25519 signing for relay proofs

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use pocket_core::{Keybase, PocketError, Result};

/// In-process keybase holding a single unlocked Ed25519 account
pub struct Ed25519Keybase {
    signing_key: SigningKey,
}

impl Clone for Ed25519Keybase {
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl Ed25519Keybase {
    /// Generate a fresh random account
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Import a hex-encoded 32-byte secret
    pub fn from_secret_hex(secret: &str) -> Result<Self> {
        let bytes = hex::decode(secret.trim())
            .map_err(|_| PocketError::Signing("secret key is not valid hex".to_string()))?;
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| PocketError::Signing("secret key must be 32 bytes".to_string()))?;
        Ok(Self::from_secret_bytes(&secret))
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }
}

impl Keybase for Ed25519Keybase {
    fn client_public_key(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    fn sign(&self, message: &[u8]) -> Result<String> {
        let signature: Signature = self.signing_key.sign(message);
        Ok(hex::encode(signature.to_bytes()))
    }
}

/// Check a hex signature against a hex public key
pub fn verify_signature(public_key: &str, message: &[u8], signature: &str) -> bool {
    let Ok(public_key) = hex::decode(public_key) else {
        return false;
    };
    let Ok(public_key) = <[u8; 32]>::try_from(public_key.as_slice()) else {
        return false;
    };
    let verifying_key = match VerifyingKey::from_bytes(&public_key) {
        Ok(vk) => vk,
        Err(_) => return false,
    };

    let Ok(signature) = hex::decode(signature) else {
        return false;
    };
    let Ok(signature) = <[u8; 64]>::try_from(signature.as_slice()) else {
        return false;
    };
    let signature = Signature::from_bytes(&signature);

    verifying_key.verify(message, &signature).is_ok()
}
