//! Relay messages and the hashing they are signed over

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::Result;

/// Default path of the relay RPC on a serving node
pub const RELAY_PATH: &str = "/v1/client/relay";

/// Default path of the dispatch RPC on a dispatcher
pub const DISPATCH_PATH: &str = "/v1/client/dispatch";

/// Application authentication token
///
/// Issued by the application owner to a client key. Opaque to the runtime
/// apart from hashing and the application public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aat {
    pub version: String,
    pub app_pub_key: String,
    pub client_pub_key: String,
    pub signature: String,
}

impl Aat {
    pub fn new(
        version: impl Into<String>,
        app_pub_key: impl Into<String>,
        client_pub_key: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            app_pub_key: app_pub_key.into(),
            client_pub_key: client_pub_key.into(),
            signature: signature.into(),
        }
    }

    /// Hex sha3-256 of the token with its signature blanked
    pub fn hash_hex(&self) -> Result<String> {
        let unsigned = Aat {
            signature: String::new(),
            ..self.clone()
        };
        Ok(hex::encode(Sha3_256::digest(canonical_json(&unsigned)?)))
    }
}

/// Request forwarded to the blockchain behind a serving node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayPayload {
    pub data: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl RelayPayload {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            method: String::new(),
            path: String::new(),
            headers: BTreeMap::new(),
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayProof {
    pub entropy: u64,
    pub session_block_height: u64,
    pub servicer_pub_key: String,
    pub blockchain: String,
    pub aat: Aat,
    #[serde(default)]
    pub signature: String,
}

impl RelayProof {
    /// Digest the client signs to authorise this relay
    pub fn signable_hash(&self) -> Result<[u8; 32]> {
        relay_proof_hash(self)
    }
}

/// Body of the relay RPC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub payload: RelayPayload,
    pub proof: RelayProof,
}

/// Successful relay RPC response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub signature: String,
    pub response: String,
    pub proof: RelayProof,
}

/// Serialize to JSON with object keys sorted
pub fn canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    // serde_json::Value objects are BTreeMap-backed, so keys come out sorted
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Key under which sessions for an (AAT, chain) pair are bucketed
pub fn session_key(aat: &Aat, chain: &str) -> Result<String> {
    let mut hasher = Sha3_256::new();
    hasher.update(canonical_json(aat)?);
    hasher.update(chain.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// sha3-256 over the canonical proof encoding with the signature blanked
pub fn relay_proof_hash(proof: &RelayProof) -> Result<[u8; 32]> {
    let signable = serde_json::json!({
        "entropy": proof.entropy,
        "session_block_height": proof.session_block_height,
        "servicer_pub_key": proof.servicer_pub_key,
        "blockchain": proof.blockchain,
        "signature": "",
        "token": proof.aat.hash_hex()?,
    });
    Ok(Sha3_256::digest(canonical_json(&signable)?).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_aat() -> Aat {
        Aat::new("0.0.1", "aa".repeat(32), "bb".repeat(32), "cc".repeat(64))
    }

    fn test_proof() -> RelayProof {
        RelayProof {
            entropy: 42,
            session_block_height: 5,
            servicer_pub_key: "dd".repeat(32),
            blockchain: "ETH04".to_string(),
            aat: test_aat(),
            signature: String::new(),
        }
    }

    #[test]
    fn test_session_key_deterministic() {
        let aat = test_aat();
        assert_eq!(
            session_key(&aat, "ETH04").unwrap(),
            session_key(&aat.clone(), "ETH04").unwrap()
        );
        assert_eq!(session_key(&aat, "ETH04").unwrap().len(), 64);
    }

    #[test]
    fn test_session_key_differs_by_chain_and_token() {
        let aat = test_aat();
        assert_ne!(
            session_key(&aat, "ETH04").unwrap(),
            session_key(&aat, "0021").unwrap()
        );

        let other = Aat::new("0.0.1", "ee".repeat(32), "bb".repeat(32), "cc".repeat(64));
        assert_ne!(
            session_key(&aat, "ETH04").unwrap(),
            session_key(&other, "ETH04").unwrap()
        );
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let json = String::from_utf8(canonical_json(&test_aat()).unwrap()).unwrap();
        let app = json.find("app_pub_key").unwrap();
        let client = json.find("client_pub_key").unwrap();
        let sig = json.find("signature").unwrap();
        let version = json.find("version").unwrap();
        assert!(app < client && client < sig && sig < version);
    }

    #[test]
    fn test_aat_hash_ignores_signature() {
        let a = test_aat();
        let mut b = test_aat();
        b.signature = "00".repeat(64);
        assert_eq!(a.hash_hex().unwrap(), b.hash_hex().unwrap());
    }

    #[test]
    fn test_proof_hash_ignores_signature() {
        let unsigned = test_proof();
        let mut signed = test_proof();
        signed.signature = "ff".repeat(64);
        assert_eq!(
            relay_proof_hash(&unsigned).unwrap(),
            relay_proof_hash(&signed).unwrap()
        );
    }

    #[test]
    fn test_proof_hash_depends_on_entropy() {
        let a = test_proof();
        let mut b = test_proof();
        b.entropy = 43;
        assert_ne!(a.signable_hash().unwrap(), b.signable_hash().unwrap());
    }

    #[test]
    fn test_payload_builder() {
        let payload = RelayPayload::new(r#"{"jsonrpc":"2.0"}"#)
            .method("POST")
            .path("/")
            .header("Content-Type", "application/json");
        assert_eq!(payload.method, "POST");
        assert_eq!(payload.headers.get("Content-Type").unwrap(), "application/json");
    }
}
