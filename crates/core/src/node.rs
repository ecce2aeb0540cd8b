//! Serving node model
//!
//! Nodes are validated when they are built or deserialized, so every `Node`
//! held by a session carries a well-formed address, public key and service URL.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{PocketError, Result};

/// Byte length of a node address
pub const ADDRESS_LEN: usize = 20;

/// Byte length of an ed25519 public key
pub const PUBLIC_KEY_LEN: usize = 32;

/// Staking status of a node, encoded as an integer on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StakingStatus {
    Unstaked,
    Unstaking,
    Staked,
}

impl TryFrom<u8> for StakingStatus {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Unstaked),
            1 => Ok(Self::Unstaking),
            2 => Ok(Self::Staked),
            other => Err(format!("unknown staking status {}", other)),
        }
    }
}

impl From<StakingStatus> for u8 {
    fn from(status: StakingStatus) -> u8 {
        match status {
            StakingStatus::Unstaked => 0,
            StakingStatus::Unstaking => 1,
            StakingStatus::Staked => 2,
        }
    }
}

/// A serving node assigned to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "NodeJson", into = "NodeJson")]
pub struct Node {
    /// Hex-encoded 20-byte address
    pub address: String,
    /// Hex-encoded 32-byte public key
    pub public_key: String,
    pub output_address: Option<String>,
    pub jailed: bool,
    pub status: StakingStatus,
    pub staked_tokens: u128,
    pub service_url: Url,
    pub chains: Vec<String>,
    pub unstaking_time: Option<String>,
    /// Set while a relay round has already used this node. Never serialized.
    pub already_in_consensus: bool,
}

impl Node {
    /// Build a staked, unjailed node
    pub fn new(
        address: &str,
        public_key: &str,
        service_url: &str,
        chains: Vec<String>,
    ) -> Result<Self> {
        validate_hex(address, ADDRESS_LEN, "address")?;
        validate_hex(public_key, PUBLIC_KEY_LEN, "public_key")?;
        let service_url = parse_service_url(service_url)?;

        Ok(Self {
            address: address.to_string(),
            public_key: public_key.to_string(),
            output_address: None,
            jailed: false,
            status: StakingStatus::Staked,
            staked_tokens: 0,
            service_url,
            chains,
            unstaking_time: None,
            already_in_consensus: false,
        })
    }

    pub fn with_staked_tokens(mut self, tokens: u128) -> Self {
        self.staked_tokens = tokens;
        self
    }

    pub fn with_status(mut self, status: StakingStatus) -> Self {
        self.status = status;
        self
    }

    /// Case-insensitive address comparison
    pub fn has_address(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }

    pub fn supports_chain(&self, chain: &str) -> bool {
        self.chains.iter().any(|c| c == chain)
    }

    /// True when the service URL uses HTTPS
    pub fn is_secure(&self) -> bool {
        self.service_url.scheme() == "https"
    }
}

/// Node as it appears in dispatch responses
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeJson {
    address: String,
    public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_address: Option<String>,
    #[serde(default)]
    jailed: bool,
    status: StakingStatus,
    tokens: String,
    service_url: String,
    #[serde(default)]
    chains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unstaking_time: Option<String>,
}

impl TryFrom<NodeJson> for Node {
    type Error = PocketError;

    fn try_from(json: NodeJson) -> Result<Self> {
        validate_hex(&json.address, ADDRESS_LEN, "address")?;
        validate_hex(&json.public_key, PUBLIC_KEY_LEN, "public_key")?;
        if let Some(output) = &json.output_address {
            if !output.is_empty() {
                validate_hex(output, ADDRESS_LEN, "output_address")?;
            }
        }
        let staked_tokens = json
            .tokens
            .trim()
            .parse::<u128>()
            .map_err(|_| PocketError::InvalidNode(format!("invalid tokens '{}'", json.tokens)))?;
        let service_url = parse_service_url(&json.service_url)?;

        Ok(Self {
            address: json.address,
            public_key: json.public_key,
            output_address: json.output_address.filter(|o| !o.is_empty()),
            jailed: json.jailed,
            status: json.status,
            staked_tokens,
            service_url,
            chains: json.chains,
            unstaking_time: json.unstaking_time.filter(|t| !t.is_empty()),
            already_in_consensus: false,
        })
    }
}

impl From<Node> for NodeJson {
    fn from(node: Node) -> Self {
        Self {
            address: node.address,
            public_key: node.public_key,
            output_address: node.output_address,
            jailed: node.jailed,
            status: node.status,
            tokens: node.staked_tokens.to_string(),
            service_url: node.service_url.to_string(),
            chains: node.chains,
            unstaking_time: node.unstaking_time,
        }
    }
}

/// Check that `value` is hex encoding exactly `len` bytes
pub fn validate_hex(value: &str, len: usize, field: &str) -> Result<()> {
    let bytes = hex::decode(value)
        .map_err(|_| PocketError::InvalidNode(format!("{} is not valid hex", field)))?;
    if bytes.len() != len {
        return Err(PocketError::InvalidNode(format!(
            "{} must be {} bytes, got {}",
            field,
            len,
            bytes.len()
        )));
    }
    Ok(())
}

fn parse_service_url(raw: &str) -> Result<Url> {
    if raw.trim().is_empty() {
        return Err(PocketError::InvalidNode("service_url is empty".to_string()));
    }
    Url::parse(raw.trim())
        .map_err(|e| PocketError::InvalidNode(format!("service_url '{}': {}", raw, e)))
}
