//! Mock network shared by the integration tests
//!
//! One wiremock server plays the dispatcher; each serving node gets its own
//! server so tests can count relays per node.

#![allow(dead_code)]

use std::sync::Arc;

use reqwest::Url;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pocket_client::{Ed25519Keybase, Pocket};
use pocket_core::{seeded_rng, Aat, Configuration, KeyValueStore, Keybase, MemoryStore};

pub const CHAIN: &str = "0021";
pub const APP_PUB_KEY: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";

pub fn keybase() -> Ed25519Keybase {
    Ed25519Keybase::from_secret_bytes(&[42u8; 32])
}

pub fn aat() -> Aat {
    Aat::new("0.0.1", APP_PUB_KEY, keybase().client_public_key(), "ab".repeat(64))
}

pub fn url(server: &MockServer) -> Url {
    Url::parse(&server.uri()).unwrap()
}

pub fn node_address(i: usize) -> String {
    format!("{:040x}", 0xa0 + i)
}

pub fn node_public_key(i: usize) -> String {
    format!("{:064x}", 0xb0 + i)
}

pub fn node_json(i: usize, service_url: &str) -> Value {
    json!({
        "address": node_address(i),
        "public_key": node_public_key(i),
        "jailed": false,
        "status": 2,
        "tokens": "15000000000",
        "service_url": service_url,
        "chains": [CHAIN]
    })
}

pub fn dispatch_body(key: &str, session_height: u64, block_height: u64, nodes: Vec<Value>) -> Value {
    json!({
        "session": {
            "header": {"app_public_key": APP_PUB_KEY, "chain": CHAIN, "session_height": session_height},
            "nodes": nodes
        },
        "key": key,
        "block_height": block_height
    })
}

pub fn relay_body(result: &str) -> Value {
    json!({
        "signature": "5f".repeat(64),
        "response": format!("{{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":\"{}\"}}", result),
        "proof": {
            "entropy": 7,
            "session_block_height": 5,
            "servicer_pub_key": node_public_key(0),
            "blockchain": CHAIN,
            "aat": {"version": "0.0.1", "app_pub_key": APP_PUB_KEY, "client_pub_key": "", "signature": ""},
            "signature": ""
        }
    })
}

/// Serving node answering every relay with `result`
pub async fn serving_node(result: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/client/relay"))
        .respond_with(ResponseTemplate::new(200).set_body_json(relay_body(result)))
        .mount(&server)
        .await;
    server
}

/// Dispatcher handing out one session over `nodes`
pub async fn dispatcher(key: &str, nodes: &[&MockServer]) -> MockServer {
    let server = MockServer::start().await;
    let nodes = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| node_json(i, &node.uri()))
        .collect();
    Mock::given(method("POST"))
        .and(path("/v1/client/dispatch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(dispatch_body(key, 5, 5, nodes)))
        .mount(&server)
        .await;
    server
}

pub fn pocket(dispatchers: Vec<Url>, config: Configuration) -> Pocket {
    pocket_with_store(dispatchers, config, Arc::new(MemoryStore::new()))
}

pub fn pocket_with_store(
    dispatchers: Vec<Url>,
    config: Configuration,
    store: Arc<dyn KeyValueStore>,
) -> Pocket {
    pocket_logging::init_test();
    Pocket::builder()
        .dispatchers(dispatchers)
        .configuration(config)
        .store(store)
        .keybase(Arc::new(keybase()))
        .rng(seeded_rng(2024))
        .build()
        .unwrap()
}

/// Relay requests a mock server has received
pub async fn relay_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/v1/client/relay")
        .count()
}

pub async fn dispatch_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/v1/client/dispatch")
        .count()
}
