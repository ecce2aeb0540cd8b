//! HTTP exchange with dispatchers and serving nodes
//!
//! Every expected failure mode comes back as an [`RpcError`] value: transport
//! failures and timeouts carry code "0", server errors keep the server's code.

use std::future::Future;
use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use pocket_core::{
    DispatchRequest, DispatchResponse, Node, PocketError, RelayRequest, RelayResponse, RpcError,
    DISPATCH_PATH, RELAY_PATH,
};

use crate::classify::{classify_failure, classify_transport, error_envelope, from_text};

pub type RpcResult<T> = std::result::Result<T, RpcError>;

pub struct RelayDispatcher {
    http_client: reqwest::Client,
}

impl RelayDispatcher {
    pub fn new() -> pocket_core::Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| PocketError::Configuration(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }

    /// Use a preconfigured HTTP client (proxies, TLS roots, connection pools)
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// POST `payload` to `base` + `path` and decode the reply as `T`
    pub async fn send<P, T>(
        &self,
        base: &Url,
        path: &str,
        payload: &P,
        timeout: Duration,
    ) -> RpcResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = endpoint(base, path)?;
        debug!("POST {} (timeout {:?})", url, timeout);

        let response = self
            .http_client
            .post(url)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| classify_transport(&e, timeout.as_millis()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(&e, timeout.as_millis()))?;

        if !status.is_success() {
            let err = classify_failure(status, &body);
            debug!("HTTP {} from {}: {}", status, base, err);
            return Err(err);
        }

        decode_success(&body)
    }

    /// Like [`send`](Self::send), aborting the request once `cancel` resolves
    pub async fn send_with_cancel<P, T, C>(
        &self,
        base: &Url,
        path: &str,
        payload: &P,
        timeout: Duration,
        cancel: C,
    ) -> RpcResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
        C: Future<Output = ()>,
    {
        tokio::select! {
            result = self.send(base, path, payload, timeout) => result,
            _ = cancel => {
                debug!("Request to {} cancelled", base);
                Err(RpcError::cancelled())
            }
        }
    }

    /// Ask a dispatcher for a session
    pub async fn dispatch(
        &self,
        dispatcher: &Url,
        request: &DispatchRequest,
        timeout: Duration,
    ) -> RpcResult<DispatchResponse> {
        self.send(dispatcher, DISPATCH_PATH, request, timeout).await
    }

    /// Send a signed relay to a serving node
    pub async fn relay(
        &self,
        node: &Node,
        request: &RelayRequest,
        timeout: Duration,
    ) -> RpcResult<RelayResponse> {
        self.send(&node.service_url, RELAY_PATH, request, timeout).await
    }

    pub async fn relay_with_cancel<C>(
        &self,
        node: &Node,
        request: &RelayRequest,
        timeout: Duration,
        cancel: C,
    ) -> RpcResult<RelayResponse>
    where
        C: Future<Output = ()>,
    {
        self.send_with_cancel(&node.service_url, RELAY_PATH, request, timeout, cancel)
            .await
    }
}

/// Append `path` to `base`, keeping any path prefix on the base URL
fn endpoint(base: &Url, path: &str) -> RpcResult<Url> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| RpcError::unknown(format!("invalid endpoint {}: {}", joined, e)))
}

fn decode_success<T: DeserializeOwned>(body: &str) -> RpcResult<T> {
    let value: Value = serde_json::from_str(body).map_err(|_| from_text(body.trim()))?;
    if let Some(err) = error_envelope(&value) {
        return Err(err);
    }
    serde_json::from_value(value)
        .map_err(|e| RpcError::unknown(format!("malformed response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Echo {
        value: u32,
    }

    fn timeout() -> Duration {
        Duration::from_secs(5)
    }

    #[test]
    fn test_endpoint_keeps_prefix() {
        let base = Url::parse("https://host.example/pocket/").unwrap();
        assert_eq!(
            endpoint(&base, "/v1/client/relay").unwrap().as_str(),
            "https://host.example/pocket/v1/client/relay"
        );
        let bare = Url::parse("http://127.0.0.1:8081").unwrap();
        assert_eq!(
            endpoint(&bare, RELAY_PATH).unwrap().as_str(),
            "http://127.0.0.1:8081/v1/client/relay"
        );
    }

    #[tokio::test]
    async fn test_send_decodes_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(body_json(json!({"ping": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": 7})))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = RelayDispatcher::new().unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let echo: Echo = dispatcher
            .send(&base, "/echo", &json!({"ping": true}), timeout())
            .await
            .unwrap();
        assert_eq!(echo, Echo { value: 7 });
    }

    #[tokio::test]
    async fn test_error_envelope_in_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"code": 66, "message": "over service"})),
            )
            .mount(&server)
            .await;

        let dispatcher = RelayDispatcher::new().unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let err = dispatcher
            .send::<_, Echo>(&base, "/x", &json!({}), timeout())
            .await
            .unwrap_err();
        assert_eq!(err, RpcError::new("66", "over service"));
    }

    #[tokio::test]
    async fn test_non_2xx_structured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"error": {"code": 5, "message": "invalid chain"}})),
            )
            .mount(&server)
            .await;

        let dispatcher = RelayDispatcher::new().unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let err = dispatcher
            .send::<_, Echo>(&base, "/x", &json!({}), timeout())
            .await
            .unwrap_err();
        assert_eq!(err, RpcError::new("5", "invalid chain"));
    }

    #[tokio::test]
    async fn test_non_2xx_free_text_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("ERROR:\nCode: 88\nMessage: boom"))
            .mount(&server)
            .await;

        let dispatcher = RelayDispatcher::new().unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let err = dispatcher
            .send::<_, Echo>(&base, "/x", &json!({}), timeout())
            .await
            .unwrap_err();
        assert_eq!(err.code, "88");
    }

    #[tokio::test]
    async fn test_malformed_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"other": 1})))
            .mount(&server)
            .await;

        let dispatcher = RelayDispatcher::new().unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let err = dispatcher
            .send::<_, Echo>(&base, "/x", &json!({}), timeout())
            .await
            .unwrap_err();
        assert_eq!(err.code, "0");
        assert!(err.message.contains("malformed response"));
    }

    #[tokio::test]
    async fn test_timeout_is_code_zero() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"value": 1}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let dispatcher = RelayDispatcher::new().unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let err = dispatcher
            .send::<_, Echo>(&base, "/x", &json!({}), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err.code, "0");
        assert!(err.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_code_zero() {
        let dispatcher = RelayDispatcher::new().unwrap();
        let base = Url::parse("http://127.0.0.1:1").unwrap();
        let err = dispatcher
            .send::<_, Echo>(&base, "/x", &json!({}), timeout())
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_cancel_aborts_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"value": 1}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let dispatcher = RelayDispatcher::new().unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let err = dispatcher
            .send_with_cancel::<_, Echo, _>(
                &base,
                "/x",
                &json!({}),
                timeout(),
                tokio::time::sleep(Duration::from_millis(20)),
            )
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
