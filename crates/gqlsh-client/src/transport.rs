//! Transport chain construction.
//!
//! A chain is two stages: an error-interceptor stage that observes every
//! network-level failure surfaced by the terminal stage, and the terminal
//! transport itself (HTTP POST for queries and mutations, WebSocket for
//! subscriptions). The interceptor never rewrites errors, never retries,
//! and never short-circuits. Chains are built fresh per operation and
//! construction cannot fail.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;
use url::Url;

use gqlsh_streaming::{WsClient, WsConfig, WsConnection};

use crate::error::ClientError;

/// Remote endpoint coordinates, immutable per invocation.
///
/// The token is opaque: it is never validated client-side, only injected
/// verbatim into the `Authorization` header or the WebSocket connection
/// parameters.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Endpoint URI.
    pub uri: String,
    /// Bearer token.
    pub token: String,
}

impl Endpoint {
    /// Create a new endpoint.
    #[must_use]
    pub fn new(uri: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            token: token.into(),
        }
    }
}

/// The error-interceptor stage of a transport chain.
///
/// Implementations observe failures; they must not transform them.
pub trait FailureObserver: Send + Sync {
    /// Called with every network-level failure the terminal stage surfaces.
    fn on_failure(&self, error: &ClientError);
}

/// Default interceptor: reports all network failures to the tracing sink.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl FailureObserver for TracingObserver {
    fn on_failure(&self, error: &ClientError) {
        debug!(error = %error, "network failure");
    }
}

/// Builds a transport chain for one operation.
pub struct TransportBuilder {
    endpoint: Endpoint,
    observer: Arc<dyn FailureObserver>,
}

impl TransportBuilder {
    /// Create a builder with the default tracing interceptor.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the interceptor stage.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn FailureObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Build a chain terminating in the HTTP transport.
    #[must_use]
    pub fn http(self) -> HttpTransport {
        let headers = default_headers(&self.endpoint.token);
        HttpTransport {
            endpoint: self.endpoint,
            http: reqwest::Client::new(),
            headers,
            observer: self.observer,
        }
    }

    /// Build a chain terminating in the WebSocket transport.
    ///
    /// Lazy connection and automatic reconnection are fixed policy, not
    /// configurable by the caller.
    #[must_use]
    pub fn websocket(self) -> WsTransport {
        WsTransport {
            endpoint: self.endpoint,
            config: WsConfig::default(),
            observer: self.observer,
        }
    }
}

fn default_headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    // A token that cannot form a header value is skipped, not rejected.
    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
        headers.insert(AUTHORIZATION, value);
    }
    headers
}

/// HTTP terminal stage: one POST per operation.
pub struct HttpTransport {
    endpoint: Endpoint,
    http: reqwest::Client,
    headers: HeaderMap,
    observer: Arc<dyn FailureObserver>,
}

impl HttpTransport {
    /// POST a JSON body to the endpoint and return the raw response bytes.
    ///
    /// # Errors
    /// Returns the terminal stage's failure unchanged after the interceptor
    /// has observed it.
    pub async fn post(&self, body: &serde_json::Value) -> Result<Vec<u8>, ClientError> {
        let result = self.send_once(body).await;
        if let Err(err) = &result {
            self.observer.on_failure(err);
        }
        result
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<Vec<u8>, ClientError> {
        let response = self
            .http
            .post(&self.endpoint.uri)
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(ClientError::HttpStatus {
                status,
                body: truncate_body(&bytes),
            });
        }

        Ok(bytes.to_vec())
    }

    /// The endpoint this chain targets.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

/// WebSocket terminal stage for subscriptions.
pub struct WsTransport {
    endpoint: Endpoint,
    config: WsConfig,
    observer: Arc<dyn FailureObserver>,
}

impl WsTransport {
    /// The WebSocket URL derived from the endpoint URI.
    ///
    /// `http`/`https` map to `ws`/`wss`; `ws`/`wss` pass through.
    #[must_use]
    pub fn ws_url(&self) -> String {
        match Url::parse(&self.endpoint.uri) {
            Ok(mut url) => {
                let mapped = match url.scheme() {
                    "http" => Some("ws"),
                    "https" => Some("wss"),
                    _ => None,
                };
                if let Some(scheme) = mapped {
                    let _ = url.set_scheme(scheme);
                }
                String::from(url)
            }
            // Leave an unparseable URI alone; the connect attempt will
            // surface the failure through the interceptor.
            Err(_) => self.endpoint.uri.clone(),
        }
    }

    /// Connection parameters carrying the Authorization value.
    #[must_use]
    pub fn connection_params(&self) -> serde_json::Value {
        serde_json::json!({
            "Authorization": format!("Bearer {}", self.endpoint.token),
        })
    }

    /// Open one socket connection.
    ///
    /// # Errors
    /// Returns the connect failure unchanged after the interceptor has
    /// observed it.
    pub async fn connect(&self) -> Result<WsConnection, ClientError> {
        let client = WsClient::with_config(self.ws_url(), self.config.clone());
        match client.connect().await {
            Ok(connection) => Ok(connection),
            Err(err) => {
                let err = ClientError::from(err);
                self.observer.on_failure(&err);
                Err(err)
            }
        }
    }

    /// Report a streaming-phase network failure to the interceptor.
    pub fn observe_failure(&self, error: &ClientError) {
        self.observer.on_failure(error);
    }

    /// The reconnection policy for this chain.
    #[must_use]
    pub const fn config(&self) -> &WsConfig {
        &self.config
    }
}

fn truncate_body(bytes: &[u8]) -> String {
    const MAX_LEN: usize = 4096;
    let mut body = String::from_utf8_lossy(bytes).to_string();
    if body.len() > MAX_LEN {
        body.truncate(MAX_LEN);
        body.push('…');
    }
    body
}
