//! WebSocket client implementation.
//!
//! A deliberately small surface over tungstenite: connect, send, receive,
//! close. Reconnection policy lives in [`crate::ReconnectConfig`]; the
//! connection itself is single-use and is replaced wholesale on drop.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::{ReconnectConfig, StreamError, StreamResult};

/// WebSocket message types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    /// Text message.
    Text(String),
    /// Binary message.
    Binary(Vec<u8>),
    /// Ping message.
    Ping(Vec<u8>),
    /// Pong message.
    Pong(Vec<u8>),
    /// Close message.
    Close(Option<WsCloseFrame>),
}

impl WsMessage {
    /// Create a text message.
    #[must_use]
    pub fn text(data: impl Into<String>) -> Self {
        Self::Text(data.into())
    }

    /// Check if this is a close message.
    #[must_use]
    pub const fn is_close(&self) -> bool {
        matches!(self, Self::Close(_))
    }

    /// Get text data if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Parse text or binary payload as JSON.
    ///
    /// # Errors
    /// Returns a JSON parsing error if the payload is not valid JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self {
            Self::Text(s) => serde_json::from_str(s),
            Self::Binary(b) => serde_json::from_slice(b),
            _ => Err(serde::de::Error::custom("Not a data message")),
        }
    }
}

impl From<Message> for WsMessage {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Text(s) => Self::Text(s.to_string()),
            Message::Binary(b) => Self::Binary(b.to_vec()),
            Message::Ping(b) => Self::Ping(b.to_vec()),
            Message::Pong(b) => Self::Pong(b.to_vec()),
            Message::Close(frame) => Self::Close(frame.map(|f| WsCloseFrame {
                code: f.code.into(),
                reason: f.reason.to_string(),
            })),
            Message::Frame(_) => Self::Binary(vec![]),
        }
    }
}

impl From<WsMessage> for Message {
    fn from(msg: WsMessage) -> Self {
        match msg {
            WsMessage::Text(s) => Self::Text(s.into()),
            WsMessage::Binary(b) => Self::Binary(b.into()),
            WsMessage::Ping(b) => Self::Ping(b.into()),
            WsMessage::Pong(b) => Self::Pong(b.into()),
            WsMessage::Close(frame) => {
                use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
                use tokio_tungstenite::tungstenite::protocol::CloseFrame;
                Self::Close(frame.map(|f| CloseFrame {
                    code: CloseCode::from(f.code),
                    reason: f.reason.into(),
                }))
            }
        }
    }
}

/// WebSocket close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsCloseFrame {
    /// Close code.
    pub code: u16,
    /// Close reason.
    pub reason: String,
}

impl WsCloseFrame {
    /// Create a new close frame.
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Normal closure.
    #[must_use]
    pub fn normal() -> Self {
        Self::new(1000, "Normal closure")
    }
}

/// WebSocket configuration.
///
/// Lazy connection and automatic reconnection are fixed policy for the
/// subscription path; `auto_reconnect` exists so tests can opt out.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Auto-reconnect on disconnect.
    pub auto_reconnect: bool,
    /// Reconnection backoff policy.
    pub reconnect: ReconnectConfig,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl WsConfig {
    /// Create new configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set auto-reconnect.
    #[must_use]
    pub const fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the reconnection backoff policy.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

/// WebSocket client.
pub struct WsClient {
    url: String,
    config: WsConfig,
}

impl WsClient {
    /// Create a new WebSocket client.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            config: WsConfig::default(),
        }
    }

    /// Create with configuration.
    #[must_use]
    pub fn with_config(url: impl Into<String>, config: WsConfig) -> Self {
        Self {
            url: url.into(),
            config,
        }
    }

    /// Connect to the WebSocket server.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the handshake fails.
    pub async fn connect(&self) -> StreamResult<WsConnection> {
        let url = Url::parse(&self.url)
            .map_err(|e: url::ParseError| StreamError::ConnectionFailed(e.to_string()))?;

        let (ws_stream, _response) = connect_async(url.as_str()).await.map_err(
            |e: tokio_tungstenite::tungstenite::Error| StreamError::WebSocketError(e.to_string()),
        )?;

        Ok(WsConnection::new(ws_stream))
    }

    /// Get the URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &WsConfig {
        &self.config
    }
}

/// Active WebSocket connection.
pub struct WsConnection {
    inner: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    closed: bool,
}

impl WsConnection {
    const fn new(stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>) -> Self {
        Self {
            inner: stream,
            closed: false,
        }
    }

    /// Send a message.
    ///
    /// # Errors
    /// Returns a stream error if the message cannot be sent.
    pub async fn send(&mut self, message: WsMessage) -> StreamResult<()> {
        if self.closed {
            return Err(StreamError::InvalidState("Connection is closed".into()));
        }

        self.inner
            .send(message.into())
            .await
            .map_err(|e| StreamError::WebSocketError(e.to_string()))
    }

    /// Send a text message.
    ///
    /// # Errors
    /// Returns a stream error if the message cannot be sent.
    pub async fn send_text(&mut self, text: impl Into<String>) -> StreamResult<()> {
        self.send(WsMessage::text(text)).await
    }

    /// Send JSON data.
    ///
    /// # Errors
    /// Returns a stream error if serialization or send fails.
    pub async fn send_json<T: serde::Serialize + Sync>(&mut self, data: &T) -> StreamResult<()> {
        let json =
            serde_json::to_string(data).map_err(|e| StreamError::ParseError(e.to_string()))?;
        self.send_text(json).await
    }

    /// Receive the next message.
    ///
    /// Returns `Ok(None)` once the peer has gone away.
    ///
    /// # Errors
    /// Returns a stream error if the underlying socket fails.
    pub async fn recv(&mut self) -> StreamResult<Option<WsMessage>> {
        if self.closed {
            return Ok(None);
        }

        match self.inner.next().await {
            Some(Ok(msg)) => {
                let ws_msg: WsMessage = msg.into();
                if ws_msg.is_close() {
                    self.closed = true;
                }
                Ok(Some(ws_msg))
            }
            Some(Err(e)) => Err(StreamError::WebSocketError(e.to_string())),
            None => {
                self.closed = true;
                Ok(None)
            }
        }
    }

    /// Close the connection.
    ///
    /// # Errors
    /// Returns a stream error if the close frame fails to send.
    pub async fn close(&mut self) -> StreamResult<()> {
        if !self.closed {
            self.closed = true;
            self.inner
                .close(None)
                .await
                .map_err(|e| StreamError::WebSocketError(e.to_string()))?;
        }
        Ok(())
    }

    /// Check if the connection is closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Stream for WsConnection {
    type Item = StreamResult<WsMessage>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.closed {
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(msg))) => {
                let ws_msg: WsMessage = msg.into();
                if ws_msg.is_close() {
                    self.closed = true;
                }
                Poll::Ready(Some(Ok(ws_msg)))
            }
            Poll::Ready(Some(Err(e))) => {
                Poll::Ready(Some(Err(StreamError::WebSocketError(e.to_string()))))
            }
            Poll::Ready(None) => {
                self.closed = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_message_text() {
        let msg = WsMessage::text("hello");
        assert_eq!(msg.as_text(), Some("hello"));
        assert!(!msg.is_close());
    }

    #[test]
    fn test_ws_message_json() {
        let msg = WsMessage::text(r#"{"key": "value"}"#);

        #[derive(serde::Deserialize)]
        struct Data {
            key: String,
        }

        let data: Data = msg.json().unwrap();
        assert_eq!(data.key, "value");
    }

    #[test]
    fn test_ws_message_json_rejects_ping() {
        let msg = WsMessage::Ping(vec![1]);
        let result: Result<serde_json::Value, _> = msg.json();
        assert!(result.is_err());
    }

    #[test]
    fn test_ws_close_frame() {
        let frame = WsCloseFrame::normal();
        assert_eq!(frame.code, 1000);
    }

    #[test]
    fn test_ws_config() {
        let config = WsConfig::new().with_auto_reconnect(false);
        assert!(!config.auto_reconnect);
        assert!(WsConfig::default().auto_reconnect);
    }
}
