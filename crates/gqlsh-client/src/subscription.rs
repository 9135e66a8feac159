//! GraphQL over WebSocket subscription sessions.
//!
//! A session is lazy: constructing it performs no I/O, and the connection
//! task is spawned on the first demand for a result. The task drives an
//! explicit state machine (Connecting → Streaming → Reconnecting → done)
//! and feeds results to the consumer over a bounded channel, one in-flight
//! result at a time. On transport drop it reconnects automatically;
//! already-emitted results are never replayed. A server `error` message
//! yields one `Err` item and ends the stream; a server `complete` message
//! ends the stream cleanly.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use gqlsh_streaming::{ReconnectHandler, WsConnection, WsMessage};

use crate::error::{ClientError, GraphqlError};
use crate::operation::{parse_variables, validate_document, GraphqlResponse, OperationRequest};
use crate::transport::WsTransport;

/// graphql-transport-ws message envelope.
#[derive(Debug, Serialize, Deserialize)]
struct GraphqlWsMessage {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<serde_json::Value>,
}

/// Item yielded by a subscription session.
pub type SubscriptionItem = Result<GraphqlResponse, ClientError>;

/// A lazy, reconnecting subscription session.
///
/// Implements [`Stream`]; the sequence is unbounded until the server
/// completes it or an unrecoverable error occurs.
pub struct SubscriptionSession {
    state: SessionState,
}

impl std::fmt::Debug for SubscriptionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionSession").finish_non_exhaustive()
    }
}

enum SessionState {
    /// Constructed; nothing connected yet.
    Idle(Box<SessionConfig>),
    /// Connection task running; results arrive over the channel.
    Live(ReceiverStream<SubscriptionItem>),
    /// Server completion, terminal error, or exhausted channel.
    Terminated,
}

struct SessionConfig {
    transport: WsTransport,
    subscribe_payload: serde_json::Value,
}

impl SubscriptionSession {
    /// Prepare a session for one subscription operation.
    ///
    /// Document and variables are validated up front; the connection is not
    /// established until the first result is demanded.
    ///
    /// # Errors
    /// Returns [`ClientError::Document`] or [`ClientError::Json`] when the
    /// operation inputs are malformed.
    pub fn subscribe(
        transport: WsTransport,
        request: &OperationRequest,
    ) -> Result<Self, ClientError> {
        validate_document(&request.document)?;
        let variables = parse_variables(request.effective_variables_text())?;

        let subscribe_payload = serde_json::json!({
            "query": request.document,
            "variables": variables,
        });

        Ok(Self {
            state: SessionState::Idle(Box::new(SessionConfig {
                transport,
                subscribe_payload,
            })),
        })
    }

    /// Whether the session currently has a live connection task.
    #[must_use]
    pub const fn live(&self) -> bool {
        matches!(self.state, SessionState::Live(_))
    }
}

impl Stream for SubscriptionSession {
    type Item = SubscriptionItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match &mut self.state {
                SessionState::Idle(_) => {
                    // First demand: spawn the connection task.
                    let state = std::mem::replace(&mut self.state, SessionState::Terminated);
                    if let SessionState::Idle(config) = state {
                        let (tx, rx) = mpsc::channel(1);
                        tokio::spawn(session_task(*config, tx));
                        self.state = SessionState::Live(ReceiverStream::new(rx));
                    }
                }
                SessionState::Live(rx) => {
                    return match Pin::new(rx).poll_next(cx) {
                        Poll::Ready(None) => {
                            self.state = SessionState::Terminated;
                            Poll::Ready(None)
                        }
                        other => other,
                    };
                }
                SessionState::Terminated => return Poll::Ready(None),
            }
        }
    }
}

enum StreamOutcome {
    /// Server sent `complete`.
    Completed,
    /// A terminal error item was already delivered.
    Failed,
    /// The consumer dropped the stream.
    ConsumerGone,
    /// Transport drop; eligible for reconnection.
    Dropped,
}

async fn session_task(config: SessionConfig, tx: mpsc::Sender<SubscriptionItem>) {
    let SessionConfig {
        transport,
        subscribe_payload,
    } = config;
    let mut reconnect = ReconnectHandler::new(transport.config().reconnect.clone());

    loop {
        // Connecting
        let mut connection = match connect_and_subscribe(&transport, &subscribe_payload).await {
            Ok(connection) => connection,
            Err(err) => {
                let recoverable = matches!(err, ClientError::Stream(_));
                if recoverable
                    && transport.config().auto_reconnect
                    && reconnect.wait_for_reconnect().await.is_ok()
                {
                    continue;
                }
                let _ = tx.send(Err(err)).await;
                return;
            }
        };
        reconnect.reset();
        debug!("subscription streaming");

        // Streaming
        match stream_results(&transport, &mut connection, &tx).await {
            StreamOutcome::Completed => {
                debug!("subscription completed by server");
                return;
            }
            StreamOutcome::Failed | StreamOutcome::ConsumerGone => return,
            StreamOutcome::Dropped => {
                warn!("subscription transport dropped");
                if transport.config().auto_reconnect
                    && reconnect.wait_for_reconnect().await.is_ok()
                {
                    continue;
                }
                let _ = tx
                    .send(Err(ClientError::Stream("connection dropped".to_string())))
                    .await;
                return;
            }
        }
    }
}

async fn connect_and_subscribe(
    transport: &WsTransport,
    subscribe_payload: &serde_json::Value,
) -> Result<WsConnection, ClientError> {
    debug!(url = %transport.ws_url(), "subscription connecting");
    let mut connection = transport.connect().await?;

    let init = GraphqlWsMessage {
        message_type: "connection_init".to_string(),
        id: None,
        payload: Some(transport.connection_params()),
    };
    connection
        .send_json(&init)
        .await
        .map_err(|err| observed(transport, err.into()))?;

    // Wait for the ack; no timeout anywhere in this client.
    loop {
        match connection.recv().await {
            Ok(Some(WsMessage::Ping(payload))) => {
                let _ = connection.send(WsMessage::Pong(payload)).await;
            }
            Ok(Some(WsMessage::Pong(_))) => {}
            Ok(Some(message @ (WsMessage::Text(_) | WsMessage::Binary(_)))) => {
                let ack = decode_ws_message(&message)?;
                match ack.message_type.as_str() {
                    "connection_ack" => break,
                    "ping" => {
                        let pong = GraphqlWsMessage {
                            message_type: "pong".to_string(),
                            id: ack.id,
                            payload: ack.payload,
                        };
                        let _ = connection.send_json(&pong).await;
                    }
                    other => {
                        return Err(ClientError::Protocol {
                            message: format!("expected connection_ack, got {other}"),
                        });
                    }
                }
            }
            Ok(Some(WsMessage::Close(_)) | None) => {
                return Err(observed(
                    transport,
                    ClientError::Stream("connection closed before ack".to_string()),
                ));
            }
            Err(err) => return Err(observed(transport, err.into())),
        }
    }

    let subscribe = GraphqlWsMessage {
        message_type: "subscribe".to_string(),
        id: Some("1".to_string()),
        payload: Some(subscribe_payload.clone()),
    };
    connection
        .send_json(&subscribe)
        .await
        .map_err(|err| observed(transport, err.into()))?;

    Ok(connection)
}

async fn stream_results(
    transport: &WsTransport,
    connection: &mut WsConnection,
    tx: &mpsc::Sender<SubscriptionItem>,
) -> StreamOutcome {
    loop {
        let message = match connection.recv().await {
            Ok(Some(message)) => message,
            Ok(None) => return StreamOutcome::Dropped,
            Err(err) => {
                observed(transport, err.into());
                return StreamOutcome::Dropped;
            }
        };

        match message {
            WsMessage::Ping(payload) => {
                let _ = connection.send(WsMessage::Pong(payload)).await;
            }
            WsMessage::Pong(_) => {}
            WsMessage::Close(_) => return StreamOutcome::Dropped,
            message @ (WsMessage::Text(_) | WsMessage::Binary(_)) => {
                let ws_msg = match decode_ws_message(&message) {
                    Ok(ws_msg) => ws_msg,
                    Err(err) => {
                        let _ = tx.send(Err(err)).await;
                        return StreamOutcome::Failed;
                    }
                };
                match ws_msg.message_type.as_str() {
                    "next" => {
                        let Some(payload) = ws_msg.payload else {
                            continue;
                        };
                        match serde_json::from_value::<GraphqlResponse>(payload) {
                            Ok(response) => {
                                if tx.send(Ok(response)).await.is_err() {
                                    return StreamOutcome::ConsumerGone;
                                }
                            }
                            Err(err) => {
                                let _ = tx.send(Err(ClientError::Json(err.to_string()))).await;
                                return StreamOutcome::Failed;
                            }
                        }
                    }
                    "error" => {
                        let errors = decode_error_payload(ws_msg.payload);
                        let _ = tx.send(Err(ClientError::Graphql { errors })).await;
                        return StreamOutcome::Failed;
                    }
                    "complete" => return StreamOutcome::Completed,
                    "ping" => {
                        let pong = GraphqlWsMessage {
                            message_type: "pong".to_string(),
                            id: ws_msg.id,
                            payload: ws_msg.payload,
                        };
                        let _ = connection.send_json(&pong).await;
                    }
                    other => {
                        let _ = tx
                            .send(Err(ClientError::Protocol {
                                message: format!("unexpected websocket message: {other}"),
                            }))
                            .await;
                        return StreamOutcome::Failed;
                    }
                }
            }
        }
    }
}

fn decode_ws_message(message: &WsMessage) -> Result<GraphqlWsMessage, ClientError> {
    message.json().map_err(|err| ClientError::Json(err.to_string()))
}

fn decode_error_payload(payload: Option<serde_json::Value>) -> Vec<GraphqlError> {
    payload
        .and_then(|value| {
            if value.is_array() {
                serde_json::from_value::<Vec<GraphqlError>>(value).ok()
            } else {
                serde_json::from_value::<GraphqlError>(value)
                    .ok()
                    .map(|err| vec![err])
            }
        })
        .unwrap_or_default()
}

fn observed(transport: &WsTransport, err: ClientError) -> ClientError {
    if err.is_network() {
        transport.observe_failure(&err);
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationKind;
    use crate::transport::{Endpoint, TransportBuilder};

    fn ws_transport() -> WsTransport {
        TransportBuilder::new(Endpoint::new("http://127.0.0.1:1", "t")).websocket()
    }

    #[test]
    fn subscribe_rejects_malformed_documents() {
        let request = OperationRequest::new(
            OperationKind::Subscription,
            "subscription {".to_string(),
            None,
        );
        let err = SubscriptionSession::subscribe(ws_transport(), &request).unwrap_err();
        assert!(matches!(err, ClientError::Document { .. }));
    }

    #[test]
    fn session_is_idle_until_demanded() {
        let request = OperationRequest::new(
            OperationKind::Subscription,
            "subscription { ticks }".to_string(),
            None,
        );
        let session = SubscriptionSession::subscribe(ws_transport(), &request).unwrap();
        assert!(!session.live());
    }

    #[test]
    fn subscribe_message_shape() {
        let message = GraphqlWsMessage {
            message_type: "subscribe".to_string(),
            id: Some("1".to_string()),
            payload: Some(serde_json::json!({"query": "subscription { ticks }"})),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value.get("type").unwrap(), "subscribe");
        assert_eq!(value.get("id").unwrap(), "1");
        assert!(value.get("payload").is_some());
    }

    #[test]
    fn error_payload_decodes_array_or_single() {
        let array = decode_error_payload(Some(serde_json::json!([{"message": "a"}])));
        assert_eq!(array.len(), 1);

        let single = decode_error_payload(Some(serde_json::json!({"message": "b"})));
        assert_eq!(single.len(), 1);

        assert!(decode_error_payload(None).is_empty());
    }
}
