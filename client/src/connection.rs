//! WebSocket connection state machine: request/response correlation,
//! subscription dispatch, and reconnection with exponential backoff. An
//! `Arc`-shared, lock-protected registry reachable from a background
//! socket task, generalized from a server-side connection registry to a
//! single outbound client connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use strand_engine::{Error, Result};

use crate::config::ConnectionConfig;
use crate::protocol::{ClientMessage, ServerMessage};

/// The three connection states. No data is attached to any state; the
/// pending-request and subscription maps live in [`Shared`] regardless of
/// which state the connection is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

type PendingMap = HashMap<u64, oneshot::Sender<Result<ServerMessage>>>;
type SubscriptionHandler = Box<dyn Fn(serde_json::Value) + Send + Sync>;
type SubscriptionMap = HashMap<String, SubscriptionHandler>;

struct Shared {
    config: ConnectionConfig,
    state: StdMutex<ConnectionState>,
    next_request_id: AtomicU64,
    pending: Mutex<PendingMap>,
    subscriptions: Mutex<SubscriptionMap>,
    outbound: Mutex<Option<mpsc::UnboundedSender<WsMessage>>>,
    reconnect_attempts: AtomicU32,
    reconnect_enabled: AtomicBool,
}

/// A handle to one WebSocket connection. Cheaply cloneable; every clone
/// shares the same socket, pending-request map and subscription registry.
#[derive(Clone)]
pub struct Connection(Arc<Shared>);

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        Self(Arc::new(Shared {
            config,
            state: StdMutex::new(ConnectionState::Disconnected),
            next_request_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
            outbound: Mutex::new(None),
            reconnect_attempts: AtomicU32::new(0),
            reconnect_enabled: AtomicBool::new(true),
        }))
    }

    pub fn state(&self) -> ConnectionState {
        *self.0.state.lock().expect("connection state mutex poisoned")
    }

    fn set_state(&self, state: ConnectionState) {
        *self.0.state.lock().expect("connection state mutex poisoned") = state;
    }

    /// `DISCONNECTED --connect()--> CONNECTING`, resolving to `CONNECTED`
    /// once the server acknowledges a `Connect` frame, or back to
    /// `DISCONNECTED` on transport failure or rejection.
    pub async fn connect(&self) -> Result<()> {
        self.0.reconnect_enabled.store(true, Ordering::SeqCst);
        self.set_state(ConnectionState::Connecting);

        // Resolved fresh on every connect (not cached), so a provider
        // callback's refreshed token is picked up on reconnect too.
        let bearer_token = match self.0.config.bearer_token.as_ref().map(|src| src.resolve()) {
            Some(Ok(token)) => Some(token),
            Some(Err(e)) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
            None => None,
        };

        let (ws_stream, _) = tokio_tungstenite::connect_async(self.0.config.url.as_str())
            .await
            .map_err(|e| {
                self.set_state(ConnectionState::Disconnected);
                Error::connection(format!("failed to open websocket: {e}"))
            })?;

        let (write, read) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        *self.0.outbound.lock().await = Some(tx);

        tokio::spawn(Self::writer_loop(write, rx));
        tokio::spawn(Self::reader_loop(self.0.clone(), read));

        let ack = self
            .request(|request_id| ClientMessage::Connect {
                request_id,
                api_key: self.0.config.api_key.clone(),
                bearer_token,
            })
            .await;

        match ack {
            Ok(ServerMessage::ConnectAck { .. }) => {
                self.set_state(ConnectionState::Connected);
                self.0.reconnect_attempts.store(0, Ordering::SeqCst);
                tracing::info!("connection established");
                Ok(())
            }
            Ok(other) => {
                self.set_state(ConnectionState::Disconnected);
                Err(Error::protocol(format!(
                    "unexpected response to connect: {other:?}"
                )))
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// `* --close()--> DISCONNECTED`, disabling reconnect and rejecting
    /// every pending request.
    pub async fn close(&self) -> Result<()> {
        self.0.reconnect_enabled.store(false, Ordering::SeqCst);
        self.set_state(ConnectionState::Disconnected);
        if let Some(tx) = self.0.outbound.lock().await.take() {
            let _ = tx.send(WsMessage::Close(None));
        }
        Self::reject_all_pending(&self.0, Error::connection("connection closed")).await;
        self.0.subscriptions.lock().await.clear();
        Ok(())
    }

    /// Register `handler` under `subscription_id`, then send a
    /// `Subscribe` frame. The handler is unregistered again if the send
    /// fails, so a dead registration never lingers.
    pub async fn subscribe(
        &self,
        subscription_id: impl Into<String>,
        handler: impl Fn(serde_json::Value) + Send + Sync + 'static,
    ) -> Result<()> {
        let subscription_id = subscription_id.into();
        self.0
            .subscriptions
            .lock()
            .await
            .insert(subscription_id.clone(), Box::new(handler));

        let result = self
            .request({
                let subscription_id = subscription_id.clone();
                move |request_id| ClientMessage::Subscribe {
                    request_id,
                    subscription_id,
                }
            })
            .await;

        if result.is_err() {
            self.0.subscriptions.lock().await.remove(&subscription_id);
        }
        result.map(|_| ())
    }

    /// Send an `Unsubscribe` frame, then unregister the handler
    /// regardless of the outcome: a stale handler is worse than a
    /// redundant unsubscribe.
    pub async fn unsubscribe(&self, subscription_id: impl Into<String>) -> Result<()> {
        let subscription_id = subscription_id.into();
        let result = self
            .request({
                let subscription_id = subscription_id.clone();
                move |request_id| ClientMessage::Unsubscribe {
                    request_id,
                    subscription_id,
                }
            })
            .await;
        self.0.subscriptions.lock().await.remove(&subscription_id);
        result.map(|_| ())
    }

    /// Build a message from a fresh `requestId`, send it, and await the
    /// correlated response. Sends while `CONNECTING` queue on the
    /// outbound channel rather than being dropped; sends while
    /// `DISCONNECTED` fail immediately since no channel exists yet.
    pub async fn request(
        &self,
        build: impl FnOnce(u64) -> ClientMessage,
    ) -> Result<ServerMessage> {
        let request_id = self.0.next_request_id.fetch_add(1, Ordering::SeqCst);
        let message = build(request_id);

        let (tx, rx) = oneshot::channel();
        self.0.pending.lock().await.insert(request_id, tx);

        if let Err(e) = self.send_raw(&message).await {
            self.0.pending.lock().await.remove(&request_id);
            return Err(e);
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::connection(
                "connection closed before a response arrived",
            )),
        }
    }

    async fn send_raw(&self, message: &ClientMessage) -> Result<()> {
        let outbound = self.0.outbound.lock().await;
        let sender = outbound
            .as_ref()
            .ok_or_else(|| Error::connection("not connected"))?;
        let text = serde_json::to_string(message)
            .map_err(|e| Error::protocol(format!("failed to encode message: {e}")))?;
        sender
            .send(WsMessage::Text(text))
            .map_err(|_| Error::connection("connection closed"))
    }

    async fn reject_all_pending(shared: &Shared, error: Error) {
        let mut pending = shared.pending.lock().await;
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(error.clone()));
        }
    }

    async fn writer_loop(
        mut write: futures_util::stream::SplitSink<
            tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
            WsMessage,
        >,
        mut rx: mpsc::UnboundedReceiver<WsMessage>,
    ) {
        while let Some(message) = rx.recv().await {
            let is_close = matches!(&message, WsMessage::Close(_));
            if write.send(message).await.is_err() {
                break;
            }
            if is_close {
                break;
            }
        }
        let _ = write.close().await;
    }

    async fn reader_loop(
        shared: Arc<Shared>,
        mut read: futures_util::stream::SplitStream<
            tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
        >,
    ) {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(server_message) => Self::dispatch(&shared, server_message).await,
                    Err(e) => tracing::warn!(error = %e, "received malformed frame"),
                },
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "websocket read error");
                    break;
                }
            }
        }
        Self::handle_disconnect(shared).await;
    }

    async fn dispatch(shared: &Shared, message: ServerMessage) {
        if let ServerMessage::SubscriptionEvent {
            subscription_id,
            payload,
        } = &message
        {
            let subscriptions = shared.subscriptions.lock().await;
            match subscriptions.get(subscription_id) {
                Some(handler) => handler(payload.clone()),
                None => tracing::debug!(subscription_id, "dropping frame with no handler"),
            }
            return;
        }

        let Some(request_id) = message.request_id() else {
            return;
        };
        let sender = shared.pending.lock().await.remove(&request_id);
        if let Some(sender) = sender {
            let _ = sender.send(message.into_result());
        }
    }

    async fn handle_disconnect(shared: Arc<Shared>) {
        *shared.outbound.lock().await = None;
        Self::reject_all_pending(&shared, Error::connection("connection lost")).await;

        let was_connected = {
            let mut state = shared.state.lock().expect("connection state mutex poisoned");
            let was = *state == ConnectionState::Connected;
            *state = ConnectionState::Disconnected;
            was
        };

        if !was_connected || !shared.reconnect_enabled.load(Ordering::SeqCst) {
            return;
        }

        let attempt = shared.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
        if attempt >= shared.config.max_reconnect_attempts {
            tracing::warn!(attempt, "giving up on reconnect, attempts exhausted");
            return;
        }

        let delay = shared.config.backoff_delay(attempt);
        tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !shared.reconnect_enabled.load(Ordering::SeqCst) {
                return;
            }
            if let Err(e) = Connection(shared).connect().await {
                tracing::warn!(error = %e, "reconnect attempt failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_connection_is_disconnected() {
        let config = ConnectionConfig::new("ws://localhost:8080", "key").unwrap();
        let conn = Connection::new(config);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn request_without_connecting_fails_fast() {
        let config = ConnectionConfig::new("ws://localhost:1", "key").unwrap();
        let conn = Connection::new(config);
        let err = conn
            .request(|request_id| ClientMessage::Ping { request_id })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), strand_engine::ErrorKind::Connection);
    }
}
