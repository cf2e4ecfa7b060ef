//! WebSocket client for the collaborative workflow channel.
//!
//! One client serves one `(entity, userId, username)` triple. On connect it
//! announces itself with `JOIN`, starts a heartbeat, and splits the socket
//! into background reader/writer tasks:
//!
//! ```text
//! send_node_update() ──► outgoing mpsc ──► writer task ──► WebSocket
//!                                                             │
//! SessionEvent ◄── event mpsc ◄── SessionState ◄── reader task┘
//! ```
//!
//! Connection lifecycle: `Disconnected → Connecting → Connected`, with
//! `Reconnecting` entered after an unexpected close. Errors are reported
//! through [`SessionEvent::Error`] and never terminate the session by
//! themselves. An unexpected drop triggers exponential-backoff reconnection
//! (bounded attempts); an intentional `disconnect()` never does.
//!
//! Outbound operations are fire-and-forget: when the channel is not
//! connected they are silently dropped, not errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use flowdeck_core::graph::{EdgePatch, NodePatch};

use crate::protocol::{CollaborationUser, WireMessage};
use crate::reconnect::{next_delay, ReconnectConfig};
use crate::session::{CollaborationCursor, SessionEvent, SessionState};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Error)]
pub enum CollabError {
    #[error("connection failed: {0}")]
    Connect(String),
}

/// Configuration for one collaboration session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://localhost:8080/ws/workflow`.
    pub url: String,
    /// Workflow entity type this session edits.
    pub entity: String,
    pub user_id: String,
    pub username: String,
    /// Heartbeat interval; the server expects one roughly every 30 s.
    pub heartbeat_interval: Duration,
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    pub fn new(
        url: impl Into<String>,
        entity: impl Into<String>,
        user_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            entity: entity.into(),
            user_id: user_id.into(),
            username: username.into(),
            heartbeat_interval: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Handle shared between the client facade and its background tasks.
#[derive(Clone)]
struct Shared {
    config: Arc<ClientConfig>,
    state: Arc<RwLock<ConnectionState>>,
    outgoing: Arc<RwLock<Option<mpsc::Sender<WireMessage>>>>,
    event_tx: mpsc::Sender<SessionEvent>,
    session: Arc<Mutex<SessionState>>,
    /// Set by `disconnect()`; suppresses reconnection.
    closed: Arc<AtomicBool>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.read().unwrap()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write().unwrap() = state;
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// Open the socket, announce presence, and spawn the background tasks.
    //
    // Returns a boxed `dyn Future + Send` rather than an `async fn` so its
    // return type is concrete, not opaque. `establish` and `reconnect_loop`
    // reference each other through spawned tasks; with an opaque return type
    // the compiler cannot resolve auto-trait (`Send`) inference across that
    // cycle. Boxing erases the opaque type; the body and its behavior are
    // unchanged.
    fn establish(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), CollabError>> + Send + '_>>
    {
      Box::pin(async move {
        self.set_state(ConnectionState::Connecting);

        let ws = match tokio_tungstenite::connect_async(&self.config.url).await {
            Ok((ws, _response)) => ws,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                let _ = self
                    .event_tx
                    .send(SessionEvent::Error {
                        message: format!("connection failed: {e}"),
                    })
                    .await;
                return Err(CollabError::Connect(e.to_string()));
            }
        };

        let (mut sink, stream) = ws.split();
        let (out_tx, mut out_rx) = mpsc::channel::<WireMessage>(256);

        // Writer: drains the outgoing queue onto the socket. Exits when
        // every sender is gone, so queued frames (a trailing LEAVE) still
        // flush during teardown.
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let text = match msg.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        log::error!("dropping unencodable frame: {e}");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        *self.outgoing.write().unwrap() = Some(out_tx.clone());

        // Self-announcement.
        let _ = out_tx
            .send(WireMessage::Join {
                entity: self.config.entity.clone(),
                user_id: self.config.user_id.clone(),
                username: self.config.username.clone(),
            })
            .await;

        self.set_state(ConnectionState::Connected);
        log::info!(
            "collaboration channel open: entity={} user={}",
            self.config.entity,
            self.config.user_id
        );
        let _ = self.event_tx.send(SessionEvent::Connected).await;

        // Heartbeat: exits once the outgoing channel closes.
        let hb_tx = out_tx;
        let interval = self.config.heartbeat_interval;
        let heartbeat = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if hb_tx.send(WireMessage::Hb).await.is_err() {
                    break;
                }
            }
        });
        self.track(heartbeat);

        let shared = self.clone();
        let reader = tokio::spawn(async move { shared.read_loop(stream).await });
        self.track(reader);

        Ok(())
      })
    }

    async fn read_loop(self, mut stream: futures_util::stream::SplitStream<WsStream>) {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match WireMessage::decode(text.as_str()) {
                    Ok(msg) => {
                        let event = self.session.lock().unwrap().handle_message(&msg);
                        if let Some(event) = event {
                            if self.event_tx.send(event).await.is_err() {
                                return; // application went away
                            }
                        }
                    }
                    Err(e) => {
                        // Malformed frames are surfaced, never applied.
                        log::error!("failed to parse inbound frame: {e}");
                        let _ = self
                            .event_tx
                            .send(SessionEvent::Error {
                                message: format!("malformed frame: {e}"),
                            })
                            .await;
                    }
                },
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
        self.on_connection_lost().await;
    }

    /// Connection dropped (close frame, socket error, or EOF).
    async fn on_connection_lost(&self) {
        *self.outgoing.write().unwrap() = None;
        self.set_state(ConnectionState::Disconnected);
        self.session.lock().unwrap().clear();
        let _ = self.event_tx.send(SessionEvent::Disconnected).await;

        if self.closed.load(Ordering::SeqCst) || self.config.reconnect.max_attempts == 0 {
            return;
        }
        log::warn!("collaboration channel lost, scheduling reconnect");
        let shared = self.clone();
        let handle = tokio::spawn(async move { shared.reconnect_loop().await });
        self.track(handle);
    }

    async fn reconnect_loop(self) {
        let config = self.config.reconnect.clone();
        let mut delay = config.initial_delay;

        for attempt in 1..=config.max_attempts {
            self.set_state(ConnectionState::Reconnecting);
            log::info!(
                "reconnecting in {delay:?} (attempt {attempt}/{})",
                config.max_attempts
            );
            tokio::time::sleep(delay).await;
            if self.closed.load(Ordering::SeqCst) {
                return;
            }
            match self.establish().await {
                Ok(()) => {
                    log::info!("reconnected after {attempt} attempt(s)");
                    return;
                }
                Err(e) => {
                    log::warn!("reconnect attempt {attempt} failed: {e}");
                    delay = next_delay(delay, &config);
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        let _ = self
            .event_tx
            .send(SessionEvent::Error {
                message: format!(
                    "failed to reconnect after {} attempts",
                    config.max_attempts
                ),
            })
            .await;
    }
}

/// The collaboration client — one per open workflow editor.
pub struct CollabClient {
    shared: Shared,
    event_rx: Option<mpsc::Receiver<SessionEvent>>,
}

impl CollabClient {
    pub fn new(config: ClientConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        let session = SessionState::new(config.user_id.clone());
        Self {
            shared: Shared {
                config: Arc::new(config),
                state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
                outgoing: Arc::new(RwLock::new(None)),
                event_tx,
                session: Arc::new(Mutex::new(session)),
                closed: Arc::new(AtomicBool::new(false)),
                tasks: Arc::new(Mutex::new(Vec::new())),
            },
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.event_rx.take()
    }

    /// Establish the channel. Idempotent: calling while already connected
    /// (or connecting) is a no-op.
    pub async fn connect(&self) -> Result<(), CollabError> {
        match self.shared.state() {
            ConnectionState::Disconnected => {}
            state => {
                log::warn!("connect() while {state:?} is a no-op");
                return Ok(());
            }
        }
        self.shared.closed.store(false, Ordering::SeqCst);
        self.shared.establish().await
    }

    /// Close the channel and clear all local session state.
    ///
    /// Safe to call repeatedly and during teardown: background tasks are
    /// aborted so nothing fires afterwards. A `LEAVE` is flushed best-effort
    /// before the writer drains out.
    pub fn disconnect(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);

        if let Some(tx) = self.shared.outgoing.read().unwrap().clone() {
            let _ = tx.try_send(WireMessage::Leave {
                entity: self.shared.config.entity.clone(),
            });
        }

        for task in self.shared.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        *self.shared.outgoing.write().unwrap() = None;
        self.shared.set_state(ConnectionState::Disconnected);
        self.shared.session.lock().unwrap().clear();
        let _ = self.shared.event_tx.try_send(SessionEvent::Disconnected);
    }

    // ── Outbound operations (fire-and-forget) ───────────────────────

    pub fn send_node_update(&self, node: NodePatch) {
        self.send(WireMessage::NodeUpdate {
            entity: self.shared.config.entity.clone(),
            node,
        });
    }

    pub fn send_edge_update(&self, edge: EdgePatch) {
        self.send(WireMessage::EdgeUpdate {
            entity: self.shared.config.entity.clone(),
            edge,
        });
    }

    pub fn send_node_delete(&self, node_id: impl Into<String>) {
        self.send(WireMessage::NodeDelete {
            entity: self.shared.config.entity.clone(),
            node_id: node_id.into(),
        });
    }

    pub fn send_edge_delete(&self, edge_id: impl Into<String>) {
        self.send(WireMessage::EdgeDelete {
            entity: self.shared.config.entity.clone(),
            edge_id: edge_id.into(),
        });
    }

    pub fn send_cursor(&self, x: f32, y: f32) {
        self.send(WireMessage::Cursor {
            entity: self.shared.config.entity.clone(),
            x,
            y,
        });
    }

    fn send(&self, msg: WireMessage) {
        if self.shared.state() != ConnectionState::Connected {
            log::debug!("not connected, dropping outbound frame");
            return;
        }
        let guard = self.shared.outgoing.read().unwrap();
        if let Some(tx) = guard.as_ref() {
            if tx.try_send(msg).is_err() {
                log::warn!("outgoing queue full or closed, frame dropped");
            }
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Snapshot of the online roster.
    pub fn users(&self) -> Vec<CollaborationUser> {
        self.shared.session.lock().unwrap().users().to_vec()
    }

    /// Snapshot of remote cursors, ordered by user id.
    pub fn cursors(&self) -> Vec<CollaborationCursor> {
        self.shared.session.lock().unwrap().cursors()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }
}

impl Drop for CollabClient {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        for task in self.shared.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        // Dropping the last sender lets the writer task drain and exit.
        *self.shared.outgoing.write().unwrap() = None;
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ClientConfig {
        let mut config = ClientConfig::new("ws://127.0.0.1:9", "Order", "u1", "John");
        config.reconnect = ReconnectConfig::disabled();
        config
    }

    #[test]
    fn test_initial_state() {
        let client = CollabClient::new(test_config());
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(client.users().is_empty());
        assert!(client.cursors().is_empty());
    }

    #[test]
    fn test_take_event_rx_once() {
        let mut client = CollabClient::new(test_config());
        assert!(client.take_event_rx().is_some());
        assert!(client.take_event_rx().is_none());
    }

    #[tokio::test]
    async fn test_sends_while_disconnected_are_noops() {
        let client = CollabClient::new(test_config());
        // None of these may error or panic; they are silently dropped.
        client.send_node_update(NodePatch::for_id("n1"));
        client.send_edge_update(EdgePatch::for_id("e1"));
        client.send_node_delete("n1");
        client.send_edge_delete("e1");
        client.send_cursor(10.0, 20.0);
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_failure_reports_and_resets() {
        let mut client = CollabClient::new(test_config());
        let mut events = client.take_event_rx().unwrap();

        let result = client.connect().await;
        assert!(matches!(result, Err(CollabError::Connect(_))));
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);

        // The failure is also surfaced as an error event.
        let event = events.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::Error { .. }));
    }

    #[tokio::test]
    async fn test_disconnect_is_safe_without_connect() {
        let client = CollabClient::new(test_config());
        client.disconnect();
        client.disconnect(); // repeated teardown must not panic
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("ws://x", "Order", "u1", "John");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.reconnect.max_attempts, 5);
    }
}
