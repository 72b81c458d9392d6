#![allow(dead_code)]
//! In-process fake notification hub.
//!
//! Speaks just enough of the JSON hub protocol for integration tests:
//! handshake, completions for every client invocation, and server pushes.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use budget_notify::{ConnectionState, HubClient, HubConfig, ReconnectPolicy};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

const RECORD_SEPARATOR: char = '\u{1e}';

// ============================================================================
// Types
// ============================================================================

/// An invocation the hub received.
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    pub target: String,
    pub arguments: Vec<Value>,
}

impl Received {
    /// Returns the first argument as a string.
    pub fn first_arg(&self) -> Option<&str> {
        self.arguments.first().and_then(Value::as_str)
    }
}

enum HubCommand {
    Send(String),
    Drop,
}

struct HubState {
    handshakes: AtomicUsize,
    handshake_error: Option<String>,
    invocations: mpsc::UnboundedSender<Received>,
    current: Mutex<Option<mpsc::UnboundedSender<HubCommand>>>,
    connections: watch::Sender<usize>,
}

// ============================================================================
// FakeHub
// ============================================================================

/// A hub bound to a random localhost port.
pub struct FakeHub {
    port: u16,
    state: Arc<HubState>,
    received: tokio::sync::Mutex<mpsc::UnboundedReceiver<Received>>,
    accept_task: JoinHandle<()>,
}

impl FakeHub {
    /// Starts a hub that accepts every handshake.
    pub async fn start() -> Self {
        Self::spawn(None).await
    }

    /// Starts a hub that rejects every handshake with `error`.
    pub async fn rejecting(error: &str) -> Self {
        Self::spawn(Some(error.to_string())).await
    }

    async fn spawn(handshake_error: Option<String>) -> Self {
        let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
            .await
            .expect("bind fake hub");
        let port = listener.local_addr().expect("local addr").port();

        let (invocations, received) = mpsc::unbounded_channel();
        let state = Arc::new(HubState {
            handshakes: AtomicUsize::new(0),
            handshake_error,
            invocations,
            current: Mutex::new(None),
            connections: watch::Sender::new(0),
        });

        let accept_state = Arc::clone(&state);
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&accept_state)));
            }
        });

        Self {
            port,
            state,
            received: tokio::sync::Mutex::new(received),
            accept_task,
        }
    }

    /// Base URL to hand to the client builder.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Config with short timings for tests.
    pub fn config(&self) -> HubConfig {
        HubConfig::builder()
            .base_url(self.base_url())
            .handshake_timeout(Duration::from_secs(2))
            .invoke_timeout(Duration::from_secs(2))
            .reconnect(ReconnectPolicy::fixed(Duration::from_millis(50)))
            .build()
            .expect("valid config")
    }

    /// Client for this hub.
    pub fn client(&self) -> HubClient {
        HubClient::new(self.config())
    }

    /// Number of completed handshakes.
    pub fn handshake_count(&self) -> usize {
        self.state.handshakes.load(Ordering::SeqCst)
    }

    /// Waits until `count` handshakes have completed.
    pub async fn wait_for_connections(&self, count: usize) {
        let mut connections = self.state.connections.subscribe();
        timeout(WAIT, connections.wait_for(|n| *n >= count))
            .await
            .expect("connection in time")
            .expect("hub alive");
    }

    /// Next invocation sent by the client.
    pub async fn next_invocation(&self) -> Received {
        let mut received = self.received.lock().await;
        timeout(WAIT, received.recv())
            .await
            .expect("invocation in time")
            .expect("hub alive")
    }

    /// Returns the next invocation if one arrives within `wait`.
    pub async fn try_next_invocation(&self, wait: Duration) -> Option<Received> {
        let mut received = self.received.lock().await;
        timeout(wait, received.recv()).await.ok().flatten()
    }

    /// Pushes one `ReceiveNotification` frame. Returns `false` if no client
    /// is connected.
    pub fn push_notification(&self, payload: Value) -> bool {
        self.push_records(&[notification_record(payload)])
    }

    /// Pushes several records in a single WebSocket frame.
    pub fn push_records(&self, records: &[Value]) -> bool {
        let mut frame = String::new();
        for record in records {
            frame.push_str(&record.to_string());
            frame.push(RECORD_SEPARATOR);
        }
        self.command(HubCommand::Send(frame))
    }

    /// Sends a Close message.
    pub fn close(&self, allow_reconnect: bool) -> bool {
        let record = json!({ "type": 7, "error": "closing", "allowReconnect": allow_reconnect });
        self.push_records(&[record])
    }

    /// Severs the current connection without a close handshake.
    pub fn drop_connection(&self) -> bool {
        self.command(HubCommand::Drop)
    }

    fn command(&self, command: HubCommand) -> bool {
        match self.state.current.lock().as_ref() {
            Some(tx) => tx.send(command).is_ok(),
            None => false,
        }
    }
}

impl Drop for FakeHub {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Builds a `ReceiveNotification` invocation record.
pub fn notification_record(payload: Value) -> Value {
    json!({ "type": 1, "target": "ReceiveNotification", "arguments": [payload] })
}

/// Waits until the client reaches `state`.
pub async fn wait_for_state(client: &HubClient, state: ConnectionState) {
    let mut states = client.watch_state();
    timeout(WAIT, states.wait_for(|current| *current == state))
        .await
        .unwrap_or_else(|_| panic!("state {state} in time, still {}", client.state()))
        .expect("client alive");
}

// ============================================================================
// Connection Handling
// ============================================================================

async fn serve(stream: TcpStream, state: Arc<HubState>) {
    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    // Handshake
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) if text.contains("\"protocol\"") => break,
            Some(Ok(_)) => {}
            _ => return,
        }
    }

    if let Some(error) = &state.handshake_error {
        let reply = format!("{}{RECORD_SEPARATOR}", json!({ "error": error }));
        let _ = write.send(Message::Text(reply.into())).await;
        return;
    }

    // Register before replying so pushes right after connect() are not lost
    let (tx, mut commands) = mpsc::unbounded_channel();
    *state.current.lock() = Some(tx);
    state.handshakes.fetch_add(1, Ordering::SeqCst);
    state.connections.send_modify(|n| *n += 1);

    if write
        .send(Message::Text(format!("{{}}{RECORD_SEPARATOR}").into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    for record in text.split(RECORD_SEPARATOR).filter(|r| !r.is_empty()) {
                        let Ok(value) = serde_json::from_str::<Value>(record) else {
                            continue;
                        };
                        if value["type"] != json!(1) {
                            continue;
                        }

                        let _ = state.invocations.send(Received {
                            target: value["target"].as_str().unwrap_or_default().to_string(),
                            arguments: value["arguments"].as_array().cloned().unwrap_or_default(),
                        });

                        if let Some(id) = value["invocationId"].as_str() {
                            let completion = json!({ "type": 3, "invocationId": id });
                            let frame = format!("{completion}{RECORD_SEPARATOR}");
                            if write.send(Message::Text(frame.into())).await.is_err() {
                                return;
                            }
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },

            command = commands.recv() => match command {
                Some(HubCommand::Send(frame)) => {
                    if write.send(Message::Text(frame.into())).await.is_err() {
                        return;
                    }
                }
                Some(HubCommand::Drop) | None => return,
            },
        }
    }
}
