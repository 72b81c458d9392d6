//! WebSocket connection and event loop.
//!
//! A [`Connection`] is one live transport to the hub. It performs the protocol
//! handshake, then hands the socket to a tokio task that:
//!
//! - Splits inbound text into records and dispatches them in wire order
//! - Correlates completions with pending invocations by ID
//! - Sends keep-alive pings and watches for server silence
//! - Reports why it stopped through a one-shot [`CloseReason`]
//!
//! Reconnection is not handled here; [`HubClient`](crate::HubClient) opens a
//! fresh `Connection` when the previous one reports a loss.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval, sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::config::HubConfig;
use crate::error::{Error, Result};
use crate::identifiers::InvocationId;
use crate::protocol::message::PING_RECORD;
use crate::protocol::{
    HandshakeRequest, HandshakeResponse, HubMessage, HubMethod, Invocation, OutboundInvocation,
    encode_record, split_records,
};

// ============================================================================
// Constants
// ============================================================================

/// Maximum pending invocations before rejecting new ones.
const MAX_PENDING_INVOCATIONS: usize = 100;

/// Time allowed for the closing handshake once the loop stops.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Types
// ============================================================================

/// Client side of the hub WebSocket.
type HubStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of the hub WebSocket.
type HubSink = SplitSink<HubStream, Message>;

/// Map of invocation IDs to waiting callers.
type CorrelationMap = FxHashMap<InvocationId, PendingInvocation>;

/// Invocation handler callback type.
///
/// Called on the event loop task for each server-to-client invocation, in the
/// order the records arrived.
pub type InvocationHandler = Box<dyn Fn(Invocation) + Send + Sync>;

/// A caller waiting for a completion.
struct PendingInvocation {
    /// Hub method, for error messages.
    target: &'static str,
    /// Completion channel.
    response_tx: oneshot::Sender<Result<Option<Value>>>,
}

/// Timing for keep-alive and silence detection.
#[derive(Debug, Clone, Copy)]
struct KeepAlive {
    /// Interval between pings.
    interval: Duration,
    /// Silence after which the connection is considered lost.
    server_timeout: Duration,
}

// ============================================================================
// CloseReason
// ============================================================================

/// Why a connection's event loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// [`Connection::shutdown`] was called, or every handle was dropped.
    Requested,

    /// Socket error, EOF, close frame, or server silence.
    Lost {
        /// Description of the loss.
        message: String,
    },

    /// Hub sent a Close message.
    ServerClosed {
        /// Reason given by the hub.
        error: Option<String>,
        /// `false` only when the hub explicitly refused reconnects.
        allow_reconnect: bool,
    },
}

impl CloseReason {
    /// Creates a lost-connection reason.
    #[inline]
    fn lost(message: impl Into<String>) -> Self {
        Self::Lost {
            message: message.into(),
        }
    }

    /// Returns `true` if the client should try to reconnect.
    #[inline]
    #[must_use]
    pub fn allows_reconnect(&self) -> bool {
        match self {
            Self::Requested => false,
            Self::Lost { .. } => true,
            Self::ServerClosed {
                allow_reconnect, ..
            } => *allow_reconnect,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("closed on request"),
            Self::Lost { message } => write!(f, "connection lost: {message}"),
            Self::ServerClosed { error: Some(error), .. } => {
                write!(f, "closed by hub: {error}")
            }
            Self::ServerClosed { error: None, .. } => f.write_str("closed by hub"),
        }
    }
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send an invocation and wait for its completion.
    Invoke {
        invocation: OutboundInvocation,
        response_tx: oneshot::Sender<Result<Option<Value>>>,
    },
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(InvocationId),
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// One live WebSocket connection to the hub.
///
/// Cheap to clone; all clones drive the same event loop.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Invocation handler (shared with event loop).
    handler: Arc<Mutex<Option<InvocationHandler>>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("pending", &self.pending_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Opens a connection and completes the protocol handshake.
    ///
    /// The handler is installed before the first record is dispatched, so no
    /// invocation that follows the handshake is missed.
    ///
    /// # Returns
    ///
    /// The connection and a receiver that resolves when the event loop stops.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the handshake does not finish in time
    /// - [`Error::Connection`] if the WebSocket cannot be opened
    /// - [`Error::Handshake`] if the hub rejects the protocol
    pub async fn open(
        config: &HubConfig,
        handler: InvocationHandler,
    ) -> Result<(Self, oneshot::Receiver<CloseReason>)> {
        let handshake_timeout = config.handshake_timeout();

        let (ws_stream, leftovers) = timeout(handshake_timeout, Self::handshake(config.endpoint()))
            .await
            .map_err(|_| Error::connection_timeout(handshake_timeout.as_millis() as u64))??;

        debug!(endpoint = %config.endpoint(), "Hub handshake completed");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let handler = Arc::new(Mutex::new(Some(handler)));
        let (closed_tx, closed_rx) = oneshot::channel();

        let keep_alive = KeepAlive {
            interval: config.keep_alive_interval(),
            server_timeout: config.server_timeout(),
        };

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            leftovers,
            command_rx,
            Arc::clone(&correlation),
            Arc::clone(&handler),
            keep_alive,
            closed_tx,
        ));

        let connection = Self {
            command_tx,
            correlation,
            handler,
        };

        Ok((connection, closed_rx))
    }

    /// Opens the WebSocket and exchanges handshake records.
    ///
    /// Returns records that arrived in the same frame as the handshake
    /// response so the event loop can dispatch them.
    async fn handshake(endpoint: &Url) -> Result<(HubStream, Vec<String>)> {
        let (mut ws_stream, _response) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| Error::connection(format!("WebSocket connect to {endpoint} failed: {e}")))?;

        let request = encode_record(&HandshakeRequest::default())?;
        ws_stream.send(Message::Text(request.into())).await?;

        loop {
            let message = ws_stream.next().await;
            match message {
                Some(Ok(Message::Text(text))) => {
                    let mut records = split_records(&text);
                    let Some(first) = records.next() else {
                        continue;
                    };

                    HandshakeResponse::parse(first)?;
                    let leftovers = records.map(str::to_string).collect();
                    return Ok((ws_stream, leftovers));
                }

                Some(Ok(Message::Close(_))) | None => {
                    return Err(Error::handshake("connection closed during handshake"));
                }

                Some(Err(e)) => return Err(e.into()),

                // Ignore Binary, Ping, Pong
                Some(Ok(_)) => {}
            }
        }
    }

    /// Clears the invocation handler.
    ///
    /// Blocks until an in-flight handler call returns; after this no further
    /// invocation is delivered.
    pub fn clear_invocation_handler(&self) {
        let mut guard = self.handler.lock();
        *guard = None;
    }

    /// Invokes a hub method and waits for its completion.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is closed
    /// - [`Error::InvocationTimeout`] if no completion arrives in time
    /// - [`Error::Invocation`] if the hub reports a failure
    /// - [`Error::Protocol`] if too many invocations are pending
    pub async fn invoke(&self, method: &HubMethod, invoke_timeout: Duration) -> Result<Option<Value>> {
        // Check pending invocation limit
        {
            let correlation = self.correlation.lock();
            if correlation.len() >= MAX_PENDING_INVOCATIONS {
                warn!(
                    pending = correlation.len(),
                    max = MAX_PENDING_INVOCATIONS,
                    "Too many pending invocations"
                );
                return Err(Error::protocol(format!(
                    "Too many pending invocations: {}/{}",
                    correlation.len(),
                    MAX_PENDING_INVOCATIONS
                )));
            }
        }

        let invocation = OutboundInvocation::new(method);
        let invocation_id = invocation.invocation_id;
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Invoke {
                invocation,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        match timeout(invoke_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(ConnectionCommand::RemoveCorrelation(invocation_id));

                Err(Error::invocation_timeout(
                    invocation_id,
                    invoke_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Returns the number of pending invocations.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Asks the event loop to close the socket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the loop already stopped.
    pub fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(ConnectionCommand::Shutdown)
            .map_err(|_| Error::ConnectionClosed)
    }
}

// ============================================================================
// Connection - Event Loop
// ============================================================================

impl Connection {
    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: HubStream,
        leftovers: Vec<String>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        handler: Arc<Mutex<Option<InvocationHandler>>>,
        keep_alive: KeepAlive,
        closed_tx: oneshot::Sender<CloseReason>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let early_close = leftovers
            .iter()
            .find_map(|record| Self::handle_record(record, &correlation, &handler));

        let mut ping = interval(keep_alive.interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping.reset();

        let idle = sleep(keep_alive.server_timeout);
        tokio::pin!(idle);

        let reason = match early_close {
            Some(reason) => reason,
            None => loop {
                tokio::select! {
                    // Incoming records from the hub
                    message = ws_read.next() => {
                        idle.as_mut().reset(Instant::now() + keep_alive.server_timeout);

                        match message {
                            Some(Ok(Message::Text(text))) => {
                                if let Some(reason) = Self::handle_text(&text, &correlation, &handler) {
                                    break reason;
                                }
                            }

                            Some(Ok(Message::Close(frame))) => {
                                debug!(?frame, "WebSocket closed by remote");
                                break CloseReason::lost("closed by remote");
                            }

                            Some(Err(e)) => {
                                error!(error = %e, "WebSocket error");
                                break CloseReason::lost(e.to_string());
                            }

                            None => {
                                debug!("WebSocket stream ended");
                                break CloseReason::lost("stream ended");
                            }

                            // Ignore Binary, Ping, Pong
                            Some(Ok(_)) => {}
                        }
                    }

                    // Commands from the client
                    command = command_rx.recv() => {
                        match command {
                            Some(ConnectionCommand::Invoke { invocation, response_tx }) => {
                                Self::handle_invoke_command(
                                    invocation,
                                    response_tx,
                                    &mut ws_write,
                                    &correlation,
                                ).await;
                            }

                            Some(ConnectionCommand::RemoveCorrelation(invocation_id)) => {
                                correlation.lock().remove(&invocation_id);
                                debug!(%invocation_id, "Removed timed-out correlation");
                            }

                            Some(ConnectionCommand::Shutdown) => {
                                debug!("Shutdown command received");
                                break CloseReason::Requested;
                            }

                            None => {
                                debug!("Command channel closed");
                                break CloseReason::Requested;
                            }
                        }
                    }

                    // Keep-alive
                    _ = ping.tick() => {
                        trace!("Sending keep-alive ping");
                        if let Err(e) = ws_write.send(Message::Text(PING_RECORD.into())).await {
                            warn!(error = %e, "Failed to send keep-alive ping");
                            break CloseReason::lost(e.to_string());
                        }
                    }

                    // Server silence
                    () = &mut idle => {
                        warn!(
                            timeout_ms = keep_alive.server_timeout.as_millis() as u64,
                            "No message from hub within server timeout"
                        );
                        break CloseReason::lost("server timeout");
                    }
                }
            },
        };

        let _ = timeout(CLOSE_TIMEOUT, ws_write.close()).await;

        // Reject further commands before reporting the reason
        drop(command_rx);

        // Fail all pending invocations and release the handler
        Self::fail_pending_invocations(&correlation);
        handler.lock().take();

        debug!(%reason, "Event loop terminated");
        let _ = closed_tx.send(reason);
    }

    /// Dispatches every record of a text frame.
    fn handle_text(
        text: &str,
        correlation: &Arc<Mutex<CorrelationMap>>,
        handler: &Arc<Mutex<Option<InvocationHandler>>>,
    ) -> Option<CloseReason> {
        split_records(text).find_map(|record| Self::handle_record(record, correlation, handler))
    }

    /// Dispatches one record. Returns a reason if the hub asked to close.
    fn handle_record(
        record: &str,
        correlation: &Arc<Mutex<CorrelationMap>>,
        handler: &Arc<Mutex<Option<InvocationHandler>>>,
    ) -> Option<CloseReason> {
        let message = match HubMessage::parse(record) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, record = %record, "Failed to parse hub message");
                return None;
            }
        };

        match message {
            HubMessage::Invocation(invocation) => {
                trace!(method = %invocation.target, "Invocation received");
                let guard = handler.lock();
                if let Some(ref handler) = *guard {
                    handler(invocation);
                }
            }

            HubMessage::Completion {
                invocation_id,
                result,
                error,
            } => {
                let pending = InvocationId::parse(&invocation_id)
                    .and_then(|id| correlation.lock().remove(&id));

                match pending {
                    Some(pending) => {
                        let outcome = match error {
                            Some(message) => Err(Error::invocation(pending.target, message)),
                            None => Ok(result),
                        };
                        let _ = pending.response_tx.send(outcome);
                    }
                    None => warn!(id = %invocation_id, "Completion for unknown invocation"),
                }
            }

            HubMessage::Ping => trace!("Ping received"),

            HubMessage::Close {
                error,
                allow_reconnect,
            } => {
                debug!(?error, ?allow_reconnect, "Close message received");
                return Some(CloseReason::ServerClosed {
                    error,
                    allow_reconnect: allow_reconnect.unwrap_or(true),
                });
            }

            HubMessage::Other { message_type } => {
                debug!(message_type, "Ignoring unsupported hub message");
            }
        }

        None
    }

    /// Handles an invoke command from the client.
    async fn handle_invoke_command(
        invocation: OutboundInvocation,
        response_tx: oneshot::Sender<Result<Option<Value>>>,
        ws_write: &mut HubSink,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) {
        let invocation_id = invocation.invocation_id;
        let target = invocation.target;

        let record = match encode_record(&invocation) {
            Ok(record) => record,
            Err(e) => {
                let _ = response_tx.send(Err(e));
                return;
            }
        };

        // Store correlation before sending
        correlation.lock().insert(
            invocation_id,
            PendingInvocation {
                target,
                response_tx,
            },
        );

        if let Err(e) = ws_write.send(Message::Text(record.into())).await {
            if let Some(pending) = correlation.lock().remove(&invocation_id) {
                let _ = pending.response_tx.send(Err(Error::connection(e.to_string())));
            }
            return;
        }

        trace!(%invocation_id, method = target, "Invocation sent");
    }

    /// Fails all pending invocations with ConnectionClosed error.
    fn fail_pending_invocations(correlation: &Arc<Mutex<CorrelationMap>>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, pending) in pending {
            let _ = pending.response_tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending invocations on shutdown");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
