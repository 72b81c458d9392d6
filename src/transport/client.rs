//! Hub client with reconnection and group tracking.
//!
//! [`HubClient`] owns one logical connection to the notification hub. It
//! drives the [`ConnectionState`] machine, decodes `ReceiveNotification`
//! invocations inline on the connection task, and publishes the results:
//!
//! - [`HubClient::subscribe`] hands out an unbounded, ordered stream of
//!   decoded [`NotificationEvent`]s per subscriber, so a burst never drops
//!   an event
//! - [`HubClient::errors`] broadcasts [`ErrorEvent`]s
//!
//! When an established connection is lost the client moves to
//! `Reconnecting` and keeps retrying according to its [`ReconnectPolicy`],
//! re-joining every group that was active before the loss.
//!
//! # Example
//!
//! ```no_run
//! use budget_notify::{HubClient, HubConfig, Result};
//!
//! # async fn example() -> Result<()> {
//! let config = HubConfig::builder().base_url("https://api.example.com").build()?;
//! let client = HubClient::new(config);
//!
//! let mut events = client.subscribe();
//! client.connect().await?;
//! client.join_group("42").await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{}: {}", event.kind(), event.message());
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

use crate::config::{HubConfig, ReconnectPolicy};
use crate::error::{Error, ErrorEvent, Result};
use crate::identifiers::GroupName;
use crate::notification::NotificationEvent;
use crate::protocol::{HubMethod, Invocation, RECEIVE_NOTIFICATION};

use super::connection::{CloseReason, Connection, InvocationHandler};
use super::state::ConnectionState;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for each best-effort `LeaveGroup` during disconnect.
const LEAVE_ON_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// HubClient
// ============================================================================

/// Client for the budget notification hub.
///
/// Cheap to clone; clones share one connection, one state machine and the
/// same subscribers.
#[derive(Clone)]
pub struct HubClient {
    inner: Arc<ClientInner>,
}

/// Shared client state.
struct ClientInner {
    /// Validated settings.
    config: HubConfig,
    /// Current state; the single source of truth for legality of operations.
    state: watch::Sender<ConnectionState>,
    /// Live connection, if any.
    connection: Mutex<Option<Connection>>,
    /// Groups to restore after a reconnect.
    groups: Mutex<Vec<GroupName>>,
    /// One sender per live `subscribe()` stream.
    subscribers: Mutex<Vec<mpsc::UnboundedSender<NotificationEvent>>>,
    /// Side-channel failures.
    errors: broadcast::Sender<ErrorEvent>,
    /// Task watching the live connection and reconnecting it.
    supervisor: Mutex<Option<JoinHandle<()>>>,
    /// Serializes connect, disconnect and connection replacement.
    lifecycle: tokio::sync::Mutex<()>,
    /// Bumped on every connect and disconnect; stale tasks and handlers
    /// compare against it and stand down.
    generation: AtomicU64,
    /// Set by `dispose()`.
    disposed: AtomicBool,
}

impl fmt::Debug for HubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubClient")
            .field("endpoint", &self.inner.config.endpoint().as_str())
            .field("state", &self.state())
            .field("groups", &self.active_groups())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// HubClient - Construction
// ============================================================================

impl HubClient {
    /// Creates a disconnected client.
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        let (errors, _) = broadcast::channel(config.error_capacity());

        let inner = ClientInner {
            config,
            state: watch::Sender::new(ConnectionState::Disconnected),
            connection: Mutex::new(None),
            groups: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            errors,
            supervisor: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        };

        Self {
            inner: Arc::new(inner),
        }
    }
}

// ============================================================================
// HubClient - Accessors
// ============================================================================

impl HubClient {
    /// Returns the client configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Returns a receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Subscribes to decoded notifications.
    ///
    /// Only events published after this call are received. The stream is
    /// unbounded and keeps wire order; dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<NotificationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscribers.lock().push(tx);
        rx
    }

    /// Subscribes to side-channel failures.
    #[must_use]
    pub fn errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.inner.errors.subscribe()
    }

    /// Returns the groups currently joined.
    #[must_use]
    pub fn active_groups(&self) -> Vec<GroupName> {
        self.inner.groups.lock().clone()
    }

    /// Returns `true` after [`dispose`](Self::dispose).
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

// ============================================================================
// HubClient - Lifecycle
// ============================================================================

impl HubClient {
    /// Opens the hub connection.
    ///
    /// Does nothing when already `Connected`, or while `Reconnecting` (the
    /// backoff loop owns the transport then). Groups remembered from an
    /// earlier session are re-joined after the handshake.
    ///
    /// # Errors
    ///
    /// - [`Error::Disposed`] after [`dispose`](Self::dispose)
    /// - [`Error::ConnectionTimeout`] if the handshake does not finish in time
    /// - [`Error::Connection`] / [`Error::Handshake`] if the hub is unreachable
    ///   or rejects the protocol
    ///
    /// On failure the state becomes `Failed` and the error is also recorded
    /// on the error channel.
    pub async fn connect(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }

        let _lifecycle = self.inner.lifecycle.lock().await;

        let state = self.state();
        if matches!(
            state,
            ConnectionState::Connected | ConnectionState::Reconnecting
        ) {
            debug!(%state, "Connect ignored");
            return Ok(());
        }

        self.inner.set_state(ConnectionState::Connecting);
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;

        info!(endpoint = %self.inner.config.endpoint(), "Connecting to notification hub");

        let handler = invocation_handler(Arc::downgrade(&self.inner), generation);
        let (connection, closed) = match Connection::open(&self.inner.config, handler).await {
            Ok(opened) => opened,
            Err(e) => {
                error!(error = %e, "Failed to connect to notification hub");
                self.inner.set_state(ConnectionState::Failed);
                self.inner.record_error(ErrorEvent::connection(e.to_string()));
                return Err(e);
            }
        };

        *self.inner.connection.lock() = Some(connection);
        self.inner.set_state(ConnectionState::Connected);

        let supervisor = tokio::spawn(supervise(
            Arc::downgrade(&self.inner),
            generation,
            closed,
        ));
        if let Some(previous) = self.inner.supervisor.lock().replace(supervisor) {
            previous.abort();
        }

        info!("Connected to notification hub");

        self.inner.rejoin_groups().await;
        Ok(())
    }

    /// Closes the hub connection.
    ///
    /// Cancels any reconnection in progress and unregisters the inbound
    /// handler before anything else, so no event is published once this
    /// returns. Joined groups are left on a best-effort basis and then
    /// forgotten. Failures along the way are recorded as
    /// [`ErrorEvent::Teardown`].
    ///
    /// Idempotent, and safe to call from `Failed`.
    pub async fn disconnect(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;

        if self.state() == ConnectionState::Disconnected {
            trace!("Disconnect ignored, already disconnected");
            return;
        }

        self.inner.generation.fetch_add(1, Ordering::AcqRel);

        if let Some(supervisor) = self.inner.supervisor.lock().take() {
            supervisor.abort();
        }

        let connection = self.inner.connection.lock().take();
        let groups = std::mem::take(&mut *self.inner.groups.lock());

        if let Some(connection) = connection {
            connection.clear_invocation_handler();

            let leave_timeout = LEAVE_ON_DISCONNECT_TIMEOUT.min(self.inner.config.invoke_timeout());
            for group in groups {
                let method = HubMethod::LeaveGroup(group.clone());
                match connection.invoke(&method, leave_timeout).await {
                    Ok(_) => debug!(%group, "Left group"),
                    Err(e) => {
                        warn!(%group, error = %e, "Failed to leave group during disconnect");
                        self.inner.record_error(ErrorEvent::teardown(format!(
                            "leaving group {group}: {e}"
                        )));
                    }
                }
            }

            if let Err(e) = connection.shutdown() {
                debug!(error = %e, "Connection already closed");
                self.inner
                    .record_error(ErrorEvent::teardown(format!("closing transport: {e}")));
            }
        }

        self.inner.set_state(ConnectionState::Disconnected);
        info!("Disconnected from notification hub");
    }

    /// Disconnects and makes the client unusable.
    ///
    /// Later [`connect`](Self::connect) calls fail with [`Error::Disposed`].
    pub async fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::Release);
        self.disconnect().await;
        debug!("Hub client disposed");
    }
}

// ============================================================================
// HubClient - Groups & Messages
// ============================================================================

impl HubClient {
    /// Joins a routing group.
    ///
    /// # Returns
    ///
    /// `Ok(true)` once the hub accepted the join; `Ok(false)` when the client
    /// is not `Connected`, in which case nothing is sent and a
    /// [`ErrorEvent::Subscription`] is recorded. Also `Ok(false)` when
    /// [`disconnect`](Self::disconnect) ran while the join was in flight; the
    /// group is then not restored by a later `connect()`.
    ///
    /// # Errors
    ///
    /// Invocation failures and timeouts reported by the connection. These are
    /// also recorded on the error channel.
    pub async fn join_group(&self, group: impl Into<GroupName>) -> Result<bool> {
        let group = group.into();
        let generation = self.inner.generation.load(Ordering::Acquire);

        let Some(connection) = self.live_connection() else {
            self.reject_subscription("JoinGroup", &group);
            return Ok(false);
        };

        let method = HubMethod::JoinGroup(group.clone());
        if let Err(e) = connection
            .invoke(&method, self.inner.config.invoke_timeout())
            .await
        {
            warn!(%group, error = %e, "JoinGroup failed");
            self.inner
                .record_error(ErrorEvent::subscription(group.as_str(), e.to_string()));
            return Err(e);
        }

        if !self.inner.remember_group(&group, generation) {
            debug!(%group, "Join completed after disconnect, not remembered");
            return Ok(false);
        }

        debug!(%group, "Joined group");
        Ok(true)
    }

    /// Leaves a routing group.
    ///
    /// While not `Connected` the group is only forgotten locally, so it is
    /// not restored by the next reconnect; the call returns `Ok(false)` and
    /// records a [`ErrorEvent::Subscription`].
    ///
    /// # Errors
    ///
    /// Invocation failures and timeouts reported by the connection.
    pub async fn leave_group(&self, group: impl Into<GroupName>) -> Result<bool> {
        let group = group.into();

        let Some(connection) = self.live_connection() else {
            self.inner.forget_group(&group);
            self.reject_subscription("LeaveGroup", &group);
            return Ok(false);
        };

        let method = HubMethod::LeaveGroup(group.clone());
        if let Err(e) = connection
            .invoke(&method, self.inner.config.invoke_timeout())
            .await
        {
            warn!(%group, error = %e, "LeaveGroup failed");
            self.inner
                .record_error(ErrorEvent::subscription(group.as_str(), e.to_string()));
            return Err(e);
        }

        self.inner.forget_group(&group);
        debug!(%group, "Left group");
        Ok(true)
    }

    /// Sends a diagnostic broadcast through the hub.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] unless `Connected`, plus invocation failures.
    pub async fn send_message(&self, user: &str, message: &str) -> Result<()> {
        self.send(HubMethod::SendMessage {
            user: user.to_string(),
            message: message.to_string(),
        })
        .await
    }

    /// Sends a diagnostic message to one user through the hub.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] unless `Connected`, plus invocation failures.
    pub async fn send_message_to_user(&self, user: &str, message: &str) -> Result<()> {
        self.send(HubMethod::SendMessageToUser {
            user: user.to_string(),
            message: message.to_string(),
        })
        .await
    }

    /// Invokes a diagnostic method.
    async fn send(&self, method: HubMethod) -> Result<()> {
        let Some(connection) = self.live_connection() else {
            let state = self.state();
            warn!(method = method.target(), %state, "Send rejected while not connected");
            self.inner.record_error(ErrorEvent::connection(format!(
                "{} rejected: not connected (state: {state})",
                method.target()
            )));
            return Err(Error::not_connected(state));
        };

        match connection
            .invoke(&method, self.inner.config.invoke_timeout())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(method = method.target(), error = %e, "Send failed");
                self.inner.record_error(ErrorEvent::connection(e.to_string()));
                Err(e)
            }
        }
    }

    /// Returns the connection if the state allows operations.
    fn live_connection(&self) -> Option<Connection> {
        if !self.state().is_connected() {
            return None;
        }
        self.inner.connection.lock().clone()
    }

    /// Records a group request made while not connected.
    fn reject_subscription(&self, method: &str, group: &GroupName) {
        let state = self.state();
        warn!(%group, %state, "{method} ignored while not connected");
        self.inner.record_error(ErrorEvent::subscription(
            group.as_str(),
            format!("{method} requires a connected client (state: {state})"),
        ));
    }
}

// ============================================================================
// ClientInner
// ============================================================================

impl ClientInner {
    /// Publishes a state transition.
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Connection state changed");
        }
    }

    /// Publishes a side-channel failure.
    fn record_error(&self, event: ErrorEvent) {
        // No receivers is fine
        let _ = self.errors.send(event);
    }

    /// Adds a group to the rejoin list unless `generation` went stale.
    ///
    /// Checked under the groups lock; `disconnect()` bumps the generation
    /// before taking the list.
    fn remember_group(&self, group: &GroupName, generation: u64) -> bool {
        let mut groups = self.groups.lock();
        if !self.is_current(generation) {
            return false;
        }
        if !groups.contains(group) {
            groups.push(group.clone());
        }
        true
    }

    /// Sends a decoded notification to every live subscriber.
    fn publish(&self, event: &NotificationEvent) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Removes a group from the rejoin list.
    fn forget_group(&self, group: &GroupName) {
        self.groups.lock().retain(|joined| joined != group);
    }

    /// Re-issues `JoinGroup` for every remembered group.
    async fn rejoin_groups(&self) {
        let groups = self.groups.lock().clone();
        if groups.is_empty() {
            return;
        }

        let Some(connection) = self.connection.lock().clone() else {
            return;
        };

        for group in groups {
            let method = HubMethod::JoinGroup(group.clone());
            match connection.invoke(&method, self.config.invoke_timeout()).await {
                Ok(_) => debug!(%group, "Rejoined group"),
                Err(e) => {
                    warn!(%group, error = %e, "Failed to rejoin group");
                    self.record_error(ErrorEvent::subscription(group.as_str(), e.to_string()));
                }
            }
        }
    }

    /// Returns `true` if `generation` is still current.
    #[inline]
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(supervisor) = self.supervisor.get_mut().take() {
            supervisor.abort();
        }

        if let Some(connection) = self.connection.get_mut().take() {
            let _ = connection.shutdown();
        }
    }
}

// ============================================================================
// Inbound Dispatch
// ============================================================================

/// Builds the handler that decodes notifications into the event stream.
///
/// Runs on the connection task, so events are published in wire order.
fn invocation_handler(inner: Weak<ClientInner>, generation: u64) -> InvocationHandler {
    Box::new(move |invocation: Invocation| {
        if !invocation.is_target(RECEIVE_NOTIFICATION) {
            trace!(method = %invocation.target, "Ignoring hub invocation");
            return;
        }

        let Some(inner) = inner.upgrade() else {
            return;
        };

        if !inner.is_current(generation) {
            trace!("Dropping notification from stale connection");
            return;
        }

        match NotificationEvent::decode(&invocation.arguments) {
            Ok(event) => {
                debug!(kind = %event.kind(), "Notification received");
                inner.publish(&event);
            }
            Err(e) => {
                warn!(error = %e, "Failed to decode notification");
                inner.record_error(ErrorEvent::Decode(e));
            }
        }
    })
}

// ============================================================================
// Reconnection
// ============================================================================

/// Watches the live connection and replaces it after an unexpected loss.
async fn supervise(
    weak: Weak<ClientInner>,
    generation: u64,
    mut closed: oneshot::Receiver<CloseReason>,
) {
    loop {
        let reason = closed.await.unwrap_or(CloseReason::Requested);

        let Some(inner) = weak.upgrade() else {
            return;
        };

        let guard = inner.lifecycle.lock().await;
        if !inner.is_current(generation) {
            return;
        }

        if !reason.allows_reconnect() {
            if matches!(reason, CloseReason::ServerClosed { .. }) {
                error!(%reason, "Hub refused reconnection");
                inner.connection.lock().take();
                inner.set_state(ConnectionState::Failed);
                inner.record_error(ErrorEvent::connection(reason.to_string()));
            }
            return;
        }

        warn!(%reason, "Hub connection lost, reconnecting");
        inner.connection.lock().take();
        inner.set_state(ConnectionState::Reconnecting);
        inner.record_error(ErrorEvent::connection(reason.to_string()));

        let policy = inner.config.reconnect().clone();
        drop(guard);
        drop(inner);

        match reconnect(&weak, generation, &policy).await {
            Some(next) => closed = next,
            None => return,
        }
    }
}

/// Retries until a connection is installed or the generation moves on.
///
/// Returns the close receiver of the new connection.
async fn reconnect(
    weak: &Weak<ClientInner>,
    generation: u64,
    policy: &ReconnectPolicy,
) -> Option<oneshot::Receiver<CloseReason>> {
    let mut attempt: u32 = 0;

    loop {
        let delay = policy.delay_for(attempt);
        attempt = attempt.saturating_add(1);

        debug!(attempt, delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
        sleep(delay).await;

        let inner = weak.upgrade()?;
        if !inner.is_current(generation) {
            return None;
        }

        let handler = invocation_handler(Weak::clone(weak), generation);
        match Connection::open(&inner.config, handler).await {
            Ok((connection, closed)) => {
                {
                    let _lifecycle = inner.lifecycle.lock().await;
                    if !inner.is_current(generation) {
                        let _ = connection.shutdown();
                        return None;
                    }

                    *inner.connection.lock() = Some(connection);
                    inner.set_state(ConnectionState::Connected);
                }

                info!(attempt, "Reconnected to notification hub");
                inner.rejoin_groups().await;
                return Some(closed);
            }
            Err(e) => {
                warn!(attempt, error = %e, "Reconnect attempt failed");
                inner.record_error(ErrorEvent::connection(e.to_string()));
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
