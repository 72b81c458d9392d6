//! Error types for the notification client.
//!
//! This module defines two families of errors:
//!
//! - [`enum@Error`] is returned from fallible operations (`connect`, `join_group`, ...).
//! - [`ErrorEvent`] is published on the client's error side channel so that
//!   failures happening off the caller's stack (reconnects, inbound decoding)
//!   are recorded without ever reaching the notification stream.
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::Url`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::Handshake`] |
//! | State | [`Error::NotConnected`], [`Error::Disposed`] |
//! | Invocation | [`Error::Invocation`], [`Error::InvocationTimeout`], [`Error::Protocol`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::InvocationId;
use crate::transport::ConnectionState;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned by [`HubConfigBuilder::build`](crate::HubConfigBuilder::build)
    /// when a setting is missing or out of range.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Hub URL could not be parsed.
    #[error("Invalid hub URL: {0}")]
    Url(#[from] url::ParseError),

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport could not be opened.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Handshake did not complete in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Connection closed while an operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Hub rejected the protocol handshake.
    #[error("Handshake rejected: {message}")]
    Handshake {
        /// Error reported by the hub.
        message: String,
    },

    // ========================================================================
    // State Errors
    // ========================================================================
    /// Operation requires a connected client.
    #[error("Not connected (state: {state})")]
    NotConnected {
        /// State the client was in when the call was made.
        state: ConnectionState,
    },

    /// Client was disposed and cannot be reused.
    #[error("Client disposed")]
    Disposed,

    // ========================================================================
    // Invocation Errors
    // ========================================================================
    /// Hub completed an invocation with an error.
    #[error("Invocation {target} failed: {message}")]
    Invocation {
        /// Hub method that was invoked.
        target: String,
        /// Error reported by the hub.
        message: String,
    },

    /// Hub did not complete an invocation in time.
    #[error("Invocation {invocation_id} timed out after {timeout_ms}ms")]
    InvocationTimeout {
        /// The invocation that timed out.
        invocation_id: InvocationId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Protocol violation or unexpected message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a handshake error.
    #[inline]
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Creates a not-connected error.
    #[inline]
    pub fn not_connected(state: ConnectionState) -> Self {
        Self::NotConnected { state }
    }

    /// Creates an invocation error.
    #[inline]
    pub fn invocation(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invocation {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Creates an invocation timeout error.
    #[inline]
    pub fn invocation_timeout(invocation_id: InvocationId, timeout_ms: u64) -> Self {
        Self::InvocationTimeout {
            invocation_id,
            timeout_ms,
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::InvocationTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::Handshake { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed once the client is (re)connected.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::NotConnected { .. }
                | Self::InvocationTimeout { .. }
        )
    }
}

// ============================================================================
// DecodeError
// ============================================================================

/// Why an inbound frame could not become a notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame carried no argument, or a `null` one.
    #[error("notification payload is missing")]
    MissingPayload,

    /// Frame was a string that is not valid JSON.
    #[error("notification payload is not valid JSON: {reason}")]
    MalformedPayload {
        /// Parser message.
        reason: String,
    },

    /// Frame had a shape that cannot carry a notification.
    #[error("unsupported notification payload: {shape}")]
    UnsupportedPayload {
        /// JSON type name of the payload.
        shape: &'static str,
    },
}

// ============================================================================
// ErrorEvent
// ============================================================================

/// A failure recorded on the client's error side channel.
///
/// These never travel on the notification stream, so presentation code cannot
/// mistake them for alerts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorEvent {
    /// Transport failed to open or was lost.
    #[error("connection error: {message}")]
    Connection {
        /// Description of the failure.
        message: String,
    },

    /// Group request issued while not connected, or rejected by the hub.
    #[error("subscription error for group {group}: {message}")]
    Subscription {
        /// Group involved.
        group: String,
        /// Description of the failure.
        message: String,
    },

    /// Inbound payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Failure while tearing the connection down.
    #[error("teardown error: {message}")]
    Teardown {
        /// Description of the failure.
        message: String,
    },
}

impl ErrorEvent {
    /// Creates a connection error event.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a subscription error event.
    #[inline]
    pub fn subscription(group: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscription {
            group: group.into(),
            message: message.into(),
        }
    }

    /// Creates a teardown error event.
    #[inline]
    pub fn teardown(message: impl Into<String>) -> Self {
        Self::Teardown {
            message: message.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
