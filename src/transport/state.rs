//! Connection state of a [`HubClient`](crate::HubClient).

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the hub connection.
///
/// ```text
///                 connect()              handshake ok
/// Disconnected ───────────────► Connecting ───────────► Connected
///      ▲                            │                    │    ▲
///      │ disconnect()               │ failure            │    │ reconnect ok
///      │                            ▼          transport │    │
///      └──────────────────────── Failed         lost     ▼    │
///                                                  Reconnecting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No transport, no pending work.
    #[default]
    Disconnected,
    /// `connect()` is opening the transport.
    Connecting,
    /// Handshake completed; group and send operations are legal.
    Connected,
    /// Transport was lost; the backoff loop is retrying.
    Reconnecting,
    /// `connect()` failed, or the hub refused further reconnects.
    Failed,
}

impl ConnectionState {
    /// Returns `true` if group and send operations are legal.
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns the lowercase state name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_only_connected_allows_operations() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::Reconnecting.is_connected());
        assert!(!ConnectionState::Failed.is_connected());
    }
}
