//! Hub protocol message types.
//!
//! The hub speaks a JSON protocol over WebSocket. Every record is a JSON
//! object terminated by the ASCII record separator (`0x1E`); one WebSocket
//! text message may carry several records.
//!
//! # Protocol Overview
//!
//! | Message | Type | Direction | Purpose |
//! |---------|------|-----------|---------|
//! | `HandshakeRequest` | — | Client → Hub | Select `json` protocol, version 1 |
//! | `HandshakeResponse` | — | Hub → Client | Empty object or `error` |
//! | `Invocation` | `1` | Both | Call a method by name with positional arguments |
//! | `Completion` | `3` | Hub → Client | Result of a client invocation |
//! | `Ping` | `6` | Both | Keep-alive |
//! | `Close` | `7` | Hub → Client | Server is closing the connection |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `handshake` | Handshake request/response |
//! | `invocation` | Outbound hub methods |
//! | `message` | Inbound messages and record framing |

// ============================================================================
// Submodules
// ============================================================================

/// Handshake request and response.
pub mod handshake;

/// Outbound hub method invocations.
pub mod invocation;

/// Inbound hub messages and record framing.
pub mod message;

// ============================================================================
// Constants
// ============================================================================

/// Terminator appended to every JSON record.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Hub method the server invokes to deliver an alert.
pub const RECEIVE_NOTIFICATION: &str = "ReceiveNotification";

// ============================================================================
// Re-exports
// ============================================================================

pub use handshake::{HandshakeRequest, HandshakeResponse};
pub use invocation::{HubMethod, OutboundInvocation};
pub use message::{HubMessage, Invocation, encode_record, split_records};
