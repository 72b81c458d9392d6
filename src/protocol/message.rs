//! Inbound hub messages and record framing.
//!
//! Every record carries a numeric `type`; fields that do not apply to a type
//! are simply absent.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

use super::RECORD_SEPARATOR;

// ============================================================================
// Constants
// ============================================================================

/// Invocation message type.
pub const MESSAGE_TYPE_INVOCATION: u8 = 1;

/// Completion message type.
pub const MESSAGE_TYPE_COMPLETION: u8 = 3;

/// Ping message type.
pub const MESSAGE_TYPE_PING: u8 = 6;

/// Close message type.
pub const MESSAGE_TYPE_CLOSE: u8 = 7;

/// Pre-encoded ping record.
pub const PING_RECORD: &str = "{\"type\":6}\u{1e}";

// ============================================================================
// Framing
// ============================================================================

/// Splits a WebSocket text payload into its JSON records.
///
/// Empty fragments (including the one after the trailing separator) are
/// skipped.
pub fn split_records(text: &str) -> impl Iterator<Item = &str> {
    text.split(RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|record| !record.is_empty())
}

/// Serializes a value and appends the record separator.
///
/// # Errors
///
/// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
pub fn encode_record<T: Serialize>(value: &T) -> Result<String> {
    let mut record = serde_json::to_string(value)?;
    record.push(RECORD_SEPARATOR);
    Ok(record)
}

// ============================================================================
// Invocation
// ============================================================================

/// A method call pushed by the hub.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Set when the hub expects a result (unused by alert delivery).
    pub invocation_id: Option<String>,

    /// Method name, e.g. `ReceiveNotification`.
    pub target: String,

    /// Positional arguments.
    pub arguments: Vec<Value>,
}

impl Invocation {
    /// Returns `true` if this invocation targets `method` (case-insensitive).
    #[inline]
    #[must_use]
    pub fn is_target(&self, method: &str) -> bool {
        self.target.eq_ignore_ascii_case(method)
    }
}

// ============================================================================
// HubMessage
// ============================================================================

/// A parsed inbound record.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Server-to-client method call.
    Invocation(Invocation),

    /// Result of a client invocation.
    Completion {
        /// Echo of the client's invocation ID.
        invocation_id: String,
        /// Return value, if any.
        result: Option<Value>,
        /// Error message if the invocation failed.
        error: Option<String>,
    },

    /// Keep-alive.
    Ping,

    /// Server is closing the connection.
    Close {
        /// Reason given by the server.
        error: Option<String>,
        /// Whether the server invites a reconnect; `None` when unspecified.
        allow_reconnect: Option<bool>,
    },

    /// A message type this client does not handle (streaming, acks, ...).
    Other {
        /// The numeric type.
        message_type: u8,
    },
}

/// Wire representation shared by all message types.
#[derive(Debug, Deserialize)]
struct RawMessage {
    /// Numeric message type.
    #[serde(rename = "type")]
    message_type: u8,

    /// Invocation ID.
    #[serde(rename = "invocationId", default)]
    invocation_id: Option<String>,

    /// Invocation target.
    #[serde(default)]
    target: Option<String>,

    /// Invocation arguments.
    #[serde(default)]
    arguments: Option<Vec<Value>>,

    /// Completion result.
    #[serde(default)]
    result: Option<Value>,

    /// Completion or close error.
    #[serde(default)]
    error: Option<String>,

    /// Close reconnect hint.
    #[serde(rename = "allowReconnect", default)]
    allow_reconnect: Option<bool>,
}

impl HubMessage {
    /// Parses one record.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`](crate::Error::Json) if the record is not a JSON
    ///   object with a numeric `type`
    /// - [`Error::Protocol`](crate::Error::Protocol) if a required field is
    ///   missing for the message type
    pub fn parse(record: &str) -> Result<Self> {
        let raw: RawMessage = serde_json::from_str(record)?;

        let message = match raw.message_type {
            MESSAGE_TYPE_INVOCATION => {
                let target = raw
                    .target
                    .ok_or_else(|| Error::protocol("Invocation without target"))?;
                Self::Invocation(Invocation {
                    invocation_id: raw.invocation_id,
                    target,
                    arguments: raw.arguments.unwrap_or_default(),
                })
            }

            MESSAGE_TYPE_COMPLETION => {
                let invocation_id = raw
                    .invocation_id
                    .ok_or_else(|| Error::protocol("Completion without invocationId"))?;
                Self::Completion {
                    invocation_id,
                    result: raw.result,
                    error: raw.error,
                }
            }

            MESSAGE_TYPE_PING => Self::Ping,

            MESSAGE_TYPE_CLOSE => Self::Close {
                error: raw.error,
                allow_reconnect: raw.allow_reconnect,
            },

            message_type => Self::Other { message_type },
        };

        Ok(message)
    }
}

// ============================================================================
// Tests
// ============================================================================
