//! Outbound hub method invocations.
//!
//! | Method | Arguments | Purpose |
//! |--------|-----------|---------|
//! | `JoinGroup` | `group` | Route the group's alerts to this connection |
//! | `LeaveGroup` | `group` | Stop routing the group's alerts |
//! | `SendMessage` | `user`, `message` | Diagnostic echo through the hub |
//! | `SendMessageToUser` | `user`, `message` | Diagnostic message to one user |

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::{Value, json};

use crate::identifiers::{GroupName, InvocationId};

use super::message::MESSAGE_TYPE_INVOCATION;

// ============================================================================
// HubMethod
// ============================================================================

/// A hub method the client can invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubMethod {
    /// Join a routing group.
    JoinGroup(GroupName),

    /// Leave a routing group.
    LeaveGroup(GroupName),

    /// Diagnostic broadcast.
    SendMessage {
        /// Sender shown by the hub.
        user: String,
        /// Message text.
        message: String,
    },

    /// Diagnostic message to a single user.
    SendMessageToUser {
        /// Recipient.
        user: String,
        /// Message text.
        message: String,
    },
}

impl HubMethod {
    /// Returns the hub method name.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &'static str {
        match self {
            Self::JoinGroup(_) => "JoinGroup",
            Self::LeaveGroup(_) => "LeaveGroup",
            Self::SendMessage { .. } => "SendMessage",
            Self::SendMessageToUser { .. } => "SendMessageToUser",
        }
    }

    /// Returns the positional arguments.
    #[must_use]
    pub fn arguments(&self) -> Vec<Value> {
        match self {
            Self::JoinGroup(group) | Self::LeaveGroup(group) => vec![json!(group.as_str())],
            Self::SendMessage { user, message } | Self::SendMessageToUser { user, message } => {
                vec![json!(user), json!(message)]
            }
        }
    }

    /// Returns the group this method targets, if any.
    #[inline]
    #[must_use]
    pub fn group(&self) -> Option<&GroupName> {
        match self {
            Self::JoinGroup(group) | Self::LeaveGroup(group) => Some(group),
            _ => None,
        }
    }
}

// ============================================================================
// OutboundInvocation
// ============================================================================

/// An invocation record sent from the client to the hub.
///
/// # Format
///
/// ```json
/// {
///   "type": 1,
///   "invocationId": "uuid",
///   "target": "JoinGroup",
///   "arguments": ["42"]
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct OutboundInvocation {
    /// Message type marker (always `1`).
    #[serde(rename = "type")]
    pub message_type: u8,

    /// Correlates the hub's completion.
    #[serde(rename = "invocationId")]
    pub invocation_id: InvocationId,

    /// Hub method name.
    pub target: &'static str,

    /// Positional arguments.
    pub arguments: Vec<Value>,
}

impl OutboundInvocation {
    /// Creates an invocation with a fresh ID.
    #[inline]
    #[must_use]
    pub fn new(method: &HubMethod) -> Self {
        Self {
            message_type: MESSAGE_TYPE_INVOCATION,
            invocation_id: InvocationId::generate(),
            target: method.target(),
            arguments: method.arguments(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
