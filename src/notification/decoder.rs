//! Inbound payload decoding.
//!
//! Turns the arguments of one `ReceiveNotification` frame into exactly one
//! [`NotificationEvent`] or a [`DecodeError`].
//!
//! # Accepted Shapes
//!
//! | Payload | Outcome |
//! |---------|---------|
//! | no argument, `null`, blank string | [`DecodeError::MissingPayload`] |
//! | JSON object | mapped directly |
//! | string holding a JSON object | parsed, then mapped |
//! | string that is not JSON | [`DecodeError::MalformedPayload`] |
//! | anything else | [`DecodeError::UnsupportedPayload`] |
//!
//! Field extraction is tolerant: the kind defaults to `Generic` and the
//! message to [`DEFAULT_MESSAGE`](super::event::DEFAULT_MESSAGE).

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};

use crate::error::DecodeError;

use super::event::{NotificationEvent, NotificationKind};

// ============================================================================
// Constants
// ============================================================================

/// Keys probed, in order, for the kind tag.
const KIND_KEYS: &[&str] = &["type", "kind", "tipo"];

/// Keys probed, in order, for the message text.
const MESSAGE_KEYS: &[&str] = &["message", "mensaje", "body"];

// ============================================================================
// Decoding
// ============================================================================

impl NotificationEvent {
    /// Decodes the positional arguments of a notification frame.
    ///
    /// Only the first argument is considered.
    ///
    /// # Errors
    ///
    /// See the module table.
    pub fn decode(arguments: &[Value]) -> Result<Self, DecodeError> {
        let payload = arguments.first().ok_or(DecodeError::MissingPayload)?;
        Self::decode_payload(payload)
    }

    /// Decodes a single payload value.
    ///
    /// # Errors
    ///
    /// See the module table.
    pub fn decode_payload(payload: &Value) -> Result<Self, DecodeError> {
        match payload {
            Value::Null => Err(DecodeError::MissingPayload),

            Value::Object(fields) => Ok(Self::from_fields(fields, payload.clone())),

            Value::String(text) => {
                if text.trim().is_empty() {
                    return Err(DecodeError::MissingPayload);
                }

                let parsed: Value =
                    serde_json::from_str(text).map_err(|e| DecodeError::MalformedPayload {
                        reason: e.to_string(),
                    })?;

                match parsed {
                    Value::Object(fields) => Ok(Self::from_fields(&fields, payload.clone())),
                    Value::Null => Err(DecodeError::MissingPayload),
                    other => Err(DecodeError::UnsupportedPayload {
                        shape: shape_name(&other),
                    }),
                }
            }

            other => Err(DecodeError::UnsupportedPayload {
                shape: shape_name(other),
            }),
        }
    }

    /// Maps object fields onto an event.
    fn from_fields(fields: &Map<String, Value>, raw: Value) -> Self {
        let kind = first_string(fields, KIND_KEYS)
            .map(NotificationKind::from_tag)
            .unwrap_or_default();

        let message = first_string(fields, MESSAGE_KEYS).unwrap_or_default();

        Self::new(kind, message, raw)
    }
}

/// Returns the first non-blank string value among `keys`.
fn first_string<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| fields.get(*key).and_then(Value::as_str))
        .find(|value| !value.trim().is_empty())
}

/// Returns the JSON type name of a value.
fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================
