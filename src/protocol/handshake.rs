//! Protocol handshake.
//!
//! The first record a client sends selects the protocol; the first record the
//! hub sends accepts or rejects it.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// HandshakeRequest
// ============================================================================

/// Handshake sent right after the WebSocket opens.
///
/// # Format
///
/// ```json
/// { "protocol": "json", "version": 1 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandshakeRequest {
    /// Protocol name.
    pub protocol: &'static str,
    /// Protocol version.
    pub version: u32,
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self {
            protocol: "json",
            version: 1,
        }
    }
}

// ============================================================================
// HandshakeResponse
// ============================================================================

/// Hub answer to the handshake.
///
/// An empty object means success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HandshakeResponse {
    /// Rejection reason, if any.
    #[serde(default)]
    pub error: Option<String>,
}

impl HandshakeResponse {
    /// Parses a handshake record and turns a rejection into an error.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the record is not a JSON object
    /// - [`Error::Handshake`] if the hub rejected the handshake
    pub fn parse(record: &str) -> Result<Self> {
        let response: Self = serde_json::from_str(record)?;
        match response.error {
            Some(message) => Err(Error::handshake(message)),
            None => Ok(response),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_format() {
        let json = serde_json::to_string(&HandshakeRequest::default()).expect("serialize");
        assert_eq!(json, r#"{"protocol":"json","version":1}"#);
    }

    #[test]
    fn test_empty_response_accepted() {
        assert!(HandshakeResponse::parse("{}").is_ok());
    }

    #[test]
    fn test_error_response_rejected() {
        let err = HandshakeResponse::parse(r#"{"error":"Requested protocol 'json' is not available."}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Handshake { .. }));
        assert!(err.to_string().contains("not available"));
    }

    #[test]
    fn test_garbage_response() {
        assert!(matches!(
            HandshakeResponse::parse("hello"),
            Err(Error::Json(_))
        ));
    }
}
