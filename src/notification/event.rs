//! Canonical notification event.
//!
//! A [`NotificationEvent`] is what presentation code consumes. It is created
//! by the decoder, never mutated, and shown exactly once.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde_json::Value;

// ============================================================================
// Constants
// ============================================================================

/// Message shown when the payload carries no usable text.
pub const DEFAULT_MESSAGE: &str = "You have a new budget notification.";

// ============================================================================
// NotificationKind
// ============================================================================

/// Classification of a server-pushed alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum NotificationKind {
    /// Spending is approaching a budget limit.
    BudgetWarning,
    /// A budget limit has been passed.
    BudgetExceeded,
    /// Anything else, including unknown server tags.
    #[default]
    Generic,
}

impl NotificationKind {
    /// Maps a server tag onto a kind.
    ///
    /// Matching ignores case and any `_`, `-` or space separators, so
    /// `BudgetWarning`, `budget_warning` and `BUDGET-WARNING` are equivalent.
    /// Unknown tags map to [`NotificationKind::Generic`].
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        let normalized: String = tag
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "budgetwarning" => Self::BudgetWarning,
            "budgetexceeded" => Self::BudgetExceeded,
            _ => Self::Generic,
        }
    }

    /// Returns the canonical tag.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BudgetWarning => "BudgetWarning",
            Self::BudgetExceeded => "BudgetExceeded",
            Self::Generic => "Generic",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// NotificationEvent
// ============================================================================

/// One server-pushed alert, normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEvent {
    /// Classification.
    kind: NotificationKind,
    /// Text shown to the user.
    message: String,
    /// Payload exactly as received, kept for diagnostics.
    raw: Value,
}

impl NotificationEvent {
    /// Creates an event.
    ///
    /// A blank `message` is replaced by [`DEFAULT_MESSAGE`].
    #[must_use]
    pub fn new(kind: NotificationKind, message: impl Into<String>, raw: Value) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            DEFAULT_MESSAGE.to_string()
        } else {
            message
        };

        Self { kind, message, raw }
    }

    /// Returns the classification.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    /// Returns the user-facing text.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the original payload.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

// ============================================================================
// Tests
// ============================================================================
