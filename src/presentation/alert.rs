//! Displayable alert derived from a notification.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Serialize;

use crate::notification::{NotificationEvent, NotificationKind};

// ============================================================================
// AlertStyle
// ============================================================================

/// Visual severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStyle {
    /// Approaching a limit.
    Warning,
    /// Limit passed.
    Critical,
    /// Informational.
    Info,
}

impl From<NotificationKind> for AlertStyle {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::BudgetWarning => Self::Warning,
            NotificationKind::BudgetExceeded => Self::Critical,
            NotificationKind::Generic => Self::Info,
        }
    }
}

// ============================================================================
// Alert
// ============================================================================

/// One alert, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    /// Source classification.
    pub kind: NotificationKind,
    /// Heading derived from `kind`.
    pub title: &'static str,
    /// Body text.
    pub message: String,
    /// Severity derived from `kind`.
    pub style: AlertStyle,
}

impl Alert {
    /// Builds the alert for an event.
    #[must_use]
    pub fn from_event(event: &NotificationEvent) -> Self {
        let kind = event.kind();
        Self {
            kind,
            title: title_for(kind),
            message: event.message().to_string(),
            style: AlertStyle::from(kind),
        }
    }
}

impl From<&NotificationEvent> for Alert {
    fn from(event: &NotificationEvent) -> Self {
        Self::from_event(event)
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// Returns the heading shown for a kind.
const fn title_for(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::BudgetWarning => "Budget warning",
        NotificationKind::BudgetExceeded => "Budget exceeded",
        NotificationKind::Generic => "Notification",
    }
}

// ============================================================================
// Tests
// ============================================================================
