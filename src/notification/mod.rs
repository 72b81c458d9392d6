//! Budget notifications.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | [`NotificationEvent`] and [`NotificationKind`] |
//! | `decoder` | Frame → event normalization |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound payload decoding.
pub mod decoder;

/// Canonical event types.
pub mod event;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{DEFAULT_MESSAGE, NotificationEvent, NotificationKind};
