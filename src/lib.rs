//! Budget Notify - real-time budget alerts over a WebSocket hub.
//!
//! This library keeps a persistent connection to a server-side notification
//! hub, turns pushed budget alerts into typed events, and shows them to the
//! user one at a time.
//!
//! # Architecture
//!
//! ```text
//!  Hub ──frames──► HubClient ──decode──► stream ──► AlertFeed ──► presenter
//!                  (transport)       (NotificationEvent) (queue)
//!                      ▲
//!                      └── NotificationSession (join/leave the user's group)
//! ```
//!
//! - Frames are decoded inline on the connection task, so events reach the
//!   stream in wire order
//! - Failures go to a separate [`ErrorEvent`] channel, never to the alert
//!   stream
//! - Lost connections are retried forever and groups are re-joined
//!
//! # Quick Start
//!
//! ```no_run
//! use budget_notify::{Alert, AlertFeed, HubClient, HubConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = HubConfig::builder()
//!         .base_url("https://api.example.com")
//!         .build()?;
//!
//!     let client = HubClient::new(config);
//!     let feed = AlertFeed::attach(&client, |alert: &Alert| {
//!         println!("[{:?}] {}", alert.style, alert);
//!     });
//!
//!     client.connect().await?;
//!     client.join_group("42").await?;
//!
//!     // Later, when the user dismisses the alert
//!     feed.acknowledge();
//!
//!     client.dispose().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | [`HubConfig`], builder and [`ReconnectPolicy`] |
//! | [`error`] | [`Error`], [`ErrorEvent`], [`DecodeError`] |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`notification`] | [`NotificationEvent`] and payload decoding |
//! | [`presentation`] | One-at-a-time alert queue and feed |
//! | [`protocol`] | Hub wire format (internal) |
//! | [`session`] | User-to-group binding |
//! | [`transport`] | [`HubClient`] and WebSocket connection |

// ============================================================================
// Modules
// ============================================================================

/// Hub client configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Notification events and decoding.
pub mod notification;

/// Alert presentation queue.
pub mod presentation;

/// Hub protocol message types.
///
/// Internal module defining handshake, invocation and framing structures.
pub mod protocol;

/// User session binding.
pub mod session;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::{HubConfig, HubConfigBuilder, ReconnectPolicy};

// Error types
pub use error::{DecodeError, Error, ErrorEvent, Result};

// Identifier types
pub use identifiers::{GroupName, InvocationId, UserId};

// Notifications
pub use notification::{NotificationEvent, NotificationKind};

// Presentation
pub use presentation::{
    Alert, AlertFeed, AlertPresenter, AlertStyle, ChannelPresenter, PresentationQueue, QueueState,
};

// Session
pub use session::{NotificationSession, UserIdentity};

// Transport
pub use transport::{ConnectionState, HubClient};
