//! WebSocket transport to the notification hub.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌─────────────────┐
//! │  HubClient       │                              │  Notification   │
//! │                  │         WebSocket            │  Hub            │
//! │  supervisor      │◄────────────────────────────►│                 │
//! │  → Connection    │   {baseUrl}/notificationHub  │  groups: userId │
//! │                  │                              │                 │
//! └──────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `HubClient::connect` - `Connecting`, open socket, protocol handshake
//! 2. `Connection` event loop - dispatch records, keep-alive, completions
//! 3. Transport lost - supervisor moves to `Reconnecting`, retries, re-joins
//! 4. `HubClient::disconnect` - cancel retries, leave groups, close socket
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `client` | State machine, groups, reconnection |
//! | `connection` | WebSocket connection and event loop |
//! | `state` | [`ConnectionState`] |

// ============================================================================
// Submodules
// ============================================================================

/// Hub client with reconnection.
pub mod client;

/// WebSocket connection and event loop.
pub mod connection;

/// Connection state machine.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::HubClient;
pub use connection::{CloseReason, Connection, InvocationHandler};
pub use state::ConnectionState;
