//! Hub client configuration.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`HubConfig`] | Validated settings consumed by [`HubClient`](crate::HubClient) |
//! | [`HubConfigBuilder`] | Fluent builder with validation |
//! | [`ReconnectPolicy`] | Backoff schedule between reconnect attempts |
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use budget_notify::{HubConfig, ReconnectPolicy};
//!
//! # fn example() -> budget_notify::Result<()> {
//! let config = HubConfig::builder()
//!     .base_url("https://api.example.com")
//!     .reconnect(ReconnectPolicy::fixed(Duration::from_secs(5)))
//!     .build()?;
//!
//! assert_eq!(config.endpoint().as_str(), "wss://api.example.com/notificationHub");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for [`HubConfig`].
pub mod builder;

/// Reconnection backoff policy.
pub mod reconnect;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::HubConfigBuilder;
pub use reconnect::ReconnectPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Hub path appended to the base URL.
pub const DEFAULT_HUB_PATH: &str = "notificationHub";

/// Time allowed for the transport and protocol handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Time allowed for the hub to complete an invocation.
pub const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between client pings.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Silence after which the connection is considered lost.
pub const DEFAULT_SERVER_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffer size of the error broadcast channel.
pub const DEFAULT_ERROR_CAPACITY: usize = 256;

/// Largest accepted error channel buffer.
pub const MAX_ERROR_CAPACITY: usize = 1 << 16;

// ============================================================================
// HubConfig
// ============================================================================

/// Validated hub client settings.
///
/// Built with [`HubConfig::builder()`].
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Resolved WebSocket endpoint of the hub.
    pub(crate) endpoint: Url,
    /// Handshake timeout.
    pub(crate) handshake_timeout: Duration,
    /// Invocation timeout.
    pub(crate) invoke_timeout: Duration,
    /// Keep-alive ping interval.
    pub(crate) keep_alive_interval: Duration,
    /// Server silence timeout.
    pub(crate) server_timeout: Duration,
    /// Error channel buffer size.
    pub(crate) error_capacity: usize,
    /// Reconnection schedule.
    pub(crate) reconnect: ReconnectPolicy,
}

impl HubConfig {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> HubConfigBuilder {
        HubConfigBuilder::new()
    }

    /// Returns the WebSocket endpoint of the hub.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the handshake timeout.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Returns the invocation timeout.
    #[inline]
    #[must_use]
    pub fn invoke_timeout(&self) -> Duration {
        self.invoke_timeout
    }

    /// Returns the keep-alive ping interval.
    #[inline]
    #[must_use]
    pub fn keep_alive_interval(&self) -> Duration {
        self.keep_alive_interval
    }

    /// Returns the server silence timeout.
    #[inline]
    #[must_use]
    pub fn server_timeout(&self) -> Duration {
        self.server_timeout
    }

    /// Returns the error channel buffer size.
    ///
    /// Notifications are not bounded by it; each subscriber gets its own
    /// unbounded stream.
    #[inline]
    #[must_use]
    pub fn error_capacity(&self) -> usize {
        self.error_capacity
    }

    /// Returns the reconnection policy.
    #[inline]
    #[must_use]
    pub fn reconnect(&self) -> &ReconnectPolicy {
        &self.reconnect
    }
}
