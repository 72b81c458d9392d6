//! Builder pattern for hub configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use budget_notify::HubConfig;
//!
//! # fn example() -> budget_notify::Result<()> {
//! let config = HubConfig::builder()
//!     .base_url("http://localhost:5000")
//!     .invoke_timeout(Duration::from_secs(10))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

use super::{
    DEFAULT_ERROR_CAPACITY, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_HUB_PATH, DEFAULT_INVOKE_TIMEOUT,
    DEFAULT_KEEP_ALIVE_INTERVAL, DEFAULT_SERVER_TIMEOUT, HubConfig, MAX_ERROR_CAPACITY,
    ReconnectPolicy,
};

// ============================================================================
// HubConfigBuilder
// ============================================================================

/// Builder for a [`HubConfig`].
///
/// Use [`HubConfig::builder()`] to create a new builder.
#[derive(Debug, Clone)]
pub struct HubConfigBuilder {
    /// Backend base URL.
    base_url: Option<String>,
    /// Hub path below the base URL.
    hub_path: String,
    /// Handshake timeout.
    handshake_timeout: Duration,
    /// Invocation timeout.
    invoke_timeout: Duration,
    /// Keep-alive ping interval.
    keep_alive_interval: Duration,
    /// Server silence timeout.
    server_timeout: Duration,
    /// Error channel buffer size.
    error_capacity: usize,
    /// Reconnection schedule.
    reconnect: ReconnectPolicy,
}

impl Default for HubConfigBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            hub_path: DEFAULT_HUB_PATH.to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            invoke_timeout: DEFAULT_INVOKE_TIMEOUT,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            server_timeout: DEFAULT_SERVER_TIMEOUT,
            error_capacity: DEFAULT_ERROR_CAPACITY,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

// ============================================================================
// HubConfigBuilder Implementation
// ============================================================================

impl HubConfigBuilder {
    /// Creates a builder with default settings and no base URL.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backend base URL (`http`, `https`, `ws` or `wss`).
    #[inline]
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the hub path appended to the base URL.
    #[inline]
    #[must_use]
    pub fn hub_path(mut self, path: impl Into<String>) -> Self {
        self.hub_path = path.into();
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the invocation timeout.
    #[inline]
    #[must_use]
    pub fn invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    /// Sets the keep-alive ping interval.
    #[inline]
    #[must_use]
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Sets the silence after which the connection is considered lost.
    #[inline]
    #[must_use]
    pub fn server_timeout(mut self, timeout: Duration) -> Self {
        self.server_timeout = timeout;
        self
    }

    /// Sets the buffer size of the error side channel.
    #[inline]
    #[must_use]
    pub fn error_capacity(mut self, capacity: usize) -> Self {
        self.error_capacity = capacity;
        self
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the base URL is missing, uses an unsupported
    ///   scheme, or a timing setting is out of range
    /// - [`Error::Url`] if the base URL cannot be parsed
    pub fn build(self) -> Result<HubConfig> {
        let endpoint = self.resolve_endpoint()?;
        self.validate_timing()?;

        if !(1..=MAX_ERROR_CAPACITY).contains(&self.error_capacity) {
            return Err(Error::config(format!(
                "Error capacity must be between 1 and {MAX_ERROR_CAPACITY}, got {}",
                self.error_capacity
            )));
        }

        Ok(HubConfig {
            endpoint,
            handshake_timeout: self.handshake_timeout,
            invoke_timeout: self.invoke_timeout,
            keep_alive_interval: self.keep_alive_interval,
            server_timeout: self.server_timeout,
            error_capacity: self.error_capacity,
            reconnect: self.reconnect,
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

impl HubConfigBuilder {
    /// Resolves `{base_url}/{hub_path}` into a WebSocket URL.
    fn resolve_endpoint(&self) -> Result<Url> {
        let base = self.base_url.as_deref().ok_or_else(|| {
            Error::config(
                "Base URL is required. Use .base_url() to set it.\n\
                 Example: HubConfig::builder().base_url(\"https://api.example.com\")",
            )
        })?;

        let path = self.hub_path.trim_matches('/');
        if path.is_empty() {
            return Err(Error::config("Hub path must not be empty"));
        }

        let mut endpoint = Url::parse(&format!("{}/{}", base.trim_end_matches('/'), path))?;

        let scheme = match endpoint.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::config(format!(
                    "Unsupported URL scheme '{other}'. Expected http, https, ws or wss."
                )));
            }
        };

        endpoint
            .set_scheme(scheme)
            .map_err(|()| Error::config(format!("Cannot convert URL to {scheme}")))?;

        Ok(endpoint)
    }

    /// Validates timeouts and the reconnect policy.
    fn validate_timing(&self) -> Result<()> {
        if self.handshake_timeout.is_zero() || self.invoke_timeout.is_zero() {
            return Err(Error::config("Timeouts must be greater than zero"));
        }

        if self.keep_alive_interval.is_zero() {
            return Err(Error::config("Keep-alive interval must be greater than zero"));
        }

        if self.server_timeout <= self.keep_alive_interval {
            return Err(Error::config(format!(
                "Server timeout {:?} must exceed keep-alive interval {:?}",
                self.server_timeout, self.keep_alive_interval
            )));
        }

        self.reconnect.validate()
    }
}

// ============================================================================
// Tests
// ============================================================================
