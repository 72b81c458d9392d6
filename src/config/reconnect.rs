//! Reconnection backoff policy.
//!
//! The hub outlives any single app session, so the client never gives up:
//! the policy only decides how long to wait before the next attempt.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use budget_notify::ReconnectPolicy;
//!
//! let policy = ReconnectPolicy::exponential(
//!     Duration::from_secs(1),
//!     Duration::from_secs(30),
//!     2.0,
//! );
//!
//! assert_eq!(policy.delay_for(0), Duration::from_secs(1));
//! assert_eq!(policy.delay_for(3), Duration::from_secs(8));
//! assert_eq!(policy.delay_for(10), Duration::from_secs(30));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// First retry delay of the default policy.
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Delay cap of the default policy.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Growth factor of the default policy.
const DEFAULT_FACTOR: f64 = 2.0;

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Delay schedule between reconnection attempts.
///
/// Attempts are numbered from zero; `delay_for` never decreases as the attempt
/// number grows, and never exceeds the configured cap.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPolicy {
    /// Same delay before every attempt.
    Fixed(Duration),

    /// `initial * factor^attempt`, capped at `max`.
    Exponential {
        /// Delay before the first attempt.
        initial: Duration,
        /// Upper bound for any delay.
        max: Duration,
        /// Multiplier applied per attempt.
        factor: f64,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Exponential {
            initial: DEFAULT_INITIAL_DELAY,
            max: DEFAULT_MAX_DELAY,
            factor: DEFAULT_FACTOR,
        }
    }
}

impl ReconnectPolicy {
    /// Creates a fixed-delay policy.
    #[inline]
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self::Fixed(delay)
    }

    /// Creates an exponential policy.
    #[inline]
    #[must_use]
    pub const fn exponential(initial: Duration, max: Duration, factor: f64) -> Self {
        Self::Exponential {
            initial,
            max,
            factor,
        }
    }

    /// Returns the delay to wait before attempt number `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential {
                initial,
                max,
                factor,
            } => {
                // powi saturates to +inf, which min() then clamps
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let secs = initial.as_secs_f64() * factor.powi(exponent);
                if secs.is_finite() && secs < max.as_secs_f64() {
                    Duration::from_secs_f64(secs)
                } else {
                    max
                }
            }
        }
    }

    /// Checks that the policy can produce usable delays.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for zero delays, a factor below one, or an
    /// initial delay above the cap.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Fixed(delay) => {
                if delay.is_zero() {
                    return Err(Error::config("Reconnect delay must be greater than zero"));
                }
            }
            Self::Exponential {
                initial,
                max,
                factor,
            } => {
                if initial.is_zero() {
                    return Err(Error::config(
                        "Reconnect initial delay must be greater than zero",
                    ));
                }
                if initial > max {
                    return Err(Error::config(format!(
                        "Reconnect initial delay {initial:?} exceeds max delay {max:?}"
                    )));
                }
                if !factor.is_finite() || factor < 1.0 {
                    return Err(Error::config(format!(
                        "Reconnect factor must be a finite number >= 1.0, got {factor}"
                    )));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
