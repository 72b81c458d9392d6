//! Alert presentation.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PresentationQueue`] | FIFO showing one alert at a time |
//! | [`AlertFeed`] | Task draining a [`HubClient`](crate::HubClient) into a queue |
//! | [`AlertPresenter`] | Display side effect |
//! | [`Alert`] | Title, message and style derived from an event |
//!
//! # Example
//!
//! ```no_run
//! use budget_notify::{Alert, AlertFeed, HubClient, HubConfig, Result};
//!
//! # async fn example() -> Result<()> {
//! let client = HubClient::new(HubConfig::builder().base_url("https://api.example.com").build()?);
//! let feed = AlertFeed::attach(&client, |alert: &Alert| println!("{alert}"));
//!
//! client.connect().await?;
//! client.join_group("42").await?;
//!
//! // Called when the user dismisses the alert
//! feed.acknowledge();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Displayable alert.
pub mod alert;

/// Background feed task.
pub mod feed;

/// One-at-a-time queue.
pub mod queue;

// ============================================================================
// Re-exports
// ============================================================================

pub use alert::{Alert, AlertStyle};
pub use feed::AlertFeed;
pub use queue::{AlertPresenter, ChannelPresenter, PresentationQueue, QueueState};
