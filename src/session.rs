//! Binding between the signed-in user and the hub group.
//!
//! The hub routes a user's alerts to the group named after their numeric id.
//! [`NotificationSession`] asks a [`UserIdentity`] who is signed in and keeps
//! the client joined to exactly that group.
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use budget_notify::{HubClient, HubConfig, NotificationSession, Result, UserIdentity};
//! use budget_notify::identifiers::UserId;
//!
//! struct SignedIn(u64);
//!
//! #[async_trait]
//! impl UserIdentity for SignedIn {
//!     async fn current_user_id(&self) -> Option<UserId> {
//!         Some(UserId::new(self.0))
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let client = HubClient::new(HubConfig::builder().base_url("https://api.example.com").build()?);
//! let session = NotificationSession::new(client);
//!
//! session.start(&SignedIn(42)).await?;
//! // ... on logout
//! session.end().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::identifiers::{GroupName, UserId};
use crate::transport::HubClient;

// ============================================================================
// UserIdentity
// ============================================================================

/// Source of the signed-in user's id.
#[async_trait]
pub trait UserIdentity: Send + Sync {
    /// Returns the current user's id, or `None` when signed out.
    async fn current_user_id(&self) -> Option<UserId>;
}

#[async_trait]
impl UserIdentity for Option<UserId> {
    async fn current_user_id(&self) -> Option<UserId> {
        *self
    }
}

#[async_trait]
impl UserIdentity for UserId {
    async fn current_user_id(&self) -> Option<UserId> {
        Some(*self)
    }
}

// ============================================================================
// NotificationSession
// ============================================================================

/// Keeps a [`HubClient`] joined to the signed-in user's group.
#[derive(Debug)]
pub struct NotificationSession {
    client: HubClient,
    bound: Mutex<Option<GroupName>>,
}

impl NotificationSession {
    /// Wraps a client. Nothing is sent until [`start`](Self::start).
    #[must_use]
    pub fn new(client: HubClient) -> Self {
        Self {
            client,
            bound: Mutex::new(None),
        }
    }

    /// Returns the wrapped client.
    #[inline]
    #[must_use]
    pub fn client(&self) -> &HubClient {
        &self.client
    }

    /// Returns the group currently bound to the session.
    #[must_use]
    pub fn bound_group(&self) -> Option<GroupName> {
        self.bound.lock().clone()
    }

    /// Connects and joins the current user's group.
    ///
    /// Returns the joined group, or `None` when nobody is signed in (the
    /// client is still connected) or the join was a recorded no-op.
    ///
    /// # Errors
    ///
    /// Connection and invocation failures from the client.
    pub async fn start(&self, identity: &dyn UserIdentity) -> Result<Option<GroupName>> {
        self.client.connect().await?;

        let Some(user) = identity.current_user_id().await else {
            debug!("No signed-in user, session not bound");
            return Ok(None);
        };

        self.bind(user.group()).await
    }

    /// Moves the session to whoever is signed in now.
    ///
    /// Leaves the previous group first. Does nothing if the user did not
    /// change.
    ///
    /// # Errors
    ///
    /// Invocation failures from the client.
    pub async fn switch_user(&self, identity: &dyn UserIdentity) -> Result<Option<GroupName>> {
        let next = identity.current_user_id().await.map(|user| user.group());
        let previous = self.bound_group();

        if previous == next {
            return Ok(next);
        }

        if let Some(previous) = previous {
            self.release(&previous).await;
        }

        match next {
            Some(group) => self.bind(group).await,
            None => Ok(None),
        }
    }

    /// Leaves the bound group and disconnects.
    pub async fn end(&self) {
        if let Some(group) = self.bound_group() {
            self.release(&group).await;
        }

        self.client.disconnect().await;
        info!("Notification session ended");
    }

    /// Joins `group` and records it as bound.
    async fn bind(&self, group: GroupName) -> Result<Option<GroupName>> {
        if !self.client.join_group(group.clone()).await? {
            return Ok(None);
        }

        *self.bound.lock() = Some(group.clone());
        info!(%group, "Notification session bound");
        Ok(Some(group))
    }

    /// Leaves `group` and clears the binding.
    async fn release(&self, group: &GroupName) {
        if let Err(e) = self.client.leave_group(group.clone()).await {
            warn!(%group, error = %e, "Failed to leave session group");
        }
        self.bound.lock().take();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::HubConfig;

    fn session() -> NotificationSession {
        let config = HubConfig::builder()
            .base_url("http://127.0.0.1:9")
            .build()
            .expect("valid config");
        NotificationSession::new(HubClient::new(config))
    }

    #[tokio::test]
    async fn test_identity_impls() {
        assert_eq!(UserId::new(5).current_user_id().await, Some(UserId::new(5)));
        assert_eq!(None::<UserId>.current_user_id().await, None);
    }

    #[tokio::test]
    async fn test_switch_to_signed_out_is_unbound() {
        let session = session();
        let bound = tokio_test::assert_ok!(session.switch_user(&None::<UserId>).await);
        assert_eq!(bound, None);
        assert_eq!(session.bound_group(), None);
    }

    #[tokio::test]
    async fn test_end_without_start() {
        let session = session();
        session.end().await;
        assert_eq!(session.bound_group(), None);
    }
}
