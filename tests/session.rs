//! Session binding against the fake hub.

mod common;

use async_trait::async_trait;
use parking_lot::Mutex;

use budget_notify::identifiers::{GroupName, UserId};
use budget_notify::{ConnectionState, NotificationSession, UserIdentity};

use common::FakeHub;

/// Identity whose signed-in user can change mid-test.
struct SwitchableIdentity {
    user: Mutex<Option<UserId>>,
}

impl SwitchableIdentity {
    fn signed_in(id: u64) -> Self {
        Self {
            user: Mutex::new(Some(UserId::new(id))),
        }
    }

    fn set(&self, user: Option<u64>) {
        *self.user.lock() = user.map(UserId::new);
    }
}

#[async_trait]
impl UserIdentity for SwitchableIdentity {
    async fn current_user_id(&self) -> Option<UserId> {
        *self.user.lock()
    }
}

#[tokio::test]
async fn test_start_joins_user_group() {
    let hub = FakeHub::start().await;
    let session = NotificationSession::new(hub.client());

    let bound = session
        .start(&SwitchableIdentity::signed_in(42))
        .await
        .expect("start");

    assert_eq!(bound, Some(GroupName::from("42")));
    assert_eq!(session.bound_group(), Some(GroupName::from("42")));

    let join = hub.next_invocation().await;
    assert_eq!(join.target, "JoinGroup");
    assert_eq!(join.first_arg(), Some("42"));

    session.end().await;
}

#[tokio::test]
async fn test_start_signed_out_connects_without_group() {
    let hub = FakeHub::start().await;
    let session = NotificationSession::new(hub.client());

    let bound = session.start(&None::<UserId>).await.expect("start");

    assert_eq!(bound, None);
    assert_eq!(session.client().state(), ConnectionState::Connected);
    assert!(session.client().active_groups().is_empty());

    session.end().await;
}

#[tokio::test]
async fn test_switch_user_moves_group() {
    let hub = FakeHub::start().await;
    let session = NotificationSession::new(hub.client());
    let identity = SwitchableIdentity::signed_in(42);

    session.start(&identity).await.expect("start");
    assert_eq!(hub.next_invocation().await.target, "JoinGroup");

    identity.set(Some(7));
    let bound = session.switch_user(&identity).await.expect("switch");
    assert_eq!(bound, Some(GroupName::from("7")));

    let leave = hub.next_invocation().await;
    assert_eq!(leave.target, "LeaveGroup");
    assert_eq!(leave.first_arg(), Some("42"));

    let join = hub.next_invocation().await;
    assert_eq!(join.target, "JoinGroup");
    assert_eq!(join.first_arg(), Some("7"));

    assert_eq!(session.client().active_groups(), vec![GroupName::from("7")]);
    session.end().await;
}

#[tokio::test]
async fn test_end_leaves_and_disconnects() {
    let hub = FakeHub::start().await;
    let session = NotificationSession::new(hub.client());

    session
        .start(&SwitchableIdentity::signed_in(3))
        .await
        .expect("start");
    assert_eq!(hub.next_invocation().await.target, "JoinGroup");

    session.end().await;

    let leave = hub.next_invocation().await;
    assert_eq!(leave.target, "LeaveGroup");
    assert_eq!(leave.first_arg(), Some("3"));

    assert_eq!(session.bound_group(), None);
    assert_eq!(session.client().state(), ConnectionState::Disconnected);
}
