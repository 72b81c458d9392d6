//! Hub client integration tests against an in-process fake hub.

mod common;

use std::time::Duration;

use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};

use budget_notify::{
    AlertFeed, AlertStyle, ChannelPresenter, ConnectionState, Error, ErrorEvent, HubClient,
    HubConfig, NotificationKind, QueueState,
};

use common::{FakeHub, WAIT, notification_record, wait_for_state};

/// Time after which a missing alert is considered never delivered.
const QUIET: Duration = Duration::from_millis(200);

// ============================================================================
// Connection Lifecycle
// ============================================================================

#[tokio::test]
async fn test_connect_twice_performs_one_handshake() {
    let hub = FakeHub::start().await;
    let client = hub.client();

    client.connect().await.expect("first connect");
    client.connect().await.expect("second connect is a no-op");

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(hub.handshake_count(), 1);

    assert!(client.join_group("42").await.expect("join"));
    assert!(client.join_group("42").await.expect("join again"));
    assert_eq!(client.active_groups().len(), 1);

    client.dispose().await;
}

#[tokio::test]
async fn test_connect_refused_goes_failed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let config = HubConfig::builder()
        .base_url(format!("http://127.0.0.1:{port}"))
        .build()
        .expect("valid config");
    let client = HubClient::new(config);
    let mut errors = client.errors();

    let err = client.connect().await.expect_err("nothing listening");
    assert!(err.is_connection_error());
    assert_eq!(client.state(), ConnectionState::Failed);
    assert!(matches!(errors.try_recv(), Ok(ErrorEvent::Connection { .. })));

    // Disconnect is safe from Failed
    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_rejected_handshake() {
    let hub = FakeHub::rejecting("protocol not supported").await;
    let client = hub.client();

    let err = client.connect().await.expect_err("handshake rejected");
    assert!(matches!(err, Error::Handshake { .. }));
    assert_eq!(client.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn test_join_before_connect_is_noop() {
    let hub = FakeHub::start().await;
    let client = hub.client();
    let (presenter, _alerts) = ChannelPresenter::channel();
    let feed = AlertFeed::attach(&client, presenter);
    let mut errors = client.errors();

    assert!(!client.join_group("42").await.expect("no error"));
    assert!(matches!(
        errors.try_recv(),
        Ok(ErrorEvent::Subscription { .. })
    ));

    assert!(hub.try_next_invocation(QUIET).await.is_none());
    assert_eq!(feed.state(), QueueState::Idle);
    assert_eq!(feed.pending_len(), 0);
}

// ============================================================================
// Notifications
// ============================================================================

#[tokio::test]
async fn test_budget_warning_reaches_presenter() {
    let hub = FakeHub::start().await;
    let client = hub.client();
    let (presenter, mut alerts) = ChannelPresenter::channel();
    let _feed = AlertFeed::attach(&client, presenter);

    client.connect().await.expect("connect");
    assert!(hub.push_notification(json!({ "type": "BudgetWarning", "mensaje": "90% usado" })));

    let alert = timeout(WAIT, alerts.recv())
        .await
        .expect("alert in time")
        .expect("feed alive");

    assert_eq!(alert.kind, NotificationKind::BudgetWarning);
    assert_eq!(alert.message, "90% usado");
    assert_eq!(alert.style, AlertStyle::Warning);

    client.dispose().await;
}

#[tokio::test]
async fn test_rapid_frames_shown_in_order() {
    let hub = FakeHub::start().await;
    let client = hub.client();
    let (presenter, mut alerts) = ChannelPresenter::channel();
    let feed = AlertFeed::attach(&client, presenter);

    client.connect().await.expect("connect");

    // Three records in one frame, plus a JSON-string payload
    assert!(hub.push_records(&[
        notification_record(json!({ "type": "BudgetWarning", "message": "first" })),
        notification_record(json!({ "type": "BudgetExceeded", "message": "second" })),
    ]));
    assert!(hub.push_notification(json!(r#"{"message":"third"}"#)));

    let first = timeout(WAIT, alerts.recv()).await.expect("in time").expect("alive");
    assert_eq!(first.message, "first");

    timeout(WAIT, async {
        while feed.pending_len() < 2 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("remaining alerts queued");

    // Nothing else is shown until acknowledged
    assert!(alerts.try_recv().is_err());

    for expected in ["second", "third"] {
        assert!(feed.acknowledge());
        let alert = alerts.try_recv().expect("next alert presented on acknowledge");
        assert_eq!(alert.message, expected);
    }

    assert!(feed.acknowledge());
    assert_eq!(feed.state(), QueueState::Idle);
    assert_eq!(feed.presented_count(), 3);

    client.dispose().await;
}

#[tokio::test]
async fn test_single_frame_burst_is_shown_without_loss() {
    use budget_notify::config::DEFAULT_ERROR_CAPACITY;

    let hub = FakeHub::start().await;
    let client = hub.client();
    let (presenter, mut alerts) = ChannelPresenter::channel();
    let feed = AlertFeed::attach(&client, presenter);

    client.connect().await.expect("connect");

    let burst = DEFAULT_ERROR_CAPACITY + 44;
    let records: Vec<_> = (0..burst)
        .map(|i| {
            notification_record(json!({ "type": "BudgetWarning", "message": format!("alert {i}") }))
        })
        .collect();
    assert!(hub.push_records(&records));

    let first = timeout(WAIT, alerts.recv()).await.expect("in time").expect("alive");
    assert_eq!(first.message, "alert 0");

    timeout(WAIT, async {
        while feed.pending_len() < burst - 1 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("whole burst queued");

    for i in 1..burst {
        assert!(feed.acknowledge());
        let alert = alerts.try_recv().expect("next alert presented on acknowledge");
        assert_eq!(alert.message, format!("alert {i}"));
    }

    assert!(feed.acknowledge());
    assert_eq!(feed.state(), QueueState::Idle);
    assert_eq!(feed.presented_count(), burst as u64);

    client.dispose().await;
}

#[tokio::test]
async fn test_malformed_payload_is_recorded_not_shown() {
    let hub = FakeHub::start().await;
    let client = hub.client();
    let mut errors = client.errors();
    let (presenter, mut alerts) = ChannelPresenter::channel();
    let feed = AlertFeed::attach(&client, presenter);

    client.connect().await.expect("connect");
    assert!(hub.push_notification(json!("not json")));

    let error = timeout(WAIT, errors.recv()).await.expect("in time").expect("alive");
    assert!(matches!(error, ErrorEvent::Decode(_)));

    assert!(timeout(QUIET, alerts.recv()).await.is_err());
    assert_eq!(feed.state(), QueueState::Idle);

    // The pipeline keeps working afterwards
    assert!(hub.push_notification(json!({ "message": "still alive" })));
    let alert = timeout(WAIT, alerts.recv()).await.expect("in time").expect("alive");
    assert_eq!(alert.kind, NotificationKind::Generic);
    assert_eq!(client.state(), ConnectionState::Connected);

    client.dispose().await;
}

#[tokio::test]
async fn test_unrelated_invocations_are_ignored() {
    let hub = FakeHub::start().await;
    let client = hub.client();
    let mut events = client.subscribe();

    client.connect().await.expect("connect");
    assert!(hub.push_records(&[
        json!({ "type": 1, "target": "SomethingElse", "arguments": [{ "message": "x" }] }),
        json!({ "type": 6 }),
        notification_record(json!({ "message": "wanted" })),
    ]));

    let event = timeout(WAIT, events.recv()).await.expect("in time").expect("alive");
    assert_eq!(event.message(), "wanted");

    client.dispose().await;
}

// ============================================================================
// Reconnection
// ============================================================================

#[tokio::test]
async fn test_transport_drop_reconnects_and_rejoins() {
    let hub = FakeHub::start().await;
    let client = hub.client();
    let mut errors = client.errors();

    client.connect().await.expect("connect");
    assert!(client.join_group("42").await.expect("join"));

    let join = hub.next_invocation().await;
    assert_eq!(join.target, "JoinGroup");
    assert_eq!(join.first_arg(), Some("42"));

    assert!(hub.drop_connection());

    let loss = timeout(WAIT, errors.recv()).await.expect("in time").expect("alive");
    assert!(matches!(loss, ErrorEvent::Connection { .. }));

    let rejoin = hub.next_invocation().await;
    assert_eq!(rejoin.target, "JoinGroup");
    assert_eq!(rejoin.first_arg(), Some("42"));

    wait_for_state(&client, ConnectionState::Connected).await;
    assert_eq!(hub.handshake_count(), 2);

    // Notifications flow over the new connection
    let mut events = client.subscribe();
    assert!(hub.push_notification(json!({ "type": "BudgetExceeded", "message": "over" })));
    let event = timeout(WAIT, events.recv()).await.expect("in time").expect("alive");
    assert_eq!(event.kind(), NotificationKind::BudgetExceeded);

    client.dispose().await;
}

#[tokio::test]
async fn test_operations_fail_fast_while_reconnecting() {
    let hub = FakeHub::start().await;
    let config = HubConfig::builder()
        .base_url(hub.base_url())
        .reconnect(budget_notify::ReconnectPolicy::fixed(Duration::from_secs(2)))
        .build()
        .expect("valid config");
    let client = HubClient::new(config);

    client.connect().await.expect("connect");
    assert!(hub.drop_connection());
    wait_for_state(&client, ConnectionState::Reconnecting).await;

    assert!(!client.join_group("7").await.expect("recorded no-op"));
    assert!(matches!(
        client.send_message("tester", "hello").await,
        Err(Error::NotConnected {
            state: ConnectionState::Reconnecting
        })
    ));

    // connect() leaves the backoff loop in charge
    client.connect().await.expect("no-op while reconnecting");
    assert_eq!(client.state(), ConnectionState::Reconnecting);

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    sleep(Duration::from_millis(2500)).await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(hub.handshake_count(), 1);
}

#[tokio::test]
async fn test_server_close_without_reconnect_goes_failed() {
    let hub = FakeHub::start().await;
    let client = hub.client();

    client.connect().await.expect("connect");
    assert!(hub.close(false));

    wait_for_state(&client, ConnectionState::Failed).await;
    sleep(QUIET).await;
    assert_eq!(hub.handshake_count(), 1);
}

#[tokio::test]
async fn test_server_close_allowing_reconnect() {
    let hub = FakeHub::start().await;
    let client = hub.client();

    client.connect().await.expect("connect");
    assert!(hub.close(true));

    hub.wait_for_connections(2).await;
    wait_for_state(&client, ConnectionState::Connected).await;

    client.dispose().await;
}

// ============================================================================
// Disconnect
// ============================================================================

#[tokio::test]
async fn test_no_alerts_after_disconnect() {
    let hub = FakeHub::start().await;
    let client = hub.client();
    let (presenter, mut alerts) = ChannelPresenter::channel();
    let feed = AlertFeed::attach(&client, presenter);

    client.connect().await.expect("connect");
    assert!(client.join_group("42").await.expect("join"));
    assert_eq!(hub.next_invocation().await.target, "JoinGroup");

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(client.active_groups().is_empty());

    let leave = hub.next_invocation().await;
    assert_eq!(leave.target, "LeaveGroup");
    assert_eq!(leave.first_arg(), Some("42"));

    hub.push_notification(json!({ "type": "BudgetWarning", "message": "late" }));
    assert!(timeout(QUIET, alerts.recv()).await.is_err());
    assert_eq!(feed.presented_count(), 0);

    // Idempotent
    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_dispose_rejects_connect() {
    let hub = FakeHub::start().await;
    let client = hub.client();

    client.connect().await.expect("connect");
    client.dispose().await;

    assert!(client.is_disposed());
    assert!(matches!(client.connect().await, Err(Error::Disposed)));
    assert_eq!(hub.handshake_count(), 1);
}

#[tokio::test]
async fn test_diagnostic_messages() {
    let hub = FakeHub::start().await;
    let client = hub.client();

    client.connect().await.expect("connect");
    client.send_message("tester", "hello").await.expect("send");
    client
        .send_message_to_user("7", "direct")
        .await
        .expect("send to user");

    let broadcast = hub.next_invocation().await;
    assert_eq!(broadcast.target, "SendMessage");
    assert_eq!(broadcast.arguments, vec![json!("tester"), json!("hello")]);

    let direct = hub.next_invocation().await;
    assert_eq!(direct.target, "SendMessageToUser");
    assert_eq!(direct.first_arg(), Some("7"));

    client.dispose().await;
}

// ============================================================================
// Raw Connection
// ============================================================================

#[tokio::test]
async fn test_raw_connection_invoke_and_shutdown() {
    use budget_notify::protocol::{HubMethod, Invocation};
    use budget_notify::transport::{CloseReason, Connection};
    use tokio::sync::mpsc;

    let hub = FakeHub::start().await;
    let (tx, mut received) = mpsc::unbounded_channel();
    let handler = Box::new(move |invocation: Invocation| {
        let _ = tx.send(invocation.target);
    });

    let (connection, closed) = Connection::open(&hub.config(), handler)
        .await
        .expect("open");
    hub.wait_for_connections(1).await;

    let method = HubMethod::JoinGroup(budget_notify::GroupName::new("9"));
    let result = connection
        .invoke(&method, Duration::from_secs(2))
        .await
        .expect("invoke");
    assert_eq!(result, None);
    assert_eq!(connection.pending_count(), 0);
    assert_eq!(hub.next_invocation().await.first_arg(), Some("9"));

    hub.push_notification(json!({ "type": "Info" }));
    let target = timeout(WAIT, received.recv()).await.expect("delivered");
    assert_eq!(target.as_deref(), Some("ReceiveNotification"));

    connection.shutdown().expect("shutdown");
    let reason = timeout(WAIT, closed).await.expect("closed").expect("reason");
    assert_eq!(reason, CloseReason::Requested);
    assert!(connection.is_closed());
    assert!(matches!(
        connection.invoke(&method, Duration::from_secs(1)).await,
        Err(Error::ConnectionClosed)
    ));
}
