//! One-at-a-time alert queue.
//!
//! ```text
//!            enqueue                      enqueue
//!   Idle ──────────────► Displaying ◄──────────────┐
//!    ▲    (present)          │   (append pending)  │
//!    │                       └─────────────────────┘
//!    │   acknowledge,            │ acknowledge,
//!    │   nothing pending         │ pending non-empty
//!    └───────────────────────────┤ (pop front, present)
//!                                ▼
//!                            Displaying
//! ```
//!
//! The queue never drops an event while alive and never presents two at
//! once. Only [`PresentationQueue::acknowledge`] advances it.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::notification::NotificationEvent;

use super::alert::Alert;

// ============================================================================
// AlertPresenter
// ============================================================================

/// Side effect run once for every alert that becomes visible.
pub trait AlertPresenter: Send {
    /// Shows `alert` to the user.
    fn present(&mut self, alert: &Alert);
}

impl<F> AlertPresenter for F
where
    F: FnMut(&Alert) + Send,
{
    fn present(&mut self, alert: &Alert) {
        self(alert);
    }
}

/// Presenter that forwards alerts to a channel, e.g. a UI task.
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    tx: mpsc::UnboundedSender<Alert>,
}

impl ChannelPresenter {
    /// Creates a presenter and the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl From<mpsc::UnboundedSender<Alert>> for ChannelPresenter {
    fn from(tx: mpsc::UnboundedSender<Alert>) -> Self {
        Self { tx }
    }
}

impl AlertPresenter for ChannelPresenter {
    fn present(&mut self, alert: &Alert) {
        if self.tx.send(alert.clone()).is_err() {
            warn!(title = alert.title, "Alert receiver dropped");
        }
    }
}

// ============================================================================
// QueueState
// ============================================================================

/// Whether an alert is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueState {
    /// Nothing displayed; the pending queue is empty.
    #[default]
    Idle,
    /// One alert displayed, awaiting acknowledgment.
    Displaying,
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Displaying => f.write_str("displaying"),
        }
    }
}

// ============================================================================
// PresentationQueue
// ============================================================================

/// FIFO of notifications shown one at a time.
pub struct PresentationQueue<P> {
    /// Display side effect.
    presenter: P,
    /// Event on screen.
    current: Option<NotificationEvent>,
    /// Events waiting for display, oldest first.
    pending: VecDeque<NotificationEvent>,
    /// Alerts presented so far.
    presented: u64,
}

impl<P> fmt::Debug for PresentationQueue<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentationQueue")
            .field("current", &self.current)
            .field("pending", &self.pending.len())
            .field("presented", &self.presented)
            .finish_non_exhaustive()
    }
}

impl<P: AlertPresenter> PresentationQueue<P> {
    /// Creates an idle queue.
    #[must_use]
    pub fn new(presenter: P) -> Self {
        Self {
            presenter,
            current: None,
            pending: VecDeque::new(),
            presented: 0,
        }
    }

    /// Accepts an event.
    ///
    /// Presents it immediately when idle, otherwise appends it behind the
    /// alerts already waiting. Returns the resulting state.
    pub fn enqueue(&mut self, event: NotificationEvent) -> QueueState {
        if self.current.is_some() {
            self.pending.push_back(event);
            trace!(pending = self.pending.len(), "Alert queued");
        } else {
            self.show(event);
        }

        self.state()
    }

    /// Dismisses the alert on screen and presents the next one, if any.
    ///
    /// Returns `false` when nothing was displayed.
    pub fn acknowledge(&mut self) -> bool {
        if self.current.take().is_none() {
            trace!("Acknowledge ignored, nothing displayed");
            return false;
        }

        if let Some(next) = self.pending.pop_front() {
            self.show(next);
        }

        true
    }

    /// Presents `event` and marks it as current.
    fn show(&mut self, event: NotificationEvent) {
        let alert = Alert::from_event(&event);
        debug!(kind = %event.kind(), pending = self.pending.len(), "Presenting alert");

        self.current = Some(event);
        self.presented += 1;
        self.presenter.present(&alert);
    }

    /// Drops the displayed alert and everything pending.
    ///
    /// Returns how many pending alerts were discarded without being shown.
    pub fn teardown(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        self.current = None;

        if discarded > 0 {
            debug!(discarded, "Discarded pending alerts");
        }
        discarded
    }
}

impl<P> PresentationQueue<P> {
    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> QueueState {
        if self.current.is_some() {
            QueueState::Displaying
        } else {
            QueueState::Idle
        }
    }

    /// Returns the event on screen.
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<&NotificationEvent> {
        self.current.as_ref()
    }

    /// Returns the number of events waiting behind the current one.
    #[inline]
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Returns how many alerts have been presented.
    #[inline]
    #[must_use]
    pub fn presented_count(&self) -> u64 {
        self.presented
    }

    /// Returns the presenter.
    #[inline]
    #[must_use]
    pub fn presenter(&self) -> &P {
        &self.presenter
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;
    use proptest::prelude::*;
    use serde_json::Value;

    use crate::notification::NotificationKind;

    fn event(message: &str) -> NotificationEvent {
        NotificationEvent::new(NotificationKind::BudgetWarning, message, Value::Null)
    }

    fn recording_queue() -> (
        PresentationQueue<impl AlertPresenter>,
        Arc<Mutex<Vec<String>>>,
    ) {
        let shown = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&shown);
        let queue = PresentationQueue::new(move |alert: &Alert| {
            sink.lock().push(alert.message.clone());
        });
        (queue, shown)
    }

    #[test]
    fn test_idle_event_is_presented_immediately() {
        let (mut queue, shown) = recording_queue();

        assert_eq!(queue.enqueue(event("a")), QueueState::Displaying);
        assert_eq!(*shown.lock(), vec!["a"]);
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn test_events_wait_while_displaying() {
        let (mut queue, shown) = recording_queue();

        queue.enqueue(event("a"));
        queue.enqueue(event("b"));
        queue.enqueue(event("c"));

        assert_eq!(*shown.lock(), vec!["a"]);
        assert_eq!(queue.pending_len(), 2);

        assert!(queue.acknowledge());
        assert_eq!(*shown.lock(), vec!["a", "b"]);

        assert!(queue.acknowledge());
        assert!(queue.acknowledge());
        assert_eq!(*shown.lock(), vec!["a", "b", "c"]);
        assert_eq!(queue.state(), QueueState::Idle);
    }

    #[test]
    fn test_acknowledge_when_idle_is_noop() {
        let (mut queue, shown) = recording_queue();
        assert!(!queue.acknowledge());
        assert!(shown.lock().is_empty());
    }

    #[test]
    fn test_teardown_discards_pending() {
        let (mut queue, shown) = recording_queue();
        queue.enqueue(event("a"));
        queue.enqueue(event("b"));
        queue.enqueue(event("c"));

        assert_eq!(queue.teardown(), 2);
        assert_eq!(queue.state(), QueueState::Idle);
        assert!(!queue.acknowledge());
        assert_eq!(shown.lock().len(), 1);
    }

    #[test]
    fn test_channel_presenter_forwards_alerts() {
        let (presenter, mut rx) = ChannelPresenter::channel();
        let mut queue = PresentationQueue::new(presenter);

        queue.enqueue(event("over budget"));
        let alert = rx.try_recv().expect("alert forwarded");
        assert_eq!(alert.message, "over budget");
        assert_eq!(alert.title, "Budget warning");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Arrive,
        Acknowledge,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Arrive), Just(Op::Acknowledge)]
    }

    proptest! {
        #[test]
        fn prop_fifo_one_at_a_time(ops in proptest::collection::vec(op(), 0..64)) {
            let (mut queue, shown) = recording_queue();
            let mut arrived = 0usize;
            let mut acknowledged = 0usize;

            for op in ops {
                match op {
                    Op::Arrive => {
                        queue.enqueue(event(&arrived.to_string()));
                        arrived += 1;
                    }
                    Op::Acknowledge => {
                        if queue.acknowledge() {
                            acknowledged += 1;
                        }
                    }
                }

                // Never more than one unacknowledged alert on screen
                let visible = shown.lock().len() - acknowledged;
                prop_assert!(visible <= 1);
                prop_assert_eq!(visible == 1, queue.state() == QueueState::Displaying);
            }

            while queue.acknowledge() {}

            let expected: Vec<String> = (0..arrived).map(|i| i.to_string()).collect();
            prop_assert_eq!(&*shown.lock(), &expected);
        }
    }
}
