//! Background task feeding hub notifications into a presentation queue.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::notification::NotificationEvent;
use crate::transport::HubClient;

use super::queue::{AlertPresenter, PresentationQueue, QueueState};

// ============================================================================
// AlertFeed
// ============================================================================

/// Drains a client's notification stream into a [`PresentationQueue`].
///
/// Enqueue and acknowledge share one lock, so an event arriving during an
/// acknowledgment can neither jump the queue nor be shown twice.
///
/// The presenter runs while that lock is held; it must not call back into
/// the feed. Dropping the feed stops the task and its stream subscription.
pub struct AlertFeed<P> {
    queue: Arc<Mutex<PresentationQueue<P>>>,
    task: JoinHandle<()>,
}

impl<P> fmt::Debug for AlertFeed<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertFeed")
            .field("queue", &*self.queue.lock())
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

impl<P: AlertPresenter + 'static> AlertFeed<P> {
    /// Subscribes to `client` and starts presenting its notifications.
    ///
    /// Must be called within a tokio runtime. Notifications published
    /// before this call are not seen.
    #[must_use]
    pub fn attach(client: &HubClient, presenter: P) -> Self {
        Self::from_receiver(client.subscribe(), presenter)
    }

    /// Starts presenting events from an existing subscription.
    #[must_use]
    pub fn from_receiver(events: mpsc::UnboundedReceiver<NotificationEvent>, presenter: P) -> Self {
        let queue = Arc::new(Mutex::new(PresentationQueue::new(presenter)));
        let task = tokio::spawn(run_feed(events, Arc::clone(&queue)));

        Self { queue, task }
    }
}

impl<P: AlertPresenter> AlertFeed<P> {
    /// Dismisses the alert on screen and presents the next one.
    ///
    /// Returns `false` when nothing was displayed.
    pub fn acknowledge(&self) -> bool {
        self.queue.lock().acknowledge()
    }

    /// Stops the feed and discards pending alerts.
    ///
    /// Returns how many alerts were discarded without being shown.
    pub fn detach(self) -> usize {
        self.task.abort();
        let discarded = self.queue.lock().teardown();
        debug!(discarded, "Alert feed detached");
        discarded
    }
}

impl<P> AlertFeed<P> {
    /// Returns the queue state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> QueueState {
        self.queue.lock().state()
    }

    /// Returns the number of alerts waiting behind the current one.
    #[inline]
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.queue.lock().pending_len()
    }

    /// Returns how many alerts have been presented.
    #[inline]
    #[must_use]
    pub fn presented_count(&self) -> u64 {
        self.queue.lock().presented_count()
    }

    /// Returns a copy of the event on screen.
    #[must_use]
    pub fn current(&self) -> Option<NotificationEvent> {
        self.queue.lock().current().cloned()
    }
}

impl<P> Drop for AlertFeed<P> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Moves events from the stream into the queue until the stream closes.
async fn run_feed<P: AlertPresenter>(
    mut events: mpsc::UnboundedReceiver<NotificationEvent>,
    queue: Arc<Mutex<PresentationQueue<P>>>,
) {
    while let Some(event) = events.recv().await {
        let state = queue.lock().enqueue(event);
        trace!(?state, "Notification queued");
    }

    debug!("Notification stream closed");
}

// ============================================================================
// Tests
// ============================================================================
