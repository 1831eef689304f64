//! Bounded in-memory journal of recent notifications.
//!
//! [`EventRecorder`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and keeps the most recent notifications so they can be served to clients.
//! It runs as a long-lived background task and exits when the bus is dropped.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::bus::Notification;

/// Default number of notifications retained.
pub const DEFAULT_JOURNAL_SIZE: usize = 500;

#[derive(Clone)]
pub struct EventRecorder {
    journal: Arc<RwLock<VecDeque<Notification>>>,
    capacity: usize,
}

impl EventRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            journal: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    /// Run the recording loop until the channel closes.
    pub async fn run(self, mut receiver: broadcast::Receiver<Notification>) {
        loop {
            match receiver.recv().await {
                Ok(notification) => {
                    tracing::debug!(
                        sequence = notification.sequence,
                        event_type = notification.event_type,
                        "Recording notification"
                    );
                    self.record(notification).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event recorder lagged, some events were not recorded");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, recorder shutting down");
                    break;
                }
            }
        }
    }

    async fn record(&self, notification: Notification) {
        let mut journal = self.journal.write().await;
        if journal.len() == self.capacity {
            journal.pop_front();
        }
        journal.push_back(notification);
    }

    /// Up to `limit` notifications, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<Notification> {
        let journal = self.journal.read().await;
        journal.iter().rev().take(limit).cloned().collect()
    }

    /// Notifications with a sequence number greater than `after`, oldest first.
    pub async fn since(&self, after: u64) -> Vec<Notification> {
        let journal = self.journal.read().await;
        journal
            .iter()
            .filter(|n| n.sequence > after)
            .cloned()
            .collect()
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_JOURNAL_SIZE)
    }
}
