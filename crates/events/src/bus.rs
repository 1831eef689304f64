//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`Notification`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rwa_core::events::MarketEvent;
use rwa_core::types::{Identity, Timestamp};
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A committed market event as seen by subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// Monotonic per-bus sequence number, starting at 1.
    pub sequence: u64,

    /// Dot-separated event name, e.g. `"exchange.sold"`.
    pub event_type: &'static str,

    /// Identity whose call produced the event, if known.
    pub actor: Option<Identity>,

    pub event: MarketEvent,

    /// When the event was published (UTC).
    pub timestamp: Timestamp,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use rwa_core::events::MarketEvent;
/// use rwa_events::bus::EventBus;
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(None, MarketEvent::FeeChanged { old_bps: 250, new_bps: 300 });
/// ```
pub struct EventBus {
    sender: broadcast::Sender<Notification>,
    sequence: AtomicU64,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Publish one event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, actor: Option<&Identity>, event: MarketEvent) {
        let notification = Notification {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            event_type: event.name(),
            actor: actor.cloned(),
            event,
            timestamp: Utc::now(),
        };
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(notification);
    }

    /// Publish every event of a committed operation, in emission order.
    pub fn publish_all(&self, actor: &Identity, events: Vec<MarketEvent>) {
        for event in events {
            self.publish(Some(actor), event);
        }
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> Identity {
        Identity::new("alice").unwrap()
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(
            Some(&actor()),
            MarketEvent::MinConfidenceChanged { old: 70, new: 80 },
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.sequence, 1);
        assert_eq!(received.event_type, "pricing.min_confidence_changed");
        assert_eq!(received.actor.as_ref(), Some(&actor()));
        assert_eq!(
            received.event,
            MarketEvent::MinConfidenceChanged { old: 70, new: 80 }
        );
    }

    #[tokio::test]
    async fn publish_all_preserves_order_and_sequence() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish_all(
            &actor(),
            vec![
                MarketEvent::FeeChanged {
                    old_bps: 250,
                    new_bps: 300,
                },
                MarketEvent::FeeChanged {
                    old_bps: 300,
                    new_bps: 100,
                },
            ],
        );

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!((first.sequence, second.sequence), (1, 2));
        assert_eq!(
            second.event,
            MarketEvent::FeeChanged {
                old_bps: 300,
                new_bps: 100
            }
        );
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(None, MarketEvent::FeeChanged { old_bps: 1, new_bps: 2 });

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.sequence, e2.sequence);
        assert!(e1.actor.is_none());
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(None, MarketEvent::FeeChanged { old_bps: 1, new_bps: 2 });
    }

    #[test]
    fn notification_serializes_event_inline() {
        let notification = Notification {
            sequence: 7,
            event_type: "exchange.fee_changed",
            actor: None,
            event: MarketEvent::FeeChanged {
                old_bps: 250,
                new_bps: 300,
            },
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["sequence"], 7);
        assert_eq!(json["event"]["type"], "fee_changed");
        assert!(json["actor"].is_null());
    }
}
