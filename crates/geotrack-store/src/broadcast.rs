//! Push-channel event sink backed by a tokio broadcast channel

use async_trait::async_trait;
use geotrack_core::error::Result;
use geotrack_core::models::LocationEvent;
use tokio::sync::broadcast;

use crate::ports::EventSink;

/// Default number of events buffered per subscriber
pub const DEFAULT_CAPACITY: usize = 1024;

/// Fans events out to live subscribers (e.g. websocket sessions).
///
/// Delivery is best effort: having no subscribers is not an error, and a
/// subscriber that falls more than `capacity` events behind skips ahead.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<LocationEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LocationEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn publish(&self, events: &[LocationEvent]) -> Result<()> {
        for event in events {
            if self.sender.send(event.clone()).is_err() {
                tracing::debug!(event_type = %event.event_type, "No subscribers for location event");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use geotrack_core::models::{BookingId, GeoPoint, LocationEventType, WorkerId};

    fn event() -> LocationEvent {
        LocationEvent::new(
            LocationEventType::ArrivedAtClient,
            BookingId(5),
            WorkerId(6),
            GeoPoint::new(11.66, 78.14),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let sink = BroadcastEventSink::default();
        let mut rx = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 1);

        let sent = event();
        sink.publish(&[sent.clone()]).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let sink = BroadcastEventSink::new(4);
        assert!(sink.publish(&[event(), event()]).await.is_ok());
    }
}
