//! Process-wide broadcast of voice lifecycle events.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    GatewayReady { session_id: u64 },
    GatewayLost { reason: String },
    RoomCreated { room: u64, scope_id: i64, spatial: bool },
    RoomDestroyed { room: u64 },
    ViewerJoined { room: u64, viewer: String },
    ViewerLeft { room: u64, viewer: String },
    ViewerClosed { viewer: String },
    Shutdown,
}

pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: Event) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(Event::GatewayReady { session_id: 7 });

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::GatewayReady { session_id: 7 }));
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(Event::Shutdown);

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert!(matches!(e1, Event::Shutdown));
        assert!(matches!(e2, Event::Shutdown));
    }

    #[tokio::test]
    async fn room_lifecycle_events_keep_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(Event::RoomCreated {
            room: 10,
            scope_id: 42,
            spatial: true,
        });
        bus.publish(Event::ViewerJoined {
            room: 10,
            viewer: "v1".into(),
        });
        bus.publish(Event::ViewerLeft {
            room: 10,
            viewer: "v1".into(),
        });
        bus.publish(Event::RoomDestroyed { room: 10 });

        assert!(matches!(rx.recv().await.unwrap(), Event::RoomCreated { room: 10, .. }));
        assert!(
            matches!(rx.recv().await.unwrap(), Event::ViewerJoined { ref viewer, .. } if viewer == "v1")
        );
        assert!(matches!(rx.recv().await.unwrap(), Event::ViewerLeft { room: 10, .. }));
        assert!(matches!(rx.recv().await.unwrap(), Event::RoomDestroyed { room: 10 }));
    }

    #[test]
    fn events_serialize_tagged() {
        let event = Event::RoomCreated {
            room: 1001,
            scope_id: 42,
            spatial: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "RoomCreated", "data": {"room": 1001, "scope_id": 42, "spatial": true}})
        );
        let back: Event = serde_json::from_value(json).unwrap();
        assert!(matches!(back, Event::RoomCreated { room: 1001, .. }));
    }

    #[test]
    fn publish_returns_zero_with_no_subscribers() {
        let bus = EventBus::new(16);
        let count = bus.publish(Event::Shutdown);
        assert_eq!(count, 0);
    }
}
