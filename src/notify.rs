use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Per-room broadcast hub. Every applied event is published here so an
/// external audit/notification collaborator can observe status transitions;
/// this crate does not implement delivery.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to events for a room. Creates the channel if needed.
    pub fn subscribe(&self, room_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, room_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&room_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Remove a channel once no further events are expected for a room.
    pub fn remove(&self, room_id: &Ulid) {
        self.channels.remove(room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReservationStatus;

    fn transitioned(room_id: Ulid) -> Event {
        Event::ReservationTransitioned {
            id: Ulid::new(),
            room_id,
            status: ReservationStatus::Accepted,
            at: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let room_id = Ulid::new();
        let mut rx = hub.subscribe(room_id);

        let event = transitioned(room_id);
        hub.send(room_id, &event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let room_id = Ulid::new();
        // No subscriber — should not panic
        hub.send(room_id, &Event::RoomRetired { id: room_id });
    }

    #[tokio::test]
    async fn subscriptions_are_per_room() {
        let hub = NotifyHub::new();
        let room_a = Ulid::new();
        let room_b = Ulid::new();
        let mut rx_a = hub.subscribe(room_a);
        let _rx_b = hub.subscribe(room_b);

        hub.send(room_b, &transitioned(room_b));
        assert!(rx_a.try_recv().is_err());
    }
}
