use tokio::sync::broadcast;
use tracing::debug;

use swapmeet_types::events::ChatEvent;

/// Fan-out of chat events to analytics and notification consumers.
/// Publishing never blocks and never fails the operation that produced it.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ChatEvent) {
        if self.tx.send(event).is_err() {
            debug!("No event subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(ChatEvent::MessageHeld {
            message_id: 9,
            moderator_id: 2,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event, ChatEvent::MessageHeld { message_id: 9, moderator_id: 2 });
        assert_eq!(event.room_id(), None);
    }

    #[test]
    fn publish_without_subscribers_is_harmless() {
        EventBus::default().publish(ChatEvent::MessageReleased {
            message_id: 1,
            moderator_id: 1,
        });
    }
}
