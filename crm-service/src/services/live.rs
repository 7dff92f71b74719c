//! Live-push fan-out for dashboard listeners.

use crate::models::LivePayload;
use crate::services::metrics::record_live_event;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Fire-and-forget push of a payload on a named channel.
pub trait LiveSink: Send + Sync {
    fn emit(&self, channel: &str, payload: &LivePayload);
}

/// One emitted event as seen by listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveEvent {
    pub channel: String,
    pub payload: LivePayload,
}

/// Broadcast channel shared by the scheduler and every SSE listener.
/// Each listener receives every event; nobody acknowledges anything.
#[derive(Clone)]
pub struct LiveChannel {
    sender: broadcast::Sender<LiveEvent>,
    events_emitted: Arc<AtomicU64>,
}

impl LiveChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            events_emitted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn events_emitted(&self) -> u64 {
        self.events_emitted.load(Ordering::Relaxed)
    }
}

impl LiveSink for LiveChannel {
    fn emit(&self, channel: &str, payload: &LivePayload) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
        record_live_event(channel);

        let event = LiveEvent {
            channel: channel.to_string(),
            payload: payload.clone(),
        };

        // Err only means nobody is listening right now
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::debug!(channel = %channel, listeners = delivered, "Live event emitted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn payload() -> LivePayload {
        LivePayload {
            id: Uuid::new_v4(),
            display_name: "Asha Rao".to_string(),
            amount: None,
            event_title: Some("Demo call".to_string()),
            due_date: "2024-06-10".to_string(),
        }
    }

    #[tokio::test]
    async fn every_listener_receives_each_event() {
        let live = LiveChannel::new(16);
        let mut first = live.subscribe();
        let mut second = live.subscribe();
        let payload = payload();

        live.emit("event-reminder", &payload);

        for receiver in [&mut first, &mut second] {
            let event = receiver.recv().await.unwrap();
            assert_eq!(event.channel, "event-reminder");
            assert_eq!(event.payload, payload);
        }
        assert_eq!(live.events_emitted(), 1);
    }

    #[test]
    fn emit_without_listeners_is_dropped() {
        let live = LiveChannel::new(16);
        assert_eq!(live.listener_count(), 0);

        live.emit("invoice-reminder", &payload());

        assert_eq!(live.events_emitted(), 1);
    }
}
