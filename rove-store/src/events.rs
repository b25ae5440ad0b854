use tokio::sync::broadcast;
use tracing::{debug, info};

use rove_shared::models::events::{
    BookingCancelledEvent, BookingConfirmedEvent, BookingCreatedEvent, PaymentRecordedEvent,
    RatingSubmittedEvent,
};

#[derive(Debug, Clone)]
pub enum DomainEvent {
    BookingCreated(BookingCreatedEvent),
    BookingConfirmed(BookingConfirmedEvent),
    BookingCancelled(BookingCancelledEvent),
    PaymentRecorded(PaymentRecordedEvent),
    RatingSubmitted(RatingSubmittedEvent),
}

impl DomainEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            DomainEvent::BookingCreated(_) => "booking.created",
            DomainEvent::BookingConfirmed(_) => "booking.confirmed",
            DomainEvent::BookingCancelled(_) => "booking.cancelled",
            DomainEvent::PaymentRecorded(_) => "payment.recorded",
            DomainEvent::RatingSubmitted(_) => "rating.submitted",
        }
    }
}

/// In-process fan-out for fire-and-forget side effects (notification
/// senders, analytics). Publishing never blocks request handling and never
/// fails it: with no subscribers the event is simply dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: DomainEvent) {
        debug!(topic = event.topic(), "publishing event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Background subscriber that writes every event to the log, the
    /// default sink when no delivery integration is wired.
    pub fn spawn_logger(&self) -> tokio::task::JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => info!(topic = event.topic(), event = ?event, "domain event"),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "event logger lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
