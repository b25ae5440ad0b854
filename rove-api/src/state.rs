use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use rove_booking::{BookingLedger, PaymentOrchestrator, QueuedEvent, WebhookVerifier};
use rove_rating::RatingGate;
use rove_store::EventBus;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

/// Everything a handler needs, constructed once in `main` and injected.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<BookingLedger>,
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub rating_gate: Arc<RatingGate>,
    pub verifier: Arc<WebhookVerifier>,
    pub webhook_tx: mpsc::Sender<QueuedEvent>,
    pub events: EventBus,
    pub auth: AuthConfig,
    /// Outbound gateway calls are bounded by this; a timeout leaves the
    /// booking pending, never assumed failed.
    pub gateway_timeout: Duration,
}
