use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tokio::sync::{mpsc, Mutex};

use rove_core::payment::{GatewayError, PaymentStatus};

use crate::ledger::{BookingLedger, LedgerError, PaymentApplied};
use crate::models::BookingStatus;
use crate::orchestrator::PaymentOrchestrator;
use crate::repository::BookingRepository;

type HmacSha256 = Hmac<Sha256>;

/// Verifies gateway notification authenticity: HMAC-SHA256 over the raw
/// payload, hex-encoded, compared in constant time. Constructed from config
/// and injected; no ambient secret.
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn verify(&self, payload: &[u8], signature_hex: &str) -> bool {
        let expected = self.sign(payload);
        expected.as_bytes().ct_eq(signature_hex.as_bytes()).unwrap_u8() == 1
    }
}

// Wire shape of a gateway notification.
#[derive(Debug, Deserialize)]
struct GatewayNotification {
    id: String,
    #[serde(rename = "type")]
    type_: String,
    data: NotificationData,
}

#[derive(Debug, Deserialize)]
struct NotificationData {
    object: PaymentObject,
}

#[derive(Debug, Deserialize)]
struct PaymentObject {
    id: String,
    status: String,
    amount: Option<i64>,
}

/// A normalized payment-lifecycle notification.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event_id: String,
    pub gateway_payment_id: String,
    pub status: PaymentStatus,
    pub amount: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct QueuedEvent {
    pub event: WebhookEvent,
    pub attempt: u32,
}

impl QueuedEvent {
    pub fn new(event: WebhookEvent) -> Self {
        Self { event, attempt: 0 }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Webhook signature verification failed")]
    BadSignature,

    #[error("Malformed webhook payload: {0}")]
    Malformed(String),

    #[error("Unrecognized gateway payment status: {0}")]
    UnrecognizedStatus(String),

    #[error("No booking matches gateway payment {0}")]
    UnknownPayment(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ReconcileError {
    /// Transient failures worth another delivery attempt: the booking row
    /// may not be visible yet, the gateway may be down, or a CAS race was
    /// exhausted. Everything else dead-letters.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ReconcileError::UnknownPayment(_)
                | ReconcileError::Gateway(GatewayError::Unavailable | GatewayError::Timeout)
                | ReconcileError::Ledger(LedgerError::Conflict)
        )
    }
}

/// Parse and normalize a raw (already signature-verified) notification body.
pub fn parse_event(raw: &[u8]) -> Result<WebhookEvent, ReconcileError> {
    let notification: GatewayNotification =
        serde_json::from_slice(raw).map_err(|e| ReconcileError::Malformed(e.to_string()))?;

    let status = match notification.data.object.status.as_str() {
        "succeeded" | "paid" => PaymentStatus::Paid,
        "failed" | "declined" | "canceled" => PaymentStatus::Failed,
        "refunded" => PaymentStatus::Refunded,
        "pending" | "processing" => PaymentStatus::Pending,
        other => return Err(ReconcileError::UnrecognizedStatus(other.to_string())),
    };

    tracing::debug!(
        event = %notification.id,
        type_ = %notification.type_,
        payment = %notification.data.object.id,
        "webhook event parsed"
    );

    Ok(WebhookEvent {
        event_id: notification.id,
        gateway_payment_id: notification.data.object.id,
        status,
        amount: notification.data.object.amount,
    })
}

/// Applies asynchronous payment notifications to the ledger, idempotently
/// and in monotonic order. Runs as a background task consuming an mpsc
/// queue; the HTTP handler only verifies, parses and enqueues.
pub struct ReconciliationListener {
    ledger: Arc<BookingLedger>,
    orchestrator: Arc<PaymentOrchestrator>,
    repo: Arc<dyn BookingRepository>,
    tx: mpsc::Sender<QueuedEvent>,
    max_attempts: u32,
    retry_backoff: Duration,
    dead_letters: Mutex<Vec<WebhookEvent>>,
}

impl ReconciliationListener {
    /// Build the listener together with its delivery channel. The returned
    /// sender is handed to the webhook endpoint; the receiver goes to
    /// `run()`.
    pub fn channel(
        ledger: Arc<BookingLedger>,
        orchestrator: Arc<PaymentOrchestrator>,
        max_attempts: u32,
        retry_backoff: Duration,
    ) -> (Arc<Self>, mpsc::Sender<QueuedEvent>, mpsc::Receiver<QueuedEvent>) {
        let (tx, rx) = mpsc::channel(256);
        let repo = ledger.repository();
        let listener = Arc::new(Self {
            ledger,
            orchestrator,
            repo,
            tx: tx.clone(),
            max_attempts,
            retry_backoff,
            dead_letters: Mutex::new(Vec::new()),
        });
        (listener, tx, rx)
    }

    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<QueuedEvent>) {
        tracing::info!("reconciliation listener started");
        while let Some(queued) = rx.recv().await {
            self.clone().handle(queued).await;
        }
        tracing::info!("reconciliation listener stopped");
    }

    async fn handle(self: Arc<Self>, queued: QueuedEvent) {
        match self.process(&queued.event).await {
            Ok(applied) => {
                tracing::debug!(
                    event = %queued.event.event_id,
                    outcome = ?applied,
                    "webhook event handled"
                );
            }
            Err(err) if err.is_retriable() && queued.attempt + 1 < self.max_attempts => {
                tracing::warn!(
                    event = %queued.event.event_id,
                    attempt = queued.attempt,
                    error = %err,
                    "webhook event retry scheduled"
                );
                let listener = self.clone();
                let retry = QueuedEvent { event: queued.event, attempt: queued.attempt + 1 };
                tokio::spawn(async move {
                    tokio::time::sleep(listener.retry_backoff).await;
                    if listener.tx.send(retry).await.is_err() {
                        tracing::error!("reconciliation retry channel closed");
                    }
                });
            }
            Err(err) => self.dead_letter(queued.event, err).await,
        }
    }

    /// One processing attempt. Safe to call any number of times with the
    /// same event: duplicates short-circuit on the processed-event log, and
    /// stale statuses are discarded by the ledger's monotonic rule.
    pub async fn process(&self, event: &WebhookEvent) -> Result<PaymentApplied, ReconcileError> {
        let booking = self
            .repo
            .find_by_gateway_payment(&event.gateway_payment_id)
            .await
            .map_err(LedgerError::from)?
            .ok_or_else(|| ReconcileError::UnknownPayment(event.gateway_payment_id.clone()))?;

        if self
            .repo
            .is_event_processed(&event.event_id)
            .await
            .map_err(LedgerError::from)?
        {
            tracing::info!(event = %event.event_id, "duplicate webhook event ignored");
            return Ok(PaymentApplied::Discarded);
        }

        let (booking, applied) = self.ledger.apply_payment_status(booking.id, event.status).await?;

        // A payment that settled after the booking was cancelled is refunded
        // in full; cancellation stays terminal. Checked from state, not from
        // the apply outcome, so an interrupted refund is picked up by the
        // retried delivery.
        if booking.status == BookingStatus::Cancelled
            && booking.payment.status == PaymentStatus::Paid
        {
            let gateway_payment_id = booking
                .payment
                .gateway_payment_id
                .clone()
                .unwrap_or_else(|| event.gateway_payment_id.clone());
            tracing::warn!(
                booking = %booking.id,
                "payment settled after cancellation, issuing automatic refund"
            );
            self.orchestrator
                .issue_refund(&gateway_payment_id, booking.pricing.total)
                .await?;
            self.ledger
                .apply_payment_status(booking.id, PaymentStatus::Refunded)
                .await?;
        }

        self.repo
            .mark_event_processed(&event.event_id)
            .await
            .map_err(LedgerError::from)?;

        Ok(applied)
    }

    async fn dead_letter(&self, event: WebhookEvent, err: ReconcileError) {
        tracing::error!(
            event = %event.event_id,
            payment = %event.gateway_payment_id,
            error = %err,
            "webhook event dead-lettered"
        );
        self.dead_letters.lock().await.push(event);
    }

    pub async fn dead_letter_count(&self) -> usize {
        self.dead_letters.lock().await.len()
    }
}
