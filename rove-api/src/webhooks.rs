use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};

use rove_booking::reconciliation::{self, QueuedEvent};

use crate::error::AppError;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-rove-signature";

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_webhook))
}

/// POST /v1/webhooks/payments
/// Receive payment lifecycle notifications from the gateway. The handler
/// only authenticates, parses and enqueues; the reconciliation listener
/// applies the event to the ledger off the request path.
async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::AuthenticationError("Missing webhook signature".to_string()))?;

    if !state.verifier.verify(&body, signature) {
        tracing::warn!("webhook rejected: signature verification failed");
        return Err(AppError::from(reconciliation::ReconcileError::BadSignature));
    }

    let event = reconciliation::parse_event(&body)?;
    tracing::info!(
        event = %event.event_id,
        payment = %event.gateway_payment_id,
        status = event.status.as_str(),
        "webhook accepted"
    );

    state
        .webhook_tx
        .send(QueuedEvent::new(event))
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(StatusCode::ACCEPTED)
}
