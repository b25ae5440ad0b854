use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rove_booking::{Booking, BookingStatus, CreateBookingRequest, Participant};
use rove_catalog::TimeSlot;
use rove_core::payment::{PaymentSource, PaymentStatus};
use rove_shared::models::events::{
    BookingCancelledEvent, BookingConfirmedEvent, BookingCreatedEvent, PaymentRecordedEvent,
};
use rove_shared::pii::Masked;
use rove_store::DomainEvent;

use crate::auth::caller_from_token;
use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ParticipantPayload {
    pub user_id: Option<Uuid>,
    pub name: String,
    pub contact: String,
    pub requirements: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingPayload {
    pub activity_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub participants: Vec<ParticipantPayload>,
}

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentPayload {
    pub source: PaymentSource,
}

#[derive(Debug, Serialize)]
pub struct PaymentInitiatedResponse {
    pub gateway_payment_id: String,
    pub status: PaymentStatus,
    pub booking_status: BookingStatus,
}

#[derive(Debug, Deserialize)]
pub struct CancelBookingPayload {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancellationResponse {
    pub booking_id: Uuid,
    pub refund_amount: i64,
    pub refund_processed: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/payment", post(initiate_payment))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/status", post(update_status))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/bookings
/// Reserve a slot; the booking starts pending until its payment settles.
async fn create_booking(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<CreateBookingPayload>,
) -> Result<Json<Booking>, AppError> {
    let caller = caller_from_token(&state, bearer.token())?;

    let participants = payload
        .participants
        .into_iter()
        .map(|p| Participant {
            user_id: p.user_id,
            name: p.name,
            contact: Masked(p.contact),
            requirements: p.requirements,
        })
        .collect();

    let booking = state
        .ledger
        .create_booking(CreateBookingRequest {
            user_id: caller.user_id,
            activity_id: payload.activity_id,
            slot: TimeSlot {
                date: payload.date,
                start_time: payload.start_time,
                end_time: payload.end_time,
            },
            participants,
        })
        .await?;

    state.events.publish(DomainEvent::BookingCreated(BookingCreatedEvent {
        booking_id: booking.id,
        reference: booking.reference.clone(),
        activity_id: booking.activity_id,
        user_id: booking.user_id,
        participants: booking.participant_count(),
        total: booking.pricing.total,
        timestamp: Utc::now().timestamp(),
    }));

    Ok(Json(booking))
}

/// GET /v1/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let caller = caller_from_token(&state, bearer.token())?;
    let booking = state.ledger.get(booking_id).await?;

    if caller.user_id != booking.user_id && !caller.can_manage(booking.vendor_id) {
        return Err(AppError::AuthorizationError(
            "Booking belongs to another user".to_string(),
        ));
    }
    Ok(Json(booking))
}

/// GET /v1/bookings
/// The caller's own bookings.
async fn list_bookings(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let caller = caller_from_token(&state, bearer.token())?;
    Ok(Json(state.ledger.list_for_user(caller.user_id).await?))
}

/// POST /v1/bookings/{id}/payment
/// Submit a payment source for a pending booking. Synchronous settlements
/// confirm immediately through the same path webhooks use; asynchronous
/// sources leave the booking pending until the gateway notifies.
async fn initiate_payment(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<InitiatePaymentPayload>,
) -> Result<Json<PaymentInitiatedResponse>, AppError> {
    let caller = caller_from_token(&state, bearer.token())?;
    let booking = state.ledger.get(booking_id).await?;

    if caller.user_id != booking.user_id {
        return Err(AppError::AuthorizationError(
            "Booking belongs to another user".to_string(),
        ));
    }
    if booking.status != BookingStatus::Pending {
        return Err(AppError::from(rove_booking::LedgerError::BookingNotPending));
    }

    // Bounded call; on timeout the booking stays pending and the eventual
    // webhook settles it.
    let charge = tokio::time::timeout(
        state.gateway_timeout,
        state.orchestrator.initiate_payment(&booking, &payload.source),
    )
    .await
    .map_err(|_| AppError::from(rove_core::payment::GatewayError::Timeout))??;

    let booking = state
        .ledger
        .record_payment_initiated(booking_id, &charge, payload.source.method())
        .await?;

    state.events.publish(DomainEvent::PaymentRecorded(PaymentRecordedEvent {
        booking_id: booking.id,
        gateway_payment_id: charge.gateway_payment_id.clone(),
        status: charge.status.as_str().to_string(),
        timestamp: Utc::now().timestamp(),
    }));

    let booking = if charge.status != PaymentStatus::Pending {
        let (booking, applied) = state
            .ledger
            .apply_payment_status(booking_id, charge.status)
            .await?;
        if applied == rove_booking::PaymentApplied::Confirmed {
            state.events.publish(DomainEvent::BookingConfirmed(BookingConfirmedEvent {
                booking_id: booking.id,
                gateway_payment_id: charge.gateway_payment_id.clone(),
                total: booking.pricing.total,
                timestamp: Utc::now().timestamp(),
            }));
        }
        booking
    } else {
        booking
    };

    Ok(Json(PaymentInitiatedResponse {
        gateway_payment_id: charge.gateway_payment_id,
        status: booking.payment.status,
        booking_status: booking.status,
    }))
}

/// POST /v1/bookings/{id}/cancel
/// Cancel and compute the refund from policy at this instant. If a refund is
/// owed on a settled payment the gateway call happens here; a failure leaves
/// `refund_processed` false for compensation and is never silently dropped.
async fn cancel_booking(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<CancelBookingPayload>,
) -> Result<Json<CancellationResponse>, AppError> {
    let caller = caller_from_token(&state, bearer.token())?;

    let outcome = state
        .ledger
        .cancel(booking_id, &caller, payload.reason)
        .await?;

    let mut refund_processed = false;
    if let Some(instruction) = &outcome.refund {
        let refunded = tokio::time::timeout(
            state.gateway_timeout,
            state
                .orchestrator
                .issue_refund(&instruction.gateway_payment_id, instruction.amount),
        )
        .await;

        match refunded {
            Ok(Ok(refund_id)) => {
                state
                    .ledger
                    .apply_payment_status(booking_id, PaymentStatus::Refunded)
                    .await?;
                refund_processed = true;
                tracing::info!(booking = %booking_id, refund = %refund_id, "refund issued");
            }
            Ok(Err(e)) => {
                tracing::error!(booking = %booking_id, error = %e, "refund issuance failed, will be compensated");
            }
            Err(_) => {
                tracing::error!(booking = %booking_id, "refund issuance timed out, will be compensated");
            }
        }
    }

    state.events.publish(DomainEvent::BookingCancelled(BookingCancelledEvent {
        booking_id,
        cancelled_by: caller.user_id,
        refund_amount: outcome.refund_amount,
        timestamp: Utc::now().timestamp(),
    }));

    Ok(Json(CancellationResponse {
        booking_id,
        refund_amount: outcome.refund_amount,
        refund_processed,
    }))
}

/// POST /v1/bookings/{id}/status
/// Vendor/admin lifecycle updates (IN_PROGRESS, COMPLETED, NO_SHOW).
async fn update_status(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<Json<Booking>, AppError> {
    let caller = caller_from_token(&state, bearer.token())?;
    let new_status = BookingStatus::parse(&payload.status)
        .ok_or_else(|| AppError::ValidationError(format!("Unknown status {}", payload.status)))?;

    let booking = state
        .ledger
        .update_status(booking_id, &caller, new_status)
        .await?;
    Ok(Json(booking))
}
