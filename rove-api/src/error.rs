use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use rove_booking::reconciliation::ReconcileError;
use rove_booking::LedgerError;
use rove_catalog::AvailabilityError;
use rove_core::payment::GatewayError;
use rove_rating::RatingError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    PaymentRequired(String),
    GatewayUnavailable(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::GatewayUnavailable(msg) => {
                tracing::warn!("Gateway failure surfaced to client: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment provider unavailable, try again".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound | LedgerError::ActivityNotFound => {
                AppError::NotFoundError(err.to_string())
            }
            LedgerError::Availability(AvailabilityError::SlotFull { .. }) => {
                AppError::ConflictError(err.to_string())
            }
            LedgerError::Inactive
            | LedgerError::PastDate
            | LedgerError::Availability(_)
            | LedgerError::NotCancellable { .. } => AppError::ValidationError(err.to_string()),
            LedgerError::InvalidTransition { .. }
            | LedgerError::AlreadyTerminal { .. }
            | LedgerError::BookingNotPending
            | LedgerError::ReviewRejected
            | LedgerError::Conflict => AppError::ConflictError(err.to_string()),
            LedgerError::Unauthorized => AppError::AuthorizationError(err.to_string()),
            LedgerError::Store(e) => AppError::InternalServerError(e.to_string()),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidSource => AppError::ValidationError(err.to_string()),
            GatewayError::Declined => AppError::PaymentRequired(err.to_string()),
            GatewayError::Unavailable | GatewayError::Timeout => {
                AppError::GatewayUnavailable(err.to_string())
            }
            GatewayError::UnknownPayment(_) => AppError::NotFoundError(err.to_string()),
        }
    }
}

impl From<RatingError> for AppError {
    fn from(err: RatingError) -> Self {
        match err {
            RatingError::AlreadyRated => AppError::ConflictError(err.to_string()),
            RatingError::NotAttended
            | RatingError::InvalidParticipant(_)
            | RatingError::InsufficientParticipants { .. }
            | RatingError::OutOfRange => AppError::ValidationError(err.to_string()),
            RatingError::Booking(e) => AppError::from(e),
            RatingError::Store(e) => AppError::InternalServerError(e.to_string()),
        }
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::BadSignature => AppError::AuthenticationError(err.to_string()),
            ReconcileError::Malformed(_) | ReconcileError::UnrecognizedStatus(_) => {
                AppError::ValidationError(err.to_string())
            }
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}
