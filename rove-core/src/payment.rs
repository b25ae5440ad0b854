use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use rove_shared::pii::Masked;

/// Normalized payment vocabulary. Every gateway-specific lifecycle state is
/// mapped into one of these four values before it touches the ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Failed,
    Paid,
    Refunded,
}

impl PaymentStatus {
    /// Monotonic ordering for out-of-order event delivery: an event may only
    /// move payment state to a strictly higher rank. A PAID notification
    /// delivered after REFUNDED (clock skew, duplicated webhooks) is stale.
    pub fn rank(&self) -> u8 {
        match self {
            PaymentStatus::Pending => 0,
            PaymentStatus::Failed => 1,
            PaymentStatus::Paid => 2,
            PaymentStatus::Refunded => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

/// One of the shapes a caller can fund a payment from. Dispatch is an explicit
/// match, never field-presence sniffing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentSource {
    Card {
        number: Masked<String>,
        exp_month: u8,
        exp_year: u16,
        cvc: Masked<String>,
    },
    SavedCard {
        token: String,
    },
    Wallet {
        wallet_token: String,
    },
    MobileWallet {
        msisdn: Masked<String>,
    },
}

impl PaymentSource {
    /// Method label recorded on the booking's payment sub-record.
    pub fn method(&self) -> &'static str {
        match self {
            PaymentSource::Card { .. } => "CARD",
            PaymentSource::SavedCard { .. } => "SAVED_CARD",
            PaymentSource::Wallet { .. } => "WALLET",
            PaymentSource::MobileWallet { .. } => "MOBILE_WALLET",
        }
    }
}

/// Result of submitting a payment to the external processor, normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    pub gateway_payment_id: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub currency: String,
    pub brand: Option<String>,
    pub last4: Option<String>,
}

/// Typed gateway failures. Display strings are what callers may surface to
/// end users; processor-internal detail stays in logs.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Payment source is invalid")]
    InvalidSource,
    #[error("Payment was declined by the issuer")]
    Declined,
    #[error("Payment gateway is unavailable, try again later")]
    Unavailable,
    #[error("Payment gateway timed out")]
    Timeout,
    #[error("Unknown payment: {0}")]
    UnknownPayment(String),
}

/// Seam to the external payment processor. Constructed once at startup and
/// injected; no ambient client singletons.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Submit a payment. `idempotency_key` anchors retries on the processor
    /// side; the adapter itself never re-submits without one.
    async fn create_payment(
        &self,
        idempotency_key: &str,
        amount: i64,
        currency: &str,
        source: &PaymentSource,
    ) -> Result<Charge, GatewayError>;

    /// Refund a previously paid payment. The amount is computed upstream by
    /// the ledger's cancellation policy; the gateway only executes it.
    async fn refund(
        &self,
        gateway_payment_id: &str,
        amount: i64,
    ) -> Result<String, GatewayError>;
}
