use std::sync::Arc;

use rove_core::payment::{Charge, GatewayError, PaymentGateway, PaymentSource, PaymentStatus};

use crate::models::Booking;

/// Thin layer between the ledger and the external processor. Holds the
/// injected gateway client; the idempotency key for a charge is derived from
/// the booking reference and attempt ordinal, so the processor can collapse
/// retries of the same attempt.
pub struct PaymentOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentOrchestrator {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }

    pub async fn initiate_payment(
        &self,
        booking: &Booking,
        source: &PaymentSource,
    ) -> Result<Charge, GatewayError> {
        let idempotency_key = format!("{}:{}", booking.reference, booking.payment.attempts + 1);
        self.gateway
            .create_payment(
                &idempotency_key,
                booking.pricing.total,
                &booking.pricing.currency,
                source,
            )
            .await
    }

    /// Execute a refund the ledger has already computed and recorded.
    pub async fn issue_refund(
        &self,
        gateway_payment_id: &str,
        amount: i64,
    ) -> Result<String, GatewayError> {
        self.gateway.refund(gateway_payment_id, amount).await
    }
}

/// Deterministic in-process gateway for tests and local wiring. Card and
/// token sources settle synchronously; mobile wallets stay pending until the
/// wallet provider notifies via webhook.
pub struct MockPaymentGateway;

#[async_trait::async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_payment(
        &self,
        idempotency_key: &str,
        amount: i64,
        currency: &str,
        source: &PaymentSource,
    ) -> Result<Charge, GatewayError> {
        let gateway_payment_id = format!("pay_{}", idempotency_key.replace(':', "_"));

        let (status, brand, last4) = match source {
            PaymentSource::Card { number, .. } => {
                let digits = number.0.as_str();
                if digits.len() < 12 || !digits.chars().all(|c| c.is_ascii_digit()) {
                    return Err(GatewayError::InvalidSource);
                }
                if digits.ends_with("0002") {
                    return Err(GatewayError::Declined);
                }
                let brand = match digits.chars().next() {
                    Some('4') => "VISA",
                    Some('5') => "MASTERCARD",
                    _ => "CARD",
                };
                (
                    PaymentStatus::Paid,
                    Some(brand.to_string()),
                    Some(digits[digits.len() - 4..].to_string()),
                )
            }
            PaymentSource::SavedCard { token } => {
                if token.is_empty() {
                    return Err(GatewayError::InvalidSource);
                }
                (PaymentStatus::Paid, Some("CARD".to_string()), None)
            }
            PaymentSource::Wallet { wallet_token } => {
                if wallet_token.is_empty() {
                    return Err(GatewayError::InvalidSource);
                }
                (PaymentStatus::Paid, None, None)
            }
            PaymentSource::MobileWallet { msisdn } => {
                if msisdn.0.is_empty() {
                    return Err(GatewayError::InvalidSource);
                }
                (PaymentStatus::Pending, None, None)
            }
        };

        Ok(Charge {
            gateway_payment_id,
            status,
            amount,
            currency: currency.to_string(),
            brand,
            last4,
        })
    }

    async fn refund(
        &self,
        gateway_payment_id: &str,
        _amount: i64,
    ) -> Result<String, GatewayError> {
        Ok(format!("re_{}", gateway_payment_id))
    }
}
