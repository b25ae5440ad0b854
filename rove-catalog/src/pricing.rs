use serde::{Deserialize, Serialize};
use crate::activity::ActivityPricing;

/// Marketplace fees applied on top of the taxed activity price, in minor
/// currency units. Loaded from business-rule configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub platform_fee: i64,
    pub processing_fee: i64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            platform_fee: 0,
            processing_fee: 0,
        }
    }
}

/// The pricing snapshot frozen onto a booking at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    pub base_price: i64,
    pub participants: u32,
    pub subtotal: i64,
    pub discount: i64,
    pub discount_reason: Option<String>,
    pub tax_rate: f64,
    pub tax_amount: i64,
    pub platform_fee: i64,
    pub processing_fee: i64,
    pub total: i64,
    pub currency: String,
}

/// Round half-up to the smallest currency unit. Only called on non-negative
/// intermediates.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// total = (base × participants − discount) × (1 + taxRate) + platformFee + processingFee
///
/// Deterministic integer arithmetic in minor units; negative intermediates
/// clamp to zero and are logged, the total is never negative.
pub fn quote(pricing: &ActivityPricing, participants: u32, fees: &FeeSchedule) -> PriceQuote {
    let subtotal = pricing.base_price * participants as i64;
    let discount = pricing.discount.as_ref().map(|d| d.amount).unwrap_or(0);

    let mut net = subtotal - discount;
    if net < 0 {
        tracing::warn!(
            subtotal,
            discount,
            "discount exceeds subtotal, clamping taxable amount to zero"
        );
        net = 0;
    }

    let tax_amount = round_half_up(net as f64 * pricing.tax_rate);

    let mut total = net + tax_amount + fees.platform_fee + fees.processing_fee;
    if total < 0 {
        tracing::warn!(total, "computed total below zero, clamping");
        total = 0;
    }

    PriceQuote {
        base_price: pricing.base_price,
        participants,
        subtotal,
        discount,
        discount_reason: pricing.discount.as_ref().map(|d| d.reason.clone()),
        tax_rate: pricing.tax_rate,
        tax_amount,
        platform_fee: fees.platform_fee,
        processing_fee: fees.processing_fee,
        total,
        currency: pricing.currency.clone(),
    }
}
