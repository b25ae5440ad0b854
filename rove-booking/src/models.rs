use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rove_catalog::{Activity, OccurrenceKey, PriceQuote, TimeSlot};
use rove_core::payment::PaymentStatus;
use rove_shared::pii::Masked;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::NoShow => "NO_SHOW",
        }
    }

    pub fn parse(s: &str) -> Option<BookingStatus> {
        match s {
            "PENDING" => Some(BookingStatus::Pending),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "IN_PROGRESS" => Some(BookingStatus::InProgress),
            "COMPLETED" => Some(BookingStatus::Completed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            "NO_SHOW" => Some(BookingStatus::NoShow),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    /// The only legal edges of the lifecycle. Everything else is an
    /// invalid transition, including any jump out of a terminal state.
    pub fn can_transition_to(&self, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, to),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, InProgress)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
                | (Confirmed, NoShow)
                | (InProgress, Completed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Marketplace account of the participant, when they have one. Needed
    /// for rating attribution; walk-in guests stay None.
    pub user_id: Option<Uuid>,
    pub name: String,
    pub contact: Masked<String>,
    pub requirements: Option<String>,
}

/// Normalized view of the external payment attached to this booking.
/// Written only through the reconciliation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub gateway_payment_id: Option<String>,
    pub method: Option<String>,
    pub status: PaymentStatus,
    pub brand: Option<String>,
    pub last4: Option<String>,
    pub attempts: u32,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_amount: Option<i64>,
}

impl Default for PaymentRecord {
    fn default() -> Self {
        Self {
            gateway_payment_id: None,
            method: None,
            status: PaymentStatus::Pending,
            brand: None,
            last4: None,
            attempts: 0,
            paid_at: None,
            refunded_at: None,
            refund_amount: None,
        }
    }
}

/// Populated exactly once, when the booking is cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationRecord {
    pub cancelled_by: Uuid,
    pub cancelled_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub refund_amount: i64,
    pub refund_processed: bool,
}

/// Populated at most once, after a completed booking was rated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub rating: u8,
    pub comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// The single source of truth for one reserved activity slot. Never
/// physically deleted; cancelled and completed bookings stay as the audit
/// trail for refunds and ratings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    /// Human-readable reference, immutable once assigned.
    pub reference: String,
    pub user_id: Uuid,
    pub activity_id: Uuid,
    pub vendor_id: Uuid,
    pub slot: TimeSlot,
    pub participants: Vec<Participant>,
    /// Frozen at creation; later activity price changes never touch it.
    pub pricing: PriceQuote,
    pub payment: PaymentRecord,
    pub status: BookingStatus,
    pub cancellation: Option<CancellationRecord>,
    pub review: Option<ReviewRecord>,
    /// Optimistic-concurrency counter; every committed update bumps it.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        user_id: Uuid,
        activity: &Activity,
        slot: TimeSlot,
        participants: Vec<Participant>,
        pricing: PriceQuote,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            reference: new_reference(),
            user_id,
            activity_id: activity.id,
            vendor_id: activity.vendor_id,
            slot,
            participants,
            pricing,
            payment: PaymentRecord::default(),
            status: BookingStatus::Pending,
            cancellation: None,
            review: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn participant_count(&self) -> u32 {
        self.participants.len() as u32
    }

    pub fn occurrence(&self) -> OccurrenceKey {
        OccurrenceKey::new(self.activity_id, &self.slot)
    }

    pub fn starts_at(&self) -> DateTime<Utc> {
        self.slot.starts_at()
    }

    /// Whether this booking still consumes slot capacity. Cancelled bookings
    /// release their seats; every other state holds them.
    pub fn consumes_capacity(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Generate a booking reference like `RV-7K2F9QX1`.
pub fn new_reference() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("RV-{}", suffix)
}
