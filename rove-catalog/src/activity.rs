use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One bookable (date, start, end) instance of an activity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl TimeSlot {
    /// The slot start as a UTC instant; cancellation windows and past-date
    /// checks are measured against this.
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.date.and_time(self.start_time).and_utc()
    }
}

/// Identity of one activity occurrence. Capacity is consumed per occurrence,
/// and ratings reference the occurrence their event happened at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OccurrenceKey {
    pub activity_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
}

impl OccurrenceKey {
    pub fn new(activity_id: Uuid, slot: &TimeSlot) -> Self {
        Self {
            activity_id,
            date: slot.date,
            start_time: slot.start_time,
        }
    }
}

/// Participant bounds per booking and total seats per occurrence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Capacity {
    pub min: u32,
    pub max: u32,
}

/// When an activity runs: either an explicit slot list maintained by the
/// vendor, or a weekly recurrence pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Schedule {
    Fixed { slots: Vec<TimeSlot> },
    Weekly {
        weekdays: Vec<Weekday>,
        start_time: NaiveTime,
        end_time: NaiveTime,
    },
}

impl Schedule {
    pub fn contains(&self, slot: &TimeSlot) -> bool {
        match self {
            Schedule::Fixed { slots } => slots.iter().any(|s| s == slot),
            Schedule::Weekly { weekdays, start_time, end_time } => {
                use chrono::Datelike;
                weekdays.contains(&slot.date.weekday())
                    && *start_time == slot.start_time
                    && *end_time == slot.end_time
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discount {
    pub amount: i64,
    pub reason: String,
}

/// Price inputs declared on the activity. Snapshotted into the booking at
/// creation; later changes never touch existing bookings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPricing {
    pub base_price: i64,
    pub currency: String,
    pub tax_rate: f64,
    pub discount: Option<Discount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub title: String,
    pub capacity: Capacity,
    pub schedule: Schedule,
    pub blackout_dates: Vec<NaiveDate>,
    pub pricing: ActivityPricing,
    /// Free-text cancellation terms shown to customers. Display-only; the
    /// refund tiers enforced by the ledger are fixed.
    pub cancellation_policy: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
}
