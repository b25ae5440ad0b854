//! In-memory fixtures shared by the unit tests in this crate.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use rove_catalog::{
    Activity, ActivityDirectory, ActivityPricing, Capacity, OccurrenceKey, Schedule, TimeSlot,
    Vendor,
};
use rove_core::repository::{StoreError, StoreResult};
use rove_shared::pii::Masked;

use crate::ledger::{BookingLedger, CreateBookingRequest};
use crate::models::{Booking, Participant};
use crate::repository::BookingRepository;

pub struct TestRepo {
    bookings: Mutex<HashMap<Uuid, Booking>>,
    processed: Mutex<HashSet<String>>,
}

impl TestRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            bookings: Mutex::new(HashMap::new()),
            processed: Mutex::new(HashSet::new()),
        })
    }

    pub async fn all(&self) -> Vec<Booking> {
        self.bookings.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl BookingRepository for TestRepo {
    async fn insert_booking_checked(
        &self,
        booking: &Booking,
        slot_capacity: u32,
    ) -> StoreResult<()> {
        let mut bookings = self.bookings.lock().await;
        let occurrence = booking.occurrence();
        let booked: u32 = bookings
            .values()
            .filter(|b| b.occurrence() == occurrence && b.consumes_capacity())
            .map(|b| b.participant_count())
            .sum();
        let remaining = slot_capacity.saturating_sub(booked);
        if booking.participant_count() > remaining {
            return Err(StoreError::SlotFull {
                requested: booking.participant_count(),
                remaining,
            });
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.bookings.lock().await.get(&id).cloned())
    }

    async fn find_by_gateway_payment(
        &self,
        gateway_payment_id: &str,
    ) -> StoreResult<Option<Booking>> {
        Ok(self
            .bookings
            .lock()
            .await
            .values()
            .find(|b| b.payment.gateway_payment_id.as_deref() == Some(gateway_payment_id))
            .cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        Ok(self
            .bookings
            .lock()
            .await
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_for_occurrence(&self, occurrence: &OccurrenceKey) -> StoreResult<Vec<Booking>> {
        Ok(self
            .bookings
            .lock()
            .await
            .values()
            .filter(|b| b.occurrence() == *occurrence)
            .cloned()
            .collect())
    }

    async fn booked_participants(&self, occurrence: &OccurrenceKey) -> StoreResult<u32> {
        Ok(self
            .bookings
            .lock()
            .await
            .values()
            .filter(|b| b.occurrence() == *occurrence && b.consumes_capacity())
            .map(|b| b.participant_count())
            .sum())
    }

    async fn update_booking(&self, booking: &Booking, expected_version: i64) -> StoreResult<()> {
        let mut bookings = self.bookings.lock().await;
        let stored = bookings.get_mut(&booking.id).ok_or(StoreError::NotFound)?;
        if stored.version != expected_version {
            return Err(StoreError::VersionConflict);
        }
        let mut updated = booking.clone();
        updated.version = expected_version + 1;
        *stored = updated;
        Ok(())
    }

    async fn is_event_processed(&self, event_id: &str) -> StoreResult<bool> {
        Ok(self.processed.lock().await.contains(event_id))
    }

    async fn mark_event_processed(&self, event_id: &str) -> StoreResult<bool> {
        Ok(self.processed.lock().await.insert(event_id.to_string()))
    }
}

pub struct TestDirectory {
    activities: HashMap<Uuid, Activity>,
    vendors: HashMap<Uuid, Vendor>,
}

impl TestDirectory {
    pub fn with(activity: Activity, vendor: Vendor) -> Arc<Self> {
        let mut activities = HashMap::new();
        activities.insert(activity.id, activity);
        let mut vendors = HashMap::new();
        vendors.insert(vendor.id, vendor);
        Arc::new(Self { activities, vendors })
    }
}

#[async_trait]
impl ActivityDirectory for TestDirectory {
    async fn get_activity(&self, id: Uuid) -> StoreResult<Option<Activity>> {
        Ok(self.activities.get(&id).cloned())
    }

    async fn get_vendor(&self, id: Uuid) -> StoreResult<Option<Vendor>> {
        Ok(self.vendors.get(&id).cloned())
    }
}

/// One active activity with a single fixed slot `hours_ahead` from now,
/// capacity 1..10, base price 4500 at 10% tax.
pub fn fixture(hours_ahead: i64) -> (Arc<TestRepo>, Arc<TestDirectory>, Activity, TimeSlot) {
    let starts = Utc::now() + Duration::hours(hours_ahead);
    let slot = TimeSlot {
        date: starts.date_naive(),
        start_time: starts.time(),
        end_time: (starts + Duration::hours(2)).time(),
    };
    let vendor = Vendor {
        id: Uuid::new_v4(),
        name: "Tidewater Tours".to_string(),
        is_active: true,
    };
    let activity = Activity {
        id: Uuid::new_v4(),
        vendor_id: vendor.id,
        title: "Coastal kayak tour".to_string(),
        capacity: Capacity { min: 1, max: 10 },
        schedule: Schedule::Fixed { slots: vec![slot] },
        blackout_dates: vec![],
        pricing: ActivityPricing {
            base_price: 4500,
            currency: "USD".to_string(),
            tax_rate: 0.1,
            discount: None,
        },
        cancellation_policy: None,
        is_active: true,
    };
    let directory = TestDirectory::with(activity.clone(), vendor);
    (TestRepo::new(), directory, activity, slot)
}

pub fn participants(count: usize) -> Vec<Participant> {
    (0..count)
        .map(|i| Participant {
            user_id: Some(Uuid::new_v4()),
            name: format!("Guest {}", i + 1),
            contact: Masked(format!("guest{}@example.com", i + 1)),
            requirements: None,
        })
        .collect()
}

pub async fn create(
    ledger: &BookingLedger,
    activity: &Activity,
    slot: TimeSlot,
    count: usize,
) -> Booking {
    ledger
        .create_booking(CreateBookingRequest {
            user_id: Uuid::new_v4(),
            activity_id: activity.id,
            slot,
            participants: participants(count),
        })
        .await
        .unwrap()
}
