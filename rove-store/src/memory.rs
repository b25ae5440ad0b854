use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use rove_booking::{Booking, BookingRepository};
use rove_catalog::{Activity, ActivityDirectory, OccurrenceKey, Vendor};
use rove_core::repository::{StoreError, StoreResult};
use rove_rating::{CommunityRating, Rating, RatingRepository};

/// In-process store backing the engine when no database is configured, and
/// every test. Slot admission and the version CAS both run under the
/// bookings write lock, which makes them atomic with respect to each other
/// and to concurrent insertions.
pub struct MemoryStore {
    activities: RwLock<HashMap<Uuid, Activity>>,
    vendors: RwLock<HashMap<Uuid, Vendor>>,
    bookings: RwLock<HashMap<Uuid, Booking>>,
    processed_events: RwLock<HashSet<String>>,
    ratings: RwLock<HashMap<(Uuid, OccurrenceKey), Rating>>,
    aggregates: RwLock<HashMap<Uuid, CommunityRating>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            activities: RwLock::new(HashMap::new()),
            vendors: RwLock::new(HashMap::new()),
            bookings: RwLock::new(HashMap::new()),
            processed_events: RwLock::new(HashSet::new()),
            ratings: RwLock::new(HashMap::new()),
            aggregates: RwLock::new(HashMap::new()),
        })
    }

    /// Stand-in for the external catalog: register reference data.
    pub async fn seed_activity(&self, activity: Activity, vendor: Vendor) {
        self.vendors.write().await.insert(vendor.id, vendor);
        self.activities.write().await.insert(activity.id, activity);
    }
}

#[async_trait]
impl ActivityDirectory for MemoryStore {
    async fn get_activity(&self, id: Uuid) -> StoreResult<Option<Activity>> {
        Ok(self.activities.read().await.get(&id).cloned())
    }

    async fn get_vendor(&self, id: Uuid) -> StoreResult<Option<Vendor>> {
        Ok(self.vendors.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn insert_booking_checked(
        &self,
        booking: &Booking,
        slot_capacity: u32,
    ) -> StoreResult<()> {
        let mut bookings = self.bookings.write().await;
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
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn find_by_gateway_payment(
        &self,
        gateway_payment_id: &str,
    ) -> StoreResult<Option<Booking>> {
        Ok(self
            .bookings
            .read()
            .await
            .values()
            .find(|b| b.payment.gateway_payment_id.as_deref() == Some(gateway_payment_id))
            .cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn list_for_occurrence(&self, occurrence: &OccurrenceKey) -> StoreResult<Vec<Booking>> {
        Ok(self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.occurrence() == *occurrence)
            .cloned()
            .collect())
    }

    async fn booked_participants(&self, occurrence: &OccurrenceKey) -> StoreResult<u32> {
        Ok(self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.occurrence() == *occurrence && b.consumes_capacity())
            .map(|b| b.participant_count())
            .sum())
    }

    async fn update_booking(&self, booking: &Booking, expected_version: i64) -> StoreResult<()> {
        let mut bookings = self.bookings.write().await;
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
        Ok(self.processed_events.read().await.contains(event_id))
    }

    async fn mark_event_processed(&self, event_id: &str) -> StoreResult<bool> {
        Ok(self.processed_events.write().await.insert(event_id.to_string()))
    }
}

#[async_trait]
impl RatingRepository for MemoryStore {
    async fn insert_rating(&self, rating: &Rating) -> StoreResult<()> {
        let mut ratings = self.ratings.write().await;
        let key = (rating.rater_id, rating.occurrence);
        if ratings.contains_key(&key) {
            return Err(StoreError::Duplicate);
        }
        ratings.insert(key, rating.clone());
        Ok(())
    }

    async fn get_rating(
        &self,
        rater_id: Uuid,
        occurrence: &OccurrenceKey,
    ) -> StoreResult<Option<Rating>> {
        Ok(self.ratings.read().await.get(&(rater_id, *occurrence)).cloned())
    }

    async fn scores_for_user(&self, user_id: Uuid) -> StoreResult<Vec<u8>> {
        Ok(self
            .ratings
            .read()
            .await
            .values()
            .flat_map(|r| r.participant_ratings.iter())
            .filter(|p| p.participant_user_id == user_id)
            .map(|p| p.score)
            .collect())
    }

    async fn put_community_rating(
        &self,
        user_id: Uuid,
        aggregate: &CommunityRating,
    ) -> StoreResult<()> {
        self.aggregates.write().await.insert(user_id, aggregate.clone());
        Ok(())
    }

    async fn get_community_rating(&self, user_id: Uuid) -> StoreResult<Option<CommunityRating>> {
        Ok(self.aggregates.read().await.get(&user_id).cloned())
    }
}
