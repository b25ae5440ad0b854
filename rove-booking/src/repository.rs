use async_trait::async_trait;
use uuid::Uuid;

use rove_catalog::OccurrenceKey;
use rove_core::repository::StoreResult;
use crate::models::Booking;

/// Booking persistence. The two concurrency-sensitive operations live here:
/// slot admission (`insert_booking_checked`) must re-check remaining capacity
/// and insert as one atomic unit, and `update_booking` is compare-and-swap
/// on the version counter so the ledger and the reconciliation listener
/// serialize their writes to the same record.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert the booking iff its occurrence still has room for its
    /// participants, given `slot_capacity` total seats. Losing the race
    /// fails with `StoreError::SlotFull`.
    async fn insert_booking_checked(
        &self,
        booking: &Booking,
        slot_capacity: u32,
    ) -> StoreResult<()>;

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    async fn find_by_gateway_payment(
        &self,
        gateway_payment_id: &str,
    ) -> StoreResult<Option<Booking>>;

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>>;

    async fn list_for_occurrence(&self, occurrence: &OccurrenceKey) -> StoreResult<Vec<Booking>>;

    /// Participants currently consuming capacity at the occurrence.
    async fn booked_participants(&self, occurrence: &OccurrenceKey) -> StoreResult<u32>;

    /// Persist the booking iff the stored version still equals
    /// `expected_version`; the committed record carries `expected_version + 1`.
    /// Fails with `StoreError::VersionConflict` when another writer won.
    async fn update_booking(&self, booking: &Booking, expected_version: i64) -> StoreResult<()>;

    /// Whether a gateway event id has already been applied.
    async fn is_event_processed(&self, event_id: &str) -> StoreResult<bool>;

    /// Record a gateway event id as applied; returns false if it was
    /// already there.
    async fn mark_event_processed(&self, event_id: &str) -> StoreResult<bool>;
}
