use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use rove_booking::{Booking, BookingRepository};
use rove_catalog::OccurrenceKey;
use rove_core::repository::{StoreError, StoreResult};

/// Postgres-backed booking store. All queries are runtime-bound so the build
/// does not depend on a live database. The full booking rides in a JSONB
/// payload column; the scalar columns exist for lookups and for the
/// concurrency guards (slot admission under an advisory lock, CAS on the
/// version column).
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn backend(e: sqlx::Error) -> StoreError {
        StoreError::Backend(e.to_string())
    }

    fn decode(row: &sqlx::postgres::PgRow) -> StoreResult<Booking> {
        let payload: serde_json::Value = row.try_get("payload").map_err(Self::backend)?;
        let version: i64 = row.try_get("version").map_err(Self::backend)?;
        let mut booking: Booking =
            serde_json::from_value(payload).map_err(|e| StoreError::Backend(e.to_string()))?;
        // the column is authoritative; the payload copy may lag by one write
        booking.version = version;
        Ok(booking)
    }

    fn lock_key(occurrence: &OccurrenceKey) -> String {
        format!(
            "{}:{}:{}",
            occurrence.activity_id, occurrence.date, occurrence.start_time
        )
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert_booking_checked(
        &self,
        booking: &Booking,
        slot_capacity: u32,
    ) -> StoreResult<()> {
        let occurrence = booking.occurrence();
        let mut tx = self.pool.begin().await.map_err(Self::backend)?;

        // serialize admissions per occurrence for the duration of this tx
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(Self::lock_key(&occurrence))
            .execute(&mut *tx)
            .await
            .map_err(Self::backend)?;

        let booked: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(participant_count), 0) FROM bookings \
             WHERE activity_id = $1 AND slot_date = $2 AND slot_start = $3 \
             AND status <> 'CANCELLED'",
        )
        .bind(occurrence.activity_id)
        .bind(occurrence.date)
        .bind(occurrence.start_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(Self::backend)?;

        let remaining = (slot_capacity as i64 - booked).max(0) as u32;
        if booking.participant_count() > remaining {
            return Err(StoreError::SlotFull {
                requested: booking.participant_count(),
                remaining,
            });
        }

        let payload =
            serde_json::to_value(booking).map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query(
            "INSERT INTO bookings \
             (id, reference, user_id, activity_id, vendor_id, slot_date, slot_start, slot_end, \
              participant_count, status, gateway_payment_id, version, payload, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(booking.id)
        .bind(&booking.reference)
        .bind(booking.user_id)
        .bind(booking.activity_id)
        .bind(booking.vendor_id)
        .bind(booking.slot.date)
        .bind(booking.slot.start_time)
        .bind(booking.slot.end_time)
        .bind(booking.participant_count() as i32)
        .bind(booking.status.as_str())
        .bind(&booking.payment.gateway_payment_id)
        .bind(booking.version)
        .bind(payload)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Duplicate,
            other => Self::backend(other),
        })?;

        tx.commit().await.map_err(Self::backend)
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let row = sqlx::query("SELECT payload, version FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::backend)?;
        row.map(|r| Self::decode(&r)).transpose()
    }

    async fn find_by_gateway_payment(
        &self,
        gateway_payment_id: &str,
    ) -> StoreResult<Option<Booking>> {
        let row =
            sqlx::query("SELECT payload, version FROM bookings WHERE gateway_payment_id = $1")
                .bind(gateway_payment_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Self::backend)?;
        row.map(|r| Self::decode(&r)).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query(
            "SELECT payload, version FROM bookings WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::backend)?;
        rows.iter().map(Self::decode).collect()
    }

    async fn list_for_occurrence(&self, occurrence: &OccurrenceKey) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query(
            "SELECT payload, version FROM bookings \
             WHERE activity_id = $1 AND slot_date = $2 AND slot_start = $3",
        )
        .bind(occurrence.activity_id)
        .bind(occurrence.date)
        .bind(occurrence.start_time)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::backend)?;
        rows.iter().map(Self::decode).collect()
    }

    async fn booked_participants(&self, occurrence: &OccurrenceKey) -> StoreResult<u32> {
        let booked: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(participant_count), 0) FROM bookings \
             WHERE activity_id = $1 AND slot_date = $2 AND slot_start = $3 \
             AND status <> 'CANCELLED'",
        )
        .bind(occurrence.activity_id)
        .bind(occurrence.date)
        .bind(occurrence.start_time)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::backend)?;
        Ok(booked.max(0) as u32)
    }

    async fn update_booking(&self, booking: &Booking, expected_version: i64) -> StoreResult<()> {
        let mut record = booking.clone();
        record.version = expected_version + 1;
        let payload =
            serde_json::to_value(&record).map_err(|e| StoreError::Backend(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE bookings SET status = $1, gateway_payment_id = $2, payload = $3, \
             updated_at = $4, version = version + 1 \
             WHERE id = $5 AND version = $6",
        )
        .bind(record.status.as_str())
        .bind(&record.payment.gateway_payment_id)
        .bind(payload)
        .bind(record.updated_at)
        .bind(record.id)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(Self::backend)?;

        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bookings WHERE id = $1)")
                    .bind(record.id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(Self::backend)?;
            return Err(if exists {
                StoreError::VersionConflict
            } else {
                StoreError::NotFound
            });
        }
        Ok(())
    }

    async fn is_event_processed(&self, event_id: &str) -> StoreResult<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM processed_events WHERE event_id = $1)")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Self::backend)
    }

    async fn mark_event_processed(&self, event_id: &str) -> StoreResult<bool> {
        let result =
            sqlx::query("INSERT INTO processed_events (event_id) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(event_id)
                .execute(&self.pool)
                .await
                .map_err(Self::backend)?;
        Ok(result.rows_affected() == 1)
    }
}
