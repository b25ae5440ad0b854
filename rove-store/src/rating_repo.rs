use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use rove_catalog::OccurrenceKey;
use rove_core::repository::{StoreError, StoreResult};
use rove_rating::{CommunityRating, Rating, RatingRepository};

/// Postgres-backed rating store. The (rater, occurrence) uniqueness the gate
/// relies on is a table constraint, so a racing double submission loses at
/// the insert.
pub struct PgRatingRepository {
    pool: PgPool,
}

impl PgRatingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn backend(e: sqlx::Error) -> StoreError {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
impl RatingRepository for PgRatingRepository {
    async fn insert_rating(&self, rating: &Rating) -> StoreResult<()> {
        let payload =
            serde_json::to_value(rating).map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query(
            "INSERT INTO ratings (id, rater_id, activity_id, slot_date, slot_start, payload, submitted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(rating.id)
        .bind(rating.rater_id)
        .bind(rating.occurrence.activity_id)
        .bind(rating.occurrence.date)
        .bind(rating.occurrence.start_time)
        .bind(payload)
        .bind(rating.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Duplicate,
            other => Self::backend(other),
        })?;
        Ok(())
    }

    async fn get_rating(
        &self,
        rater_id: Uuid,
        occurrence: &OccurrenceKey,
    ) -> StoreResult<Option<Rating>> {
        let row = sqlx::query(
            "SELECT payload FROM ratings \
             WHERE rater_id = $1 AND activity_id = $2 AND slot_date = $3 AND slot_start = $4",
        )
        .bind(rater_id)
        .bind(occurrence.activity_id)
        .bind(occurrence.date)
        .bind(occurrence.start_time)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::backend)?;

        row.map(|r| {
            let payload: serde_json::Value = r.try_get("payload").map_err(Self::backend)?;
            serde_json::from_value(payload).map_err(|e| StoreError::Backend(e.to_string()))
        })
        .transpose()
    }

    async fn scores_for_user(&self, user_id: Uuid) -> StoreResult<Vec<u8>> {
        let scores: Vec<i32> = sqlx::query_scalar(
            "SELECT (p->>'score')::int FROM ratings, \
             jsonb_array_elements(payload->'participant_ratings') AS p \
             WHERE p->>'participant_user_id' = $1",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(Self::backend)?;
        Ok(scores.into_iter().map(|s| s.clamp(0, 255) as u8).collect())
    }

    async fn put_community_rating(
        &self,
        user_id: Uuid,
        aggregate: &CommunityRating,
    ) -> StoreResult<()> {
        let distribution = serde_json::to_value(aggregate.distribution)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query(
            "INSERT INTO community_ratings (user_id, average, total, distribution, updated_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (user_id) DO UPDATE \
             SET average = $2, total = $3, distribution = $4, updated_at = now()",
        )
        .bind(user_id)
        .bind(aggregate.average)
        .bind(aggregate.total)
        .bind(distribution)
        .execute(&self.pool)
        .await
        .map_err(Self::backend)?;
        Ok(())
    }

    async fn get_community_rating(&self, user_id: Uuid) -> StoreResult<Option<CommunityRating>> {
        let row = sqlx::query(
            "SELECT average, total, distribution FROM community_ratings WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::backend)?;

        row.map(|r| {
            let average: f64 = r.try_get("average").map_err(Self::backend)?;
            let total: i64 = r.try_get("total").map_err(Self::backend)?;
            let distribution: serde_json::Value =
                r.try_get("distribution").map_err(Self::backend)?;
            let distribution: [i64; 5] = serde_json::from_value(distribution)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            Ok(CommunityRating { average, total, distribution })
        })
        .transpose()
    }
}
