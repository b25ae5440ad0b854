use async_trait::async_trait;
use uuid::Uuid;

use rove_catalog::OccurrenceKey;
use rove_core::repository::StoreResult;
use crate::models::{CommunityRating, Rating};

#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Fails with `StoreError::Duplicate` when the rater has already rated
    /// this occurrence.
    async fn insert_rating(&self, rating: &Rating) -> StoreResult<()>;

    async fn get_rating(
        &self,
        rater_id: Uuid,
        occurrence: &OccurrenceKey,
    ) -> StoreResult<Option<Rating>>;

    /// Every participant score ever given to this user, across all ratings.
    async fn scores_for_user(&self, user_id: Uuid) -> StoreResult<Vec<u8>>;

    async fn put_community_rating(
        &self,
        user_id: Uuid,
        aggregate: &CommunityRating,
    ) -> StoreResult<()>;

    async fn get_community_rating(&self, user_id: Uuid) -> StoreResult<Option<CommunityRating>>;
}
