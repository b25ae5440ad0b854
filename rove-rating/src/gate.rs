use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use rove_booking::{BookingLedger, BookingRepository, BookingStatus, LedgerError};
use rove_catalog::OccurrenceKey;
use rove_core::repository::StoreError;

use crate::models::{CommunityRating, ParticipantRating, Rating};
use crate::repository::RatingRepository;

#[derive(Debug, thiserror::Error)]
pub enum RatingError {
    #[error("Rater holds no qualifying booking for this event")]
    NotAttended,

    #[error("This event was already rated by the rater")]
    AlreadyRated,

    #[error("Rated participant {0} did not attend this event")]
    InvalidParticipant(Uuid),

    #[error("Too few participant ratings: required {required}, got {provided}")]
    InsufficientParticipants {
        required: usize,
        provided: usize,
    },

    #[error("Rating values must be between 1 and 5")]
    OutOfRange,

    #[error(transparent)]
    Booking(#[from] LedgerError),

    #[error("Storage failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for RatingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => RatingError::AlreadyRated,
            other => RatingError::Store(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmitRatingRequest {
    pub rater_id: Uuid,
    pub occurrence: OccurrenceKey,
    pub participant_ratings: Vec<ParticipantRating>,
    pub event_score: u8,
    pub partner_score: u8,
    pub feedback: Option<String>,
}

/// Decides who may rate what, persists valid ratings, and keeps the
/// community-rating aggregates of the rated participants current.
pub struct RatingGate {
    ratings: Arc<dyn RatingRepository>,
    bookings: Arc<dyn BookingRepository>,
    ledger: Arc<BookingLedger>,
}

impl RatingGate {
    pub fn new(ratings: Arc<dyn RatingRepository>, ledger: Arc<BookingLedger>) -> Self {
        let bookings = ledger.repository();
        Self { ratings, bookings, ledger }
    }

    /// Validation runs in a fixed order: attendance, uniqueness, participant
    /// membership, minimum coverage, score range. Aggregate recomputation is
    /// an explicit step after the rating is persisted, never a storage hook.
    pub async fn submit(&self, req: SubmitRatingRequest) -> Result<Rating, RatingError> {
        let occurrence_bookings = self
            .bookings
            .list_for_occurrence(&req.occurrence)
            .await
            .map_err(RatingError::from)?;

        let rater_booking = occurrence_bookings
            .iter()
            .find(|b| {
                b.user_id == req.rater_id
                    && matches!(b.status, BookingStatus::Confirmed | BookingStatus::Completed)
            })
            .ok_or(RatingError::NotAttended)?;

        if self
            .ratings
            .get_rating(req.rater_id, &req.occurrence)
            .await
            .map_err(RatingError::from)?
            .is_some()
        {
            return Err(RatingError::AlreadyRated);
        }

        // Attendees: every booker plus every named participant with an
        // account, across the occurrence's non-cancelled bookings.
        let mut attendees: HashSet<Uuid> = HashSet::new();
        for booking in occurrence_bookings.iter().filter(|b| b.consumes_capacity()) {
            attendees.insert(booking.user_id);
            for participant in &booking.participants {
                if let Some(user_id) = participant.user_id {
                    attendees.insert(user_id);
                }
            }
        }

        let mut rated: HashSet<Uuid> = HashSet::new();
        for rating in &req.participant_ratings {
            let target = rating.participant_user_id;
            if target == req.rater_id || !attendees.contains(&target) {
                return Err(RatingError::InvalidParticipant(target));
            }
            rated.insert(target);
        }

        let other_attendees = attendees.len().saturating_sub(1);
        let required = other_attendees.min(2);
        if rated.len() < required {
            return Err(RatingError::InsufficientParticipants {
                required,
                provided: rated.len(),
            });
        }

        let in_range = |score: u8| (1..=5).contains(&score);
        if !in_range(req.event_score)
            || !in_range(req.partner_score)
            || req.participant_ratings.iter().any(|r| !in_range(r.score))
        {
            return Err(RatingError::OutOfRange);
        }

        let rating = Rating {
            id: Uuid::new_v4(),
            rater_id: req.rater_id,
            occurrence: req.occurrence,
            participant_ratings: req.participant_ratings,
            event_score: req.event_score,
            partner_score: req.partner_score,
            feedback: req.feedback,
            submitted_at: Utc::now(),
        };
        self.ratings.insert_rating(&rating).await?;

        // The review sub-record lands on the rater's booking once the event
        // is completed; a confirmed-but-not-completed booking rates without
        // one.
        if rater_booking.status == BookingStatus::Completed {
            self.ledger
                .attach_review(rater_booking.id, rating.event_score, rating.feedback.clone())
                .await?;
        }

        for user_id in rating.rated_participants() {
            self.recompute_aggregate(user_id).await?;
        }

        tracing::info!(
            rating = %rating.id,
            rater = %rating.rater_id,
            participants = rating.participant_ratings.len(),
            "rating submitted"
        );
        Ok(rating)
    }

    pub async fn community_rating(&self, user_id: Uuid) -> Result<CommunityRating, RatingError> {
        Ok(self
            .ratings
            .get_community_rating(user_id)
            .await
            .map_err(RatingError::from)?
            .unwrap_or_else(CommunityRating::empty))
    }

    async fn recompute_aggregate(&self, user_id: Uuid) -> Result<(), RatingError> {
        let scores = self
            .ratings
            .scores_for_user(user_id)
            .await
            .map_err(RatingError::from)?;
        let aggregate = CommunityRating::from_scores(&scores);
        self.ratings
            .put_community_rating(user_id, &aggregate)
            .await
            .map_err(RatingError::from)?;
        Ok(())
    }
}
