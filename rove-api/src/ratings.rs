use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use rove_catalog::OccurrenceKey;
use rove_rating::{CommunityRating, ParticipantRating, Rating, SubmitRatingRequest};
use rove_shared::models::events::RatingSubmittedEvent;
use rove_store::DomainEvent;

use crate::auth::caller_from_token;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ParticipantRatingPayload {
    pub participant_user_id: Uuid,
    pub score: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRatingPayload {
    pub activity_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub participant_ratings: Vec<ParticipantRatingPayload>,
    pub event_score: u8,
    pub partner_score: u8,
    pub feedback: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/ratings", post(submit_rating))
        .route("/v1/users/{id}/community-rating", get(community_rating))
}

/// POST /v1/ratings
async fn submit_rating(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<SubmitRatingPayload>,
) -> Result<Json<Rating>, AppError> {
    let caller = caller_from_token(&state, bearer.token())?;

    let rating = state
        .rating_gate
        .submit(SubmitRatingRequest {
            rater_id: caller.user_id,
            occurrence: OccurrenceKey {
                activity_id: payload.activity_id,
                date: payload.date,
                start_time: payload.start_time,
            },
            participant_ratings: payload
                .participant_ratings
                .into_iter()
                .map(|p| ParticipantRating {
                    participant_user_id: p.participant_user_id,
                    score: p.score,
                    comment: p.comment,
                })
                .collect(),
            event_score: payload.event_score,
            partner_score: payload.partner_score,
            feedback: payload.feedback,
        })
        .await?;

    state.events.publish(DomainEvent::RatingSubmitted(RatingSubmittedEvent {
        rating_id: rating.id,
        rater_id: rating.rater_id,
        activity_id: rating.occurrence.activity_id,
        rated_participants: rating.rated_participants(),
        timestamp: Utc::now().timestamp(),
    }));

    Ok(Json(rating))
}

/// GET /v1/users/{id}/community-rating
async fn community_rating(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<CommunityRating>, AppError> {
    Ok(Json(state.rating_gate.community_rating(user_id).await?))
}
