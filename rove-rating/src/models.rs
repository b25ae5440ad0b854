use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rove_catalog::OccurrenceKey;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantRating {
    pub participant_user_id: Uuid,
    pub score: u8,
    pub comment: Option<String>,
}

/// One rating per (rater, occurrence), enforced by the store. Carries the
/// per-participant scores plus one event score and one partner score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: Uuid,
    pub rater_id: Uuid,
    pub occurrence: OccurrenceKey,
    pub participant_ratings: Vec<ParticipantRating>,
    pub event_score: u8,
    pub partner_score: u8,
    pub feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl Rating {
    pub fn rated_participants(&self) -> Vec<Uuid> {
        self.participant_ratings
            .iter()
            .map(|r| r.participant_user_id)
            .collect()
    }
}

/// Per-user aggregate over every participant score referencing them:
/// running average plus a 1–5 histogram. Recomputed from the full rating
/// set whenever a new rating lands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommunityRating {
    pub average: f64,
    pub total: i64,
    pub distribution: [i64; 5],
}

impl CommunityRating {
    pub fn empty() -> Self {
        Self { average: 0.0, total: 0, distribution: [0; 5] }
    }

    /// Scores are 1..=5; anything else was rejected upstream.
    pub fn from_scores(scores: &[u8]) -> Self {
        if scores.is_empty() {
            return Self::empty();
        }
        let mut distribution = [0i64; 5];
        let mut sum = 0i64;
        for &score in scores {
            sum += score as i64;
            distribution[(score as usize).saturating_sub(1).min(4)] += 1;
        }
        let average = (sum as f64 / scores.len() as f64 * 100.0).round() / 100.0;
        Self { average, total: scores.len() as i64, distribution }
    }
}
