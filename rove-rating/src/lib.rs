pub mod models;
pub mod repository;
pub mod gate;

pub use gate::{RatingError, RatingGate, SubmitRatingRequest};
pub use models::{CommunityRating, ParticipantRating, Rating};
pub use repository::RatingRepository;
