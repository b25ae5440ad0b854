pub mod app_config;
pub mod memory;
pub mod database;
pub mod booking_repo;
pub mod rating_repo;
pub mod events;

pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use events::{DomainEvent, EventBus};
pub use memory::MemoryStore;
pub use rating_repo::PgRatingRepository;
