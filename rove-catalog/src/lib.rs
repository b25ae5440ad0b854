pub mod activity;
pub mod pricing;
pub mod availability;
pub mod directory;

pub use activity::{Activity, ActivityPricing, Capacity, Discount, OccurrenceKey, Schedule, TimeSlot, Vendor};
pub use availability::AvailabilityError;
pub use directory::ActivityDirectory;
pub use pricing::{FeeSchedule, PriceQuote};
