/// Shared error vocabulary spoken by every storage backend. The concrete
/// repository traits live next to the aggregates they persist (bookings,
/// ratings, catalog) so their signatures can use the domain types directly.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Slot is full: requested {requested}, remaining {remaining}")]
    SlotFull {
        requested: u32,
        remaining: u32,
    },

    #[error("Concurrent update lost the version race")]
    VersionConflict,

    #[error("Record already exists")]
    Duplicate,

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
