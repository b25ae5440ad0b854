use async_trait::async_trait;
use uuid::Uuid;
use rove_core::repository::StoreResult;
use crate::activity::{Activity, Vendor};

/// Read-only view of the activity catalog and vendor directory. Both are
/// owned by external systems; the engine only consumes them.
#[async_trait]
pub trait ActivityDirectory: Send + Sync {
    async fn get_activity(&self, id: Uuid) -> StoreResult<Option<Activity>>;

    async fn get_vendor(&self, id: Uuid) -> StoreResult<Option<Vendor>>;
}
