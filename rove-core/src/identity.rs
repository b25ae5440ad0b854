use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Vendor,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "CUSTOMER" => Some(Role::Customer),
            "VENDOR" => Some(Role::Vendor),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// The verified identity behind a request, as far as the engine cares:
/// who, in what role, and (for vendors) which vendor they act for. Produced
/// by the identity layer's token check, consumed by authorization gates.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
    pub vendor_id: Option<Uuid>,
}

impl Caller {
    pub fn customer(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Customer, vendor_id: None }
    }

    pub fn vendor(user_id: Uuid, vendor_id: Uuid) -> Self {
        Self { user_id, role: Role::Vendor, vendor_id: Some(vendor_id) }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Admin, vendor_id: None }
    }

    /// Vendor/admin capability check for operations on a vendor's bookings.
    pub fn can_manage(&self, vendor_id: Uuid) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Vendor => self.vendor_id == Some(vendor_id),
            Role::Customer => false,
        }
    }
}
