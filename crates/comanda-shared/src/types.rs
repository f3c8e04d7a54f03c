//! Common types

use uuid::Uuid;

/// Identifier of a tenant (restaurant) record.
pub type TenantId = Uuid;
