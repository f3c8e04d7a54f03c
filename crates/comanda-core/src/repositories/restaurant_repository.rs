//! Restaurant repository trait (port)

use std::collections::BTreeSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::allocator::PortRange;
use crate::domain::{NewRestaurant, Restaurant, RestaurantPatch};
use crate::error::DomainError;

/// Durable tenant registry.
///
/// `create` (with a range) and `reserve_port` are the only operations that
/// assign ports. Implementations must run the read of the occupied set and
/// the write of the new port as one serialized unit so that two concurrent
/// callers can never observe the same free port.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RestaurantRepository: Send + Sync {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Restaurant>, DomainError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Restaurant>, DomainError>;
    async fn list(&self) -> Result<Vec<Restaurant>, DomainError>;
    async fn list_active(&self) -> Result<Vec<Restaurant>, DomainError>;

    /// Ports held by any record, active or not.
    async fn occupied_ports(&self) -> Result<BTreeSet<u16>, DomainError>;

    /// Insert a record, deriving a unique subdomain and, when `ports` is
    /// given, reserving the next free port in the same unit of work.
    async fn create(&self, new: &NewRestaurant, ports: Option<PortRange>) -> Result<Restaurant, DomainError>;

    /// Assign a port to a record that has none. A record that already holds
    /// a port is returned unchanged.
    async fn reserve_port(&self, id: &Uuid, ports: PortRange) -> Result<Option<Restaurant>, DomainError>;

    async fn update(&self, id: &Uuid, patch: &RestaurantPatch) -> Result<Option<Restaurant>, DomainError>;

    /// Delete the record and, through the schema, everything that hangs off it.
    async fn delete(&self, id: &Uuid) -> Result<bool, DomainError>;
}
