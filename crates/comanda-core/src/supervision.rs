//! Instance supervision trait (port).
//!
//! Implemented by the process supervisor. The lifecycle service only talks to
//! this trait, so it never knows how processes are launched.

use async_trait::async_trait;

use comanda_shared::TenantId;

use crate::domain::{ExitRecord, InstanceSnapshot, Restaurant};
use crate::error::DomainError;

#[async_trait]
pub trait InstanceControl: Send + Sync {
    /// Launch an instance for `restaurant`, or return the existing one.
    fn start(&self, restaurant: &Restaurant) -> Result<InstanceSnapshot, DomainError>;

    /// Signal the instance and drop it from the table without waiting for
    /// the process to exit. Returns whether an instance was present.
    fn stop(&self, tenant_id: &TenantId) -> bool;

    async fn restart(&self, restaurant: &Restaurant) -> Result<InstanceSnapshot, DomainError>;

    fn lookup(&self, tenant_id: &TenantId) -> Option<InstanceSnapshot>;

    fn running_count(&self) -> usize;

    fn last_exit(&self, tenant_id: &TenantId) -> Option<ExitRecord>;

    fn is_running(&self, tenant_id: &TenantId) -> bool {
        self.lookup(tenant_id).is_some()
    }
}
