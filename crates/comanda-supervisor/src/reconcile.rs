//! Startup reconciliation: bring the instance table in line with the
//! registry after a control-plane restart.

use tokio::time::sleep;
use tracing::{error, info, warn};

use comanda_core::repositories::RestaurantRepository;
use comanda_shared::TenantId;

use crate::error::SupervisorError;
use crate::registry::InstanceRegistry;

#[derive(Debug, Default, Clone)]
pub struct ReconcileReport {
    pub started: Vec<TenantId>,
    /// Active records that cannot run (unapproved or without a port).
    pub skipped: Vec<TenantId>,
    pub failed: Vec<(TenantId, String)>,
}

impl ReconcileReport {
    pub fn total(&self) -> usize {
        self.started.len() + self.skipped.len() + self.failed.len()
    }
}

impl InstanceRegistry {
    /// Start every active restaurant, one at a time with `startup_delay`
    /// between launches. A failed launch is logged and reported; the rest
    /// continue.
    pub async fn reconcile_on_startup(
        &self,
        repo: &dyn RestaurantRepository,
    ) -> Result<ReconcileReport, SupervisorError> {
        let restaurants = repo.list_active().await?;
        info!("🔄 Reconciling {} active restaurant(s)", restaurants.len());

        let mut report = ReconcileReport::default();
        let mut launched_any = false;

        for restaurant in restaurants {
            let Some(tenant) = restaurant.context().filter(|_| restaurant.should_run()) else {
                warn!(
                    "Skipping {} ({}): status={} port={:?}",
                    restaurant.name,
                    restaurant.id,
                    restaurant.subscription_status.as_str(),
                    restaurant.port
                );
                report.skipped.push(restaurant.id);
                continue;
            };

            if launched_any {
                sleep(self.options().startup_delay).await;
            }
            launched_any = true;

            match self.start_tenant(&tenant) {
                Ok(_) => report.started.push(restaurant.id),
                Err(e) => {
                    error!("{} failed to start during reconciliation: {}", tenant.log_tag(), e);
                    report.failed.push((restaurant.id, e.to_string()));
                }
            }
        }

        info!(
            "✅ Reconciliation done: {} started, {} skipped, {} failed",
            report.started.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }
}
