// ============================================================================
// Comanda Core - Restaurant Lifecycle Service
// File: crates/comanda-core/src/services/restaurant_service.rs
// Description: Tenant CRUD, approval flow, activation and instance control
// ============================================================================
//! Restaurant lifecycle service.
//!
//! Owns the rules that tie a tenant record to its running instance: a record
//! gets a port exactly once, an instance runs only while the record is
//! active and approved, and every transition that flips `active` starts or
//! stops the instance through [`InstanceControl`].

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::allocator::{next_available_port, PortRange};
use crate::domain::{
    normalize_email, ExitRecord, InstanceSnapshot, NewRestaurant, Restaurant, RestaurantPatch,
    SubscriptionStatus,
};
use crate::error::DomainError;
use crate::repositories::RestaurantRepository;
use crate::services::hash_password;
use crate::supervision::InstanceControl;

/// Operator input for a restaurant created directly in active state.
#[derive(Debug, Clone)]
pub struct CreateRestaurant {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Operator-facing partial update. A plaintext password is hashed before it
/// reaches the registry.
#[derive(Debug, Clone, Default)]
pub struct RestaurantUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub active: Option<bool>,
    pub subscription_status: Option<SubscriptionStatus>,
}

impl RestaurantUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.active.is_none()
            && self.subscription_status.is_none()
    }
}

/// Record joined with the live state of its instance.
#[derive(Debug, Clone)]
pub struct RestaurantView {
    pub restaurant: Restaurant,
    pub instance: Option<InstanceSnapshot>,
    pub last_exit: Option<ExitRecord>,
}

impl RestaurantView {
    pub fn instance_active(&self) -> bool {
        self.instance.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SystemStatus {
    pub master_port: u16,
    pub total_restaurants: usize,
    pub active_instances: usize,
    /// `None` once the range is exhausted.
    pub next_available_port: Option<u16>,
    pub restaurants: Vec<RestaurantView>,
}

pub struct RestaurantService {
    repo: Arc<dyn RestaurantRepository>,
    instances: Arc<dyn InstanceControl>,
    ports: PortRange,
    master_port: u16,
}

impl RestaurantService {
    pub fn new(
        repo: Arc<dyn RestaurantRepository>,
        instances: Arc<dyn InstanceControl>,
        ports: PortRange,
        master_port: u16,
    ) -> Self {
        Self {
            repo,
            instances,
            ports,
            master_port,
        }
    }

    pub fn port_range(&self) -> PortRange {
        self.ports
    }

    /// Create an active restaurant, reserve its port and start its instance.
    ///
    /// A failed launch is reported as `SpawnError`; the record stays in the
    /// registry so the operator can retry with `restart` or `activate`.
    pub async fn create(&self, input: CreateRestaurant) -> Result<Restaurant, DomainError> {
        info!("Creating restaurant: {}", input.name);

        // 1. Hash credential
        let password_hash = hash_password(&input.password)?;

        // 2. Validate and normalize
        let new = NewRestaurant::new(
            input.name,
            input.email,
            password_hash,
            input.phone,
            input.address,
            SubscriptionStatus::Active,
        )?;

        // 3. Insert with port reservation
        let restaurant = self.repo.create(&new, Some(self.ports)).await?;
        info!(
            "Restaurant created: {} (subdomain={}, port={:?})",
            restaurant.id, restaurant.subdomain, restaurant.port
        );

        // 4. Launch
        self.launch(&restaurant)?;

        Ok(restaurant)
    }

    pub async fn list(&self) -> Result<Vec<RestaurantView>, DomainError> {
        let restaurants = self.repo.list().await?;
        Ok(restaurants.into_iter().map(|r| self.view(r)).collect())
    }

    pub async fn get(&self, id: &Uuid) -> Result<RestaurantView, DomainError> {
        let restaurant = self.require(id).await?;
        Ok(self.view(restaurant))
    }

    /// Apply a partial update. Only a change of `active` starts or stops the
    /// instance; a record leaving the approved state is stopped as well.
    ///
    /// The only status change an update may make is cancellation. Approval
    /// goes through [`RestaurantService::approve`] and cancelled is terminal.
    pub async fn update(&self, id: &Uuid, update: RestaurantUpdate) -> Result<RestaurantView, DomainError> {
        if update.is_empty() {
            return Err(DomainError::EmptyPatch);
        }

        let current = self.require(id).await?;

        let password_hash = match update.password.as_deref() {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        let mut patch = RestaurantPatch {
            name: update.name.map(|n| n.trim().to_string()),
            email: update.email.as_deref().map(normalize_email),
            password_hash,
            phone: update.phone.map(|p| p.trim().to_string()),
            address: update.address.map(|a| a.trim().to_string()),
            active: update.active,
            subscription_status: update.subscription_status,
        };
        patch.validate()?;

        if let Some(next) = patch.subscription_status {
            check_status_change(current.subscription_status, next)?;
        }

        // An instance may only run for an approved subscription.
        let next_status = patch.subscription_status.unwrap_or(current.subscription_status);
        if next_status != SubscriptionStatus::Active {
            if patch.active == Some(true) {
                return Err(DomainError::InvalidTransition {
                    action: "activate",
                    state: next_status.as_str().to_string(),
                });
            }
            if current.active {
                patch.active = Some(false);
            }
        }

        let mut updated = self
            .repo
            .update(id, &patch)
            .await?
            .ok_or(DomainError::RestaurantNotFound)?;

        if updated.active && !current.active {
            updated = self.ensure_port(updated).await?;
            self.launch(&updated)?;
        } else if !updated.should_run() && self.instances.stop(id) {
            info!("Instance stopped after update: {}", id);
        }

        Ok(self.view(updated))
    }

    /// Approve a pending registration: reserve a port, mark active, start.
    pub async fn approve(&self, id: &Uuid) -> Result<RestaurantView, DomainError> {
        let current = self.require(id).await?;
        if current.subscription_status != SubscriptionStatus::Pending {
            return Err(DomainError::InvalidTransition {
                action: "approve",
                state: current.subscription_status.as_str().to_string(),
            });
        }

        self.repo
            .reserve_port(id, self.ports)
            .await?
            .ok_or(DomainError::RestaurantNotFound)?;

        let approved = self
            .repo
            .update(id, &RestaurantPatch::status(SubscriptionStatus::Active, true))
            .await?
            .ok_or(DomainError::RestaurantNotFound)?;

        info!("Restaurant approved: {} (port={:?})", approved.id, approved.port);

        self.launch(&approved)?;
        Ok(self.view(approved))
    }

    pub async fn reject(&self, id: &Uuid) -> Result<RestaurantView, DomainError> {
        let current = self.require(id).await?;
        if current.subscription_status != SubscriptionStatus::Pending {
            return Err(DomainError::InvalidTransition {
                action: "reject",
                state: current.subscription_status.as_str().to_string(),
            });
        }

        let rejected = self
            .repo
            .update(id, &RestaurantPatch::status(SubscriptionStatus::Cancelled, false))
            .await?
            .ok_or(DomainError::RestaurantNotFound)?;

        info!("Restaurant rejected: {}", id);
        Ok(self.view(rejected))
    }

    /// Mark active and start. Starting an already running instance is a
    /// no-op that returns the existing one.
    pub async fn activate(&self, id: &Uuid) -> Result<RestaurantView, DomainError> {
        let current = self.require(id).await?;
        if !current.is_approved() {
            return Err(DomainError::InvalidTransition {
                action: "activate",
                state: current.subscription_status.as_str().to_string(),
            });
        }

        let restaurant = if current.active {
            current
        } else {
            self.repo
                .update(id, &RestaurantPatch::activation(true))
                .await?
                .ok_or(DomainError::RestaurantNotFound)?
        };

        let restaurant = self.ensure_port(restaurant).await?;
        self.launch(&restaurant)?;

        info!("Restaurant activated: {} (port={:?})", id, restaurant.port);
        Ok(self.view(restaurant))
    }

    /// Mark inactive and stop. The port stays reserved.
    pub async fn deactivate(&self, id: &Uuid) -> Result<RestaurantView, DomainError> {
        let current = self.require(id).await?;

        let restaurant = if current.active {
            self.repo
                .update(id, &RestaurantPatch::activation(false))
                .await?
                .ok_or(DomainError::RestaurantNotFound)?
        } else {
            current
        };

        if self.instances.stop(id) {
            info!("Restaurant deactivated, instance stopped: {}", id);
        } else {
            info!("Restaurant deactivated, no instance was running: {}", id);
        }

        Ok(self.view(restaurant))
    }

    /// Stop the instance and delete the record with everything hanging off
    /// it. Returns whether an instance was running.
    pub async fn delete(&self, id: &Uuid) -> Result<bool, DomainError> {
        self.require(id).await?;

        let was_running = self.instances.stop(id);

        if !self.repo.delete(id).await? {
            return Err(DomainError::RestaurantNotFound);
        }

        info!("Restaurant deleted: {} (instance_was_running={})", id, was_running);
        Ok(was_running)
    }

    /// Stop and start again on the same port.
    pub async fn restart(&self, id: &Uuid) -> Result<RestaurantView, DomainError> {
        let restaurant = self.require(id).await?;

        if !restaurant.should_run() {
            let state = if !restaurant.is_approved() {
                restaurant.subscription_status.as_str()
            } else {
                "inactive"
            };
            return Err(DomainError::InvalidTransition {
                action: "restart",
                state: state.to_string(),
            });
        }

        let snapshot = self.instances.restart(&restaurant).await.map_err(|e| {
            error!("Restart failed for {}: {}", id, e);
            e
        })?;

        info!("Restaurant restarted: {} (pid={:?})", id, snapshot.pid);
        Ok(self.view(restaurant))
    }

    pub async fn system_status(&self) -> Result<SystemStatus, DomainError> {
        let restaurants = self.list().await?;
        let next_available_port = match self.next_available_port().await {
            Ok(port) => Some(port),
            Err(DomainError::PortRangeExhausted { .. }) => None,
            Err(e) => return Err(e),
        };

        Ok(SystemStatus {
            master_port: self.master_port,
            total_restaurants: restaurants.len(),
            active_instances: self.instances.running_count(),
            next_available_port,
            restaurants,
        })
    }

    /// Lowest free port right now. Advisory only; reservation happens in the
    /// registry.
    pub async fn next_available_port(&self) -> Result<u16, DomainError> {
        let occupied = self.repo.occupied_ports().await?;
        next_available_port(&occupied, self.ports)
    }

    async fn require(&self, id: &Uuid) -> Result<Restaurant, DomainError> {
        self.repo.find_by_id(id).await?.ok_or_else(|| {
            warn!("Restaurant not found: {}", id);
            DomainError::RestaurantNotFound
        })
    }

    async fn ensure_port(&self, restaurant: Restaurant) -> Result<Restaurant, DomainError> {
        if restaurant.port.is_some() {
            return Ok(restaurant);
        }
        self.repo
            .reserve_port(&restaurant.id, self.ports)
            .await?
            .ok_or(DomainError::RestaurantNotFound)
    }

    fn launch(&self, restaurant: &Restaurant) -> Result<InstanceSnapshot, DomainError> {
        self.instances.start(restaurant).map_err(|e| {
            error!("Failed to start instance for {}: {}", restaurant.id, e);
            e
        })
    }

    fn view(&self, restaurant: Restaurant) -> RestaurantView {
        RestaurantView {
            instance: self.instances.lookup(&restaurant.id),
            last_exit: self.instances.last_exit(&restaurant.id),
            restaurant,
        }
    }
}

fn check_status_change(from: SubscriptionStatus, to: SubscriptionStatus) -> Result<(), DomainError> {
    if from == to || to == SubscriptionStatus::Cancelled {
        return Ok(());
    }
    let action = if from == SubscriptionStatus::Cancelled {
        "reopen"
    } else {
        "change the subscription of"
    };
    Err(DomainError::InvalidTransition {
        action,
        state: from.as_str().to_string(),
    })
}
