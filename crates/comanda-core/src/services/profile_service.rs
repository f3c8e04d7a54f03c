//! Self-service profile for a restaurant owner, used by tenant processes.
//!
//! Only descriptive fields and the password can be changed here. Activation,
//! subscription and port stay under control-plane authority.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::domain::{Restaurant, RestaurantPatch};
use crate::error::DomainError;
use crate::repositories::RestaurantRepository;
use crate::services::hash_password;

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub password: Option<String>,
}

pub struct ProfileService {
    repo: Arc<dyn RestaurantRepository>,
}

impl ProfileService {
    pub fn new(repo: Arc<dyn RestaurantRepository>) -> Self {
        Self { repo }
    }

    pub async fn get(&self, id: &Uuid) -> Result<Restaurant, DomainError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(DomainError::RestaurantNotFound)
    }

    pub async fn update(&self, id: &Uuid, update: ProfileUpdate) -> Result<Restaurant, DomainError> {
        let password_hash = match update.password.as_deref() {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        let patch = RestaurantPatch {
            name: update.name.map(|n| n.trim().to_string()),
            phone: update.phone.map(|p| p.trim().to_string()),
            address: update.address.map(|a| a.trim().to_string()),
            password_hash,
            ..Default::default()
        };
        if patch.is_empty() {
            return Err(DomainError::EmptyPatch);
        }
        patch.validate()?;

        let updated = self
            .repo
            .update(id, &patch)
            .await?
            .ok_or(DomainError::RestaurantNotFound)?;

        info!("Profile updated for restaurant {}", id);
        Ok(updated)
    }
}
