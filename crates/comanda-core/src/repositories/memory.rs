//! In-process registry.
//!
//! Backs the test suites and single-process tooling. One mutex guards the
//! whole table, which makes every allocate-and-reserve operation trivially
//! serialized.

use std::collections::BTreeSet;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::allocator::{next_available_port, PortRange};
use crate::domain::{normalize_email, NewRestaurant, Restaurant, RestaurantPatch};
use crate::error::DomainError;
use crate::repositories::RestaurantRepository;
use crate::subdomain::derive_subdomain;

#[derive(Default)]
pub struct InMemoryRestaurantRepository {
    rows: Mutex<Vec<Restaurant>>,
}

impl InMemoryRestaurantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with pre-built records, e.g. rows migrated from a legacy store.
    pub fn with_records(records: Vec<Restaurant>) -> Self {
        Self {
            rows: Mutex::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

fn occupied(rows: &[Restaurant]) -> BTreeSet<u16> {
    rows.iter().filter_map(|r| r.port).collect()
}

#[async_trait]
impl RestaurantRepository for InMemoryRestaurantRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Restaurant>, DomainError> {
        Ok(self.rows.lock().iter().find(|r| &r.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Restaurant>, DomainError> {
        let email = normalize_email(email);
        Ok(self.rows.lock().iter().find(|r| r.email == email).cloned())
    }

    async fn list(&self) -> Result<Vec<Restaurant>, DomainError> {
        Ok(self.rows.lock().clone())
    }

    async fn list_active(&self) -> Result<Vec<Restaurant>, DomainError> {
        Ok(self.rows.lock().iter().filter(|r| r.active).cloned().collect())
    }

    async fn occupied_ports(&self) -> Result<BTreeSet<u16>, DomainError> {
        Ok(occupied(&self.rows.lock()))
    }

    async fn create(&self, new: &NewRestaurant, ports: Option<PortRange>) -> Result<Restaurant, DomainError> {
        let mut rows = self.rows.lock();

        if rows.iter().any(|r| r.email == new.email) {
            return Err(DomainError::EmailAlreadyExists(new.email.clone()));
        }

        let subdomain = derive_subdomain(&new.name, |candidate| {
            rows.iter().any(|r| r.subdomain == candidate)
        });
        let port = match ports {
            Some(range) => Some(next_available_port(&occupied(&rows), range)?),
            None => None,
        };

        let record = new.clone().into_record(subdomain, port);
        rows.push(record.clone());

        info!("Restaurant created: {} ({}) port={:?}", record.name, record.subdomain, record.port);
        Ok(record)
    }

    async fn reserve_port(&self, id: &Uuid, ports: PortRange) -> Result<Option<Restaurant>, DomainError> {
        let mut rows = self.rows.lock();
        let taken = occupied(&rows);

        let Some(record) = rows.iter_mut().find(|r| &r.id == id) else {
            return Ok(None);
        };
        if record.port.is_none() {
            record.port = Some(next_available_port(&taken, ports)?);
            record.updated_at = Some(chrono::Utc::now());
        }
        Ok(Some(record.clone()))
    }

    async fn update(&self, id: &Uuid, patch: &RestaurantPatch) -> Result<Option<Restaurant>, DomainError> {
        let mut rows = self.rows.lock();

        if let Some(email) = &patch.email {
            if rows.iter().any(|r| &r.email == email && &r.id != id) {
                return Err(DomainError::EmailAlreadyExists(email.clone()));
            }
        }

        Ok(rows.iter_mut().find(|r| &r.id == id).map(|record| {
            record.apply(patch);
            record.clone()
        }))
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, DomainError> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|r| &r.id != id);
        Ok(rows.len() != before)
    }
}
