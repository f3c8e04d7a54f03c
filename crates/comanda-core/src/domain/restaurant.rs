// ============================================================================
// Comanda Core - Restaurant Entity
// File: crates/comanda-core/src/domain/restaurant.rs
// Description: Tenant record, creation input and typed partial update
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use comanda_shared::TenantContext;

/// Subscription status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubscriptionStatus::Pending),
            "active" => Some(SubscriptionStatus::Active),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            _ => None,
        }
    }
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        SubscriptionStatus::Pending
    }
}

/// Restaurant (tenant) record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub email: String,

    /// Stored credential: Argon2, legacy bcrypt, or legacy plaintext.
    #[serde(skip_serializing, default)]
    pub password: String,

    pub phone: Option<String>,
    pub address: Option<String>,

    /// Assigned once, never changed afterwards.
    pub port: Option<u16>,
    pub subdomain: String,

    pub active: bool,
    pub subscription_status: SubscriptionStatus,

    // Audit fields
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Restaurant {
    pub fn is_approved(&self) -> bool {
        self.subscription_status == SubscriptionStatus::Active
    }

    /// Whether the supervisor should keep an instance running for this record.
    pub fn should_run(&self) -> bool {
        self.active && self.is_approved() && self.port.is_some()
    }

    /// Process context handed to the tenant server. `None` until a port is
    /// assigned.
    pub fn context(&self) -> Option<TenantContext> {
        self.port.map(|port| TenantContext {
            tenant_id: self.id,
            port,
            subdomain: self.subdomain.clone(),
            name: self.name.clone(),
        })
    }

    /// Apply a partial update in place. Port and subdomain are not part of
    /// the patch and therefore never change here.
    pub fn apply(&mut self, patch: &RestaurantPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(email) = &patch.email {
            self.email = email.clone();
        }
        if let Some(password_hash) = &patch.password_hash {
            self.password = password_hash.clone();
        }
        if let Some(phone) = &patch.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(address) = &patch.address {
            self.address = Some(address.clone());
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        if let Some(status) = patch.subscription_status {
            self.subscription_status = status;
        }
        self.updated_at = Some(Utc::now());
    }
}

/// Input for a new tenant record. The registry assigns id, subdomain,
/// timestamps and (optionally) the port.
#[derive(Debug, Clone, Validate)]
pub struct NewRestaurant {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email"))]
    pub email: String,

    pub password_hash: String,

    #[validate(length(max = 30, message = "Phone too long"))]
    pub phone: Option<String>,

    #[validate(length(max = 255, message = "Address too long"))]
    pub address: Option<String>,

    pub status: SubscriptionStatus,
}

impl NewRestaurant {
    pub fn new(
        name: String,
        email: String,
        password_hash: String,
        phone: Option<String>,
        address: Option<String>,
        status: SubscriptionStatus,
    ) -> Result<Self, validator::ValidationErrors> {
        let new = Self {
            name: name.trim().to_string(),
            email: normalize_email(&email),
            password_hash,
            phone: non_blank(phone),
            address: non_blank(address),
            status,
        };

        new.validate()?;
        Ok(new)
    }

    /// Record as stored by the registry once the allocations are known.
    pub fn into_record(self, subdomain: String, port: Option<u16>) -> Restaurant {
        Restaurant {
            id: Uuid::new_v4(),
            name: self.name,
            email: self.email,
            password: self.password_hash,
            phone: self.phone,
            address: self.address,
            port,
            subdomain,
            active: self.status == SubscriptionStatus::Active,
            subscription_status: self.status,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

/// Typed partial update. Every `Some` field is written; `None` fields are
/// left untouched.
#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct RestaurantPatch {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email"))]
    pub email: Option<String>,

    pub password_hash: Option<String>,

    #[validate(length(max = 30, message = "Phone too long"))]
    pub phone: Option<String>,

    #[validate(length(max = 255, message = "Address too long"))]
    pub address: Option<String>,

    pub active: Option<bool>,
    pub subscription_status: Option<SubscriptionStatus>,
}

impl RestaurantPatch {
    pub fn is_empty(&self) -> bool {
        self == &RestaurantPatch::default()
    }

    pub fn activation(active: bool) -> Self {
        Self {
            active: Some(active),
            ..Default::default()
        }
    }

    pub fn status(status: SubscriptionStatus, active: bool) -> Self {
        Self {
            active: Some(active),
            subscription_status: Some(status),
            ..Default::default()
        }
    }

    pub fn password(password_hash: String) -> Self {
        Self {
            password_hash: Some(password_hash),
            ..Default::default()
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
