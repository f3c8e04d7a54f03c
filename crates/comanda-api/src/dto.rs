//! Request and response bodies.
//!
//! Field names follow the wire contract shared with the restaurant
//! frontends (`nombre`, `puerto`, `subdominio`, `activo`, ...).

use axum::extract::{FromRequest, FromRequestParts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use comanda_core::services::{LoginResult, RestaurantUpdate, RestaurantView, SystemStatus};
use comanda_core::{ExitRecord, InstanceSnapshot, Restaurant, SubscriptionStatus};

use crate::error::ApiError;

/// JSON body extractor whose rejections use the API error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path extractor; a malformed id is a 400 in the API error shape.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateRestaurantRequest {
    #[serde(alias = "name")]
    pub nombre: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "phone")]
    pub telefono: Option<String>,
    #[serde(alias = "address")]
    pub direccion: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRestaurantRequest {
    #[serde(alias = "name")]
    pub nombre: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "phone")]
    pub telefono: Option<String>,
    #[serde(alias = "address")]
    pub direccion: Option<String>,
    #[serde(alias = "active")]
    pub activo: Option<bool>,
    #[serde(alias = "subscription_status")]
    pub subscription_status: Option<String>,
}

impl UpdateRestaurantRequest {
    pub fn into_update(self) -> Result<RestaurantUpdate, ApiError> {
        let subscription_status = match self.subscription_status.as_deref() {
            Some(raw) => Some(SubscriptionStatus::from_str(raw).ok_or_else(|| {
                ApiError::BadRequest(format!("Unknown subscription status: {}", raw))
            })?),
            None => None,
        };

        Ok(RestaurantUpdate {
            name: self.nombre,
            email: self.email,
            password: self.password,
            phone: self.telefono,
            address: self.direccion,
            active: self.activo,
            subscription_status,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Port the token will be used on; absent means the main port.
    #[serde(default, alias = "port")]
    pub puerto: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(alias = "name")]
    pub nombre: String,
    pub email: String,
    pub password: String,
    #[serde(default, alias = "phone")]
    pub telefono: Option<String>,
    #[serde(default, alias = "address")]
    pub direccion: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(alias = "name")]
    pub nombre: Option<String>,
    #[serde(alias = "phone")]
    pub telefono: Option<String>,
    #[serde(alias = "address")]
    pub direccion: Option<String>,
    pub password: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDto {
    pub instance_id: u64,
    pub pid: Option<u32>,
    pub state: &'static str,
    pub started_at: DateTime<Utc>,
}

impl From<InstanceSnapshot> for InstanceDto {
    fn from(snapshot: InstanceSnapshot) -> Self {
        Self {
            instance_id: snapshot.instance_id,
            pid: snapshot.pid,
            state: snapshot.state.as_str(),
            started_at: snapshot.started_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitDto {
    pub instance_id: u64,
    pub code: Option<i32>,
    pub state: &'static str,
    pub at: DateTime<Utc>,
}

impl From<ExitRecord> for ExitDto {
    fn from(record: ExitRecord) -> Self {
        Self {
            instance_id: record.instance_id,
            code: record.code,
            state: record.state.as_str(),
            at: record.at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantDto {
    pub id: Uuid,
    pub nombre: String,
    pub email: String,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub puerto: Option<u16>,
    pub subdominio: String,
    pub url: Option<String>,
    pub activo: bool,
    pub subscription_status: &'static str,
    pub instance_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<InstanceDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_exit: Option<ExitDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RestaurantDto {
    pub fn from_view(view: RestaurantView, url_for: impl Fn(u16) -> String) -> Self {
        let instance_active = view.instance_active();
        let r = view.restaurant;
        Self {
            id: r.id,
            url: r.port.map(&url_for),
            nombre: r.name,
            email: r.email,
            telefono: r.phone,
            direccion: r.address,
            puerto: r.port,
            subdominio: r.subdomain,
            activo: r.active,
            subscription_status: r.subscription_status.as_str(),
            instance_active,
            instance: view.instance.map(InstanceDto::from),
            last_exit: view.last_exit.map(ExitDto::from),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Minimal shape returned on creation.
#[derive(Debug, Serialize)]
pub struct CreatedRestaurantDto {
    pub id: Uuid,
    pub puerto: Option<u16>,
    pub subdominio: String,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateRestaurantResponse {
    pub message: String,
    pub restaurant: CreatedRestaurantDto,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatusDto {
    pub master_port: u16,
    pub total_restaurants: usize,
    pub active_instances: usize,
    pub next_available_port: Option<u16>,
    pub restaurants: Vec<RestaurantDto>,
}

impl SystemStatusDto {
    pub fn from_status(status: SystemStatus, url_for: impl Fn(u16) -> String) -> Self {
        Self {
            master_port: status.master_port,
            total_restaurants: status.total_restaurants,
            active_instances: status.active_instances,
            next_available_port: status.next_available_port,
            restaurants: status
                .restaurants
                .into_iter()
                .map(|view| RestaurantDto::from_view(view, &url_for))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RestaurantSummary {
    pub id: Uuid,
    pub nombre: String,
    pub email: String,
    pub puerto: Option<u16>,
    pub subdominio: String,
}

impl From<&Restaurant> for RestaurantSummary {
    fn from(r: &Restaurant) -> Self {
        Self {
            id: r.id,
            nombre: r.name.clone(),
            email: r.email.clone(),
            puerto: r.port,
            subdominio: r.subdomain.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub rol: &'static str,
    pub puerto: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant: Option<RestaurantSummary>,
}

impl From<LoginResult> for LoginResponse {
    fn from(result: LoginResult) -> Self {
        Self {
            access_token: result.access_token,
            token_type: "Bearer",
            expires_in: result.expires_in,
            rol: result.claims.rol.as_str(),
            puerto: result.claims.puerto,
            restaurant: result.restaurant.as_ref().map(RestaurantSummary::from),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub id: Uuid,
    pub nombre: String,
    pub email: String,
    pub subdominio: String,
    pub subscription_status: &'static str,
}

impl From<Restaurant> for RegisterResponse {
    fn from(r: Restaurant) -> Self {
        Self {
            id: r.id,
            nombre: r.name,
            email: r.email,
            subdominio: r.subdomain,
            subscription_status: r.subscription_status.as_str(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TenantInfoResponse {
    pub id: Uuid,
    pub nombre: String,
    pub subdominio: String,
    pub puerto: u16,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub rol: &'static str,
    pub puerto: u16,
    pub restaurant_id: Option<Uuid>,
    pub exp: i64,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub nombre: String,
    pub email: String,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub puerto: Option<u16>,
    pub subdominio: String,
    pub activo: bool,
}

impl From<Restaurant> for ProfileResponse {
    fn from(r: Restaurant) -> Self {
        Self {
            id: r.id,
            nombre: r.name,
            email: r.email,
            telefono: r.phone,
            direccion: r.address,
            puerto: r.port,
            subdominio: r.subdomain,
            activo: r.active,
        }
    }
}
