// ============================================================================
// Comanda API - Tenant Handlers
// File: crates/comanda-api/src/handlers/tenant.rs
// ============================================================================
//! Endpoints served by each tenant process on its own port.

use axum::{extract::State, Extension, Json};
use tracing::warn;

use comanda_core::services::{LoginAttempt, ProfileUpdate};
use comanda_security::TenantClaims;

use crate::dto::{
    ApiJson, LoginRequest, LoginResponse, ProfileResponse, TenantInfoResponse, UpdateProfileRequest,
    VerifyResponse,
};
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::TenantState;

/// POST /api/auth/login
///
/// Any `puerto` in the body is ignored: the declared port is always this
/// process's port.
pub async fn login(
    State(state): State<TenantState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required".to_string()));
    }

    state.throttle.check(&payload.email)?;

    let result = state
        .auth
        .login(LoginAttempt {
            email: payload.email,
            password: payload.password,
            declared_port: Some(state.tenant.port),
        })
        .await?;

    Ok(Json(ApiResponse::success(LoginResponse::from(result))))
}

/// GET /api/auth/verify
pub async fn verify(Extension(claims): Extension<TenantClaims>) -> Json<ApiResponse<VerifyResponse>> {
    Json(ApiResponse::success(VerifyResponse {
        valid: true,
        rol: claims.rol.as_str(),
        puerto: claims.puerto,
        restaurant_id: claims.restaurant_id,
        exp: claims.exp,
    }))
}

/// GET /api/tenant/info
pub async fn info(State(state): State<TenantState>) -> Json<ApiResponse<TenantInfoResponse>> {
    let tenant = &state.tenant;
    Json(ApiResponse::success(TenantInfoResponse {
        id: tenant.tenant_id,
        nombre: tenant.name.clone(),
        subdominio: tenant.subdomain.clone(),
        puerto: tenant.port,
    }))
}

/// The restaurant this process serves. The token must belong to some
/// restaurant; a stale one for a previous owner of the port still resolves
/// to the current tenant.
fn owner(state: &TenantState, claims: &TenantClaims) -> Result<uuid::Uuid, ApiError> {
    if claims.restaurant_id.is_none() {
        warn!("Profile access with a token that names no restaurant: {}", claims.sub);
        return Err(ApiError::Forbidden("Restaurant token required".to_string()));
    }
    Ok(state.tenant.tenant_id)
}

/// GET /api/tenant/profile
pub async fn get_profile(
    State(state): State<TenantState>,
    Extension(claims): Extension<TenantClaims>,
) -> Result<Json<ApiResponse<ProfileResponse>>, ApiError> {
    let id = owner(&state, &claims)?;
    let restaurant = state.profiles.get(&id).await?;
    Ok(Json(ApiResponse::success(ProfileResponse::from(restaurant))))
}

/// PUT /api/tenant/profile
pub async fn update_profile(
    State(state): State<TenantState>,
    Extension(claims): Extension<TenantClaims>,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<ProfileResponse>>, ApiError> {
    let id = owner(&state, &claims)?;
    let restaurant = state
        .profiles
        .update(
            &id,
            ProfileUpdate {
                name: payload.nombre,
                phone: payload.telefono,
                address: payload.direccion,
                password: payload.password,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        ProfileResponse::from(restaurant),
        "Profile updated",
    )))
}
