// ============================================================================
// Comanda API - Auth Handlers
// File: crates/comanda-api/src/handlers/auth.rs
// ============================================================================
//! Control-plane authentication handlers (login, register)

use axum::{extract::State, http::StatusCode, Json};

use comanda_core::services::{LoginAttempt, Registration};

use crate::dto::{ApiJson, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Login handler - POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
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
            declared_port: payload.puerto,
        })
        .await?;

    Ok(Json(ApiResponse::success(LoginResponse::from(result))))
}

/// Register handler - POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RegisterResponse>>), ApiError> {
    let created = state
        .auth
        .register(Registration {
            name: payload.nombre,
            email: payload.email,
            password: payload.password,
            phone: payload.telefono,
            address: payload.direccion,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            RegisterResponse::from(created),
            "Registration received, pending approval",
        )),
    ))
}
