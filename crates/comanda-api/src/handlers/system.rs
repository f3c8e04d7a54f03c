//! Platform-wide status

use axum::{extract::State, Json};

use crate::dto::SystemStatusDto;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/system/status
pub async fn status(State(state): State<AppState>) -> Result<Json<SystemStatusDto>, ApiError> {
    let status = state.restaurants.system_status().await?;
    Ok(Json(SystemStatusDto::from_status(status, |p| state.tenant_url(p))))
}
