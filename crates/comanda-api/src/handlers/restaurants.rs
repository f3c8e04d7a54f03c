// ============================================================================
// Comanda API - Restaurant Handlers
// File: crates/comanda-api/src/handlers/restaurants.rs
// ============================================================================
//! Restaurant management (platform admin only)

use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

use comanda_core::services::CreateRestaurant;

use crate::dto::{
    ApiJson, ApiPath, CreateRestaurantRequest, CreateRestaurantResponse, CreatedRestaurantDto,
    MessageResponse, RestaurantDto, UpdateRestaurantRequest,
};
use crate::error::ApiError;
use crate::state::AppState;

type RestaurantResult = Result<Json<RestaurantDto>, ApiError>;

fn required(value: Option<String>, field: &str, missing: &mut Vec<String>) -> String {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => v,
        None => {
            missing.push(field.to_string());
            String::new()
        }
    }
}

/// POST /api/restaurants
pub async fn create(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateRestaurantRequest>,
) -> Result<(StatusCode, Json<CreateRestaurantResponse>), ApiError> {
    let mut missing = Vec::new();
    let name = required(payload.nombre, "nombre", &mut missing);
    let email = required(payload.email, "email", &mut missing);
    let password = required(payload.password, "password", &mut missing);
    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let restaurant = state
        .restaurants
        .create(CreateRestaurant {
            name,
            email,
            password,
            phone: payload.telefono,
            address: payload.direccion,
        })
        .await?;

    let response = CreateRestaurantResponse {
        message: format!("Restaurant {} created", restaurant.name),
        restaurant: CreatedRestaurantDto {
            id: restaurant.id,
            url: restaurant.port.map(|p| state.tenant_url(p)),
            puerto: restaurant.port,
            subdominio: restaurant.subdomain,
        },
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/restaurants
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<RestaurantDto>>, ApiError> {
    let views = state.restaurants.list().await?;
    Ok(Json(
        views
            .into_iter()
            .map(|view| RestaurantDto::from_view(view, |p| state.tenant_url(p)))
            .collect(),
    ))
}

/// GET /api/restaurants/{id}
pub async fn get(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> RestaurantResult {
    let view = state.restaurants.get(&id).await?;
    Ok(Json(RestaurantDto::from_view(view, |p| state.tenant_url(p))))
}

/// PUT /api/restaurants/{id}
pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateRestaurantRequest>,
) -> RestaurantResult {
    let update = payload.into_update()?;
    let view = state.restaurants.update(&id, update).await?;
    Ok(Json(RestaurantDto::from_view(view, |p| state.tenant_url(p))))
}

/// DELETE /api/restaurants/{id}
pub async fn delete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let was_running = state.restaurants.delete(&id).await?;
    let message = if was_running {
        "Restaurant deleted and instance stopped"
    } else {
        "Restaurant deleted"
    };
    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

/// POST /api/restaurants/{id}/restart
pub async fn restart(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> RestaurantResult {
    let view = state.restaurants.restart(&id).await?;
    Ok(Json(RestaurantDto::from_view(view, |p| state.tenant_url(p))))
}

/// POST /api/restaurants/{id}/approve
pub async fn approve(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> RestaurantResult {
    let view = state.restaurants.approve(&id).await?;
    Ok(Json(RestaurantDto::from_view(view, |p| state.tenant_url(p))))
}

/// POST /api/restaurants/{id}/reject
pub async fn reject(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> RestaurantResult {
    let view = state.restaurants.reject(&id).await?;
    Ok(Json(RestaurantDto::from_view(view, |p| state.tenant_url(p))))
}

/// POST /api/restaurants/{id}/activate
pub async fn activate(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> RestaurantResult {
    let view = state.restaurants.activate(&id).await?;
    Ok(Json(RestaurantDto::from_view(view, |p| state.tenant_url(p))))
}

/// POST /api/restaurants/{id}/deactivate
pub async fn deactivate(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> RestaurantResult {
    let view = state.restaurants.deactivate(&id).await?;
    Ok(Json(RestaurantDto::from_view(view, |p| state.tenant_url(p))))
}
