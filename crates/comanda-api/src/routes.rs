//! Router assembly for the control plane and for tenant processes.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::handlers::{auth, health, restaurants, system, tenant};
use crate::middleware::{require_platform_admin, require_tenant_token};
use crate::state::{AppState, TenantState};

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

fn with_common_layers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(cors())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

pub fn control_plane_router(state: AppState) -> Router {
    // Public routes
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register));

    // Platform admin routes
    let admin_routes = Router::new()
        .route("/api/restaurants", get(restaurants::list).post(restaurants::create))
        .route(
            "/api/restaurants/{id}",
            get(restaurants::get)
                .put(restaurants::update)
                .delete(restaurants::delete),
        )
        .route("/api/restaurants/{id}/restart", post(restaurants::restart))
        .route("/api/restaurants/{id}/approve", post(restaurants::approve))
        .route("/api/restaurants/{id}/reject", post(restaurants::reject))
        .route("/api/restaurants/{id}/activate", post(restaurants::activate))
        .route("/api/restaurants/{id}/deactivate", post(restaurants::deactivate))
        .route("/api/system/status", get(system::status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_platform_admin));

    with_common_layers(Router::new().merge(public_routes).merge(admin_routes)).with_state(state)
}

pub fn tenant_router(state: TenantState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/login", post(tenant::login))
        .route("/api/tenant/info", get(tenant::info));

    let protected_routes = Router::new()
        .route("/api/auth/verify", get(tenant::verify))
        .route(
            "/api/tenant/profile",
            get(tenant::get_profile).put(tenant::update_profile),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_tenant_token));

    with_common_layers(Router::new().merge(public_routes).merge(protected_routes)).with_state(state)
}
