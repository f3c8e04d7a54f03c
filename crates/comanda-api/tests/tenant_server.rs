//! Tenant-process HTTP surface: the port gate on every protected route.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use comanda_security::{Role, TokenSubject};
use common::{send, Harness};

async fn two_tenants(h: &Harness) -> (comanda_core::Restaurant, comanda_core::Restaurant) {
    let a = h.seed("Bar A", "a@example.com", "secreto-a-123").await;
    let b = h.seed("Bar B", "b@example.com", "secreto-b-123").await;
    (a, b)
}

#[tokio::test]
async fn test_info_is_public() {
    let h = Harness::new();
    let (_, b) = two_tenants(&h).await;
    let router = h.tenant_router(&b);

    let (status, body) = send(&router, Method::GET, "/api/tenant/info", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["puerto"], 3002);
    assert_eq!(body["data"]["subdominio"], "bar-b");
    assert_eq!(body["data"]["id"], b.id.to_string());
}

#[tokio::test]
async fn test_token_for_other_port_is_forbidden() {
    let h = Harness::new();
    let (_, b) = two_tenants(&h).await;
    let token_a = h.restaurant_token("a@example.com", "secreto-a-123", 3001).await;
    let router_b = h.tenant_router(&b);

    let (status, body) = send(&router_b, Method::GET, "/api/tenant/profile", Some(&token_a), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");

    let (status, _) = send(&router_b, Method::GET, "/api/auth/verify", Some(&token_a), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_token_is_forbidden_on_tenant() {
    let h = Harness::new();
    let (a, _) = two_tenants(&h).await;
    let admin = h.admin_token().await;

    let (status, _) = send(&h.tenant_router(&a), Method::GET, "/api/auth/verify", Some(&admin), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_own_token_reaches_profile() {
    let h = Harness::new();
    let (_, b) = two_tenants(&h).await;
    let token_b = h.restaurant_token("b@example.com", "secreto-b-123", 3002).await;
    let router_b = h.tenant_router(&b);

    let (status, body) = send(&router_b, Method::GET, "/api/tenant/profile", Some(&token_b), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nombre"], "Bar B");
    assert_eq!(body["data"]["email"], "b@example.com");
    assert!(body["data"].get("password").is_none());

    let (status, body) = send(&router_b, Method::GET, "/api/auth/verify", Some(&token_b), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(body["data"]["puerto"], 3002);
    assert_eq!(body["data"]["rol"], "restaurant_admin");
}

#[tokio::test]
async fn test_missing_or_expired_token_is_unauthorized() {
    let h = Harness::new();
    let (_, b) = two_tenants(&h).await;
    let router_b = h.tenant_router(&b);

    let (status, _) = send(&router_b, Method::GET, "/api/tenant/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let expired = h
        .jwt
        .generate_token(
            &TokenSubject {
                id: b.id,
                restaurant_id: Some(b.id),
                port: 3002,
                subdomain: Some(b.subdomain.clone()),
                role: Role::RestaurantAdmin,
            },
            -3600,
        )
        .unwrap();
    let (status, body) = send(&router_b, Method::GET, "/api/tenant/profile", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn test_tenant_login_uses_own_port() {
    let h = Harness::new();
    let (_, b) = two_tenants(&h).await;
    let router_b = h.tenant_router(&b);

    // A's valid credentials are refused on B's port.
    let (status, body) = send(
        &router_b,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "a@example.com", "password": "secreto-a-123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    // A body-supplied port cannot widen the gate.
    let (status, _) = send(
        &router_b,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "a@example.com", "password": "secreto-a-123", "puerto": 3001 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &router_b,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "b@example.com", "password": "secreto-b-123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["puerto"], 3002);
}

#[tokio::test]
async fn test_update_profile() {
    let h = Harness::new();
    let (_, b) = two_tenants(&h).await;
    let token_b = h.restaurant_token("b@example.com", "secreto-b-123", 3002).await;
    let router_b = h.tenant_router(&b);

    let (status, body) = send(
        &router_b,
        Method::PUT,
        "/api/tenant/profile",
        Some(&token_b),
        Some(json!({ "telefono": "+34 600 000 000", "password": "nuevo-secreto-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["telefono"], "+34 600 000 000");
    // Subdomain and port are not editable from the tenant.
    assert_eq!(body["data"]["subdominio"], "bar-b");
    assert_eq!(body["data"]["puerto"], 3002);

    let (status, _) = send(
        &router_b,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "b@example.com", "password": "nuevo-secreto-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&router_b, Method::PUT, "/api/tenant/profile", Some(&token_b), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deleted_restaurant_profile_is_not_found() {
    let h = Harness::new();
    let (_, b) = two_tenants(&h).await;
    let token_b = h.restaurant_token("b@example.com", "secreto-b-123", 3002).await;
    let router_b = h.tenant_router(&b);
    h.restaurants.delete(&b.id).await.unwrap();

    let (status, _) = send(&router_b, Method::GET, "/api/tenant/profile", Some(&token_b), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stale_token_on_reused_port_serves_current_tenant() {
    let h = Harness::new();
    let old = h.seed("Bar Viejo", "viejo@example.com", "secreto-v-123").await;
    let stale = h.restaurant_token("viejo@example.com", "secreto-v-123", 3001).await;
    h.restaurants.delete(&old.id).await.unwrap();

    let current = h.seed("Bar Nuevo", "nuevo@example.com", "secreto-n-123").await;
    assert_eq!(current.port, Some(3001));
    let router = h.tenant_router(&current);

    let (status, body) = send(&router, Method::GET, "/api/auth/verify", Some(&stale), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["restaurant_id"], old.id.to_string());

    let (status, body) = send(&router, Method::GET, "/api/tenant/profile", Some(&stale), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], current.id.to_string());
    assert_eq!(body["data"]["nombre"], "Bar Nuevo");
}
