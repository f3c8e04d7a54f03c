//! Shared harness: in-memory registry, fake launcher and real services.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use comanda_api::security::LoginThrottle;
use comanda_api::{control_plane_router, tenant_router, AppState, TenantState};
use comanda_core::repositories::InMemoryRestaurantRepository;
use comanda_core::services::{
    AuthService, CreateRestaurant, LoginAttempt, PlatformAdmin, ProfileService, RestaurantService,
};
use comanda_core::{PortRange, Restaurant};
use comanda_security::{JwtService, PasswordService};
use comanda_supervisor::testing::FakeLauncher;
use comanda_supervisor::{InstanceRegistry, SupervisorOptions};

pub const MAIN_PORT: u16 = 3000;
pub const ADMIN_EMAIL: &str = "admin@comanda.test";
pub const ADMIN_PASSWORD: &str = "admin-password-123";
pub const LOGIN_ATTEMPTS_PER_MINUTE: u32 = 3;
const JWT_SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";

pub struct Harness {
    pub repo: Arc<InMemoryRestaurantRepository>,
    pub launcher: Arc<FakeLauncher>,
    pub registry: Arc<InstanceRegistry>,
    pub restaurants: Arc<RestaurantService>,
    pub auth: Arc<AuthService>,
    pub jwt: Arc<JwtService>,
    pub router: Router,
}

impl Harness {
    pub fn new() -> Self {
        let repo = Arc::new(InMemoryRestaurantRepository::new());
        let launcher = Arc::new(FakeLauncher::new());
        let registry = Arc::new(InstanceRegistry::new(
            launcher.clone(),
            SupervisorOptions {
                startup_delay: Duration::from_millis(1),
                drain_timeout: Duration::from_millis(100),
                restart_grace: Duration::from_millis(500),
                readiness_timeout: None,
            },
        ));
        let jwt = Arc::new(JwtService::new(JWT_SECRET, 3600));

        let restaurants = Arc::new(RestaurantService::new(
            repo.clone(),
            registry.clone(),
            PortRange::default(),
            MAIN_PORT,
        ));
        let admin = PlatformAdmin {
            email: ADMIN_EMAIL.to_string(),
            password_hash: PasswordService::hash(ADMIN_PASSWORD).unwrap(),
        };
        let auth = Arc::new(AuthService::new(repo.clone(), jwt.clone(), MAIN_PORT, Some(admin)));

        let router = control_plane_router(AppState {
            restaurants: restaurants.clone(),
            auth: auth.clone(),
            throttle: Arc::new(LoginThrottle::per_minute(LOGIN_ATTEMPTS_PER_MINUTE)),
            main_port: MAIN_PORT,
            public_host: "localhost".to_string(),
        });

        Self {
            repo,
            launcher,
            registry,
            restaurants,
            auth,
            jwt,
            router,
        }
    }

    /// Router of the tenant process that would serve `restaurant`.
    pub fn tenant_router(&self, restaurant: &Restaurant) -> Router {
        let tenant = restaurant.context().unwrap();
        tenant_router(TenantState {
            tenant,
            auth: Arc::new(AuthService::new(self.repo.clone(), self.jwt.clone(), MAIN_PORT, None)),
            profiles: Arc::new(ProfileService::new(self.repo.clone())),
            throttle: Arc::new(LoginThrottle::per_minute(LOGIN_ATTEMPTS_PER_MINUTE)),
        })
    }

    pub async fn admin_token(&self) -> String {
        let result = self
            .auth
            .login(LoginAttempt {
                email: ADMIN_EMAIL.to_string(),
                password: ADMIN_PASSWORD.to_string(),
                declared_port: None,
            })
            .await
            .unwrap();
        result.access_token
    }

    pub async fn seed(&self, name: &str, email: &str, password: &str) -> Restaurant {
        self.restaurants
            .create(CreateRestaurant {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                phone: None,
                address: None,
            })
            .await
            .unwrap()
    }

    pub async fn restaurant_token(&self, email: &str, password: &str, port: u16) -> String {
        self.auth
            .login(LoginAttempt {
                email: email.to_string(),
                password: password.to_string(),
                declared_port: Some(port),
            })
            .await
            .unwrap()
            .access_token
    }

    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.router, method, uri, token, body).await
    }
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
