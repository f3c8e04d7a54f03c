//! Shared handler state

use std::sync::Arc;

use comanda_core::services::{AuthService, ProfileService, RestaurantService};
use comanda_shared::TenantContext;

use crate::security::LoginThrottle;

/// Control-plane state.
#[derive(Clone)]
pub struct AppState {
    pub restaurants: Arc<RestaurantService>,
    pub auth: Arc<AuthService>,
    pub throttle: Arc<LoginThrottle>,
    pub main_port: u16,
    /// Host used to build tenant URLs in responses.
    pub public_host: String,
}

impl AppState {
    pub fn tenant_url(&self, port: u16) -> String {
        format!("http://{}:{}", self.public_host, port)
    }
}

/// State of one tenant process.
#[derive(Clone)]
pub struct TenantState {
    pub tenant: TenantContext,
    pub auth: Arc<AuthService>,
    pub profiles: Arc<ProfileService>,
    pub throttle: Arc<LoginThrottle>,
}
