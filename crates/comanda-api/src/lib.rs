//! # Comanda API
//!
//! HTTP surface of the control plane and of tenant processes: handlers,
//! auth middleware, DTOs and error mapping.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod security;
pub mod state;

pub use error::ApiError;
pub use routes::{control_plane_router, tenant_router};
pub use state::{AppState, TenantState};
