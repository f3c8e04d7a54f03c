//! Request middleware

pub mod auth;

pub use auth::{bearer_token, require_platform_admin, require_tenant_token};
