//! # Comanda Shared
//!
//! Configuration, telemetry, constants and the tenant process context shared
//! by the control plane and every tenant instance.

pub mod constants;
pub mod types;
pub mod telemetry;
pub mod config;
pub mod context;
pub mod error;

pub use types::*;
pub use error::AppError;
pub use context::TenantContext;
