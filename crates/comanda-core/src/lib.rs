//! # Comanda Core
//!
//! Domain entities, the tenant registry port, port allocation, and the
//! lifecycle and authentication services of the control plane.

pub mod domain;
pub mod allocator;
pub mod subdomain;
pub mod repositories;
pub mod supervision;
pub mod services;
pub mod error;

// Re-export domain entities
pub use domain::*;
pub use error::DomainError;
pub use allocator::{next_available_port, PortRange};
pub use supervision::InstanceControl;
