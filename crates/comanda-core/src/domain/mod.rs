//! # Comanda Core - Domain Module
//!
//! Tenant records and the ephemeral instance views built around them.

pub mod restaurant;
pub mod instance;

pub use restaurant::{normalize_email, NewRestaurant, Restaurant, RestaurantPatch, SubscriptionStatus};
pub use instance::{ExitRecord, InstanceSnapshot, ProcessState};
