//! # Comanda Infrastructure
//!
//! PostgreSQL adapter for the tenant registry.

pub mod database;

pub use database::{create_pool, run_migrations, PgRestaurantRepository};
