//! PostgreSQL repository implementations

pub mod restaurant_repo_impl;

pub use restaurant_repo_impl::PgRestaurantRepository;
