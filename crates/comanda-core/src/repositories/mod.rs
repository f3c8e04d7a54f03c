//! Repository traits (ports)

pub mod restaurant_repository;
pub mod memory;

pub use restaurant_repository::RestaurantRepository;
pub use memory::InMemoryRestaurantRepository;

#[cfg(test)]
pub use restaurant_repository::MockRestaurantRepository;
