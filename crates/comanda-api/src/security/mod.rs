//! Request-level protections

pub mod throttle;

pub use throttle::LoginThrottle;
