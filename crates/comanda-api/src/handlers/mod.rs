//! HTTP handlers

pub mod auth;
pub mod health;
pub mod restaurants;
pub mod system;
pub mod tenant;
