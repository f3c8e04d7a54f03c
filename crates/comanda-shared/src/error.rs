//! Application error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing tenant environment variable: {0}")]
    MissingTenantEnv(&'static str),

    #[error("Invalid tenant environment variable {name}: {value}")]
    InvalidTenantEnv { name: &'static str, value: String },
}
