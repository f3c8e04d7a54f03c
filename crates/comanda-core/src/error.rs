//! Domain errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Restaurant not found")]
    RestaurantNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Restaurant not active")]
    RestaurantNotActive,

    #[error("Invalid token")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Email already exists: {0}")]
    EmailAlreadyExists(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("No free port left in range {base}..={max}")]
    PortRangeExhausted { base: u16, max: u16 },

    #[error("Cannot {action} a restaurant that is {state}")]
    InvalidTransition { action: &'static str, state: String },

    #[error("No fields to update")]
    EmptyPatch,

    #[error("Password too short")]
    PasswordTooShort,

    #[error("Password too long")]
    PasswordTooLong,

    #[error("Password hash error: {0}")]
    PasswordHashError(String),

    #[error("Token generation error: {0}")]
    TokenGenerationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Instance spawn failed: {0}")]
    SpawnError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(err: validator::ValidationErrors) -> Self {
        DomainError::ValidationError(err.to_string())
    }
}
