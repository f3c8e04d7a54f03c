//! Domain services (business logic)

pub mod auth_service;
pub mod profile_service;
pub mod restaurant_service;

pub use auth_service::{AuthService, LoginAttempt, LoginResult, PlatformAdmin, Registration};
pub use profile_service::{ProfileService, ProfileUpdate};
pub use restaurant_service::{
    CreateRestaurant, RestaurantService, RestaurantUpdate, RestaurantView, SystemStatus,
};

use comanda_shared::constants::{MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH};

use crate::error::DomainError;

/// Length policy for plaintext passwords before hashing.
pub(crate) fn check_password_policy(password: &str) -> Result<(), DomainError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(DomainError::PasswordTooShort);
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(DomainError::PasswordTooLong);
    }
    Ok(())
}

pub(crate) fn hash_password(password: &str) -> Result<String, DomainError> {
    check_password_policy(password)?;
    comanda_security::PasswordService::hash(password)
        .map_err(|e| DomainError::PasswordHashError(e.to_string()))
}
