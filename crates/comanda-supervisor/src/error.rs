//! Supervisor errors

use std::io;

use thiserror::Error;

use comanda_core::DomainError;
use comanda_shared::TenantId;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Failed to spawn instance {tenant}: {source}")]
    Spawn {
        tenant: String,
        #[source]
        source: io::Error,
    },

    #[error("Instance {0} is still launching")]
    Launching(String),

    #[error("Restaurant {0} has no port assigned")]
    NoPort(TenantId),

    #[error("Registry error: {0}")]
    Registry(#[from] DomainError),
}

impl From<SupervisorError> for DomainError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::Registry(inner) => inner,
            SupervisorError::Launching(_) => DomainError::Conflict(err.to_string()),
            other => DomainError::SpawnError(other.to_string()),
        }
    }
}
