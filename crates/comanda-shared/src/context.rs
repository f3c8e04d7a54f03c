//! Identity of a tenant process, handed over by the supervisor at spawn time.

use std::str::FromStr;

use crate::constants::{ENV_TENANT_ID, ENV_TENANT_NAME, ENV_TENANT_PORT, ENV_TENANT_SUBDOMAIN};
use crate::error::AppError;
use crate::types::TenantId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub port: u16,
    pub subdomain: String,
    pub name: String,
}

impl TenantContext {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the context from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let require = |key: &'static str| lookup(key).ok_or(AppError::MissingTenantEnv(key));

        Ok(Self {
            tenant_id: parse(ENV_TENANT_ID, require(ENV_TENANT_ID)?)?,
            port: parse(ENV_TENANT_PORT, require(ENV_TENANT_PORT)?)?,
            subdomain: require(ENV_TENANT_SUBDOMAIN)?,
            name: require(ENV_TENANT_NAME)?,
        })
    }

    /// Environment pairs the supervisor passes to the child process.
    pub fn to_env(&self) -> Vec<(&'static str, String)> {
        vec![
            (ENV_TENANT_ID, self.tenant_id.to_string()),
            (ENV_TENANT_PORT, self.port.to_string()),
            (ENV_TENANT_SUBDOMAIN, self.subdomain.clone()),
            (ENV_TENANT_NAME, self.name.clone()),
        ]
    }

    /// Log tag used for every forwarded output line.
    pub fn log_tag(&self) -> String {
        format!("[{}:{}]", self.name, self.port)
    }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::InvalidTenantEnv { name, value })
}
