//! Application-wide constants

/// First port handed to a tenant instance.
pub const DEFAULT_BASE_PORT: u16 = 3001;
/// Last port the allocator may hand out.
pub const DEFAULT_MAX_PORT: u16 = 3999;
/// Port of the control plane itself (the platform's main entry port).
pub const DEFAULT_MASTER_PORT: u16 = 3000;

pub const DEFAULT_ACCESS_TOKEN_EXPIRY: i64 = 86_400;
pub const MIN_JWT_SECRET_LENGTH: usize = 32;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

pub const DEFAULT_STARTUP_DELAY_MS: u64 = 500;
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RESTART_GRACE_SECS: u64 = 15;

// Environment handed to every spawned tenant process
pub const ENV_TENANT_ID: &str = "TENANT_ID";
pub const ENV_TENANT_PORT: &str = "TENANT_PORT";
pub const ENV_TENANT_SUBDOMAIN: &str = "TENANT_SUBDOMAIN";
pub const ENV_TENANT_NAME: &str = "TENANT_NAME";
