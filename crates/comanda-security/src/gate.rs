//! Port-as-capability gate.
//!
//! Tenant processes share no session store with the control plane. A token
//! is honoured only by the process bound to the port the token was minted
//! for, so the soundness of this module rests on port uniqueness across
//! tenant records.

use comanda_shared::TenantId;

use crate::jwt::TenantClaims;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Port matched. `tenant_mismatch` is advisory only and must be logged.
    Allow { tenant_mismatch: bool },
    Deny(Denial),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    PortMismatch { token_port: u16, process_port: u16 },
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allow { .. })
    }
}

/// Per-request check evaluated inside every process on every protected
/// endpoint. Port equality is authoritative; the tenant id only raises a
/// flag.
pub fn authorize(claims: &TenantClaims, process_port: u16, process_tenant: Option<&TenantId>) -> Access {
    if claims.puerto != process_port {
        return Access::Deny(Denial::PortMismatch {
            token_port: claims.puerto,
            process_port,
        });
    }

    let tenant_mismatch = match (process_tenant, claims.restaurant_id.as_ref()) {
        (Some(expected), Some(actual)) => expected != actual,
        (Some(_), None) => true,
        (None, _) => false,
    };

    Access::Allow { tenant_mismatch }
}

/// Pre-password check for login requests.
///
/// When the caller targets a port other than the platform's main port, the
/// account's assigned port must equal it. Must run before the password
/// comparison and fail with the same response as a wrong password.
pub fn login_port_allowed(declared_port: Option<u16>, main_port: u16, assigned_port: Option<u16>) -> bool {
    match declared_port {
        None => true,
        Some(port) if port == main_port => true,
        Some(port) => assigned_port == Some(port),
    }
}
