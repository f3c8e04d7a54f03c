//! # Comanda Security
//!
//! Credential boundary primitives: JWT issuance and validation, password
//! storage schemes, and the port-as-capability gate.

pub mod jwt;
pub mod password;
pub mod gate;

pub use jwt::{JwtError, JwtService, Role, TenantClaims, TokenSubject};
pub use password::{CredentialScheme, PasswordError, PasswordService};
pub use gate::{authorize, login_port_allowed, Access, Denial};
