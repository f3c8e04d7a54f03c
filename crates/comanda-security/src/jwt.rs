//! JWT token handling

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token creation failed: {0}")]
    CreationError(String),
    #[error("Token validation failed: {0}")]
    ValidationError(String),
    #[error("Token expired")]
    TokenExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Owner of a single restaurant; valid only on that restaurant's port.
    RestaurantAdmin,
    /// Platform operator; valid only on the control plane's port.
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::RestaurantAdmin => "restaurant_admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

/// Claims embedded in every access token. Field names are part of the wire
/// contract with tenant processes and frontends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantClaims {
    pub sub: String,
    pub id: Uuid,
    pub restaurant_id: Option<Uuid>,
    /// Port the token was minted for. Authoritative capability.
    pub puerto: u16,
    pub subdominio: Option<String>,
    pub rol: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Who a token is being minted for.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub id: Uuid,
    pub restaurant_id: Option<Uuid>,
    pub port: u16,
    pub subdomain: Option<String>,
    pub role: Role,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry: i64,
}

impl JwtService {
    pub fn new(secret: &str, access_token_expiry: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expiry,
        }
    }

    pub fn access_token_expiry(&self) -> i64 {
        self.access_token_expiry
    }

    pub fn generate_access_token(&self, subject: &TokenSubject) -> Result<String, JwtError> {
        self.generate_token(subject, self.access_token_expiry)
    }

    /// Mint a token with an explicit lifetime in seconds. A negative lifetime
    /// yields an already expired token.
    pub fn generate_token(&self, subject: &TokenSubject, expiry: i64) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = TenantClaims {
            sub: subject.id.to_string(),
            id: subject.id,
            restaurant_id: subject.restaurant_id,
            puerto: subject.port,
            subdominio: subject.subdomain.clone(),
            rol: subject.role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(expiry)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::CreationError(e.to_string()))
    }

    /// Check signature and expiry. Says nothing about which process may
    /// accept the token; that is [`crate::gate::authorize`].
    pub fn validate_token(&self, token: &str) -> Result<TenantClaims, JwtError> {
        decode::<TenantClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                _ => JwtError::ValidationError(e.to_string()),
            })
    }
}
