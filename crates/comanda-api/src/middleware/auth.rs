//! Bearer token middleware.
//!
//! Both middlewares validate the token, run the port gate against the port
//! of the current process and leave the claims in the request extensions
//! for handlers to pick up with `Extension<TenantClaims>`.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use comanda_security::{authorize, Access, Denial, Role, TenantClaims};

use crate::error::ApiError;
use crate::state::{AppState, TenantState};

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn denied(denial: Denial) -> ApiError {
    match denial {
        Denial::PortMismatch { token_port, process_port } => {
            warn!(
                "Token for port {} presented on port {}",
                token_port, process_port
            );
            ApiError::Forbidden("Token is not valid for this restaurant".to_string())
        }
    }
}

fn claims_from(headers: &HeaderMap, verify: impl Fn(&str) -> Result<TenantClaims, ApiError>) -> Result<TenantClaims, ApiError> {
    let token = bearer_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;
    verify(token)
}

/// Control-plane management routes: a super-admin token minted for the
/// main port.
pub async fn require_platform_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = claims_from(request.headers(), |t| Ok(state.auth.verify_token(t)?))?;

    if let Access::Deny(denial) = authorize(&claims, state.main_port, None) {
        return Err(denied(denial));
    }

    if claims.rol != Role::SuperAdmin {
        warn!("Non-admin token {} on management route", claims.sub);
        return Err(ApiError::Forbidden("Platform administrator required".to_string()));
    }

    debug!("Admin request authorized");
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Tenant routes: any valid token minted for this process's port.
pub async fn require_tenant_token(
    State(state): State<TenantState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = claims_from(request.headers(), |t| Ok(state.auth.verify_token(t)?))?;

    match authorize(&claims, state.tenant.port, Some(&state.tenant.tenant_id)) {
        Access::Deny(denial) => return Err(denied(denial)),
        Access::Allow { tenant_mismatch: true } => {
            warn!(
                "{} accepted token with restaurant_id {:?} (port matches)",
                state.tenant.log_tag(),
                claims.restaurant_id
            );
        }
        Access::Allow { tenant_mismatch: false } => {}
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
