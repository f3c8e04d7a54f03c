//! Per-email login throttling.

use std::num::NonZeroU32;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::warn;

use comanda_core::normalize_email;

use crate::error::ApiError;

pub struct LoginThrottle {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl LoginThrottle {
    pub fn per_minute(attempts: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Consume one attempt for `email`.
    pub fn check(&self, email: &str) -> Result<(), ApiError> {
        let key = normalize_email(email);
        self.limiter.check_key(&key).map_err(|_| {
            warn!("Login throttled for: {}", key);
            ApiError::TooManyRequests("Too many login attempts, try again later".to_string())
        })
    }
}
