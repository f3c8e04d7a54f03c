//! Port allocation.
//!
//! The next port is always recomputed from the set of ports currently held by
//! tenant records; there is no persisted cursor. Callers that reserve the
//! result must do so inside the same serialized section that read the
//! occupied set (see `RestaurantRepository::create` and `reserve_port`).

use std::collections::BTreeSet;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use comanda_shared::config::PortSettings;
use comanda_shared::constants::{DEFAULT_BASE_PORT, DEFAULT_MAX_PORT};

use crate::error::DomainError;

/// Attempts made by an allocate-and-reserve operation before a uniqueness
/// conflict is reported to the caller. Applies to ports and subdomains alike.
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 5;

const BACKOFF_BASE_MS: u64 = 25;
const BACKOFF_CAP_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PortRange {
    pub base: u16,
    pub max: u16,
}

impl PortRange {
    pub fn new(base: u16, max: u16) -> Self {
        Self { base, max }
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.base..=self.max).contains(&port)
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_PORT, DEFAULT_MAX_PORT)
    }
}

impl From<PortSettings> for PortRange {
    fn from(settings: PortSettings) -> Self {
        Self::new(settings.base, settings.max)
    }
}

/// Smallest port in `range` not present in `occupied`.
pub fn next_available_port(occupied: &BTreeSet<u16>, range: PortRange) -> Result<u16, DomainError> {
    (range.base..=range.max)
        .find(|port| !occupied.contains(port))
        .ok_or(DomainError::PortRangeExhausted {
            base: range.base,
            max: range.max,
        })
}

/// Delay before retry number `attempt` (1-based) after a uniqueness conflict.
pub fn conflict_backoff(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.saturating_sub(1).min(8));
    let jitter = rand::rng().random_range(0..=BACKOFF_BASE_MS);
    Duration::from_millis(exp.min(BACKOFF_CAP_MS) + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry_starts_at_base() {
        let port = next_available_port(&BTreeSet::new(), PortRange::default()).unwrap();
        assert_eq!(port, 3001);
    }

    #[test]
    fn test_skips_occupied_ports() {
        let occupied: BTreeSet<u16> = [3001].into_iter().collect();
        assert_eq!(next_available_port(&occupied, PortRange::default()).unwrap(), 3002);
    }

    #[test]
    fn test_reuses_gap_left_by_deleted_tenant() {
        let occupied: BTreeSet<u16> = [3001, 3003, 3004].into_iter().collect();
        assert_eq!(next_available_port(&occupied, PortRange::default()).unwrap(), 3002);
    }

    #[test]
    fn test_ignores_ports_outside_range() {
        let occupied: BTreeSet<u16> = [80, 3000, 4500].into_iter().collect();
        assert_eq!(next_available_port(&occupied, PortRange::default()).unwrap(), 3001);
    }

    #[test]
    fn test_is_idempotent_without_writes() {
        let occupied: BTreeSet<u16> = [3001, 3002].into_iter().collect();
        let first = next_available_port(&occupied, PortRange::default()).unwrap();
        let second = next_available_port(&occupied, PortRange::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_exhausted_range() {
        let range = PortRange::new(3001, 3002);
        let occupied: BTreeSet<u16> = [3001, 3002].into_iter().collect();
        assert!(matches!(
            next_available_port(&occupied, range),
            Err(DomainError::PortRangeExhausted { base: 3001, max: 3002 })
        ));
    }

    #[test]
    fn test_backoff_is_bounded() {
        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS + 5 {
            let delay = conflict_backoff(attempt);
            assert!(delay <= Duration::from_millis(BACKOFF_CAP_MS + BACKOFF_BASE_MS));
            assert!(delay >= Duration::from_millis(BACKOFF_BASE_MS));
        }
    }
}
