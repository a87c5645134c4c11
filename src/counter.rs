//! Bounded-growth counter updates.
//!
//! Counters track slowly growing counts of known items, so a new value is
//! only written if it is no smaller than the stored one and at most 10%
//! larger. A single bad upstream reading cannot push an implausible jump onto
//! the published page.
//!
//! The read and the write are separate store calls. Two updaters racing on
//! the same key may both validate against the same current value and the
//! later write wins.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::secrets::SecretStore;
use crate::services::{KeyValueStore, KvConnector};

/// Largest accepted ratio between a proposed value and the current one.
pub const GROWTH_FACTOR: f64 = 1.1;

/// Returns `true` if `proposed` lies in `[current, 1.1 * current]`.
///
/// The upper bound is computed in floating point and may round for very
/// large counters; `proposed` itself is compared exactly against it.
pub fn within_growth_bound(current: i64, proposed: i64) -> bool {
    let upper = GROWTH_FACTOR * current as f64;
    current <= proposed && i128::from(proposed) <= upper.floor() as i128
}

/// Parses a stored or proposed counter value.
///
/// An absent value is parsed as the empty string and therefore fails, so a
/// key that was never written cannot be updated.
pub fn parse_counter(key: &str, raw: Option<&str>) -> Result<i64> {
    let text = raw.unwrap_or_default();
    text.trim().parse().map_err(|source| Error::NotANumber {
        key: key.to_string(),
        value: text.to_string(),
        source,
    })
}

/// Reads `key` from an open store and parses it as a counter.
///
/// Stored bytes that are not UTF-8 fail to parse like any other non-number.
pub async fn read_counter(store: &mut dyn KeyValueStore, key: &str) -> Result<i64> {
    let raw = store
        .get(key)
        .await
        .map_err(|e| Error::StoreUnavailable(format!("GET {key}: {e:#}")))?;
    let text = raw.as_deref().map(String::from_utf8_lossy);
    parse_counter(key, text.as_deref())
}

/// Applies guarded writes to counters in the key-value store.
#[derive(Clone)]
pub struct CounterUpdater {
    secrets: SecretStore,
    connector: Arc<dyn KvConnector>,
    service: String,
}

impl CounterUpdater {
    /// `service` names the secrets entry holding the store's connection
    /// parameters.
    pub fn new(
        secrets: SecretStore,
        connector: Arc<dyn KvConnector>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            secrets,
            connector,
            service: service.into(),
        }
    }

    /// Writes `proposed` under `key` if it passes the growth guard.
    ///
    /// # Errors
    ///
    /// Propagates secret-fetch failures, [`Error::StoreUnavailable`] if the
    /// store cannot be reached, [`Error::NotANumber`] if either value does not
    /// parse, and [`Error::ValueOutOfBounds`] if the guard rejects the value.
    /// Nothing is written on any error.
    #[tracing::instrument(skip(self), fields(service = %self.service))]
    pub async fn update_counter(&self, key: &str, proposed: &str) -> Result<()> {
        let secrets = self.secrets.fetch_secrets().await?;
        let params = secrets.service(&self.service)?;

        let mut store = self
            .connector
            .connect(&params)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("{e:#}")))?;

        let current = read_counter(store.as_mut(), key).await?;
        let proposed_value = parse_counter(key, Some(proposed))?;

        if !within_growth_bound(current, proposed_value) {
            warn!(key, proposed = proposed_value, current, "Rejected counter update");
            return Err(Error::ValueOutOfBounds {
                key: key.to_string(),
                proposed: proposed_value,
                current,
            });
        }

        store
            .set(key, &proposed_value.to_string())
            .await
            .map_err(|e| Error::StoreUnavailable(format!("SET {key}: {e:#}")))?;

        info!(key, value = proposed_value, previous = current, "Counter updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_scenarios() {
        assert!(within_growth_bound(100, 105));
        assert!(within_growth_bound(100, 110));
        assert!(!within_growth_bound(100, 111));
        assert!(!within_growth_bound(100, 99));
    }

    #[test]
    fn test_bound_accepts_unchanged_value() {
        for c in [0, 1, 7, 100, 4500, 5300, 1_000_000] {
            assert!(within_growth_bound(c, c), "c = {c}");
        }
    }

    #[test]
    fn test_bound_edges_follow_floor_of_growth() {
        for c in [1i64, 9, 10, 11, 99, 100, 101, 4500, 5300, 123_457] {
            let upper = (GROWTH_FACTOR * c as f64).floor() as i64;
            if upper >= c {
                assert!(within_growth_bound(c, upper), "c = {c}");
            }
            assert!(!within_growth_bound(c, upper + 1), "c = {c}");
        }
    }

    #[test]
    fn test_bound_edges_beyond_f64_precision() {
        for c in [1i64 << 53, 1 << 54, 1 << 60, 3 * (1 << 58) + 7] {
            let upper = (GROWTH_FACTOR * c as f64).floor() as i64;
            assert!(within_growth_bound(c, upper), "c = {c}");
            assert!(!within_growth_bound(c, upper + 1), "c = {c}");
        }
    }

    #[test]
    fn test_bound_small_counters_cannot_grow() {
        // 1.1 * 5 = 5.5, so nothing above 5 passes.
        assert!(within_growth_bound(5, 5));
        assert!(!within_growth_bound(5, 6));
    }

    #[test]
    fn test_bound_negative_counters_are_rejected() {
        assert!(!within_growth_bound(-100, -100));
        assert!(!within_growth_bound(-100, -95));
    }

    #[test]
    fn test_parse_counter() {
        assert_eq!(parse_counter("k", Some("4500")).unwrap(), 4500);
        assert_eq!(parse_counter("k", Some(" 42 ")).unwrap(), 42);
        assert!(matches!(
            parse_counter("k", Some("4.5e3")),
            Err(Error::NotANumber { .. })
        ));
    }

    #[test]
    fn test_parse_absent_counter_fails() {
        match parse_counter("planets_data_eu", None) {
            Err(Error::NotANumber { key, value, .. }) => {
                assert_eq!(key, "planets_data_eu");
                assert_eq!(value, "");
            }
            other => panic!("expected NotANumber, got {other:?}"),
        }
    }
}
