//! Process-wide rate-limit breaker.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;

use crate::error::UpdateResult;
use crate::store::KeyValueStore;

/// Store key holding the reset time (unix seconds) while tripped
pub const RATE_LIMIT_KEY: &str = "uplift_rate_limit";

/// Remaining-quota header
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Quota reset header (unix seconds)
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Suppresses every outbound request once the hosting API reports quota
/// exhaustion, until the provider's reset time passes.
///
/// The reset time is mirrored into the store so a restarted host keeps
/// honoring it.
pub struct RateLimitBreaker {
    store: Arc<dyn KeyValueStore>,
    reset_at: RwLock<Option<DateTime<Utc>>>,
}

impl RateLimitBreaker {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let reset_at = store
            .get(RATE_LIMIT_KEY)
            .and_then(|value| value.as_i64())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        Self {
            store,
            reset_at: RwLock::new(reset_at),
        }
    }

    /// Reset time if the breaker is tripped at `now`.
    ///
    /// An expired trip clears itself.
    pub fn tripped_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let reset_at = (*self.reset_at.read())?;
        if reset_at > now {
            return Some(reset_at);
        }

        *self.reset_at.write() = None;
        if let Err(e) = self.store.delete(RATE_LIMIT_KEY) {
            tracing::warn!("Failed to clear rate limit flag: {}", e);
        }
        tracing::info!("Rate limit window passed, outbound requests resumed");
        None
    }

    pub fn is_tripped(&self, now: DateTime<Utc>) -> bool {
        self.tripped_until(now).is_some()
    }

    /// Trip until `reset_at`. A later reset time extends an existing trip.
    pub fn trip(&self, reset_at: DateTime<Utc>) -> UpdateResult<()> {
        {
            let mut current = self.reset_at.write();
            if current.is_some_and(|existing| existing >= reset_at) {
                return Ok(());
            }
            *current = Some(reset_at);
        }
        tracing::warn!(%reset_at, "Hosting API quota exhausted, suppressing requests");
        self.store
            .set(RATE_LIMIT_KEY, serde_json::Value::from(reset_at.timestamp()))
    }
}

/// Quota state reported by response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaHeaders {
    pub remaining: Option<i64>,
    pub reset_at: Option<DateTime<Utc>>,
}

impl QuotaHeaders {
    /// Read the quota headers from lower-cased response headers.
    pub fn parse(headers: &BTreeMap<String, String>) -> Self {
        let int = |name: &str| headers.get(name).and_then(|v| v.trim().parse::<i64>().ok());
        Self {
            remaining: int(REMAINING_HEADER),
            reset_at: int(RESET_HEADER).and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        }
    }

    /// True when the provider says no requests remain.
    pub fn exhausted(&self) -> bool {
        self.remaining.is_some_and(|remaining| remaining <= 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;

    #[test]
    fn test_trip_and_recover() {
        let store = Arc::new(MemoryStore::new());
        let breaker = RateLimitBreaker::new(store.clone());
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let reset = now + Duration::minutes(10);

        assert!(!breaker.is_tripped(now));
        breaker.trip(reset).unwrap();
        assert_eq!(breaker.tripped_until(now), Some(reset));
        assert!(breaker.is_tripped(reset - Duration::seconds(1)));
        assert!(store.contains(RATE_LIMIT_KEY));

        assert!(!breaker.is_tripped(reset));
        assert!(!store.contains(RATE_LIMIT_KEY));
    }

    #[test]
    fn test_trip_survives_restart() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let reset = now + Duration::minutes(5);
        RateLimitBreaker::new(store.clone()).trip(reset).unwrap();

        let restarted = RateLimitBreaker::new(store);
        assert_eq!(restarted.tripped_until(now), Some(reset));
    }

    #[test]
    fn test_earlier_reset_does_not_shorten() {
        let breaker = RateLimitBreaker::new(Arc::new(MemoryStore::new()));
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        breaker.trip(now + Duration::minutes(10)).unwrap();
        breaker.trip(now + Duration::minutes(1)).unwrap();
        assert_eq!(breaker.tripped_until(now), Some(now + Duration::minutes(10)));
    }

    #[test]
    fn test_quota_headers() {
        let headers = BTreeMap::from([
            (REMAINING_HEADER.to_string(), "0".to_string()),
            (RESET_HEADER.to_string(), "1700000600".to_string()),
        ]);
        let quota = QuotaHeaders::parse(&headers);
        assert!(quota.exhausted());
        assert_eq!(quota.reset_at.map(|t| t.timestamp()), Some(1_700_000_600));

        let quota = QuotaHeaders::parse(&BTreeMap::new());
        assert!(!quota.exhausted());
        assert_eq!(quota.reset_at, None);
    }
}
