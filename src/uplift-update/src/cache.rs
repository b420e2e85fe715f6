//! Response cache keyed by request fingerprint.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::UpdaterConfig;
use crate::error::FetchError;

/// Stable fingerprint of a request: SHA-256 over the URL and the
/// caller-supplied headers in name order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(url: &str, headers: &BTreeMap<String, String>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        for (name, value) in headers {
            hasher.update(b"\n");
            hasher.update(name.to_ascii_lowercase().as_bytes());
            hasher.update(b":");
            hasher.update(value.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12])
    }
}

/// Cache lifetime class of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    Repository,
    Release,
    Assets,
}

impl TtlClass {
    /// Lifetime of a successful response of this class, before jitter.
    pub fn ttl_secs(self, config: &UpdaterConfig) -> u64 {
        match self {
            Self::Repository => config.repo_ttl_secs,
            Self::Release => config.release_ttl_secs,
            Self::Assets => config.asset_ttl_secs,
        }
    }
}

/// Cached outcome of a request. Failures are cached too, briefly.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub payload: Result<Option<Value>, FetchError>,
    pub expires_at: DateTime<Utc>,
}

/// Process-wide response cache shared by every component.
///
/// Concurrent writers for the same fingerprint race to an equivalent entry;
/// the last write wins.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: RwLock<HashMap<Fingerprint, CacheEntry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `key` if it has not expired at `now`.
    pub fn get(&self, key: &Fingerprint, now: DateTime<Utc>) -> Option<CacheEntry> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        self.entries.write().remove(key);
        None
    }

    pub fn insert(&self, key: Fingerprint, entry: CacheEntry) {
        self.entries.write().insert(key, entry);
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self, now: DateTime<Utc>) {
        self.entries.write().retain(|_, entry| entry.expires_at > now);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = Fingerprint::of("https://api/x", &headers(&[("a", "1"), ("b", "2")]));
        let b = Fingerprint::of("https://api/x", &headers(&[("b", "2"), ("a", "1")]));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_fingerprint_distinguishes_url_and_headers() {
        let base = Fingerprint::of("https://api/x", &BTreeMap::new());
        assert_ne!(base, Fingerprint::of("https://api/y", &BTreeMap::new()));
        assert_ne!(base, Fingerprint::of("https://api/x", &headers(&[("a", "1")])));
    }

    #[test]
    fn test_expiry() {
        let cache = ResponseCache::new();
        let now = Utc::now();
        let key = Fingerprint::of("u", &BTreeMap::new());
        cache.insert(
            key.clone(),
            CacheEntry {
                payload: Ok(Some(json!({"ok": true}))),
                expires_at: now + Duration::seconds(10),
            },
        );

        assert!(cache.get(&key, now + Duration::seconds(9)).is_some());
        assert!(cache.get(&key, now + Duration::seconds(10)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cached_failure_and_purge() {
        let cache = ResponseCache::new();
        let now = Utc::now();
        let failing = Fingerprint::of("fail", &BTreeMap::new());
        let fine = Fingerprint::of("fine", &BTreeMap::new());
        let error = FetchError::HostingApi {
            status: 500,
            message: "boom".into(),
        };
        cache.insert(
            failing.clone(),
            CacheEntry {
                payload: Err(error.clone()),
                expires_at: now + Duration::seconds(15),
            },
        );
        cache.insert(
            fine,
            CacheEntry {
                payload: Ok(None),
                expires_at: now + Duration::hours(3),
            },
        );

        let hit = cache.get(&failing, now).unwrap();
        assert_eq!(hit.payload, Err(error));

        cache.purge_expired(now + Duration::seconds(20));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_ttl_classes() {
        let config = UpdaterConfig::default();
        assert_eq!(TtlClass::Repository.ttl_secs(&config), 180);
        assert_eq!(TtlClass::Release.ttl_secs(&config), 180);
        assert_eq!(TtlClass::Assets.ttl_secs(&config), 10_800);
    }
}
