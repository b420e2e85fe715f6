//! Error notices and the per-component error book.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::store::{self, KeyValueStore};

/// Store key holding recorded component errors
pub const ERRORS_KEY: &str = "uplift_errors";

/// Error surfaced through the host's notification mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub slug: String,
    pub message: String,
    /// Whether the host should show this to an operator, not only log it
    pub is_user_facing: bool,
}

/// Host notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &ErrorNotice);
}

/// Reports notices through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: &ErrorNotice) {
        if notice.is_user_facing {
            tracing::error!(slug = %notice.slug, "{}", notice.message);
        } else {
            tracing::warn!(slug = %notice.slug, "{}", notice.message);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ErrorEntry {
    message: String,
    expires_at: DateTime<Utc>,
}

/// Last error per component, kept for row-level display until it expires
/// or the next successful call clears it.
pub struct ErrorBook {
    store: Arc<dyn KeyValueStore>,
    retention: Duration,
    lock: Mutex<()>,
}

impl ErrorBook {
    pub fn new(store: Arc<dyn KeyValueStore>, retention: std::time::Duration) -> Self {
        Self {
            store,
            retention: Duration::from_std(retention).unwrap_or_else(|_| Duration::days(1)),
            lock: Mutex::new(()),
        }
    }

    fn entries(&self) -> BTreeMap<String, ErrorEntry> {
        store::load(self.store.as_ref(), ERRORS_KEY).unwrap_or_default()
    }

    fn write(&self, entries: &BTreeMap<String, ErrorEntry>) {
        let result = if entries.is_empty() {
            self.store.delete(ERRORS_KEY)
        } else {
            store::save(self.store.as_ref(), ERRORS_KEY, entries)
        };
        if let Err(e) = result {
            tracing::warn!("Failed to persist component errors: {}", e);
        }
    }

    /// Remember `message` for `slug`.
    pub fn record(&self, slug: &str, message: &str, now: DateTime<Utc>) {
        let _guard = self.lock.lock();
        let mut entries = self.entries();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            slug.to_string(),
            ErrorEntry {
                message: message.to_string(),
                expires_at: now + self.retention,
            },
        );
        self.write(&entries);
    }

    /// Forget any error for `slug`.
    pub fn clear(&self, slug: &str) {
        let _guard = self.lock.lock();
        let mut entries = self.entries();
        if entries.remove(slug).is_some() {
            self.write(&entries);
        }
    }

    /// Message recorded for `slug`, unless expired at `now`.
    pub fn get(&self, slug: &str, now: DateTime<Utc>) -> Option<String> {
        self.entries()
            .remove(slug)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.message)
    }
}
