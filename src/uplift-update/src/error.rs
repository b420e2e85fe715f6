//! Error types for uplift-update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for update operations.
pub type UpdateResult<T> = std::result::Result<T, UpdateError>;

/// Errors reported synchronously to the caller.
///
/// Fetch failures are normally absorbed by the reconciler into the record's
/// `last_error`; they only appear here from the fetcher API itself.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Component {slug} is not registered")]
    NotConfigured { slug: String },

    #[error("Component {slug} is already registered")]
    AlreadyRegistered { slug: String },

    #[error("Invalid repository locator: {locator}")]
    InvalidLocator { locator: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to access store: {message}")]
    Store { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a single metadata fetch.
///
/// Cloneable and serializable so failures can sit in the response cache for
/// their short TTL.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    /// Network failure or timeout
    #[error("Failed to reach hosting API: {message}")]
    Transport { message: String },

    /// Non-2xx response carrying the provider's message
    #[error("Hosting API returned error {status}: {message}")]
    HostingApi { status: u16, message: String },

    /// Request quota exhausted until `reset_at`
    #[error("Rate limit reached. Try again at {}", .reset_at.format("%H:%M UTC"))]
    RateLimited { reset_at: DateTime<Utc> },

    /// Response body did not have the expected shape
    #[error("Unexpected response from hosting API: {message}")]
    Decode { message: String },
}

impl FetchError {
    /// Check if this is the quota-exhaustion sub-kind.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Check if this error is retriable without operator action.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::RateLimited { .. } => true,
            Self::HostingApi { status, .. } => *status >= 500,
            Self::Decode { .. } => false,
        }
    }
}
