use thiserror::Error;
use trendscope_core::Platform;

/// Errors raised by platform adapters and the shared HTTP transport.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Missing credential or failed credential exchange. Never retried.
    #[error("{platform} is not configured: {reason}")]
    Configuration { platform: Platform, reason: String },

    /// Non-2xx response that is not a 404 or 429.
    #[error("{platform} returned HTTP {status}: {message}")]
    Upstream {
        platform: Platform,
        status: u16,
        message: String,
    },

    #[error("{platform} rate limited the request (retry after {retry_after_secs}s)")]
    RateLimited {
        platform: Platform,
        retry_after_secs: u64,
    },

    #[error("{platform} has no resource {resource}")]
    NotFound { platform: Platform, resource: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{platform} sent a malformed response for {context}: {source}")]
    Deserialize {
        platform: Platform,
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A single item could not be normalized or stored; the item is dropped.
    #[error("{platform} item {external_id} could not be mapped: {reason}")]
    Mapping {
        platform: Platform,
        external_id: String,
        reason: String,
    },

    #[error("{platform} did not finish within {secs}s")]
    Timeout { platform: Platform, secs: u64 },
}

impl CollectorError {
    /// Short machine-readable category, stable across message changes.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            CollectorError::Configuration { .. } => "configuration",
            CollectorError::Upstream { .. }
            | CollectorError::RateLimited { .. }
            | CollectorError::Http(_)
            | CollectorError::Deserialize { .. } => "upstream",
            CollectorError::NotFound { .. } => "not_found",
            CollectorError::Mapping { .. } => "mapping",
            CollectorError::Timeout { .. } => "timeout",
        }
    }

    /// HTTP status reported by the platform, when there was one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            CollectorError::Upstream { status, .. } => Some(*status),
            CollectorError::RateLimited { .. } => Some(429),
            CollectorError::NotFound { .. } => Some(404),
            CollectorError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
