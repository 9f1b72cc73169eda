//! One [`PlatformAdapter`](crate::PlatformAdapter) implementation per platform.
//!
//! Every adapter is built from an optional credential, the platform's
//! [`PlatformSettings`](trendscope_core::PlatformSettings) (whose `base_url`
//! redirects requests to a mock server in tests), shared
//! [`HttpOptions`](crate::HttpOptions) and its own response cache.

mod instagram;
mod linkedin;
mod tiktok;
mod twitter;
mod youtube;

pub use instagram::InstagramAdapter;
pub use linkedin::LinkedInAdapter;
pub use tiktok::TikTokAdapter;
pub use twitter::TwitterAdapter;
pub use youtube::YouTubeAdapter;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use trendscope_core::Platform;

use crate::error::CollectorError;

/// Deserialize a JSON payload into a wire type, tagging failures with the
/// request they came from.
pub(crate) fn decode<T: DeserializeOwned>(
    platform: Platform,
    context: &str,
    body: serde_json::Value,
) -> Result<T, CollectorError> {
    serde_json::from_value(body).map_err(|e| CollectorError::Deserialize {
        platform,
        context: context.to_owned(),
        source: e,
    })
}

/// Counters arrive as numbers, numeric strings (YouTube) or are omitted
/// entirely when hidden by the owner. All three decode to a `u64`.
pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Signed(i64),
        Float(f64),
        Text(String),
        Null,
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Num(n)) => n,
        Some(Raw::Signed(n)) => u64::try_from(n).unwrap_or(0),
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(Raw::Float(f)) if f.is_finite() && f >= 0.0 => f as u64,
        Some(Raw::Text(s)) => s.trim().parse().unwrap_or(0),
        Some(Raw::Float(_) | Raw::Null) | None => 0,
    })
}

/// Parse RFC 3339 timestamps, including the `+0000` offset form some
/// platforms emit.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Unix seconds to UTC, `None` when out of range.
pub(crate) fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// Treat blank credentials the same as absent ones.
pub(crate) fn credential(raw: Option<&String>) -> Option<String> {
    raw.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Counter {
        #[serde(default, deserialize_with = "lenient_u64")]
        n: u64,
    }

    fn n(json: &str) -> u64 {
        serde_json::from_str::<Counter>(json).unwrap().n
    }

    #[test]
    fn lenient_u64_accepts_strings_numbers_and_gaps() {
        assert_eq!(n(r#"{"n": "1200"}"#), 1200);
        assert_eq!(n(r#"{"n": 7}"#), 7);
        assert_eq!(n(r#"{"n": null}"#), 0);
        assert_eq!(n(r"{}"), 0);
        assert_eq!(n(r#"{"n": -3}"#), 0);
        assert_eq!(n(r#"{"n": "n/a"}"#), 0);
    }

    #[test]
    fn parse_timestamp_handles_both_offset_styles() {
        let a = parse_timestamp("2024-05-01T10:00:00Z").unwrap();
        let b = parse_timestamp("2024-05-01T10:00:00+0000").unwrap();
        assert_eq!(a, b);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn blank_credential_is_absent() {
        assert_eq!(credential(Some(&"  ".to_string())), None);
        assert_eq!(credential(Some(&" k ".to_string())), Some("k".to_string()));
        assert_eq!(credential(None), None);
    }
}
