use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Social platforms the collectors know how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    TikTok,
    Instagram,
    Twitter,
    LinkedIn,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::YouTube,
        Platform::TikTok,
        Platform::Instagram,
        Platform::Twitter,
        Platform::LinkedIn,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::TikTok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::LinkedIn => "linkedin",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform: {0}")]
pub struct ParsePlatformError(pub String);

impl std::str::FromStr for Platform {
    type Err = ParsePlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "youtube" => Ok(Platform::YouTube),
            "tiktok" => Ok(Platform::TikTok),
            "instagram" => Ok(Platform::Instagram),
            "twitter" | "x" => Ok(Platform::Twitter),
            "linkedin" => Ok(Platform::LinkedIn),
            other => Err(ParsePlatformError(other.to_string())),
        }
    }
}

/// Coarse label derived from an engagement rate and a platform threshold table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Average,
    Poor,
}

impl PerformanceLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PerformanceLevel::Excellent => "excellent",
            PerformanceLevel::Good => "good",
            PerformanceLevel::Average => "average",
            PerformanceLevel::Poor => "poor",
        }
    }
}

impl std::fmt::Display for PerformanceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized cross-platform trend record.
///
/// `(platform, external_id)` identifies the upstream item; each collection
/// cycle produces a fresh record even when the pair was seen before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendItem {
    pub platform: Platform,
    pub external_id: String,
    pub keyword_or_title: String,
    pub category: String,
    pub volume: u64,
    pub metrics: BTreeMap<String, u64>,
    pub engagement_rate: f64,
    pub performance_level: PerformanceLevel,
    pub growth_rate: f64,
    /// Polarity in `[-1, 1]`; `0.0` when not computed.
    pub sentiment_score: f64,
    pub hashtags: Vec<String>,
    pub related_keywords: Vec<String>,
    pub detected_at: DateTime<Utc>,
}

impl TrendItem {
    pub const DEFAULT_CATEGORY: &'static str = "general";

    /// Build an item with empty enrichment fields. Adapters fill in the rest.
    #[must_use]
    pub fn new(
        platform: Platform,
        external_id: impl Into<String>,
        keyword_or_title: impl Into<String>,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            platform,
            external_id: external_id.into(),
            keyword_or_title: keyword_or_title.into(),
            category: Self::DEFAULT_CATEGORY.to_string(),
            volume: 0,
            metrics: BTreeMap::new(),
            engagement_rate: 0.0,
            performance_level: PerformanceLevel::Poor,
            growth_rate: 0.0,
            sentiment_score: 0.0,
            hashtags: Vec::new(),
            related_keywords: Vec::new(),
            detected_at,
        }
    }

    /// Look up a metric by name, treating absent keys as zero.
    #[must_use]
    pub fn metric(&self, name: &str) -> u64 {
        self.metrics.get(name).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_round_trips_through_str() {
        for platform in Platform::ALL {
            let parsed: Platform = platform.as_str().parse().unwrap();
            assert_eq!(parsed, platform);
        }
    }

    #[test]
    fn platform_parse_accepts_x_alias_and_mixed_case() {
        assert_eq!("X".parse::<Platform>().unwrap(), Platform::Twitter);
        assert_eq!(" YouTube ".parse::<Platform>().unwrap(), Platform::YouTube);
    }

    #[test]
    fn platform_parse_rejects_unknown() {
        let err = "myspace".parse::<Platform>().unwrap_err();
        assert_eq!(err, ParsePlatformError("myspace".to_string()));
    }

    #[test]
    fn platform_serializes_lowercase() {
        let json = serde_json::to_string(&Platform::LinkedIn).unwrap();
        assert_eq!(json, "\"linkedin\"");
        let json = serde_json::to_string(&Platform::TikTok).unwrap();
        assert_eq!(json, "\"tiktok\"");
    }

    #[test]
    fn new_item_defaults_category_and_zeroes() {
        let item = TrendItem::new(Platform::Twitter, "1", "#rust", Utc::now());
        assert_eq!(item.category, "general");
        assert_eq!(item.volume, 0);
        assert!(item.engagement_rate.abs() < f64::EPSILON);
        assert_eq!(item.metric("likes"), 0);
    }
}
