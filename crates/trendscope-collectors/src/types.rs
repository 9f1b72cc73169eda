use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trendscope_core::{PerformanceLevel, Platform, TrendItem};

use crate::sentiment;

/// Full view of a single piece of content, including recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDetail {
    pub platform: Platform,
    pub id: String,
    pub title: String,
    /// Body text or description; may be empty.
    pub text: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub category: String,
    pub metrics: BTreeMap<String, u64>,
    pub volume: u64,
    pub engagement_rate: f64,
    pub performance_level: PerformanceLevel,
    pub hashtags: Vec<String>,
    pub keywords: Vec<String>,
    /// Polarity in `[0, 1]`, `0.5` when neutral.
    pub sentiment: f64,
    pub recommendations: Vec<String>,
}

impl ContentDetail {
    /// Project the detail onto a normalized trend record.
    #[must_use]
    pub fn to_trend_item(&self, detected_at: DateTime<Utc>) -> TrendItem {
        let mut item = TrendItem::new(self.platform, &self.id, &self.title, detected_at);
        item.category.clone_from(&self.category);
        item.volume = self.volume;
        item.metrics.clone_from(&self.metrics);
        item.engagement_rate = self.engagement_rate;
        item.performance_level = self.performance_level;
        item.sentiment_score = sentiment::signed_score(self.sentiment);
        item.hashtags.clone_from(&self.hashtags);
        item.related_keywords.clone_from(&self.keywords);
        item
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub platform: Platform,
    pub content_id: String,
    pub metrics: BTreeMap<String, u64>,
    pub engagement_rate: f64,
    pub performance_level: PerformanceLevel,
    /// Percent change against the historical snapshot; `0.0` without one.
    pub growth_rate: f64,
    pub measured_at: DateTime<Utc>,
}

/// One of the best-performing items inside a competitor window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentHighlight {
    pub id: String,
    pub title: String,
    pub engagement_rate: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorProfile {
    pub platform: Platform,
    pub account_id: String,
    pub display_name: Option<String>,
    pub followers: Option<u64>,
    pub items_analyzed: usize,
    pub average_engagement_rate: f64,
    pub average_views: f64,
    pub best_hours: Vec<HourEngagement>,
    pub top_keywords: Vec<String>,
    /// Top three items by engagement rate, best first.
    pub highlights: Vec<ContentHighlight>,
}

/// Mean engagement for items published during one UTC hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourEngagement {
    pub hour: u32,
    pub mean_engagement_rate: f64,
    pub items: usize,
}

/// Bucket group name -> bucket label -> share of the group total in percent.
pub type BucketGroups = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudienceInsights {
    pub platform: Platform,
    pub items_analyzed: usize,
    pub buckets: BucketGroups,
    pub best_hours: Vec<HourEngagement>,
    pub top_keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Format,
    Keywords,
    Hashtags,
    Timing,
    Engagement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSuggestion {
    pub kind: SuggestionKind,
    pub message: String,
    pub examples: Vec<String>,
}

impl ContentSuggestion {
    pub const MAX_PER_REQUEST: usize = 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_projects_signed_sentiment() {
        let detail = ContentDetail {
            platform: Platform::YouTube,
            id: "abc".to_string(),
            title: "Best tutorial".to_string(),
            text: String::new(),
            author: Some("chan".to_string()),
            published_at: None,
            category: "video".to_string(),
            metrics: BTreeMap::from([("views".to_string(), 100)]),
            volume: 100,
            engagement_rate: 4.0,
            performance_level: PerformanceLevel::Average,
            hashtags: vec!["#rust".to_string()],
            keywords: vec!["tutorial".to_string()],
            sentiment: 1.0,
            recommendations: Vec::new(),
        };
        let item = detail.to_trend_item(Utc::now());
        assert_eq!(item.external_id, "abc");
        assert_eq!(item.category, "video");
        assert!((item.sentiment_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(item.metric("views"), 100);
        assert_eq!(item.related_keywords, vec!["tutorial".to_string()]);
    }

    #[test]
    fn suggestion_kind_serializes_snake_case() {
        let json = serde_json::to_string(&SuggestionKind::Timing).unwrap();
        assert_eq!(json, "\"timing\"");
    }
}
