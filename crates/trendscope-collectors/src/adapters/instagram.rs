//! Instagram Graph API.
//!
//! Uses a long-lived user access token. Engagement is follower-denominated:
//! `(likes + comments) / followers × 100`, with saves added when the insights
//! endpoint reports them.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;
use trendscope_core::{Platform, PlatformSettings, TrendItem};

use super::{credential, decode, lenient_u64, parse_timestamp};
use crate::adapter::{not_configured, PlatformAdapter};
use crate::cache::ResponseCache;
use crate::engagement::{follower_rate, performance_level, sum_interactions};
use crate::error::CollectorError;
use crate::http::{Auth, HttpOptions, PlatformHttp};
use crate::insights::{self, ScoredContent};
use crate::keywords::{extract_hashtags, extract_keywords};
use crate::sentiment;
use crate::types::{
    AudienceInsights, BucketGroups, CompetitorProfile, ContentDetail, EngagementMetrics,
};

const DEFAULT_BASE_URL: &str = "https://graph.instagram.com/v12.0";
const MEDIA_FIELDS: &str = "id,caption,media_type,timestamp,like_count,comments_count";
const INSIGHT_METRICS: &str = "engagement,impressions,reach,saved";
const COMPETITOR_WINDOW: u32 = 25;
const TITLE_MAX_CHARS: usize = 100;

pub struct InstagramAdapter {
    http: PlatformHttp,
    access_token: Option<String>,
}

impl InstagramAdapter {
    /// # Errors
    ///
    /// Returns [`CollectorError::Configuration`] if the base URL is invalid
    /// or [`CollectorError::Http`] if the HTTP client cannot be built.
    pub fn new(
        access_token: Option<&String>,
        settings: &PlatformSettings,
        options: &HttpOptions,
        cache: Arc<dyn ResponseCache>,
    ) -> Result<Self, CollectorError> {
        let base_url = settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(Self {
            http: PlatformHttp::new(Platform::Instagram, base_url, options, cache)?,
            access_token: credential(access_token),
        })
    }

    fn token(&self) -> Result<&str, CollectorError> {
        self.access_token
            .as_deref()
            .ok_or_else(|| not_configured(Platform::Instagram, "INSTAGRAM_ACCESS_TOKEN"))
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, CollectorError> {
        let token = self.token()?;
        let body = self
            .http
            .get_json(path, params, Auth::Bearer(token))
            .await?;
        decode(Platform::Instagram, path, body)
    }

    async fn own_account(&self) -> Result<Account, CollectorError> {
        self.get("me", &[("fields", "id,username,followers_count".to_string())])
            .await
    }

    async fn media(&self, content_id: &str) -> Result<Media, CollectorError> {
        self.get(content_id, &[("fields", MEDIA_FIELDS.to_string())])
            .await
    }

    async fn insights(&self, content_id: &str) -> Result<BTreeMap<String, u64>, CollectorError> {
        let page: InsightList = self
            .get(
                &format!("{content_id}/insights"),
                &[("metric", INSIGHT_METRICS.to_string())],
            )
            .await?;
        Ok(page
            .data
            .into_iter()
            .map(|metric| {
                let value = metric.values.first().map_or(0, |v| v.value);
                (metric.name, value)
            })
            .collect())
    }
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn begin_cycle(&self) {
        self.http.clear_cache();
    }

    fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }

    async fn fetch_trending(&self, max_results: u32) -> Result<Vec<TrendItem>, CollectorError> {
        let account = self.own_account().await?;
        let page: MediaList = self
            .get(
                "me/media",
                &[
                    ("fields", MEDIA_FIELDS.to_string()),
                    ("limit", max_results.to_string()),
                ],
            )
            .await?;
        let now = Utc::now();
        Ok(page
            .data
            .iter()
            .map(|media| media.to_trend_item(account.followers_count, now))
            .collect())
    }

    async fn fetch_content_detail(
        &self,
        content_id: &str,
    ) -> Result<ContentDetail, CollectorError> {
        let account = self.own_account().await?;
        let media = self.media(content_id).await?;
        Ok(media.to_detail(account.followers_count))
    }

    async fn fetch_engagement_metrics(
        &self,
        content_id: &str,
    ) -> Result<EngagementMetrics, CollectorError> {
        let account = self.own_account().await?;
        let media = self.media(content_id).await?;
        let mut metrics = media.metrics();
        match self.insights(content_id).await {
            Ok(extra) => metrics.extend(extra),
            Err(CollectorError::NotFound { .. }) => {
                tracing::debug!(content_id, "instagram insights unavailable for media");
            }
            Err(e) => return Err(e),
        }

        let saved = metrics.get("saved").copied().unwrap_or(0);
        let interactions = sum_interactions(&[media.like_count, media.comments_count, saved]);
        let rate = follower_rate(interactions, account.followers_count);
        Ok(EngagementMetrics {
            platform: Platform::Instagram,
            content_id: media.id,
            metrics,
            engagement_rate: rate,
            performance_level: performance_level(Platform::Instagram, rate),
            // Insights are lifetime totals; no snapshot to compare against.
            growth_rate: 0.0,
            measured_at: Utc::now(),
        })
    }

    async fn fetch_competitor_profile(
        &self,
        account_id: &str,
    ) -> Result<CompetitorProfile, CollectorError> {
        let me = self.own_account().await?;
        let fields = format!(
            "business_discovery.username({account_id}){{username,followers_count,media.limit({COMPETITOR_WINDOW}){{{MEDIA_FIELDS}}}}}"
        );
        let page: Discovery = self.get(&me.id, &[("fields", fields)]).await?;
        let Some(business) = page.business_discovery else {
            return Err(CollectorError::NotFound {
                platform: Platform::Instagram,
                resource: format!("account {account_id}"),
            });
        };

        let scored: Vec<ScoredContent> = business
            .media
            .data
            .iter()
            .map(|media| media.scored(business.followers_count))
            .collect();
        Ok(insights::competitor_profile(
            Platform::Instagram,
            account_id,
            business.username,
            Some(business.followers_count),
            &scored,
        ))
    }

    async fn fetch_audience_insights(
        &self,
        content_ids: &[String],
    ) -> Result<AudienceInsights, CollectorError> {
        let account = self.own_account().await?;

        let mut scored = Vec::with_capacity(content_ids.len());
        for id in content_ids {
            match self.media(id).await {
                Ok(media) => scored.push(media.scored(account.followers_count)),
                Err(CollectorError::NotFound { .. }) => {
                    tracing::warn!(content_id = %id, "instagram media not found, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        let page: AudienceList = self
            .get(
                "me/insights",
                &[
                    ("metric", "audience_gender_age,audience_country".to_string()),
                    ("period", "lifetime".to_string()),
                ],
            )
            .await?;

        let mut buckets = BucketGroups::new();
        for metric in page.data {
            let group = match metric.name.as_str() {
                "audience_gender_age" => "gender_age",
                "audience_country" => "countries",
                other => other,
            }
            .to_string();
            if let Some(first) = metric.values.into_iter().next() {
                for (label, value) in first.value {
                    insights::add_to_bucket(&mut buckets, &group, &label, value);
                }
            }
        }

        Ok(insights::audience_insights(Platform::Instagram, &scored, buckets))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Account {
    id: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    followers_count: u64,
}

#[derive(Debug, Default, Deserialize)]
struct MediaList {
    #[serde(default)]
    data: Vec<Media>,
}

#[derive(Debug, Deserialize)]
struct Media {
    id: String,
    #[serde(default)]
    caption: String,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    like_count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    comments_count: u64,
}

#[derive(Debug, Deserialize)]
struct InsightList {
    #[serde(default)]
    data: Vec<InsightMetric>,
}

#[derive(Debug, Deserialize)]
struct InsightMetric {
    name: String,
    #[serde(default)]
    values: Vec<InsightValue>,
}

#[derive(Debug, Deserialize)]
struct InsightValue {
    #[serde(default, deserialize_with = "lenient_u64")]
    value: u64,
}

#[derive(Debug, Deserialize)]
struct AudienceList {
    #[serde(default)]
    data: Vec<AudienceMetric>,
}

#[derive(Debug, Deserialize)]
struct AudienceMetric {
    name: String,
    #[serde(default)]
    values: Vec<AudienceValue>,
}

#[derive(Debug, Deserialize)]
struct AudienceValue {
    #[serde(default)]
    value: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct Discovery {
    #[serde(default)]
    business_discovery: Option<BusinessAccount>,
}

#[derive(Debug, Deserialize)]
struct BusinessAccount {
    #[serde(default)]
    username: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    followers_count: u64,
    #[serde(default)]
    media: MediaList,
}

impl Media {
    fn title(&self) -> String {
        if self.caption.trim().is_empty() {
            self.id.clone()
        } else {
            self.caption.chars().take(TITLE_MAX_CHARS).collect()
        }
    }

    fn category(&self) -> String {
        self.media_type
            .as_deref()
            .map_or_else(|| TrendItem::DEFAULT_CATEGORY.to_string(), str::to_lowercase)
    }

    fn published_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(parse_timestamp)
    }

    fn metrics(&self) -> BTreeMap<String, u64> {
        BTreeMap::from([
            ("likes".to_string(), self.like_count),
            ("comments".to_string(), self.comments_count),
        ])
    }

    fn engagement_rate(&self, followers: u64) -> f64 {
        follower_rate(
            sum_interactions(&[self.like_count, self.comments_count]),
            followers,
        )
    }

    fn to_trend_item(&self, followers: u64, detected_at: DateTime<Utc>) -> TrendItem {
        let rate = self.engagement_rate(followers);
        let mut item = TrendItem::new(Platform::Instagram, &self.id, self.title(), detected_at);
        item.category = self.category();
        item.volume = sum_interactions(&[self.like_count, self.comments_count]);
        item.metrics = self.metrics();
        item.engagement_rate = rate;
        item.performance_level = performance_level(Platform::Instagram, rate);
        item.sentiment_score = sentiment::signed_score(sentiment::polarity(&self.caption));
        item.hashtags = extract_hashtags(&self.caption);
        item.related_keywords = extract_keywords(&self.caption);
        item
    }

    fn to_detail(&self, followers: u64) -> ContentDetail {
        let rate = self.engagement_rate(followers);
        let level = performance_level(Platform::Instagram, rate);
        let hashtags = extract_hashtags(&self.caption);
        let published_at = self.published_at();
        ContentDetail {
            platform: Platform::Instagram,
            id: self.id.clone(),
            title: self.title(),
            text: self.caption.clone(),
            author: None,
            published_at,
            category: self.category(),
            metrics: self.metrics(),
            volume: sum_interactions(&[self.like_count, self.comments_count]),
            engagement_rate: rate,
            performance_level: level,
            recommendations: insights::content_recommendations(
                &self.caption,
                level,
                hashtags.len(),
                published_at.map(|ts| ts.hour()),
                Platform::Instagram,
            ),
            hashtags,
            keywords: extract_keywords(&self.caption),
            sentiment: sentiment::polarity(&self.caption),
        }
    }

    fn scored(&self, followers: u64) -> ScoredContent {
        ScoredContent {
            id: self.id.clone(),
            title: self.title(),
            text: String::new(),
            published_at: self.published_at(),
            volume: sum_interactions(&[self.like_count, self.comments_count]),
            engagement_rate: self.engagement_rate(followers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media() -> Media {
        serde_json::from_value(serde_json::json!({
            "id": "179",
            "caption": "Sunset in Lyon #travel #france",
            "media_type": "IMAGE",
            "timestamp": "2024-05-01T18:30:00+0000",
            "like_count": 40,
            "comments_count": 10
        }))
        .unwrap()
    }

    #[test]
    fn rate_is_follower_denominated() {
        let m = media();
        assert!((m.engagement_rate(1_000) - 5.0).abs() < 1e-9);
        assert_eq!(m.engagement_rate(0).to_bits(), 0.0_f64.to_bits());
    }

    #[test]
    fn trend_item_lowercases_media_type_and_extracts_tags() {
        let item = media().to_trend_item(1_000, Utc::now());
        assert_eq!(item.category, "image");
        assert_eq!(item.hashtags, vec!["#travel", "#france"]);
        assert_eq!(item.volume, 50);
        assert_eq!(item.performance_level, trendscope_core::PerformanceLevel::Good);
    }

    #[test]
    fn published_at_parses_graph_offset() {
        let ts = media().published_at().unwrap();
        assert_eq!(ts.hour(), 18);
    }
}
