//! TikTok API v2.
//!
//! Authenticates with the client-credentials grant; the resulting bearer
//! token is cached until it expires and refreshed once when the platform
//! rejects it with 401. Engagement is `(likes + comments + shares) / views × 100`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use trendscope_core::{Platform, PlatformSettings, TrendItem};

use super::{credential, decode, from_unix, lenient_u64};
use crate::adapter::{not_configured, PlatformAdapter};
use crate::cache::ResponseCache;
use crate::engagement::{growth_rate, performance_level, sum_interactions, view_rate};
use crate::error::CollectorError;
use crate::http::{Auth, HttpOptions, PlatformHttp};
use crate::insights::{self, ScoredContent};
use crate::keywords::{extract_hashtags, extract_keywords};
use crate::sentiment;
use crate::types::{
    AudienceInsights, BucketGroups, CompetitorProfile, ContentDetail, EngagementMetrics,
};

const DEFAULT_BASE_URL: &str = "https://open.tiktokapis.com/v2";
const COMPETITOR_WINDOW: u32 = 20;
const HISTORY_DAYS: u32 = 7;
/// Refresh this long before the advertised expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const VIDEO_FIELDS: &str = "id,desc,create_time,statistics";
const CATEGORY: &str = "video";
const TITLE_MAX_CHARS: usize = 100;

struct ClientCredentials {
    key: String,
    secret: String,
}

#[derive(Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

pub struct TikTokAdapter {
    http: PlatformHttp,
    credentials: Option<ClientCredentials>,
    token: RwLock<Option<AccessToken>>,
}

impl TikTokAdapter {
    /// Build the adapter and, when both client credentials are present,
    /// exchange them for an access token straight away.
    ///
    /// Without credentials the adapter is returned unconfigured.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Configuration`] if the base URL is invalid
    /// or the token exchange fails.
    pub async fn connect(
        client_key: Option<&String>,
        client_secret: Option<&String>,
        settings: &PlatformSettings,
        options: &HttpOptions,
        cache: Arc<dyn ResponseCache>,
    ) -> Result<Self, CollectorError> {
        let base_url = settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let credentials = match (credential(client_key), credential(client_secret)) {
            (Some(key), Some(secret)) => Some(ClientCredentials { key, secret }),
            _ => None,
        };
        let adapter = Self {
            http: PlatformHttp::new(Platform::TikTok, base_url, options, cache)?,
            credentials,
            token: RwLock::new(None),
        };
        if adapter.credentials.is_some() {
            adapter
                .refresh_token()
                .await
                .map_err(|e| CollectorError::Configuration {
                    platform: Platform::TikTok,
                    reason: format!("client credential exchange failed: {e}"),
                })?;
        }
        Ok(adapter)
    }

    fn credentials(&self) -> Result<&ClientCredentials, CollectorError> {
        self.credentials.as_ref().ok_or_else(|| {
            not_configured(Platform::TikTok, "TIKTOK_CLIENT_KEY / TIKTOK_CLIENT_SECRET")
        })
    }

    /// Exchange the client credentials for a new access token.
    ///
    /// Transport and status errors surface unchanged; a 200 response without
    /// a token is reported as an upstream 401.
    async fn refresh_token(&self) -> Result<String, CollectorError> {
        let creds = self.credentials()?;
        let body = self
            .http
            .post_form(
                "oauth/token/",
                &[
                    ("client_key", creds.key.as_str()),
                    ("client_secret", creds.secret.as_str()),
                    ("grant_type", "client_credentials"),
                ],
            )
            .await?;

        let grant: TokenGrant = decode(Platform::TikTok, "oauth/token", body)?;
        let Some(value) = grant.access_token.filter(|t| !t.is_empty()) else {
            return Err(CollectorError::Upstream {
                platform: Platform::TikTok,
                status: 401,
                message: format!(
                    "client credential exchange rejected: {}",
                    grant.error_description.or(grant.error).unwrap_or_default()
                ),
            });
        };

        let lifetime = Duration::from_secs(grant.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *self.token.write().await = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });
        tracing::debug!(expires_in = grant.expires_in, "tiktok access token obtained");
        Ok(value)
    }

    async fn bearer(&self) -> Result<String, CollectorError> {
        self.credentials()?;
        if let Some(token) = self.token.read().await.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }
        self.refresh_token().await
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, CollectorError> {
        let token = self.bearer().await?;
        let body = match self.http.get_json(path, params, Auth::Bearer(&token)).await {
            Err(CollectorError::Upstream { status: 401, .. }) => {
                tracing::info!(path, "tiktok rejected access token, refreshing");
                let token = self.refresh_token().await?;
                self.http
                    .get_json(path, params, Auth::Bearer(&token))
                    .await?
            }
            other => other?,
        };
        decode(Platform::TikTok, path, body)
    }

    async fn video(&self, content_id: &str) -> Result<Video, CollectorError> {
        let envelope: Envelope<Option<Video>> = self
            .get(
                "video/query/",
                &[
                    ("video_id", content_id.to_string()),
                    ("fields", VIDEO_FIELDS.to_string()),
                ],
            )
            .await?;
        envelope.data.ok_or_else(|| CollectorError::NotFound {
            platform: Platform::TikTok,
            resource: format!("video {content_id}"),
        })
    }

    /// Views at the oldest snapshot in the history window, if any.
    async fn historical_views(&self, content_id: &str) -> Option<u64> {
        let result: Result<Envelope<Vec<DailyStats>>, _> = self
            .get(
                "video/stats/historical/",
                &[
                    ("video_id", content_id.to_string()),
                    ("days", HISTORY_DAYS.to_string()),
                ],
            )
            .await;
        match result {
            Ok(envelope) => envelope
                .data
                .into_iter()
                .min_by(|a, b| a.date.cmp(&b.date))
                .map(|day| day.stats.play_count),
            Err(e) => {
                tracing::debug!(error = %e, content_id, "tiktok history unavailable, growth is 0");
                None
            }
        }
    }
}

#[async_trait]
impl PlatformAdapter for TikTokAdapter {
    fn platform(&self) -> Platform {
        Platform::TikTok
    }

    fn begin_cycle(&self) {
        self.http.clear_cache();
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    async fn fetch_trending(&self, max_results: u32) -> Result<Vec<TrendItem>, CollectorError> {
        let envelope: Envelope<Vec<Video>> = self
            .get(
                "video/list/",
                &[
                    ("fields", VIDEO_FIELDS.to_string()),
                    ("max_count", max_results.to_string()),
                ],
            )
            .await?;
        let now = Utc::now();
        Ok(envelope
            .data
            .iter()
            .map(|video| video.to_trend_item(now))
            .collect())
    }

    async fn fetch_content_detail(
        &self,
        content_id: &str,
    ) -> Result<ContentDetail, CollectorError> {
        Ok(self.video(content_id).await?.to_detail())
    }

    async fn fetch_engagement_metrics(
        &self,
        content_id: &str,
    ) -> Result<EngagementMetrics, CollectorError> {
        let envelope: Envelope<Option<VideoStatistics>> = self
            .get("video/stats/", &[("video_id", content_id.to_string())])
            .await?;
        let stats = envelope.data.ok_or_else(|| CollectorError::NotFound {
            platform: Platform::TikTok,
            resource: format!("video {content_id}"),
        })?;

        let growth = match self.historical_views(content_id).await {
            Some(previous) => growth_rate(stats.play_count, previous),
            None => 0.0,
        };
        let rate = stats.engagement_rate();
        Ok(EngagementMetrics {
            platform: Platform::TikTok,
            content_id: content_id.to_string(),
            metrics: stats.metrics(),
            engagement_rate: rate,
            performance_level: performance_level(Platform::TikTok, rate),
            growth_rate: growth,
            measured_at: Utc::now(),
        })
    }

    async fn fetch_competitor_profile(
        &self,
        account_id: &str,
    ) -> Result<CompetitorProfile, CollectorError> {
        let envelope: Envelope<Option<UserVideos>> = self
            .get(
                "user/videos/",
                &[
                    ("username", account_id.to_string()),
                    ("fields", VIDEO_FIELDS.to_string()),
                    ("max_count", COMPETITOR_WINDOW.to_string()),
                ],
            )
            .await?;
        let page = envelope.data.ok_or_else(|| CollectorError::NotFound {
            platform: Platform::TikTok,
            resource: format!("user {account_id}"),
        })?;

        let scored: Vec<ScoredContent> = page.videos.iter().map(Video::scored).collect();
        Ok(insights::competitor_profile(
            Platform::TikTok,
            account_id,
            page.user.display_name,
            Some(page.user.follower_count),
            &scored,
        ))
    }

    async fn fetch_audience_insights(
        &self,
        content_ids: &[String],
    ) -> Result<AudienceInsights, CollectorError> {
        self.credentials()?;
        let mut buckets = BucketGroups::new();
        let mut scored = Vec::with_capacity(content_ids.len());

        for id in content_ids {
            let video = match self.video(id).await {
                Ok(video) => video,
                Err(CollectorError::NotFound { .. }) => {
                    tracing::warn!(content_id = %id, "tiktok video not found, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            scored.push(video.scored());

            let envelope: Envelope<Option<VideoInsights>> = self
                .get("video/insights/", &[("video_id", id.clone())])
                .await?;
            if let Some(data) = envelope.data {
                for (group, values) in [
                    ("age_ranges", data.age_ranges),
                    ("gender", data.gender),
                    ("locations", data.locations),
                ] {
                    for (label, value) in values {
                        insights::add_to_bucket(&mut buckets, group, &label, value);
                    }
                }
            }
        }

        Ok(insights::audience_insights(Platform::TikTok, &scored, buckets))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenGrant {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

fn default_expires_in() -> u64 {
    7200
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    data: T,
}

#[derive(Debug, Deserialize)]
struct Video {
    id: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    create_time: Option<i64>,
    #[serde(default)]
    statistics: VideoStatistics,
}

#[derive(Debug, Default, Deserialize)]
struct VideoStatistics {
    #[serde(default, deserialize_with = "lenient_u64")]
    digg_count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    comment_count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    share_count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    play_count: u64,
}

#[derive(Debug, Deserialize)]
struct DailyStats {
    date: String,
    #[serde(flatten)]
    stats: VideoStatistics,
}

#[derive(Debug, Deserialize)]
struct UserVideos {
    #[serde(default)]
    user: UserInfo,
    #[serde(default)]
    videos: Vec<Video>,
}

#[derive(Debug, Default, Deserialize)]
struct UserInfo {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    follower_count: u64,
}

#[derive(Debug, Default, Deserialize)]
struct VideoInsights {
    #[serde(default)]
    age_ranges: BTreeMap<String, f64>,
    #[serde(default)]
    gender: BTreeMap<String, f64>,
    #[serde(default)]
    locations: BTreeMap<String, f64>,
}

impl VideoStatistics {
    fn metrics(&self) -> BTreeMap<String, u64> {
        BTreeMap::from([
            ("views".to_string(), self.play_count),
            ("likes".to_string(), self.digg_count),
            ("comments".to_string(), self.comment_count),
            ("shares".to_string(), self.share_count),
        ])
    }

    fn engagement_rate(&self) -> f64 {
        let interactions =
            sum_interactions(&[self.digg_count, self.comment_count, self.share_count]);
        view_rate(interactions, self.play_count)
    }
}

impl Video {
    fn title(&self) -> String {
        if self.desc.trim().is_empty() {
            self.id.clone()
        } else {
            self.desc.chars().take(TITLE_MAX_CHARS).collect()
        }
    }

    fn published_at(&self) -> Option<DateTime<Utc>> {
        self.create_time.and_then(from_unix)
    }

    fn to_trend_item(&self, detected_at: DateTime<Utc>) -> TrendItem {
        let rate = self.statistics.engagement_rate();
        let mut item = TrendItem::new(Platform::TikTok, &self.id, self.title(), detected_at);
        item.category = CATEGORY.to_string();
        item.volume = self.statistics.play_count;
        item.metrics = self.statistics.metrics();
        item.engagement_rate = rate;
        item.performance_level = performance_level(Platform::TikTok, rate);
        item.sentiment_score = sentiment::signed_score(sentiment::polarity(&self.desc));
        item.hashtags = extract_hashtags(&self.desc);
        item.related_keywords = extract_keywords(&self.desc);
        item
    }

    fn to_detail(&self) -> ContentDetail {
        let rate = self.statistics.engagement_rate();
        let level = performance_level(Platform::TikTok, rate);
        let hashtags = extract_hashtags(&self.desc);
        let published_at = self.published_at();
        ContentDetail {
            platform: Platform::TikTok,
            id: self.id.clone(),
            title: self.title(),
            text: self.desc.clone(),
            author: None,
            published_at,
            category: CATEGORY.to_string(),
            metrics: self.statistics.metrics(),
            volume: self.statistics.play_count,
            engagement_rate: rate,
            performance_level: level,
            recommendations: insights::content_recommendations(
                &self.desc,
                level,
                hashtags.len(),
                published_at.map(|ts| ts.hour()),
                Platform::TikTok,
            ),
            hashtags,
            keywords: extract_keywords(&self.desc),
            sentiment: sentiment::polarity(&self.desc),
        }
    }

    fn scored(&self) -> ScoredContent {
        ScoredContent {
            id: self.id.clone(),
            title: self.title(),
            text: String::new(),
            published_at: self.published_at(),
            volume: self.statistics.play_count,
            engagement_rate: self.statistics.engagement_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engagement_matches_reference_example() {
        let stats = VideoStatistics {
            digg_count: 1_000,
            comment_count: 100,
            share_count: 50,
            play_count: 10_000,
        };
        assert!((stats.engagement_rate() - 11.5).abs() < 1e-9);
        assert_eq!(
            performance_level(Platform::TikTok, stats.engagement_rate()),
            trendscope_core::PerformanceLevel::Good
        );
    }

    #[test]
    fn empty_description_falls_back_to_id() {
        let video: Video = serde_json::from_value(serde_json::json!({
            "id": "7301", "desc": "  ", "create_time": 1_714_557_600
        }))
        .unwrap();
        assert_eq!(video.title(), "7301");
        assert_eq!(video.published_at().unwrap().timestamp(), 1_714_557_600);
        assert_eq!(video.statistics.play_count, 0);
    }

    #[test]
    fn daily_stats_flatten_counters() {
        let day: DailyStats = serde_json::from_value(serde_json::json!({
            "date": "2024-05-01", "play_count": 900, "digg_count": 10
        }))
        .unwrap();
        assert_eq!(day.stats.play_count, 900);
        assert_eq!(day.stats.digg_count, 10);
    }
}
