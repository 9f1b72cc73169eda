//! YouTube Data API v3.
//!
//! Authenticated with an API key passed as the `key` query parameter.
//! Engagement is `(likes + comments) / views × 100`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;
use trendscope_core::{Platform, PlatformSettings, TrendItem};

use super::{credential, decode, lenient_u64, parse_timestamp};
use crate::adapter::{not_configured, PlatformAdapter};
use crate::cache::ResponseCache;
use crate::engagement::{performance_level, sum_interactions, view_rate};
use crate::error::CollectorError;
use crate::http::{Auth, HttpOptions, PlatformHttp};
use crate::insights::{self, ScoredContent};
use crate::keywords::{extract_hashtags, extract_keywords};
use crate::sentiment;
use crate::types::{
    AudienceInsights, BucketGroups, CompetitorProfile, ContentDetail, EngagementMetrics,
};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const DEFAULT_REGION: &str = "FR";
/// The `videos` endpoint accepts at most 50 ids per call.
const DETAIL_CHUNK: usize = 50;
/// Page size bounds of the `mostPopular` chart.
const CHART_MIN: u32 = 1;
const CHART_MAX: u32 = 50;
const COMPETITOR_WINDOW: u32 = 50;
const CATEGORY: &str = "video";

pub struct YouTubeAdapter {
    http: PlatformHttp,
    api_key: Option<String>,
    region_code: String,
}

impl YouTubeAdapter {
    /// # Errors
    ///
    /// Returns [`CollectorError::Configuration`] if the base URL is invalid
    /// or [`CollectorError::Http`] if the HTTP client cannot be built.
    pub fn new(
        api_key: Option<&String>,
        settings: &PlatformSettings,
        options: &HttpOptions,
        cache: Arc<dyn ResponseCache>,
    ) -> Result<Self, CollectorError> {
        let base_url = settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(Self {
            http: PlatformHttp::new(Platform::YouTube, base_url, options, cache)?,
            api_key: credential(api_key),
            region_code: settings
                .region_code
                .clone()
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        })
    }

    fn api_key(&self) -> Result<&str, CollectorError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| not_configured(Platform::YouTube, "YOUTUBE_API_KEY"))
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T, CollectorError> {
        params.push(("key", self.api_key()?.to_owned()));
        let body = self.http.get_json(path, &params, Auth::None).await?;
        decode(Platform::YouTube, path, body)
    }

    /// Fetch full records for `ids`, 50 per request, preserving request order.
    async fn videos_by_ids(&self, ids: &[String]) -> Result<Vec<Video>, CollectorError> {
        let mut videos = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(DETAIL_CHUNK) {
            let page: VideoList = self
                .get(
                    "videos",
                    vec![
                        ("part", "snippet,statistics".to_string()),
                        ("id", chunk.join(",")),
                    ],
                )
                .await?;
            videos.extend(page.items);
        }
        Ok(videos)
    }

    async fn video(&self, content_id: &str) -> Result<Video, CollectorError> {
        self.videos_by_ids(&[content_id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CollectorError::NotFound {
                platform: Platform::YouTube,
                resource: format!("video {content_id}"),
            })
    }
}

#[async_trait]
impl PlatformAdapter for YouTubeAdapter {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    fn begin_cycle(&self) {
        self.http.clear_cache();
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch_trending(&self, max_results: u32) -> Result<Vec<TrendItem>, CollectorError> {
        let page: VideoList = self
            .get(
                "videos",
                vec![
                    ("part", "snippet,statistics".to_string()),
                    ("chart", "mostPopular".to_string()),
                    ("regionCode", self.region_code.clone()),
                    (
                        "maxResults",
                        max_results.clamp(CHART_MIN, CHART_MAX).to_string(),
                    ),
                ],
            )
            .await?;

        let now = Utc::now();
        let items: Vec<TrendItem> = page.items.iter().map(|v| v.to_trend_item(now)).collect();
        tracing::debug!(
            count = items.len(),
            region = %self.region_code,
            "youtube trending fetched"
        );
        Ok(items)
    }

    async fn fetch_content_detail(
        &self,
        content_id: &str,
    ) -> Result<ContentDetail, CollectorError> {
        let video = self.video(content_id).await?;
        Ok(video.to_detail())
    }

    async fn fetch_engagement_metrics(
        &self,
        content_id: &str,
    ) -> Result<EngagementMetrics, CollectorError> {
        let video = self.video(content_id).await?;
        let rate = video.engagement_rate();
        Ok(EngagementMetrics {
            platform: Platform::YouTube,
            content_id: video.id.clone(),
            metrics: video.metrics(),
            engagement_rate: rate,
            performance_level: performance_level(Platform::YouTube, rate),
            // The Data API exposes no historical counters.
            growth_rate: 0.0,
            measured_at: Utc::now(),
        })
    }

    async fn fetch_competitor_profile(
        &self,
        account_id: &str,
    ) -> Result<CompetitorProfile, CollectorError> {
        let channels: ChannelList = self
            .get(
                "channels",
                vec![
                    ("part", "statistics,snippet".to_string()),
                    ("id", account_id.to_string()),
                ],
            )
            .await?;
        let channel = channels
            .items
            .into_iter()
            .next()
            .ok_or_else(|| CollectorError::NotFound {
                platform: Platform::YouTube,
                resource: format!("channel {account_id}"),
            })?;

        let search: SearchList = self
            .get(
                "search",
                vec![
                    ("part", "id".to_string()),
                    ("channelId", account_id.to_string()),
                    ("maxResults", COMPETITOR_WINDOW.to_string()),
                    ("order", "date".to_string()),
                    ("type", "video".to_string()),
                ],
            )
            .await?;
        let ids: Vec<String> = search
            .items
            .into_iter()
            .filter_map(|hit| hit.id.video_id)
            .collect();

        let videos = self.videos_by_ids(&ids).await?;
        let scored: Vec<ScoredContent> = videos.iter().map(Video::scored).collect();

        Ok(insights::competitor_profile(
            Platform::YouTube,
            account_id,
            Some(channel.snippet.title),
            Some(channel.statistics.subscriber_count),
            &scored,
        ))
    }

    async fn fetch_audience_insights(
        &self,
        content_ids: &[String],
    ) -> Result<AudienceInsights, CollectorError> {
        // Fail on a missing key even when no ids are given.
        self.api_key()?;
        let videos = self.videos_by_ids(content_ids).await?;
        let scored: Vec<ScoredContent> = videos.iter().map(Video::scored).collect();

        let mut buckets = BucketGroups::new();
        for video in &videos {
            for format in insights::detect_formats(&video.snippet.title) {
                insights::add_to_bucket(&mut buckets, "formats", format, 1.0);
            }
            let label = if video.title_has_emoji() {
                "with_emoji"
            } else {
                "without_emoji"
            };
            insights::add_to_bucket(&mut buckets, "title_emoji", label, video.engagement_rate());
        }

        Ok(insights::audience_insights(Platform::YouTube, &scored, buckets))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct VideoList {
    #[serde(default)]
    items: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    id: String,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    statistics: VideoStatistics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    channel_title: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    #[serde(default, deserialize_with = "lenient_u64")]
    view_count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    like_count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    comment_count: u64,
}

#[derive(Debug, Deserialize)]
struct ChannelList {
    #[serde(default)]
    items: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    snippet: ChannelSnippet,
    #[serde(default)]
    statistics: ChannelStatistics,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelSnippet {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    #[serde(default, deserialize_with = "lenient_u64")]
    subscriber_count: u64,
}

#[derive(Debug, Deserialize)]
struct SearchList {
    #[serde(default)]
    items: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: SearchId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    #[serde(default)]
    video_id: Option<String>,
}

impl Video {
    fn metrics(&self) -> BTreeMap<String, u64> {
        BTreeMap::from([
            ("views".to_string(), self.statistics.view_count),
            ("likes".to_string(), self.statistics.like_count),
            ("comments".to_string(), self.statistics.comment_count),
        ])
    }

    fn engagement_rate(&self) -> f64 {
        let interactions =
            sum_interactions(&[self.statistics.like_count, self.statistics.comment_count]);
        view_rate(interactions, self.statistics.view_count)
    }

    fn full_text(&self) -> String {
        format!("{} {}", self.snippet.title, self.snippet.description)
    }

    fn hashtags(&self) -> Vec<String> {
        let mut tags = extract_hashtags(&self.full_text());
        tags.extend(self.snippet.tags.iter().map(|t| format!("#{}", t.replace(' ', ""))));
        tags
    }

    fn title_has_emoji(&self) -> bool {
        self.snippet.title.chars().any(|c| u32::from(c) >= 0x1F300)
    }

    fn to_trend_item(&self, detected_at: DateTime<Utc>) -> TrendItem {
        let rate = self.engagement_rate();
        let mut item =
            TrendItem::new(Platform::YouTube, &self.id, &self.snippet.title, detected_at);
        item.category = CATEGORY.to_string();
        item.volume = self.statistics.view_count;
        item.metrics = self.metrics();
        item.engagement_rate = rate;
        item.performance_level = performance_level(Platform::YouTube, rate);
        item.sentiment_score = sentiment::signed_score(sentiment::polarity(&self.full_text()));
        item.hashtags = self.hashtags();
        item.related_keywords = extract_keywords(&self.snippet.title);
        item
    }

    fn to_detail(&self) -> ContentDetail {
        let rate = self.engagement_rate();
        let level = performance_level(Platform::YouTube, rate);
        let published_at = self.snippet.published_at.as_deref().and_then(parse_timestamp);
        let hashtags = self.hashtags();

        let mut recommendations = insights::content_recommendations(
            &self.snippet.title,
            level,
            hashtags.len(),
            published_at.map(|ts| ts.hour()),
            Platform::YouTube,
        );
        for format in insights::detect_formats(&self.snippet.title) {
            recommendations.push(format!("Successful format detected: {format}"));
        }

        ContentDetail {
            platform: Platform::YouTube,
            id: self.id.clone(),
            title: self.snippet.title.clone(),
            text: self.snippet.description.clone(),
            author: self.snippet.channel_title.clone(),
            published_at,
            category: CATEGORY.to_string(),
            metrics: self.metrics(),
            volume: self.statistics.view_count,
            engagement_rate: rate,
            performance_level: level,
            hashtags,
            keywords: extract_keywords(&self.full_text()),
            sentiment: sentiment::polarity(&self.full_text()),
            recommendations,
        }
    }

    fn scored(&self) -> ScoredContent {
        ScoredContent {
            id: self.id.clone(),
            title: self.snippet.title.clone(),
            text: self.snippet.description.clone(),
            published_at: self.snippet.published_at.as_deref().and_then(parse_timestamp),
            volume: self.statistics.view_count,
            engagement_rate: self.engagement_rate(),
        }
    }
}
