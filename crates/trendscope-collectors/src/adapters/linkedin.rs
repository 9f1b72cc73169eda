//! LinkedIn Marketing API v2.
//!
//! Reads shares owned by one organization, configured as the platform's
//! `account` setting. Engagement is `(likes + comments + shares) /
//! impressions × 100`; the API keeps no history so growth is always zero.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;
use trendscope_core::{Platform, PlatformSettings, TrendItem};

use super::{credential, decode, from_unix, lenient_u64};
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

const DEFAULT_BASE_URL: &str = "https://api.linkedin.com/v2";
const COMPETITOR_WINDOW: u32 = 10;
const CATEGORY: &str = "post";
const TITLE_MAX_CHARS: usize = 100;

pub struct LinkedInAdapter {
    http: PlatformHttp,
    access_token: Option<String>,
    owner: Option<String>,
}

impl LinkedInAdapter {
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
            http: PlatformHttp::new(Platform::LinkedIn, base_url, options, cache)?,
            access_token: credential(access_token),
            owner: credential(settings.account.as_ref()),
        })
    }

    fn token(&self) -> Result<&str, CollectorError> {
        self.access_token
            .as_deref()
            .ok_or_else(|| not_configured(Platform::LinkedIn, "LINKEDIN_ACCESS_TOKEN"))
    }

    fn owner(&self) -> Result<&str, CollectorError> {
        self.owner
            .as_deref()
            .ok_or_else(|| not_configured(Platform::LinkedIn, "organization account setting"))
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, CollectorError> {
        let token = self.token()?;
        let body = self.http.get_json(path, params, Auth::Bearer(token)).await?;
        decode(Platform::LinkedIn, path, body)
    }

    async fn shares_of(&self, owner: &str, count: u32) -> Result<Vec<Share>, CollectorError> {
        let page: ShareList = self
            .get(
                "shares",
                &[
                    ("q", "owners".to_string()),
                    ("owners", owner.to_string()),
                    ("count", count.to_string()),
                ],
            )
            .await?;
        Ok(page.elements)
    }

    async fn social_actions(&self, share_id: &str) -> Result<SocialActions, CollectorError> {
        self.get(&format!("socialActions/{share_id}"), &[]).await
    }

    async fn impressions(&self, share_id: &str) -> Result<u64, CollectorError> {
        let stats: ShareStatistics = self
            .get(&format!("shares/{share_id}/statistics"), &[])
            .await?;
        Ok(stats.impression_count)
    }

    async fn share(&self, share_id: &str) -> Result<Share, CollectorError> {
        self.get(&format!("shares/{share_id}"), &[]).await
    }

    /// A share with its counters, ready for scoring.
    async fn measured(&self, share: Share) -> Result<MeasuredShare, CollectorError> {
        let actions = self.social_actions(&share.id).await?;
        let impressions = self.impressions(&share.id).await?;
        Ok(MeasuredShare {
            share,
            actions,
            impressions,
        })
    }
}

#[async_trait]
impl PlatformAdapter for LinkedInAdapter {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    fn begin_cycle(&self) {
        self.http.clear_cache();
    }

    fn is_configured(&self) -> bool {
        self.access_token.is_some() && self.owner.is_some()
    }

    async fn fetch_trending(&self, max_results: u32) -> Result<Vec<TrendItem>, CollectorError> {
        self.token()?;
        let owner = self.owner()?;
        let shares = self.shares_of(owner, max_results).await?;

        let now = Utc::now();
        let mut items = Vec::with_capacity(shares.len());
        for share in shares {
            items.push(self.measured(share).await?.to_trend_item(now));
        }
        Ok(items)
    }

    async fn fetch_content_detail(
        &self,
        content_id: &str,
    ) -> Result<ContentDetail, CollectorError> {
        let share = self.share(content_id).await?;
        Ok(self.measured(share).await?.to_detail())
    }

    async fn fetch_engagement_metrics(
        &self,
        content_id: &str,
    ) -> Result<EngagementMetrics, CollectorError> {
        let share = self.share(content_id).await?;
        let measured = self.measured(share).await?;
        let rate = measured.engagement_rate();
        Ok(EngagementMetrics {
            platform: Platform::LinkedIn,
            content_id: measured.share.id.clone(),
            metrics: measured.metrics(),
            engagement_rate: rate,
            performance_level: performance_level(Platform::LinkedIn, rate),
            growth_rate: 0.0,
            measured_at: Utc::now(),
        })
    }

    async fn fetch_competitor_profile(
        &self,
        account_id: &str,
    ) -> Result<CompetitorProfile, CollectorError> {
        let network: NetworkSize = self
            .get(
                &format!("networkSizes/{account_id}"),
                &[("edgeType", "CompanyFollowedByMember".to_string())],
            )
            .await?;

        let mut scored = Vec::new();
        for share in self.shares_of(account_id, COMPETITOR_WINDOW).await? {
            scored.push(self.measured(share).await?.scored());
        }

        Ok(insights::competitor_profile(
            Platform::LinkedIn,
            account_id,
            None,
            Some(network.first_degree_size),
            &scored,
        ))
    }

    async fn fetch_audience_insights(
        &self,
        content_ids: &[String],
    ) -> Result<AudienceInsights, CollectorError> {
        self.token()?;
        let owner = self.owner()?;

        let mut scored = Vec::with_capacity(content_ids.len());
        for id in content_ids {
            let share = match self.share(id).await {
                Ok(share) => share,
                Err(CollectorError::NotFound { .. }) => {
                    tracing::warn!(content_id = %id, "linkedin share not found, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            scored.push(self.measured(share).await?.scored());
        }

        let stats: FollowerStatisticsList = self
            .get(
                "organizationalEntityFollowerStatistics",
                &[
                    ("q", "organizationalEntity".to_string()),
                    ("organizationalEntity", owner.to_string()),
                ],
            )
            .await?;

        let mut buckets = BucketGroups::new();
        for element in stats.elements {
            for (group, entries) in [
                ("seniority", element.follower_counts_by_seniority),
                ("industry", element.follower_counts_by_industry),
                ("function", element.follower_counts_by_function),
            ] {
                for entry in entries {
                    let label = entry.facet.unwrap_or_else(|| "unknown".to_string());
                    #[allow(clippy::cast_precision_loss)]
                    let total = entry.follower_counts.total() as f64;
                    insights::add_to_bucket(&mut buckets, group, &label, total);
                }
            }
        }

        Ok(insights::audience_insights(Platform::LinkedIn, &scored, buckets))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ShareList {
    #[serde(default)]
    elements: Vec<Share>,
}

#[derive(Debug, Deserialize)]
struct Share {
    id: String,
    #[serde(default)]
    text: ShareText,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    created: Option<AuditStamp>,
}

#[derive(Debug, Default, Deserialize)]
struct ShareText {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AuditStamp {
    /// Milliseconds since the Unix epoch.
    time: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocialActions {
    #[serde(default)]
    likes_summary: LikesSummary,
    #[serde(default)]
    comments_summary: CommentsSummary,
    #[serde(default)]
    shares_summary: SharesSummary,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LikesSummary {
    #[serde(default, deserialize_with = "lenient_u64")]
    total_likes: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentsSummary {
    #[serde(default, deserialize_with = "lenient_u64")]
    total_first_level_comments: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    total_comments: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharesSummary {
    #[serde(default, deserialize_with = "lenient_u64")]
    total_shares: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShareStatistics {
    #[serde(default, deserialize_with = "lenient_u64")]
    impression_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkSize {
    #[serde(default, deserialize_with = "lenient_u64")]
    first_degree_size: u64,
}

#[derive(Debug, Deserialize)]
struct FollowerStatisticsList {
    #[serde(default)]
    elements: Vec<FollowerStatistics>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowerStatistics {
    #[serde(default)]
    follower_counts_by_seniority: Vec<FacetCount>,
    #[serde(default)]
    follower_counts_by_industry: Vec<FacetCount>,
    #[serde(default)]
    follower_counts_by_function: Vec<FacetCount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FacetCount {
    /// The URN of the seniority/industry/function, whichever the group is.
    #[serde(default, alias = "seniority", alias = "industry", alias = "function")]
    facet: Option<String>,
    #[serde(default)]
    follower_counts: FollowerCounts,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowerCounts {
    #[serde(default, deserialize_with = "lenient_u64")]
    organic_follower_count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    paid_follower_count: u64,
}

impl FollowerCounts {
    fn total(&self) -> u64 {
        self.organic_follower_count
            .saturating_add(self.paid_follower_count)
    }
}

impl SocialActions {
    fn comments(&self) -> u64 {
        self.comments_summary
            .total_comments
            .max(self.comments_summary.total_first_level_comments)
    }
}

impl Share {
    fn title(&self) -> String {
        if self.text.text.trim().is_empty() {
            self.id.clone()
        } else {
            self.text.text.chars().take(TITLE_MAX_CHARS).collect()
        }
    }

    fn published_at(&self) -> Option<DateTime<Utc>> {
        self.created
            .as_ref()
            .and_then(|stamp| from_unix(stamp.time / 1_000))
    }
}

struct MeasuredShare {
    share: Share,
    actions: SocialActions,
    impressions: u64,
}

impl MeasuredShare {
    fn metrics(&self) -> BTreeMap<String, u64> {
        BTreeMap::from([
            ("likes".to_string(), self.actions.likes_summary.total_likes),
            ("comments".to_string(), self.actions.comments()),
            ("shares".to_string(), self.actions.shares_summary.total_shares),
            ("impressions".to_string(), self.impressions),
        ])
    }

    fn engagement_rate(&self) -> f64 {
        let interactions = sum_interactions(&[
            self.actions.likes_summary.total_likes,
            self.actions.comments(),
            self.actions.shares_summary.total_shares,
        ]);
        view_rate(interactions, self.impressions)
    }

    fn to_trend_item(&self, detected_at: DateTime<Utc>) -> TrendItem {
        let text = &self.share.text.text;
        let rate = self.engagement_rate();
        let mut item = TrendItem::new(
            Platform::LinkedIn,
            &self.share.id,
            self.share.title(),
            detected_at,
        );
        item.category = CATEGORY.to_string();
        item.volume = self.actions.likes_summary.total_likes;
        item.metrics = self.metrics();
        item.engagement_rate = rate;
        item.performance_level = performance_level(Platform::LinkedIn, rate);
        item.sentiment_score = sentiment::signed_score(sentiment::polarity(text));
        item.hashtags = extract_hashtags(text);
        item.related_keywords = extract_keywords(text);
        item
    }

    fn to_detail(&self) -> ContentDetail {
        let text = &self.share.text.text;
        let rate = self.engagement_rate();
        let level = performance_level(Platform::LinkedIn, rate);
        let hashtags = extract_hashtags(text);
        let published_at = self.share.published_at();
        ContentDetail {
            platform: Platform::LinkedIn,
            id: self.share.id.clone(),
            title: self.share.title(),
            text: text.clone(),
            author: self.share.owner.clone(),
            published_at,
            category: CATEGORY.to_string(),
            metrics: self.metrics(),
            volume: self.actions.likes_summary.total_likes,
            engagement_rate: rate,
            performance_level: level,
            recommendations: insights::content_recommendations(
                text,
                level,
                hashtags.len(),
                published_at.map(|ts| ts.hour()),
                Platform::LinkedIn,
            ),
            hashtags,
            keywords: extract_keywords(text),
            sentiment: sentiment::polarity(text),
        }
    }

    fn scored(&self) -> ScoredContent {
        ScoredContent {
            id: self.share.id.clone(),
            title: self.share.title(),
            text: String::new(),
            published_at: self.share.published_at(),
            volume: self.impressions,
            engagement_rate: self.engagement_rate(),
        }
    }
}
