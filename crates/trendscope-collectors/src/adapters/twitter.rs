//! Twitter/X API v2.
//!
//! App-only bearer token. Engagement is follower-denominated:
//! `(likes + retweets + replies + quotes) / author followers × 100`.
//! Trending items are hashtag-bearing recent posts keyed by their first
//! hashtag, with retweets as volume.

use std::collections::{BTreeMap, HashMap};
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

const DEFAULT_BASE_URL: &str = "https://api.twitter.com/2";
const TREND_QUERY: &str = "has:hashtags -is:retweet";
const TWEET_FIELDS: &str = "public_metrics,created_at,entities,lang,author_id";
const USER_FIELDS: &str = "public_metrics,name,username";
const COMPETITOR_WINDOW: u32 = 50;
/// Bounds accepted by the recent-search endpoint.
const SEARCH_MIN: u32 = 10;
const SEARCH_MAX: u32 = 100;
const CATEGORY: &str = "hashtag";

pub struct TwitterAdapter {
    http: PlatformHttp,
    bearer_token: Option<String>,
}

impl TwitterAdapter {
    /// # Errors
    ///
    /// Returns [`CollectorError::Configuration`] if the base URL is invalid
    /// or [`CollectorError::Http`] if the HTTP client cannot be built.
    pub fn new(
        bearer_token: Option<&String>,
        settings: &PlatformSettings,
        options: &HttpOptions,
        cache: Arc<dyn ResponseCache>,
    ) -> Result<Self, CollectorError> {
        let base_url = settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(Self {
            http: PlatformHttp::new(Platform::Twitter, base_url, options, cache)?,
            bearer_token: credential(bearer_token),
        })
    }

    fn token(&self) -> Result<&str, CollectorError> {
        self.bearer_token
            .as_deref()
            .ok_or_else(|| not_configured(Platform::Twitter, "TWITTER_BEARER_TOKEN"))
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, CollectorError> {
        let token = self.token()?;
        let body = self.http.get_json(path, params, Auth::Bearer(token)).await?;
        decode(Platform::Twitter, path, body)
    }

    /// A single post with its author's follower count.
    async fn tweet(&self, content_id: &str) -> Result<(Tweet, u64), CollectorError> {
        let page: SingleTweet = self
            .get(
                &format!("tweets/{content_id}"),
                &[
                    ("tweet.fields", TWEET_FIELDS.to_string()),
                    ("expansions", "author_id".to_string()),
                    ("user.fields", USER_FIELDS.to_string()),
                ],
            )
            .await?;
        // v2 answers unknown ids with 200 and an `errors` array.
        let Some(tweet) = page.data else {
            return Err(CollectorError::NotFound {
                platform: Platform::Twitter,
                resource: format!("tweet {content_id}"),
            });
        };
        let followers = page
            .includes
            .users
            .iter()
            .find(|u| Some(&u.id) == tweet.author_id.as_ref())
            .map_or(0, |u| u.public_metrics.followers_count);
        Ok((tweet, followers))
    }
}

#[async_trait]
impl PlatformAdapter for TwitterAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn begin_cycle(&self) {
        self.http.clear_cache();
    }

    fn is_configured(&self) -> bool {
        self.bearer_token.is_some()
    }

    async fn fetch_trending(&self, max_results: u32) -> Result<Vec<TrendItem>, CollectorError> {
        let page: TweetList = self
            .get(
                "tweets/search/recent",
                &[
                    ("query", TREND_QUERY.to_string()),
                    (
                        "max_results",
                        max_results.clamp(SEARCH_MIN, SEARCH_MAX).to_string(),
                    ),
                    ("tweet.fields", TWEET_FIELDS.to_string()),
                    ("expansions", "author_id".to_string()),
                    ("user.fields", USER_FIELDS.to_string()),
                ],
            )
            .await?;

        let followers: HashMap<&str, u64> = page
            .includes
            .users
            .iter()
            .map(|u| (u.id.as_str(), u.public_metrics.followers_count))
            .collect();

        let now = Utc::now();
        let limit = usize::try_from(max_results).unwrap_or(usize::MAX);
        Ok(page
            .data
            .iter()
            .filter_map(|tweet| {
                let author_followers = tweet
                    .author_id
                    .as_deref()
                    .and_then(|id| followers.get(id).copied())
                    .unwrap_or(0);
                tweet.to_trend_item(author_followers, now)
            })
            .take(limit)
            .collect())
    }

    async fn fetch_content_detail(
        &self,
        content_id: &str,
    ) -> Result<ContentDetail, CollectorError> {
        let (tweet, followers) = self.tweet(content_id).await?;
        Ok(tweet.to_detail(followers))
    }

    async fn fetch_engagement_metrics(
        &self,
        content_id: &str,
    ) -> Result<EngagementMetrics, CollectorError> {
        let (tweet, followers) = self.tweet(content_id).await?;
        let rate = tweet.engagement_rate(followers);
        Ok(EngagementMetrics {
            platform: Platform::Twitter,
            content_id: tweet.id.clone(),
            metrics: tweet.metrics(),
            engagement_rate: rate,
            performance_level: performance_level(Platform::Twitter, rate),
            growth_rate: 0.0,
            measured_at: Utc::now(),
        })
    }

    async fn fetch_competitor_profile(
        &self,
        account_id: &str,
    ) -> Result<CompetitorProfile, CollectorError> {
        let username = account_id.trim_start_matches('@');
        let lookup: UserLookup = self
            .get(
                &format!("users/by/username/{username}"),
                &[("user.fields", USER_FIELDS.to_string())],
            )
            .await?;
        let Some(user) = lookup.data else {
            return Err(CollectorError::NotFound {
                platform: Platform::Twitter,
                resource: format!("user {username}"),
            });
        };

        let page: TweetList = self
            .get(
                &format!("users/{}/tweets", user.id),
                &[
                    ("max_results", COMPETITOR_WINDOW.to_string()),
                    ("tweet.fields", TWEET_FIELDS.to_string()),
                ],
            )
            .await?;

        let followers = user.public_metrics.followers_count;
        let scored: Vec<ScoredContent> = page.data.iter().map(|t| t.scored(followers)).collect();
        Ok(insights::competitor_profile(
            Platform::Twitter,
            account_id,
            user.name,
            Some(followers),
            &scored,
        ))
    }

    async fn fetch_audience_insights(
        &self,
        content_ids: &[String],
    ) -> Result<AudienceInsights, CollectorError> {
        self.token()?;
        let mut buckets = BucketGroups::new();
        let mut scored = Vec::with_capacity(content_ids.len());

        for id in content_ids {
            let (tweet, followers) = match self.tweet(id).await {
                Ok(found) => found,
                Err(CollectorError::NotFound { .. }) => {
                    tracing::warn!(content_id = %id, "tweet not found, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            for tag in tweet.hashtags() {
                insights::add_to_bucket(&mut buckets, "interests", &tag.to_lowercase(), 1.0);
            }
            if let Some(lang) = &tweet.lang {
                insights::add_to_bucket(&mut buckets, "languages", lang, 1.0);
            }
            scored.push(tweet.scored(followers));
        }

        Ok(insights::audience_insights(Platform::Twitter, &scored, buckets))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TweetList {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Deserialize)]
struct SingleTweet {
    #[serde(default)]
    data: Option<Tweet>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct UserLookup {
    #[serde(default)]
    data: Option<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    public_metrics: UserMetrics,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetrics {
    #[serde(default, deserialize_with = "lenient_u64")]
    followers_count: u64,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    entities: Entities,
    #[serde(default)]
    public_metrics: TweetMetrics,
}

#[derive(Debug, Default, Deserialize)]
struct Entities {
    #[serde(default)]
    hashtags: Vec<HashtagEntity>,
}

#[derive(Debug, Deserialize)]
struct HashtagEntity {
    tag: String,
}

#[derive(Debug, Default, Deserialize)]
struct TweetMetrics {
    #[serde(default, deserialize_with = "lenient_u64")]
    retweet_count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    reply_count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    like_count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    quote_count: u64,
}

impl Tweet {
    /// Hashtags from entities when present, otherwise parsed from the text.
    fn hashtags(&self) -> Vec<String> {
        if self.entities.hashtags.is_empty() {
            extract_hashtags(&self.text)
        } else {
            self.entities
                .hashtags
                .iter()
                .map(|h| format!("#{}", h.tag))
                .collect()
        }
    }

    fn published_at(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    fn metrics(&self) -> BTreeMap<String, u64> {
        let m = &self.public_metrics;
        BTreeMap::from([
            ("retweets".to_string(), m.retweet_count),
            ("replies".to_string(), m.reply_count),
            ("likes".to_string(), m.like_count),
            ("quotes".to_string(), m.quote_count),
        ])
    }

    fn engagement_rate(&self, followers: u64) -> f64 {
        let m = &self.public_metrics;
        let interactions =
            sum_interactions(&[m.like_count, m.retweet_count, m.reply_count, m.quote_count]);
        follower_rate(interactions, followers)
    }

    /// `None` for posts without a hashtag; those are not trends.
    fn to_trend_item(&self, followers: u64, detected_at: DateTime<Utc>) -> Option<TrendItem> {
        let hashtags = self.hashtags();
        let keyword = hashtags.first()?.clone();
        let rate = self.engagement_rate(followers);

        let mut item = TrendItem::new(Platform::Twitter, &self.id, keyword, detected_at);
        item.category = CATEGORY.to_string();
        item.volume = self.public_metrics.retweet_count;
        item.metrics = self.metrics();
        item.engagement_rate = rate;
        item.performance_level = performance_level(Platform::Twitter, rate);
        item.sentiment_score = sentiment::signed_score(sentiment::polarity(&self.text));
        item.hashtags = hashtags;
        item.related_keywords = extract_keywords(&self.text);
        Some(item)
    }

    fn to_detail(&self, followers: u64) -> ContentDetail {
        let rate = self.engagement_rate(followers);
        let level = performance_level(Platform::Twitter, rate);
        let hashtags = self.hashtags();
        let published_at = self.published_at();
        ContentDetail {
            platform: Platform::Twitter,
            id: self.id.clone(),
            title: self.text.clone(),
            text: self.text.clone(),
            author: self.author_id.clone(),
            published_at,
            category: "post".to_string(),
            metrics: self.metrics(),
            volume: self.public_metrics.retweet_count,
            engagement_rate: rate,
            performance_level: level,
            recommendations: insights::content_recommendations(
                &self.text,
                level,
                hashtags.len(),
                published_at.map(|ts| ts.hour()),
                Platform::Twitter,
            ),
            hashtags,
            keywords: extract_keywords(&self.text),
            sentiment: sentiment::polarity(&self.text),
        }
    }

    fn scored(&self, followers: u64) -> ScoredContent {
        ScoredContent {
            id: self.id.clone(),
            title: self.text.clone(),
            text: String::new(),
            published_at: self.published_at(),
            volume: self.public_metrics.retweet_count,
            engagement_rate: self.engagement_rate(followers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tweet(text: &str, entities: serde_json::Value) -> Tweet {
        serde_json::from_value(serde_json::json!({
            "id": "1",
            "text": text,
            "entities": entities,
            "public_metrics": {
                "retweet_count": 20, "reply_count": 5, "like_count": 70, "quote_count": 5
            }
        }))
        .unwrap()
    }

    #[test]
    fn rate_sums_four_counters_over_followers() {
        let t = tweet("hello #rust", serde_json::json!({}));
        assert!((t.engagement_rate(2_000) - 5.0).abs() < 1e-9);
        assert_eq!(t.engagement_rate(0).to_bits(), 0.0_f64.to_bits());
    }

    #[test]
    fn trend_keyword_is_first_hashtag_and_volume_is_retweets() {
        let t = tweet(
            "ignored",
            serde_json::json!({ "hashtags": [{ "tag": "RustLang" }, { "tag": "async" }] }),
        );
        let item = t.to_trend_item(1_000, Utc::now()).unwrap();
        assert_eq!(item.keyword_or_title, "#RustLang");
        assert_eq!(item.volume, 20);
        assert_eq!(item.hashtags.len(), 2);
    }

    #[test]
    fn posts_without_hashtags_are_not_trends() {
        let t = tweet("plain text", serde_json::json!({}));
        assert!(t.to_trend_item(1_000, Utc::now()).is_none());
    }
}
