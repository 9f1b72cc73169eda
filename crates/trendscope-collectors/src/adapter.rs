use async_trait::async_trait;
use trendscope_core::{Platform, TrendItem};

use crate::error::CollectorError;
use crate::insights;
use crate::types::{
    AudienceInsights, CompetitorProfile, ContentDetail, ContentSuggestion, EngagementMetrics,
};

/// Items fetched to seed content suggestions.
pub const SUGGESTION_SAMPLE_SIZE: u32 = 50;

/// Uniform capability set every platform integration provides.
///
/// Implementations own their credentials, response cache and HTTP client.
/// An adapter whose credential is absent reports `is_configured() == false`
/// and answers every call with [`CollectorError::Configuration`].
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    fn is_configured(&self) -> bool;

    /// Called by the manager before each collection cycle. Adapters drop
    /// cached responses here so every cycle reads fresh data.
    fn begin_cycle(&self) {}

    /// Currently trending or popular items, scored with the platform formula.
    async fn fetch_trending(&self, max_results: u32) -> Result<Vec<TrendItem>, CollectorError>;

    async fn fetch_content_detail(&self, content_id: &str)
        -> Result<ContentDetail, CollectorError>;

    async fn fetch_engagement_metrics(
        &self,
        content_id: &str,
    ) -> Result<EngagementMetrics, CollectorError>;

    async fn fetch_competitor_profile(
        &self,
        account_id: &str,
    ) -> Result<CompetitorProfile, CollectorError>;

    async fn fetch_audience_insights(
        &self,
        content_ids: &[String],
    ) -> Result<AudienceInsights, CollectorError>;

    /// Up to five suggestions derived from trending items in `category`.
    async fn suggest_content(
        &self,
        category: &str,
    ) -> Result<Vec<ContentSuggestion>, CollectorError> {
        let items = self.fetch_trending(SUGGESTION_SAMPLE_SIZE).await?;
        Ok(insights::suggestions_from_trends(
            self.platform(),
            &items,
            category,
        ))
    }
}

/// Error returned by every operation of an adapter without credentials.
pub(crate) fn not_configured(platform: Platform, what: &str) -> CollectorError {
    CollectorError::Configuration {
        platform,
        reason: format!("missing {what}"),
    }
}
