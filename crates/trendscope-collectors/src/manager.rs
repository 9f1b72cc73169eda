//! Concurrent fan-out across platform adapters.
//!
//! Every configured adapter is polled at once. A failing or slow adapter is
//! logged and left out of the cycle; it never blocks or fails the others.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use trendscope_core::{AppConfig, CollectorsSettings, Platform, PlatformSettings, TrendItem};
use trendscope_db::NewTrend;

use crate::adapter::PlatformAdapter;
use crate::adapters::{
    InstagramAdapter, LinkedInAdapter, TikTokAdapter, TwitterAdapter, YouTubeAdapter,
};
use crate::cache::{MemoryCache, ResponseCache};
use crate::error::CollectorError;
use crate::http::HttpOptions;
use crate::sink::{PersistenceError, TrendSink};

pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(120);

/// An adapter that failed during a cycle, and why.
#[derive(Debug)]
pub struct AdapterFailure {
    pub platform: Platform,
    pub error: CollectorError,
}

#[derive(Debug, Default)]
pub struct CollectionOutcome {
    pub items: Vec<TrendItem>,
    pub succeeded: Vec<Platform>,
    pub failures: Vec<AdapterFailure>,
    /// Adapters left out because they have no credentials.
    pub skipped: Vec<Platform>,
}

impl CollectionOutcome {
    /// True when at least one adapter ran and every one that ran failed.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.succeeded.is_empty() && !self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReport {
    pub collected: usize,
    /// Items that could not be mapped to a storage record.
    pub dropped: usize,
    pub persisted: u64,
    pub succeeded_platforms: Vec<Platform>,
    pub failed_platforms: Vec<Platform>,
    pub skipped_platforms: Vec<Platform>,
}

/// Build the adapter for one platform from application config and settings.
///
/// Each adapter gets its own in-memory response cache. A missing credential
/// yields an unconfigured adapter, not an error.
///
/// # Errors
///
/// Returns [`CollectorError::Configuration`] for an invalid base URL or a
/// failed TikTok credential exchange.
pub async fn build_adapter(
    platform: Platform,
    config: &AppConfig,
    settings: &PlatformSettings,
) -> Result<Arc<dyn PlatformAdapter>, CollectorError> {
    let options = HttpOptions::from_app_config(config);
    let cache: Arc<dyn ResponseCache> =
        Arc::new(MemoryCache::new(Duration::from_secs(config.cache_ttl_secs)));
    let creds = &config.credentials;

    let adapter: Arc<dyn PlatformAdapter> = match platform {
        Platform::YouTube => Arc::new(YouTubeAdapter::new(
            creds.youtube_api_key.as_ref(),
            settings,
            &options,
            cache,
        )?),
        Platform::TikTok => Arc::new(
            TikTokAdapter::connect(
                creds.tiktok_client_key.as_ref(),
                creds.tiktok_client_secret.as_ref(),
                settings,
                &options,
                cache,
            )
            .await?,
        ),
        Platform::Instagram => Arc::new(InstagramAdapter::new(
            creds.instagram_access_token.as_ref(),
            settings,
            &options,
            cache,
        )?),
        Platform::Twitter => Arc::new(TwitterAdapter::new(
            creds.twitter_bearer_token.as_ref(),
            settings,
            &options,
            cache,
        )?),
        Platform::LinkedIn => Arc::new(LinkedInAdapter::new(
            creds.linkedin_access_token.as_ref(),
            settings,
            &options,
            cache,
        )?),
    };
    Ok(adapter)
}

pub struct CollectorManager {
    adapters: Vec<Arc<dyn PlatformAdapter>>,
    max_results: BTreeMap<Platform, u32>,
    adapter_timeout: Duration,
}

impl CollectorManager {
    /// Build every enabled adapter.
    ///
    /// An adapter whose construction fails (for example a rejected TikTok
    /// credential exchange) is logged and left out; the rest still run.
    pub async fn connect(config: &AppConfig, settings: &CollectorsSettings) -> Self {
        let mut adapters = Vec::new();
        let mut max_results = BTreeMap::new();

        for platform in Platform::ALL {
            let platform_settings = settings.for_platform(platform);
            if !platform_settings.enabled {
                tracing::info!(%platform, "collector disabled in settings");
                continue;
            }
            match build_adapter(platform, config, &platform_settings).await {
                Ok(adapter) => {
                    max_results.insert(platform, platform_settings.max_results);
                    adapters.push(adapter);
                }
                Err(e) => {
                    tracing::error!(%platform, error = %e, "collector could not be initialised");
                }
            }
        }

        Self {
            adapters,
            max_results,
            adapter_timeout: Duration::from_secs(config.adapter_timeout_secs),
        }
    }

    /// Manager over an explicit adapter set, using default result limits.
    #[must_use]
    pub fn with_adapters(
        adapters: Vec<Arc<dyn PlatformAdapter>>,
        adapter_timeout: Duration,
    ) -> Self {
        Self {
            adapters,
            max_results: BTreeMap::new(),
            adapter_timeout,
        }
    }

    #[must_use]
    pub fn with_max_results(mut self, platform: Platform, max_results: u32) -> Self {
        self.max_results.insert(platform, max_results);
        self
    }

    /// Keep only the adapter for `platform`.
    #[must_use]
    pub fn only(mut self, platform: Platform) -> Self {
        self.adapters.retain(|a| a.platform() == platform);
        self
    }

    #[must_use]
    pub fn adapters(&self) -> &[Arc<dyn PlatformAdapter>] {
        &self.adapters
    }

    #[must_use]
    pub fn adapter(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.platform() == platform)
            .cloned()
    }

    /// Discard responses every adapter cached during an earlier cycle.
    pub fn begin_cycle(&self) {
        for adapter in &self.adapters {
            adapter.begin_cycle();
        }
    }

    fn max_results_for(&self, platform: Platform) -> u32 {
        self.max_results
            .get(&platform)
            .copied()
            .unwrap_or_else(|| PlatformSettings::default().max_results)
    }

    /// Fresh trending items from every configured adapter.
    ///
    /// Failed adapters are logged and contribute nothing. Items are grouped
    /// by adapter with no ordering guarantee across platforms.
    pub async fn collect_all_trends(&self) -> Vec<TrendItem> {
        self.collect_with_report().await.items
    }

    /// Like [`collect_all_trends`](Self::collect_all_trends), also reporting
    /// which adapters succeeded, failed or were skipped.
    ///
    /// Responses cached by an earlier cycle are discarded first.
    pub async fn collect_with_report(&self) -> CollectionOutcome {
        self.begin_cycle();
        let mut outcome = CollectionOutcome::default();
        let mut active = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            if adapter.is_configured() {
                active.push(Arc::clone(adapter));
            } else {
                tracing::debug!(
                    platform = %adapter.platform(),
                    "collector not configured, skipping"
                );
                outcome.skipped.push(adapter.platform());
            }
        }

        let width = active.len().max(1);
        let timeout = self.adapter_timeout;
        let results: Vec<(Platform, Result<Vec<TrendItem>, CollectorError>)> =
            stream::iter(active)
                .map(|adapter| {
                    let platform = adapter.platform();
                    let max_results = self.max_results_for(platform);
                    async move {
                        let result =
                            match tokio::time::timeout(timeout, adapter.fetch_trending(max_results))
                                .await
                            {
                                Ok(result) => result,
                                Err(_) => Err(CollectorError::Timeout {
                                    platform,
                                    secs: timeout.as_secs(),
                                }),
                            };
                        (platform, result)
                    }
                })
                .buffer_unordered(width)
                .collect::<Vec<_>>()
                .boxed()
                .await;

        for (platform, result) in results {
            match result {
                Ok(items) => {
                    tracing::info!(%platform, count = items.len(), "collected trends");
                    outcome.items.extend(items);
                    outcome.succeeded.push(platform);
                }
                Err(error) => {
                    tracing::error!(
                        %platform,
                        kind = error.kind(),
                        error = %error,
                        "collector failed, excluded from this cycle"
                    );
                    outcome.failures.push(AdapterFailure { platform, error });
                }
            }
        }

        outcome.succeeded.sort();
        outcome.failures.sort_by_key(|f| f.platform);
        outcome
    }

    /// Collect, map and write one cycle's trends in a single unit of work.
    ///
    /// Items that cannot be mapped to a storage record are logged and
    /// dropped. Any sink failure rolls the whole batch back.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the sink cannot begin, stage or
    /// commit the batch. Adapter failures are never returned here.
    pub async fn update_persistent_store(
        &self,
        sink: &dyn TrendSink,
    ) -> Result<PersistReport, PersistenceError> {
        let outcome = self.collect_with_report().await;
        let (records, dropped) = map_for_storage(&outcome.items);

        let mut report = PersistReport {
            collected: outcome.items.len(),
            dropped,
            persisted: 0,
            succeeded_platforms: outcome.succeeded.clone(),
            failed_platforms: outcome.failures.iter().map(|f| f.platform).collect(),
            skipped_platforms: outcome.skipped.clone(),
        };

        let mut batch = sink.begin().await?;
        let staged = match batch.add_many(&records).await {
            Ok(staged) => staged,
            Err(e) => {
                tracing::error!(error = %e, "staging trends failed, rolling back");
                if let Err(rollback_err) = batch.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                return Err(e);
            }
        };
        if let Err(e) = batch.commit().await {
            tracing::error!(error = %e, staged, "commit failed, batch discarded");
            return Err(e);
        }

        report.persisted = staged;
        tracing::info!(
            collected = report.collected,
            dropped = report.dropped,
            persisted = report.persisted,
            failed = report.failed_platforms.len(),
            "trend cycle persisted"
        );
        Ok(report)
    }
}

/// Convert items to storage records, dropping (and logging) invalid ones.
fn map_for_storage(items: &[TrendItem]) -> (Vec<NewTrend>, usize) {
    let mut records = Vec::with_capacity(items.len());
    let mut dropped = 0;
    for item in items {
        match NewTrend::try_from(item) {
            Ok(record) => records.push(record),
            Err(e) => {
                let error = CollectorError::Mapping {
                    platform: item.platform,
                    external_id: item.external_id.clone(),
                    reason: e.to_string(),
                };
                tracing::warn!(error = %error, "dropping trend item");
                dropped += 1;
            }
        }
    }
    (records, dropped)
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
