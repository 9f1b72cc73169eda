//! Platform collectors for trendscope.
//!
//! Each social platform is reached through a [`PlatformAdapter`] that owns its
//! credentials, HTTP transport and response cache. The [`CollectorManager`]
//! fans out across adapters concurrently, isolates failures, and hands the
//! cycle to a [`TrendSink`] as one transactional batch.

pub mod adapter;
pub mod analysis;
pub mod cache;
pub mod engagement;
pub mod error;
pub mod insights;
pub mod jobs;
pub mod keywords;
pub mod manager;
pub mod segmentation;
pub mod sentiment;
pub mod sink;
pub mod types;

mod adapters;
mod http;
mod rate_limit;

pub use adapter::PlatformAdapter;
pub use adapters::{
    InstagramAdapter, LinkedInAdapter, TikTokAdapter, TwitterAdapter, YouTubeAdapter,
};
pub use analysis::{analyze_trends, AnalysisReport, Outlook};
pub use segmentation::{segment_trends, Segment};
pub use cache::{Clock, ManualClock, MemoryCache, NoCache, ResponseCache, SystemClock};
pub use error::CollectorError;
pub use http::HttpOptions;
pub use jobs::{
    run_metrics_refresh, run_retention, run_trend_analysis, run_trend_collection, JobError,
    MetricsRefreshReport,
};
pub use manager::{
    build_adapter, AdapterFailure, CollectionOutcome, CollectorManager, PersistReport,
};
pub use sink::{MemorySink, PersistenceError, PgTrendSink, TrendBatch, TrendSink};
pub use types::{
    AudienceInsights, CompetitorProfile, ContentDetail, ContentSuggestion, EngagementMetrics,
    SuggestionKind,
};
