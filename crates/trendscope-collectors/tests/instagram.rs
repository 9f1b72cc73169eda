//! Integration tests for `InstagramAdapter` using wiremock HTTP mocks.

use std::sync::Arc;

use trendscope_collectors::{CollectorError, HttpOptions, InstagramAdapter, NoCache, PlatformAdapter};
use trendscope_core::{PerformanceLevel, Platform, PlatformSettings};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter(base_url: &str) -> InstagramAdapter {
    let settings = PlatformSettings {
        base_url: Some(base_url.to_string()),
        ..PlatformSettings::default()
    };
    let options = HttpOptions {
        timeout_secs: 5,
        max_retries: 0,
        backoff_base_ms: 0,
        ..HttpOptions::default()
    };
    InstagramAdapter::new(
        Some(&"ig-token".to_string()),
        &settings,
        &options,
        Arc::new(NoCache),
    )
    .expect("adapter construction should not fail")
}

async fn mount_account(server: &MockServer, followers: u64) {
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer ig-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "1789",
            "username": "brand",
            "followers_count": followers
        })))
        .mount(server)
        .await;
}

fn media(id: &str, caption: &str, likes: u64, comments: u64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "caption": caption,
        "media_type": "CAROUSEL_ALBUM",
        "timestamp": "2024-05-01T18:30:00+0000",
        "like_count": likes,
        "comments_count": comments
    })
}

#[tokio::test]
async fn trending_scores_media_against_follower_count() {
    let server = MockServer::start().await;
    mount_account(&server, 1_000).await;
    Mock::given(method("GET"))
        .and(path("/me/media"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [media("m1", "Perfect sunset #travel", 60, 10)]
        })))
        .mount(&server)
        .await;

    let items = adapter(&server.uri()).fetch_trending(3).await.unwrap();
    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.platform, Platform::Instagram);
    assert_eq!(item.category, "carousel_album");
    assert_eq!(item.volume, 70);
    assert!((item.engagement_rate - 7.0).abs() < 1e-9);
    assert_eq!(item.performance_level, PerformanceLevel::Excellent);
    assert_eq!(item.hashtags, vec!["#travel".to_string()]);
}

#[tokio::test]
async fn zero_followers_gives_zero_rate() {
    let server = MockServer::start().await;
    mount_account(&server, 0).await;
    Mock::given(method("GET"))
        .and(path("/me/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [media("m1", "hello", 50, 10)]
        })))
        .mount(&server)
        .await;

    let items = adapter(&server.uri()).fetch_trending(3).await.unwrap();
    assert!(items[0].engagement_rate.abs() < f64::EPSILON);
    assert_eq!(items[0].performance_level, PerformanceLevel::Poor);
}

#[tokio::test]
async fn engagement_metrics_include_saves_from_insights() {
    let server = MockServer::start().await;
    mount_account(&server, 1_000).await;
    Mock::given(method("GET"))
        .and(path("/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(media("m1", "x", 20, 5)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/m1/insights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                { "name": "saved", "values": [{ "value": 10 }] },
                { "name": "reach", "values": [{ "value": 800 }] }
            ]
        })))
        .mount(&server)
        .await;

    let metrics = adapter(&server.uri())
        .fetch_engagement_metrics("m1")
        .await
        .unwrap();
    assert_eq!(metrics.metrics["saved"], 10);
    assert_eq!(metrics.metrics["reach"], 800);
    assert!((metrics.engagement_rate - 3.5).abs() < 1e-9);
    assert_eq!(metrics.performance_level, PerformanceLevel::Good);
}

#[tokio::test]
async fn unknown_media_is_not_found() {
    let server = MockServer::start().await;
    mount_account(&server, 10).await;
    Mock::given(method("GET"))
        .and(path("/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = adapter(&server.uri())
        .fetch_content_detail("nope")
        .await
        .unwrap_err();
    assert!(matches!(err, CollectorError::NotFound { .. }));
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn audience_insights_rename_and_normalize_groups() {
    let server = MockServer::start().await;
    mount_account(&server, 100).await;
    Mock::given(method("GET"))
        .and(path("/me/insights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                { "name": "audience_country", "values": [{ "value": { "FR": 30.0, "BE": 10.0 } }] },
                { "name": "audience_gender_age", "values": [{ "value": { "F.18-24": 5.0 } }] }
            ]
        })))
        .mount(&server)
        .await;

    let insights = adapter(&server.uri())
        .fetch_audience_insights(&[])
        .await
        .unwrap();
    assert!((insights.buckets["countries"]["FR"] - 75.0).abs() < 1e-9);
    assert!((insights.buckets["gender_age"]["F.18-24"] - 100.0).abs() < 1e-9);
    assert_eq!(insights.items_analyzed, 0);
}

#[tokio::test]
async fn competitor_profile_uses_business_discovery() {
    let server = MockServer::start().await;
    mount_account(&server, 100).await;
    Mock::given(method("GET"))
        .and(path("/1789"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "business_discovery": {
                "username": "rival",
                "followers_count": 2_000,
                "media": { "data": [media("r1", "Top 5 spots", 180, 20)] }
            },
            "id": "1789"
        })))
        .mount(&server)
        .await;

    let profile = adapter(&server.uri())
        .fetch_competitor_profile("rival")
        .await
        .unwrap();
    assert_eq!(profile.display_name.as_deref(), Some("rival"));
    assert_eq!(profile.followers, Some(2_000));
    assert!((profile.average_engagement_rate - 10.0).abs() < 1e-9);
}
