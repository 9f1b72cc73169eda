//! Integration tests for `TikTokAdapter` using wiremock HTTP mocks.

use std::sync::Arc;

use trendscope_collectors::{
    CollectorError, HttpOptions, NoCache, PlatformAdapter, TikTokAdapter,
};
use trendscope_core::{PerformanceLevel, Platform, PlatformSettings};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(base_url: &str) -> PlatformSettings {
    PlatformSettings {
        base_url: Some(base_url.to_string()),
        ..PlatformSettings::default()
    }
}

fn options() -> HttpOptions {
    HttpOptions {
        timeout_secs: 5,
        max_retries: 0,
        backoff_base_ms: 0,
        ..HttpOptions::default()
    }
}

async fn mount_token(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth/token/"))
        .and(body_string_contains("client_key=ck"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": token,
            "expires_in": 7200,
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}

async fn connect(server: &MockServer) -> Result<TikTokAdapter, CollectorError> {
    TikTokAdapter::connect(
        Some(&"ck".to_string()),
        Some(&"cs".to_string()),
        &settings(&server.uri()),
        &options(),
        Arc::new(NoCache),
    )
    .await
}

fn video(
    id: &str,
    desc: &str,
    plays: u64,
    likes: u64,
    comments: u64,
    shares: u64,
) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "desc": desc,
        "create_time": 1_714_557_600,
        "statistics": {
            "play_count": plays,
            "digg_count": likes,
            "comment_count": comments,
            "share_count": shares
        }
    })
}

#[tokio::test]
async fn trending_uses_exchanged_token_and_scores_items() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;
    Mock::given(method("GET"))
        .and(path("/video/list/"))
        .and(header("authorization", "Bearer tok-1"))
        .and(query_param("max_count", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [video("7301", "Amazing dance #fyp #dance", 10_000, 1_000, 100, 50)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tiktok = connect(&server).await.unwrap();
    assert!(tiktok.is_configured());
    let items = tiktok.fetch_trending(10).await.unwrap();

    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.platform, Platform::TikTok);
    assert_eq!(item.volume, 10_000);
    assert!((item.engagement_rate - 11.5).abs() < 1e-9);
    assert_eq!(item.performance_level, PerformanceLevel::Good);
    assert_eq!(item.hashtags, vec!["#fyp".to_string(), "#dance".to_string()]);
    assert!((item.sentiment_score - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn failed_credential_exchange_fails_construction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid client"))
        .mount(&server)
        .await;

    let err = connect(&server).await.err().expect("exchange should fail");
    assert!(matches!(
        err,
        CollectorError::Configuration {
            platform: Platform::TikTok,
            ..
        }
    ));
}

#[tokio::test]
async fn exchange_without_access_token_is_a_configuration_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": "invalid_client",
            "error_description": "Client key is invalid"
        })))
        .mount(&server)
        .await;

    let err = connect(&server).await.err().expect("exchange should fail");
    assert!(err.to_string().contains("Client key is invalid"));
}

#[tokio::test]
async fn rejected_token_is_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "old", "expires_in": 7200
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_token(&server, "new").await;

    Mock::given(method("GET"))
        .and(path("/video/list/"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/list/"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [video("1", "ok", 10, 1, 0, 0)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tiktok = connect(&server).await.unwrap();
    let items = tiktok.fetch_trending(5).await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn refresh_failure_during_a_call_is_not_a_configuration_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "old", "expires_in": 7200
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/list/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let tiktok = connect(&server).await.unwrap();
    let err = tiktok.fetch_trending(5).await.unwrap_err();
    assert!(
        matches!(err, CollectorError::Upstream { status: 503, .. }),
        "unexpected error: {err:?}"
    );
    assert_eq!(err.kind(), "upstream");
}

#[tokio::test]
async fn engagement_growth_compares_against_oldest_snapshot() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path("/video/stats/"))
        .and(query_param("video_id", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "play_count": 1200, "digg_count": 100, "comment_count": 20, "share_count": 0 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/stats/historical/"))
        .and(query_param("days", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                { "date": "2024-05-03", "play_count": 1100 },
                { "date": "2024-05-01", "play_count": 1000 }
            ]
        })))
        .mount(&server)
        .await;

    let metrics = connect(&server)
        .await
        .unwrap()
        .fetch_engagement_metrics("42")
        .await
        .unwrap();
    assert!((metrics.growth_rate - 20.0).abs() < 1e-9);
    assert!((metrics.engagement_rate - 10.0).abs() < 1e-9);
    assert_eq!(metrics.performance_level, PerformanceLevel::Good);
}

#[tokio::test]
async fn unavailable_history_means_zero_growth() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path("/video/stats/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "play_count": 100, "digg_count": 1 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/stats/historical/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let metrics = connect(&server)
        .await
        .unwrap()
        .fetch_engagement_metrics("42")
        .await
        .unwrap();
    assert!(metrics.growth_rate.abs() < f64::EPSILON);
}

#[tokio::test]
async fn audience_insights_skip_missing_videos() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path("/video/query/"))
        .and(query_param("video_id", "a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": video("a", "hello", 100, 10, 0, 0)
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/query/"))
        .and(query_param("video_id", "gone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": null })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/insights/"))
        .and(query_param("video_id", "a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "age_ranges": { "18-24": 60.0, "25-34": 40.0 },
                "gender": { "female": 3.0, "male": 1.0 }
            }
        })))
        .mount(&server)
        .await;

    let insights = connect(&server)
        .await
        .unwrap()
        .fetch_audience_insights(&["a".to_string(), "gone".to_string()])
        .await
        .unwrap();
    assert_eq!(insights.items_analyzed, 1);
    assert!((insights.buckets["gender"]["female"] - 75.0).abs() < 1e-9);
    assert!((insights.buckets["age_ranges"]["18-24"] - 60.0).abs() < 1e-9);
}

#[tokio::test]
async fn missing_credentials_skip_the_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tiktok = TikTokAdapter::connect(
        Some(&"ck".to_string()),
        None,
        &settings(&server.uri()),
        &options(),
        Arc::new(NoCache),
    )
    .await
    .unwrap();
    assert!(!tiktok.is_configured());
    let err = tiktok.fetch_content_detail("1").await.unwrap_err();
    assert!(matches!(err, CollectorError::Configuration { .. }));
}
