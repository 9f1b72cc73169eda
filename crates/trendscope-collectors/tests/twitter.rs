//! Integration tests for `TwitterAdapter` using wiremock HTTP mocks.

use std::sync::Arc;

use trendscope_collectors::{CollectorError, HttpOptions, NoCache, PlatformAdapter, TwitterAdapter};
use trendscope_core::{PerformanceLevel, Platform, PlatformSettings};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter(base_url: &str) -> TwitterAdapter {
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
    TwitterAdapter::new(
        Some(&"bearer-1".to_string()),
        &settings,
        &options,
        Arc::new(NoCache),
    )
    .expect("adapter construction should not fail")
}

fn tweet(id: &str, text: &str, tags: &[&str], likes: u64, retweets: u64) -> serde_json::Value {
    let hashtags: Vec<serde_json::Value> = tags
        .iter()
        .map(|tag| serde_json::json!({ "tag": tag }))
        .collect();
    serde_json::json!({
        "id": id,
        "text": text,
        "author_id": "u1",
        "lang": "en",
        "created_at": "2024-05-01T09:15:00.000Z",
        "entities": { "hashtags": hashtags },
        "public_metrics": {
            "retweet_count": retweets,
            "reply_count": 0,
            "like_count": likes,
            "quote_count": 0
        }
    })
}

fn includes(followers: u64) -> serde_json::Value {
    serde_json::json!({
        "users": [{ "id": "u1", "name": "Author", "public_metrics": { "followers_count": followers } }]
    })
}

#[tokio::test]
async fn trending_keys_posts_by_first_hashtag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tweets/search/recent"))
        .and(header("authorization", "Bearer bearer-1"))
        .and(query_param("max_results", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                tweet("t1", "Launch day #RustLang #release", &["RustLang", "release"], 40, 20),
                tweet("t2", "no tags here", &[], 5, 5)
            ],
            "includes": includes(1_000)
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Below the search floor; the request is clamped up to 10.
    let items = adapter(&server.uri()).fetch_trending(3).await.unwrap();

    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.platform, Platform::Twitter);
    assert_eq!(item.keyword_or_title, "#RustLang");
    assert_eq!(item.category, "hashtag");
    assert_eq!(item.volume, 20);
    assert!((item.engagement_rate - 6.0).abs() < 1e-9);
    assert_eq!(item.performance_level, PerformanceLevel::Excellent);
    assert_eq!(item.metric("retweets"), 20);
}

#[tokio::test]
async fn unknown_author_gives_zero_rate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [tweet("t1", "#solo", &["solo"], 40, 20)]
        })))
        .mount(&server)
        .await;

    let items = adapter(&server.uri()).fetch_trending(10).await.unwrap();
    assert!(items[0].engagement_rate.abs() < f64::EPSILON);
    assert_eq!(items[0].performance_level, PerformanceLevel::Poor);
}

#[tokio::test]
async fn unknown_tweet_with_errors_body_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tweets/404"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errors": [{ "detail": "Could not find tweet with id: [404]." }]
        })))
        .mount(&server)
        .await;

    let err = adapter(&server.uri())
        .fetch_content_detail("404")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CollectorError::NotFound {
            platform: Platform::Twitter,
            ..
        }
    ));
}

#[tokio::test]
async fn engagement_metrics_use_author_followers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tweets/t1"))
        .and(query_param("expansions", "author_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": tweet("t1", "#a", &["a"], 15, 5),
            "includes": includes(500)
        })))
        .mount(&server)
        .await;

    let metrics = adapter(&server.uri())
        .fetch_engagement_metrics("t1")
        .await
        .unwrap();
    assert!((metrics.engagement_rate - 4.0).abs() < 1e-9);
    assert_eq!(metrics.performance_level, PerformanceLevel::Good);
    assert_eq!(metrics.metrics["likes"], 15);
}

#[tokio::test]
async fn audience_insights_bucket_interests_and_languages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tweets/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": tweet("t1", "#Rust #Go", &["Rust", "Go"], 1, 0),
            "includes": includes(100)
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tweets/t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": tweet("t2", "#rust", &["rust"], 1, 0),
            "includes": includes(100)
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tweets/gone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "errors": [] })))
        .mount(&server)
        .await;

    let ids = ["t1", "t2", "gone"].map(String::from);
    let insights = adapter(&server.uri())
        .fetch_audience_insights(&ids)
        .await
        .unwrap();
    assert_eq!(insights.items_analyzed, 2);
    let interests = &insights.buckets["interests"];
    assert!((interests["#rust"] - 200.0 / 3.0).abs() < 1e-9);
    assert!((interests["#go"] - 100.0 / 3.0).abs() < 1e-9);
    assert!((insights.buckets["languages"]["en"] - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn competitor_profile_strips_at_sign() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/by/username/rival"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "id": "99", "name": "Rival", "public_metrics": { "followers_count": 1_000 } }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/99/tweets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                tweet("a", "#one", &["one"], 30, 10),
                tweet("b", "#two", &["two"], 10, 10)
            ]
        })))
        .mount(&server)
        .await;

    let profile = adapter(&server.uri())
        .fetch_competitor_profile("@rival")
        .await
        .unwrap();
    assert_eq!(profile.display_name.as_deref(), Some("Rival"));
    assert_eq!(profile.followers, Some(1_000));
    assert_eq!(profile.items_analyzed, 2);
    assert!((profile.average_engagement_rate - 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn unauthorized_is_an_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let err = adapter(&server.uri()).fetch_trending(10).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.kind(), "upstream");
}
