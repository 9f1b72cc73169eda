//! Integration tests for `LinkedInAdapter` using wiremock HTTP mocks.

use std::sync::Arc;

use trendscope_collectors::{
    CollectorError, HttpOptions, LinkedInAdapter, NoCache, PlatformAdapter,
};
use trendscope_core::{PerformanceLevel, Platform, PlatformSettings};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ORG: &str = "urn:li:organization:42";

fn adapter_for(base_url: &str, account: Option<&str>) -> LinkedInAdapter {
    let settings = PlatformSettings {
        base_url: Some(base_url.to_string()),
        account: account.map(str::to_string),
        ..PlatformSettings::default()
    };
    let options = HttpOptions {
        timeout_secs: 5,
        max_retries: 0,
        backoff_base_ms: 0,
        ..HttpOptions::default()
    };
    LinkedInAdapter::new(
        Some(&"li-token".to_string()),
        &settings,
        &options,
        Arc::new(NoCache),
    )
    .expect("adapter construction should not fail")
}

fn adapter(base_url: &str) -> LinkedInAdapter {
    adapter_for(base_url, Some(ORG))
}

fn share(id: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "owner": ORG,
        "text": { "text": text },
        "created": { "time": 1_714_557_600_000_i64 }
    })
}

async fn mount_counters(server: &MockServer, id: &str, likes: u64, impressions: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/socialActions/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "likesSummary": { "totalLikes": likes },
            "commentsSummary": { "totalFirstLevelComments": 4, "totalComments": 6 },
            "sharesSummary": { "totalShares": 4 }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/shares/{id}/statistics")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "impressionCount": impressions
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn trending_lists_owner_shares_with_impression_rate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shares"))
        .and(header("authorization", "Bearer li-token"))
        .and(query_param("q", "owners"))
        .and(query_param("owners", ORG))
        .and(query_param("count", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "elements": [share("s1", "Hiring great engineers #hiring")]
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_counters(&server, "s1", 60, 1_000).await;

    let items = adapter(&server.uri()).fetch_trending(5).await.unwrap();

    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.platform, Platform::LinkedIn);
    assert_eq!(item.category, "post");
    assert_eq!(item.volume, 60);
    assert_eq!(item.metric("comments"), 6);
    assert_eq!(item.metric("impressions"), 1_000);
    assert!((item.engagement_rate - 7.0).abs() < 1e-9);
    assert_eq!(item.performance_level, PerformanceLevel::Excellent);
    assert_eq!(item.hashtags, vec!["#hiring".to_string()]);
}

#[tokio::test]
async fn missing_owner_account_is_unconfigured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let linkedin = adapter_for(&server.uri(), None);
    assert!(!linkedin.is_configured());
    let err = linkedin.fetch_trending(5).await.unwrap_err();
    assert!(matches!(
        err,
        CollectorError::Configuration {
            platform: Platform::LinkedIn,
            ..
        }
    ));
}

#[tokio::test]
async fn zero_impressions_gives_zero_rate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shares/s2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(share("s2", "Quarterly update")))
        .mount(&server)
        .await;
    mount_counters(&server, "s2", 10, 0).await;

    let metrics = adapter(&server.uri())
        .fetch_engagement_metrics("s2")
        .await
        .unwrap();
    assert!(metrics.engagement_rate.abs() < f64::EPSILON);
    assert_eq!(metrics.performance_level, PerformanceLevel::Poor);
    assert!(metrics.growth_rate.abs() < f64::EPSILON);
}

#[tokio::test]
async fn detail_reports_owner_as_author() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shares/s3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(share("s3", "How to grow a team")))
        .mount(&server)
        .await;
    mount_counters(&server, "s3", 40, 1_000).await;

    let detail = adapter(&server.uri())
        .fetch_content_detail("s3")
        .await
        .unwrap();
    assert_eq!(detail.author.as_deref(), Some(ORG));
    assert!((detail.engagement_rate - 5.0).abs() < 1e-9);
    assert_eq!(detail.performance_level, PerformanceLevel::Good);
    assert!(detail.published_at.is_some());
}

#[tokio::test]
async fn audience_insights_sum_organic_and_paid_followers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/organizationalEntityFollowerStatistics"))
        .and(query_param("organizationalEntity", ORG))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "elements": [{
                "followerCountsBySeniority": [
                    { "seniority": "urn:li:seniority:3", "followerCounts": { "organicFollowerCount": 20, "paidFollowerCount": 10 } },
                    { "seniority": "urn:li:seniority:4", "followerCounts": { "organicFollowerCount": 10 } }
                ],
                "followerCountsByIndustry": [
                    { "industry": "urn:li:industry:4", "followerCounts": { "organicFollowerCount": 5 } }
                ]
            }]
        })))
        .mount(&server)
        .await;

    let insights = adapter(&server.uri())
        .fetch_audience_insights(&[])
        .await
        .unwrap();
    let seniority = &insights.buckets["seniority"];
    assert!((seniority["urn:li:seniority:3"] - 75.0).abs() < 1e-9);
    assert!((seniority["urn:li:seniority:4"] - 25.0).abs() < 1e-9);
    assert!((insights.buckets["industry"]["urn:li:industry:4"] - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn competitor_profile_uses_network_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/networkSizes/urn:li:organization:7"))
        .and(query_param("edgeType", "CompanyFollowedByMember"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "firstDegreeSize": 12_000
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shares"))
        .and(query_param("owners", "urn:li:organization:7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "elements": [share("c1", "Product news")]
        })))
        .mount(&server)
        .await;
    mount_counters(&server, "c1", 90, 1_000).await;

    let profile = adapter(&server.uri())
        .fetch_competitor_profile("urn:li:organization:7")
        .await
        .unwrap();
    assert_eq!(profile.followers, Some(12_000));
    assert_eq!(profile.items_analyzed, 1);
    assert!((profile.average_engagement_rate - 10.0).abs() < 1e-9);
}
