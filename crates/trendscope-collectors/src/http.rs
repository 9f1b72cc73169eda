//! Shared JSON-over-HTTP transport used by every platform adapter.
//!
//! Owns the `reqwest` client, the base URL (overridable so tests can point an
//! adapter at a wiremock server), the response cache and the retry policy.
//! Status handling: 429 becomes [`CollectorError::RateLimited`], 404 becomes
//! [`CollectorError::NotFound`], any other non-2xx becomes
//! [`CollectorError::Upstream`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode, Url};
use trendscope_core::{AppConfig, Platform};

use crate::cache::{request_key, ResponseCache};
use crate::error::CollectorError;
use crate::rate_limit::retry_with_backoff;

const DEFAULT_USER_AGENT: &str = "trendscope/0.1 (trend-collection)";
const ERROR_BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_retries: 3,
            backoff_base_ms: 1_000,
        }
    }
}

impl HttpOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.http_timeout_secs,
            user_agent: config.http_user_agent.clone(),
            max_retries: config.http_max_retries,
            backoff_base_ms: config.http_backoff_base_ms,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Auth<'a> {
    /// Credential travels in the query string (API key style).
    None,
    Bearer(&'a str),
}

pub(crate) struct PlatformHttp {
    platform: Platform,
    client: Client,
    base_url: Url,
    cache: Arc<dyn ResponseCache>,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl PlatformHttp {
    pub(crate) fn new(
        platform: Platform,
        base_url: &str,
        options: &HttpOptions,
        cache: Arc<dyn ResponseCache>,
    ) -> Result<Self, CollectorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&options.user_agent)
            .build()?;

        // Exactly one trailing slash so `join` appends instead of replacing
        // the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| CollectorError::Configuration {
            platform,
            reason: format!("invalid base URL '{base_url}': {e}"),
        })?;

        Ok(Self {
            platform,
            client,
            base_url,
            cache,
            max_retries: options.max_retries,
            backoff_base_ms: options.backoff_base_ms,
        })
    }

    pub(crate) fn platform(&self) -> Platform {
        self.platform
    }

    pub(crate) fn clear_cache(&self) {
        self.cache.clear();
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, CollectorError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| CollectorError::Configuration {
                platform: self.platform,
                reason: format!("invalid endpoint path '{path}': {e}"),
            })
    }

    /// GET `path` with `query`, served from the cache when a fresh entry exists.
    pub(crate) async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        auth: Auth<'_>,
    ) -> Result<serde_json::Value, CollectorError> {
        let url = self.endpoint(path)?;
        let key = request_key(url.as_str(), query);

        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(platform = %self.platform, path, "response cache hit");
            return Ok(hit);
        }

        let body = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let request = with_auth(self.client.get(url.clone()).query(query), auth);
            self.execute(request, path)
        })
        .await?;

        self.cache.set(&key, body.clone());
        Ok(body)
    }

    /// POST a form body. Never cached.
    pub(crate) async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<serde_json::Value, CollectorError> {
        let url = self.endpoint(path)?;
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let request = self.client.post(url.clone()).form(form);
            self.execute(request, path)
        })
        .await
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<serde_json::Value, CollectorError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(CollectorError::RateLimited {
                platform: self.platform,
                retry_after_secs,
            });
        }

        if status == StatusCode::NOT_FOUND {
            return Err(CollectorError::NotFound {
                platform: self.platform,
                resource: context.to_owned(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollectorError::Upstream {
                platform: self.platform,
                status: status.as_u16(),
                message: body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| CollectorError::Deserialize {
            platform: self.platform,
            context: context.to_owned(),
            source: e,
        })
    }
}

fn with_auth(request: RequestBuilder, auth: Auth<'_>) -> RequestBuilder {
    match auth {
        Auth::None => request,
        Auth::Bearer(token) => request.bearer_auth(token),
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::NoCache;

    use super::*;

    fn http(base: &str) -> PlatformHttp {
        PlatformHttp::new(
            Platform::YouTube,
            base,
            &HttpOptions::default(),
            Arc::new(NoCache),
        )
        .expect("client construction should not fail")
    }

    #[test]
    fn endpoint_appends_to_base_path() {
        let http = http("https://www.googleapis.com/youtube/v3");
        let url = http.endpoint("videos").unwrap();
        assert_eq!(url.as_str(), "https://www.googleapis.com/youtube/v3/videos");
    }

    #[test]
    fn endpoint_tolerates_slashes_on_both_sides() {
        let http = http("https://api.linkedin.com/v2/");
        let url = http.endpoint("/shares/123").unwrap();
        assert_eq!(url.as_str(), "https://api.linkedin.com/v2/shares/123");
    }

    #[test]
    fn invalid_base_url_is_configuration_error() {
        let result = PlatformHttp::new(
            Platform::Twitter,
            "not a url",
            &HttpOptions::default(),
            Arc::new(NoCache),
        );
        assert!(matches!(
            result,
            Err(CollectorError::Configuration {
                platform: Platform::Twitter,
                ..
            })
        ));
    }
}
