use std::path::PathBuf;

use crate::Platform;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Per-platform API credentials. An absent or blank value means the
/// platform's adapter reports itself as unconfigured.
#[derive(Clone, Default)]
pub struct PlatformCredentials {
    pub youtube_api_key: Option<String>,
    pub tiktok_client_key: Option<String>,
    pub tiktok_client_secret: Option<String>,
    pub instagram_access_token: Option<String>,
    pub twitter_bearer_token: Option<String>,
    pub linkedin_access_token: Option<String>,
}

impl PlatformCredentials {
    /// Whether the credentials required by `platform` are present and non-blank.
    #[must_use]
    pub fn has(&self, platform: Platform) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        match platform {
            Platform::YouTube => present(&self.youtube_api_key),
            Platform::TikTok => {
                present(&self.tiktok_client_key) && present(&self.tiktok_client_secret)
            }
            Platform::Instagram => present(&self.instagram_access_token),
            Platform::Twitter => present(&self.twitter_bearer_token),
            Platform::LinkedIn => present(&self.linkedin_access_token),
        }
    }
}

impl std::fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[redacted]");
        f.debug_struct("PlatformCredentials")
            .field("youtube_api_key", &redact(&self.youtube_api_key))
            .field("tiktok_client_key", &redact(&self.tiktok_client_key))
            .field("tiktok_client_secret", &redact(&self.tiktok_client_secret))
            .field(
                "instagram_access_token",
                &redact(&self.instagram_access_token),
            )
            .field("twitter_bearer_token", &redact(&self.twitter_bearer_token))
            .field("linkedin_access_token", &redact(&self.linkedin_access_token))
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub collectors_path: PathBuf,
    pub credentials: PlatformCredentials,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub http_user_agent: String,
    pub http_max_retries: u32,
    pub http_backoff_base_ms: u64,
    pub cache_ttl_secs: u64,
    pub adapter_timeout_secs: u64,
    pub retention_days: u32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("collectors_path", &self.collectors_path)
            .field("database_url", &"[redacted]")
            .field("credentials", &self.credentials)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("http_user_agent", &self.http_user_agent)
            .field("http_max_retries", &self.http_max_retries)
            .field("http_backoff_base_ms", &self.http_backoff_base_ms)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("adapter_timeout_secs", &self.adapter_timeout_secs)
            .field("retention_days", &self.retention_days)
            .finish()
    }
}
