mod app_config;
mod collectors;
mod config;
mod trend;

pub use app_config::{AppConfig, Environment, PlatformCredentials};
pub use collectors::{load_collectors_settings, CollectorsSettings, PlatformSettings};
pub use config::{load_app_config, load_app_config_from_env};
pub use trend::{ParsePlatformError, PerformanceLevel, Platform, TrendItem};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read collectors file at {path}: {source}")]
    CollectorsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse collectors file: {0}")]
    CollectorsFileParse(#[from] serde_yaml::Error),

    #[error("collectors config validation failed: {0}")]
    Validation(String),
}
