use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Platform};

/// Upper bound on items requested from any single trending endpoint.
const MAX_RESULTS_CEILING: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    /// ISO 3166-1 alpha-2 region; only meaningful for YouTube charts.
    #[serde(default)]
    pub region_code: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Owning account the adapter reads as "self" (LinkedIn organization URN).
    #[serde(default)]
    pub account: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_max_results() -> u32 {
    25
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_results: default_max_results(),
            region_code: None,
            base_url: None,
            account: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorsSettings {
    #[serde(default)]
    pub platforms: BTreeMap<Platform, PlatformSettings>,
}

impl CollectorsSettings {
    /// Settings for `platform`, falling back to defaults when the file omits it.
    #[must_use]
    pub fn for_platform(&self, platform: Platform) -> PlatformSettings {
        self.platforms.get(&platform).cloned().unwrap_or_default()
    }
}

/// Load and validate collector settings from a YAML file.
///
/// A missing file yields defaults for every platform.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read, parsed, or
/// fails validation.
pub fn load_collectors_settings(path: &Path) -> Result<CollectorsSettings, ConfigError> {
    if !path.exists() {
        return Ok(CollectorsSettings::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CollectorsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let settings: CollectorsSettings = serde_yaml::from_str(&content)?;
    validate_settings(&settings)?;
    Ok(settings)
}

fn validate_settings(settings: &CollectorsSettings) -> Result<(), ConfigError> {
    for (platform, cfg) in &settings.platforms {
        if cfg.max_results == 0 || cfg.max_results > MAX_RESULTS_CEILING {
            return Err(ConfigError::Validation(format!(
                "{platform}: max_results must be between 1 and {MAX_RESULTS_CEILING}, got {}",
                cfg.max_results
            )));
        }

        if let Some(region) = &cfg.region_code {
            if region.len() != 2 || !region.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ConfigError::Validation(format!(
                    "{platform}: region_code must be a two-letter country code, got '{region}'"
                )));
            }
        }

        if cfg.account.as_deref().is_some_and(|a| a.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "{platform}: account must not be blank when set"
            )));
        }

        if let Some(url) = &cfg.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Validation(format!(
                    "{platform}: base_url must be an http(s) URL, got '{url}'"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> CollectorsSettings {
        serde_yaml::from_str(yaml).expect("parse")
    }

    #[test]
    fn missing_platform_falls_back_to_defaults() {
        let settings = parse("platforms:\n  youtube:\n    max_results: 10\n");
        assert_eq!(settings.for_platform(Platform::YouTube).max_results, 10);
        assert_eq!(
            settings.for_platform(Platform::LinkedIn),
            PlatformSettings::default()
        );
    }

    #[test]
    fn fields_default_when_omitted() {
        let settings = parse("platforms:\n  twitter: {}\n");
        let twitter = settings.for_platform(Platform::Twitter);
        assert!(twitter.enabled);
        assert_eq!(twitter.max_results, 25);
        assert!(twitter.base_url.is_none());
    }

    #[test]
    fn validate_rejects_zero_max_results() {
        let settings = parse("platforms:\n  tiktok:\n    max_results: 0\n");
        let err = validate_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("tiktok"));
    }

    #[test]
    fn validate_rejects_bad_region() {
        let settings = parse("platforms:\n  youtube:\n    region_code: FRA\n");
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn validate_rejects_non_http_base_url() {
        let settings = parse("platforms:\n  instagram:\n    base_url: ftp://example.com\n");
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn validate_rejects_blank_account() {
        let settings = parse("platforms:\n  linkedin:\n    account: '  '\n");
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn unknown_platform_key_is_a_parse_error() {
        let result: Result<CollectorsSettings, _> =
            serde_yaml::from_str("platforms:\n  myspace: {}\n");
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = Path::new("/nonexistent/trendscope/collectors.yaml");
        let settings = load_collectors_settings(path).unwrap();
        assert!(settings.platforms.is_empty());
    }

    #[test]
    fn load_settings_from_real_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
            .join("collectors.yaml");
        let settings = load_collectors_settings(&path).expect("failed to load collectors.yaml");
        for platform in Platform::ALL {
            assert!(
                settings.platforms.contains_key(&platform),
                "collectors.yaml should configure {platform}"
            );
        }
        assert_eq!(
            settings
                .for_platform(Platform::YouTube)
                .region_code
                .as_deref(),
            Some("FR")
        );
    }
}
