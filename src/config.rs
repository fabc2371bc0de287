use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::RateLimitConfig;
use crate::models::{Provider, ScoreProfile};
use crate::services::ProviderConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub providers: ProvidersSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
    /// Upload size ceiling in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Empty means any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
            max_upload_bytes: default_max_upload_bytes(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3000 }
fn default_max_upload_bytes() -> usize { 10 * 1024 * 1024 }

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    /// Upper bound for each provider call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Query tokens used when the upload carries none
    #[serde(default = "default_queries")]
    pub default_queries: Vec<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            default_queries: default_queries(),
        }
    }
}

impl SearchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 { 10 }
fn default_queries() -> Vec<String> { vec!["человек".to_string(), "фото".to_string()] }

/// Per-provider overrides, one section per network
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersSettings {
    #[serde(default)]
    pub vkontakte: ProviderSettings,
    #[serde(default)]
    pub facebook: ProviderSettings,
    #[serde(default)]
    pub instagram: ProviderSettings,
    #[serde(default)]
    pub linkedin: ProviderSettings,
    #[serde(default)]
    pub telegram: ProviderSettings,
}

impl ProvidersSettings {
    pub fn get(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::VKontakte => &self.vkontakte,
            Provider::Facebook => &self.facebook,
            Provider::Instagram => &self.instagram,
            Provider::LinkedIn => &self.linkedin,
            Provider::Telegram => &self.telegram,
        }
    }
}

/// Optional overrides on top of a provider's built-in defaults
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSettings {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub rate_limit: Option<u32>,
    pub window_secs: Option<u64>,
    pub fallback_count: Option<usize>,
    pub base_score: Option<f64>,
    pub jitter: Option<f64>,
    pub simulate_on_failure: Option<bool>,
    pub page_size: Option<u32>,
}

impl ProviderSettings {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Apply these overrides to the provider's defaults
    pub fn resolve(&self, provider: Provider) -> ProviderConfig {
        let defaults = ProviderConfig::defaults(provider);
        let default_profile = defaults.score_profile;

        ProviderConfig {
            provider,
            base_url: self.base_url.clone().unwrap_or(defaults.base_url),
            api_key: self.api_key.clone().unwrap_or(defaults.api_key),
            rate_limit: RateLimitConfig {
                limit: self.rate_limit.unwrap_or(defaults.rate_limit.limit),
                window: self
                    .window_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.rate_limit.window),
            },
            fallback_count: self.fallback_count.unwrap_or(defaults.fallback_count),
            score_profile: ScoreProfile::new(
                self.base_score.unwrap_or(default_profile.base),
                self.jitter.unwrap_or(default_profile.jitter),
            ),
            simulate_on_failure: self.simulate_on_failure.unwrap_or(defaults.simulate_on_failure),
            page_size: self.page_size.unwrap_or(defaults.page_size),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

/// Longest accepted per-provider call timeout
const MAX_TIMEOUT_SECS: u64 = 300;
/// Longest accepted rate window
const MAX_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Credential variables honoured on top of the `PHOTO_SEARCH__` namespace
const CREDENTIAL_VARS: [(Provider, &str); 5] = [
    (Provider::VKontakte, "VK_API_KEY"),
    (Provider::Facebook, "FB_API_KEY"),
    (Provider::Instagram, "IG_API_KEY"),
    (Provider::LinkedIn, "LI_API_KEY"),
    (Provider::Telegram, "TG_API_KEY"),
];

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with PHOTO_SEARCH__)
    /// 5. Provider credentials (VK_API_KEY, FB_API_KEY, ...)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., PHOTO_SEARCH__PROVIDERS__TELEGRAM__RATE_LIMIT -> providers.telegram.rate_limit
            .add_source(env_source())
            .build()?;

        let settings = substitute_credentials(settings)?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(env_source())
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Resolved configs for every enabled provider, in registration order
    pub fn provider_configs(&self) -> Vec<ProviderConfig> {
        Provider::ALL
            .iter()
            .filter(|p| self.providers.get(**p).is_enabled())
            .map(|p| self.providers.get(*p).resolve(*p))
            .collect()
    }

    /// Reject settings that would break score or budget invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.timeout_secs == 0 || self.search.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::Message(format!(
                "search.timeout_secs must be within 1..={}, got {}",
                MAX_TIMEOUT_SECS, self.search.timeout_secs
            )));
        }
        if self.search.default_queries.iter().all(|q| q.trim().is_empty()) {
            return Err(ConfigError::Message("search.default_queries must contain a query".into()));
        }

        for provider in Provider::ALL {
            let config = self.providers.get(provider).resolve(provider);
            let profile = config.score_profile;

            if !(0.0..=1.0).contains(&profile.base) {
                return Err(ConfigError::Message(format!(
                    "providers.{}.base_score must be within [0, 1], got {}",
                    provider.key(),
                    profile.base
                )));
            }
            if profile.jitter < 0.0 {
                return Err(ConfigError::Message(format!(
                    "providers.{}.jitter must not be negative, got {}",
                    provider.key(),
                    profile.jitter
                )));
            }
            let window = config.rate_limit.window;
            if window.is_zero() || window > Duration::from_secs(MAX_WINDOW_SECS) {
                return Err(ConfigError::Message(format!(
                    "providers.{}.window_secs must be within 1..={}, got {}",
                    provider.key(),
                    MAX_WINDOW_SECS,
                    window.as_secs()
                )));
            }
        }

        Ok(())
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("PHOTO_SEARCH")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Apply the short credential variables (VK_API_KEY, ...) as overrides
fn substitute_credentials(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    for (provider, var) in CREDENTIAL_VARS {
        if let Ok(key) = env::var(var) {
            builder = builder.set_override(format!("providers.{}.api_key", provider.key()), key)?;
        }
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.server.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(settings.search.timeout(), Duration::from_secs(10));
        assert_eq!(settings.search.default_queries, vec!["человек", "фото"]);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_default_logging() {
        let level = default_log_level();
        let format = default_log_format();
        assert_eq!(level, "info");
        assert_eq!(format, "json");
    }

    #[test]
    fn test_all_providers_enabled_by_default() {
        let configs = Settings::default().provider_configs();
        let providers: Vec<_> = configs.iter().map(|c| c.provider).collect();
        assert_eq!(providers, Provider::ALL.to_vec());
    }

    #[test]
    fn test_provider_overrides() {
        let overrides: ProviderSettings = toml::from_str(
            r#"
            api_key = "secret"
            rate_limit = 5
            window_secs = 30
            jitter = 0.0
            "#,
        )
        .unwrap();

        let config = overrides.resolve(Provider::LinkedIn);
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.rate_limit.limit, 5);
        assert_eq!(config.rate_limit.window, Duration::from_secs(30));
        assert_eq!(config.score_profile, ScoreProfile::new(0.68, 0.0));
        assert_eq!(config.fallback_count, 1);
        assert_eq!(config.base_url, "https://api.linkedin.com");
    }

    #[test]
    fn test_disabled_provider_is_not_registered() {
        let mut settings = Settings::default();
        settings.providers.telegram.enabled = Some(false);

        let providers: Vec<_> = settings.provider_configs().iter().map(|c| c.provider).collect();
        assert!(!providers.contains(&Provider::Telegram));
        assert_eq!(providers.len(), 4);
    }

    #[test]
    fn test_invalid_score_rejected() {
        let mut settings = Settings::default();
        settings.providers.facebook.base_score = Some(1.5);
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.providers.facebook.jitter = Some(-0.1);
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.search.default_queries.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_oversized_durations_rejected() {
        let mut settings = Settings::default();
        settings.search.timeout_secs = u64::MAX;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.search.timeout_secs = MAX_TIMEOUT_SECS;
        assert!(settings.validate().is_ok());

        let mut settings = Settings::default();
        settings.providers.linkedin.window_secs = Some(u64::MAX);
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.providers.linkedin.window_secs = Some(MAX_WINDOW_SECS);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("photo-search-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
            [server]
            port = 8080

            [search]
            timeout_secs = 3

            [providers.vkontakte]
            fallback_count = 5
            "#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.search.timeout_secs, 3);
        assert_eq!(settings.providers.vkontakte.resolve(Provider::VKontakte).fallback_count, 5);
        assert_eq!(settings.providers.telegram.resolve(Provider::Telegram).fallback_count, 1);
    }
}
