//! Configuration management.
//!
//! Settings are layered, later sources overriding earlier ones:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, `./doi-pdf-api.toml` or `<config dir>/doi-pdf-api/config.toml`)
//! 3. `DOI_PDF_API__SECTION__KEY` environment variables (a `.env` file is loaded first)
//! 4. the short variables the service has always accepted (`PORT`, `CACHE_TTL`, ...)
//!
//! # Configuration File Format
//!
//! ```toml
//! environment = "production"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 3000
//!
//! [mirror]
//! base_url = "https://mirror.example/"
//! max_document_mb = 100
//!
//! [crossref]
//! base_url = "https://api.crossref.org"
//! mailto = "ops@example.org"
//!
//! [cache]
//! enabled = true
//! ttl_seconds = 86400
//! max_entries = 1000
//! max_total_mb = 256
//!
//! [rate_limit]
//! window_ms = 60000
//! max_requests = 10
//! trust_forwarded_for = false
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::validate_base_url;

const ENV_PREFIX: &str = "DOI_PDF_API";
const CONFIG_FILE_NAME: &str = "doi-pdf-api.toml";

/// Short environment variables and the keys they override
const LEGACY_ENV: &[(&str, &str)] = &[
    ("APP_ENV", "environment"),
    ("NODE_ENV", "environment"),
    ("PORT", "server.port"),
    ("MIRROR_BASE_URL", "mirror.base_url"),
    ("CACHE_ENABLED", "cache.enabled"),
    ("CACHE_TTL", "cache.ttl_seconds"),
    ("RATE_LIMIT_WINDOW_MS", "rate_limit.window_ms"),
    ("RATE_LIMIT_MAX_REQUESTS", "rate_limit.max_requests"),
    ("LOG_LEVEL", "logging.level"),
];

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub mirror: MirrorConfig,
    pub crossref: CrossRefConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetrySettings,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Check values that cannot be expressed by types and normalise URLs
    ///
    /// A missing or malformed mirror URL is fatal: the service has nowhere to
    /// look documents up.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let mirror = self.mirror.base_url.as_deref().ok_or_else(|| {
            ConfigError::Invalid(
                "mirror.base_url is not set (use MIRROR_BASE_URL or DOI_PDF_API__MIRROR__BASE_URL)"
                    .to_string(),
            )
        })?;
        let mirror = validate_base_url(mirror)
            .map_err(|e| ConfigError::Invalid(format!("mirror.base_url: {}", e)))?;
        self.mirror.base_url = Some(mirror);

        self.crossref.base_url = validate_base_url(&self.crossref.base_url)
            .map_err(|e| ConfigError::Invalid(format!("crossref.base_url: {}", e)))?;

        if self.rate_limit.max_requests == 0 || self.rate_limit.window_ms == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.window_ms and rate_limit.max_requests must be positive".to_string(),
            ));
        }

        Ok(self)
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Mirror site that hosts document pages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Base URL the DOI is appended to; required
    pub base_url: Option<String>,

    /// Largest document accepted from the mirror (in MB)
    pub max_document_mb: usize,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            max_document_mb: 100,
        }
    }
}

/// CrossRef registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossRefConfig {
    pub base_url: String,

    /// Contact address for CrossRef's polite pool
    pub mailto: Option<String>,
}

impl Default for CrossRefConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.crossref.org".to_string(),
            mailto: None,
        }
    }
}

/// Response cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub max_entries: usize,

    /// Upper bound on the total size of cached bodies
    pub max_total_mb: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_seconds: 86_400,
            max_entries: 1000,
            max_total_mb: 256,
        }
    }
}

/// Per-client request throttling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,

    /// Key clients on the first `X-Forwarded-For` hop instead of the peer address.
    /// Only safe behind a reverse proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 10,
            trust_forwarded_for: false,
        }
    }
}

/// Retry policy for upstream requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay_ms: 500,
        }
    }
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: None,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,

    /// `"json"` for structured output, anything else for human-readable lines
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
        }
    }
}

/// Find a configuration file in the default locations
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("doi-pdf-api").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Load configuration from the process environment and an optional file
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();

    let file = path.map(Path::to_path_buf).or_else(find_config_file);
    if let Some(file) = &file {
        tracing::debug!("Using config file: {}", file.display());
    }

    load_from(file.as_deref(), std::env::vars().collect())
}

/// Load configuration from an optional file and an explicit set of variables
pub fn load_from(
    file: Option<&Path>,
    vars: config::Map<String, String>,
) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(file) = file {
        builder = builder.add_source(config::File::from(file));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .source(Some(vars.clone())),
    );

    for (var, key) in LEGACY_ENV {
        if let Some(value) = vars.get(*var).filter(|v| !v.is_empty()) {
            builder = builder.set_override(*key, value.clone())?;
        }
    }

    let config: Config = builder.build()?.try_deserialize()?;
    config.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn env_from(pairs: &[(&str, &str)]) -> config::Map<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl_seconds, 86_400);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.rate_limit.max_requests, 10);
        assert!(!config.rate_limit.trust_forwarded_for);
        assert_eq!(config.cache.max_total_mb, 256);
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_missing_mirror_is_fatal() {
        let result = load_from(None, env_from(&[]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_mirror_is_fatal() {
        let result = load_from(None, env_from(&[("MIRROR_BASE_URL", "not a url")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_legacy_variables() {
        let config = load_from(
            None,
            env_from(&[
                ("MIRROR_BASE_URL", "https://mirror.example"),
                ("NODE_ENV", "production"),
                ("PORT", "8080"),
                ("CACHE_ENABLED", "true"),
                ("CACHE_TTL", "120"),
                ("RATE_LIMIT_MAX_REQUESTS", "3"),
            ]),
        )
        .unwrap();

        assert_eq!(config.mirror.base_url.as_deref(), Some("https://mirror.example/"));
        assert!(config.is_production());
        assert_eq!(config.server.port, 8080);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_seconds, 120);
        assert_eq!(config.rate_limit.max_requests, 3);
        assert_eq!(config.crossref.base_url, "https://api.crossref.org/");
    }

    #[test]
    fn test_config_file_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(
            &path,
            r#"
environment = "test"

[mirror]
base_url = "http://127.0.0.1:9000"
max_document_mb = 5

[cache]
enabled = true
max_entries = 42

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();

        let config = load_from(Some(&path), env_from(&[("PORT", "4000")])).unwrap();

        assert_eq!(config.environment, Environment::Test);
        assert_eq!(config.mirror.base_url.as_deref(), Some("http://127.0.0.1:9000/"));
        assert_eq!(config.mirror.max_document_mb, 5);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_entries, 42);
        assert_eq!(config.cache.ttl_seconds, 86_400);
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn test_config_file_nonexistent() {
        let result = load_from(
            Some(Path::new("/nonexistent/config.toml")),
            env_from(&[("MIRROR_BASE_URL", "https://mirror.example")]),
        );
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_prefixed_variables() {
        let config = load_from(
            None,
            env_from(&[
                ("DOI_PDF_API__MIRROR__BASE_URL", "https://mirror.example/base"),
                ("DOI_PDF_API__CACHE__MAX_ENTRIES", "7"),
            ]),
        )
        .unwrap();

        assert_eq!(
            config.mirror.base_url.as_deref(),
            Some("https://mirror.example/base/")
        );
        assert_eq!(config.cache.max_entries, 7);
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let result = load_from(
            None,
            env_from(&[
                ("MIRROR_BASE_URL", "https://mirror.example"),
                ("RATE_LIMIT_MAX_REQUESTS", "0"),
            ]),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
