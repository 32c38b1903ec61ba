//! Configuration for the regatta results extractor.

use serde::{Deserialize, Serialize};

use crate::extract::ExtractionConfig;

/// HTTP fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Jittered delay between requests, lower bound
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: f64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Page cache directory; caching is off when unset
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: i64,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
        .to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_requests_per_minute() -> u32 {
    30
}

fn default_min_delay_secs() -> f64 {
    0.5
}

fn default_max_delay_secs() -> f64 {
    1.5
}

fn default_max_retries() -> u32 {
    3
}

fn default_cache_ttl_hours() -> i64 {
    24
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            requests_per_minute: default_requests_per_minute(),
            min_delay_secs: default_min_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            max_retries: default_max_retries(),
            cache_dir: None,
            cache_ttl_hours: default_cache_ttl_hours(),
        }
    }
}

/// SQLite storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    "data/regatta.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_output_dir() -> String {
    "data/output".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

/// Batch run budget
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Stop after this many pages
    #[serde(default)]
    pub max_pages: Option<usize>,
    /// Stop once this much wall-clock time has passed
    #[serde(default)]
    pub max_seconds: Option<u64>,
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl AppConfig {
    /// Load configuration from defaults, config file and environment
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from("regatta")
    }

    /// Load with an explicit config file stem (`regatta` finds `regatta.toml`)
    pub fn load_from(file: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name(file).required(false))
            // Override with environment variables (REGATTA_FETCH__TIMEOUT_SECS, etc.)
            .add_source(
                config::Environment::with_prefix("REGATTA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
