use fcast_fetch::{Backoff, OwmSettings, RetryPolicy, Units, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const CONFIG_ENV: &str = "FCAST_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "fcast.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub country: String,
    pub units: Units,
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            country: "us".to_string(),
            units: Units::Standard,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
            backoff: Backoff::Fixed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Mysql,
    /// Process-local store, for dry runs
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: Backend,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub table: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub operation_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Mysql,
            host: "localhost".to_string(),
            port: 3306,
            user: "fcast".to_string(),
            password: String::new(),
            database: "forecast".to_string(),
            table: "instant".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            operation_timeout_secs: 30,
        }
    }
}

impl StoreConfig {
    /// Remote default: no host, so it must be configured explicitly
    fn remote_default() -> Self {
        Self {
            host: String::new(),
            ..Self::default()
        }
    }

    /// Connection URL with user and password percent-encoded
    pub fn url(&self) -> Result<Url, ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("store host is empty".into()));
        }
        let mut url = Url::parse(&format!("mysql://{}:{}", self.host, self.port))?;
        url.set_username(&self.user)
            .map_err(|_| ConfigError::Invalid(format!("cannot set user {}", self.user)))?;
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|_| ConfigError::Invalid("cannot set password".into()))?;
        }
        url.set_path(&self.database);
        Ok(url)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Comma or newline separated zip codes
    pub locations_file: PathBuf,

    /// Seconds between cycles; run a single cycle when unset
    pub interval_secs: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            locations_file: PathBuf::from("locations.txt"),
            interval_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// "json" or "plain"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub retry: RetryConfig,
    /// Staging store the reconciler writes to
    pub local: StoreConfig,
    /// Store of record the replicator writes to
    pub remote: StoreConfig,
    pub batch: BatchConfig,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            retry: RetryConfig::default(),
            local: StoreConfig::default(),
            remote: StoreConfig::remote_default(),
            batch: BatchConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Load configuration from the FCAST_CONFIG path (TOML) if present, with
    /// defaults otherwise, then apply secrets from the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = Self::from_path(&path)?;
        cfg.apply_overrides(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    /// Parse a TOML file; a missing file yields the defaults
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let s = fs::read_to_string(path)?;
        Ok(toml::from_str::<AppConfig>(&s)?)
    }

    /// Override secrets from `lookup` (the process environment in production)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("OWM_API_KEY") {
            self.provider.api_key = key;
        }
        if let Some(password) = lookup("FCAST_LOCAL_PASSWORD") {
            self.local.password = password;
        }
        if let Some(password) = lookup("FCAST_REMOTE_PASSWORD") {
            self.remote.password = password;
        }
    }

    /// Check the settings a batch cannot run without
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.api_key.is_empty() {
            return Err(ConfigError::Invalid(
                "provider.api_key is empty (set OWM_API_KEY)".into(),
            ));
        }
        if self.local.backend == Backend::Mysql && self.remote.backend == Backend::Mysql {
            let local = self.local_url()?;
            let remote = self.remote_url()?;
            if local.host_str() == remote.host_str()
                && local.port() == remote.port()
                && local.path() == remote.path()
                && self.local.table == self.remote.table
            {
                return Err(ConfigError::Invalid(
                    "local and remote stores point at the same table".into(),
                ));
            }
        } else if self.remote.backend == Backend::Mysql {
            self.remote_url()?;
        } else if self.local.backend == Backend::Mysql {
            self.local_url()?;
        }
        Ok(())
    }

    pub fn local_url(&self) -> Result<Url, ConfigError> {
        self.local.url()
    }

    pub fn remote_url(&self) -> Result<Url, ConfigError> {
        self.remote.url()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.delay_ms),
            self.retry.backoff,
            Duration::from_secs(self.provider.request_timeout_secs),
        )
    }

    pub fn owm_settings(&self) -> OwmSettings {
        OwmSettings {
            base_url: self.provider.base_url.clone(),
            api_key: self.provider.api_key.clone(),
            country: self.provider.country.clone(),
            units: self.provider.units,
            request_timeout: Duration::from_secs(self.provider.request_timeout_secs),
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.batch.interval_secs.map(Duration::from_secs)
    }
}
