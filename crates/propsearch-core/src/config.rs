//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge compiled defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (`__` separates nested keys, so
//! `APP_EMBEDDING__API_KEY` sets `embedding.api_key`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    /// Load a single explicit file, still overridable by `APP_*` env vars.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let figment = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("APP_").split("__"));
        Self { figment }
    }

    pub fn from_toml_str(toml: &str) -> Self {
        Self { figment: Figment::from(Toml::string(toml)) }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the typed settings. Missing keys take defaults.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
    pub cache: CacheSettings,
    /// Forces the deterministic offline provider (`APP_USE_FAKE_EMBEDDINGS=1`).
    pub use_fake_embeddings: bool,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.embedding.validate()?;
        self.search.validate()?;
        self.cache.validate()
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub endpoint: String,
    pub index: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub timeout_ms: u64,
}

impl std::fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSettings")
            .field("endpoint", &self.endpoint)
            .field("index", &self.index)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9200".to_string(),
            index: "listings".to_string(),
            username: None,
            password: None,
            timeout_ms: 2_000,
        }
    }
}

impl StoreSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::InvalidConfig("store.endpoint must not be empty".into()));
        }
        if self.index.trim().is_empty() {
            return Err(Error::InvalidConfig("store.index must not be empty".into()));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig("store.timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub batch_size: usize,
    pub cache_capacity: u64,
    pub cache_ttl_secs: u64,
}

// api_key stays out of Debug output.
impl std::fmt::Debug for EmbeddingSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingSettings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("batch_size", &self.batch_size)
            .field("cache_capacity", &self.cache_capacity)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .finish()
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            timeout_ms: 3_000,
            max_retries: 2,
            retry_base_delay_ms: 200,
            batch_size: 64,
            cache_capacity: 10_000,
            cache_ttl_secs: 3_600,
        }
    }
}

impl EmbeddingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Worst-case wall time for one embedding call: every attempt times out
    /// and every backoff delay is slept.
    pub fn budget(&self) -> Duration {
        let attempts = self.max_retries + 1;
        let mut total = self.timeout() * attempts;
        for attempt in 0..self.max_retries {
            total += backoff_delay(self.retry_base_delay(), attempt);
        }
        total
    }

    fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(Error::InvalidConfig("embedding.dimensions must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be > 0".into()));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig("embedding.timeout_ms must be > 0".into()));
        }
        if self.max_retries > 10 {
            return Err(Error::InvalidConfig(format!(
                "embedding.max_retries must be <= 10, got {}",
                self.max_retries
            )));
        }
        if self.cache_capacity == 0 {
            return Err(Error::InvalidConfig("embedding.cache_capacity must be > 0".into()));
        }
        Ok(())
    }
}

/// Exponential backoff: `base * 2^attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub lexical_weight: f32,
    pub semantic_weight: f32,
    pub over_fetch_factor: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub overhead_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            lexical_weight: 0.5,
            semantic_weight: 0.5,
            over_fetch_factor: 3,
            default_page_size: 10,
            max_page_size: 100,
            overhead_ms: 250,
        }
    }
}

impl SearchSettings {
    fn validate(&self) -> Result<()> {
        for (name, w) in [("lexical_weight", self.lexical_weight), ("semantic_weight", self.semantic_weight)] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "search.{name} must be finite and >= 0, got {w}"
                )));
            }
        }
        if self.lexical_weight + self.semantic_weight <= 0.0 {
            return Err(Error::InvalidConfig("search weights must not both be zero".into()));
        }
        if self.over_fetch_factor == 0 {
            return Err(Error::InvalidConfig("search.over_fetch_factor must be >= 1".into()));
        }
        if self.max_page_size == 0 {
            return Err(Error::InvalidConfig("search.max_page_size must be > 0".into()));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(Error::InvalidConfig(format!(
                "search.default_page_size must be in 1..={}, got {}",
                self.max_page_size, self.default_page_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub listing_capacity: u64,
    pub listing_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { listing_capacity: 5_000, listing_ttl_secs: 300 }
    }
}

impl CacheSettings {
    pub fn listing_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_ttl_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.listing_capacity == 0 {
            return Err(Error::InvalidConfig("cache.listing_capacity must be > 0".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
