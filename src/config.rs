//! Host configuration, persisted as TOML.
//!
//! ```toml
//! graceful_degradation = true
//! cache_ttl_secs = 300
//!
//! [health]
//! consecutive_failure_limit = 3
//!
//! [providers.tavily]
//! enabled = true
//! timeout_ms = 8000
//! search_depth = "basic"
//!
//! [providers.tavily.retry]
//! max_attempts = 2
//!
//! [providers.local_index]
//! catalog = "/srv/pricewise/catalog.json"
//! top_k = 10
//! ```
//!
//! Every section is optional; missing fields take their defaults. Provider
//! sections carry the shared call policy (`enabled`, `timeout_ms`, `retry`)
//! next to that provider's own settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pricewise_search::providers::{DuckDuckGoConfig, LocalIndexConfig, TavilyConfig};
use pricewise_search::{CurrencyTable, HealthPolicy, RetryPolicy, SearchError};
use serde::{Deserialize, Serialize};

use crate::error::{PricewiseError, Result};

/// Environment variable holding the Tavily API key.
pub const TAVILY_API_KEY_ENV: &str = "TAVILY_API_KEY";

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "PRICEWISE_CONFIG_DIR";

/// Top-level host configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricewiseConfig {
    /// Serve fallback data when a provider fails. `false` surfaces failures.
    pub graceful_degradation: bool,
    /// Result cache lifetime in seconds. `0` disables the cache.
    pub cache_ttl_secs: u64,
    /// Health tracker thresholds.
    pub health: HealthPolicy,
    /// Exchange rates into the base currency.
    pub currency: CurrencyTable,
    /// Query normalization.
    pub query: QueryConfig,
    /// Provider sections, registered in declaration order.
    pub providers: ProvidersConfig,
}

impl Default for PricewiseConfig {
    fn default() -> Self {
        Self {
            graceful_degradation: true,
            cache_ttl_secs: 300,
            health: HealthPolicy::default(),
            currency: CurrencyTable::default(),
            query: QueryConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

/// Extra synonyms merged over the built-in regional table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Word or phrase to search term, e.g. `"kela" = "banana"`.
    pub synonyms: BTreeMap<String, String>,
}

/// One provider's call policy plus its own settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "C: Deserialize<'de> + Default"))]
pub struct ProviderSection<C> {
    /// Register this provider.
    pub enabled: bool,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retry budget.
    pub retry: RetryPolicy,
    /// Provider-specific settings.
    #[serde(flatten)]
    pub settings: C,
}

impl<C: Default> Default for ProviderSection<C> {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 8_000,
            retry: RetryPolicy::default(),
            settings: C::default(),
        }
    }
}

impl<C> ProviderSection<C> {
    /// Per-attempt timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(invalid(format!("providers.{name}.timeout_ms must be greater than 0")));
        }
        self.retry
            .validate()
            .map_err(|e| invalid(format!("providers.{name}.retry: {e}")))
    }
}

/// Local index settings plus an optional catalog file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalIndexSettings {
    /// JSON catalog to index instead of the built-in one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
    /// Embedding and retrieval settings.
    #[serde(flatten)]
    pub index: LocalIndexConfig,
}

/// Static catalog settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockSettings {
    /// Records returned per query.
    pub max_results: usize,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self { max_results: 20 }
    }
}

/// Every known provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Tavily search API.
    pub tavily: ProviderSection<TavilyConfig>,
    /// DuckDuckGo HTML scraping.
    pub duckduckgo: ProviderSection<DuckDuckGoConfig>,
    /// In-process vector index.
    pub local_index: ProviderSection<LocalIndexSettings>,
    /// Static catalog.
    pub mock: ProviderSection<MockSettings>,
}

impl PricewiseConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PricewiseError::Config(e.to_string()))
    }

    /// Load `path` if it exists, defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PricewiseError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/pricewise/config.toml`.
    ///
    /// `PRICEWISE_CONFIG_DIR` overrides the directory.
    pub fn default_config_path() -> PathBuf {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return PathBuf::from(dir).join("config.toml");
        }
        dirs::config_dir()
            .map(|d| d.join("pricewise"))
            .unwrap_or_else(|| PathBuf::from("/tmp/pricewise-config"))
            .join("config.toml")
    }

    /// Apply environment overrides. `TAVILY_API_KEY` replaces the configured key.
    pub fn apply_env_overrides(&mut self) {
        self.apply_tavily_key(std::env::var(TAVILY_API_KEY_ENV).ok());
    }

    fn apply_tavily_key(&mut self, key: Option<String>) {
        if let Some(key) = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) {
            self.providers.tavily.settings.api_key = Some(key);
        }
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`PricewiseError::Search`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.health.validate()?;
        self.currency.validate()?;
        let providers = &self.providers;
        providers.tavily.validate("tavily")?;
        providers.duckduckgo.validate("duckduckgo")?;
        providers.local_index.validate("local_index")?;
        providers.mock.validate("mock")?;
        providers
            .local_index
            .settings
            .index
            .validate()
            .map_err(|e| invalid(format!("providers.local_index: {e}")))?;
        if providers.mock.settings.max_results == 0 {
            return Err(invalid("providers.mock.max_results must be greater than 0".into()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> PricewiseError {
    PricewiseError::Search(SearchError::Config(message))
}
