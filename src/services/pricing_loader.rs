//! Rate table loading
//!
//! Builds the pricing table from LiteLLM data (fresh disk cache, network
//! fetch, then stale cache) and the local pricing file, recording which
//! source was used and why a fetch failed.

use crate::services::atomic_write::write_atomic;
use crate::services::pricing::{default_aliases, PricingTable, RateMap, RawPricingEntry};
use crate::types::{Result, WrappedError};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// LiteLLM pricing URL
pub const LITELLM_PRICING_URL: &str =
    "https://raw.githubusercontent.com/BerriAI/litellm/main/model_prices_and_context_window.json";

/// Cache TTL in seconds (1 hour)
const CACHE_TTL_SECS: i64 = 3600;

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Where rates come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PricingSource {
    /// LiteLLM dataset, with the local file filling gaps
    #[default]
    LiteLlm,
    /// Local pricing file only
    Yaml,
}

impl PricingSource {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("yaml") {
            PricingSource::Yaml
        } else {
            PricingSource::LiteLlm
        }
    }
}

/// Accepts any spelling; only "yaml" (any case) selects the local file
impl<'de> Deserialize<'de> for PricingSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(PricingSource::parse(&value))
    }
}

/// Cached pricing data
#[derive(Debug, Serialize, Deserialize)]
pub struct PricingCache {
    /// Unix timestamp when the cache was fetched
    pub fetched_at: i64,
    /// Normalized model pricing data
    pub models: RateMap,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl PricingCache {
    /// Check if the cache has expired
    pub fn is_expired(&self) -> bool {
        unix_now() - self.fetched_at > CACHE_TTL_SECS
    }
}

/// Local pricing file: `models` and `aliases` sections
#[derive(Debug, Default, Deserialize)]
pub struct LocalPricingFile {
    #[serde(default)]
    pub models: IndexMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl LocalPricingFile {
    /// Normalized entries in file order; entries that are not rate maps are dropped
    pub fn entries(&self) -> RateMap {
        self.models
            .iter()
            .filter_map(|(name, value)| {
                serde_yaml::from_value::<RawPricingEntry>(value.clone())
                    .ok()
                    .map(|raw| (name.clone(), raw.normalize()))
            })
            .collect()
    }
}

/// Loaded table plus diagnostics for the summary notes
#[derive(Debug, Clone)]
pub struct PricingState {
    pub table: PricingTable,
    /// "lite_llm", "lite_llm_cache" or "yaml"
    pub source: String,
    pub url: String,
    pub fetch_error: Option<String>,
}

pub struct PricingLoader {
    source: PricingSource,
    url: String,
    local_path: PathBuf,
    cache_path: Option<PathBuf>,
}

impl PricingLoader {
    pub fn new(source: PricingSource, url: impl Into<String>, local_path: PathBuf) -> Self {
        Self {
            source,
            url: url.into(),
            local_path,
            cache_path: Self::default_cache_path(),
        }
    }

    /// Override the LiteLLM cache location; `None` disables caching
    pub fn with_cache_path(mut self, cache_path: Option<PathBuf>) -> Self {
        self.cache_path = cache_path;
        self
    }

    /// Get the default cache path (~/.codex-wrapped/pricing.json)
    fn default_cache_path() -> Option<PathBuf> {
        directories::UserDirs::new()
            .map(|d| d.home_dir().join(".codex-wrapped").join("pricing.json"))
    }

    /// Load the rate table. Never fails: every source degrades to the next,
    /// ending in an empty table (all costs zero).
    pub fn load(&self) -> PricingState {
        let mut table = PricingTable::new(RateMap::new(), default_aliases());
        let mut source_used = "yaml".to_string();
        let mut fetch_error = None;

        if self.source == PricingSource::LiteLlm {
            match self.load_litellm() {
                (Some((models, used)), error) => {
                    table.merge_missing(models);
                    source_used = used.to_string();
                    fetch_error = error;
                }
                (None, error) => {
                    warn!("failed to fetch LiteLLM pricing, falling back to local pricing file");
                    fetch_error = error;
                }
            }
        }

        match Self::load_local_file(&self.local_path) {
            Ok(Some(local)) => {
                table.merge_missing(local.entries());
                table.extend_aliases(local.aliases);
            }
            Ok(None) => debug!(path = %self.local_path.display(), "no local pricing file"),
            Err(e) => warn!(
                path = %self.local_path.display(),
                error = %e,
                "ignoring local pricing file"
            ),
        }

        if table.is_empty() {
            warn!("no pricing entries loaded; costs will be reported as $0");
        }

        PricingState {
            table,
            source: source_used,
            url: self.url.clone(),
            fetch_error,
        }
    }

    /// Fresh cache → network → stale cache.
    /// Returns the dataset with the source label, and the fetch error if any.
    fn load_litellm(&self) -> (Option<(RateMap, &'static str)>, Option<String>) {
        let cached = self
            .cache_path
            .as_deref()
            .and_then(|path| Self::load_cache(path).ok());

        if let Some(cache) = &cached {
            if !cache.is_expired() {
                debug!(models = cache.models.len(), "using cached LiteLLM pricing");
                return (Some((cache.models.clone(), "lite_llm_cache")), None);
            }
        }

        info!(url = %self.url, "fetching latest model pricing from LiteLLM");
        match Self::fetch_pricing(&self.url) {
            Ok(models) => {
                if let Some(path) = &self.cache_path {
                    let cache = PricingCache {
                        fetched_at: unix_now(),
                        models: models.clone(),
                    };
                    if let Err(e) = Self::save_cache(path, &cache) {
                        debug!(error = %e, "could not save pricing cache");
                    }
                }
                (Some((models, "lite_llm")), None)
            }
            Err(e) => match cached {
                Some(cache) => {
                    warn!(error = %e, "LiteLLM fetch failed, using expired pricing cache");
                    (Some((cache.models, "lite_llm_cache")), Some(e))
                }
                None => (None, Some(e)),
            },
        }
    }

    /// Load cache from disk
    fn load_cache(cache_path: &Path) -> Result<PricingCache> {
        let content = fs::read_to_string(cache_path)?;
        serde_json::from_str(&content)
            .map_err(|e| WrappedError::Pricing(format!("Invalid cache format: {}", e)))
    }

    /// Save cache to disk
    fn save_cache(cache_path: &Path, cache: &PricingCache) -> Result<()> {
        let content = serde_json::to_string_pretty(cache)
            .map_err(|e| WrappedError::Pricing(format!("Serialization failed: {}", e)))?;
        write_atomic(cache_path, content.as_bytes())
    }

    /// Fetch pricing data from LiteLLM
    fn fetch_pricing(url: &str) -> std::result::Result<RateMap, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| format!("HTTP client error: {}", e))?;

        let response = client
            .get(url)
            .send()
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!(
                "Failed to fetch pricing data: HTTP {}",
                response.status()
            ));
        }

        let raw: IndexMap<String, serde_json::Value> = response
            .json()
            .map_err(|e| format!("JSON parse error: {}", e))?;

        Ok(Self::parse_dataset(raw))
    }

    /// Normalize every entry that parses as a rate map, keeping dataset order
    pub fn parse_dataset(raw: IndexMap<String, serde_json::Value>) -> RateMap {
        raw.into_iter()
            .filter(|(_, value)| value.is_object())
            .filter_map(|(name, value)| {
                serde_json::from_value::<RawPricingEntry>(value)
                    .ok()
                    .map(|entry| (name, entry.normalize()))
            })
            .collect()
    }

    /// Read the local pricing file. A missing file is `Ok(None)`.
    pub fn load_local_file(path: &Path) -> Result<Option<LocalPricingFile>> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Some(LocalPricingFile::default()));
        }
        serde_yaml::from_str(&content)
            .map(Some)
            .map_err(|e| WrappedError::Pricing(format!("Invalid pricing file: {}", e)))
    }
}
