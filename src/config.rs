//! Configuration for codex-wrapped.
//!
//! Loaded from `./codex-wrapped.config.yaml` (or `--config <path>`), merged
//! over built-in defaults, then overridden by command-line flags.
//!
//! Example:
//! ```yaml
//! defaults:
//!   year: current
//!   codex_home: ~/.codex
//!   pricing_source: lite_llm
//!   fallback_model: gpt-5
//! dashboard:
//!   title: Codex
//! ```

use crate::parsers::DEFAULT_FALLBACK_MODEL;
use crate::services::pricing::DEFAULT_TIERED_THRESHOLD;
use crate::services::pricing_loader::{PricingSource, LITELLM_PRICING_URL};
use crate::types::{DashboardConfig, Result, WrappedError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_PATH: &str = "codex-wrapped.config.yaml";

/// Target year: a number, or `current` for the current calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum YearSetting {
    Number(i32),
    Text(String),
}

impl Default for YearSetting {
    fn default() -> Self {
        YearSetting::Text("current".to_string())
    }
}

impl YearSetting {
    /// Numeric strings are accepted; anything else means `current_year`.
    pub fn resolve(&self, current_year: i32) -> i32 {
        match self {
            YearSetting::Number(year) => *year,
            YearSetting::Text(text) => text.trim().parse().unwrap_or(current_year),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DefaultsConfig {
    pub year: YearSetting,
    pub codex_home: String,
    pub sessions_subdir: String,
    pub pricing_source: PricingSource,
    pub pricing_url: String,
    /// Local pricing YAML
    pub pricing: String,
    pub output: String,
    pub locale: String,
    pub timezone: String,
    pub fallback_model: String,
    pub tiered_threshold: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            year: YearSetting::default(),
            codex_home: "~/.codex".to_string(),
            sessions_subdir: "sessions".to_string(),
            pricing_source: PricingSource::LiteLlm,
            pricing_url: LITELLM_PRICING_URL.to_string(),
            pricing: "./pricing.yaml".to_string(),
            output: "./dashboard/data.json".to_string(),
            locale: "en-US".to_string(),
            timezone: "local".to_string(),
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            tiered_threshold: DEFAULT_TIERED_THRESHOLD,
        }
    }
}

/// Text handed to renderers
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DashboardSection {
    pub title: String,
    pub subtitle: String,
    pub highlight_label: String,
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self {
            title: "Codex".to_string(),
            subtitle: "Your year in the Codex CLI".to_string(),
            highlight_label: "Signal".to_string(),
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct WrappedConfig {
    pub defaults: DefaultsConfig,
    pub dashboard: DashboardSection,
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub year: Option<i32>,
    pub sessions_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub fallback_model: Option<String>,
    pub offline: bool,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub year: i32,
    pub sessions_dir: PathBuf,
    pub output: PathBuf,
    pub pricing_source: PricingSource,
    pub pricing_url: String,
    pub pricing_path: PathBuf,
    pub fallback_model: String,
    pub tiered_threshold: u64,
    pub dashboard: DashboardConfig,
}

impl WrappedConfig {
    /// Load configuration.
    ///
    /// With `path` set the file must exist. Without it the default file is
    /// optional and built-in defaults apply when it is missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    WrappedError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_yaml(&content)
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.is_file() {
                    let content = fs::read_to_string(default_path)?;
                    Self::from_yaml(&content)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parse YAML; an empty document yields the defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| WrappedError::Config(format!("invalid config: {}", e)))?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(value)
            .map_err(|e| WrappedError::Config(format!("invalid config: {}", e)))
    }

    /// Apply overrides and expand paths
    pub fn resolve(&self, overrides: &ConfigOverrides, current_year: i32) -> Result<RunSettings> {
        let defaults = &self.defaults;

        let sessions_dir = match &overrides.sessions_dir {
            Some(dir) => expand_home(&dir.to_string_lossy())?,
            None => expand_home(&defaults.codex_home)?.join(&defaults.sessions_subdir),
        };
        let output = match &overrides.output {
            Some(path) => expand_home(&path.to_string_lossy())?,
            None => expand_home(&defaults.output)?,
        };
        let pricing_source = if overrides.offline {
            PricingSource::Yaml
        } else {
            defaults.pricing_source
        };

        Ok(RunSettings {
            year: overrides
                .year
                .unwrap_or_else(|| defaults.year.resolve(current_year)),
            sessions_dir,
            output,
            pricing_source,
            pricing_url: defaults.pricing_url.clone(),
            pricing_path: expand_home(&defaults.pricing)?,
            fallback_model: overrides
                .fallback_model
                .clone()
                .unwrap_or_else(|| defaults.fallback_model.clone()),
            tiered_threshold: defaults.tiered_threshold,
            dashboard: DashboardConfig {
                title: self.dashboard.title.clone(),
                subtitle: self.dashboard.subtitle.clone(),
                highlight_label: self.dashboard.highlight_label.clone(),
                locale: defaults.locale.clone(),
                timezone: defaults.timezone.clone(),
            },
        })
    }
}

/// Expand a leading `~` to the home directory.
/// Fails only when a `~` path is given and no home directory exists.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    let rest = if path == "~" {
        ""
    } else if let Some(rest) = path.strip_prefix("~/") {
        rest
    } else {
        return Ok(PathBuf::from(path));
    };

    let home = directories::UserDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or_else(|| {
            WrappedError::Config(format!("cannot resolve home directory for {}", path))
        })?;
    if rest.is_empty() {
        Ok(home)
    } else {
        Ok(home.join(rest))
    }
}
