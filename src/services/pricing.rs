//! Pricing service for cost calculation
//!
//! Resolves a model name to a rate entry through alias and provider-prefix
//! candidates, with a substring match as the last resort, and prices token
//! deltas with a two-band (base / above-threshold) rate.

use crate::types::UsageEvent;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Provider prefixes tried when stripping and re-adding, in order
pub const PROVIDER_PREFIXES: &[&str] = &["openai/", "azure/", "openrouter/openai/"];

/// Suffix marking a CLI-specific model variant priced like its base model
pub const CLI_VARIANT_SUFFIX: &str = "-codex";

/// Token count above which the marginal rate applies
pub const DEFAULT_TIERED_THRESHOLD: u64 = 200_000;

/// Values above this are per-million-token rates
const PER_MILLION_CUTOFF: f64 = 1e-3;

/// Model name to rates, in source order (LiteLLM data, then local additions)
pub type RateMap = IndexMap<String, ModelPricing>;

/// Built-in aliases, overridable from the local pricing file
pub fn default_aliases() -> HashMap<String, String> {
    HashMap::from([("gpt-5-codex".to_string(), "gpt-5".to_string())])
}

/// Per-token rates for a model. Missing rates price that component at zero.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ModelPricing {
    #[serde(default)]
    pub input_cost_per_token: Option<f64>,
    #[serde(default)]
    pub output_cost_per_token: Option<f64>,
    #[serde(default)]
    pub cache_read_input_token_cost: Option<f64>,
    #[serde(default)]
    pub input_cost_per_token_above_200k_tokens: Option<f64>,
    #[serde(default)]
    pub output_cost_per_token_above_200k_tokens: Option<f64>,
    #[serde(default)]
    pub cache_read_input_token_cost_above_200k_tokens: Option<f64>,
}

/// Rate entry as found in LiteLLM data or a local pricing file.
/// Accepts per-token and per-million field names.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawPricingEntry {
    input_cost_per_token: Option<f64>,
    input_cost_per_mtoken: Option<f64>,
    output_cost_per_token: Option<f64>,
    output_cost_per_mtoken: Option<f64>,
    cache_read_input_token_cost: Option<f64>,
    cache_read_input_cost_per_mtoken: Option<f64>,
    cached_input_cost_per_mtoken: Option<f64>,
    input_cost_per_token_above_200k_tokens: Option<f64>,
    input_cost_per_mtoken_above_200k_tokens: Option<f64>,
    output_cost_per_token_above_200k_tokens: Option<f64>,
    output_cost_per_mtoken_above_200k_tokens: Option<f64>,
    cache_read_input_token_cost_above_200k_tokens: Option<f64>,
    cache_read_input_cost_per_mtoken_above_200k_tokens: Option<f64>,
    cached_input_cost_per_mtoken_above_200k_tokens: Option<f64>,
}

/// Normalize a rate to per-token.
fn to_per_token(value: Option<f64>) -> Option<f64> {
    let value = value?;
    if !value.is_finite() {
        return None;
    }
    if value > PER_MILLION_CUTOFF {
        Some(value / 1_000_000.0)
    } else {
        Some(value)
    }
}

impl RawPricingEntry {
    pub fn normalize(&self) -> ModelPricing {
        ModelPricing {
            input_cost_per_token: to_per_token(
                self.input_cost_per_token.or(self.input_cost_per_mtoken),
            ),
            output_cost_per_token: to_per_token(
                self.output_cost_per_token.or(self.output_cost_per_mtoken),
            ),
            cache_read_input_token_cost: to_per_token(
                self.cache_read_input_token_cost
                    .or(self.cache_read_input_cost_per_mtoken)
                    .or(self.cached_input_cost_per_mtoken),
            ),
            input_cost_per_token_above_200k_tokens: to_per_token(
                self.input_cost_per_token_above_200k_tokens
                    .or(self.input_cost_per_mtoken_above_200k_tokens),
            ),
            output_cost_per_token_above_200k_tokens: to_per_token(
                self.output_cost_per_token_above_200k_tokens
                    .or(self.output_cost_per_mtoken_above_200k_tokens),
            ),
            cache_read_input_token_cost_above_200k_tokens: to_per_token(
                self.cache_read_input_token_cost_above_200k_tokens
                    .or(self.cache_read_input_cost_per_mtoken_above_200k_tokens)
                    .or(self.cached_input_cost_per_mtoken_above_200k_tokens),
            ),
        }
    }
}

/// Strip the first matching provider prefix
pub fn strip_provider_prefix(model: &str) -> Option<&str> {
    PROVIDER_PREFIXES
        .iter()
        .find_map(|prefix| model.strip_prefix(prefix))
}

/// Ordered, deduplicated lookup keys for a model name
pub fn pricing_candidates(model: &str, aliases: &HashMap<String, String>) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut add = |value: Option<&str>, candidates: &mut Vec<String>| {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            if seen.insert(v.to_string()) {
                candidates.push(v.to_string());
            }
        }
    };

    add(Some(model), &mut candidates);
    add(aliases.get(model).map(String::as_str), &mut candidates);

    if let Some(stripped) = strip_provider_prefix(model) {
        add(Some(stripped), &mut candidates);
        add(aliases.get(stripped).map(String::as_str), &mut candidates);
    }

    for candidate in candidates.clone() {
        if let Some(trimmed) = candidate.strip_suffix(CLI_VARIANT_SUFFIX) {
            add(Some(trimmed), &mut candidates);
            add(aliases.get(trimmed).map(String::as_str), &mut candidates);
        }
    }

    for candidate in candidates.clone() {
        for prefix in PROVIDER_PREFIXES {
            add(Some(&format!("{}{}", prefix, candidate)), &mut candidates);
        }
    }

    candidates
}

/// How a model name was matched to a rate entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Exact, alias, or prefix/suffix candidate
    Candidate,
    /// Case-insensitive substring in either direction
    Substring,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricingMatch<'a> {
    pub key: &'a str,
    pub pricing: &'a ModelPricing,
    pub kind: MatchKind,
}

/// Rate table plus aliases. Entries keep insertion order, which is the order
/// the substring phase walks.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    models: RateMap,
    aliases: HashMap<String, String>,
}

impl PricingTable {
    pub fn new(models: RateMap, aliases: HashMap<String, String>) -> Self {
        Self { models, aliases }
    }

    pub fn models(&self) -> &RateMap {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Append entries whose names are not already present
    pub fn merge_missing(&mut self, entries: RateMap) {
        for (name, pricing) in entries {
            self.models.entry(name).or_insert(pricing);
        }
    }

    /// Overlay aliases; later values win
    pub fn extend_aliases(&mut self, aliases: HashMap<String, String>) {
        self.aliases.extend(aliases);
    }

    /// First candidate key present in the table
    pub fn resolve_candidate(&self, model: &str) -> Option<PricingMatch<'_>> {
        pricing_candidates(model, &self.aliases)
            .iter()
            .find_map(|candidate| self.models.get_key_value(candidate.as_str()))
            .map(|(key, pricing)| PricingMatch {
                key,
                pricing,
                kind: MatchKind::Candidate,
            })
    }

    /// First key (in table order) containing, or contained in, the model name
    pub fn resolve_substring(&self, model: &str) -> Option<PricingMatch<'_>> {
        let lower = model.to_lowercase();
        self.models
            .iter()
            .filter(|(key, _)| !key.is_empty())
            .find(|(key, _)| {
                let comparison = key.to_lowercase();
                comparison.contains(&lower) || lower.contains(&comparison)
            })
            .map(|(key, pricing)| PricingMatch {
                key,
                pricing,
                kind: MatchKind::Substring,
            })
    }

    pub fn resolve(&self, model: &str) -> Option<PricingMatch<'_>> {
        if model.is_empty() {
            return None;
        }
        self.resolve_candidate(model)
            .or_else(|| self.resolve_substring(model))
    }
}

/// Price `tokens` with a base rate up to `threshold` and a marginal rate above it.
/// A missing rate prices its band at zero. Without a marginal rate the tokens
/// above the threshold are free; they are not billed at the base rate.
pub fn tiered_cost(
    tokens: u64,
    base_price: Option<f64>,
    tiered_price: Option<f64>,
    threshold: u64,
) -> f64 {
    if tokens == 0 {
        return 0.0;
    }
    let below = tokens.min(threshold);
    let above = tokens.saturating_sub(threshold);
    below as f64 * base_price.unwrap_or(0.0) + above as f64 * tiered_price.unwrap_or(0.0)
}

/// Pricing service for calculating token costs
#[derive(Debug, Clone)]
pub struct PricingService {
    table: PricingTable,
    threshold: u64,
}

impl PricingService {
    pub fn new(table: PricingTable, threshold: u64) -> Self {
        Self { table, threshold }
    }

    /// Resolve the rate entry for a model
    pub fn get_pricing(&self, model: &str) -> Option<&ModelPricing> {
        self.table.resolve(model).map(|m| m.pricing)
    }

    /// Cost of one event against a known rate entry
    pub fn cost_for(&self, event: &UsageEvent, pricing: &ModelPricing) -> f64 {
        let cached_input = event.cached_input_tokens.min(event.input_tokens);
        let non_cached_input = event.input_tokens - cached_input;

        let input_cost = tiered_cost(
            non_cached_input,
            pricing.input_cost_per_token,
            pricing.input_cost_per_token_above_200k_tokens,
            self.threshold,
        );
        let cached_cost = tiered_cost(
            cached_input,
            pricing
                .cache_read_input_token_cost
                .or(pricing.input_cost_per_token),
            pricing
                .cache_read_input_token_cost_above_200k_tokens
                .or(pricing.input_cost_per_token_above_200k_tokens),
            self.threshold,
        );
        let output_cost = tiered_cost(
            event.output_tokens,
            pricing.output_cost_per_token,
            pricing.output_cost_per_token_above_200k_tokens,
            self.threshold,
        );

        input_cost + cached_cost + output_cost
    }

    /// Cost of one event, or `None` when its model has no rate entry
    pub fn calculate_cost(&self, event: &UsageEvent) -> Option<f64> {
        self.get_pricing(&event.model)
            .map(|pricing| self.cost_for(event, pricing))
    }

    /// Attach a cost to every event
    pub fn apply_pricing(&self, events: Vec<UsageEvent>) -> Vec<UsageEvent> {
        events
            .into_iter()
            .map(|mut event| {
                event.cost_usd = self.calculate_cost(&event);
                event
            })
            .collect()
    }

    /// Number of models in the rate table
    pub fn model_count(&self) -> usize {
        self.table.models().len()
    }
}
