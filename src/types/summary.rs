//! The aggregated year summary handed to renderers

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Renderer-facing settings copied from configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    pub title: String,
    pub subtitle: String,
    pub highlight_label: String,
    pub locale: String,
    pub timezone: String,
}

/// The single output document of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSummary {
    pub year: i32,
    pub generated_at: DateTime<Utc>,
    pub config: DashboardConfig,
    pub summary: SummaryTotals,
    pub activity: ActivitySummary,
    pub models: Vec<ModelRow>,
    pub notes: SummaryNotes,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SummaryTotals {
    pub sessions: u64,
    pub turns: u64,
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_tokens: u64,
    pub total_tokens: u64,
    #[serde(rename = "costUSD")]
    pub cost_usd: f64,
    pub cache_hit_rate: f64,
    pub first_session_date: Option<DateTime<Utc>>,
    pub days_since_first_session: i64,
    pub max_streak: u32,
    pub current_streak: u32,
    pub most_active_day: Option<MostActiveDay>,
    pub max_daily_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MostActiveDay {
    pub date: NaiveDate,
    pub count: u64,
    /// e.g. "Jan 5"
    pub formatted_date: String,
}

/// Calendar-keyed activity. Keys serialize as `YYYY-MM-DD`, ascending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub daily_counts: BTreeMap<NaiveDate, u64>,
    pub daily_tokens: BTreeMap<NaiveDate, u64>,
    pub daily_costs: BTreeMap<NaiveDate, f64>,
    /// 0 = Sunday .. 6 = Saturday
    pub weekday_counts: [u64; 7],
    pub max_streak_days: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelRow {
    pub name: String,
    pub tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(rename = "costUSD")]
    pub cost_usd: f64,
    pub count: u64,
    pub is_fallback: bool,
    /// Share of all tokens in the year, 0.0..=1.0
    pub percentage: f64,
}

/// Diagnostics about degraded inputs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SummaryNotes {
    pub unpriced_models: Vec<String>,
    pub fallback_events: u64,
    pub sessions_dir: String,
    pub pricing_source: String,
    pub pricing_url: String,
    pub pricing_fetch_error: Option<String>,
}
