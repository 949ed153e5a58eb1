//! Usage types for token tracking

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Token counts as reported by a single usage record.
///
/// Depending on the record this is either an incremental value for one turn
/// or a running total for the whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUsageSnapshot {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_output_tokens: u64,
    pub total_tokens: u64,
}

impl RawUsageSnapshot {
    /// Build a snapshot, deriving `total_tokens` as input + output when the
    /// reported total is not positive.
    pub fn new(input: u64, cached: u64, output: u64, reasoning: u64, total: u64) -> Self {
        let total_tokens = if total > 0 {
            total
        } else {
            input.saturating_add(output)
        };
        Self {
            input_tokens: input,
            cached_input_tokens: cached,
            output_tokens: output,
            reasoning_output_tokens: reasoning,
            total_tokens,
        }
    }

    /// Component-wise `max(self - previous, 0)`.
    pub fn saturating_delta(&self, previous: &RawUsageSnapshot) -> RawUsageSnapshot {
        RawUsageSnapshot {
            input_tokens: self.input_tokens.saturating_sub(previous.input_tokens),
            cached_input_tokens: self
                .cached_input_tokens
                .saturating_sub(previous.cached_input_tokens),
            output_tokens: self.output_tokens.saturating_sub(previous.output_tokens),
            reasoning_output_tokens: self
                .reasoning_output_tokens
                .saturating_sub(previous.reasoning_output_tokens),
            total_tokens: self.total_tokens.saturating_sub(previous.total_tokens),
        }
    }

    /// Normalize into the five per-event delta counts.
    /// Cached input never exceeds input.
    pub fn to_delta(self) -> TokenDelta {
        let total_tokens = if self.total_tokens > 0 {
            self.total_tokens
        } else {
            self.input_tokens.saturating_add(self.output_tokens)
        };
        TokenDelta {
            input_tokens: self.input_tokens,
            cached_input_tokens: self.cached_input_tokens.min(self.input_tokens),
            output_tokens: self.output_tokens,
            reasoning_output_tokens: self.reasoning_output_tokens,
            total_tokens,
        }
    }
}

/// The five token counts carried by one usage event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDelta {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenDelta {
    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0
            && self.cached_input_tokens == 0
            && self.output_tokens == 0
            && self.reasoning_output_tokens == 0
            && self.total_tokens == 0
    }
}

/// One usage-bearing record from a session log, normalized to a delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageEvent {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    /// The model came from the configured fallback, not from the log
    pub is_fallback_model: bool,
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_output_tokens: u64,
    pub total_tokens: u64,
    /// Filled in by pricing; `None` means no rate entry matched the model
    #[serde(default)]
    pub cost_usd: Option<f64>,
}

impl UsageEvent {
    pub fn new(
        session_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        model: impl Into<String>,
        is_fallback_model: bool,
        delta: TokenDelta,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp,
            model: model.into(),
            is_fallback_model,
            input_tokens: delta.input_tokens,
            cached_input_tokens: delta.cached_input_tokens,
            output_tokens: delta.output_tokens,
            reasoning_output_tokens: delta.reasoning_output_tokens,
            total_tokens: delta.total_tokens,
            cost_usd: None,
        }
    }

    /// Convert UTC timestamp to local timezone date.
    /// Ensures date grouping matches the user's local calendar.
    pub fn local_date(&self) -> NaiveDate {
        self.timestamp.with_timezone(&Local).date_naive()
    }

    /// Local calendar year of the event
    pub fn local_year(&self) -> i32 {
        self.local_date().year()
    }

    /// Local day of week, 0 = Sunday .. 6 = Saturday
    pub fn local_weekday(&self) -> usize {
        self.local_date().weekday().num_days_from_sunday() as usize
    }
}
