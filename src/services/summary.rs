//! Summary assembly: packs the year aggregate into the output document

use crate::services::aggregator::{Aggregator, ModelUsage, YearAggregate};
use crate::types::{
    ActivitySummary, AggregateSummary, DashboardConfig, ModelRow, MostActiveDay, SummaryNotes,
    SummaryTotals,
};
use chrono::{DateTime, NaiveDate, Utc};

/// Number of model rows kept in the document
pub const TOP_MODELS: usize = 5;

/// Run-level inputs that do not come from the event stream
#[derive(Debug, Clone)]
pub struct SummaryContext {
    pub year: i32,
    pub generated_at: DateTime<Utc>,
    /// Local "today", the anchor for the current streak
    pub today: NaiveDate,
    pub config: DashboardConfig,
    /// Earliest event across all years
    pub first_event: Option<DateTime<Utc>>,
    pub sessions_dir: String,
    pub pricing_source: String,
    pub pricing_url: String,
    pub pricing_fetch_error: Option<String>,
}

pub struct SummaryAssembler;

impl SummaryAssembler {
    pub fn assemble(aggregate: &YearAggregate, context: SummaryContext) -> AggregateSummary {
        let totals = &aggregate.totals;
        let streaks = Aggregator::calculate_streaks(&aggregate.active_dates(), context.today);
        let busiest = Aggregator::most_active_day(&aggregate.daily);
        let most_active_day = busiest.map(|(date, count)| MostActiveDay {
            date,
            count,
            formatted_date: Self::format_day(date),
        });

        let days_since_first_session = context
            .first_event
            .map(|first| (context.generated_at - first).num_days().max(0))
            .unwrap_or(0);

        let summary = SummaryTotals {
            sessions: totals.sessions,
            turns: totals.turns,
            input_tokens: totals.input_tokens,
            cached_input_tokens: totals.cached_input_tokens,
            output_tokens: totals.output_tokens,
            reasoning_tokens: totals.reasoning_output_tokens,
            total_tokens: totals.total_tokens,
            cost_usd: totals.cost_usd,
            cache_hit_rate: totals.cache_hit_rate(),
            first_session_date: context.first_event,
            days_since_first_session,
            max_streak: streaks.max_streak,
            current_streak: streaks.current_streak,
            most_active_day,
            max_daily_count: aggregate.max_daily_count(),
        };

        let daily = &aggregate.daily;
        let activity = ActivitySummary {
            daily_counts: daily.iter().map(|(d, a)| (*d, a.count)).collect(),
            daily_tokens: daily.iter().map(|(d, a)| (*d, a.tokens)).collect(),
            daily_costs: daily.iter().map(|(d, a)| (*d, a.cost_usd)).collect(),
            weekday_counts: aggregate.weekday_counts,
            max_streak_days: streaks.max_streak_days,
        };

        let notes = SummaryNotes {
            unpriced_models: aggregate.unpriced_models.iter().cloned().collect(),
            fallback_events: totals.fallback_events,
            sessions_dir: context.sessions_dir,
            pricing_source: context.pricing_source,
            pricing_url: context.pricing_url,
            pricing_fetch_error: context.pricing_fetch_error,
        };

        AggregateSummary {
            year: context.year,
            generated_at: context.generated_at,
            config: context.config,
            summary,
            activity,
            models: Self::top_models(&aggregate.models, totals.total_tokens, TOP_MODELS),
            notes,
        }
    }

    /// Highest token counts first. The sort is stable, so equal counts keep
    /// first-seen order.
    pub fn top_models(models: &[ModelUsage], total_tokens: u64, limit: usize) -> Vec<ModelRow> {
        let mut ranked: Vec<&ModelUsage> = models.iter().collect();
        ranked.sort_by(|a, b| b.tokens.cmp(&a.tokens));

        ranked
            .into_iter()
            .take(limit)
            .map(|m| ModelRow {
                name: m.name.clone(),
                tokens: m.tokens,
                input_tokens: m.input_tokens,
                output_tokens: m.output_tokens,
                cost_usd: m.cost_usd,
                count: m.count,
                is_fallback: m.is_fallback,
                percentage: if total_tokens > 0 {
                    m.tokens as f64 / total_tokens as f64
                } else {
                    0.0
                },
            })
            .collect()
    }

    /// "Jan 5"
    pub fn format_day(date: NaiveDate) -> String {
        date.format("%b %-d").to_string()
    }
}
