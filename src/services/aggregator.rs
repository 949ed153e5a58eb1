//! Aggregator service for computing usage statistics

use crate::types::UsageEvent;
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Totals across all events of the year
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UsageTotals {
    pub sessions: u64,
    pub turns: u64,
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_output_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub fallback_events: u64,
}

impl UsageTotals {
    /// Cached share of input tokens; 0 when there is no input
    pub fn cache_hit_rate(&self) -> f64 {
        if self.input_tokens > 0 {
            self.cached_input_tokens as f64 / self.input_tokens as f64
        } else {
            0.0
        }
    }
}

/// Activity on one local calendar day
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DayActivity {
    pub count: u64,
    pub tokens: u64,
    pub cost_usd: f64,
}

/// Per-model accumulation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelUsage {
    pub name: String,
    pub tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub count: u64,
    pub is_fallback: bool,
}

impl ModelUsage {
    fn add(&mut self, event: &UsageEvent, cost: f64) {
        self.tokens = self.tokens.saturating_add(event.total_tokens);
        self.input_tokens = self.input_tokens.saturating_add(event.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(event.output_tokens);
        self.cost_usd += cost;
        self.count = self.count.saturating_add(1);
        if event.is_fallback_model {
            self.is_fallback = true;
        }
    }
}

/// Result of folding the year's events
#[derive(Debug, Clone, Default)]
pub struct YearAggregate {
    pub totals: UsageTotals,
    pub daily: BTreeMap<NaiveDate, DayActivity>,
    /// 0 = Sunday .. 6 = Saturday
    pub weekday_counts: [u64; 7],
    /// In order of first appearance in the event stream
    pub models: Vec<ModelUsage>,
    pub unpriced_models: BTreeSet<String>,
}

impl YearAggregate {
    pub fn max_daily_count(&self) -> u64 {
        self.daily.values().map(|d| d.count).max().unwrap_or(0)
    }

    /// Active dates, ascending
    pub fn active_dates(&self) -> Vec<NaiveDate> {
        self.daily.keys().copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreakStats {
    pub max_streak: u32,
    pub current_streak: u32,
    /// Dates of the first longest streak, ascending
    pub max_streak_days: Vec<NaiveDate>,
}

/// Aggregator for computing usage statistics
pub struct Aggregator;

impl Aggregator {
    /// Keep only events whose local calendar year is `year`
    pub fn filter_year(events: &[UsageEvent], year: i32) -> Vec<UsageEvent> {
        events
            .iter()
            .filter(|e| e.local_year() == year)
            .cloned()
            .collect()
    }

    /// Fold time-ordered, priced events into totals and calendar structures.
    /// Events without a cost count as unpriced and contribute zero cost.
    pub fn fold(events: &[UsageEvent]) -> YearAggregate {
        let mut aggregate = YearAggregate::default();
        let mut sessions: HashSet<&str> = HashSet::new();
        let mut model_index: HashMap<&str, usize> = HashMap::new();

        for event in events {
            let totals = &mut aggregate.totals;
            totals.turns += 1;
            totals.input_tokens = totals.input_tokens.saturating_add(event.input_tokens);
            totals.cached_input_tokens = totals
                .cached_input_tokens
                .saturating_add(event.cached_input_tokens);
            totals.output_tokens = totals.output_tokens.saturating_add(event.output_tokens);
            totals.reasoning_output_tokens = totals
                .reasoning_output_tokens
                .saturating_add(event.reasoning_output_tokens);
            totals.total_tokens = totals.total_tokens.saturating_add(event.total_tokens);
            if event.is_fallback_model {
                totals.fallback_events += 1;
            }
            sessions.insert(&event.session_id);

            let cost = match event.cost_usd {
                Some(c) => c,
                None => {
                    aggregate.unpriced_models.insert(event.model.clone());
                    0.0
                }
            };
            totals.cost_usd += cost;

            let day = aggregate.daily.entry(event.local_date()).or_default();
            day.count += 1;
            day.tokens = day.tokens.saturating_add(event.total_tokens);
            day.cost_usd += cost;

            aggregate.weekday_counts[event.local_weekday()] += 1;

            let idx = *model_index.entry(&event.model).or_insert_with(|| {
                aggregate.models.push(ModelUsage {
                    name: event.model.clone(),
                    ..ModelUsage::default()
                });
                aggregate.models.len() - 1
            });
            aggregate.models[idx].add(event, cost);
        }

        aggregate.totals.sessions = sessions.len() as u64;
        aggregate
    }

    /// Date with the strictly highest count; ties keep the earliest date
    pub fn most_active_day(daily: &BTreeMap<NaiveDate, DayActivity>) -> Option<(NaiveDate, u64)> {
        let mut best: Option<(NaiveDate, u64)> = None;
        for (date, day) in daily {
            match best {
                Some((_, max)) if day.count <= max => {}
                _ => best = Some((*date, day.count)),
            }
        }
        best.filter(|(_, count)| *count > 0)
    }

    /// Longest run of consecutive active dates (first one wins ties) and the
    /// streak ending today, or yesterday when today is inactive.
    pub fn calculate_streaks(active_dates: &[NaiveDate], today: NaiveDate) -> StreakStats {
        let mut dates = active_dates.to_vec();
        dates.sort();
        dates.dedup();

        if dates.is_empty() {
            return StreakStats::default();
        }

        let mut max_streak = 1u32;
        let mut streak = 1u32;
        let mut streak_start = 0usize;
        let mut max_start = 0usize;
        let mut max_end = 0usize;

        for i in 1..dates.len() {
            if (dates[i] - dates[i - 1]).num_days() == 1 {
                streak += 1;
                if streak > max_streak {
                    max_streak = streak;
                    max_start = streak_start;
                    max_end = i;
                }
            } else {
                streak = 1;
                streak_start = i;
            }
        }

        let active: HashSet<NaiveDate> = dates.iter().copied().collect();
        let yesterday = today - Duration::days(1);
        let current_streak = if active.contains(&today) {
            Self::count_streak_backwards(&active, today)
        } else if active.contains(&yesterday) {
            Self::count_streak_backwards(&active, yesterday)
        } else {
            0
        };

        StreakStats {
            max_streak,
            current_streak,
            max_streak_days: dates[max_start..=max_end].to_vec(),
        }
    }

    fn count_streak_backwards(active: &HashSet<NaiveDate>, start: NaiveDate) -> u32 {
        let mut streak = 1;
        let mut check = start;
        loop {
            check -= Duration::days(1);
            if active.contains(&check) {
                streak += 1;
            } else {
                return streak;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenDelta;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_event(
        session: &str,
        year: i32,
        month: u32,
        day: u32,
        model: &str,
        input: u64,
        output: u64,
        cost: Option<f64>,
    ) -> UsageEvent {
        let mut event = UsageEvent::new(
            session,
            Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap(),
            model,
            false,
            TokenDelta {
                input_tokens: input,
                cached_input_tokens: input / 2,
                output_tokens: output,
                reasoning_output_tokens: 0,
                total_tokens: input + output,
            },
        );
        event.cost_usd = cost;
        event
    }

    // ========== fold() tests ==========

    #[test]
    fn test_fold_empty() {
        let aggregate = Aggregator::fold(&[]);
        assert_eq!(aggregate.totals, UsageTotals::default());
        assert!(aggregate.daily.is_empty());
        assert_eq!(aggregate.weekday_counts, [0; 7]);
        assert_eq!(aggregate.max_daily_count(), 0);
    }

    #[test]
    fn test_fold_totals_and_sessions() {
        let events = vec![
            make_event("a", 2025, 1, 10, "gpt-5", 100, 50, Some(0.01)),
            make_event("a", 2025, 1, 10, "gpt-5", 200, 20, Some(0.02)),
            make_event("b", 2025, 1, 11, "o3", 10, 5, Some(0.005)),
        ];
        let aggregate = Aggregator::fold(&events);
        let totals = &aggregate.totals;

        assert_eq!(totals.sessions, 2);
        assert_eq!(totals.turns, 3);
        assert_eq!(totals.input_tokens, 310);
        assert_eq!(totals.cached_input_tokens, 50 + 100 + 5);
        assert_eq!(totals.output_tokens, 75);
        assert_eq!(totals.total_tokens, 385);
        assert!((totals.cost_usd - 0.035).abs() < 1e-12);
    }

    #[test]
    fn test_fold_daily_map() {
        let events = vec![
            make_event("a", 2025, 1, 10, "gpt-5", 100, 50, Some(0.01)),
            make_event("a", 2025, 1, 10, "gpt-5", 200, 20, Some(0.02)),
            make_event("b", 2025, 1, 11, "o3", 10, 5, Some(0.005)),
        ];
        let aggregate = Aggregator::fold(&events);

        assert_eq!(aggregate.daily.len(), 2);
        let first = events[0].local_date();
        assert_eq!(aggregate.daily[&first].count, 2);
        assert_eq!(aggregate.daily[&first].tokens, 370);
        assert!((aggregate.daily[&first].cost_usd - 0.03).abs() < 1e-12);
        assert_eq!(aggregate.max_daily_count(), 2);
    }

    #[test]
    fn test_fold_weekday_histogram_counts_events() {
        let events = vec![
            make_event("a", 2025, 1, 10, "gpt-5", 1, 1, Some(0.0)),
            make_event("a", 2025, 1, 10, "gpt-5", 1, 1, Some(0.0)),
            make_event("a", 2025, 1, 11, "gpt-5", 1, 1, Some(0.0)),
        ];
        let aggregate = Aggregator::fold(&events);

        assert_eq!(aggregate.weekday_counts.iter().sum::<u64>(), 3);
        assert_eq!(aggregate.weekday_counts[events[0].local_weekday()], 2);
    }

    #[test]
    fn test_fold_unpriced_models_and_fallback() {
        let mut fallback = make_event("b", 2025, 2, 1, "gpt-5", 10, 10, None);
        fallback.is_fallback_model = true;
        let events = vec![
            make_event("a", 2025, 2, 1, "mystery", 10, 10, None),
            fallback,
            make_event("a", 2025, 2, 2, "o3", 10, 10, Some(0.5)),
        ];
        let aggregate = Aggregator::fold(&events);

        let unpriced: Vec<&String> = aggregate.unpriced_models.iter().collect();
        assert_eq!(unpriced, vec!["gpt-5", "mystery"]);
        assert_eq!(aggregate.totals.fallback_events, 1);
        assert!((aggregate.totals.cost_usd - 0.5).abs() < 1e-12);

        let gpt5 = aggregate.models.iter().find(|m| m.name == "gpt-5").unwrap();
        assert!(gpt5.is_fallback);
    }

    #[test]
    fn test_fold_models_in_first_seen_order() {
        let events = vec![
            make_event("a", 2025, 1, 1, "o3", 1, 1, Some(0.0)),
            make_event("a", 2025, 1, 1, "gpt-5", 1, 1, Some(0.0)),
            make_event("a", 2025, 1, 2, "o3", 5, 5, Some(0.25)),
        ];
        let aggregate = Aggregator::fold(&events);

        assert_eq!(aggregate.models.len(), 2);
        assert_eq!(aggregate.models[0].name, "o3");
        assert_eq!(aggregate.models[0].count, 2);
        assert_eq!(aggregate.models[0].tokens, 12);
        assert_eq!(aggregate.models[0].input_tokens, 6);
        assert!((aggregate.models[0].cost_usd - 0.25).abs() < 1e-12);
        assert_eq!(aggregate.models[1].name, "gpt-5");
    }

    // ========== filter_year() tests ==========

    #[test]
    fn test_filter_year_excludes_neighbouring_years() {
        let events = vec![
            make_event("a", 2024, 7, 1, "gpt-5", 1, 1, None),
            make_event("a", 2025, 7, 1, "gpt-5", 1, 1, None),
            make_event("a", 2026, 7, 1, "gpt-5", 1, 1, None),
        ];
        let filtered = Aggregator::filter_year(&events, 2025);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].local_year(), 2025);
    }

    // ========== cache_hit_rate() tests ==========

    #[test]
    fn test_cache_hit_rate_zero_input() {
        let totals = UsageTotals {
            cached_input_tokens: 10,
            ..UsageTotals::default()
        };
        let rate = totals.cache_hit_rate();
        assert_eq!(rate, 0.0);
        assert!(!rate.is_nan());
    }

    #[test]
    fn test_cache_hit_rate_ratio() {
        let totals = UsageTotals {
            input_tokens: 400,
            cached_input_tokens: 100,
            ..UsageTotals::default()
        };
        assert!((totals.cache_hit_rate() - 0.25).abs() < f64::EPSILON);
    }

    // ========== most_active_day() tests ==========

    fn activity(count: u64) -> DayActivity {
        DayActivity {
            count,
            ..DayActivity::default()
        }
    }

    #[test]
    fn test_most_active_day_ties_keep_earliest() {
        let mut daily = BTreeMap::new();
        daily.insert(date(2025, 3, 5), activity(4));
        daily.insert(date(2025, 3, 1), activity(4));
        daily.insert(date(2025, 3, 3), activity(2));

        let best = Aggregator::most_active_day(&daily);
        assert_eq!(best, Some((date(2025, 3, 1), 4)));
    }

    #[test]
    fn test_most_active_day_strictly_highest() {
        let mut daily = BTreeMap::new();
        daily.insert(date(2025, 3, 1), activity(1));
        daily.insert(date(2025, 3, 9), activity(7));
        let best = Aggregator::most_active_day(&daily);
        assert_eq!(best, Some((date(2025, 3, 9), 7)));
    }

    #[test]
    fn test_most_active_day_empty() {
        assert_eq!(Aggregator::most_active_day(&BTreeMap::new()), None);
    }

    // ========== calculate_streaks() tests ==========

    #[test]
    fn test_max_streak_first_three_days() {
        let dates = [
            date(2024, 1, 1),
            date(2024, 1, 2),
            date(2024, 1, 3),
            date(2024, 1, 10),
        ];
        let stats = Aggregator::calculate_streaks(&dates, date(2024, 6, 1));

        assert_eq!(stats.max_streak, 3);
        assert_eq!(stats.max_streak_days, dates[..3].to_vec());
        assert_eq!(stats.current_streak, 0);
    }

    #[test]
    fn test_max_streak_first_found_wins_ties() {
        let dates = [
            date(2024, 2, 1),
            date(2024, 2, 2),
            date(2024, 2, 10),
            date(2024, 2, 11),
        ];
        let stats = Aggregator::calculate_streaks(&dates, date(2024, 6, 1));
        assert_eq!(stats.max_streak, 2);
        assert_eq!(stats.max_streak_days, dates[..2].to_vec());
    }

    #[test]
    fn test_later_longer_streak_replaces_earlier() {
        let dates = [
            date(2024, 1, 1),
            date(2024, 1, 2),
            date(2024, 1, 5),
            date(2024, 1, 6),
            date(2024, 1, 7),
        ];
        let stats = Aggregator::calculate_streaks(&dates, date(2024, 6, 1));

        assert_eq!(stats.max_streak, 3);
        assert_eq!(
            stats.max_streak_days,
            vec![date(2024, 1, 5), date(2024, 1, 6), date(2024, 1, 7)]
        );
        assert_eq!(stats.current_streak, 0);
    }

    #[test]
    fn test_single_day_streak() {
        let stats = Aggregator::calculate_streaks(&[date(2024, 5, 5)], date(2024, 6, 1));
        assert_eq!(stats.max_streak, 1);
        assert_eq!(stats.max_streak_days, vec![date(2024, 5, 5)]);
    }

    #[test]
    fn test_streaks_empty() {
        let stats = Aggregator::calculate_streaks(&[], date(2024, 6, 1));
        assert_eq!(stats, StreakStats::default());
    }

    #[test]
    fn test_streak_across_month_boundary() {
        let dates = [date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)];
        let stats = Aggregator::calculate_streaks(&dates, date(2024, 6, 1));
        assert_eq!(stats.max_streak, 3);
    }

    #[test]
    fn test_current_streak_includes_today() {
        let today = date(2024, 6, 10);
        let dates = [date(2024, 6, 8), date(2024, 6, 9), today];
        let stats = Aggregator::calculate_streaks(&dates, today);
        assert_eq!(stats.current_streak, 3);
    }

    #[test]
    fn test_current_streak_from_yesterday() {
        let today = date(2024, 6, 10);
        let dates = [date(2024, 6, 7), date(2024, 6, 8), date(2024, 6, 9)];
        let stats = Aggregator::calculate_streaks(&dates, today);
        assert_eq!(stats.current_streak, 3);
    }

    #[test]
    fn test_current_streak_zero_when_idle_two_days() {
        let today = date(2024, 6, 10);
        let dates = [date(2024, 6, 7), date(2024, 6, 8)];
        let stats = Aggregator::calculate_streaks(&dates, today);
        assert_eq!(stats.current_streak, 0);
    }
}
