//! Pipeline orchestration: read logs, price, aggregate, assemble, write

use std::path::Path;

use chrono::{DateTime, Local, Utc};
use tracing::{debug, info, warn};

use crate::config::RunSettings;
use crate::parsers::{CodexParser, SessionLogParser};
use crate::services::aggregator::Aggregator;
use crate::services::atomic_write::write_atomic;
use crate::services::pricing::PricingService;
use crate::services::pricing_loader::PricingLoader;
use crate::services::summary::{SummaryAssembler, SummaryContext};
use crate::types::{AggregateSummary, Result, WrappedError};

/// Runs one batch over the sessions directory
pub struct DataLoaderService {
    settings: RunSettings,
    pricing_loader: PricingLoader,
}

impl DataLoaderService {
    pub fn new(settings: RunSettings) -> Self {
        let pricing_loader = PricingLoader::new(
            settings.pricing_source,
            settings.pricing_url.clone(),
            settings.pricing_path.clone(),
        );
        Self {
            settings,
            pricing_loader,
        }
    }

    /// Replace the rate-table loader (e.g. a different cache location)
    pub fn with_pricing_loader(mut self, pricing_loader: PricingLoader) -> Self {
        self.pricing_loader = pricing_loader;
        self
    }

    /// Build the summary as of now
    pub fn build(&self) -> Result<AggregateSummary> {
        self.build_at(Utc::now())
    }

    /// Build the summary with `now` as the generation time and streak anchor
    pub fn build_at(&self, now: DateTime<Utc>) -> Result<AggregateSummary> {
        let settings = &self.settings;

        if !settings.sessions_dir.is_dir() {
            warn!(
                path = %settings.sessions_dir.display(),
                "sessions directory not found"
            );
        }

        let parser = CodexParser::with_data_dir(settings.sessions_dir.clone())
            .with_fallback_model(settings.fallback_model.clone());
        let events = parser.parse_all();
        debug!(events = events.len(), "parsed usage events");

        // events are sorted, so the first one is the earliest across all years
        let first_event = events.first().map(|e| e.timestamp);
        let year_events = Aggregator::filter_year(&events, settings.year);

        let pricing = self.pricing_loader.load();
        let pricing_service = PricingService::new(pricing.table, settings.tiered_threshold);
        debug!(
            models = pricing_service.model_count(),
            source = %pricing.source,
            "pricing table ready"
        );

        let priced = pricing_service.apply_pricing(year_events);
        let aggregate = Aggregator::fold(&priced);

        if aggregate.totals.turns == 0 {
            warn!(
                year = settings.year,
                "No Codex events found for the requested year."
            );
        } else {
            info!(
                year = settings.year,
                sessions = aggregate.totals.sessions,
                turns = aggregate.totals.turns,
                "aggregated usage"
            );
        }

        let context = SummaryContext {
            year: settings.year,
            generated_at: now,
            today: now.with_timezone(&Local).date_naive(),
            config: settings.dashboard.clone(),
            first_event,
            sessions_dir: settings.sessions_dir.display().to_string(),
            pricing_source: pricing.source,
            pricing_url: pricing.url,
            pricing_fetch_error: pricing.fetch_error,
        };

        Ok(SummaryAssembler::assemble(&aggregate, context))
    }

    /// Pretty JSON of the document
    pub fn to_json(summary: &AggregateSummary) -> Result<String> {
        serde_json::to_string_pretty(summary)
            .map_err(|e| WrappedError::Output(format!("failed to serialize summary: {}", e)))
    }

    /// Atomically write the document to `path`
    pub fn write_output(summary: &AggregateSummary, path: &Path) -> Result<()> {
        let json = Self::to_json(summary)?;
        write_atomic(path, json.as_bytes()).map_err(|e| {
            WrappedError::Output(format!("failed to write {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "wrote summary");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigOverrides, WrappedConfig};
    use crate::services::pricing_loader::PricingSource;
    use chrono::TimeZone;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn fixtures_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("codex")
    }

    fn settings(dir: &TempDir, sessions_dir: PathBuf, year: i32) -> RunSettings {
        let mut settings = WrappedConfig::default()
            .resolve(
                &ConfigOverrides {
                    year: Some(year),
                    sessions_dir: Some(sessions_dir),
                    output: Some(dir.path().join("out").join("data.json")),
                    fallback_model: None,
                    offline: true,
                },
                year,
            )
            .unwrap();
        settings.pricing_path = dir.path().join("pricing.yaml");
        settings
    }

    fn service(settings: RunSettings) -> DataLoaderService {
        let loader = PricingLoader::new(
            PricingSource::Yaml,
            settings.pricing_url.clone(),
            settings.pricing_path.clone(),
        )
        .with_cache_path(None);
        DataLoaderService::new(settings).with_pricing_loader(loader)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_build_fixtures() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("pricing.yaml"),
            "models:\n  gpt-5:\n    input_cost_per_mtoken: 1.25\n    output_cost_per_mtoken: 10\n",
        )
        .unwrap();

        let summary = service(settings(&dir, fixtures_root(), 2025))
            .build_at(now())
            .unwrap();

        assert_eq!(summary.year, 2025);
        assert_eq!(summary.summary.turns, 9);
        assert_eq!(summary.summary.sessions, 4);
        assert!(summary.summary.cost_usd > 0.0);
        assert_eq!(summary.notes.pricing_source, "yaml");
        assert!(summary.notes.pricing_fetch_error.is_none());
        // gpt-5-codex resolves through the built-in alias
        assert!(!summary
            .notes
            .unpriced_models
            .contains(&"gpt-5-codex".to_string()));
        assert!(summary.models.len() <= 5);
    }

    #[test]
    fn test_build_other_year_is_empty() {
        let dir = TempDir::new().unwrap();
        let summary = service(settings(&dir, fixtures_root(), 2019))
            .build_at(now())
            .unwrap();

        assert_eq!(summary.summary.turns, 0);
        assert!(summary.summary.most_active_day.is_none());
        // first session date looks at every year
        assert!(summary.summary.first_session_date.is_some());
    }

    #[test]
    fn test_missing_sessions_dir_yields_empty_summary() {
        let dir = TempDir::new().unwrap();
        let summary = service(settings(&dir, dir.path().join("nowhere"), 2025))
            .build_at(now())
            .unwrap();

        assert_eq!(summary.summary.sessions, 0);
        assert!(summary.summary.first_session_date.is_none());
        assert!(summary.models.is_empty());
    }

    #[test]
    fn test_write_output_creates_file() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, dir.path().join("nowhere"), 2025);
        let output = settings.output.clone();
        let summary = service(settings).build_at(now()).unwrap();

        DataLoaderService::write_output(&summary, &output).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["year"], 2025);
        assert!(written["summary"]["costUSD"].is_number());
    }

    #[test]
    fn test_write_output_failure_is_output_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let summary = service(settings(&dir, dir.path().join("nowhere"), 2025))
            .build_at(now())
            .unwrap();

        let target = blocker.join("data.json");
        let err = DataLoaderService::write_output(&summary, &target).unwrap_err();
        assert!(matches!(err, WrappedError::Output(_)));
    }
}
