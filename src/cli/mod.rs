use std::path::PathBuf;

use chrono::{Datelike, Local};
use clap::{Args, Parser, Subcommand};

use crate::config::{ConfigOverrides, RunSettings, WrappedConfig};
use crate::services::pricing::MatchKind;
use crate::services::{DataLoaderService, PricingLoader};

/// Yearly Codex CLI usage summary builder
#[derive(Parser)]
#[command(name = "codex-wrapped")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: ./codex-wrapped.config.yaml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the summary document (default)
    Build(BuildArgs),

    /// Show which rate entry a model name resolves to
    Price {
        /// Model name as it appears in session logs
        model: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Default, PartialEq)]
struct BuildArgs {
    /// Calendar year to summarize (default: from config, else current year)
    #[arg(long)]
    year: Option<i32>,

    /// Sessions root (default: <codex_home>/sessions)
    #[arg(long)]
    sessions_dir: Option<PathBuf>,

    /// Output document path
    #[arg(long)]
    output: Option<PathBuf>,

    /// Model assumed when a session never names one
    #[arg(long)]
    fallback_model: Option<String>,

    /// Skip LiteLLM and use the local pricing file only
    #[arg(long)]
    offline: bool,

    /// Print the document instead of writing it
    #[arg(long)]
    stdout: bool,
}

impl BuildArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            year: self.year,
            sessions_dir: self.sessions_dir.clone(),
            output: self.output.clone(),
            fallback_model: self.fallback_model.clone(),
            offline: self.offline,
        }
    }
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let config = WrappedConfig::load(self.config.as_deref())?;

        match self.command {
            None => run_build(&config, BuildArgs::default()),
            Some(Commands::Build(args)) => run_build(&config, args),
            Some(Commands::Price { model, json }) => run_price(&config, &model, json),
        }
    }
}

fn resolve_settings(
    config: &WrappedConfig,
    overrides: &ConfigOverrides,
) -> anyhow::Result<RunSettings> {
    Ok(config.resolve(overrides, Local::now().year())?)
}

fn run_build(config: &WrappedConfig, args: BuildArgs) -> anyhow::Result<()> {
    let settings = resolve_settings(config, &args.overrides())?;
    let output = settings.output.clone();
    let service = DataLoaderService::new(settings);
    let summary = service.build()?;

    if args.stdout {
        println!("{}", DataLoaderService::to_json(&summary)?);
    } else {
        DataLoaderService::write_output(&summary, &output)?;
        eprintln!(
            "Wrote {} ({} sessions, {} turns, ${:.2})",
            output.display(),
            summary.summary.sessions,
            summary.summary.turns,
            summary.summary.cost_usd
        );
    }
    Ok(())
}

fn run_price(config: &WrappedConfig, model: &str, json: bool) -> anyhow::Result<()> {
    let settings = resolve_settings(config, &ConfigOverrides::default())?;
    let state = PricingLoader::new(
        settings.pricing_source,
        settings.pricing_url.clone(),
        settings.pricing_path.clone(),
    )
    .load();
    let resolved = state.table.resolve(model);

    if json {
        let value = match &resolved {
            Some(m) => serde_json::json!({
                "model": model,
                "key": m.key,
                "match": match_label(m.kind),
                "pricing": m.pricing,
                "pricingSource": state.source,
            }),
            None => serde_json::json!({
                "model": model,
                "key": null,
                "pricingSource": state.source,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match resolved {
        Some(m) => {
            println!(
                "{} -> {} ({} match, source {})",
                model,
                m.key,
                match_label(m.kind),
                state.source
            );
            println!(
                "  input {:?}  cached {:?}  output {:?} per token",
                m.pricing.input_cost_per_token,
                m.pricing.cache_read_input_token_cost,
                m.pricing.output_cost_per_token
            );
        }
        None => println!("{}: no pricing found (source {})", model, state.source),
    }
    Ok(())
}

fn match_label(kind: MatchKind) -> &'static str {
    match kind {
        MatchKind::Candidate => "candidate",
        MatchKind::Substring => "substring",
    }
}
