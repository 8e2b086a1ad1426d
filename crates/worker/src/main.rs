use clap::{Parser, ValueEnum};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use churnwatch_core::batch::{BatchOptions, BatchResult, BatchSummary};
use churnwatch_core::domain::RiskTier;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod input;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "churnwatch_worker")]
struct Args {
    /// Evaluation requests as a JSON array or JSON Lines.
    #[arg(long)]
    input: PathBuf,

    /// Write output here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Only emit customers in this tier (low, moderate, high).
    #[arg(long, value_parser = parse_tier)]
    tier: Option<RiskTier>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Rule table JSON; overrides CHURNWATCH_RULES_PATH.
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Abort on the first invalid record.
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Debug, Serialize)]
struct BatchDocument<'a> {
    generated_at: DateTime<Utc>,
    #[serde(flatten)]
    result: &'a BatchResult,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = churnwatch_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(&settings, &args) {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(input = %args.input.display(), error = %err, "batch run failed");
        return Err(err);
    }
    Ok(())
}

fn run(settings: &churnwatch_core::config::Settings, args: &Args) -> anyhow::Result<()> {
    let engine = settings.build_engine(args.rules.as_deref())?;
    let records = input::load_records(&args.input)?;

    let opts = BatchOptions {
        fail_fast: args.fail_fast,
        ..BatchOptions::from_env()
    };

    let mut result = churnwatch_core::batch::evaluate_batch(&engine, records, &opts)?;
    if let Some(tier) = args.tier {
        result.retain_tier(tier);
    }

    let rendered = render(&result, args.format, Utc::now())?;
    match &args.output {
        Some(path) => write_output(path, &rendered)?,
        None => println!("{rendered}"),
    }

    eprintln!("{}", summary_line(&result.summary));
    Ok(())
}

fn render(result: &BatchResult, format: OutputFormat, generated_at: DateTime<Utc>) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            let doc = BatchDocument { generated_at, result };
            serde_json::to_string_pretty(&doc).context("serialize batch output failed")
        }
        OutputFormat::Text => {
            let blocks: Vec<String> = result
                .entries
                .iter()
                .filter_map(|entry| {
                    entry.report.as_ref().map(|report| {
                        churnwatch_core::report::format_report(report, entry.customer_id.as_deref())
                    })
                })
                .collect();
            Ok(blocks.join("\n\n"))
        }
    }
}

fn write_output(path: &Path, rendered: &str) -> anyhow::Result<()> {
    std::fs::write(path, rendered).with_context(|| format!("write output {} failed", path.display()))?;
    tracing::info!(path = %path.display(), "wrote batch output");
    Ok(())
}

fn summary_line(summary: &BatchSummary) -> String {
    format!(
        "total={} evaluated={} failed={} churn={} high={} moderate={} low={}",
        summary.total,
        summary.evaluated,
        summary.failed,
        summary.churn_predicted,
        summary.count(RiskTier::High),
        summary.count(RiskTier::Moderate),
        summary.count(RiskTier::Low),
    )
}

fn parse_tier(s: &str) -> Result<RiskTier, String> {
    RiskTier::parse(s).ok_or_else(|| format!("unknown tier `{s}` (expected low, moderate or high)"))
}

fn init_sentry(settings: &churnwatch_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
