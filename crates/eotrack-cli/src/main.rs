use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use eotrack_client::{AnthropicSummarizer, FeedScraper, ReqwestFetcher};
use eotrack_core::pipeline::PipelineService;
use eotrack_core::publish::{self, PublishOutcome};
use eotrack_core::quality::QualityReport;
use eotrack_core::summarize::SummarizeService;
use eotrack_core::traits::{DatasetStore, Summarizer};
use eotrack_core::{AppError, Snapshot};
use eotrack_store::{CsvDatasetStore, CsvSnapshotStore, PublicCsvTarget};

const DEFAULT_DATA_FILE: &str = "data/presidential_actions_with_content.csv";
const DEFAULT_OUTPUT_DIR: &str = "output";
const DEFAULT_PUBLIC_FILE: &str = "public/executive_orders_latest.csv";
const DEFAULT_NOTIFY_FILE: &str = "output/notification.json";
const DEFAULT_REPORT_FILE: &str = "output/quality_report.txt";
const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com/v1";

#[derive(Parser)]
#[command(name = "eotrack", version, about = "Executive order tracking pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: fetch, quality-gate, commit, summarize, publish
    Run(RunArgs),

    /// Run the data quality checks against a dataset file
    Check {
        /// Dataset CSV to check
        #[arg(short, long, default_value = DEFAULT_DATA_FILE)]
        file: PathBuf,

        /// Where the report artifact is written
        #[arg(long, default_value = DEFAULT_REPORT_FILE)]
        report_file: PathBuf,
    },

    /// Summarize executive orders not present in the previous snapshot
    Summarize {
        /// Input raw dataset CSV
        #[arg(long)]
        input: PathBuf,

        /// Previously summarized snapshot CSV; omit to process everything
        #[arg(long)]
        previous: Option<PathBuf>,

        /// Directory to write the new snapshot into
        #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// Anthropic API key
        #[arg(long, env = "EOTRACK_API_KEY")]
        api_key: String,

        /// Anthropic-compatible API base URL
        #[arg(long, env = "EOTRACK_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
        base_url: String,

        /// Model override
        #[arg(long, env = "EOTRACK_MODEL")]
        model: Option<String>,
    },

    /// Copy the latest snapshot to the public path and emit the delta
    Publish {
        /// Directory holding snapshot artifacts
        #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// Fixed public path read by the presentation layer
        #[arg(long, default_value = DEFAULT_PUBLIC_FILE)]
        public_file: PathBuf,

        /// Where the notification payload is written when there is a delta
        #[arg(long, default_value = DEFAULT_NOTIFY_FILE)]
        notify_file: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Raw dataset CSV path
    #[arg(long, env = "EOTRACK_DATA_FILE", default_value = DEFAULT_DATA_FILE)]
    data_file: PathBuf,

    /// Directory for snapshot artifacts
    #[arg(long, env = "EOTRACK_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Fixed public path read by the presentation layer
    #[arg(long, env = "EOTRACK_PUBLIC_FILE", default_value = DEFAULT_PUBLIC_FILE)]
    public_file: PathBuf,

    /// Where the notification payload is written when there is a delta
    #[arg(long, env = "EOTRACK_NOTIFY_FILE", default_value = DEFAULT_NOTIFY_FILE)]
    notify_file: PathBuf,

    /// Where the quality report artifact is written
    #[arg(long, env = "EOTRACK_REPORT_FILE", default_value = DEFAULT_REPORT_FILE)]
    report_file: PathBuf,

    /// Listing URL of the tracked feed
    #[arg(long, env = "EOTRACK_FEED_URL", default_value = eotrack_client::scrape::BASE_URL)]
    feed_url: String,

    /// Anthropic API key
    #[arg(long, env = "EOTRACK_API_KEY")]
    api_key: String,

    /// Anthropic-compatible API base URL
    #[arg(long, env = "EOTRACK_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    base_url: String,

    /// Model override (defaults to the client's pinned model)
    #[arg(long, env = "EOTRACK_MODEL")]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing. Stdout is reserved for contract lines, so logs go
    // to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("eotrack=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            cmd_run(&args).await?;
        }
        Commands::Check { file, report_file } => {
            let passed = cmd_check(&file, &report_file)?;
            if !passed {
                // A failed gate is a reportable outcome, not a crash.
                std::process::exit(1);
            }
        }
        Commands::Summarize {
            input,
            previous,
            output_dir,
            api_key,
            base_url,
            model,
        } => {
            let summarizer = build_summarizer(&api_key, &base_url, model.as_deref())?;
            cmd_summarize(&input, previous.as_deref(), &output_dir, summarizer).await?;
        }
        Commands::Publish {
            output_dir,
            public_file,
            notify_file,
        } => {
            cmd_publish(&output_dir, &public_file, &notify_file)?;
        }
    }

    Ok(())
}

fn build_summarizer(
    api_key: &str,
    base_url: &str,
    model: Option<&str>,
) -> Result<AnthropicSummarizer> {
    let summarizer = AnthropicSummarizer::with_base_url(api_key, base_url)
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(match model {
        Some(model) => summarizer.with_model(model),
        None => summarizer,
    })
}

async fn cmd_run(args: &RunArgs) -> Result<()> {
    let dataset = CsvDatasetStore::new(&args.data_file);
    let snapshots = CsvSnapshotStore::new(&args.output_dir);
    let public = PublicCsvTarget::new(&args.public_file);

    // 1. Fetch candidates, skipping links already persisted.
    let known: HashSet<String> = dataset
        .load()
        .map_err(|e| anyhow::anyhow!(e))?
        .records
        .iter()
        .filter_map(|r| r.key().map(str::to_string))
        .collect();

    let fetcher = ReqwestFetcher::new().map_err(|e| anyhow::anyhow!(e))?;
    let scraper = FeedScraper::new(fetcher).with_base_url(args.feed_url.as_str());
    let candidates = scraper
        .collect(&known)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    // 2-6. Merge, gate, commit, summarize, publish.
    let summarizer = build_summarizer(&args.api_key, &args.base_url, args.model.as_deref())?;
    let pipeline = PipelineService::new(
        dataset,
        snapshots,
        public,
        SummarizeService::new(summarizer),
    );
    let report = pipeline
        .run(candidates, Utc::now())
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    write_report_artifact(&report.quality, &args.report_file)?;

    if !report.gate_passed() {
        eprintln!("{}", report.quality.render());
        std::process::exit(1);
    }

    if let Some(summarize) = &report.summarize {
        println!("{}", summarize.status_line());
    }
    if let Some(publish) = &report.publish {
        write_notification(publish, &args.notify_file)?;
    }
    if let Some(error) = &report.publish_error {
        eprintln!("Publish step failed: {error}");
        std::process::exit(1);
    }

    Ok(())
}

/// Runs the five quality checks, always writing the report artifact.
/// Returns whether the gate passed.
fn cmd_check(file: &Path, report_file: &Path) -> Result<bool> {
    let store = CsvDatasetStore::new(file);
    let loaded = store.load().map_err(|e| anyhow::anyhow!(e))?;

    let report = QualityReport::evaluate(&loaded.records, Utc::now().date_naive());
    write_report_artifact(&report, report_file)?;
    eprintln!("{}", report.render());

    Ok(report.gate_passes())
}

async fn cmd_summarize<M: Summarizer>(
    input: &Path,
    previous: Option<&Path>,
    output_dir: &Path,
    summarizer: M,
) -> Result<()> {
    let dataset = CsvDatasetStore::new(input)
        .load()
        .map_err(|e| anyhow::anyhow!(e))?;
    let store = CsvSnapshotStore::new(output_dir);

    let previous = match previous {
        Some(path) => Some(Snapshot {
            path: path.to_path_buf(),
            records: store.read(path).map_err(|e| anyhow::anyhow!(e))?,
        }),
        None => None,
    };

    let service = SummarizeService::new(summarizer);
    let outcome = service
        .run(&dataset.records, previous.as_ref(), &store, Utc::now())
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    println!("{}", outcome.status_line());
    tracing::info!(
        snapshot = %outcome.snapshot_path.display(),
        total = outcome.total_records,
        summarized = outcome.summarized,
        skipped = outcome.skipped,
        "Summarization complete"
    );
    Ok(())
}

fn cmd_publish(output_dir: &Path, public_file: &Path, notify_file: &Path) -> Result<()> {
    let snapshots = CsvSnapshotStore::new(output_dir);
    let target = PublicCsvTarget::new(public_file);

    let outcome = match publish::publish(&snapshots, &target) {
        Ok(outcome) => outcome,
        Err(AppError::NoSnapshot) => {
            anyhow::bail!("no snapshot exists in {}; run summarize first", output_dir.display());
        }
        Err(e) => return Err(anyhow::anyhow!(e)),
    };

    write_notification(&outcome, notify_file)?;
    Ok(())
}

fn write_report_artifact(report: &QualityReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, report.render())
        .with_context(|| format!("Failed to write quality report to {}", path.display()))?;
    tracing::info!(path = %path.display(), "Wrote quality report");
    Ok(())
}

/// Write the notification payload when the delta is non-empty; an empty
/// delta emits no notification.
fn write_notification(outcome: &PublishOutcome, path: &Path) -> Result<()> {
    let Some(payload) = outcome.notification() else {
        tracing::info!("No newly published records; skipping notification");
        return Ok(());
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&payload)?)
        .with_context(|| format!("Failed to write notification to {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        new_records = payload.new_eos.len(),
        "Wrote notification payload"
    );
    Ok(())
}
