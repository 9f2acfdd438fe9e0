//! draftfix - article artifact repair and publish pipeline
//!
//! ## Commands
//!
//! - `analyze`: Report formatting artifacts in a text
//! - `evaluate`: Run the publish gate on a text
//! - `restore`: Repair a text through the escalating rewrite attempts
//! - `run`: Process a batch of drafts end to end
//! - `ledger`: Inspect the publication ledger
//! - `policy`: Print the effective attempt table

mod drafts;
mod publisher;
mod rewrite_client;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use draftfix_core::{
    write_batch_report, AttemptExecutor, CancelSignal, DraftfixError, EscalationOrchestrator,
    IssueAnalyzer, LedgerBackend, PipelineConfig, PipelineContext, Publisher, QualityGate,
};
use draftfix_ledger::fakes::MemoryPublishLedger;
use draftfix_ledger::{identity_of, FileLedger, PublishLedger, SurrealPublishLedger};
use tracing::{info, warn, Level};

use crate::publisher::{DirectoryPublisher, WebhookPublisher};
use crate::rewrite_client::HttpRewriter;

#[derive(Parser)]
#[command(name = "draftfix")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Repair article drafts and publish each one at most once", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Pipeline configuration file (TOML); defaults to $DRAFTFIX_CONFIG
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report formatting artifacts in a text
    Analyze {
        /// Text file to analyze ("-" for stdin)
        #[arg(default_value = "-")]
        input: PathBuf,
    },

    /// Run the publish gate on a text
    Evaluate {
        /// Text file to evaluate ("-" for stdin)
        #[arg(default_value = "-")]
        input: PathBuf,
    },

    /// Repair a text through the escalating rewrite attempts
    Restore {
        /// Text file to restore ("-" for stdin)
        #[arg(default_value = "-")]
        input: PathBuf,

        /// Write the restored text here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Process a batch of drafts: restore, gate, dedup, publish
    Run {
        /// Draft JSON file or directory of draft files
        drafts: PathBuf,

        /// Write the batch report under this directory
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },

    /// Inspect the publication ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },

    /// Print the effective attempt table
    Policy,
}

#[derive(Subcommand)]
enum LedgerAction {
    /// Check whether a title has already been published
    Has {
        title: String,

        /// Publication date, when identities are date-scoped (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// List published entries
    List {
        /// Maximum number of entries to show (newest first)
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    draftfix_core::init_tracing(cli.json, level);

    let config =
        PipelineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Analyze { input } => cmd_analyze(&config, &input),
        Commands::Evaluate { input } => cmd_evaluate(&config, &input),
        Commands::Restore { input, output } => {
            cmd_restore(&config, &input, output.as_deref()).await
        }
        Commands::Run { drafts, report_dir } => {
            cmd_run(&config, &drafts, report_dir.as_deref()).await
        }
        Commands::Ledger { action } => match action {
            LedgerAction::Has { title, date } => cmd_ledger_has(&config, &title, date).await,
            LedgerAction::List { limit } => cmd_ledger_list(&config, limit).await,
        },
        Commands::Policy => cmd_policy(&config),
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn analyzer(config: &PipelineConfig) -> Arc<IssueAnalyzer> {
    Arc::new(IssueAnalyzer::standard().with_thresholds(config.severity))
}

/// Cancel signal raised on Ctrl-C.
fn ctrl_c_signal() -> CancelSignal {
    let (handle, signal) = CancelSignal::pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight work");
            handle.cancel();
        }
    });
    signal
}

async fn open_ledger(config: &PipelineConfig) -> Result<Arc<dyn PublishLedger>> {
    let ledger: Arc<dyn PublishLedger> = match config.ledger.backend {
        LedgerBackend::File => Arc::new(FileLedger::open(&config.ledger.path).with_context(
            || format!("Failed to open ledger {}", config.ledger.path.display()),
        )?),
        LedgerBackend::Surreal => Arc::new(
            SurrealPublishLedger::connect(&config.ledger.url)
                .await
                .with_context(|| format!("Failed to connect to ledger {}", config.ledger.url))?,
        ),
        LedgerBackend::Memory => {
            warn!("memory ledger selected; publications will not be remembered");
            Arc::new(MemoryPublishLedger::new())
        }
    };
    Ok(ledger)
}

fn open_publisher(config: &PipelineConfig) -> Arc<dyn Publisher> {
    match &config.publish.webhook_url {
        Some(url) => {
            info!(url = %url, "publishing to webhook");
            Arc::new(WebhookPublisher::new(url.clone()))
        }
        None => {
            info!(dir = %config.publish.directory.display(), "publishing to directory");
            Arc::new(DirectoryPublisher::new(config.publish.directory.clone()))
        }
    }
}

/// Report formatting artifacts
fn cmd_analyze(config: &PipelineConfig, input: &Path) -> Result<()> {
    let text = read_input(input)?;
    let report = analyzer(config).analyze(&text);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Run the publish gate
fn cmd_evaluate(config: &PipelineConfig, input: &Path) -> Result<()> {
    let text = read_input(input)?;
    let verdict = QualityGate::new(analyzer(config), config.gate).evaluate(&text);
    println!("{}", serde_json::to_string_pretty(&verdict)?);

    if let Some(reason) = verdict.rejection_reason() {
        anyhow::bail!("not publishable: {reason}");
    }
    Ok(())
}

/// Restore a single text
async fn cmd_restore(config: &PipelineConfig, input: &Path, output: Option<&Path>) -> Result<()> {
    let text = read_input(input)?;
    let orchestrator = EscalationOrchestrator::new(
        Arc::new(config.restoration.attempts.clone()),
        AttemptExecutor::new(
            Arc::new(HttpRewriter::from_config(&config.rewrite)),
            config.restoration.chunk_concurrency,
        ),
        analyzer(config),
    );

    let (report, result) = orchestrator
        .restore_if_needed(&text, &ctrl_c_signal())
        .await;

    info!(
        severity = ?report.severity,
        issues = report.issues.len(),
        skipped = result.skipped,
        accepted_attempt = ?result.accepted_attempt(),
        used_fallback = result.used_fallback,
        cancelled = result.cancelled,
        "restoration finished"
    );

    match output {
        Some(path) => std::fs::write(path, &result.final_text)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{}", result.final_text),
    }
    Ok(())
}

/// Process a batch of drafts
async fn cmd_run(config: &PipelineConfig, drafts: &Path, report_dir: Option<&Path>) -> Result<()> {
    let drafts = drafts::load_drafts(drafts)?;
    info!(drafts = drafts.len(), "batch loaded");

    let ledger = open_ledger(config).await?;
    let ctx = Arc::new(
        PipelineContext::new(
            Arc::new(HttpRewriter::from_config(&config.rewrite)),
            open_publisher(config),
            ledger,
        )
        .with_policy(config.restoration.attempts.clone())
        .with_analyzer(IssueAnalyzer::standard().with_thresholds(config.severity))
        .with_gate_thresholds(config.gate)
        .with_settings(config.settings()),
    );

    // An aborted batch still reports what it decided before the fault.
    let (report, fault) = match ctx.run_batch(drafts, ctrl_c_signal()).await {
        Ok(report) => (report, None),
        Err(DraftfixError::BatchAborted { report, source }) => (*report, Some(*source)),
        Err(e) => return Err(e).context("Batch aborted"),
    };

    println!("run {}", report.run_id);
    println!("  published:         {}", report.counts.published);
    println!("  duplicate skipped: {}", report.counts.duplicate_skipped);
    println!("  gate rejected:     {}", report.counts.gate_rejected);
    println!("  publish failed:    {}", report.counts.publish_failed);
    if report.cancelled || fault.is_some() {
        println!("  not started:       {}", report.counts.not_started);
    }
    for faulted in &report.faulted {
        println!("  faulted:           {} ({})", faulted.draft_id, faulted.error);
    }

    if let Some(dir) = report_dir {
        let path = write_batch_report(&report, dir).context("Failed to write batch report")?;
        println!("report: {}", path.display());
    }

    match fault {
        Some(e) => Err(anyhow::Error::new(e).context("Batch aborted")),
        None => Ok(()),
    }
}

async fn cmd_ledger_has(
    config: &PipelineConfig,
    title: &str,
    date: Option<NaiveDate>,
) -> Result<()> {
    let ledger = open_ledger(config).await?;
    let identity = identity_of(title, date);

    match ledger.get(&identity).await? {
        Some(entry) => println!(
            "published {} -> {} ({})",
            entry.published_at.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.destination_ref,
            identity
        ),
        None => println!("not published ({identity})"),
    }
    Ok(())
}

async fn cmd_ledger_list(config: &PipelineConfig, limit: usize) -> Result<()> {
    let ledger = open_ledger(config).await?;
    let mut entries = ledger.entries().await?;

    if entries.is_empty() {
        println!("Ledger is empty");
        return Ok(());
    }

    entries.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    for entry in entries.iter().take(limit) {
        println!(
            "{}  {}  {}",
            entry.published_at.format("%Y-%m-%d %H:%M:%S"),
            entry.title,
            entry.destination_ref
        );
    }
    Ok(())
}

/// Print the effective attempt table
fn cmd_policy(config: &PipelineConfig) -> Result<()> {
    for (i, attempt) in config.restoration.attempts.iter().enumerate() {
        println!(
            "{i}: tier={} chunk_max_chars={} min_accept_ratio={:.2} strictness={} timeout={}ms",
            attempt.model_tier,
            attempt.chunk_max_chars,
            attempt.min_accept_ratio,
            attempt.prompt_strictness,
            attempt.timeout_ms
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_accepts_report_dir() {
        let cli = Cli::try_parse_from([
            "draftfix",
            "--json",
            "run",
            "drafts.json",
            "--report-dir",
            "out",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Run { drafts, report_dir } => {
                assert_eq!(drafts, PathBuf::from("drafts.json"));
                assert_eq!(report_dir, Some(PathBuf::from("out")));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn ledger_has_parses_date() {
        let cli = Cli::try_parse_from([
            "draftfix",
            "ledger",
            "has",
            "Harbour Vote",
            "--date",
            "2026-03-01",
        ])
        .unwrap();
        match cli.command {
            Commands::Ledger {
                action: LedgerAction::Has { title, date },
            } => {
                assert_eq!(title, "Harbour Vote");
                assert_eq!(date, NaiveDate::from_ymd_opt(2026, 3, 1));
            }
            _ => panic!("expected ledger has"),
        }
    }

    #[tokio::test]
    async fn file_ledger_is_opened_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.ledger.path = dir.path().join("published.log");

        let ledger = open_ledger(&config).await.unwrap();
        assert!(ledger.entries().await.unwrap().is_empty());
    }
}
