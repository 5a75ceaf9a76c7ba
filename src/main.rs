//! CLI entry point for the FTE digest bot.
//!
//! `run` starts the Telegram bot; `extract` and `summarize` work on local
//! spreadsheet files without touching the network.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fte_digest::accumulator::Accumulator;
use fte_digest::config::BotConfig;
use fte_digest::extract::{SheetLayout, extract_path};
use fte_digest::scheduler::run_weekly;
use fte_digest::summary::summarize;
use fte_digest::transport::{TelegramClient, poll_documents};
use fte_digest::worker::Worker;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Instrument, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const EVENT_QUEUE_DEPTH: usize = 64;

#[derive(Parser)]
#[command(name = "fte_digest")]
#[command(about = "Collects weekly FTE spreadsheets over Telegram and posts a summary", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot: accept submissions and post the weekly summary
    Run {
        #[command(flatten)]
        config: BotConfig,
    },
    /// Print the rows extracted from a spreadsheet
    Extract {
        /// Spreadsheet to read
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Build the summary report for a set of spreadsheets and print it
    Summarize {
        /// Spreadsheets to include
        #[arg(value_name = "FILES", num_args = 1..)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/fte_digest.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("fte_digest.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run_bot(config).await?,
        Commands::Extract { file } => {
            let batch = extract_path(&file, &SheetLayout::default())
                .with_context(|| format!("reading {}", file.display()))?;
            info!(
                rows = batch.rows.len(),
                dropped = batch.dropped,
                "{}",
                serde_json::to_string_pretty(&batch.rows)?
            );
        }
        Commands::Summarize { files } => {
            let layout = SheetLayout::default();
            let mut accumulator = Accumulator::new();

            for file in &files {
                let batch = extract_path(file, &layout)
                    .with_context(|| format!("reading {}", file.display()))?;
                info!(
                    file = %file.display(),
                    rows = batch.rows.len(),
                    dropped = batch.dropped,
                    "File ingested"
                );
                if !batch.is_empty() {
                    accumulator.append(batch);
                }
            }

            println!("{}", summarize(&accumulator.drain_all()));
        }
    }

    Ok(())
}

/// Wires the poller, the weekly scheduler and the worker onto one event
/// queue and runs until Ctrl+C.
async fn run_bot(config: BotConfig) -> Result<()> {
    info!(?config, "Starting bot");

    std::fs::create_dir_all(&config.upload_folder)
        .with_context(|| format!("creating {}", config.upload_folder.display()))?;
    if let Some(id) = config.secondary_user_id {
        info!(secondary_user_id = id, "Secondary contact configured");
    }

    let bot = TelegramClient::new(&config.token)?;
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

    let poller = tokio::spawn(
        poll_documents(bot.clone(), tx.clone(), config.poll_timeout_secs)
            .instrument(tracing::info_span!("poller")),
    );
    let scheduler = tokio::spawn(
        run_weekly(
            config.deadline(),
            Duration::from_secs(config.tick_interval_secs),
            tx,
        )
        .instrument(tracing::info_span!("scheduler")),
    );

    let worker = Worker::new(bot, config.worker_settings());

    tokio::select! {
        _ = worker.run(rx) => warn!("Worker stopped"),
        result = tokio::signal::ctrl_c() => {
            result.context("listening for Ctrl+C")?;
            info!("Ctrl+C received, shutting down");
        }
    }

    poller.abort();
    scheduler.abort();
    Ok(())
}
