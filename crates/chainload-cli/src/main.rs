//! Chainload CLI
//!
//! Runs a configured API workflow under load and prints the statistics report.

mod export;
mod loader;

use anyhow::{Context, Result};
use chainload_core::{FeedMode, RunConfig};
use chainload_engine::Runner;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log lines queued for the writer thread before new ones are dropped
const LOG_QUEUE_LINES: usize = 1000;

#[derive(Parser, Debug)]
#[command(name = "chainload")]
#[command(version)]
#[command(about = "Chainload - programmable HTTP workflow load generator", long_about = None)]
struct Cli {
    /// Run configuration file (.json or .toml)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// API definitions file, merged over the inline `apis` map
    #[arg(short, long)]
    api: Option<PathBuf>,

    /// CSV test data; the header row names the fields
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Iterations to run (0 = run for --duration seconds)
    #[arg(short = 'n', long)]
    total_requests: Option<u64>,

    /// Concurrent workers
    #[arg(short = 'w', long)]
    concurrency: Option<usize>,

    /// Run length in seconds when no request count is set
    #[arg(long)]
    duration: Option<u64>,

    /// Base URL prepended to every step URL
    #[arg(long, env = "CHAINLOAD_BASE_URL")]
    base_url: Option<String>,

    /// Reuse test data from the start once it runs out
    #[arg(long)]
    cyclic: bool,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Write the report as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the report in Prometheus text format to this file
    #[arg(long)]
    prometheus: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command-line values take precedence over the file
    fn apply_overrides(&self, config: &mut RunConfig) {
        if let Some(total) = self.total_requests {
            config.total_requests = total;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(duration) = self.duration {
            config.duration_secs = duration;
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if self.cyclic {
            config.test_data_mode = FeedMode::Cyclic;
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = timeout;
        }
    }

    fn build_config(&self) -> Result<RunConfig> {
        let mut config = loader::load_run_config(&self.config)?;

        if let Some(path) = &self.api {
            config.apis.extend(loader::load_api_map(path)?);
        }
        if let Some(path) = &self.data {
            config.test_data = Some(loader::load_test_data(path)?);
        }

        self.apply_overrides(&mut config);
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose);

    let config = cli
        .build_config()
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let runner = Runner::new(config).context("Cannot start run")?;

    let stats = runner.run().await;
    println!("{stats}");

    if let Some(path) = &cli.output {
        export::write_json(&stats, path)?;
    }
    if let Some(path) = &cli.prometheus {
        export::write_prometheus(&stats, path)?;
    }

    info!("Done");
    Ok(())
}

/// Install the global subscriber. Events go through a lossy non-blocking
/// writer so workers never wait on log I/O; the guard flushes it on exit.
fn init_logging(verbose: bool) -> WorkerGuard {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (writer, guard) = NonBlockingBuilder::default()
        .buffered_lines_limit(LOG_QUEUE_LINES)
        .lossy(true)
        .finish(std::io::stderr());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false),
        )
        .init();

    guard
}
