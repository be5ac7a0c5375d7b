//! # Scheduler
//!
//! Drives a run: a single producer admits tickets into a bounded channel, a
//! fixed pool of workers turns each ticket into one workflow iteration, and the
//! collection loop folds every step result into the statistics.
//!
//! ```text
//!   producer ──tickets──► [bounded: concurrency] ──► worker × N ──results──► aggregator
//!                                                       │
//!                                                feeder.next()
//! ```
//!
//! The run ends when the producer has closed the ticket channel, every worker
//! has drained it and dropped its result sender, and the result stream is empty.

use crate::executor::{StepResult, WorkflowExecutor};
use crate::feeder::TestDataFeeder;
use crate::stats::{RunStats, StatsAggregator};
use crate::transport::{HttpTransport, Transport};
use chainload_core::{ConfigError, LoadMode, RunConfig, SessionState};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Errors raised before a run starts
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Permission to run one workflow iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(pub u64);

type TicketReceiver = Arc<Mutex<mpsc::Receiver<Ticket>>>;

/// What the producer did during a run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProducerReport {
    /// Tickets accepted by the channel
    pub emitted: u64,
    /// Tickets discarded because the channel was full (duration mode only)
    pub dropped: u64,
}

/// What one worker did during a run
#[derive(Debug, Default, Clone, Copy)]
struct WorkerReport {
    iterations: u64,
    results: u64,
    exhausted: bool,
}

// ============================================================================
// RUNNER
// ============================================================================

/// Executes one load run from a validated configuration
pub struct Runner {
    config: Arc<RunConfig>,
    executor: Arc<WorkflowExecutor>,
    feeder: Arc<TestDataFeeder>,
}

impl Runner {
    /// Validate the configuration and build the HTTP transport for it
    pub fn new(config: RunConfig) -> Result<Self, EngineError> {
        let transport = HttpTransport::new(config.request_timeout(), config.concurrency)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build a runner that sends every request through `transport`
    pub fn with_transport(
        config: RunConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let executor = WorkflowExecutor::new(&config, transport)?;
        let feeder = TestDataFeeder::from_config(&config);

        Ok(Self {
            config: Arc::new(config),
            executor: Arc::new(executor),
            feeder: Arc::new(feeder),
        })
    }

    /// Run to completion and return the final statistics
    pub async fn run(&self) -> RunStats {
        let concurrency = self.config.concurrency.max(1);
        let mode = self.config.load_mode();

        info!(
            ?mode,
            concurrency,
            workflow = ?self.config.workflow,
            base_url = %self.config.base_url,
            "Starting run"
        );

        let (ticket_tx, ticket_rx) = mpsc::channel::<Ticket>(concurrency);
        let ticket_rx: TicketReceiver = Arc::new(Mutex::new(ticket_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<StepResult>(self.config.result_buffer.max(1));

        let workers: Vec<_> = (0..concurrency)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&ticket_rx),
                    result_tx.clone(),
                    Arc::clone(&self.executor),
                    Arc::clone(&self.feeder),
                ))
            })
            .collect();

        // Workers own the only remaining handles: the ticket channel closes
        // when they all exit, the result stream when their senders drop.
        drop(ticket_rx);
        drop(result_tx);

        let start = Instant::now();
        let producer = tokio::spawn(produce_tickets(ticket_tx, mode));

        let mut stats = StatsAggregator::new();
        while let Some(result) = result_rx.recv().await {
            stats.record(&result);
        }
        let run_duration = start.elapsed();

        for (worker_id, outcome) in join_all(workers).await.into_iter().enumerate() {
            match outcome {
                Ok(report) => debug!(
                    worker_id,
                    iterations = report.iterations,
                    results = report.results,
                    exhausted = report.exhausted,
                    "Worker finished"
                ),
                Err(e) => error!(worker_id, error = %e, "Worker task failed"),
            }
        }

        match producer.await {
            Ok(report) => debug!(
                emitted = report.emitted,
                dropped = report.dropped,
                "Ticket producer finished"
            ),
            Err(e) => error!(error = %e, "Ticket producer failed"),
        }

        let report = stats.finalize(run_duration);
        info!(
            total = report.total_requests,
            success = report.success_count,
            failure = report.failure_count,
            elapsed = ?run_duration,
            "Run complete"
        );
        report
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// PRODUCER
// ============================================================================

/// Admit tickets until the load mode is satisfied, then close the channel.
///
/// Stops early when every worker has gone away.
pub async fn produce_tickets(tickets: mpsc::Sender<Ticket>, mode: LoadMode) -> ProducerReport {
    let mut report = ProducerReport::default();

    match mode {
        LoadMode::Count(total) => {
            for seq in 0..total {
                if tickets.send(Ticket(seq)).await.is_err() {
                    debug!(seq, "Ticket channel closed, stopping producer");
                    break;
                }
                report.emitted += 1;
            }
        }
        LoadMode::Duration(duration) => {
            let deadline = Instant::now() + duration;
            let mut seq = 0;
            while Instant::now() < deadline {
                match tickets.try_send(Ticket(seq)) {
                    Ok(()) => {
                        report.emitted += 1;
                        seq += 1;
                    }
                    Err(TrySendError::Full(_)) => report.dropped += 1,
                    Err(TrySendError::Closed(_)) => {
                        debug!(seq, "Ticket channel closed, stopping producer");
                        break;
                    }
                }
                tokio::task::yield_now().await;
            }
        }
    }

    report
}

// ============================================================================
// WORKER
// ============================================================================

async fn run_worker(
    worker_id: usize,
    tickets: TicketReceiver,
    results: mpsc::Sender<StepResult>,
    executor: Arc<WorkflowExecutor>,
    feeder: Arc<TestDataFeeder>,
) -> WorkerReport {
    let mut report = WorkerReport::default();

    loop {
        // Hold the lock only while waiting for the next ticket
        let ticket = tickets.lock().await.recv().await;
        let Some(Ticket(seq)) = ticket else {
            break;
        };

        let Some(record) = feeder.next() else {
            warn!(worker_id, seq, "Test data exhausted, worker stopping");
            report.exhausted = true;
            break;
        };

        report.iterations += 1;
        for mut result in executor.execute(SessionState::from_record(record)).await {
            // the document only feeds extraction, which is already done
            result.payload = None;
            if results.send(result).await.is_err() {
                return report;
            }
            report.results += 1;
        }
    }

    report
}
