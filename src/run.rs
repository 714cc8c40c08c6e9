use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::client::{HttpClient, HyperClient};
use crate::error::ConfigError;
use crate::meter::ThroughputMeter;
use crate::models::{BenchConfig, StopReason, WorkerResult};
use crate::shutdown::{StopLatch, setup_deadline, setup_signal_handler};
use crate::worker::Worker;

/// State shared by everything taking part in one run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: Arc<BenchConfig>,
    pub meter: Arc<ThroughputMeter>,
    pub latch: StopLatch,
    started: Instant,
}

impl RunContext {
    pub fn new(config: BenchConfig) -> Self {
        Self {
            config: Arc::new(config),
            meter: Arc::new(ThroughputMeter::new()),
            latch: StopLatch::new(),
            started: Instant::now(),
        }
    }

    pub fn started(&self) -> Instant {
        self.started
    }
}

/// Everything a finished run leaves behind
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Worker index to its result
    pub results: BTreeMap<usize, WorkerResult>,
    pub stop_reason: StopReason,
    /// Wall-clock time from start until all workers returned
    pub elapsed: Duration,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl RunOutcome {
    pub fn total_attempted(&self) -> u64 {
        self.results.values().map(|r| r.attempted).sum()
    }
}

/// One benchmark run: spawns the workers, arms the termination triggers and
/// collects every worker's result.
pub struct Benchmark {
    context: RunContext,
    client: Arc<dyn HttpClient>,
    handle_signals: bool,
}

impl Benchmark {
    /// Run against the network with a [`HyperClient`] metering into the run's
    /// [`ThroughputMeter`].
    pub fn new(config: BenchConfig) -> Result<Self, ConfigError> {
        let context = RunContext::new(config);
        let client = HyperClient::new(&context.config, context.meter.clone())?;
        Ok(Self {
            context,
            client: Arc::new(client),
            handle_signals: false,
        })
    }

    /// Run with any [`HttpClient`]. `meter` is the meter that client feeds.
    pub fn with_client(
        config: BenchConfig,
        client: Arc<dyn HttpClient>,
        meter: Arc<ThroughputMeter>,
    ) -> Self {
        let mut context = RunContext::new(config);
        context.meter = meter;
        Self {
            context,
            client,
            handle_signals: false,
        }
    }

    /// Stop the run on Ctrl+C / SIGTERM
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Handle to stop the run from outside, like an operator interrupt would
    pub fn latch(&self) -> StopLatch {
        self.context.latch.clone()
    }

    pub async fn run(self) -> RunOutcome {
        let Self {
            context,
            client,
            handle_signals,
        } = self;
        let config = context.config.clone();
        let latch = context.latch.clone();

        let deadline = config.duration_limit().map(|limit| setup_deadline(&latch, limit));
        if handle_signals {
            // Outlives the run; a later interrupt exits the process
            setup_signal_handler(&latch);
        }

        info!(clients = config.concurrency, targets = config.targets.len(), "dispatching clients");

        let handles: Vec<_> = (0..config.concurrency)
            .map(|id| {
                let worker = Worker::new(id, config.clone(), client.clone(), latch.clone());
                tokio::spawn(worker.run())
            })
            .collect();

        info!("waiting for results");
        let joined = join_all(handles).await;

        // No-op when the deadline or an interrupt got there first.
        latch.trigger(StopReason::Completed);
        let stop_reason = latch.reason().unwrap_or(StopReason::Completed);
        let elapsed = context.started().elapsed();

        if let Some(handle) = deadline {
            handle.abort();
        }

        let mut results = BTreeMap::new();
        for (id, joined) in joined.into_iter().enumerate() {
            match joined {
                Ok(result) => {
                    results.insert(id, result);
                }
                Err(err) => {
                    warn!(worker = id, "worker task failed: {}", err);
                    results.insert(id, WorkerResult::new());
                }
            }
        }

        info!(reason = %stop_reason, elapsed_ms = elapsed.as_millis() as u64, "run finished");

        RunOutcome {
            results,
            stop_reason,
            elapsed,
            bytes_read: context.meter.bytes_read(),
            bytes_written: context.meter.bytes_written(),
        }
    }
}
