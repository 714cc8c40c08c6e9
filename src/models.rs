use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// HTTP method used for every request of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents an HTTP header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name
    pub name: String,
    /// Header value
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// When a run is over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// Every worker stops on its own after this many requests
    Requests(u64),
    /// Workers are unbounded; the whole run ends once this much time has passed
    Duration(Duration),
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// All workers used up their request quota
    Completed,
    /// The duration limit elapsed
    DeadlineElapsed,
    /// An operator interrupt arrived
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::Completed => "completed",
            StopReason::DeadlineElapsed => "deadline elapsed",
            StopReason::Interrupted => "interrupted",
        };
        f.write_str(text)
    }
}

/// Validated benchmark parameters. Built once by
/// [`BenchmarkBuilder`](crate::BenchmarkBuilder) and shared read-only by all workers.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Target URIs, never empty
    pub targets: Vec<String>,
    /// POST when a body was supplied, GET otherwise
    pub method: Method,
    /// Payload attached to every request
    pub body: Option<Bytes>,
    /// Termination policy
    pub stop: StopCondition,
    /// Reuse connections between requests
    pub keepalive: bool,
    /// Pick one random target per pass instead of walking all of them
    pub randomize: bool,
    /// Expand `<UUID>` and `<CID>` tokens in target URIs
    pub uri_substitution: bool,
    /// Value of the `Authorization` header
    pub auth_header: Option<String>,
    /// Value of the `Accept-Encoding` header
    pub accept_encoding: Option<String>,
    /// Value of the `Content-Type` header
    pub content_type: Option<String>,
    /// Value of the `User-Agent` header
    pub user_agent: Option<String>,
    /// Number of workers
    pub concurrency: usize,
    /// Read timeout for every request
    pub read_timeout: Duration,
    /// Write timeout for every request
    pub write_timeout: Duration,
    /// Skip TLS certificate verification
    pub insecure: bool,
}

impl BenchConfig {
    /// Per-worker request quota, `None` in duration mode
    pub fn request_limit(&self) -> Option<u64> {
        match self.stop {
            StopCondition::Requests(limit) => Some(limit),
            StopCondition::Duration(_) => None,
        }
    }

    /// Run duration, `None` in count mode
    pub fn duration_limit(&self) -> Option<Duration> {
        match self.stop {
            StopCondition::Requests(_) => None,
            StopCondition::Duration(duration) => Some(duration),
        }
    }
}

/// Outcome counters and latency samples of one worker.
///
/// Owned and mutated by a single worker for its whole life; handed back to the
/// orchestrator once the worker returns. `attempted` always equals the sum of
/// the three outcome counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub attempted: u64,
    pub succeeded: u64,
    pub network_failed: u64,
    pub bad_status_failed: u64,
    /// Request latencies in seconds, in completion order
    pub latencies: Vec<f64>,
}

impl WorkerResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, latency: Duration) {
        self.attempted += 1;
        self.succeeded += 1;
        self.latencies.push(latency.as_secs_f64());
    }

    pub fn record_bad_status(&mut self, latency: Duration) {
        self.attempted += 1;
        self.bad_status_failed += 1;
        self.latencies.push(latency.as_secs_f64());
    }

    /// No sample is kept: the request never produced a response to time.
    pub fn record_network_failure(&mut self) {
        self.attempted += 1;
        self.network_failed += 1;
    }

    pub fn is_consistent(&self) -> bool {
        self.attempted == self.succeeded + self.network_failed + self.bad_status_failed
    }
}

/// Aggregated figures of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Total number of requests
    pub requests: u64,
    /// Requests answered with `200 OK`
    pub success: u64,
    /// Requests that failed at the transport level
    pub network_failed: u64,
    /// Requests answered with any other status
    pub bad_status_failed: u64,
    /// Whole seconds since the run started, at least 1
    pub elapsed_secs: u64,
    /// Successful requests per second
    pub success_rate: u64,
    /// Bytes read per second
    pub read_throughput: u64,
    /// Bytes written per second
    pub write_throughput: u64,
    /// Mean request latency in milliseconds
    pub mean_latency_ms: f64,
    /// Number of latency samples
    pub samples: usize,
    /// What ended the run
    pub stop_reason: StopReason,
}
