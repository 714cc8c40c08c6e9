//! Fusillade - a concurrent HTTP benchmarking library
//!
//! Fusillade drives a fixed number of concurrent clients against one or more
//! URLs, either for a fixed number of requests per client or for a fixed
//! duration, and reports throughput, outcome counts and request latency. It
//! can be used as a command-line tool or as a library.
//!
//! # Example
//!
//! ```rust,no_run
//! use fusillade::BenchmarkBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let outcome = BenchmarkBuilder::new()
//!         .url("http://localhost:8080/<UUID>")
//!         .uri_substitution(true)
//!         .clients(10)
//!         .requests(100)
//!         .run()
//!         .await?;
//!
//!     let summary = fusillade::summarize(&outcome);
//!     println!("{} of {} requests succeeded", summary.success, summary.requests);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod meter;
mod models;
mod report;
mod run;
mod shutdown;
mod template;
mod transport;
mod utils;
mod worker;

pub mod logger;

// Re-export the main types for library users
pub use client::{HttpClient, HyperClient, Request, Response};
pub use error::{ConfigError, TransportError};
pub use meter::ThroughputMeter;
pub use models::{BenchConfig, Header, Method, StopCondition, StopReason, Summary, WorkerResult};
pub use report::{dump_latencies, summarize, write_json, write_latencies, write_text};
pub use run::{Benchmark, RunContext, RunOutcome};
pub use shutdown::StopLatch;
pub use template::{CID_TOKEN, UUID_TOKEN, UriTemplater};
pub use utils::{get_writer, parse_period, parse_targets, read_body, read_targets};

use bytes::Bytes;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Builder for configuring and running a benchmark
pub struct BenchmarkBuilder {
    url: Option<String>,
    urls_file: Option<PathBuf>,
    body: Option<Bytes>,
    body_file: Option<PathBuf>,
    requests: Option<u64>,
    duration: Option<Duration>,
    clients: usize,
    keepalive: bool,
    randomize: bool,
    uri_substitution: bool,
    auth_header: Option<String>,
    accept_encoding: Option<String>,
    content_type: Option<String>,
    user_agent: Option<String>,
    read_timeout: Duration,
    write_timeout: Duration,
    insecure: bool,
}

impl Default for BenchmarkBuilder {
    fn default() -> Self {
        Self {
            url: None,
            urls_file: None,
            body: None,
            body_file: None,
            requests: None,
            duration: None,
            clients: 100,
            keepalive: true,
            randomize: false,
            uri_substitution: false,
            auth_header: None,
            accept_encoding: None,
            content_type: None,
            user_agent: None,
            read_timeout: Duration::from_millis(5000),
            write_timeout: Duration::from_millis(5000),
            insecure: false,
        }
    }
}

impl BenchmarkBuilder {
    /// Create a new BenchmarkBuilder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single target URL, requested after any targets from the URL file
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Load targets from a file, one URL per line
    pub fn urls_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.urls_file = Some(path.into());
        self
    }

    /// POST this payload with every request
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// POST the contents of this file with every request
    pub fn body_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.body_file = Some(path.into());
        self
    }

    /// Number of requests each client sends (count mode)
    pub fn requests(mut self, requests: u64) -> Self {
        self.requests = Some(requests);
        self
    }

    /// How long the whole run lasts (duration mode)
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Number of concurrent clients
    pub fn clients(mut self, clients: usize) -> Self {
        self.clients = clients;
        self
    }

    /// Set whether to keep connections alive
    pub fn keepalive(mut self, keepalive: bool) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Request one random target per pass instead of all of them in order
    pub fn randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    /// Expand `<UUID>` and `<CID>` in target URLs
    pub fn uri_substitution(mut self, enabled: bool) -> Self {
        self.uri_substitution = enabled;
        self
    }

    pub fn auth_header(mut self, value: impl Into<String>) -> Self {
        self.auth_header = Some(value.into());
        self
    }

    pub fn accept_encoding(mut self, value: impl Into<String>) -> Self {
        self.accept_encoding = Some(value.into());
        self
    }

    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self
    }

    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.user_agent = Some(value.into());
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set whether to ignore invalid server TLS certificates
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Validate the settings and load any input files
    pub fn build(self) -> Result<BenchConfig, ConfigError> {
        if self.url.is_none() && self.urls_file.is_none() {
            return Err(ConfigError::NoTargets);
        }

        let stop = match (self.requests, self.duration) {
            (None, None) => return Err(ConfigError::MissingLimit),
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingLimits),
            (Some(0), None) => return Err(ConfigError::ZeroRequests),
            (Some(requests), None) => StopCondition::Requests(requests),
            (None, Some(duration)) => StopCondition::Duration(duration),
        };

        if self.clients == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        let mut targets = match &self.urls_file {
            Some(path) => read_targets(path).map_err(|source| ConfigError::ReadTargets {
                path: path.clone(),
                source,
            })?,
            None => Vec::new(),
        };
        targets.extend(self.url);

        if targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        for target in &targets {
            validate_target(target, self.uri_substitution)?;
        }

        let body = match (&self.body_file, self.body) {
            (Some(path), _) => Some(read_body(path).map_err(|source| ConfigError::ReadBody {
                path: path.clone(),
                source,
            })?),
            (None, body) => body,
        };
        let method = if body.is_some() { Method::Post } else { Method::Get };

        Ok(BenchConfig {
            targets,
            method,
            body,
            stop,
            keepalive: self.keepalive,
            randomize: self.randomize,
            uri_substitution: self.uri_substitution,
            auth_header: self.auth_header,
            accept_encoding: self.accept_encoding,
            content_type: self.content_type,
            user_agent: self.user_agent,
            concurrency: self.clients,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            insecure: self.insecure,
        })
    }

    /// Build the configuration and run the benchmark against the network
    pub async fn run(self) -> Result<RunOutcome, ConfigError> {
        let config = self.build()?;
        Ok(Benchmark::new(config)?.run().await)
    }
}

/// A target must be an absolute http(s) URL once its placeholders are filled in
fn validate_target(target: &str, uri_substitution: bool) -> Result<(), ConfigError> {
    let probe = UriTemplater::new(uri_substitution).expand(target, "0");
    let invalid = |reason: String| ConfigError::InvalidTarget {
        uri: target.to_string(),
        reason,
    };

    let url = Url::parse(&probe).map_err(|err| invalid(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(format!("unsupported scheme '{}'", scheme))),
    }
}
