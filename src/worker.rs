use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::client::{HttpClient, Request};
use crate::models::{BenchConfig, Header, WorkerResult};
use crate::shutdown::StopLatch;
use crate::template::UriTemplater;

/// A single simulated client.
///
/// Issues one request at a time until its quota is used up (count mode) or the
/// stop latch fires. A request still in flight when the latch fires is dropped
/// and not recorded.
pub struct Worker {
    id: usize,
    config: Arc<BenchConfig>,
    client: Arc<dyn HttpClient>,
    latch: StopLatch,
    templater: UriTemplater,
}

impl Worker {
    pub fn new(
        id: usize,
        config: Arc<BenchConfig>,
        client: Arc<dyn HttpClient>,
        latch: StopLatch,
    ) -> Self {
        let templater = UriTemplater::new(config.uri_substitution);
        Self {
            id,
            config,
            client,
            latch,
            templater,
        }
    }

    pub async fn run(self) -> WorkerResult {
        let worker_id = self.id.to_string();
        let limit = self.config.request_limit();
        let mut rng = StdRng::from_entropy();
        let mut result = WorkerResult::new();

        'run: loop {
            let pass = select_targets(&self.config.targets, self.config.randomize, &mut rng);

            for target in pass {
                if limit.is_some_and(|limit| result.attempted >= limit) {
                    break 'run;
                }

                let uri = self.templater.expand(target, &worker_id);
                let request = build_request(&self.config, uri);

                let start = Instant::now();
                let outcome = tokio::select! {
                    biased;
                    _ = self.latch.triggered() => break 'run,
                    outcome = self.client.execute(request) => outcome,
                };
                let latency = start.elapsed();

                match outcome {
                    Err(err) => {
                        warn!(worker = self.id, error = %err, "network error");
                        result.record_network_failure();
                    }
                    Ok(response) => {
                        debug!(
                            worker = self.id,
                            status_code = response.status,
                            latency_ms = latency.as_secs_f64() * 1000.0,
                            "request completed"
                        );
                        if response.status == 200 {
                            result.record_success(latency);
                        } else {
                            result.record_bad_status(latency);
                        }
                    }
                }
            }
        }

        result
    }
}

/// Targets to walk in one pass: all of them in order, or a single random one.
pub fn select_targets<'a, R: Rng>(targets: &'a [String], randomize: bool, rng: &mut R) -> &'a [String] {
    if randomize && !targets.is_empty() {
        let index = rng.gen_range(0..targets.len());
        std::slice::from_ref(&targets[index])
    } else {
        targets
    }
}

fn build_request(config: &BenchConfig, uri: String) -> Request {
    let mut headers = Vec::new();
    if let Some(encoding) = &config.accept_encoding {
        headers.push(Header::new("Accept-Encoding", encoding.as_str()));
    }
    if let Some(content_type) = &config.content_type {
        headers.push(Header::new("Content-Type", content_type.as_str()));
    }
    if let Some(auth) = &config.auth_header {
        headers.push(Header::new("Authorization", auth.as_str()));
    }

    Request {
        method: config.method,
        uri,
        headers,
        body: config.body.clone(),
    }
}
