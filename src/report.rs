use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::models::{Summary, WorkerResult};
use crate::run::RunOutcome;

/// Aggregate all worker results of a run
pub fn summarize(outcome: &RunOutcome) -> Summary {
    let mut requests = 0;
    let mut success = 0;
    let mut network_failed = 0;
    let mut bad_status_failed = 0;
    let mut latency_sum = 0.0;
    let mut samples = 0;

    for result in outcome.results.values() {
        requests += result.attempted;
        success += result.succeeded;
        network_failed += result.network_failed;
        bad_status_failed += result.bad_status_failed;
        latency_sum += result.latencies.iter().sum::<f64>();
        samples += result.latencies.len();
    }

    // Rates are per whole second; never divide by zero.
    let elapsed_secs = outcome.elapsed.as_secs().max(1);

    let mean_latency_ms = if samples > 0 {
        latency_sum / samples as f64 * 1000.0
    } else {
        0.0
    };

    Summary {
        requests,
        success,
        network_failed,
        bad_status_failed,
        elapsed_secs,
        success_rate: success / elapsed_secs,
        read_throughput: outcome.bytes_read / elapsed_secs,
        write_throughput: outcome.bytes_written / elapsed_secs,
        mean_latency_ms,
        samples,
        stop_reason: outcome.stop_reason,
    }
}

/// Write the human-readable report
pub fn write_text<W: Write>(writer: &mut W, summary: &Summary) -> Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{:<32}{:>10} hits", "Requests:", summary.requests)?;
    writeln!(writer, "{:<32}{:>10} hits", "Successful requests:", summary.success)?;
    writeln!(writer, "{:<32}{:>10} hits", "Network failed:", summary.network_failed)?;
    writeln!(writer, "{:<32}{:>10} hits", "Bad requests failed (!2xx):", summary.bad_status_failed)?;
    writeln!(writer, "{:<32}{:>10} hits/sec", "Successful requests rate:", summary.success_rate)?;
    writeln!(writer, "{:<32}{:>10} bytes/sec", "Read throughput:", summary.read_throughput)?;
    writeln!(writer, "{:<32}{:>10} bytes/sec", "Write throughput:", summary.write_throughput)?;
    writeln!(writer, "{:<32}{:>10} sec", "Test time:", summary.elapsed_secs)?;
    writeln!(writer, "{:<32}{:>10.2} msec", "Average request latency:", summary.mean_latency_ms)?;
    Ok(())
}

/// Write the report as pretty JSON
pub fn write_json<W: Write>(writer: &mut W, summary: &Summary) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, summary)?;
    writeln!(writer)?;
    Ok(())
}

/// Write every latency sample (seconds), one per line, worker by worker
pub fn write_latencies<W: Write>(writer: &mut W, results: &BTreeMap<usize, WorkerResult>) -> Result<()> {
    for result in results.values() {
        for latency in &result.latencies {
            writeln!(writer, "{:.6}", latency)?;
        }
    }
    Ok(())
}

/// Create (or truncate) `path` and dump all latency samples into it
pub fn dump_latencies(path: &Path, results: &BTreeMap<usize, WorkerResult>) -> Result<()> {
    let file = File::create(path).context(format!("Failed to create latency file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_latencies(&mut writer, results)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StopReason;
    use std::time::Duration;

    fn result(succeeded: u64, network: u64, bad: u64, latencies: &[f64]) -> WorkerResult {
        WorkerResult {
            attempted: succeeded + network + bad,
            succeeded,
            network_failed: network,
            bad_status_failed: bad,
            latencies: latencies.to_vec(),
        }
    }

    fn outcome(results: Vec<WorkerResult>, elapsed: Duration) -> RunOutcome {
        RunOutcome {
            results: results.into_iter().enumerate().collect(),
            stop_reason: StopReason::Completed,
            elapsed,
            bytes_read: 4000,
            bytes_written: 2000,
        }
    }

    #[test]
    fn sums_counters_across_workers() {
        let summary = summarize(&outcome(
            vec![
                result(3, 1, 0, &[0.01, 0.02, 0.03]),
                result(1, 0, 2, &[0.04, 0.05, 0.06]),
            ],
            Duration::from_secs(2),
        ));

        assert_eq!(summary.requests, 7);
        assert_eq!(summary.success, 4);
        assert_eq!(summary.network_failed, 1);
        assert_eq!(summary.bad_status_failed, 2);
        assert_eq!(summary.elapsed_secs, 2);
        assert_eq!(summary.success_rate, 2);
        assert_eq!(summary.read_throughput, 2000);
        assert_eq!(summary.write_throughput, 1000);
        assert_eq!(summary.samples, 6);
        assert!((summary.mean_latency_ms - 35.0).abs() < 1e-9);
    }

    #[test]
    fn short_runs_are_floored_to_one_second() {
        let summary = summarize(&outcome(vec![result(5, 0, 0, &[0.1; 5])], Duration::ZERO));
        assert_eq!(summary.elapsed_secs, 1);
        assert_eq!(summary.success_rate, 5);
        assert_eq!(summary.read_throughput, 4000);
    }

    #[test]
    fn no_samples_means_zero_latency() {
        let summary = summarize(&outcome(vec![result(0, 4, 0, &[])], Duration::from_millis(300)));
        assert_eq!(summary.success, 0);
        assert_eq!(summary.mean_latency_ms, 0.0);
        assert!(summary.mean_latency_ms.is_finite());
    }

    #[test]
    fn text_report_lists_every_field() {
        let summary = summarize(&outcome(vec![result(2, 0, 0, &[0.01, 0.03])], Duration::from_secs(1)));
        let mut out = Vec::new();
        write_text(&mut out, &summary).unwrap();
        let text = String::from_utf8(out).unwrap();

        let line = |label: &str, value: &str, unit: &str| format!("{:<32}{:>10} {}", label, value, unit);

        assert!(text.contains(&line("Requests:", "2", "hits")));
        assert!(text.contains(&line("Network failed:", "0", "hits")));
        assert!(text.contains(&line("Successful requests rate:", "2", "hits/sec")));
        assert!(text.contains(&line("Read throughput:", "4000", "bytes/sec")));
        assert!(text.contains(&line("Write throughput:", "2000", "bytes/sec")));
        assert!(text.contains(&line("Test time:", "1", "sec")));
        assert!(text.contains(&line("Average request latency:", "20.00", "msec")));
    }

    #[test]
    fn json_report_round_trips() {
        let summary = summarize(&outcome(vec![result(1, 0, 0, &[0.5])], Duration::from_secs(1)));
        let mut out = Vec::new();
        write_json(&mut out, &summary).unwrap();
        let parsed: Summary = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, summary);
    }

    #[test]
    fn latencies_are_one_per_line() {
        let results: BTreeMap<usize, WorkerResult> = vec![
            result(2, 0, 0, &[0.25, 0.5]),
            result(0, 0, 1, &[1.0]),
        ]
        .into_iter()
        .enumerate()
        .collect();

        let mut out = Vec::new();
        write_latencies(&mut out, &results).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0.250000\n0.500000\n1.000000\n");
    }

    #[test]
    fn dump_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delay.txt");
        std::fs::write(&path, "stale\nstale\nstale\nstale\n").unwrap();

        let results: BTreeMap<usize, WorkerResult> =
            std::iter::once((0, result(1, 0, 0, &[0.002]))).collect();
        dump_latencies(&path, &results).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0.002000\n");
    }
}
