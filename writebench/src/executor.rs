//! The timed run loop.
//!
//! Every iteration goes through the same states:
//!
//! ```text
//! UPLOADING -> VERIFYING -> CLEANING_UP -> RECORDED
//! ```
//!
//! Verification and cleanup are skipped when disabled in the [`BenchmarkConfig`]. A failed upload
//! or a size mismatch aborts the whole benchmark, a failed cleanup is only logged.

use std::io::Write;

use tokio::time::Instant;
use writebench_storage::StorageClient;

use crate::benchmark::{BenchmarkConfig, PreparedSource};
use crate::error::{Error, Result};
use crate::report::{self, OutputFormat};
use crate::stats::Statistics;

/// The outcome of a single iteration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RunSample {
    /// Index of the run within its phase, starting at `0`.
    pub run_index: usize,
    /// Wall-clock time of the upload, in whole milliseconds.
    pub duration_millis: u64,
    /// Whether this run is excluded from statistics.
    pub is_warmup: bool,
}

/// Drives all iterations of a benchmark against one storage client.
#[derive(Debug)]
pub struct Executor<'a> {
    config: &'a BenchmarkConfig,
    client: &'a StorageClient,
    source: &'a PreparedSource,
}

impl<'a> Executor<'a> {
    /// Creates an executor borrowing the benchmark's configuration, client, and source.
    pub fn new(
        config: &'a BenchmarkConfig,
        client: &'a StorageClient,
        source: &'a PreparedSource,
    ) -> Self {
        Self {
            config,
            client,
            source,
        }
    }

    /// Runs warmup and measured iterations one after another.
    ///
    /// Progress lines go to `out`. Durations of measured runs are added to `stats` as they
    /// complete, so `stats` holds all runs before the failure if this returns an error.
    pub async fn run(&self, stats: &mut Statistics, out: &mut impl Write) -> Result<()> {
        for iteration in 0..self.config.iterations() {
            let sample = self.run_once(iteration, out).await?;
            if !sample.is_warmup {
                stats.add_sample(sample.duration_millis as f64);
            }
            tracing::trace!(iteration, "RECORDED");
        }

        Ok(())
    }

    async fn run_once(&self, iteration: usize, out: &mut impl Write) -> Result<RunSample> {
        let is_warmup = iteration < self.config.warmup_runs;
        let run_index = match is_warmup {
            true => iteration,
            false => iteration - self.config.warmup_runs,
        };
        let key = self.config.key_for(iteration);
        let expected = self.source.size();

        write!(out, "{} ", report::run_started(run_index, is_warmup))?;
        out.flush()?;

        tracing::trace!(iteration, %key, "UPLOADING");
        let start = Instant::now();
        let uploaded = self.source.upload(self.client, &key).await;
        let duration_millis = start.elapsed().as_millis() as u64;

        let actual = match uploaded {
            Ok(actual) => actual,
            Err(cause) => {
                writeln!(out, "Failed.")?;
                return Err(Error::Upload {
                    destination: key,
                    cause,
                });
            }
        };

        if self.config.verify_size {
            tracing::trace!(iteration, expected, actual, "VERIFYING");
            if actual != expected {
                writeln!(out, "Failed.")?;
                return Err(Error::SizeMismatch {
                    destination: key,
                    expected,
                    actual,
                });
            }
        }

        if self.config.cleanup {
            tracing::trace!(iteration, %key, "CLEANING_UP");
            if let Err(cause) = self.client.delete_object(&key).await {
                let error = Error::Delete {
                    destination: key.clone(),
                    cause,
                };
                tracing::warn!(
                    error = &error as &dyn std::error::Error,
                    "Cleanup failed, continuing"
                );
            }
        }

        writeln!(out, "{}", report::run_finished(duration_millis, expected))?;

        Ok(RunSample {
            run_index,
            duration_millis,
            is_warmup,
        })
    }
}

/// Runs a complete benchmark and prints its report to `out`.
///
/// The client is closed exactly once before returning, regardless of the outcome. The summary is
/// only printed if all runs succeeded.
pub async fn run(
    config: &BenchmarkConfig,
    mut client: StorageClient,
    out: &mut impl Write,
) -> Result<Statistics> {
    let outcome = run_with_client(config, &client, out).await;

    if let Err(error) = client.close().await {
        tracing::warn!(
            error = &error as &dyn std::error::Error,
            "Failed to close storage client"
        );
    }

    let (stats, size) = outcome?;
    let snapshot = stats.snapshot();
    match config.output {
        OutputFormat::Text => write!(out, "{}", report::summary(snapshot.as_ref(), size))?,
        OutputFormat::Json => writeln!(
            out,
            "{}",
            report::summary_json(
                snapshot.as_ref(),
                size,
                config.destination.as_str(),
                stats.len()
            )
        )?,
    }
    out.flush()?;

    Ok(stats)
}

async fn run_with_client(
    config: &BenchmarkConfig,
    client: &StorageClient,
    out: &mut impl Write,
) -> Result<(Statistics, u64)> {
    config.validate()?;
    let source = PreparedSource::prepare(&config.source).await?;

    writeln!(
        out,
        "{}",
        report::banner(
            &source.describe(),
            source.size(),
            config.destination.as_str(),
            config.transport,
            config.total_runs,
        )
    )?;

    let mut stats = Statistics::new();
    Executor::new(config, client, &source)
        .run(&mut stats, out)
        .await?;

    tracing::debug!(runs = stats.len(), "Benchmark completed");
    Ok((stats, source.size()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use writebench_test::backend::ScriptedBackend;

    use super::*;
    use crate::benchmark::Source;
    use crate::destination::Destination;

    fn config(size: u64, runs: usize, warmup: usize) -> BenchmarkConfig {
        let destination = Destination::parse("gs://bucket/base").unwrap();
        let mut config = BenchmarkConfig::bytes_profile(destination, size);
        config.total_runs = runs;
        config.warmup_runs = warmup;
        config
    }

    fn client(backend: &ScriptedBackend) -> StorageClient {
        StorageClient::from_backend(Box::new(backend.clone()))
    }

    fn millis(delays: &[u64]) -> impl Iterator<Item = Duration> + '_ {
        delays.iter().copied().map(Duration::from_millis)
    }

    async fn execute(
        config: &BenchmarkConfig,
        backend: &ScriptedBackend,
    ) -> (Result<()>, Statistics, String) {
        writebench_test::tracing::init();

        let client = client(backend);
        let source = PreparedSource::prepare(&config.source).await.unwrap();
        let mut stats = Statistics::new();
        let mut out = Vec::new();

        let result = Executor::new(config, &client, &source)
            .run(&mut stats, &mut out)
            .await;

        (result, stats, String::from_utf8(out).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn measures_scripted_durations() {
        let backend = ScriptedBackend::new().with_delays(millis(&[10, 20, 30]));
        let config = config(1000, 3, 0);

        let (result, stats, out) = execute(&config, &backend).await;
        result.unwrap();

        assert_eq!(stats.samples(), &[10.0, 20.0, 30.0]);
        let snapshot = stats.snapshot().unwrap();
        assert_eq!(snapshot.mean, 20.0);
        assert_eq!(snapshot.p50, 20.0);
        assert_eq!(snapshot.min, 10.0);
        assert_eq!(snapshot.max, 30.0);

        let lines: Vec<_> = out.lines().collect();
        assert_eq!(
            lines,
            [
                "Upload 0... Done. Took 10 milliseconds (0.1 Mbps).",
                "Upload 1... Done. Took 20 milliseconds (0.1 Mbps).",
                "Upload 2... Done. Took 30 milliseconds (0.0 Mbps).",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn renames_every_run() {
        let backend = ScriptedBackend::new();
        let mut config = config(10, 2, 0);
        config.rename_each_run = true;

        let (result, _, _) = execute(&config, &backend).await;
        result.unwrap();

        assert_eq!(backend.puts(), ["base-1", "base-2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrites_without_rename() {
        let backend = ScriptedBackend::new();
        let config = config(10, 2, 1);

        let (result, _, _) = execute(&config, &backend).await;
        result.unwrap();

        assert_eq!(backend.puts(), ["base", "base", "base"]);
    }

    #[tokio::test(start_paused = true)]
    async fn size_mismatch_aborts() {
        let backend = ScriptedBackend::new()
            .with_delays(millis(&[5, 5, 5, 5, 5]))
            .report_size_on(2, 999);
        let config = config(1000, 5, 0);

        let (result, stats, out) = execute(&config, &backend).await;

        let error = result.unwrap_err();
        assert!(error.is_fatal());
        assert!(matches!(
            error,
            Error::SizeMismatch {
                expected: 1000,
                actual: 999,
                ..
            }
        ));
        assert_eq!(stats.len(), 1);
        assert_eq!(backend.puts().len(), 2);
        assert!(out.ends_with("Upload 1... Failed.\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn size_mismatch_is_ignored_without_verification() {
        let backend = ScriptedBackend::new().report_size_on(1, 1);
        let mut config = config(1000, 2, 0);
        config.verify_size = false;

        let (result, stats, _) = execute(&config, &backend).await;
        result.unwrap();
        assert_eq!(stats.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn upload_failure_aborts() {
        let backend = ScriptedBackend::new().fail_put_on(3);
        let config = config(100, 5, 1);

        let (result, stats, _) = execute(&config, &backend).await;

        let error = result.unwrap_err();
        assert!(error.is_fatal());
        assert!(matches!(error, Error::Upload { .. }));
        // The first call is a warmup run.
        assert_eq!(stats.len(), 1);
        assert_eq!(backend.puts().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn warmup_runs_are_excluded() {
        let backend = ScriptedBackend::new().with_delays(millis(&[100, 200, 10, 20, 30]));
        let config = config(1000, 3, 2);

        let (result, stats, out) = execute(&config, &backend).await;
        result.unwrap();

        assert_eq!(stats.samples(), &[10.0, 20.0, 30.0]);

        let starts: Vec<_> = out
            .lines()
            .filter_map(|line| line.split(" Done.").next())
            .collect();
        assert_eq!(
            starts,
            [
                "Warmup Upload 0...",
                "Warmup Upload 1...",
                "Upload 0...",
                "Upload 1...",
                "Upload 2...",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cleanup_continues() {
        let backend = ScriptedBackend::new()
            .with_delays(millis(&[10, 20, 30]))
            .fail_delete_on(2);
        let mut config = config(1000, 3, 0);
        config.cleanup = true;

        let (result, stats, _) = execute(&config, &backend).await;
        result.unwrap();

        assert_eq!(stats.samples(), &[10.0, 20.0, 30.0]);
        assert_eq!(backend.deletes(), ["base", "base", "base"]);
    }

    #[tokio::test(start_paused = true)]
    async fn no_runs() {
        let backend = ScriptedBackend::new();
        let config = config(1000, 0, 0);

        let (result, stats, out) = execute(&config, &backend).await;
        result.unwrap();

        assert!(stats.is_empty());
        assert!(stats.snapshot().is_none());
        assert!(out.is_empty());
        assert!(backend.puts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn prints_report_and_closes_client() {
        let backend = ScriptedBackend::new().with_delays(millis(&[50, 10, 20, 30]));
        let config = config(1000, 3, 1);
        let mut out = Vec::new();

        let stats = run(&config, client(&backend), &mut out).await.unwrap();
        assert_eq!(stats.len(), 3);
        assert_eq!(backend.closes(), 1);

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with(
            "Writing object random data (seed 0) (1000 bytes) to gs://bucket/base \
             with JSON API, 3 times.\n"
        ));
        assert!(out.contains("Warmup Upload 0... Done. Took 50 milliseconds"));
        assert!(out.ends_with("\nResults:\n\tMean: 20.0ms (0.1 Mbps)\n\tp50: 20.0ms (0.1 Mbps)\n\tMin: 10.0ms (0.1 Mbps)\n\tMax: 30.0ms (0.0 Mbps)\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn abort_closes_client_without_summary() {
        let backend = ScriptedBackend::new().fail_put_on(2);
        let config = config(1000, 3, 0);
        let mut out = Vec::new();

        let error = run(&config, client(&backend), &mut out).await.unwrap_err();
        assert!(matches!(error, Error::Upload { .. }));
        assert_eq!(backend.closes(), 1);

        let out = String::from_utf8(out).unwrap();
        assert!(!out.contains("Results:"));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_config_closes_client() {
        let backend = ScriptedBackend::new();
        let mut config = config(1000, 3, 0);
        config.source = Source::Synthetic { size: 0, seed: 0 };
        let mut out = Vec::new();

        let error = run(&config, client(&backend), &mut out).await.unwrap_err();
        assert!(matches!(error, Error::Config(_)));
        assert_eq!(backend.closes(), 1);
        assert!(backend.puts().is_empty());
        assert!(out.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_report_for_zero_runs() {
        let backend = ScriptedBackend::new();
        let config = config(1000, 0, 0);
        let mut out = Vec::new();

        run(&config, client(&backend), &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.ends_with("\nResults:\n\tNo measured runs.\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn json_summary() {
        let backend = ScriptedBackend::new().with_delays(millis(&[10, 10]));
        let mut config = config(1000, 1, 1);
        config.output = OutputFormat::Json;
        let mut out = Vec::new();

        run(&config, client(&backend), &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        let json: serde_json::Value = serde_json::from_str(out.lines().last().unwrap()).unwrap();
        assert_eq!(json["runs"], 1);
        assert_eq!(json["p50"]["millis"], 10.0);
    }
}
