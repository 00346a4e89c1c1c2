//! Benchmark parameters and the two benchmark profiles.

use std::path::PathBuf;

use writebench_storage::{PayloadStream, StorageClient, Transport};

use crate::destination::Destination;
use crate::error::ConfigError;
use crate::payload::{DEFAULT_BUFFER_SIZE, RandomPayload};
use crate::report::OutputFormat;

/// Default number of measured runs for the `bytes` profile.
pub const DEFAULT_RUNS: usize = 10;
/// Default number of warmup runs for the `bytes` profile.
pub const DEFAULT_WARMUP_RUNS: usize = 1;
/// Default payload size for the `bytes` profile.
pub const DEFAULT_PAYLOAD_SIZE: u64 = 128 * 1024 * 1024; // 128 MiB

/// What gets uploaded in every run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// The contents of a local file.
    File(PathBuf),
    /// Seeded random bytes of the given size.
    Synthetic {
        /// Number of bytes per upload.
        size: u64,
        /// Seed of the random payload.
        seed: u64,
    },
}

/// The full description of a benchmark.
///
/// Construct it with one of the profiles, adjust fields as needed, and [`validate`] it before
/// running.
///
/// [`validate`]: Self::validate
#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    /// What to upload.
    pub source: Source,
    /// Where to upload to.
    pub destination: Destination,
    /// Number of measured runs.
    pub total_runs: usize,
    /// Number of runs before the measured runs, excluded from statistics.
    pub warmup_runs: usize,
    /// Write every run to its own object, `{key}-{n}`, instead of overwriting one object.
    pub rename_each_run: bool,
    /// The API used for cloud destinations.
    pub transport: Transport,
    /// Fail if the remote size differs from the uploaded size.
    pub verify_size: bool,
    /// Delete the object after every run.
    pub cleanup: bool,
    /// How the summary is rendered.
    pub output: OutputFormat,
}

impl BenchmarkConfig {
    /// The profile for uploading a local file, e.g. to HDFS.
    ///
    /// Runs without warmup and deletes the object after every run.
    pub fn file_profile(
        local_path: impl Into<PathBuf>,
        destination: Destination,
        runs: usize,
        rename_each_run: bool,
    ) -> Self {
        Self {
            source: Source::File(local_path.into()),
            destination,
            total_runs: runs,
            warmup_runs: 0,
            rename_each_run,
            transport: Transport::default(),
            verify_size: false,
            cleanup: true,
            output: OutputFormat::Text,
        }
    }

    /// The profile for uploading generated bytes, e.g. to a cloud bucket.
    ///
    /// Runs one warmup and verifies the remote object size after every run.
    pub fn bytes_profile(destination: Destination, size: u64) -> Self {
        Self {
            source: Source::Synthetic { size, seed: 0 },
            destination,
            total_runs: DEFAULT_RUNS,
            warmup_runs: DEFAULT_WARMUP_RUNS,
            rename_each_run: false,
            transport: Transport::default(),
            verify_size: true,
            cleanup: false,
            output: OutputFormat::Text,
        }
    }

    /// Checks the configuration for errors that would only surface mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.source {
            Source::Synthetic { size: 0, .. } => Err(ConfigError::EmptyPayload),
            _ => Ok(()),
        }
    }

    /// Total number of runs, including warmup.
    pub fn iterations(&self) -> usize {
        self.warmup_runs + self.total_runs
    }

    /// The object key written in the given 0-based iteration.
    pub fn key_for(&self, iteration: usize) -> String {
        match self.rename_each_run {
            true => self.destination.numbered_key(iteration + 1),
            false => self.destination.key().to_owned(),
        }
    }
}

/// A [`Source`] made ready for uploading.
///
/// Files are checked for existence and sized, synthetic payloads are generated once.
#[derive(Debug)]
pub enum PreparedSource {
    /// A local file of known size.
    File {
        /// Path to the file.
        path: PathBuf,
        /// Size of the file at startup.
        size: u64,
    },
    /// A generated payload, streamed repeatedly up to `size` bytes.
    Synthetic {
        /// The generated buffer.
        payload: RandomPayload,
        /// Number of bytes per upload.
        size: u64,
    },
}

impl PreparedSource {
    /// Prepares the source for uploading.
    pub async fn prepare(source: &Source) -> Result<Self, ConfigError> {
        match *source {
            Source::File(ref path) => {
                let metadata = tokio::fs::metadata(path).await.map_err(|cause| {
                    ConfigError::SourceFile {
                        path: path.clone(),
                        cause,
                    }
                })?;
                Ok(Self::File {
                    path: path.clone(),
                    size: metadata.len(),
                })
            }
            Source::Synthetic { size: 0, .. } => Err(ConfigError::EmptyPayload),
            Source::Synthetic { size, seed } => {
                let buffer_len = size.min(DEFAULT_BUFFER_SIZE as u64) as usize;
                tracing::debug!(seed, buffer_len, "Generating random payload");
                Ok(Self::Synthetic {
                    payload: RandomPayload::with_len(seed, buffer_len),
                    size,
                })
            }
        }
    }

    /// Number of bytes uploaded per run.
    pub fn size(&self) -> u64 {
        match *self {
            Self::File { size, .. } | Self::Synthetic { size, .. } => size,
        }
    }

    /// A human-readable name for reports.
    pub fn describe(&self) -> String {
        match self {
            Self::File { path, .. } => path.display().to_string(),
            Self::Synthetic { payload, .. } => format!("random data (seed {})", payload.seed()),
        }
    }

    /// Uploads the source to `key`, returning the remote size reported by the client.
    pub(crate) async fn upload(
        &self,
        client: &StorageClient,
        key: &str,
    ) -> writebench_storage::BackendResult<u64> {
        match self {
            Self::File { path, .. } => client.upload_from_local_file(path, key).await,
            Self::Synthetic { payload, size } => {
                let stream: PayloadStream = payload.stream(*size);
                client.upload_bytes(stream, *size, key).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destination() -> Destination {
        Destination::parse("gs://bucket/base").unwrap()
    }

    #[test]
    fn profiles() {
        let file = BenchmarkConfig::file_profile("/tmp/source", destination(), 3, true);
        assert_eq!(file.warmup_runs, 0);
        assert!(file.cleanup);
        assert!(!file.verify_size);
        assert_eq!(file.iterations(), 3);

        let bytes = BenchmarkConfig::bytes_profile(destination(), DEFAULT_PAYLOAD_SIZE);
        assert_eq!(bytes.total_runs, 10);
        assert_eq!(bytes.warmup_runs, 1);
        assert!(bytes.verify_size);
        assert!(!bytes.cleanup);
        assert_eq!(bytes.iterations(), 11);
    }

    #[test]
    fn keys_per_iteration() {
        let mut config = BenchmarkConfig::bytes_profile(destination(), 1);
        assert_eq!(config.key_for(0), "base");
        assert_eq!(config.key_for(5), "base");

        config.rename_each_run = true;
        assert_eq!(config.key_for(0), "base-1");
        assert_eq!(config.key_for(1), "base-2");
    }

    #[test]
    fn rejects_empty_payload() {
        let config = BenchmarkConfig::bytes_profile(destination(), 0);
        assert!(matches!(config.validate(), Err(ConfigError::EmptyPayload)));

        let config = BenchmarkConfig::bytes_profile(destination(), 1);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn prepares_synthetic_payload() {
        let source = PreparedSource::prepare(&Source::Synthetic { size: 1000, seed: 3 })
            .await
            .unwrap();

        assert_eq!(source.size(), 1000);
        assert_eq!(source.describe(), "random data (seed 3)");
        let PreparedSource::Synthetic { payload, .. } = source else {
            panic!("expected a synthetic source");
        };
        assert_eq!(payload.len(), 1000);
    }

    #[tokio::test]
    async fn prepares_file() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("source");
        std::fs::write(&path, [1u8; 64]).unwrap();

        let source = PreparedSource::prepare(&Source::File(path.clone()))
            .await
            .unwrap();
        assert_eq!(source.size(), 64);
        assert!(matches!(source, PreparedSource::File { path: ref p, size: 64 } if *p == path));

        let missing = PreparedSource::prepare(&Source::File(tempdir.path().join("missing"))).await;
        assert!(matches!(missing, Err(ConfigError::SourceFile { .. })));
    }
}
