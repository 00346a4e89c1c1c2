//! A benchmark for repeated writes to remote storage.
//!
//! The benchmark uploads a local file or a buffer of seeded random bytes to a destination, times
//! every upload, and summarizes the durations of all measured runs. Writing is delegated to the
//! backends of [`writebench_storage`], this crate only orchestrates and measures.
//!
//! Two profiles cover the typical setups:
//!
//! - [`BenchmarkConfig::file_profile`] uploads a file without warmup and deletes the object after
//!   every run, which keeps HDFS clusters clean.
//! - [`BenchmarkConfig::bytes_profile`] uploads generated bytes after one warmup run and verifies
//!   the size of the remote object, which suits cloud buckets.

pub mod benchmark;
pub mod cli;
pub mod config;
pub mod destination;
pub mod error;
pub mod executor;
pub mod observability;
pub mod payload;
pub mod report;
pub mod stats;

pub use benchmark::{BenchmarkConfig, Source};
pub use destination::Destination;
pub use error::{ConfigError, Error};
pub use stats::Statistics;
