//! Configuration for the write benchmark.
//!
//! Benchmark parameters are passed on the command line. Everything describing the environment, such
//! as logging and how to reach the storage systems, is configured here. Configuration is loaded from
//! multiple sources with the following precedence (highest to lowest):
//!
//! 1. Environment variables (prefixed with `WB__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! # Environment Variables
//!
//! Environment variables use `WB__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `WB__LOGGING__LEVEL=debug` sets the log level
//! - `WB__GCS__ENDPOINT=http://localhost:4443` uses a GCS emulator
//! - `WB__WEBHDFS__USER=bench` sets the HDFS user name
//!
//! # YAML Configuration File
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! logging:
//!   level: debug
//!
//! gcs:
//!   endpoint: http://localhost:4443
//!
//! webhdfs:
//!   user: bench
//! ```

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use writebench_storage::{BackendResult, StorageClient, StorageConfig, Transport};

use crate::destination::{Destination, Location};
use crate::error::ConfigError;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "WB__";

/// Default port of the WebHDFS HTTP endpoint on the namenode.
const DEFAULT_WEBHDFS_PORT: u16 = 9870;

/// Format of the log lines written to stderr.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// [`LogFormat::Pretty`] when stderr is a terminal, otherwise [`LogFormat::Simplified`].
    #[default]
    Auto,

    /// Compact lines with colors.
    Pretty,

    /// Plain lines without colors.
    Simplified,

    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Replaces [`LogFormat::Auto`] with the concrete format for a terminal or redirected stderr.
    pub fn resolve(self, stderr_is_terminal: bool) -> Self {
        match self {
            LogFormat::Auto if stderr_is_terminal => LogFormat::Pretty,
            LogFormat::Auto => LogFormat::Simplified,
            format => format,
        }
    }
}

/// Reads and writes a [`LevelFilter`] by its name, such as `warn` or `off`.
mod level_filter {
    use std::borrow::Cow;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::level_filters::LevelFilter;

    pub fn serialize<S>(level: &LevelFilter, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(level)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<LevelFilter, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = Cow::<'de, str>::deserialize(deserializer)?;
        name.parse().map_err(|_| {
            D::Error::custom(format_args!(
                r#"unknown log level "{name}", expected one of "off", "error", "warn", "info", "debug", "trace""#
            ))
        })
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, so they never interleave with the report on stdout.
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable takes precedence and provides more granular control
    /// per module if needed.
    ///
    /// # Default
    ///
    /// `WARN`, so that only cleanup failures and similar problems show up next to the report.
    ///
    /// # Environment Variable
    ///
    /// `WB__LOGGING__LEVEL`
    #[serde(with = "level_filter")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Environment Variable
    ///
    /// `WB__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::WARN,
            format: LogFormat::default(),
        }
    }
}

/// Access to Google Cloud Storage.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Gcs {
    /// Optional custom GCS endpoint URL.
    ///
    /// Useful for testing with emulators. If set, requests are sent without authentication.
    /// Otherwise, application default credentials are used against the public endpoint.
    ///
    /// # Environment Variable
    ///
    /// `WB__GCS__ENDPOINT`
    pub endpoint: Option<String>,
}

/// Access to HDFS through the WebHDFS REST API.
#[derive(Debug, Deserialize, Serialize)]
pub struct WebHdfs {
    /// URL scheme of the namenode's HTTP endpoint, `http` or `https`.
    ///
    /// # Default
    ///
    /// `http`
    pub scheme: String,

    /// Port of the namenode's HTTP endpoint.
    ///
    /// `hdfs://` destinations name the RPC port of the namenode, which does not serve WebHDFS, so
    /// this port is always used for them. `webhdfs://` destinations use their own port if given.
    ///
    /// # Default
    ///
    /// `9870`
    ///
    /// # Environment Variable
    ///
    /// `WB__WEBHDFS__PORT`
    pub port: u16,

    /// Optional user name sent as `user.name` with every request.
    ///
    /// # Environment Variable
    ///
    /// `WB__WEBHDFS__USER`
    pub user: Option<String>,
}

impl Default for WebHdfs {
    fn default() -> Self {
        Self {
            scheme: "http".to_owned(),
            port: DEFAULT_WEBHDFS_PORT,
            user: None,
        }
    }
}

/// Main configuration struct.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Logging configuration.
    pub logging: Logging,

    /// Timeout applied to every request against a remote storage system.
    ///
    /// Accepts human-readable durations, for example `30s` or `5m`. Without a timeout, requests
    /// may take arbitrarily long.
    ///
    /// # Environment Variable
    ///
    /// `WB__REQUEST_TIMEOUT`
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,

    /// Google Cloud Storage configuration.
    pub gcs: Gcs,

    /// WebHDFS configuration.
    pub webhdfs: WebHdfs,
}

impl Config {
    /// Loads configuration from the given YAML file and the environment.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided)
    /// 3. Environment variables (prefixed with `WB__`)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    /// The base URL of the WebHDFS endpoint serving an HDFS location.
    pub fn webhdfs_endpoint(&self, host: &str, port: Option<u16>, http_port: bool) -> String {
        let port = match (http_port, port) {
            (true, Some(port)) => port,
            _ => self.webhdfs.port,
        };
        format!("{}://{host}:{port}", self.webhdfs.scheme)
    }

    /// Creates a storage client for the destination's backend.
    pub async fn connect(
        &self,
        destination: &Destination,
        transport: Transport,
    ) -> BackendResult<StorageClient> {
        match destination.location() {
            Location::FileSystem { root } => {
                StorageClient::new(StorageConfig::FileSystem { path: root }).await
            }
            Location::Hdfs {
                host,
                port,
                http_port,
            } => {
                let endpoint = self.webhdfs_endpoint(host, *port, *http_port);
                StorageClient::new(StorageConfig::WebHdfs {
                    endpoint: &endpoint,
                    user: self.webhdfs.user.as_deref(),
                    request_timeout: self.request_timeout,
                })
                .await
            }
            Location::Gcs { bucket } => {
                StorageClient::new(StorageConfig::Gcs {
                    endpoint: self.gcs.endpoint.as_deref(),
                    bucket,
                    transport,
                    request_timeout: self.request_timeout,
                })
                .await
            }
        }
    }
}
