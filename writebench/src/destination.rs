//! Parsing of remote destinations.
//!
//! The scheme of a destination selects the storage backend, the remainder names the object:
//!
//! | destination                     | backend    | key          |
//! |---------------------------------|------------|--------------|
//! | `gs://bucket/path/name`         | GCS        | `path/name`  |
//! | `hdfs://host:port/path/name`    | WebHDFS    | `/path/name` |
//! | `webhdfs://host:port/path/name` | WebHDFS    | `/path/name` |
//! | `file:///dir/name`, `dir/name`  | filesystem | `name`       |

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// The store an object lives in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Location {
    /// A local directory.
    FileSystem {
        /// The directory containing the object.
        root: PathBuf,
    },
    /// An HDFS cluster.
    Hdfs {
        /// Hostname of the namenode.
        host: String,
        /// Port given in the destination, if any.
        port: Option<u16>,
        /// Whether the port refers to the WebHDFS HTTP endpoint (`webhdfs://`) rather than the
        /// namenode RPC endpoint (`hdfs://`).
        http_port: bool,
    },
    /// A Google Cloud Storage bucket.
    Gcs {
        /// The bucket name.
        bucket: String,
    },
}

/// A parsed destination: where to write and under which base key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Destination {
    raw: String,
    location: Location,
    key: String,
}

impl Destination {
    /// Parses a destination string.
    pub fn parse(destination: &str) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::InvalidDestination {
            destination: destination.to_owned(),
            reason,
        };

        let (location, key) = match destination.split_once("://") {
            Some(("gs", rest)) => {
                let (bucket, key) = rest.split_once('/').ok_or(invalid("missing object name"))?;
                if bucket.is_empty() {
                    return Err(invalid("missing bucket"));
                }
                let location = Location::Gcs {
                    bucket: bucket.to_owned(),
                };
                (location, key.to_owned())
            }
            Some((scheme @ ("hdfs" | "webhdfs"), rest)) => {
                let (authority, path) = rest.split_once('/').ok_or(invalid("missing path"))?;
                let (host, port) = match authority.split_once(':') {
                    Some((host, port)) => {
                        let port = port.parse().map_err(|_| invalid("invalid port"))?;
                        (host, Some(port))
                    }
                    None => (authority, None),
                };
                if host.is_empty() {
                    return Err(invalid("missing namenode host"));
                }
                let location = Location::Hdfs {
                    host: host.to_owned(),
                    port,
                    http_port: scheme == "webhdfs",
                };
                (location, format!("/{path}"))
            }
            Some(("file", path)) => {
                Self::parse_path(Path::new(path)).ok_or(invalid("missing file name"))?
            }
            Some(_) => return Err(invalid("unsupported scheme")),
            None => Self::parse_path(Path::new(destination)).ok_or(invalid("missing file name"))?,
        };

        if key.is_empty() || key.ends_with('/') {
            return Err(invalid("missing object name"));
        }

        Ok(Self {
            raw: destination.to_owned(),
            location,
            key,
        })
    }

    fn parse_path(path: &Path) -> Option<(Location, String)> {
        let name = path.file_name()?.to_str()?;
        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_owned(),
            _ => PathBuf::from("."),
        };
        Some((Location::FileSystem { root }, name.to_owned()))
    }

    /// The destination as given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The store to write to.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The object key within the store.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The key with a run-specific suffix, `{key}-{run}`.
    pub fn numbered_key(&self, run: usize) -> String {
        format!("{}-{run}", self.key)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
