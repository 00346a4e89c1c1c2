//! The storage layer of the write benchmark.
//!
//! It provides a [`StorageClient`], which uploads local files or generated payloads to one of
//! several [`Backend`]s and deletes them again. All transport concerns, such as authentication,
//! redirects, and chunking, are handled by the backends and the HTTP client underneath; the
//! client merely exposes the operations that the benchmark times.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod backend;
mod client;
mod error;

use bytes::Bytes;
use futures_util::stream::BoxStream;

pub use backend::{Backend, BoxedBackend, Gcs, InMemory, LocalFs, Transport, USER_AGENT, WebHdfs};
pub use client::{StorageClient, StorageConfig};
pub use error::{BackendError, BackendResult};

/// Type alias for the data streams uploaded by the client.
pub type PayloadStream = BoxStream<'static, std::io::Result<Bytes>>;
