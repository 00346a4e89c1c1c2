use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::io::ReaderStream;

use crate::PayloadStream;
use crate::backend::{BoxedBackend, Gcs, LocalFs, Transport, WebHdfs};
use crate::error::{BackendError, BackendResult};

/// Read buffer size when streaming local files.
const FILE_CHUNK_SIZE: usize = 1024 * 1024; // 1 MiB

/// Configuration to initialize a [`StorageClient`].
#[derive(Debug, Clone)]
pub enum StorageConfig<'a> {
    /// Use a local directory as the storage backend.
    FileSystem {
        /// The directory that object keys are resolved against.
        path: &'a Path,
    },
    /// Use HDFS through the WebHDFS REST API.
    WebHdfs {
        /// Base URL of the namenode's HTTP endpoint.
        endpoint: &'a str,
        /// Optional value for the `user.name` parameter.
        user: Option<&'a str>,
        /// Timeout applied to every request.
        request_timeout: Option<Duration>,
    },
    /// Use Google Cloud Storage.
    Gcs {
        /// Optional endpoint URL.
        ///
        /// Assumes an emulator without authentication if set.
        endpoint: Option<&'a str>,
        /// The name of the bucket to use.
        bucket: &'a str,
        /// The API to write objects with.
        transport: Transport,
        /// Timeout applied to every request.
        request_timeout: Option<Duration>,
    },
}

/// A handle to a storage backend, acquired once and reused for every operation.
///
/// The client must be released with [`close`](Self::close). Closing is idempotent; any operation
/// on a closed client fails with [`BackendError::Closed`].
#[derive(Debug)]
pub struct StorageClient {
    backend: Option<BoxedBackend>,
}

impl StorageClient {
    /// Creates a client for the configured backend.
    pub async fn new(config: StorageConfig<'_>) -> BackendResult<Self> {
        let backend = create_backend(config).await?;
        tracing::debug!(backend = backend.name(), "Storage client ready");
        Ok(Self::from_backend(backend))
    }

    /// Creates a client wrapping an existing backend.
    pub fn from_backend(backend: BoxedBackend) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Returns the name of the backend, or `None` once the client is closed.
    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.name())
    }

    fn backend(&self) -> BackendResult<&BoxedBackend> {
        self.backend.as_ref().ok_or(BackendError::Closed)
    }

    /// Uploads the file at `local_path` to `key`, returning the written size.
    pub async fn upload_from_local_file(&self, local_path: &Path, key: &str) -> BackendResult<u64> {
        let backend = self.backend()?;
        let file = tokio::fs::File::open(local_path).await?;
        let len = file.metadata().await?.len();
        let stream = ReaderStream::with_capacity(file, FILE_CHUNK_SIZE).boxed();

        backend.put_object(key, stream, len).await
    }

    /// Uploads `len` bytes from `stream` to `key`, returning the final remote size.
    pub async fn upload_bytes(
        &self,
        stream: PayloadStream,
        len: u64,
        key: &str,
    ) -> BackendResult<u64> {
        self.backend()?.put_object(key, stream, len).await
    }

    /// Deletes the object at `key`.
    pub async fn delete_object(&self, key: &str) -> BackendResult<()> {
        self.backend()?.delete_object(key).await
    }

    /// Releases the backend and its connections.
    ///
    /// Calling this more than once has no effect.
    pub async fn close(&mut self) -> BackendResult<()> {
        match self.backend.take() {
            Some(backend) => {
                tracing::debug!(backend = backend.name(), "Closing storage client");
                backend.close().await
            }
            None => Ok(()),
        }
    }
}

async fn create_backend(config: StorageConfig<'_>) -> BackendResult<BoxedBackend> {
    Ok(match config {
        StorageConfig::FileSystem { path } => Box::new(LocalFs::new(path)),
        StorageConfig::WebHdfs {
            endpoint,
            user,
            request_timeout,
        } => Box::new(WebHdfs::new(endpoint, user, request_timeout)?),
        StorageConfig::Gcs {
            endpoint,
            bucket,
            transport,
            request_timeout,
        } => Box::new(Gcs::new(endpoint, bucket, transport, request_timeout).await?),
    })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::InMemory;

    fn bytes_stream(data: &'static [u8]) -> PayloadStream {
        futures_util::stream::once(async move { Ok(Bytes::from_static(data)) }).boxed()
    }

    #[tokio::test]
    async fn uploads_local_file() {
        let tempdir = tempfile::tempdir().unwrap();
        let source = tempdir.path().join("source");
        std::fs::write(&source, vec![7u8; 3 * FILE_CHUNK_SIZE + 17]).unwrap();

        let backend = InMemory::new();
        let client = StorageClient::from_backend(Box::new(backend.clone()));

        let size = client.upload_from_local_file(&source, "dest").await.unwrap();

        assert_eq!(size, 3 * FILE_CHUNK_SIZE as u64 + 17);
        assert_eq!(backend.get_stored("dest").unwrap().len() as u64, size);
    }

    #[tokio::test]
    async fn missing_local_file_is_io_error() {
        let tempdir = tempfile::tempdir().unwrap();
        let client = StorageClient::from_backend(Box::new(InMemory::new()));

        let err = client
            .upload_from_local_file(&tempdir.path().join("missing"), "dest")
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Io(_)));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let backend = InMemory::new();
        let mut client = StorageClient::from_backend(Box::new(backend.clone()));

        client
            .upload_bytes(bytes_stream(b"payload"), 7, "dest")
            .await
            .unwrap();
        client.close().await.unwrap();
        client.close().await.unwrap();

        assert_eq!(client.backend_name(), None);
        let err = client.delete_object("dest").await.unwrap_err();
        assert!(matches!(err, BackendError::Closed));
        assert!(backend.contains("dest"));
    }

    #[tokio::test]
    async fn filesystem_config_round_trip() {
        let tempdir = tempfile::tempdir().unwrap();
        let mut client = StorageClient::new(StorageConfig::FileSystem {
            path: tempdir.path(),
        })
        .await
        .unwrap();

        let size = client
            .upload_bytes(bytes_stream(b"payload"), 7, "dest")
            .await
            .unwrap();
        assert_eq!(size, 7);
        assert_eq!(client.backend_name(), Some("local-fs"));

        client.delete_object("dest").await.unwrap();
        assert!(!tempdir.path().join("dest").exists());
        client.close().await.unwrap();
    }
}
