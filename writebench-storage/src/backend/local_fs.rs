use std::path::{Path, PathBuf};
use std::pin::pin;

use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;

use super::Backend;
use crate::PayloadStream;
use crate::error::BackendResult;

/// Stores objects as files below a root directory.
#[derive(Debug)]
pub struct LocalFs {
    path: PathBuf,
}

impl LocalFs {
    /// Creates a backend storing objects below `path`.
    pub fn new(path: &Path) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Backend for LocalFs {
    fn name(&self) -> &'static str {
        "local-fs"
    }

    #[tracing::instrument(level = "trace", fields(?key), skip_all)]
    async fn put_object(&self, key: &str, stream: PayloadStream, _len: u64) -> BackendResult<u64> {
        let path = self.path.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await?;

        let mut reader = pin!(StreamReader::new(stream));
        let mut writer = BufWriter::new(file);

        tokio::io::copy(&mut reader, &mut writer).await?;
        writer.flush().await?;
        let file = writer.into_inner();
        file.sync_data().await?;
        let size = file.metadata().await?.len();
        drop(file);

        Ok(size)
    }

    #[tracing::instrument(level = "trace", fields(?key), skip_all)]
    async fn delete_object(&self, key: &str) -> BackendResult<()> {
        let path = self.path.join(key);
        Ok(tokio::fs::remove_file(path).await?)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures_util::StreamExt;

    use super::*;

    fn stream_of(chunks: &[&'static [u8]]) -> PayloadStream {
        let chunks: Vec<_> = chunks.iter().map(|c| Ok(Bytes::from_static(c))).collect();
        futures_util::stream::iter(chunks).boxed()
    }

    #[tokio::test]
    async fn stores_and_reports_size() {
        let tempdir = tempfile::tempdir().unwrap();
        let backend = LocalFs::new(tempdir.path());

        let size = backend
            .put_object("nested/blob", stream_of(&[b"hello ", b"world"]), 11)
            .await
            .unwrap();

        assert_eq!(size, 11);
        let contents = std::fs::read(tempdir.path().join("nested/blob")).unwrap();
        assert_eq!(contents, b"hello world");
    }

    #[tokio::test]
    async fn overwrites_existing_object() {
        let tempdir = tempfile::tempdir().unwrap();
        let backend = LocalFs::new(tempdir.path());

        backend
            .put_object("blob", stream_of(&[b"a much longer payload"]), 21)
            .await
            .unwrap();
        let size = backend
            .put_object("blob", stream_of(&[b"short"]), 5)
            .await
            .unwrap();

        assert_eq!(size, 5);
        let contents = std::fs::read(tempdir.path().join("blob")).unwrap();
        assert_eq!(contents, b"short");
    }

    #[tokio::test]
    async fn delete_missing_object_fails() {
        let tempdir = tempfile::tempdir().unwrap();
        let backend = LocalFs::new(tempdir.path());

        backend
            .put_object("blob", stream_of(&[b"data"]), 4)
            .await
            .unwrap();
        backend.delete_object("blob").await.unwrap();

        assert!(!tempdir.path().join("blob").exists());
        assert!(backend.delete_object("blob").await.is_err());
    }
}
