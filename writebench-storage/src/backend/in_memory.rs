//! In-memory backend for tests.
//!
//! This provides a [`Backend`] backed by a `HashMap`, removing the need for
//! filesystem tempdir management in unit tests. The backend is [`Clone`] so
//! tests can hold a handle for direct inspection while the client owns a boxed
//! copy.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;

use super::Backend;
use crate::PayloadStream;
use crate::error::BackendResult;

/// A backend keeping objects in a shared map.
///
/// Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct InMemory {
    store: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl InMemory {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the stored bytes, if present.
    pub fn get_stored(&self, key: &str) -> Option<Bytes> {
        self.store.lock().unwrap().get(key).cloned()
    }

    /// Returns `true` if the backend contains an object at the given key.
    pub fn contains(&self, key: &str) -> bool {
        self.store.lock().unwrap().contains_key(key)
    }
}

#[async_trait::async_trait]
impl Backend for InMemory {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn put_object(&self, key: &str, stream: PayloadStream, _len: u64) -> BackendResult<u64> {
        let bytes: BytesMut = stream.try_collect().await?;
        let size = bytes.len() as u64;
        self.store
            .lock()
            .unwrap()
            .insert(key.to_owned(), bytes.freeze());
        Ok(size)
    }

    async fn delete_object(&self, key: &str) -> BackendResult<()> {
        match self.store.lock().unwrap().remove(key) {
            Some(_) => Ok(()),
            None => {
                let message = format!("no object at `{key}`");
                Err(io::Error::new(io::ErrorKind::NotFound, message).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    #[tokio::test]
    async fn clones_share_objects() {
        let backend = InMemory::new();
        let handle = backend.clone();

        let stream = futures_util::stream::once(async { Ok(Bytes::from_static(b"abc")) }).boxed();
        assert_eq!(backend.put_object("key", stream, 3).await.unwrap(), 3);
        assert_eq!(handle.get_stored("key").unwrap(), "abc");

        handle.delete_object("key").await.unwrap();
        assert!(!backend.contains("key"));

        let err = backend.delete_object("key").await.unwrap_err();
        assert!(matches!(err, crate::BackendError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }
}
