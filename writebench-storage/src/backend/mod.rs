use std::fmt::Debug;
use std::time::Duration;

use crate::PayloadStream;
use crate::error::{BackendError, BackendResult};

mod gcs;
mod in_memory;
mod local_fs;
mod webhdfs;

pub use gcs::{Gcs, Transport};
pub use in_memory::InMemory;
pub use local_fs::LocalFs;
pub use webhdfs::WebHdfs;

/// User agent string used for outgoing requests.
pub const USER_AGENT: &str = concat!("writebench/", env!("CARGO_PKG_VERSION"));

/// A type-erased [`Backend`] instance.
pub type BoxedBackend = Box<dyn Backend>;

/// A storage system that objects are written to and deleted from.
#[async_trait::async_trait]
pub trait Backend: Debug + Send + Sync + 'static {
    /// The backend name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Creates or overwrites the object at `key` with `len` bytes read from `stream`.
    ///
    /// Returns the size of the object as reported by the backend after the write completed.
    async fn put_object(&self, key: &str, stream: PayloadStream, len: u64) -> BackendResult<u64>;

    /// Deletes the object at `key`.
    async fn delete_object(&self, key: &str) -> BackendResult<()>;

    /// Releases connections held by this backend.
    async fn close(&self) -> BackendResult<()> {
        Ok(())
    }
}

/// Creates a reqwest client with required defaults.
pub(crate) fn reqwest_client(
    request_timeout: Option<Duration>,
    follow_redirects: bool,
) -> BackendResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }
    if !follow_redirects {
        builder = builder.redirect(reqwest::redirect::Policy::none());
    }

    builder
        .build()
        .map_err(|cause| BackendError::reqwest("failed to build http client", cause))
}

/// Parses a base URL that request paths are appended to.
pub(crate) fn parse_endpoint(endpoint: &str) -> BackendResult<reqwest::Url> {
    let url = reqwest::Url::parse(endpoint).map_err(|err| BackendError::InvalidEndpoint {
        endpoint: endpoint.to_owned(),
        reason: err.to_string(),
    })?;

    if url.cannot_be_a_base() {
        return Err(BackendError::InvalidEndpoint {
            endpoint: endpoint.to_owned(),
            reason: "not a base URL".to_owned(),
        });
    }

    Ok(url)
}

/// Appends path segments to the base URL, percent-encoding each of them.
pub(crate) fn join_segments<'a>(
    base: &reqwest::Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> reqwest::Url {
    let mut url = base.clone();
    // `parse_endpoint` rejects URLs that cannot be a base.
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
