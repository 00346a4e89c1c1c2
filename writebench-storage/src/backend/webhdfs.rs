use std::fmt;
use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{Backend, join_segments, parse_endpoint, reqwest_client};
use crate::PayloadStream;
use crate::error::{BackendError, BackendResult};

/// Response of `op=GETFILESTATUS`.
#[derive(Debug, Deserialize)]
struct FileStatusResponse {
    #[serde(rename = "FileStatus")]
    file_status: FileStatus,
}

#[derive(Debug, Deserialize)]
struct FileStatus {
    length: u64,
}

/// Response of `op=DELETE`.
#[derive(Debug, Deserialize)]
struct BooleanResponse {
    boolean: bool,
}

/// HDFS backend speaking the WebHDFS REST API of a namenode.
///
/// File creation follows the two-step protocol: the namenode answers `op=CREATE` with a redirect
/// to a datanode, which then receives the file contents.
pub struct WebHdfs {
    client: reqwest::Client,
    endpoint: Url,
    user: Option<String>,
}

impl WebHdfs {
    /// Creates a backend talking to the namenode at `endpoint`, e.g. `http://namenode:9870`.
    pub fn new(
        endpoint: &str,
        user: Option<&str>,
        request_timeout: Option<Duration>,
    ) -> BackendResult<Self> {
        Ok(Self {
            // Redirects are handled manually, since a streaming body cannot be replayed.
            client: reqwest_client(request_timeout, false)?,
            endpoint: parse_endpoint(endpoint)?,
            user: user.map(str::to_owned),
        })
    }

    fn url(&self, path: &str, op: &str) -> Url {
        let segments = ["webhdfs", "v1"]
            .into_iter()
            .chain(path.split('/').filter(|s| !s.is_empty()));
        let mut url = join_segments(&self.endpoint, segments);

        let mut query = url.query_pairs_mut();
        query.append_pair("op", op);
        if let Some(ref user) = self.user {
            query.append_pair("user.name", user);
        }
        drop(query);

        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
        context: &str,
    ) -> BackendResult<T> {
        let body = response
            .bytes()
            .await
            .map_err(|cause| BackendError::reqwest(context, cause))?;
        serde_json::from_slice(&body).map_err(|cause| BackendError::Serde {
            context: context.to_owned(),
            cause,
        })
    }

    async fn datanode_location(&self, path: &str) -> BackendResult<Url> {
        let mut url = self.url(path, "CREATE");
        url.query_pairs_mut().append_pair("overwrite", "true");

        let response = self
            .request(Method::PUT, url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|cause| BackendError::reqwest("failed to create file", cause))?;

        if response.status() != StatusCode::TEMPORARY_REDIRECT {
            return Err(BackendError::unexpected(format!(
                "namenode answered CREATE with {} instead of a redirect",
                response.status()
            )));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| BackendError::unexpected("redirect without a datanode location"))?;

        Url::parse(location)
            .map_err(|err| BackendError::unexpected(format!("invalid datanode location: {err}")))
    }

    async fn file_length(&self, path: &str) -> BackendResult<u64> {
        let response = self
            .request(Method::GET, self.url(path, "GETFILESTATUS"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|cause| BackendError::reqwest("failed to stat file", cause))?;

        let status: FileStatusResponse =
            Self::read_json(response, "failed to read file status").await?;
        Ok(status.file_status.length)
    }
}

impl fmt::Debug for WebHdfs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebHdfs")
            .field("endpoint", &self.endpoint.as_str())
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Backend for WebHdfs {
    fn name(&self) -> &'static str {
        "webhdfs"
    }

    #[tracing::instrument(level = "trace", fields(?key, len = len), skip_all)]
    async fn put_object(&self, key: &str, stream: PayloadStream, len: u64) -> BackendResult<u64> {
        tracing::debug!("Writing to webhdfs backend");
        let location = self.datanode_location(key).await?;
        tracing::trace!(%location, "Streaming file to datanode");

        self.request(Method::PUT, location)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, len)
            .body(Body::wrap_stream(stream))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|cause| BackendError::reqwest("failed to write file to datanode", cause))?;

        self.file_length(key).await
    }

    #[tracing::instrument(level = "trace", fields(?key), skip_all)]
    async fn delete_object(&self, key: &str) -> BackendResult<()> {
        tracing::debug!("Deleting from webhdfs backend");
        let mut url = self.url(key, "DELETE");
        url.query_pairs_mut().append_pair("recursive", "false");

        let response = self
            .request(Method::DELETE, url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|cause| BackendError::reqwest("failed to delete file", cause))?;

        let deleted: BooleanResponse =
            Self::read_json(response, "failed to read delete result").await?;
        if !deleted.boolean {
            return Err(BackendError::unexpected(format!(
                "namenode did not delete `{key}`"
            )));
        }

        Ok(())
    }
}
