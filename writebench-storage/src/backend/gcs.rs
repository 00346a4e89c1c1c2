use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gcp_auth::TokenProvider;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use reqwest::{Body, Method, RequestBuilder, Url};
use serde::Deserialize;

use super::{Backend, join_segments, parse_endpoint, reqwest_client};
use crate::PayloadStream;
use crate::error::{BackendError, BackendResult};

/// Default endpoint for both GCS APIs.
const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";
/// OAuth scope required to write and delete objects.
const TOKEN_SCOPES: &[&str] = &["https://www.googleapis.com/auth/devstorage.read_write"];
/// Header carrying the stored object size in XML API responses.
const STORED_CONTENT_LENGTH: &str = "x-goog-stored-content-length";

/// The API used to reach Google Cloud Storage.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Transport {
    /// The JSON API, using single-request media uploads.
    #[default]
    Json,
    /// The S3-compatible XML API.
    Xml,
}

impl Transport {
    /// The display name used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Json => "JSON",
            Transport::Xml => "XML",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object resource returned by the JSON API.
///
/// GCS encodes 64-bit integers as strings.
#[derive(Debug, Deserialize)]
struct ObjectResource {
    size: String,
}

/// Google Cloud Storage backend.
pub struct Gcs {
    client: reqwest::Client,
    endpoint: Url,
    bucket: String,
    transport: Transport,
    token_provider: Option<Arc<dyn TokenProvider>>,
}

impl Gcs {
    /// Creates a backend bound to the given bucket.
    ///
    /// Assumes an emulator without authentication if `endpoint` is set, otherwise authenticates
    /// with application default credentials.
    pub async fn new(
        endpoint: Option<&str>,
        bucket: &str,
        transport: Transport,
        request_timeout: Option<Duration>,
    ) -> BackendResult<Self> {
        let token_provider = match endpoint {
            Some(_) => None,
            None => Some(gcp_auth::provider().await?),
        };

        Ok(Self {
            client: reqwest_client(request_timeout, true)?,
            endpoint: parse_endpoint(endpoint.unwrap_or(DEFAULT_ENDPOINT))?,
            bucket: bucket.to_owned(),
            transport,
            token_provider,
        })
    }

    async fn request(&self, method: Method, url: Url) -> BackendResult<RequestBuilder> {
        let builder = self.client.request(method, url);
        let Some(ref provider) = self.token_provider else {
            return Ok(builder);
        };

        let token = provider.token(TOKEN_SCOPES).await?;
        Ok(builder.bearer_auth(token.as_str()))
    }

    fn json_upload_url(&self, key: &str) -> Url {
        let mut url = join_segments(
            &self.endpoint,
            ["upload", "storage", "v1", "b", &self.bucket, "o"],
        );
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);
        url
    }

    fn json_object_url(&self, key: &str) -> Url {
        join_segments(
            &self.endpoint,
            ["storage", "v1", "b", &self.bucket, "o", key],
        )
    }

    fn xml_object_url(&self, key: &str) -> Url {
        let segments = std::iter::once(self.bucket.as_str()).chain(key.split('/'));
        join_segments(&self.endpoint, segments)
    }

    async fn put_json(&self, key: &str, stream: PayloadStream, len: u64) -> BackendResult<u64> {
        let response = self
            .request(Method::POST, self.json_upload_url(key))
            .await?
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, len)
            .body(Body::wrap_stream(stream))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|cause| BackendError::reqwest("failed to upload object", cause))?;

        let body = response
            .bytes()
            .await
            .map_err(|cause| BackendError::reqwest("failed to read upload response", cause))?;
        let object: ObjectResource =
            serde_json::from_slice(&body).map_err(|cause| BackendError::Serde {
                context: "failed to parse object resource".to_owned(),
                cause,
            })?;

        object
            .size
            .parse()
            .map_err(|_| BackendError::unexpected(format!("invalid object size `{}`", object.size)))
    }

    async fn put_xml(&self, key: &str, stream: PayloadStream, len: u64) -> BackendResult<u64> {
        let url = self.xml_object_url(key);
        self.request(Method::PUT, url.clone())
            .await?
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, len)
            .body(Body::wrap_stream(stream))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|cause| BackendError::reqwest("failed to upload object", cause))?;

        // The XML API does not echo the object, so ask for its stored size.
        let response = self
            .request(Method::HEAD, url)
            .await?
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|cause| BackendError::reqwest("failed to stat object", cause))?;

        stored_size(response.headers())
    }
}

fn stored_size(headers: &HeaderMap) -> BackendResult<u64> {
    let value = headers
        .get(STORED_CONTENT_LENGTH)
        .or_else(|| headers.get(CONTENT_LENGTH))
        .ok_or_else(|| BackendError::unexpected("object size missing from response"))?;

    value
        .to_str()
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| BackendError::unexpected(format!("invalid object size {value:?}")))
}

impl fmt::Debug for Gcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gcs")
            .field("endpoint", &self.endpoint.as_str())
            .field("bucket", &self.bucket)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Backend for Gcs {
    fn name(&self) -> &'static str {
        match self.transport {
            Transport::Json => "gcs-json",
            Transport::Xml => "gcs-xml",
        }
    }

    #[tracing::instrument(level = "trace", fields(?key, len = len), skip_all)]
    async fn put_object(&self, key: &str, stream: PayloadStream, len: u64) -> BackendResult<u64> {
        tracing::debug!(transport = %self.transport, "Writing to gcs backend");
        match self.transport {
            Transport::Json => self.put_json(key, stream, len).await,
            Transport::Xml => self.put_xml(key, stream, len).await,
        }
    }

    #[tracing::instrument(level = "trace", fields(?key), skip_all)]
    async fn delete_object(&self, key: &str) -> BackendResult<()> {
        tracing::debug!("Deleting from gcs backend");
        let url = match self.transport {
            Transport::Json => self.json_object_url(key),
            Transport::Xml => self.xml_object_url(key),
        };

        self.request(Method::DELETE, url)
            .await?
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|cause| BackendError::reqwest("failed to delete object", cause))?;

        Ok(())
    }
}
