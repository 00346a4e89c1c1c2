use thiserror::Error;

/// Errors that can occur when talking to a storage backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// IO errors related to payload streaming or file operations.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors related to deserializing API responses.
    #[error("serde error: {context}")]
    Serde {
        /// The response that could not be read.
        context: String,
        /// The underlying deserialization error.
        #[source]
        cause: serde_json::Error,
    },

    /// All errors stemming from the reqwest client, used by the remote backends.
    ///
    /// These can be network errors encountered when sending the requests, but also non-success
    /// status codes returned by the API itself.
    #[error("reqwest error: {context}")]
    Reqwest {
        /// The request that failed.
        context: String,
        /// The underlying client or status error.
        #[source]
        cause: reqwest::Error,
    },

    /// Errors encountered when attempting to authenticate with GCP.
    #[error("GCP authentication error: {0}")]
    GcpAuth(#[from] gcp_auth::Error),

    /// The remote responded successfully, but not in the way the protocol prescribes.
    #[error("unexpected response: {context}")]
    Unexpected {
        /// What the remote did instead.
        context: String,
    },

    /// The endpoint of a remote backend could not be used to build request URLs.
    #[error("invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint {
        /// The endpoint as configured.
        endpoint: String,
        /// Why no URL could be built from it.
        reason: String,
    },

    /// The client was used after [`StorageClient::close`](crate::StorageClient::close).
    #[error("storage client is closed")]
    Closed,
}

impl BackendError {
    pub(crate) fn reqwest(context: impl Into<String>, cause: reqwest::Error) -> Self {
        Self::Reqwest {
            context: context.into(),
            cause,
        }
    }

    pub(crate) fn unexpected(context: impl Into<String>) -> Self {
        Self::Unexpected {
            context: context.into(),
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
