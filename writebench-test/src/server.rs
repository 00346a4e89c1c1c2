//! Exposes an in-process fake storage server for use in integration tests.
//!
//! The server speaks just enough of the GCS JSON API, the GCS XML API and WebHDFS to serve the
//! requests issued by the storage backends. Objects are kept in memory.
//!
//! ```
//! use writebench_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let endpoint = server.url("/");
//!    // point a backend at the endpoint...
//! }
//! ```

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::{IntoResponse, Response};
use axum::routing::{post, put};
use bytes::Bytes;
use serde_json::json;

type Objects = Arc<Mutex<HashMap<String, Bytes>>>;

#[derive(Clone, Debug)]
struct ServerState {
    objects: Objects,
    base_url: String,
    truncate_to: Option<usize>,
}

impl ServerState {
    fn store(&self, key: String, body: Bytes) -> usize {
        let body = match self.truncate_to {
            Some(limit) if body.len() > limit => body.slice(..limit),
            _ => body,
        };
        let len = body.len();
        self.objects.lock().unwrap().insert(key, body);
        len
    }

    fn size(&self, key: &str) -> Option<usize> {
        self.objects.lock().unwrap().get(key).map(Bytes::len)
    }

    fn remove(&self, key: &str) -> bool {
        self.objects.lock().unwrap().remove(key).is_some()
    }
}

/// An in-process fake storage server for use in integration tests.
///
/// It listens on a random available port on localhost and stops when dropped.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    objects: Objects,
}

impl TestServer {
    /// Starts a server that stores every upload in full.
    pub async fn new() -> Self {
        Self::start(None).await
    }

    /// Starts a server that silently drops everything past `limit` bytes of each upload.
    pub async fn truncating(limit: usize) -> Self {
        Self::start(Some(limit)).await
    }

    async fn start(truncate_to: Option<usize>) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let objects = Objects::default();
        let state = ServerState {
            objects: objects.clone(),
            base_url: format!("http://{socket}"),
            truncate_to,
        };

        let app = Router::new()
            .route("/upload/storage/v1/b/{bucket}/o", post(gcs_json_upload))
            .route(
                "/storage/v1/b/{bucket}/o/{object}",
                axum::routing::delete(gcs_json_delete),
            )
            .route(
                "/webhdfs/v1/{*path}",
                put(namenode_create)
                    .get(namenode_status)
                    .delete(namenode_delete),
            )
            .route("/datanode/{*path}", put(datanode_write))
            .route(
                "/{bucket}/{*key}",
                put(gcs_xml_put).head(gcs_xml_head).delete(gcs_xml_delete),
            )
            .layer(DefaultBodyLimit::disable())
            .with_state(state);

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            handle,
            socket,
            objects,
        }
    }

    /// Returns a full URL pointing to the given path.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://{}/{}", self.socket, path)
    }

    /// Returns the contents of a stored object.
    ///
    /// GCS objects are keyed by `{bucket}/{name}`, HDFS files by their absolute path.
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Returns the keys of all stored objects, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn gcs_json_upload(
    State(state): State<ServerState>,
    Path(bucket): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let (Some("media"), Some(name)) = (
        query.get("uploadType").map(String::as_str),
        query.get("name"),
    ) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let size = state.store(format!("{bucket}/{name}"), body);
    axum::Json(json!({
        "kind": "storage#object",
        "bucket": bucket,
        "name": name,
        "size": size.to_string(),
    }))
    .into_response()
}

async fn gcs_json_delete(
    State(state): State<ServerState>,
    Path((bucket, object)): Path<(String, String)>,
) -> StatusCode {
    match state.remove(&format!("{bucket}/{object}")) {
        true => StatusCode::NO_CONTENT,
        false => StatusCode::NOT_FOUND,
    }
}

async fn gcs_xml_put(
    State(state): State<ServerState>,
    Path((bucket, key)): Path<(String, String)>,
    body: Bytes,
) -> StatusCode {
    state.store(format!("{bucket}/{key}"), body);
    StatusCode::OK
}

async fn gcs_xml_head(
    State(state): State<ServerState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    match state.size(&format!("{bucket}/{key}")) {
        Some(size) => (
            StatusCode::OK,
            [("x-goog-stored-content-length", size.to_string())],
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn gcs_xml_delete(
    State(state): State<ServerState>,
    Path((bucket, key)): Path<(String, String)>,
) -> StatusCode {
    match state.remove(&format!("{bucket}/{key}")) {
        true => StatusCode::NO_CONTENT,
        false => StatusCode::NOT_FOUND,
    }
}

fn op(query: &HashMap<String, String>) -> &str {
    query.get("op").map(String::as_str).unwrap_or_default()
}

async fn namenode_create(
    State(state): State<ServerState>,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if op(&query) != "CREATE" {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let location = format!("{}/datanode/{path}", state.base_url);
    (StatusCode::TEMPORARY_REDIRECT, [(LOCATION, location)]).into_response()
}

async fn datanode_write(
    State(state): State<ServerState>,
    Path(path): Path<String>,
    body: Bytes,
) -> StatusCode {
    state.store(format!("/{path}"), body);
    StatusCode::CREATED
}

async fn namenode_status(
    State(state): State<ServerState>,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if op(&query) != "GETFILESTATUS" {
        return StatusCode::BAD_REQUEST.into_response();
    }

    match state.size(&format!("/{path}")) {
        Some(length) => axum::Json(json!({
            "FileStatus": { "length": length, "type": "FILE" }
        }))
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn namenode_delete(
    State(state): State<ServerState>,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if op(&query) != "DELETE" {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let deleted = state.remove(&format!("/{path}"));
    axum::Json(json!({ "boolean": deleted })).into_response()
}
