//! A scripted [`Backend`] for exercising the benchmark executor.
//!
//! ```
//! use std::time::Duration;
//! use writebench_test::backend::ScriptedBackend;
//!
//! let backend = ScriptedBackend::new()
//!     .with_delays([10, 20, 30].map(Duration::from_millis))
//!     .fail_delete_on(2);
//! ```
//!
//! Calls are numbered from `1` per operation kind. The backend is [`Clone`], so a test can keep a
//! handle for inspection while the client owns a boxed copy.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::TryStreamExt;
use writebench_storage::{Backend, BackendError, BackendResult, PayloadStream};

#[derive(Debug, Default)]
struct Script {
    delays: VecDeque<Duration>,
    reported_sizes: HashMap<usize, u64>,
    put_failures: HashSet<usize>,
    delete_failures: HashSet<usize>,

    puts: Vec<String>,
    deletes: Vec<String>,
    closes: usize,
}

/// A backend that sleeps for scripted durations and fails on request.
///
/// Uploads drain the given stream and report the number of bytes received, unless a different
/// size is scripted for that call. Sleeping uses the tokio timer, so tests running with a paused
/// clock observe exact durations.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    /// Creates a backend that succeeds instantly on every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for the given durations in successive uploads, then no longer sleeps.
    pub fn with_delays(self, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.script.lock().unwrap().delays.extend(delays);
        self
    }

    /// Reports `size` instead of the received byte count in upload number `call`.
    pub fn report_size_on(self, call: usize, size: u64) -> Self {
        self.script.lock().unwrap().reported_sizes.insert(call, size);
        self
    }

    /// Fails upload number `call`.
    pub fn fail_put_on(self, call: usize) -> Self {
        self.script.lock().unwrap().put_failures.insert(call);
        self
    }

    /// Fails delete number `call`.
    pub fn fail_delete_on(self, call: usize) -> Self {
        self.script.lock().unwrap().delete_failures.insert(call);
        self
    }

    /// Keys of all uploads, in call order.
    pub fn puts(&self) -> Vec<String> {
        self.script.lock().unwrap().puts.clone()
    }

    /// Keys of all deletes, in call order.
    pub fn deletes(&self) -> Vec<String> {
        self.script.lock().unwrap().deletes.clone()
    }

    /// How often the backend was closed.
    pub fn closes(&self) -> usize {
        self.script.lock().unwrap().closes
    }
}

#[async_trait::async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn put_object(&self, key: &str, stream: PayloadStream, _len: u64) -> BackendResult<u64> {
        let (call, delay) = {
            let mut script = self.script.lock().unwrap();
            script.puts.push(key.to_owned());
            (script.puts.len(), script.delays.pop_front())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let received = stream
            .try_fold(0u64, |total, chunk| async move {
                Ok::<_, io::Error>(total + chunk.len() as u64)
            })
            .await?;

        let script = self.script.lock().unwrap();
        if script.put_failures.contains(&call) {
            return Err(BackendError::Io(io::Error::other(format!(
                "scripted failure of upload {call}"
            ))));
        }

        Ok(script.reported_sizes.get(&call).copied().unwrap_or(received))
    }

    async fn delete_object(&self, key: &str) -> BackendResult<()> {
        let mut script = self.script.lock().unwrap();
        script.deletes.push(key.to_owned());

        let call = script.deletes.len();
        if script.delete_failures.contains(&call) {
            return Err(BackendError::Io(io::Error::other(format!(
                "scripted failure of delete {call}"
            ))));
        }

        Ok(())
    }

    async fn close(&self) -> BackendResult<()> {
        self.script.lock().unwrap().closes += 1;
        Ok(())
    }
}
