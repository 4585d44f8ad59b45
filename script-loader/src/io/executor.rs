//! Executor abstraction for script execution.
//!
//! The [`Executor`] trait decouples the loader from whatever actually runs a
//! script. [`LatestExecutor`] is the indirection cell the reactors dispatch
//! through, so an in-flight continuation always reaches the executor that is
//! current at dispatch time rather than the one current at subscription time.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{info, warn};

use crate::core::types::ExecutionRequest;

/// Abstraction over script execution backends.
pub trait Executor: Send + Sync {
    fn execute(&self, request: ExecutionRequest);
}

/// Replaceable handle to the current executor.
///
/// Clones share the cell.
#[derive(Clone)]
pub struct LatestExecutor {
    tx: Arc<watch::Sender<Arc<dyn Executor>>>,
}

impl LatestExecutor {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        let (tx, _) = watch::channel(executor);
        Self { tx: Arc::new(tx) }
    }

    /// Swap in a new executor; later dispatches use it.
    pub fn replace(&self, executor: Arc<dyn Executor>) {
        self.tx.send_replace(executor);
    }

    pub fn current(&self) -> Arc<dyn Executor> {
        self.tx.borrow().clone()
    }

    /// Notified whenever the executor is replaced.
    pub fn subscribe(&self) -> watch::Receiver<Arc<dyn Executor>> {
        self.tx.subscribe()
    }

    /// Dispatch `request` to the executor current right now.
    pub fn execute(&self, request: ExecutionRequest) {
        info!(
            id = %request.id,
            page = ?request.live_view_page,
            skip_url_update = request.skip_url_update,
            "executing script"
        );
        // Release the borrow before calling out.
        let executor = self.current();
        executor.execute(request);
    }
}

/// Executor that records requests in memory.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    requests: Mutex<Vec<ExecutionRequest>>,
}

impl RecordingExecutor {
    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, request: ExecutionRequest) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
    }
}

/// Executor that prints each request as one JSON line on stdout.
#[derive(Debug, Default)]
pub struct StdoutExecutor {
    recorded: RecordingExecutor,
}

impl StdoutExecutor {
    pub fn count(&self) -> usize {
        self.recorded.count()
    }
}

impl Executor for StdoutExecutor {
    fn execute(&self, request: ExecutionRequest) {
        match serde_json::to_string(&request) {
            Ok(line) => {
                let mut stdout = std::io::stdout().lock();
                if let Err(err) = writeln!(stdout, "{line}") {
                    warn!(error = %err, "failed to write execution request");
                }
            }
            Err(err) => warn!(error = %err, id = %request.id, "failed to serialize request"),
        }
        self.recorded.execute(request);
    }
}
