//! Execution engine port
//!
//! The engine dispatches requests and runs their tests. It is handed a
//! snapshot of the workspace restricted to what the run needs, so it never
//! sees the live session.

use async_trait::async_trait;
use tokio::sync::watch;
use workbench_domain::{ExecutionBatch, GroupExecution, Id, RunToken, WorkspaceSnapshot};

/// Errors reported by an execution engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The target could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The run exceeded its time limit.
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// A test script failed to run.
    #[error("Script error: {0}")]
    Script(String),

    /// The run was cancelled.
    #[error("Run cancelled")]
    Cancelled,

    /// Any other engine failure.
    #[error("{0}")]
    Other(String),
}

/// Everything the engine needs to run a request or group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCommand {
    /// Ancestor chain and subtree of the target, plus every parameter.
    pub workspace: WorkspaceSnapshot,
    /// Request or group to run.
    pub target_id: Id,
    /// Identifies this run; its results are accepted only while it is the
    /// current run of the target.
    pub token: RunToken,
    /// Number of runs.
    pub runs: u32,
    /// Execution mode when the target is a group.
    pub execution: Option<GroupExecution>,
}

/// Port for running requests.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Runs the command and returns one bucket of results per run.
    ///
    /// # Errors
    ///
    /// Returns an error if the run could not complete.
    async fn run(&self, command: RunCommand) -> Result<ExecutionBatch, EngineError>;
}

/// Signals a pending run to stop.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: watch::Sender<bool>,
}

/// Waits for a [`CancellationToken`] to fire.
#[derive(Debug, Clone)]
pub struct CancellationReceiver {
    receiver: watch::Receiver<bool>,
}

impl CancellationToken {
    /// Creates a token and its receiver.
    #[must_use]
    pub fn new() -> (Self, CancellationReceiver) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, CancellationReceiver { receiver })
    }

    /// Requests cancellation. Receivers created before or after this call
    /// observe it.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Returns true once [`CancellationToken::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

impl CancellationReceiver {
    /// Resolves when the token is cancelled.
    ///
    /// If the token is dropped without cancelling, this never resolves.
    pub async fn cancelled(&mut self) {
        if self.receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Returns true if the token was already cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }
}
