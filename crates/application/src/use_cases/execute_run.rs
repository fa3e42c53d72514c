//! Execute run use case
//!
//! Runs a request or group through the execution engine and feeds the
//! results back into the session. The session lock is held only to start and
//! to finish the run, never while the engine works.

use std::sync::Arc;

use tracing::warn;
use workbench_domain::CompletionOutcome;

use crate::error::{ApplicationError, ApplicationResult};
use crate::ports::{CancellationReceiver, CancellationToken, EngineError, ExecutionEngine};
use crate::session::SharedSession;

/// Use case for running requests and groups.
///
/// # Example
///
/// ```ignore
/// let use_case = ExecuteRun::new(Arc::new(engine));
/// let (token, receiver) = CancellationToken::new();
/// let outcome = use_case.execute_with_cancellation(&session, "request-id", receiver).await?;
/// ```
pub struct ExecuteRun<E: ExecutionEngine> {
    engine: Arc<E>,
}

impl<E: ExecutionEngine> ExecuteRun<E> {
    /// Creates a new `ExecuteRun` use case with the given engine.
    pub const fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }

    /// Runs `id` to completion.
    ///
    /// # Errors
    ///
    /// See [`ExecuteRun::execute_with_cancellation`].
    pub async fn execute(&self, session: &SharedSession, id: &str) -> ApplicationResult<CompletionOutcome> {
        let (_token, receiver) = CancellationToken::new();
        self.execute_with_cancellation(session, id, receiver).await
    }

    /// Runs `id`, racing the engine against `cancel`.
    ///
    /// Returns [`CompletionOutcome::Ignored`] when the run was cancelled
    /// through the session while the engine was working, or restarted
    /// after such a cancel. A failure of such a run leaves the new run
    /// untouched.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if `id` is already running.
    /// - `Cancelled` if `cancel` fired first; the run is returned to idle.
    /// - `Engine` if the engine failed; the run is returned to idle.
    pub async fn execute_with_cancellation(
        &self,
        session: &SharedSession,
        id: &str,
        mut cancel: CancellationReceiver,
    ) -> ApplicationResult<CompletionOutcome> {
        let command = session.lock().await.begin_run(id)?;
        let token = command.token;

        // Race between execution and cancellation
        let result = tokio::select! {
            result = self.engine.run(command) => result,
            () = cancel.cancelled() => Err(EngineError::Cancelled),
        };

        let mut session = session.lock().await;
        match result {
            Ok(batch) => Ok(session.complete_run(id, token, &batch)),
            Err(EngineError::Cancelled) => {
                session.abandon_run(id, token);
                Err(ApplicationError::Cancelled)
            }
            Err(error) => {
                warn!(request_id = %id, error = %error, "Run failed");
                session.abandon_run(id, token);
                Err(error.into())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use workbench_domain::{
        ExecutionBatch, ExecutionResult, ExecutionStatus, ExecutionView, SequentialIdGenerator,
        WorkbenchSettings, Workspace,
    };

    use super::*;
    use crate::ports::RunCommand;
    use crate::session::WorkspaceSession;

    /// Mock engine returning a canned outcome and recording commands.
    struct MockEngine {
        outcome: Result<ExecutionBatch, EngineError>,
        delay: Duration,
        commands: Mutex<Vec<RunCommand>>,
    }

    impl MockEngine {
        fn new(outcome: Result<ExecutionBatch, EngineError>) -> Self {
            Self {
                outcome,
                delay: Duration::ZERO,
                commands: Mutex::new(Vec::new()),
            }
        }

        const fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl ExecutionEngine for MockEngine {
        async fn run(&self, command: RunCommand) -> Result<ExecutionBatch, EngineError> {
            self.commands.lock().expect("Lock poisoned").push(command);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcome.clone()
        }
    }

    /// Engine answering successive runs from a script of delays and outcomes.
    struct ScriptedEngine {
        steps: Mutex<VecDeque<(Duration, Result<ExecutionBatch, EngineError>)>>,
    }

    impl ScriptedEngine {
        fn new(steps: Vec<(Duration, Result<ExecutionBatch, EngineError>)>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
            }
        }
    }

    #[async_trait]
    impl ExecutionEngine for ScriptedEngine {
        async fn run(&self, _command: RunCommand) -> Result<ExecutionBatch, EngineError> {
            let step = self.steps.lock().expect("Lock poisoned").pop_front();
            let (delay, outcome) = step.expect("Unexpected run");
            tokio::time::sleep(delay).await;
            outcome
        }
    }

    fn single(id: &str, milliseconds: u64) -> ExecutionBatch {
        ExecutionBatch::new(vec![vec![ExecutionResult::new(id, 1, milliseconds)]])
    }

    /// Starts a run of `id` and, once it is under way, cancels it through
    /// the session and starts another. Returns both outcomes.
    async fn cancel_and_rerun(
        session: &SharedSession,
        id: &str,
        engine: ScriptedEngine,
    ) -> (ApplicationResult<CompletionOutcome>, ApplicationResult<CompletionOutcome>) {
        let use_case = ExecuteRun::new(Arc::new(engine));
        let first = use_case.execute(session, id);
        let second = async {
            loop {
                let mut guard = session.lock().await;
                if guard.cancel_run(id) {
                    break;
                }
                drop(guard);
                tokio::task::yield_now().await;
            }
            use_case.execute(session, id).await
        };
        tokio::join!(first, second)
    }

    fn shared_session() -> (SharedSession, String) {
        let mut session = WorkspaceSession::new(Workspace::new(), WorkbenchSettings::default())
            .with_id_generator(Arc::new(SequentialIdGenerator::new("id")));
        let id = session.add_request(None).unwrap();
        (session.into_shared(), id)
    }

    #[tokio::test]
    async fn test_execute_success() {
        let (session, id) = shared_session();
        let batch = ExecutionBatch::new(vec![vec![ExecutionResult::new(id.clone(), 1, 42)]]);
        let engine = Arc::new(MockEngine::new(Ok(batch)));
        let use_case = ExecuteRun::new(Arc::clone(&engine));

        let outcome = use_case.execute(&session, &id).await.unwrap();

        assert_eq!(outcome, CompletionOutcome::Applied);
        let session = session.lock().await;
        assert_eq!(session.executions().status(&id), ExecutionStatus::Completed);
        let ExecutionView::Result(result) = session.executions().view(&id) else {
            panic!("expected a result view");
        };
        assert_eq!(result.result.milliseconds, 42);

        let commands = engine.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].target_id, id);
        assert_eq!(commands[0].runs, 1);
    }

    #[tokio::test]
    async fn test_engine_failure_returns_to_idle() {
        let (session, id) = shared_session();
        let engine = Arc::new(MockEngine::new(Err(EngineError::Network("refused".into()))));
        let use_case = ExecuteRun::new(engine);

        let result = use_case.execute(&session, &id).await;

        assert!(matches!(result, Err(ApplicationError::Engine(EngineError::Network(_)))));
        assert_eq!(session.lock().await.executions().status(&id), ExecutionStatus::Idle);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let (session, id) = shared_session();
        let engine = Arc::new(MockEngine::new(Ok(ExecutionBatch::default())).with_delay(Duration::from_secs(30)));
        let use_case = ExecuteRun::new(engine);
        let (token, receiver) = CancellationToken::new();

        let run = use_case.execute_with_cancellation(&session, &id, receiver);
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        };
        let (result, ()) = tokio::join!(run, cancel);

        assert!(matches!(result, Err(ApplicationError::Cancelled)));
        assert_eq!(session.lock().await.executions().status(&id), ExecutionStatus::Idle);
    }

    #[tokio::test]
    async fn test_rejects_concurrent_run() {
        let (session, id) = shared_session();
        session.lock().await.begin_run(&id).unwrap();
        let use_case = ExecuteRun::new(Arc::new(MockEngine::new(Ok(ExecutionBatch::default()))));

        let result = use_case.execute(&session, &id).await;
        assert!(matches!(result, Err(ApplicationError::AlreadyRunning(_))));
        assert!(session.lock().await.executions().is_running(&id));
    }

    #[tokio::test]
    async fn test_late_results_after_session_cancel_are_ignored() {
        let (session, id) = shared_session();
        let batch = ExecutionBatch::new(vec![vec![ExecutionResult::new(id.clone(), 1, 1)]]);
        let engine = Arc::new(MockEngine::new(Ok(batch)).with_delay(Duration::from_millis(50)));
        let use_case = ExecuteRun::new(engine);

        let run = use_case.execute(&session, &id);
        let cancel = async {
            loop {
                let mut guard = session.lock().await;
                if guard.cancel_run(&id) {
                    break;
                }
                drop(guard);
                tokio::task::yield_now().await;
            }
        };
        let (outcome, ()) = tokio::join!(run, cancel);

        assert_eq!(outcome.unwrap(), CompletionOutcome::Ignored);
        assert_eq!(session.lock().await.executions().status(&id), ExecutionStatus::Idle);
    }

    #[tokio::test]
    async fn test_stale_results_do_not_complete_rerun() {
        let (session, id) = shared_session();
        let engine = ScriptedEngine::new(vec![
            (Duration::from_millis(50), Ok(single(&id, 111))),
            (Duration::from_millis(200), Ok(single(&id, 222))),
        ]);

        let (first, second) = cancel_and_rerun(&session, &id, engine).await;

        assert_eq!(first.unwrap(), CompletionOutcome::Ignored);
        assert_eq!(second.unwrap(), CompletionOutcome::Applied);
        let session = session.lock().await;
        let ExecutionView::Result(result) = session.executions().view(&id) else {
            panic!("expected a result view");
        };
        assert_eq!(result.result.milliseconds, 222);
    }

    #[tokio::test]
    async fn test_stale_failure_does_not_stop_rerun() {
        let (session, id) = shared_session();
        let engine = ScriptedEngine::new(vec![
            (Duration::from_millis(50), Err(EngineError::Network("refused".into()))),
            (Duration::from_millis(200), Ok(single(&id, 222))),
        ]);

        let (first, second) = cancel_and_rerun(&session, &id, engine).await;

        assert!(matches!(first, Err(ApplicationError::Engine(EngineError::Network(_)))));
        assert_eq!(second.unwrap(), CompletionOutcome::Applied);
        assert_eq!(session.lock().await.executions().status(&id), ExecutionStatus::Completed);
    }
}
