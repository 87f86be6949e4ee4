use super::task::Task;
use crate::error::LifecycleError;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument, Span};

/// Phase of a [`LifecycleManager`].
///
/// `Starting -> Stopped` is taken directly when a start hook fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Ordered registry of [`Task`]s.
///
/// Tasks start in registration order and stop in the exact reverse order.
/// Starting is fail-fast; stopping always visits every task.
pub struct LifecycleManager {
    tasks: Mutex<Vec<Arc<dyn Task>>>,
    state: Mutex<LifecycleState>,
    span: Span,
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::with_span(info_span!("lifecycle"))
    }

    /// Create a manager whose log records are emitted under `span`
    pub fn with_span(span: Span) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            state: Mutex::new(LifecycleState::Idle),
            span,
        }
    }

    /// Append a task to the registry
    pub fn register(&self, task: Arc<dyn Task>) {
        let _enter = self.span.enter();
        info!(task = task.name(), "Task registered");
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }

    pub fn task_count(&self) -> usize {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Move `from -> to` atomically. Returns the actual state on mismatch.
    fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), LifecycleState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != from {
            return Err(*state);
        }
        *state = to;
        Ok(())
    }

    fn snapshot(&self) -> Vec<Arc<dyn Task>> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run every start hook sequentially, in registration order.
    ///
    /// Stops at the first failure. Tasks started before the failure are
    /// not rolled back; that is left to the caller.
    ///
    /// Only an `Idle` manager can be started; a manager is started once.
    pub async fn start_all(&self, ctx: CancellationToken) -> Result<(), LifecycleError> {
        if let Err(state) = self.transition(LifecycleState::Idle, LifecycleState::Starting) {
            self.span.in_scope(|| warn!(state = ?state, "Refusing to start tasks"));
            return Err(LifecycleError::NotIdle { state });
        }
        let tasks = self.snapshot();

        async {
            for task in &tasks {
                info!(task = task.name(), "Starting task");
                if let Err(source) = task.after_start(ctx.clone()).await {
                    error!(task = task.name(), error = %source, "Task failed to start");
                    self.set_state(LifecycleState::Stopped);
                    return Err(LifecycleError::TaskStart {
                        task: task.name().to_string(),
                        source,
                    });
                }
            }

            self.set_state(LifecycleState::Running);
            info!(tasks = tasks.len(), "All tasks started");
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Run every stop hook sequentially, in reverse registration order.
    ///
    /// Failures are logged and never abort the sweep; each task gets exactly
    /// one stop call. Always returns `Ok(())` once the sweep completes.
    ///
    /// The state only moves through `Stopping` to `Stopped` from `Running`.
    /// From any other state the sweep still runs and the state is left as is.
    pub async fn stop_all(&self, deadline: Instant) -> Result<(), LifecycleError> {
        let tasks = self.snapshot();
        let from_running = self
            .transition(LifecycleState::Running, LifecycleState::Stopping)
            .is_ok();

        async {
            if !from_running {
                info!(state = ?self.state(), "Stopping tasks that were not running");
            }
            for task in tasks.iter().rev() {
                info!(task = task.name(), "Stopping task");
                if let Err(err) = task.before_stop(deadline).await {
                    error!(task = task.name(), error = %err, "Error stopping task");
                }
            }

            if Instant::now() > deadline {
                warn!("Shutdown deadline elapsed while stopping tasks");
            }

            if from_running {
                self.set_state(LifecycleState::Stopped);
            }
            info!(tasks = tasks.len(), "All tasks stopped");
        }
        .instrument(self.span.clone())
        .await;

        Ok(())
    }
}
