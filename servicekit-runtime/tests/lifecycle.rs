mod common;

use async_trait::async_trait;
use servicekit_runtime::{
    AppError, LifecycleError, LifecycleManager, LifecycleState, Task, TaskError,
};
use std::error::Error;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Task that records the manager state seen from inside its hooks
#[derive(Default)]
struct StateWatcher {
    manager: OnceLock<Weak<LifecycleManager>>,
    seen: Mutex<Vec<(&'static str, LifecycleState)>>,
}

impl StateWatcher {
    fn attach(manager: &Arc<LifecycleManager>) -> Arc<Self> {
        let watcher = Arc::new(Self::default());
        let _ = watcher.manager.set(Arc::downgrade(manager));
        manager.register(Arc::clone(&watcher) as Arc<dyn Task>);
        watcher
    }

    fn record(&self, hook: &'static str) {
        if let Some(manager) = self.manager.get().and_then(Weak::upgrade) {
            self.seen.lock().unwrap().push((hook, manager.state()));
        }
    }

    fn seen(&self) -> Vec<(&'static str, LifecycleState)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Task for StateWatcher {
    fn name(&self) -> &str {
        "state-watcher"
    }

    async fn after_start(&self, _ctx: CancellationToken) -> Result<(), TaskError> {
        self.record("start");
        Ok(())
    }

    async fn before_stop(&self, _deadline: Instant) -> Result<(), TaskError> {
        self.record("stop");
        Ok(())
    }
}

#[derive(Debug)]
struct ConnectError;

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("connection refused")
    }
}

impl Error for ConnectError {}

struct Database;

#[async_trait]
impl Task for Database {
    fn name(&self) -> &str {
        "database"
    }

    async fn after_start(&self, _ctx: CancellationToken) -> Result<(), TaskError> {
        Err(Box::new(ConnectError))
    }

    async fn before_stop(&self, _deadline: Instant) -> Result<(), TaskError> {
        Ok(())
    }
}

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(5)
}

#[tokio::test]
async fn test_hooks_observe_transitional_states() {
    let manager = Arc::new(LifecycleManager::new());
    let watcher = StateWatcher::attach(&manager);

    manager.start_all(CancellationToken::new()).await.unwrap();
    manager.stop_all(deadline()).await.unwrap();

    assert_eq!(
        watcher.seen(),
        vec![
            ("start", LifecycleState::Starting),
            ("stop", LifecycleState::Stopping),
        ]
    );
    assert_eq!(manager.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_stop_before_start_never_enters_stopping() {
    let manager = Arc::new(LifecycleManager::new());
    let watcher = StateWatcher::attach(&manager);

    manager.stop_all(deadline()).await.unwrap();

    assert_eq!(watcher.seen(), vec![("stop", LifecycleState::Idle)]);
    assert_eq!(manager.state(), LifecycleState::Idle);

    // the manager was never started, so it still can be
    manager.start_all(CancellationToken::new()).await.unwrap();
    assert_eq!(manager.state(), LifecycleState::Running);
}

#[tokio::test]
async fn test_start_after_stop_is_rejected() {
    let manager = Arc::new(LifecycleManager::new());
    let watcher = StateWatcher::attach(&manager);

    manager.start_all(CancellationToken::new()).await.unwrap();
    manager.stop_all(deadline()).await.unwrap();

    let err = manager.start_all(CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "cannot start tasks from state Stopped");
    assert_eq!(manager.state(), LifecycleState::Stopped);
    assert_eq!(watcher.seen().len(), 2);
}

#[tokio::test]
async fn test_start_error_keeps_task_error_as_source() {
    let manager = LifecycleManager::new();
    manager.register(Arc::new(Database));

    let err = manager.start_all(CancellationToken::new()).await.unwrap_err();
    assert_eq!(manager.state(), LifecycleState::Stopped);

    let source = err.source().expect("task error is the source");
    assert!(source.downcast_ref::<ConnectError>().is_some());
    assert_eq!(source.to_string(), "connection refused");

    let app_err = AppError::from(err);
    assert_eq!(
        app_err.to_string(),
        "failed to start lifecycle tasks: failed to start task database"
    );
    let lifecycle = app_err
        .source()
        .and_then(|e| e.downcast_ref::<LifecycleError>())
        .expect("lifecycle error is the source");
    assert_eq!(lifecycle.task_name(), Some("database"));
}

#[test]
fn test_records_are_emitted_under_injected_span() {
    let output = common::capture_logs(|| {
        let manager = LifecycleManager::with_span(tracing::info_span!("checkout_lifecycle"));
        manager.register(Arc::new(Database));
    });

    assert!(output.contains("checkout_lifecycle"), "{output}");
    assert!(output.contains("Task registered"), "{output}");
}
