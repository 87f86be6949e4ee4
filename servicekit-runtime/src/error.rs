//! Error types for the service runtime.
//!
//! Registration-time failures ([`SchedulerError`]) and startup failures
//! ([`LifecycleError`]) are returned to the caller. Handler panics and task
//! stop failures never surface here; they are logged where they happen.

use crate::lifecycle::LifecycleState;
use thiserror::Error;

/// Error returned by a [`Task`](crate::Task) hook.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the [`Scheduler`](crate::Scheduler).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchedulerError {
    /// A timer with this name is already registered.
    #[error("timer {0} already exists")]
    DuplicateName(String),

    /// `start` was called while a previous run is still active.
    #[error("scheduler already running")]
    AlreadyRunning,

    /// Timer intervals must be strictly positive.
    #[error("timer {name} has a zero interval")]
    InvalidInterval { name: String },
}

/// Errors produced by the [`LifecycleManager`](crate::LifecycleManager).
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A task's start hook failed; later tasks were not started.
    #[error("failed to start task {task}")]
    TaskStart {
        task: String,
        #[source]
        source: TaskError,
    },

    /// `start_all` was called on a manager that already left `Idle`.
    #[error("cannot start tasks from state {state:?}")]
    NotIdle { state: LifecycleState },
}

impl LifecycleError {
    /// Name of the task that caused the failure, if a task did.
    pub fn task_name(&self) -> Option<&str> {
        match self {
            LifecycleError::TaskStart { task, .. } => Some(task),
            LifecycleError::NotIdle { .. } => None,
        }
    }
}

/// Errors raised while loading [`ServiceConfig`](crate::ServiceConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid interval '{value}' for timer {timer}")]
    InvalidInterval { timer: String, value: String },

    #[error("invalid metrics listen address '{value}'")]
    InvalidListen { value: String },
}

/// Errors raised while installing the log subscriber.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("failed to prepare log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}

/// Top-level error returned by [`App::run`](crate::App::run).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("failed to start lifecycle tasks: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("failed to start scheduler: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to wait for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}
