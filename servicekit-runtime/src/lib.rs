//! Servicekit Runtime - crash-isolated timers and ordered task lifecycle
//!
//! This crate provides the building blocks of a long-running service:
//! a periodic timer [`Scheduler`] that survives handler panics, a
//! [`LifecycleManager`] that starts tasks in order and stops them in reverse,
//! and the config, logging and metrics plumbing that [`App`] wires together.

mod app;
mod config;
mod error;
mod lifecycle;
mod logging;
mod metrics;
pub mod platform;
mod scheduler;
mod time_unit;

// Re-export public API
pub use app::App;
pub use config::{
    load_config, load_toml_config, load_yaml_config, MetricsSection, SchedulerSection,
    ServiceConfig, ServiceSection,
};
pub use error::{AppError, ConfigError, LifecycleError, LoggingError, SchedulerError, TaskError};
pub use lifecycle::{LifecycleManager, LifecycleState, Task};
pub use logging::init as init_logging;
pub use metrics::{MetricsServer, NoopMetrics, TimerMetrics};
pub use scheduler::{Scheduler, SchedulerBuilder};
pub use time_unit::parse_interval;

pub use ::config::FileFormat;
