//! # Servicekit - long-running services with crash-isolated timers
//!
//! Build a foreground service out of periodic timers and ordered lifecycle
//! tasks. Under systemd (or any other supervisor) the binary runs until it
//! receives `SIGINT`, `SIGTERM` or `SIGQUIT`, then drains its timers and
//! stops its tasks in reverse registration order.
//!
//! ## Features
//!
//! - **Crash isolation**: a panicking timer handler never takes down siblings
//! - **Bounded restarts**: a timer that keeps panicking is disabled after `max_panic_restarts`
//! - **Backoff**: a timer that panicked waits `backoff_seconds` before ticking again
//! - **Ordered lifecycle**: tasks start in order (fail-fast) and stop in reverse (best-effort)
//! - **Metrics**: optional Prometheus exporter with `/metrics` and `/health`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use servicekit::{platform, App, ServiceConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = App::new(ServiceConfig::default())?;
//!
//!     app.scheduler().add_timer("heartbeat", Duration::from_secs(5), |_ctx| async {
//!         tracing::info!("still alive");
//!     })?;
//!
//!     platform::run(&app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Create `configs/config.toml`:
//!
//! ```toml
//! [service]
//! name = "servicekit"
//! log_dir = "./logs"
//!
//! [scheduler]
//! max_panic_restarts = 5
//! backoff_seconds = 5
//!
//! [metrics]
//! enabled = true
//! listen = ":9090"
//!
//! [timers]
//! every_5s = "5s"
//! every_15m = "15m"
//! ```
//!
//! Environment variables with the `APP_` prefix override file values,
//! using `__` between sections:
//!
//! ```bash
//! export APP_METRICS__ENABLED=false
//! export APP_SCHEDULER__BACKOFF_SECONDS=10
//! ```

// Re-export core types
pub use servicekit_runtime::{
    init_logging, load_config, load_toml_config, load_yaml_config, parse_interval, platform, App,
    AppError, ConfigError, LifecycleError, LifecycleManager, LifecycleState, LoggingError,
    MetricsServer, NoopMetrics, Scheduler, SchedulerBuilder, SchedulerError, ServiceConfig, Task,
    TaskError, TimerMetrics,
};

// Full runtime for less common types (config sections, FileFormat)
pub use servicekit_runtime;
