//! Application composition.
//!
//! # Data Flow
//! ```text
//! App::new(config)
//!     → MetricsServer (exporter, timer metrics sink)
//!     → Scheduler (restart policy from config, metrics as collaborator)
//!     → LifecycleManager (metrics server registered first)
//!
//! App::run(shutdown)
//!     → lifecycle.start_all → scheduler.start
//!     → wait for shutdown
//!     → scheduler.stop → lifecycle.stop_all   (one shared deadline)
//! ```

use crate::config::ServiceConfig;
use crate::error::{AppError, ConfigError};
use crate::lifecycle::{LifecycleManager, Task};
use crate::metrics::{MetricsServer, TimerMetrics};
use crate::scheduler::{Scheduler, SchedulerBuilder};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct App {
    config: ServiceConfig,
    metrics: Arc<MetricsServer>,
    scheduler: Scheduler,
    lifecycle: LifecycleManager,
}

impl App {
    pub fn new(config: ServiceConfig) -> Result<Self, ConfigError> {
        let metrics = Arc::new(MetricsServer::from_config(&config.metrics)?);

        let scheduler = SchedulerBuilder::from_config(&config.scheduler)
            .metrics(Arc::clone(&metrics) as Arc<dyn TimerMetrics>)
            .build();

        let lifecycle = LifecycleManager::new();
        lifecycle.register(Arc::clone(&metrics) as Arc<dyn Task>);

        Ok(Self {
            config,
            metrics,
            scheduler,
            lifecycle,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Scheduler for registering timers before `run`
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn metrics(&self) -> &MetricsServer {
        &self.metrics
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn register_task(&self, task: Arc<dyn Task>) {
        self.lifecycle.register(task);
    }

    /// Register every timer from the `[timers]` config section.
    ///
    /// `handler` is invoked with the timer name on each tick.
    pub fn add_configured_timers<F, Fut>(&self, handler: F) -> Result<(), AppError>
    where
        F: Fn(String, CancellationToken) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        for (name, interval) in self.config.timer_intervals()? {
            let handler = handler.clone();
            let timer = name.clone();
            self.scheduler
                .add_timer(name, interval, move |ctx| handler(timer.clone(), ctx))?;
        }
        Ok(())
    }

    /// Start everything, wait for `shutdown`, then stop everything.
    ///
    /// Start failures are returned. Stop failures are only logged.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), AppError> {
        info!(
            service = %self.config.service.name,
            version = env!("CARGO_PKG_VERSION"),
            "Application starting"
        );

        self.lifecycle.start_all(shutdown.clone()).await?;
        self.scheduler.start(&shutdown)?;

        info!("Application started successfully");

        shutdown.cancelled().await;

        info!("Application shutting down...");
        let deadline = Instant::now() + self.config.service.shutdown_timeout();

        if let Err(e) = self.scheduler.stop(deadline).await {
            error!(error = %e, "Error stopping scheduler");
        }
        if let Err(e) = self.lifecycle.stop_all(deadline).await {
            error!(error = %e, "Error stopping lifecycle tasks");
        }

        info!("Application stopped gracefully");
        Ok(())
    }
}
