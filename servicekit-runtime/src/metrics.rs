//! Timer metrics and the Prometheus exporter.
//!
//! # Metrics
//! - `timer_runs_total{timer}` (counter): completed handler invocations
//! - `timer_panics_total{timer}` (counter): handler panics
//! - `active_timers` (gauge): timer loops currently alive
//! - `service_uptime_seconds` (counter): seconds since the exporter started
//!
//! The recorder is owned by the [`MetricsServer`] instead of being installed
//! globally, so several servers can coexist in one process.

use crate::config::MetricsSection;
use crate::error::{ConfigError, TaskError};
use crate::lifecycle::Task;
use async_trait::async_trait;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Sink for scheduler counters. Every call is fire-and-forget.
pub trait TimerMetrics: Send + Sync {
    fn record_timer_run(&self, timer: &str);
    fn record_timer_panic(&self, timer: &str);
    fn inc_active_timers(&self);
    fn dec_active_timers(&self);
}

/// Stand-in used when no metrics collaborator is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl TimerMetrics for NoopMetrics {
    fn record_timer_run(&self, _timer: &str) {}
    fn record_timer_panic(&self, _timer: &str) {}
    fn inc_active_timers(&self) {}
    fn dec_active_timers(&self) {}
}

struct Running {
    token: CancellationToken,
    tracker: TaskTracker,
    local_addr: SocketAddr,
}

#[derive(Clone)]
struct ExporterState {
    handle: PrometheusHandle,
    started_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    started_at: String,
}

/// HTTP exporter serving `/metrics` and `/health`.
pub struct MetricsServer {
    enabled: bool,
    listen: SocketAddr,
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
    started_at: DateTime<Utc>,
    running: Mutex<Option<Running>>,
}

impl MetricsServer {
    pub fn new(enabled: bool, listen: SocketAddr) -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        Self {
            enabled,
            listen,
            recorder: Arc::new(recorder),
            handle,
            started_at: Utc::now(),
            running: Mutex::new(None),
        }
    }

    pub fn from_config(config: &MetricsSection) -> Result<Self, ConfigError> {
        Ok(Self::new(config.enabled, config.listen_addr()?))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Address the exporter is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|running| running.local_addr)
    }

    /// Current metrics in the Prometheus text format
    pub fn render(&self) -> String {
        if !self.enabled {
            return String::new();
        }
        self.handle.render()
    }

    fn with_recorder(&self, f: impl FnOnce()) {
        if self.enabled {
            ::metrics::with_local_recorder(self.recorder.as_ref(), f);
        }
    }

    fn router(&self) -> Router {
        let state = ExporterState {
            handle: self.handle.clone(),
            started_at: self.started_at,
        };
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(state)
    }
}

async fn metrics_handler(State(state): State<ExporterState>) -> String {
    state.handle.render()
}

async fn health_handler(State(state): State<ExporterState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        started_at: state.started_at.to_rfc3339(),
    })
}

async fn tick_uptime(recorder: Arc<PrometheusRecorder>, token: CancellationToken) {
    let period = Duration::from_secs(1);
    let mut ticker = time::interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {
                ::metrics::with_local_recorder(recorder.as_ref(), || {
                    ::metrics::counter!("service_uptime_seconds").increment(1);
                });
            }
        }
    }
}

impl TimerMetrics for MetricsServer {
    fn record_timer_run(&self, timer: &str) {
        self.with_recorder(|| {
            ::metrics::counter!("timer_runs_total", "timer" => timer.to_string()).increment(1);
        });
    }

    fn record_timer_panic(&self, timer: &str) {
        self.with_recorder(|| {
            ::metrics::counter!("timer_panics_total", "timer" => timer.to_string()).increment(1);
        });
    }

    fn inc_active_timers(&self) {
        self.with_recorder(|| ::metrics::gauge!("active_timers").increment(1.0));
    }

    fn dec_active_timers(&self) {
        self.with_recorder(|| ::metrics::gauge!("active_timers").decrement(1.0));
    }
}

#[async_trait]
impl Task for MetricsServer {
    fn name(&self) -> &str {
        "metrics-server"
    }

    /// Bind and serve until `before_stop`. The server outlives the run
    /// context so `/metrics` stays scrapeable while timers drain.
    async fn after_start(&self, _ctx: CancellationToken) -> Result<(), TaskError> {
        if !self.enabled {
            info!("Metrics server is disabled");
            return Ok(());
        }

        let listener = TcpListener::bind(self.listen).await?;
        let local_addr = listener.local_addr()?;
        info!(listen = %local_addr, "Starting metrics server");

        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        let router = self.router();
        let shutdown = token.clone();
        tracker.spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
            {
                error!(error = %e, "Metrics server error");
            }
        });
        tracker.spawn(tick_uptime(Arc::clone(&self.recorder), token.clone()));
        tracker.close();

        *self.running.lock().unwrap_or_else(PoisonError::into_inner) = Some(Running {
            token,
            tracker,
            local_addr,
        });
        Ok(())
    }

    async fn before_stop(&self, deadline: Instant) -> Result<(), TaskError> {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = running else {
            return Ok(());
        };

        info!("Stopping metrics server");
        running.token.cancel();
        if time::timeout_at(deadline, running.tracker.wait()).await.is_err() {
            warn!("Timeout waiting for metrics server to stop");
            return Err("metrics server did not stop before the shutdown deadline".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_counters_are_rendered_per_timer() {
        let server = MetricsServer::new(true, loopback());
        server.record_timer_run("every_5s");
        server.record_timer_run("every_5s");
        server.record_timer_panic("flaky");
        server.inc_active_timers();

        let output = server.render();
        assert!(output.contains("timer_runs_total{timer=\"every_5s\"} 2"));
        assert!(output.contains("timer_panics_total{timer=\"flaky\"} 1"));
        assert!(output.contains("active_timers"));
    }

    #[test]
    fn test_disabled_server_records_nothing() {
        let server = MetricsServer::new(false, loopback());
        server.record_timer_run("every_5s");
        server.inc_active_timers();
        assert!(server.render().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_hooks_are_noops() {
        let server = MetricsServer::new(false, loopback());
        server.after_start(CancellationToken::new()).await.unwrap();
        assert!(server.local_addr().is_none());
        server
            .before_stop(Instant::now() + Duration::from_secs(1))
            .await
            .unwrap();
    }

    #[test]
    fn test_from_config_rejects_bad_listen() {
        let section = MetricsSection {
            enabled: true,
            listen: "nowhere".to_string(),
        };
        assert!(MetricsServer::from_config(&section).is_err());
    }
}
