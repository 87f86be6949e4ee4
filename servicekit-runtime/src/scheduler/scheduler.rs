use super::timer::{ActiveGuard, Handler, Timer};
use crate::error::SchedulerError;
use crate::metrics::TimerMetrics;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, info_span, warn, Instrument, Span};

/// State of one `start`..`stop` cycle
struct Run {
    token: CancellationToken,
    tracker: TaskTracker,
}

/// Periodic timer scheduler
///
/// Every registered timer gets its own loop on the tokio runtime. A panic
/// inside a handler is caught, counted and backed off; it never reaches
/// sibling timers or the caller of [`start`](Scheduler::start).
///
/// Timers added after `start` are stored but only run from the next `start`.
pub struct Scheduler {
    timers: RwLock<BTreeMap<String, Arc<Timer>>>,
    run: Mutex<Option<Run>>,
    active: Arc<AtomicUsize>,
    metrics: Arc<dyn TimerMetrics>,
    max_restarts: u32,
    backoff: Duration,
    span: Span,
}

impl Scheduler {
    pub(crate) fn new(
        max_restarts: u32,
        backoff: Duration,
        metrics: Arc<dyn TimerMetrics>,
        span: Span,
    ) -> Self {
        Self {
            timers: RwLock::new(BTreeMap::new()),
            run: Mutex::new(None),
            active: Arc::new(AtomicUsize::new(0)),
            metrics,
            max_restarts,
            backoff,
            span,
        }
    }

    /// Register a timer.
    ///
    /// The handler receives the run's cancellation token; it signals failure
    /// only by panicking.
    pub fn add_timer<F, Fut>(
        &self,
        name: impl Into<String>,
        interval: Duration,
        handler: F,
    ) -> Result<(), SchedulerError>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval { name });
        }

        let mut timers = self.timers.write().unwrap_or_else(PoisonError::into_inner);
        if timers.contains_key(&name) {
            return Err(SchedulerError::DuplicateName(name));
        }

        let boxed: Handler = Arc::new(move |ctx: CancellationToken| handler(ctx).boxed());
        let timer = Timer::new(
            name.clone(),
            interval,
            boxed,
            self.max_restarts,
            self.backoff,
        );
        timers.insert(name.clone(), Arc::new(timer));

        let _enter = self.span.enter();
        info!(name = %name, interval = ?interval, "Timer added");
        Ok(())
    }

    /// Spawn one loop per registered timer and return immediately.
    ///
    /// The run is bound to a child of `ctx`; cancelling `ctx` or calling
    /// [`stop`](Scheduler::stop) ends it. Must be called within a tokio runtime.
    pub fn start(&self, ctx: &CancellationToken) -> Result<(), SchedulerError> {
        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        if run.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let token = ctx.child_token();
        let tracker = TaskTracker::new();
        let timers: Vec<Arc<Timer>> = self
            .timers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let _enter = self.span.enter();
        if timers.is_empty() {
            info!("No timers configured, scheduler running idle");
        }

        for timer in &timers {
            let guard = ActiveGuard::acquire(&self.active, &self.metrics);
            let span = info_span!(parent: &self.span, "timer", timer = %timer.name);
            tracker.spawn(
                Arc::clone(timer)
                    .run(token.clone(), Arc::clone(&self.metrics), guard)
                    .instrument(span),
            );
        }
        tracker.close();

        if !timers.is_empty() {
            info!(timers_count = timers.len(), "Scheduler started");
        }

        *run = Some(Run { token, tracker });
        Ok(())
    }

    /// Cancel the run and wait for every loop to exit, or for `deadline`.
    ///
    /// Loops only observe cancellation between ticks, so a handler that is
    /// still executing delays them. Hitting the deadline is logged, not
    /// returned as an error. Without a prior `start` this is a no-op.
    pub async fn stop(&self, deadline: Instant) -> Result<(), SchedulerError> {
        let run = self.run.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(run) = run else {
            let _enter = self.span.enter();
            info!("Scheduler is not running");
            return Ok(());
        };

        async {
            info!("Stopping scheduler...");
            run.token.cancel();

            match time::timeout_at(deadline, run.tracker.wait()).await {
                Ok(()) => info!("All timers stopped gracefully"),
                Err(_) => warn!(
                    active_timers = self.active_timer_count(),
                    "Timeout waiting for timers to stop"
                ),
            }
        }
        .instrument(self.span.clone())
        .await;

        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Number of registered timers, independent of run state
    pub fn timer_count(&self) -> usize {
        self.timers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of timer loops currently alive
    pub fn active_timer_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Registered timer names, sorted
    pub fn timer_names(&self) -> Vec<String> {
        self.timers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Panics observed so far for `name`
    pub fn panic_count(&self, name: &str) -> Option<u32> {
        self.timers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|timer| timer.panic_count())
    }
}
