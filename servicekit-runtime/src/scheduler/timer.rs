use crate::metrics::TimerMetrics;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Type-erased timer body
pub(crate) type Handler = Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, ()> + Send + Sync>;

/// A named periodic unit of work, owned by the scheduler.
pub(crate) struct Timer {
    pub(crate) name: String,
    pub(crate) interval: Duration,
    handler: Handler,
    /// Written only by this timer's own loop.
    panic_count: AtomicU32,
    /// 0 means unlimited.
    max_restarts: u32,
    backoff: Duration,
    disabled: AtomicBool,
}

/// Keeps the active-timer counter in step with a live loop.
pub(crate) struct ActiveGuard {
    active: Arc<AtomicUsize>,
    metrics: Arc<dyn TimerMetrics>,
}

impl ActiveGuard {
    pub(crate) fn acquire(active: &Arc<AtomicUsize>, metrics: &Arc<dyn TimerMetrics>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        metrics.inc_active_timers();
        Self {
            active: Arc::clone(active),
            metrics: Arc::clone(metrics),
        }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.metrics.dec_active_timers();
    }
}

impl Timer {
    pub(crate) fn new(
        name: String,
        interval: Duration,
        handler: Handler,
        max_restarts: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            name,
            interval,
            handler,
            panic_count: AtomicU32::new(0),
            max_restarts,
            backoff,
            disabled: AtomicBool::new(false),
        }
    }

    pub(crate) fn panic_count(&self) -> u32 {
        self.panic_count.load(Ordering::Acquire)
    }

    fn restarts_exhausted(&self) -> bool {
        self.max_restarts > 0 && self.panic_count() > self.max_restarts
    }

    /// Tick until `token` is cancelled.
    ///
    /// A timer that exhausted its restarts keeps ticking (and stays counted
    /// as active) but no longer runs its handler.
    pub(crate) async fn run(
        self: Arc<Self>,
        token: CancellationToken,
        metrics: Arc<dyn TimerMetrics>,
        _active: ActiveGuard,
    ) {
        info!("Timer started");

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let crashed = self.execute(&token, metrics.as_ref()).await;
            if crashed && !self.backoff.is_zero() {
                if !self.back_off(&token).await {
                    break;
                }
                ticker.reset();
            }
        }

        info!("Timer stopped");
    }

    /// Returns `false` if the run was cancelled during the backoff.
    async fn back_off(&self, token: &CancellationToken) -> bool {
        tokio::select! {
            _ = token.cancelled() => false,
            _ = time::sleep(self.backoff) => true,
        }
    }

    /// Run the handler once inside a panic boundary. Returns `true` on panic.
    async fn execute(&self, token: &CancellationToken, metrics: &dyn TimerMetrics) -> bool {
        if self.restarts_exhausted() {
            if !self.disabled.swap(true, Ordering::AcqRel) {
                error!(
                    panic_count = self.panic_count(),
                    max_restarts = self.max_restarts,
                    "Timer exceeded max panic restarts, disabling"
                );
            }
            return false;
        }

        let handler = Arc::clone(&self.handler);
        let ctx = token.clone();
        let invocation = AssertUnwindSafe(async move { handler(ctx).await }).catch_unwind();

        match invocation.await {
            Ok(()) => {
                metrics.record_timer_run(&self.name);
                false
            }
            Err(payload) => {
                let panic_count = self.panic_count.fetch_add(1, Ordering::AcqRel) + 1;
                error!(
                    panic = %panic_message(&*payload),
                    panic_count,
                    "Timer panic recovered"
                );
                metrics.record_timer_panic(&self.name);
                true
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
