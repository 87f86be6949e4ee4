use super::scheduler::Scheduler;
use crate::config::SchedulerSection;
use crate::metrics::{NoopMetrics, TimerMetrics};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, Span};

/// Builder for the scheduler
pub struct SchedulerBuilder {
    pub(crate) max_restarts: u32,
    pub(crate) backoff: Duration,
    pub(crate) metrics: Arc<dyn TimerMetrics>,
    pub(crate) span: Option<Span>,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerBuilder {
    /// Create a builder with the default restart policy
    /// (5 tolerated panics per timer, 5 second backoff) and no metrics.
    pub fn new() -> Self {
        Self::from_config(&SchedulerSection::default())
    }

    /// Create with the restart policy from the `[scheduler]` config section
    pub fn from_config(config: &SchedulerSection) -> Self {
        Self {
            max_restarts: config.max_restarts(),
            backoff: config.backoff(),
            metrics: Arc::new(NoopMetrics),
            span: None,
        }
    }

    /// Panics tolerated per timer before its handler is suppressed; 0 means unlimited
    pub fn max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    /// Delay after a panic before the timer ticks again
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn TimerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Span under which every scheduler and timer record is emitted
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Build the scheduler (does not start it yet)
    ///
    /// # Example
    ///
    /// ```rust
    /// use servicekit_runtime::SchedulerBuilder;
    /// use std::time::Duration;
    ///
    /// let scheduler = SchedulerBuilder::new()
    ///     .max_restarts(3)
    ///     .backoff(Duration::from_secs(1))
    ///     .build();
    ///
    /// assert_eq!(scheduler.timer_count(), 0);
    /// ```
    pub fn build(self) -> Scheduler {
        let span = self.span.unwrap_or_else(|| info_span!("scheduler"));

        span.in_scope(|| {
            info!(
                max_restarts = self.max_restarts,
                backoff_secs = self.backoff.as_secs_f64(),
                "Building scheduler"
            );
        });

        Scheduler::new(self.max_restarts, self.backoff, self.metrics, span)
    }
}
