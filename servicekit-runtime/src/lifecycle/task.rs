use crate::error::TaskError;
use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Component with ordered start/stop hooks
///
/// Implement this trait on anything that must be brought up before the
/// scheduler starts ticking and torn down after it stops: servers,
/// connection pools, caches.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use servicekit_runtime::{Task, TaskError};
/// use tokio::time::Instant;
/// use tokio_util::sync::CancellationToken;
///
/// struct CacheWarmer;
///
/// #[async_trait]
/// impl Task for CacheWarmer {
///     fn name(&self) -> &str {
///         "cache-warmer"
///     }
///
///     async fn after_start(&self, _ctx: CancellationToken) -> Result<(), TaskError> {
///         Ok(())
///     }
///
///     async fn before_stop(&self, _deadline: Instant) -> Result<(), TaskError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync {
    /// Stable name used in logs and start errors
    fn name(&self) -> &str;

    /// Called once when the service starts, in registration order.
    ///
    /// `ctx` is cancelled when the service begins shutting down; background
    /// work spawned here should observe it.
    async fn after_start(&self, ctx: CancellationToken) -> Result<(), TaskError>;

    /// Called once when the service stops, in reverse registration order.
    async fn before_stop(&self, deadline: Instant) -> Result<(), TaskError>;
}
