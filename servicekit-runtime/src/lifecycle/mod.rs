//! Ordered startup and shutdown of independently owned components.
//!
//! ```text
//! register(T1), register(T2), register(T3)
//! start_all: T1.after_start -> T2.after_start -> T3.after_start   (fail-fast)
//! stop_all:  T3.before_stop -> T2.before_stop -> T1.before_stop   (best-effort)
//! ```

mod manager;
mod task;

pub use manager::{LifecycleManager, LifecycleState};
pub use task::Task;
