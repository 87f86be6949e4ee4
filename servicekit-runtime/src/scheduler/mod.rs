//! Crash-isolated periodic timers.
//!
//! ```text
//! add_timer(name, interval, handler)      registry (RwLock<BTreeMap>)
//! start(ctx) ──▶ one loop per timer ──▶ tick ─▶ restarts exhausted? ─▶ skip
//!                                         │
//!                                         └─▶ catch_unwind(handler) ─▶ ok: record run
//!                                                                    └▶ panic: count, record, backoff
//! stop(deadline) ──▶ cancel run token ──▶ wait for loops (bounded by deadline)
//! ```

mod builder;
mod scheduler;
mod timer;

pub use builder::SchedulerBuilder;
pub use scheduler::Scheduler;
