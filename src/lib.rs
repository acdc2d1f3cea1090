//! Bounded, nanosecond-resolution one-shot deadline timers.
//!
//! A [`DeadlineScheduler`] holds at most `capacity` pending tasks in a
//! fixed-size, index-addressable min-heap. Tasks fire at most once, in
//! deadline order, either inline on the firing thread or detached on a
//! thread of their own. A [`BackgroundRunner`] drives firing from a
//! dedicated, self-restarting thread that can be pinned to a CPU core.
//!
//! ```no_run
//! use std::time::Duration;
//! use deadline_timer::{DeadlineScheduler, DispatchMode, RunnerConfig, SchedulerConfig};
//!
//! let scheduler = DeadlineScheduler::new(SchedulerConfig::default().with_capacity(10_000));
//! let _runner = scheduler.start(RunnerConfig::default()).unwrap();
//!
//! let handle = scheduler
//!     .schedule(Duration::from_millis(5), DispatchMode::Inline, || println!("fired"))
//!     .unwrap();
//! scheduler.cancel(handle.id());
//! ```

mod clock;
mod config;
mod dispatch;
mod error;
mod queue;
mod runner;
mod scheduler;
mod slot;
mod task;

pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use config::{
    DEFAULT_CAPACITY, DEFAULT_CHECK_INTERVAL, DEFAULT_RESTART_DELAY, DEFAULT_RUNNER_NAME, MAX_CAPACITY,
    MIN_CHECK_INTERVAL, RunnerConfig, SchedulerConfig,
};
pub use dispatch::dispatch;
pub use error::TimerError;
pub use queue::{DeadlineQueue, Entry};
pub use runner::{BackgroundRunner, Runnable};
pub use scheduler::{DeadlineScheduler, ExclusiveScheduler};
pub use slot::{OutOfCapacity, Pool};
pub use task::{DispatchMode, Task, TimerHandle, TimerTask};
