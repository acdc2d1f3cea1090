use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, error, trace};

use crate::clock::{Clock, MonotonicClock};
use crate::config::{RunnerConfig, SchedulerConfig};
use crate::dispatch::dispatch;
use crate::error::TimerError;
use crate::queue::DeadlineQueue;
use crate::runner::{BackgroundRunner, Runnable};
use crate::task::{DispatchMode, Task, TimerHandle, TimerTask};

/// Bounded one-shot deadline timer.
///
/// Tasks are scheduled with a relative delay and fire at most once, in
/// deadline order, when [`check_now`](Self::check_now) or
/// [`fire_due`](Self::fire_due) runs past their deadline. A
/// [`BackgroundRunner`] started with [`start`](Self::start) does that
/// automatically, sleeping until the next deadline or the check interval,
/// whichever is sooner.
///
/// All `&self` methods lock. When no runner is attached,
/// [`exclusive`](Self::exclusive) hands out a lock-free view.
///
/// # Firing
///
/// One firing pass runs at a time. Inline callbacks may schedule and cancel
/// on the same scheduler, but must not call `check_now` or `fire_due` on it.
///
/// # Teardown
///
/// When the scheduler and every runner attached to it are gone, each task
/// still pending is run once on the dropping thread, whatever its dispatch
/// mode.
pub struct DeadlineScheduler<C: Clock = MonotonicClock> {
    shared: Arc<Shared<C>>,
}

struct Shared<C> {
    config: SchedulerConfig,
    clock: C,
    state: Mutex<State>,
    wakeup: Condvar,
    firing: Mutex<()>,
    /// Runner passes currently driving this scheduler.
    running: AtomicUsize,
}

struct State {
    queue: DeadlineQueue<TimerTask>,
    capacity: u32,
    next_id: u64,
    current_time_ns: u64,
    max_observed_delay_ns: u64,
    max_observed_size: u32,
}

impl DeadlineScheduler<MonotonicClock> {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl Default for DeadlineScheduler<MonotonicClock> {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl<C: Clock> DeadlineScheduler<C> {
    pub fn with_clock(config: SchedulerConfig, clock: C) -> Self {
        let config = config.normalized();
        let current_time_ns = clock.now_ns().unwrap_or(0);

        Self {
            shared: Arc::new(Shared {
                config,
                clock,
                state: Mutex::new(State::new(config.capacity, current_time_ns)),
                wakeup: Condvar::new(),
                firing: Mutex::new(()),
                running: AtomicUsize::new(0),
            }),
        }
    }

    /// Schedule `task` to fire `delay_ns` nanoseconds from now.
    pub fn schedule_ns(
        &self,
        delay_ns: u64,
        mode: DispatchMode,
        task: impl Task,
    ) -> Result<TimerHandle, TimerError> {
        let callback: Box<dyn Task> = Box::new(task);

        let handle = {
            let mut state = self.shared.lock_state();
            let now_ns = self.shared.now_ns()?;
            state.schedule(now_ns, delay_ns, mode, callback)?
        };

        if self.shared.is_running() {
            self.shared.wakeup.notify_all();
        }
        Ok(handle)
    }

    #[inline]
    pub fn schedule(
        &self,
        delay: Duration,
        mode: DispatchMode,
        task: impl Task,
    ) -> Result<TimerHandle, TimerError> {
        self.schedule_ns(duration_ns(delay), mode, task)
    }

    #[inline]
    pub fn schedule_millis(
        &self,
        delay_ms: u64,
        mode: DispatchMode,
        task: impl Task,
    ) -> Result<TimerHandle, TimerError> {
        self.schedule_ns(delay_ms.saturating_mul(1_000_000), mode, task)
    }

    #[inline]
    pub fn schedule_secs(
        &self,
        delay_secs: u32,
        mode: DispatchMode,
        task: impl Task,
    ) -> Result<TimerHandle, TimerError> {
        self.schedule_ns(u64::from(delay_secs) * 1_000_000_000, mode, task)
    }

    /// Revoke a pending task. `false` if it already fired, was cancelled,
    /// or never existed.
    pub fn cancel(&self, id: u64) -> bool {
        self.shared.lock_state().cancel(id)
    }

    pub fn try_cancel(&self, id: u64) -> Result<(), TimerError> {
        if self.cancel(id) {
            Ok(())
        } else {
            Err(TimerError::NotFound { id })
        }
    }

    /// Sample the clock and fire everything due, on the calling thread.
    ///
    /// Returns the number of tasks fired.
    pub fn check_now(&self) -> Result<usize, TimerError> {
        let now_ns = self.shared.now_ns()?;
        Ok(self.shared.fire_due(now_ns))
    }

    /// Fire every task whose deadline is at or before `now_ns`.
    pub fn fire_due(&self, now_ns: u64) -> usize {
        self.shared.fire_due(now_ns)
    }

    /// Make an attached runner re-evaluate right away.
    pub fn wake(&self) {
        let _state = self.shared.lock_state();
        self.shared.wakeup.notify_all();
    }

    /// Attach a background runner driving this scheduler.
    pub fn start(&self, config: RunnerConfig) -> io::Result<BackgroundRunner> {
        BackgroundRunner::spawn(
            SchedulerPass {
                shared: Arc::clone(&self.shared),
            },
            config,
        )
    }

    /// Lock-free access, available while no runner holds the scheduler.
    pub fn exclusive(&mut self) -> Option<ExclusiveScheduler<'_, C>> {
        let Shared { state, clock, .. } = Arc::get_mut(&mut self.shared)?;
        Some(ExclusiveScheduler {
            state: state.get_mut().unwrap_or_else(PoisonError::into_inner),
            clock,
        })
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.shared.lock_state().queue.peek_deadline()
    }

    pub fn len(&self) -> usize {
        self.shared.lock_state().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock_state().queue.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.shared.config.capacity
    }

    #[inline]
    pub fn config(&self) -> SchedulerConfig {
        self.shared.config
    }

    /// Whether any runner pass is currently driving this scheduler.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Last clock reading the scheduler observed.
    pub fn current_time_ns(&self) -> u64 {
        self.shared.lock_state().current_time_ns
    }

    /// Largest observed lateness of a fired task, in nanoseconds.
    pub fn max_observed_delay(&self) -> u64 {
        self.shared.lock_state().max_observed_delay_ns
    }

    /// Largest number of tasks pending at once.
    pub fn max_observed_size(&self) -> u32 {
        self.shared.lock_state().max_observed_size
    }
}

/// Unsynchronized view of a scheduler with no runner attached.
///
/// Holding it borrows the scheduler mutably, so nothing else can touch the
/// pending set while it is alive.
pub struct ExclusiveScheduler<'a, C> {
    state: &'a mut State,
    clock: &'a C,
}

impl<C: Clock> ExclusiveScheduler<'_, C> {
    pub fn schedule_ns(
        &mut self,
        delay_ns: u64,
        mode: DispatchMode,
        task: impl Task,
    ) -> Result<TimerHandle, TimerError> {
        let now_ns = self.clock.now_ns().ok_or_else(clock_unavailable)?;
        self.state.schedule(now_ns, delay_ns, mode, Box::new(task))
    }

    #[inline]
    pub fn schedule(
        &mut self,
        delay: Duration,
        mode: DispatchMode,
        task: impl Task,
    ) -> Result<TimerHandle, TimerError> {
        self.schedule_ns(duration_ns(delay), mode, task)
    }

    pub fn cancel(&mut self, id: u64) -> bool {
        self.state.cancel(id)
    }

    pub fn check_now(&mut self) -> Result<usize, TimerError> {
        let now_ns = self.clock.now_ns().ok_or_else(clock_unavailable)?;
        Ok(self.fire_due(now_ns))
    }

    pub fn fire_due(&mut self, now_ns: u64) -> usize {
        let mut fired = 0;
        while let Some(task) = self.state.pop_due(now_ns) {
            let deadline_ns = task.deadline_ns();
            dispatch(task);
            fired += 1;

            let observed_ns = self.clock.now_ns().unwrap_or(now_ns);
            self.state.record_fired(observed_ns.max(now_ns), deadline_ns);
        }
        fired
    }

    pub fn len(&self) -> usize {
        self.state.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.queue.is_empty()
    }
}

impl<C: Clock> Shared<C> {
    #[inline]
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) > 0
    }

    #[inline]
    fn now_ns(&self) -> Result<u64, TimerError> {
        self.clock.now_ns().ok_or_else(clock_unavailable)
    }

    fn fire_due(&self, now_ns: u64) -> usize {
        let _firing = self.firing.lock().unwrap_or_else(PoisonError::into_inner);

        let mut fired = 0;
        loop {
            let Some(task) = self.lock_state().pop_due(now_ns) else {
                break;
            };
            let deadline_ns = task.deadline_ns();

            // Lock released: the callback may schedule or cancel.
            dispatch(task);
            fired += 1;

            let observed_ns = self.clock.now_ns().unwrap_or(now_ns).max(now_ns);
            self.lock_state().record_fired(observed_ns, deadline_ns);
        }

        if fired > 0 {
            trace!(fired, now_ns, "fired due timers");
        }
        fired
    }

    /// How long the runner may sleep before the next check.
    fn sleep_timeout(&self, state: &State) -> Duration {
        let interval = self.config.check_interval;
        match (state.queue.peek_deadline(), self.clock.now_ns()) {
            (Some(deadline_ns), Some(now_ns)) => {
                Duration::from_nanos(deadline_ns.saturating_sub(now_ns)).min(interval)
            }
            _ => interval,
        }
    }
}

impl State {
    fn new(capacity: u32, current_time_ns: u64) -> Self {
        Self {
            queue: DeadlineQueue::with_capacity(capacity),
            capacity,
            next_id: 0,
            current_time_ns,
            max_observed_delay_ns: 0,
            max_observed_size: 0,
        }
    }

    fn schedule(
        &mut self,
        now_ns: u64,
        delay_ns: u64,
        mode: DispatchMode,
        callback: Box<dyn Task>,
    ) -> Result<TimerHandle, TimerError> {
        self.observe(now_ns);

        let capacity_exceeded = TimerError::CapacityExceeded {
            capacity: self.capacity,
        };
        if self.queue.is_full() {
            debug!(capacity = self.capacity, "timer capacity exhausted");
            return Err(capacity_exceeded);
        }

        let id = self.next_id + 1;
        let deadline_ns = now_ns.saturating_add(delay_ns);
        self.queue
            .push(id, deadline_ns, TimerTask::new(id, deadline_ns, mode, callback))
            .map_err(|_| capacity_exceeded)?;
        self.next_id = id;

        let size = self.queue.len() as u32;
        self.max_observed_size = self.max_observed_size.max(size);

        trace!(id, deadline_ns, ?mode, "timer scheduled");
        Ok(TimerHandle::new(id, now_ns, deadline_ns))
    }

    fn cancel(&mut self, id: u64) -> bool {
        let found = self.queue.remove(id).is_some();
        trace!(id, found, "timer cancel");
        found
    }

    fn pop_due(&mut self, now_ns: u64) -> Option<TimerTask> {
        self.observe(now_ns);
        self.queue.pop_due(now_ns).map(|entry| entry.value)
    }

    fn record_fired(&mut self, observed_ns: u64, deadline_ns: u64) {
        self.observe(observed_ns);
        self.max_observed_delay_ns = self
            .max_observed_delay_ns
            .max(observed_ns.saturating_sub(deadline_ns));
    }

    #[inline]
    fn observe(&mut self, now_ns: u64) {
        self.current_time_ns = self.current_time_ns.max(now_ns);
    }
}

impl Drop for State {
    fn drop(&mut self) {
        if !self.queue.is_empty() {
            debug!(pending = self.queue.len(), "draining pending timers");
        }

        while let Some(entry) = self.queue.pop() {
            let id = entry.id;
            if panic::catch_unwind(AssertUnwindSafe(|| entry.value.run())).is_err() {
                error!(id, "timer callback panicked during drain");
            }
        }
    }
}

/// One runner pass: sleep until the next deadline or the check interval,
/// then fire what is due. Loops until stopped.
struct SchedulerPass<C> {
    shared: Arc<Shared<C>>,
}

impl<C: Clock> Runnable for SchedulerPass<C> {
    fn run(&self, stop: &AtomicBool) {
        let shared = &*self.shared;
        shared.running.fetch_add(1, Ordering::AcqRel);
        let _running = RunningGuard(&shared.running);

        while !stop.load(Ordering::Acquire) {
            {
                let state = shared.lock_state();
                let timeout = shared.sleep_timeout(&state);
                if !timeout.is_zero() && !stop.load(Ordering::Acquire) {
                    drop(
                        shared
                            .wakeup
                            .wait_timeout(state, timeout)
                            .unwrap_or_else(PoisonError::into_inner),
                    );
                }
            }

            if stop.load(Ordering::Acquire) {
                break;
            }

            match shared.clock.now_ns() {
                Some(now_ns) => {
                    shared.fire_due(now_ns);
                }
                None => debug!("clock unavailable, skipping check"),
            }
        }
    }

    fn interrupt(&self) {
        let _state = self.shared.lock_state();
        self.shared.wakeup.notify_all();
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[inline]
fn duration_ns(delay: Duration) -> u64 {
    u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX)
}

#[inline]
fn clock_unavailable() -> TimerError {
    debug!("clock unavailable");
    TimerError::ClockUnavailable
}
