//! Self-restarting background thread.
//!
//! A [`BackgroundRunner`] owns one thread that keeps calling
//! [`Runnable::run`] until it is told to stop. A pass that returns early or
//! panics is logged and started again after a short pause; only
//! [`BackgroundRunner::terminate`] (or dropping the runner) ends the loop.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::RunnerConfig;

/// Work driven by a [`BackgroundRunner`].
pub trait Runnable: Send + Sync + 'static {
    /// Perform one pass.
    ///
    /// Long-running passes must poll `stop` and return soon after it is set.
    fn run(&self, stop: &AtomicBool);

    /// Wake a pass that is blocked on something other than `stop`.
    ///
    /// Called right after `stop` is set.
    fn interrupt(&self) {}
}

/// Handle to a running background thread.
///
/// Dropping the handle terminates the thread and joins it, unless the drop
/// happens on that very thread, in which case it is detached.
pub struct BackgroundRunner {
    stop: Arc<AtomicBool>,
    runnable: Arc<dyn Runnable>,
    handle: Option<JoinHandle<()>>,
    core_id: Option<usize>,
    name: String,
}

impl BackgroundRunner {
    pub fn spawn<R: Runnable>(runnable: R, config: RunnerConfig) -> io::Result<Self> {
        Self::spawn_shared(Arc::new(runnable), config)
    }

    /// Spawn a runner for a runnable the caller keeps a reference to.
    ///
    /// Returns once the thread has attempted core pinning, so
    /// [`core_id`](Self::core_id) is final.
    pub fn spawn_shared(runnable: Arc<dyn Runnable>, config: RunnerConfig) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (pinned_tx, pinned_rx) = mpsc::sync_channel(1);

        let handle = thread::Builder::new().name(config.name.clone()).spawn({
            let stop = Arc::clone(&stop);
            let runnable = Arc::clone(&runnable);
            let requested = config.core_id;
            let restart_delay = config.restart_delay;

            move || {
                let pinned = requested.filter(|&core_id| pin_to_core(core_id));
                if let (Some(core_id), None) = (requested, pinned) {
                    warn!(core_id, "could not pin runner thread, continuing unpinned");
                }
                // Receiver only disappears if spawn_shared itself unwound.
                let _ = pinned_tx.send(pinned);

                run_loop(runnable.as_ref(), &stop, restart_delay);
            }
        })?;

        let core_id = pinned_rx.recv().ok().flatten();
        info!(name = %config.name, ?core_id, "background runner started");

        Ok(Self {
            stop,
            runnable,
            handle: Some(handle),
            core_id,
            name: config.name,
        })
    }

    /// Ask the thread to stop. Does not wait for it.
    pub fn terminate(&self) {
        if self.stop.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(name = %self.name, "background runner terminating");

        self.runnable.interrupt();
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }

    /// `true` once termination was requested or the thread has exited.
    pub fn is_terminated(&self) -> bool {
        self.stop.load(Ordering::Acquire)
            || self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Core the thread is pinned to, `None` if unpinned.
    #[inline]
    pub fn core_id(&self) -> Option<usize> {
        self.core_id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for BackgroundRunner {
    fn drop(&mut self) {
        self.terminate();

        let Some(handle) = self.handle.take() else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            debug!(name = %self.name, "runner dropped from its own thread, detaching");
            return;
        }

        if handle.join().is_err() {
            error!(name = %self.name, "background runner thread panicked");
        }
        info!(name = %self.name, "background runner stopped");
    }
}

fn run_loop(runnable: &dyn Runnable, stop: &AtomicBool, restart_delay: Duration) {
    while !stop.load(Ordering::Acquire) {
        match panic::catch_unwind(AssertUnwindSafe(|| runnable.run(stop))) {
            Ok(()) => {
                if !stop.load(Ordering::Acquire) {
                    debug!("runner pass returned, restarting");
                }
            }
            Err(payload) => {
                error!(panic = panic_message(payload.as_ref()), "runner pass panicked, restarting");
            }
        }

        pause(stop, restart_delay);
    }

    stop.store(true, Ordering::Release);
}

/// Sleep for `delay`, cut short by `stop`.
fn pause(stop: &AtomicBool, delay: Duration) {
    let until = Instant::now() + delay;
    while !stop.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= until {
            break;
        }
        thread::park_timeout(until - now);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(target_os = "linux")]
fn pin_to_core(core_id: usize) -> bool {
    // Cores outside the process's allowed set are refused by the kernel.
    if core_id >= libc::CPU_SETSIZE as usize {
        return false;
    }

    // SAFETY: cpu_set_t is plain data, zeroed is the empty set, and
    // core_id was bounds-checked against CPU_SETSIZE above.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core_id, &mut set);
        libc::pthread_setaffinity_np(
            libc::pthread_self(),
            std::mem::size_of::<libc::cpu_set_t>(),
            &set,
        ) == 0
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_to_core(_core_id: usize) -> bool {
    false
}
