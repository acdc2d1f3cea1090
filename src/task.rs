use std::fmt;

/// A unit of work that runs at most once.
///
/// Implemented for every `FnOnce() + Send + 'static`, so plain closures can
/// be scheduled directly. Implement it by hand for types that carry their
/// own state.
pub trait Task: Send + 'static {
    fn run(self: Box<Self>);
}

impl<F> Task for F
where
    F: FnOnce() + Send + 'static,
{
    #[inline]
    fn run(self: Box<Self>) {
        (*self)()
    }
}

/// Where a fired task's callback executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DispatchMode {
    /// On the firing thread, blocking further firing until it returns.
    #[default]
    Inline,
    /// On a fresh thread that nobody joins.
    Detached,
}

/// One scheduled unit of work.
pub struct TimerTask {
    pub(crate) id: u64,
    pub(crate) deadline_ns: u64,
    pub(crate) mode: DispatchMode,
    pub(crate) callback: Box<dyn Task>,
}

impl TimerTask {
    pub(crate) fn new(id: u64, deadline_ns: u64, mode: DispatchMode, callback: Box<dyn Task>) -> Self {
        Self {
            id,
            deadline_ns,
            mode,
            callback,
        }
    }

    #[inline(always)]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline(always)]
    pub fn deadline_ns(&self) -> u64 {
        self.deadline_ns
    }

    #[inline(always)]
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Run the callback on the current thread, ignoring the dispatch mode.
    #[inline]
    pub fn run(self) {
        self.callback.run()
    }
}

impl fmt::Debug for TimerTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerTask")
            .field("id", &self.id)
            .field("deadline_ns", &self.deadline_ns)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Receipt for a scheduled task.
///
/// Only created by a successful schedule call, so `id` is never zero.
/// Pass [`TimerHandle::id`] to `cancel` to revoke the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: u64,
    created_at_ns: u64,
    scheduled_at_ns: u64,
}

impl TimerHandle {
    pub(crate) fn new(id: u64, created_at_ns: u64, scheduled_at_ns: u64) -> Self {
        Self {
            id,
            created_at_ns,
            scheduled_at_ns,
        }
    }

    #[inline(always)]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Clock reading taken when the task was scheduled.
    #[inline(always)]
    pub fn created_at_ns(&self) -> u64 {
        self.created_at_ns
    }

    /// Absolute deadline: `created_at_ns` plus the requested delay.
    #[inline(always)]
    pub fn scheduled_at_ns(&self) -> u64 {
        self.scheduled_at_ns
    }

    #[inline(always)]
    pub fn delay_ns(&self) -> u64 {
        self.scheduled_at_ns - self.created_at_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Increment(Arc<AtomicUsize>);

    impl Task for Increment {
        fn run(self: Box<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_closure_is_task() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);

        let task = TimerTask::new(1, 10, DispatchMode::Inline, Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        task.run();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_custom_task() {
        let count = Arc::new(AtomicUsize::new(0));

        let task = TimerTask::new(7, 99, DispatchMode::Detached, Box::new(Increment(Arc::clone(&count))));
        assert_eq!(task.id(), 7);
        assert_eq!(task.deadline_ns(), 99);
        assert_eq!(task.mode(), DispatchMode::Detached);

        task.run();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handle_fields_are_independent() {
        let handle = TimerHandle::new(3, 1_000, 1_500);

        assert_eq!(handle.id(), 3);
        assert_eq!(handle.created_at_ns(), 1_000);
        assert_eq!(handle.scheduled_at_ns(), 1_500);
        assert_eq!(handle.delay_ns(), 500);
    }

    #[test]
    fn test_default_mode_is_inline() {
        assert_eq!(DispatchMode::default(), DispatchMode::Inline);
    }
}
