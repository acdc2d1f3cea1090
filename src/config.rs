use std::time::Duration;

/// Upper bound on scheduler capacity.
pub const MAX_CAPACITY: u32 = 1_000_000;
pub const DEFAULT_CAPACITY: u32 = 1024;
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(1);
/// Floor applied to the check interval so the runner never spins on a zero wait.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_micros(1);

pub const DEFAULT_RUNNER_NAME: &str = "deadline-timer";
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(1);

/// Construction-time scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of pending tasks. Clamped to [`MAX_CAPACITY`].
    pub capacity: u32,
    /// Longest the background runner sleeps between checks.
    pub check_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

impl SchedulerConfig {
    pub fn new(capacity: u32, check_interval: Duration) -> Self {
        Self {
            capacity,
            check_interval,
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    /// Clamp both settings into their supported ranges.
    pub(crate) fn normalized(self) -> Self {
        Self {
            capacity: self.capacity.min(MAX_CAPACITY),
            check_interval: self.check_interval.max(MIN_CHECK_INTERVAL),
        }
    }
}

/// Settings for a [`BackgroundRunner`](crate::BackgroundRunner) thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// CPU core to pin the thread to. Pinning is best effort.
    pub core_id: Option<usize>,
    /// Thread name.
    pub name: String,
    /// Pause before a pass that returned early is started again.
    pub restart_delay: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            core_id: None,
            name: DEFAULT_RUNNER_NAME.to_owned(),
            restart_delay: DEFAULT_RESTART_DELAY,
        }
    }
}

impl RunnerConfig {
    pub fn with_core_id(mut self, core_id: usize) -> Self {
        self.core_id = Some(core_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_restart_delay(mut self, restart_delay: Duration) -> Self {
        self.restart_delay = restart_delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.check_interval, DEFAULT_CHECK_INTERVAL);

        let runner = RunnerConfig::default();
        assert_eq!(runner.core_id, None);
        assert_eq!(runner.name, DEFAULT_RUNNER_NAME);
        assert_eq!(runner.restart_delay, DEFAULT_RESTART_DELAY);
    }

    #[test]
    fn test_normalized_clamps() {
        let config = SchedulerConfig::new(u32::MAX, Duration::ZERO).normalized();

        assert_eq!(config.capacity, MAX_CAPACITY);
        assert_eq!(config.check_interval, MIN_CHECK_INTERVAL);
    }

    #[test]
    fn test_normalized_keeps_valid_values() {
        let config = SchedulerConfig::default()
            .with_capacity(16)
            .with_check_interval(Duration::from_millis(5))
            .normalized();

        assert_eq!(config, SchedulerConfig::new(16, Duration::from_millis(5)));
    }

    #[test]
    fn test_runner_builder() {
        let runner = RunnerConfig::default()
            .with_core_id(2)
            .with_name("timers")
            .with_restart_delay(Duration::from_millis(10));

        assert_eq!(runner.core_id, Some(2));
        assert_eq!(runner.name, "timers");
        assert_eq!(runner.restart_delay, Duration::from_millis(10));
    }
}
