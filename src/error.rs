/// Recoverable failures reported to the immediate caller.
///
/// None of these leave the scheduler in a bad state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("timer capacity of {capacity} exceeded")]
    CapacityExceeded { capacity: u32 },
    #[error("clock unavailable")]
    ClockUnavailable,
    #[error("timer {id} not found")]
    NotFound { id: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            TimerError::CapacityExceeded { capacity: 2 }.to_string(),
            "timer capacity of 2 exceeded"
        );
        assert_eq!(TimerError::ClockUnavailable.to_string(), "clock unavailable");
        assert_eq!(TimerError::NotFound { id: 9 }.to_string(), "timer 9 not found");
    }
}
