use serde::{Deserialize, Serialize};

/// What happens to the job when one of its tasks ends in error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnTaskError {
    /// Keep going; the task is marked faulty.
    #[default]
    None,
    /// Cancel the whole job once the task has no execution left.
    CancelJob,
    /// Park the task in error until someone restarts or finishes it.
    SuspendTask,
    /// Park the task in error and pause the rest of the job.
    PauseJob,
}

impl OnTaskError {
    pub fn cancels_job(&self) -> bool {
        *self == OnTaskError::CancelJob
    }

    pub fn suspends_task(&self) -> bool {
        *self == OnTaskError::SuspendTask
    }

    pub fn pauses_job(&self) -> bool {
        *self == OnTaskError::PauseJob
    }
}

/// Where a task may run again after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartMode {
    #[default]
    Anywhere,
    /// Never on a node the task already ran on.
    Elsewhere,
}

/// Wait time before a task is re-executed after an error.
///
/// Grows by `step_ms * n` for the n-th re-execution and is flat at `max_ms`
/// past the tenth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartBackoff {
    pub initial_ms: u64,
    pub step_ms: u64,
    pub max_ms: u64,
}

impl Default for RestartBackoff {
    fn default() -> Self {
        Self {
            initial_ms: 1000,
            step_ms: 1000,
            max_ms: 60_000,
        }
    }
}

impl RestartBackoff {
    /// wait(n) = initial for n <= 0, max for n > 10, else wait(n - 1) + n * step.
    pub fn next_waiting_time(&self, execution_number: i64) -> u64 {
        if execution_number <= 0 {
            return self.initial_ms;
        }
        if execution_number > 10 {
            return self.max_ms;
        }
        let n = execution_number as u64;
        self.initial_ms
            .saturating_add(self.step_ms.saturating_mul(n * (n + 1) / 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_matches_recurrence() {
        let backoff = RestartBackoff::default();
        assert_eq!(backoff.next_waiting_time(-3), 1000);
        assert_eq!(backoff.next_waiting_time(0), 1000);
        assert_eq!(backoff.next_waiting_time(1), 2000);
        assert_eq!(backoff.next_waiting_time(2), 4000);
        assert_eq!(backoff.next_waiting_time(3), 7000);

        let mut expected = backoff.initial_ms;
        for n in 1..=10u64 {
            expected += n * backoff.step_ms;
            assert_eq!(backoff.next_waiting_time(n as i64), expected);
        }
        assert_eq!(backoff.next_waiting_time(11), 60_000);
        assert_eq!(backoff.next_waiting_time(500), 60_000);
    }

    #[test]
    fn backoff_with_small_steps() {
        let backoff = RestartBackoff {
            initial_ms: 5,
            step_ms: 1,
            max_ms: 50,
        };
        assert_eq!(backoff.next_waiting_time(4), 15);
        assert_eq!(backoff.next_waiting_time(12), 50);
    }

    #[test]
    fn backoff_saturates_on_huge_values() {
        let backoff = RestartBackoff {
            initial_ms: u64::MAX - 10,
            step_ms: u64::MAX / 2,
            max_ms: u64::MAX,
        };
        assert_eq!(backoff.next_waiting_time(0), u64::MAX - 10);
        assert_eq!(backoff.next_waiting_time(3), u64::MAX);
        assert_eq!(backoff.next_waiting_time(10), u64::MAX);
    }

    #[test]
    fn policy_predicates() {
        assert!(OnTaskError::CancelJob.cancels_job());
        assert!(!OnTaskError::None.cancels_job());
        assert!(OnTaskError::SuspendTask.suspends_task());
        assert!(OnTaskError::PauseJob.pauses_job());
        assert_eq!(OnTaskError::default(), OnTaskError::None);
        assert_eq!(RestartMode::default(), RestartMode::Anywhere);
    }
}
