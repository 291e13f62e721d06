use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(JobId)
            .map_err(|_| SchedulerError::InvalidJob(format!("invalid job id '{s}'")))
    }
}

/// Identifies a task by its job and its position in the job's declaration order.
///
/// Ordering is by job first, then index, so a `BTreeMap<TaskId, _>` iterates
/// tasks in the order they were declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId {
    pub job: JobId,
    pub index: u32,
}

impl TaskId {
    pub fn new(job: JobId, index: u32) -> Self {
        Self { job, index }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}t{}", self.job, self.index)
    }
}

impl FromStr for TaskId {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SchedulerError::InvalidJob(format!("invalid task id '{s}'"));
        let (job, index) = s.trim().split_once('t').ok_or_else(invalid)?;
        let job = job.parse::<JobId>().map_err(|_| invalid())?;
        let index = index.parse::<u32>().map_err(|_| invalid())?;
        Ok(TaskId { job, index })
    }
}

/// Monotonic id source. The first value handed out is 1.
#[derive(Debug, Default)]
pub struct IdCounter {
    last: AtomicU64,
}

impl IdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume numbering after `last`, e.g. once persisted jobs are recovered.
    pub fn starting_after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Raise the counter so the next value is greater than `value`.
    pub fn bump_to(&self, value: u64) {
        self.last.fetch_max(value, Ordering::SeqCst);
    }

    pub fn last(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn task_id_display_and_parse() {
        let id = TaskId::new(JobId::new(12), 3);
        assert_eq!(id.to_string(), "12t3");
        assert_eq!("12t3".parse::<TaskId>().unwrap(), id);
        assert!("12x3".parse::<TaskId>().is_err());
        assert!("t3".parse::<TaskId>().is_err());
    }

    #[test]
    fn task_ids_order_by_job_then_index() {
        let a = TaskId::new(JobId::new(1), 9);
        let b = TaskId::new(JobId::new(2), 0);
        let c = TaskId::new(JobId::new(2), 1);
        assert!(a < b && b < c);
    }

    #[test]
    fn counter_starts_at_one_and_resumes() {
        let counter = IdCounter::new();
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);

        let resumed = IdCounter::starting_after(41);
        assert_eq!(resumed.next(), 42);
        resumed.bump_to(10);
        assert_eq!(resumed.next(), 43);
        resumed.bump_to(100);
        assert_eq!(resumed.next(), 101);
    }

    #[test]
    fn counter_never_repeats_across_threads() {
        let counter = Arc::new(IdCounter::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || (0..250).map(|_| counter.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(seen.insert(value));
            }
        }
        assert_eq!(seen.len(), 1000);
        assert_eq!(counter.last(), 1000);
    }
}
