use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Lifecycle status of a job as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Submitted, no task started yet.
    Pending,
    /// At least one task is running.
    Running,
    /// Started, but no task is running right now.
    Stalled,
    Paused,
    /// A task is suspended in error and waits for a user decision.
    InError,
    Finished,
    Canceled,
    /// Ended because a task exhausted its node failure budget.
    Failed,
    Killed,
}

impl JobStatus {
    pub fn is_alive(&self) -> bool {
        matches!(
            self,
            JobStatus::Pending
                | JobStatus::Running
                | JobStatus::Stalled
                | JobStatus::Paused
                | JobStatus::InError
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "Pending",
            JobStatus::Running => "Running",
            JobStatus::Stalled => "Stalled",
            JobStatus::Paused => "Paused",
            JobStatus::InError => "In-Error",
            JobStatus::Finished => "Finished",
            JobStatus::Canceled => "Canceled",
            JobStatus::Failed => "Failed",
            JobStatus::Killed => "Killed",
        };
        f.write_str(s)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Submitted,
    Pending,
    Paused,
    Running,
    WaitingOnError,
    WaitingOnFailure,
    InError,
    /// The task's nodes kept failing.
    Failed,
    NotStarted,
    NotRestarted,
    Aborted,
    Faulty,
    Finished,
    Skipped,
}

impl TaskStatus {
    pub fn is_alive(&self) -> bool {
        matches!(
            self,
            TaskStatus::Submitted
                | TaskStatus::Pending
                | TaskStatus::Paused
                | TaskStatus::Running
                | TaskStatus::WaitingOnError
                | TaskStatus::WaitingOnFailure
                | TaskStatus::InError
        )
    }

    /// Finished, Failed, Faulty or Skipped: the task has produced its final outcome.
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            TaskStatus::Finished | TaskStatus::Failed | TaskStatus::Faulty | TaskStatus::Skipped
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Submitted => "Submitted",
            TaskStatus::Pending => "Pending",
            TaskStatus::Paused => "Paused",
            TaskStatus::Running => "Running",
            TaskStatus::WaitingOnError => "Waiting on error",
            TaskStatus::WaitingOnFailure => "Waiting on failure",
            TaskStatus::InError => "In-Error",
            TaskStatus::Failed => "Resource down",
            TaskStatus::NotStarted => "Could not start",
            TaskStatus::NotRestarted => "Could not restart",
            TaskStatus::Aborted => "Aborted",
            TaskStatus::Faulty => "Faulty",
            TaskStatus::Finished => "Finished",
            TaskStatus::Skipped => "Skipped",
        };
        f.write_str(s)
    }
}

/// Job priority; higher priorities are scheduled first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Idle,
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
}

impl fmt::Display for JobPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobPriority::Idle => "Idle",
            JobPriority::Lowest => "Lowest",
            JobPriority::Low => "Low",
            JobPriority::Normal => "Normal",
            JobPriority::High => "High",
            JobPriority::Highest => "Highest",
        };
        f.write_str(s)
    }
}

impl FromStr for JobPriority {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "idle" => Ok(JobPriority::Idle),
            "lowest" => Ok(JobPriority::Lowest),
            "low" => Ok(JobPriority::Low),
            "normal" => Ok(JobPriority::Normal),
            "high" => Ok(JobPriority::High),
            "highest" => Ok(JobPriority::Highest),
            _ => Err(SchedulerError::InvalidJob(format!("unknown priority '{s}'"))),
        }
    }
}

/// Global state of the scheduler service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerStatus {
    Started,
    /// No task is launched and no job accepted until started again.
    Stopped,
    /// Accepts jobs, but launches no task at all.
    Frozen,
    /// Only jobs that already started keep launching tasks.
    Paused,
    ShuttingDown,
    Killed,
}

impl SchedulerStatus {
    pub fn is_startable(&self) -> bool {
        *self == SchedulerStatus::Stopped
    }

    pub fn is_stoppable(&self) -> bool {
        matches!(
            self,
            SchedulerStatus::Started | SchedulerStatus::Paused | SchedulerStatus::Frozen
        )
    }

    pub fn is_pausable(&self) -> bool {
        matches!(self, SchedulerStatus::Started | SchedulerStatus::Frozen)
    }

    pub fn is_freezable(&self) -> bool {
        matches!(self, SchedulerStatus::Started | SchedulerStatus::Paused)
    }

    pub fn is_resumable(&self) -> bool {
        matches!(self, SchedulerStatus::Paused | SchedulerStatus::Frozen)
    }

    pub fn is_submittable(&self) -> bool {
        matches!(
            self,
            SchedulerStatus::Started | SchedulerStatus::Paused | SchedulerStatus::Frozen
        )
    }

    pub fn is_down(&self) -> bool {
        matches!(self, SchedulerStatus::ShuttingDown | SchedulerStatus::Killed)
    }

    pub fn is_killed(&self) -> bool {
        *self == SchedulerStatus::Killed
    }
}

impl fmt::Display for SchedulerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulerStatus::Started => "Started",
            SchedulerStatus::Stopped => "Stopped",
            SchedulerStatus::Frozen => "Frozen",
            SchedulerStatus::Paused => "Paused",
            SchedulerStatus::ShuttingDown => "Shutting down",
            SchedulerStatus::Killed => "Killed",
        };
        f.write_str(s)
    }
}
