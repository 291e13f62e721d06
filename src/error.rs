use thiserror::Error;

use crate::model::{JobId, SchedulerStatus, TaskId};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Job not found: {0}")]
    UnknownJob(JobId),

    #[error("Task '{task}' does not exist in job {job}")]
    UnknownTask { job: JobId, task: String },

    #[error("Task {0} is not running")]
    NotRunning(TaskId),

    #[error("Task {0} is already started")]
    AlreadyRunning(TaskId),

    #[error("Scheduler is {0}, submission refused")]
    SubmissionRefused(SchedulerStatus),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_task_display() {
        let err = SchedulerError::UnknownTask {
            job: JobId::new(7),
            task: "render".into(),
        };
        assert_eq!(err.to_string(), "Task 'render' does not exist in job 7");
    }

    #[test]
    fn submission_refused_display() {
        let err = SchedulerError::SubmissionRefused(SchedulerStatus::Stopped);
        assert_eq!(err.to_string(), "Scheduler is Stopped, submission refused");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SchedulerError>();
    }
}
