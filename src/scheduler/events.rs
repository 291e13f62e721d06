use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::{JobInfo, TaskInfo};
use crate::model::{JobId, TaskId};
use crate::util::CircularBuffer;

/// Everything the scheduler reports to its listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerEvent {
    // Scheduler state
    Started,
    Stopped,
    Paused,
    Frozen,
    Resumed,
    ShuttingDown,
    Killed,

    // Jobs
    JobSubmitted,
    JobPendingToRunning,
    JobRunningToFinished,
    JobPendingToFinished,
    JobPaused,
    JobResumed,
    JobChangePriority,
    JobInError,
    JobRestartedFromError,
    JobRemoved,

    // Tasks
    TaskPendingToRunning,
    TaskRunningToFinished,
    TaskWaitingForRestart,
    TaskInError,
    TaskInErrorToFinished,
}

impl SchedulerEvent {
    pub fn is_scheduler_event(&self) -> bool {
        matches!(
            self,
            SchedulerEvent::Started
                | SchedulerEvent::Stopped
                | SchedulerEvent::Paused
                | SchedulerEvent::Frozen
                | SchedulerEvent::Resumed
                | SchedulerEvent::ShuttingDown
                | SchedulerEvent::Killed
        )
    }
}

impl fmt::Display for SchedulerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        write!(f, "{s}")
    }
}

/// Receives scheduler, job and task updates.
///
/// Calls happen while the scheduler holds its lock; implementations must not
/// call back into the scheduler.
pub trait SchedulerListener: Send + Sync {
    fn scheduler_state_updated(&self, event: SchedulerEvent);

    fn job_state_updated(&self, owner: &str, event: SchedulerEvent, job: &JobInfo);

    fn task_state_updated(&self, owner: &str, event: SchedulerEvent, task: &TaskInfo);
}

/// Listener that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl SchedulerListener for NoopListener {
    fn scheduler_state_updated(&self, _event: SchedulerEvent) {}

    fn job_state_updated(&self, _owner: &str, _event: SchedulerEvent, _job: &JobInfo) {}

    fn task_state_updated(&self, _owner: &str, _event: SchedulerEvent, _task: &TaskInfo) {}
}

/// Forwards every event to each listener in turn.
#[derive(Default, Clone)]
pub struct Listeners(Vec<Arc<dyn SchedulerListener>>);

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, listener: Arc<dyn SchedulerListener>) -> Self {
        self.0.push(listener);
        self
    }
}

impl SchedulerListener for Listeners {
    fn scheduler_state_updated(&self, event: SchedulerEvent) {
        for l in &self.0 {
            l.scheduler_state_updated(event);
        }
    }

    fn job_state_updated(&self, owner: &str, event: SchedulerEvent, job: &JobInfo) {
        for l in &self.0 {
            l.job_state_updated(owner, event, job);
        }
    }

    fn task_state_updated(&self, owner: &str, event: SchedulerEvent, task: &TaskInfo) {
        for l in &self.0 {
            l.task_state_updated(owner, event, task);
        }
    }
}

/// One entry of the [`EventLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub at: DateTime<Utc>,
    pub event: SchedulerEvent,
    pub job: Option<JobId>,
    pub task: Option<TaskId>,
    /// Job or task status right after the event.
    pub status: Option<String>,
}

/// Keeps the most recent events in a bounded buffer.
#[derive(Debug)]
pub struct EventLog {
    records: Mutex<CircularBuffer<EventRecord>>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(CircularBuffer::new(capacity)),
        }
    }

    fn push(&self, record: EventRecord) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.push(record);
    }

    /// Oldest first.
    pub fn records(&self) -> Vec<EventRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, event: SchedulerEvent) -> usize {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.iter().filter(|r| r.event == event).count()
    }

    /// Events recorded for one task, oldest first.
    pub fn for_task(&self, task: TaskId) -> Vec<SchedulerEvent> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records
            .iter()
            .filter(|r| r.task == Some(task))
            .map(|r| r.event)
            .collect()
    }
}

impl SchedulerListener for EventLog {
    fn scheduler_state_updated(&self, event: SchedulerEvent) {
        self.push(EventRecord {
            at: Utc::now(),
            event,
            job: None,
            task: None,
            status: None,
        });
    }

    fn job_state_updated(&self, _owner: &str, event: SchedulerEvent, job: &JobInfo) {
        self.push(EventRecord {
            at: Utc::now(),
            event,
            job: Some(job.id),
            task: None,
            status: Some(job.status.to_string()),
        });
    }

    fn task_state_updated(&self, _owner: &str, event: SchedulerEvent, task: &TaskInfo) {
        self.push(EventRecord {
            at: Utc::now(),
            event,
            job: Some(task.id.job),
            task: Some(task.id),
            status: Some(task.status.to_string()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskStatus;

    fn task_info(index: u32) -> TaskInfo {
        TaskInfo {
            id: TaskId::new(JobId::new(3), index),
            name: format!("t{index}"),
            status: TaskStatus::Running,
            progress: 0,
            execution_host: None,
        }
    }

    #[test]
    fn log_keeps_latest_events() {
        let log = EventLog::new(2);
        log.scheduler_state_updated(SchedulerEvent::Started);
        log.task_state_updated("me", SchedulerEvent::TaskPendingToRunning, &task_info(0));
        log.task_state_updated("me", SchedulerEvent::TaskRunningToFinished, &task_info(0));

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event, SchedulerEvent::TaskPendingToRunning);
        assert_eq!(records[1].status.as_deref(), Some("Running"));
        assert_eq!(log.count(SchedulerEvent::Started), 0);
        assert_eq!(
            log.for_task(TaskId::new(JobId::new(3), 0)),
            vec![
                SchedulerEvent::TaskPendingToRunning,
                SchedulerEvent::TaskRunningToFinished
            ]
        );
    }

    #[test]
    fn listeners_fan_out() {
        let a = Arc::new(EventLog::new(4));
        let b = Arc::new(EventLog::new(4));
        let all = Listeners::new().with(a.clone()).with(b.clone());
        all.scheduler_state_updated(SchedulerEvent::Paused);
        assert_eq!(a.count(SchedulerEvent::Paused), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn event_display_and_kind() {
        assert_eq!(SchedulerEvent::JobPendingToRunning.to_string(), "JOB_PENDING_TO_RUNNING");
        assert!(SchedulerEvent::Frozen.is_scheduler_event());
        assert!(!SchedulerEvent::TaskInError.is_scheduler_event());
    }
}
