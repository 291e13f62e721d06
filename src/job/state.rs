use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::descriptor::JobDescriptor;
use super::spec::{Executable, JobSpec};
use crate::error::{Result, SchedulerError};
use crate::model::{
    JobId, JobPriority, JobStatus, OnTaskError, RestartBackoff, RestartMode, TaskId, TaskStatus,
};

/// Scheduler-wide defaults applied when a job does not set its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobDefaults {
    pub max_number_of_execution: u32,
    pub number_of_execution_on_failure: u32,
    pub backoff: RestartBackoff,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            max_number_of_execution: 1,
            number_of_execution_on_failure: 2,
            backoff: RestartBackoff::default(),
        }
    }
}

/// A task inside a submitted job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub dependencies: Vec<TaskId>,
    pub executable: Executable,
    pub on_task_error: OnTaskError,
    pub restart_mode: RestartMode,
    pub max_number_of_execution: u32,
    /// Executions left before an error becomes final.
    pub number_of_execution_left: u32,
    /// Node failures tolerated before the job fails.
    pub number_of_execution_on_failure_left: u32,
    /// Number of times the task was started.
    pub executions: u32,
    pub progress: u8,
    pub start_time: Option<DateTime<Utc>>,
    pub finished_time: Option<DateTime<Utc>>,
    pub in_error_time: Option<DateTime<Utc>>,
    pub execution_duration_ms: Option<i64>,
    pub execution_host: Option<String>,
    pub last_node: Option<String>,
    /// Nodes this task must not run on again.
    pub excluded_nodes: Vec<String>,
}

/// Lightweight view of a task sent along with events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub execution_host: Option<String>,
}

impl Task {
    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            progress: self.progress,
            execution_host: self.execution_host.clone(),
        }
    }

    pub fn is_excluded(&self, node: &str) -> bool {
        self.excluded_nodes.iter().any(|n| n == node)
    }
}

/// Mutable execution information about a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: JobId,
    pub owner: String,
    pub priority: JobPriority,
    pub status: JobStatus,
    pub submitted_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub finished_time: Option<DateTime<Utc>>,
    pub removed_time: Option<DateTime<Utc>>,
    pub in_error_time: Option<DateTime<Utc>>,
    pub total_tasks: u32,
    pub pending_tasks: u32,
    pub running_tasks: u32,
    pub finished_tasks: u32,
    pub faulty_tasks: u32,
    pub failed_tasks: u32,
    pub in_error_tasks: u32,
}

/// A submitted job with its tasks and dependency tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub description: Option<String>,
    pub info: JobInfo,
    pub on_task_error: OnTaskError,
    pub backoff: RestartBackoff,
    /// Indexed by `TaskId::index`.
    tasks: Vec<Task>,
    #[serde(skip)]
    descriptor: JobDescriptor,
}

impl Job {
    /// Build a job from a validated definition. Task ids follow declaration order.
    pub fn build(id: JobId, owner: &str, spec: &JobSpec, defaults: &JobDefaults) -> Result<Self> {
        spec.validate()?;

        let index_of = |name: &str| spec.tasks.iter().position(|t| t.name == name);
        let job_max = spec
            .max_number_of_execution
            .unwrap_or(defaults.max_number_of_execution);

        let mut tasks = Vec::with_capacity(spec.tasks.len());
        for (index, task_spec) in spec.tasks.iter().enumerate() {
            let dependencies = task_spec
                .depends_on
                .iter()
                .map(|parent| {
                    index_of(parent)
                        .map(|i| TaskId::new(id, i as u32))
                        .ok_or_else(|| SchedulerError::InvalidJob(format!("unknown task '{parent}'")))
                })
                .collect::<Result<Vec<_>>>()?;
            let max = task_spec.max_number_of_execution.unwrap_or(job_max);

            tasks.push(Task {
                id: TaskId::new(id, index as u32),
                name: task_spec.name.clone(),
                description: task_spec.description.clone(),
                status: TaskStatus::Submitted,
                dependencies,
                executable: task_spec.executable.clone(),
                on_task_error: task_spec.on_task_error.unwrap_or(spec.on_task_error),
                restart_mode: task_spec.restart_mode,
                max_number_of_execution: max,
                number_of_execution_left: max,
                number_of_execution_on_failure_left: defaults.number_of_execution_on_failure,
                executions: 0,
                progress: 0,
                start_time: None,
                finished_time: None,
                in_error_time: None,
                execution_duration_ms: None,
                execution_host: None,
                last_node: None,
                excluded_nodes: Vec::new(),
            });
        }

        let mut job = Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            info: JobInfo {
                id,
                owner: owner.to_string(),
                priority: spec.priority,
                status: JobStatus::Pending,
                submitted_time: None,
                start_time: None,
                finished_time: None,
                removed_time: None,
                in_error_time: None,
                total_tasks: tasks.len() as u32,
                pending_tasks: 0,
                running_tasks: 0,
                finished_tasks: 0,
                faulty_tasks: 0,
                failed_tasks: 0,
                in_error_tasks: 0,
            },
            on_task_error: spec.on_task_error,
            backoff: defaults.backoff,
            tasks,
            descriptor: JobDescriptor::default(),
        };
        job.rebuild_descriptor();
        Ok(job)
    }

    /// Recompute dependency tracking from task statuses, e.g. after loading from disk.
    pub fn rebuild_descriptor(&mut self) {
        self.descriptor = JobDescriptor::rebuild(
            self.tasks
                .iter()
                .map(|t| (t.id, t.dependencies.as_slice(), t.status)),
        );
    }

    pub fn id(&self) -> JobId {
        self.info.id
    }

    pub fn status(&self) -> JobStatus {
        self.info.status
    }

    pub fn owner(&self) -> &str {
        &self.info.owner
    }

    pub fn priority(&self) -> JobPriority {
        self.info.priority
    }

    pub fn set_priority(&mut self, priority: JobPriority) {
        self.info.priority = priority;
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        if id.job != self.info.id {
            return None;
        }
        self.tasks.get(id.index as usize)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        if id.job != self.info.id {
            return None;
        }
        self.tasks.get_mut(id.index as usize)
    }

    pub fn task_by_name(&self, name: &str) -> Result<&Task> {
        self.tasks
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| SchedulerError::UnknownTask {
                job: self.info.id,
                task: name.to_string(),
            })
    }

    fn known(&self, id: TaskId) -> Result<usize> {
        self.task(id)
            .map(|_| id.index as usize)
            .ok_or_else(|| SchedulerError::UnknownTask {
                job: self.info.id,
                task: id.to_string(),
            })
    }

    /// Tasks whose dependencies are satisfied and which are not paused or running.
    pub fn eligible_tasks(&self) -> Vec<TaskId> {
        self.descriptor.eligible().collect()
    }

    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    pub fn next_waiting_time(&self, execution_number: i64) -> u64 {
        self.backoff.next_waiting_time(execution_number)
    }

    pub fn is_finished(&self) -> bool {
        self.info.finished_tasks >= self.info.total_tasks
    }

    pub fn submit(&mut self) {
        self.info.submitted_time = Some(Utc::now());
        self.info.status = JobStatus::Pending;
    }

    /// Called when the first task of the job is about to start.
    pub fn start(&mut self) {
        self.info.start_time = Some(Utc::now());
        self.info.pending_tasks = self.info.total_tasks;
        self.info.running_tasks = 0;
        if self.info.status != JobStatus::Paused {
            self.info.status = JobStatus::Running;
        }
        for task in &mut self.tasks {
            if task.status == TaskStatus::Submitted {
                task.status = TaskStatus::Pending;
            }
        }
    }

    pub fn start_task(&mut self, id: TaskId, host: &str, node: &str) -> Result<()> {
        let index = self.known(id)?;
        self.info.pending_tasks = self.info.pending_tasks.saturating_sub(1);
        self.info.running_tasks += 1;
        if self.info.status == JobStatus::Stalled {
            self.info.status = JobStatus::Running;
        }

        self.descriptor.start(id);
        let task = &mut self.tasks[index];
        task.status = TaskStatus::Running;
        task.start_time = Some(Utc::now());
        task.finished_time = None;
        task.execution_duration_ms = None;
        task.progress = 0;
        task.executions += 1;
        task.execution_host = Some(format!("{host} ({node})"));
        task.last_node = Some(node.to_string());
        Ok(())
    }

    /// A running task went back to waiting: update the counters.
    pub fn new_waiting_task(&mut self) {
        self.info.pending_tasks += 1;
        self.info.running_tasks = self.info.running_tasks.saturating_sub(1);
        if self.info.running_tasks == 0 && self.info.status == JobStatus::Running {
            self.info.status = JobStatus::Stalled;
        }
    }

    /// Make the task eligible again, paused if the job is paused.
    pub fn restart_task(&mut self, id: TaskId) -> Result<()> {
        let index = self.known(id)?;
        self.descriptor.restart(id);
        let paused = self.info.status == JobStatus::Paused;
        let task = &mut self.tasks[index];
        task.progress = 0;
        if paused {
            task.status = TaskStatus::Paused;
            self.descriptor.pause(id);
        } else {
            task.status = TaskStatus::Pending;
        }
        Ok(())
    }

    /// Record the end of a task and release its children.
    ///
    /// Returns the children that became eligible.
    pub fn terminate_task(
        &mut self,
        error: bool,
        id: TaskId,
        duration_ms: Option<i64>,
    ) -> Result<Vec<TaskId>> {
        let index = self.known(id)?;
        let now = Utc::now();
        let task = &mut self.tasks[index];
        let was_running = task.status == TaskStatus::Running;
        task.finished_time = Some(now);
        task.status = if error {
            TaskStatus::Faulty
        } else {
            TaskStatus::Finished
        };
        task.execution_duration_ms = duration_ms.or_else(|| {
            task.start_time
                .map(|start| (now - start).num_milliseconds())
        });

        if was_running {
            self.info.running_tasks = self.info.running_tasks.saturating_sub(1);
        } else {
            self.info.pending_tasks = self.info.pending_tasks.saturating_sub(1);
        }
        self.info.finished_tasks += 1;
        if self.info.status == JobStatus::Running && self.info.running_tasks == 0 {
            self.info.status = JobStatus::Stalled;
        }

        let ready = self.descriptor.terminate(id);
        self.hold_if_paused(&ready);
        Ok(ready)
    }

    // Children released while the job is paused must not become launchable.
    fn hold_if_paused(&mut self, ready: &[TaskId]) {
        for child in ready {
            if self.tasks[child.index as usize].status == TaskStatus::Paused {
                self.descriptor.pause(*child);
            }
        }
    }

    pub fn terminate(&mut self) {
        self.info.status = JobStatus::Finished;
        self.info.finished_time = Some(Utc::now());
    }

    /// End the job with `status`, settling every task that is still alive.
    ///
    /// `cause` is the task that triggered the end, if any; it is ignored when
    /// the job is killed. Returns the tasks whose status changed.
    pub fn failed(&mut self, cause: Option<TaskId>, status: JobStatus) -> Vec<TaskId> {
        let now = Utc::now();
        let mut updated = Vec::new();

        let cause = cause.filter(|_| status != JobStatus::Killed);
        if let Some(id) = cause
            && let Some(task) = self.tasks.get_mut(id.index as usize)
        {
            if let Some(start) = task.start_time {
                task.finished_time = Some(now);
                self.info.finished_tasks += 1;
                if task.execution_duration_ms.is_none() {
                    task.execution_duration_ms = Some((now - start).num_milliseconds());
                }
            }
            task.status = if status == JobStatus::Failed {
                TaskStatus::Failed
            } else {
                TaskStatus::Faulty
            };
            updated.push(id);
        }

        self.descriptor.clear();
        self.info.finished_time = Some(now);
        self.info.pending_tasks = 0;
        self.info.running_tasks = 0;
        self.info.in_error_tasks = 0;
        self.info.status = status;

        for task in &mut self.tasks {
            if Some(task.id) == cause {
                continue;
            }
            match task.status {
                TaskStatus::Running => {
                    task.status = TaskStatus::Aborted;
                    task.finished_time = Some(now);
                    if let Some(start) = task.start_time
                        && task.execution_duration_ms.is_none()
                    {
                        task.execution_duration_ms = Some((now - start).num_milliseconds());
                    }
                }
                TaskStatus::WaitingOnError | TaskStatus::WaitingOnFailure => {
                    task.status = TaskStatus::NotRestarted;
                }
                s if s.is_alive() => {
                    task.status = TaskStatus::NotStarted;
                }
                _ => continue,
            }
            updated.push(task.id);
        }
        updated
    }

    /// Pause every task that is not running or done. Returns the updated tasks.
    pub fn set_paused(&mut self) -> Vec<TaskId> {
        let mut updated = Vec::new();
        if self.info.status == JobStatus::Paused {
            return updated;
        }
        self.info.status = JobStatus::Paused;

        for task in &mut self.tasks {
            if task.status.is_alive()
                && task.status != TaskStatus::Running
                && task.status != TaskStatus::InError
            {
                task.status = TaskStatus::Paused;
                self.descriptor.pause(task.id);
                updated.push(task.id);
            }
        }
        updated
    }

    /// Undo [`Job::set_paused`]. Returns the updated tasks.
    pub fn set_unpaused(&mut self) -> Vec<TaskId> {
        let mut updated = Vec::new();
        if self.info.status != JobStatus::Paused {
            return updated;
        }

        self.info.status = if self.info.start_time.is_none() {
            JobStatus::Pending
        } else if self.info.in_error_tasks > 0 {
            JobStatus::InError
        } else if self.info.running_tasks == 0 {
            JobStatus::Stalled
        } else {
            JobStatus::Running
        };

        let resumed = if self.info.status == JobStatus::Pending {
            TaskStatus::Submitted
        } else {
            TaskStatus::Pending
        };
        for task in &mut self.tasks {
            if task.status == TaskStatus::Paused {
                task.status = resumed;
                updated.push(task.id);
            }
            self.descriptor.unpause(task.id);
        }
        updated
    }

    /// Park a task that exhausted its executions until a user decides what to do.
    pub fn suspend_task_on_error(&mut self, id: TaskId, duration_ms: Option<i64>) -> Result<()> {
        let index = self.known(id)?;
        let now = Utc::now();
        self.info.in_error_time = Some(now);
        self.info.running_tasks = self.info.running_tasks.saturating_sub(1);
        self.info.in_error_tasks += 1;
        if self.info.status != JobStatus::Paused {
            self.info.status = JobStatus::InError;
        }

        self.descriptor.park_in_error(id);
        let task = &mut self.tasks[index];
        task.status = TaskStatus::InError;
        task.execution_duration_ms = duration_ms;
        task.in_error_time = match (task.start_time, duration_ms) {
            (Some(start), Some(ms)) => Some(start + chrono::Duration::milliseconds(ms)),
            _ => Some(now),
        };
        Ok(())
    }

    /// Send an in-error task back to the eligible set. Returns false if the task is not in error.
    pub fn restart_in_error_task(&mut self, id: TaskId) -> Result<bool> {
        let index = self.known(id)?;
        if self.tasks[index].status != TaskStatus::InError {
            return Ok(false);
        }
        self.info.in_error_tasks = self.info.in_error_tasks.saturating_sub(1);
        self.info.pending_tasks += 1;
        self.tasks[index].in_error_time = None;
        self.restart_task(id)?;
        self.leave_in_error();
        Ok(true)
    }

    /// Accept an in-error task as faulty and release its children.
    pub fn finish_in_error_task(&mut self, id: TaskId) -> Result<Option<Vec<TaskId>>> {
        let index = self.known(id)?;
        if self.tasks[index].status != TaskStatus::InError {
            return Ok(None);
        }
        self.info.in_error_tasks = self.info.in_error_tasks.saturating_sub(1);
        self.info.finished_tasks += 1;
        self.info.faulty_tasks += 1;

        let task = &mut self.tasks[index];
        task.status = TaskStatus::Faulty;
        task.finished_time = Some(Utc::now());

        let ready = self.descriptor.terminate(id);
        self.hold_if_paused(&ready);
        self.leave_in_error();
        Ok(Some(ready))
    }

    fn leave_in_error(&mut self) {
        if self.info.in_error_tasks == 0 && self.info.status == JobStatus::InError {
            self.info.status = if self.info.running_tasks > 0 {
                JobStatus::Running
            } else {
                JobStatus::Stalled
            };
        }
    }
}

/// Structured record produced when a job leaves the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub name: String,
    pub owner: String,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub total_tasks: u32,
    pub finished_tasks: u32,
    pub faulty_tasks: u32,
    pub failed_tasks: u32,
    pub submitted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub tasks: Vec<TaskSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub executions: u32,
    pub execution_host: Option<String>,
    pub duration_ms: Option<i64>,
}

impl JobSummary {
    pub fn from_job(job: &Job) -> Self {
        let duration_ms = match (job.info.start_time, job.info.finished_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        };
        Self {
            job_id: job.id(),
            name: job.name.clone(),
            owner: job.info.owner.clone(),
            status: job.info.status,
            priority: job.info.priority,
            total_tasks: job.info.total_tasks,
            finished_tasks: job.info.finished_tasks,
            faulty_tasks: job.info.faulty_tasks,
            failed_tasks: job.info.failed_tasks,
            submitted_at: job.info.submitted_time,
            started_at: job.info.start_time,
            finished_at: job.info.finished_time,
            duration_ms,
            tasks: job
                .tasks
                .iter()
                .map(|t| TaskSummary {
                    id: t.id,
                    name: t.name.clone(),
                    status: t.status,
                    executions: t.executions,
                    execution_host: t.execution_host.clone(),
                    duration_ms: t.execution_duration_ms,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::spec::TaskSpec;

    fn sleep() -> Executable {
        Executable::Sleep {
            duration_ms: 1,
            fail_attempts: 0,
        }
    }

    fn chain_job() -> Job {
        let spec = JobSpec::new("chain")
            .task(TaskSpec::new("first", sleep()))
            .task(TaskSpec::new("second", sleep()).depends_on("first").max_executions(3));
        let mut job = Job::build(JobId::new(4), "alice", &spec, &JobDefaults::default()).unwrap();
        job.submit();
        job
    }

    fn tid(index: u32) -> TaskId {
        TaskId::new(JobId::new(4), index)
    }

    #[test]
    fn build_assigns_ids_and_budgets() {
        let job = chain_job();
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.info.total_tasks, 2);
        let second = job.task_by_name("second").unwrap();
        assert_eq!(second.id, tid(1));
        assert_eq!(second.dependencies, vec![tid(0)]);
        assert_eq!(second.max_number_of_execution, 3);
        assert_eq!(job.task(tid(0)).unwrap().number_of_execution_left, 1);
        assert_eq!(job.task(tid(0)).unwrap().number_of_execution_on_failure_left, 2);
        assert_eq!(job.eligible_tasks(), vec![tid(0)]);
        assert!(job.task_by_name("missing").is_err());
        assert!(job.task(TaskId::new(JobId::new(5), 0)).is_none());
    }

    #[test]
    fn task_inherits_job_error_policy() {
        let spec = JobSpec::new("policy")
            .on_error(OnTaskError::CancelJob)
            .task(TaskSpec::new("a", sleep()))
            .task(TaskSpec::new("b", sleep()).on_error(OnTaskError::SuspendTask));
        let job = Job::build(JobId::new(1), "bob", &spec, &JobDefaults::default()).unwrap();
        assert_eq!(job.tasks()[0].on_task_error, OnTaskError::CancelJob);
        assert_eq!(job.tasks()[1].on_task_error, OnTaskError::SuspendTask);
    }

    #[test]
    fn run_to_completion_updates_counters() {
        let mut job = chain_job();
        job.start();
        assert_eq!(job.status(), JobStatus::Running);
        assert_eq!(job.info.pending_tasks, 2);

        job.start_task(tid(0), "localhost", "node-0").unwrap();
        assert_eq!(job.info.running_tasks, 1);
        assert_eq!(job.task(tid(0)).unwrap().execution_host.as_deref(), Some("localhost (node-0)"));

        let ready = job.terminate_task(false, tid(0), Some(12)).unwrap();
        assert_eq!(ready, vec![tid(1)]);
        assert_eq!(job.status(), JobStatus::Stalled);
        assert_eq!(job.task(tid(0)).unwrap().status, TaskStatus::Finished);
        assert_eq!(job.task(tid(0)).unwrap().execution_duration_ms, Some(12));

        job.start_task(tid(1), "localhost", "node-1").unwrap();
        assert_eq!(job.status(), JobStatus::Running);
        job.terminate_task(true, tid(1), None).unwrap();
        assert_eq!(job.task(tid(1)).unwrap().status, TaskStatus::Faulty);
        assert!(job.is_finished());
        job.terminate();
        assert_eq!(job.status(), JobStatus::Finished);
    }

    #[test]
    fn pause_and_unpause_before_start() {
        let mut job = chain_job();
        let updated = job.set_paused();
        assert_eq!(updated, vec![tid(0), tid(1)]);
        assert!(job.eligible_tasks().is_empty());
        assert!(job.set_paused().is_empty());

        let updated = job.set_unpaused();
        assert_eq!(updated.len(), 2);
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.task(tid(0)).unwrap().status, TaskStatus::Submitted);
        assert_eq!(job.eligible_tasks(), vec![tid(0)]);
    }

    #[test]
    fn children_released_while_paused_stay_paused() {
        let mut job = chain_job();
        job.start();
        job.start_task(tid(0), "localhost", "node-0").unwrap();
        job.set_paused();
        assert_eq!(job.task(tid(0)).unwrap().status, TaskStatus::Running);
        assert_eq!(job.task(tid(1)).unwrap().status, TaskStatus::Paused);

        job.terminate_task(false, tid(0), None).unwrap();
        assert!(job.eligible_tasks().is_empty());

        job.set_unpaused();
        assert_eq!(job.status(), JobStatus::Stalled);
        assert_eq!(job.task(tid(1)).unwrap().status, TaskStatus::Pending);
        assert_eq!(job.eligible_tasks(), vec![tid(1)]);
    }

    #[test]
    fn failed_settles_every_alive_task() {
        let spec = JobSpec::new("wide")
            .task(TaskSpec::new("a", sleep()))
            .task(TaskSpec::new("b", sleep()))
            .task(TaskSpec::new("c", sleep()))
            .task(TaskSpec::new("d", sleep()));
        let mut job = Job::build(JobId::new(9), "carol", &spec, &JobDefaults::default()).unwrap();
        let t = |i| TaskId::new(JobId::new(9), i);
        job.submit();
        job.start();
        job.start_task(t(0), "h", "n0").unwrap();
        job.start_task(t(1), "h", "n1").unwrap();
        job.terminate_task(false, t(1), None).unwrap();
        job.start_task(t(2), "h", "n2").unwrap();
        job.task_mut(t(2)).unwrap().status = TaskStatus::WaitingOnError;

        let updated = job.failed(Some(t(0)), JobStatus::Canceled);
        assert_eq!(job.status(), JobStatus::Canceled);
        assert_eq!(job.task(t(0)).unwrap().status, TaskStatus::Faulty);
        assert_eq!(job.task(t(1)).unwrap().status, TaskStatus::Finished);
        assert_eq!(job.task(t(2)).unwrap().status, TaskStatus::NotRestarted);
        assert_eq!(job.task(t(3)).unwrap().status, TaskStatus::NotStarted);
        assert_eq!(updated, vec![t(0), t(2), t(3)]);
        assert_eq!(job.info.running_tasks, 0);
        assert!(job.eligible_tasks().is_empty());
    }

    #[test]
    fn killed_job_aborts_running_tasks() {
        let mut job = chain_job();
        job.start();
        job.start_task(tid(0), "h", "n0").unwrap();
        job.failed(Some(tid(0)), JobStatus::Killed);
        assert_eq!(job.status(), JobStatus::Killed);
        assert_eq!(job.task(tid(0)).unwrap().status, TaskStatus::Aborted);
        assert_eq!(job.task(tid(1)).unwrap().status, TaskStatus::NotStarted);
    }

    #[test]
    fn in_error_round_trip() {
        let mut job = chain_job();
        job.start();
        job.start_task(tid(0), "h", "n0").unwrap();
        job.suspend_task_on_error(tid(0), Some(50)).unwrap();
        assert_eq!(job.status(), JobStatus::InError);
        assert_eq!(job.info.in_error_tasks, 1);
        assert_eq!(job.task(tid(0)).unwrap().status, TaskStatus::InError);
        assert!(job.eligible_tasks().is_empty());

        assert!(job.restart_in_error_task(tid(0)).unwrap());
        assert_eq!(job.status(), JobStatus::Stalled);
        assert_eq!(job.task(tid(0)).unwrap().status, TaskStatus::Pending);
        assert_eq!(job.eligible_tasks(), vec![tid(0)]);
        assert!(!job.restart_in_error_task(tid(0)).unwrap());

        job.start_task(tid(0), "h", "n0").unwrap();
        job.suspend_task_on_error(tid(0), None).unwrap();
        let ready = job.finish_in_error_task(tid(0)).unwrap().unwrap();
        assert_eq!(ready, vec![tid(1)]);
        assert_eq!(job.task(tid(0)).unwrap().status, TaskStatus::Faulty);
        assert_eq!(job.info.faulty_tasks, 1);
        assert_eq!(job.status(), JobStatus::Stalled);
    }

    #[test]
    fn summary_lists_tasks() {
        let mut job = chain_job();
        job.start();
        job.start_task(tid(0), "h", "n0").unwrap();
        job.terminate_task(false, tid(0), Some(3)).unwrap();
        let summary = JobSummary::from_job(&job);
        assert_eq!(summary.job_id, JobId::new(4));
        assert_eq!(summary.owner, "alice");
        assert_eq!(summary.tasks.len(), 2);
        assert_eq!(summary.tasks[0].executions, 1);
        assert_eq!(summary.tasks[1].status, TaskStatus::Pending);
        assert!(summary.duration_ms.is_none());
    }

    #[test]
    fn job_serialization_roundtrip_keeps_tasks() {
        let mut job = chain_job();
        job.start();
        job.start_task(tid(0), "h", "n0").unwrap();
        let json = serde_json::to_string(&job).unwrap();
        let mut restored: Job = serde_json::from_str(&json).unwrap();
        restored.rebuild_descriptor();
        assert_eq!(restored.info, job.info);
        assert!(restored.descriptor().is_running(tid(0)));
        assert!(restored.eligible_tasks().is_empty());
    }
}
