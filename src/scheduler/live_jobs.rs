//! In-memory table of the jobs the scheduler is working on.
//!
//! Every call that changes a job goes through [`LiveJobs`]: it updates the job
//! and its tasks, notifies the listener and tells the caller which tasks and
//! jobs must be cleaned up via [`TerminationData`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::events::{SchedulerEvent, SchedulerListener};
use super::termination::{TerminationData, TerminationStatus};
use crate::error::{Result, SchedulerError};
use crate::job::Job;
use crate::model::{
    JobId, JobPriority, JobStatus, RestartMode, SchedulerStatus, TaskId, TaskStatus,
};

/// Outcome of one task execution as reported by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub task: TaskId,
    pub error: Option<String>,
    pub duration_ms: Option<i64>,
}

impl TaskResult {
    pub fn success(task: TaskId, duration_ms: i64) -> Self {
        Self {
            task,
            error: None,
            duration_ms: Some(duration_ms),
        }
    }

    pub fn failure(task: TaskId, error: impl Into<String>, duration_ms: i64) -> Self {
        Self {
            task,
            error: Some(error.into()),
            duration_ms: Some(duration_ms),
        }
    }

    pub fn had_error(&self) -> bool {
        self.error.is_some()
    }
}

fn notify_job(listener: &dyn SchedulerListener, job: &Job, event: SchedulerEvent) {
    listener.job_state_updated(job.owner(), event, &job.info);
}

fn notify_task(listener: &dyn SchedulerListener, job: &Job, task: TaskId, event: SchedulerEvent) {
    if let Some(task) = job.task(task) {
        listener.task_state_updated(job.owner(), event, &task.info());
    }
}

pub struct LiveJobs {
    jobs: BTreeMap<JobId, Job>,
    /// Jobs that left the scheduler, kept for state queries until removed.
    ended: BTreeMap<JobId, Job>,
    /// Running task -> node name.
    running: HashMap<TaskId, String>,
    listener: Arc<dyn SchedulerListener>,
}

impl LiveJobs {
    pub fn new(listener: Arc<dyn SchedulerListener>) -> Self {
        Self {
            jobs: BTreeMap::new(),
            ended: BTreeMap::new(),
            running: HashMap::new(),
            listener,
        }
    }

    fn alive_mut(&mut self, id: JobId) -> Result<&mut Job> {
        self.jobs.get_mut(&id).ok_or(SchedulerError::UnknownJob(id))
    }

    fn task_id(&self, job: JobId, name: &str) -> Result<TaskId> {
        let job = self.jobs.get(&job).ok_or(SchedulerError::UnknownJob(job))?;
        Ok(job.task_by_name(name)?.id)
    }

    pub fn job_submitted(&mut self, mut job: Job) -> Result<()> {
        let id = job.id();
        if self.jobs.contains_key(&id) || self.ended.contains_key(&id) {
            return Err(SchedulerError::InvalidJob(format!("job id {id} already in use")));
        }
        job.submit();
        notify_job(self.listener.as_ref(), &job, SchedulerEvent::JobSubmitted);
        info!(job_id = %id, name = %job.name, owner = job.owner(), tasks = job.info.total_tasks, "job submitted");
        self.jobs.insert(id, job);
        Ok(())
    }

    /// Record that `task` was launched on `node` of `host`.
    pub fn task_started(&mut self, task: TaskId, host: &str, node: &str) -> Result<()> {
        if self.running.contains_key(&task) {
            return Err(SchedulerError::AlreadyRunning(task));
        }
        let listener = Arc::clone(&self.listener);
        let job = self.alive_mut(task.job)?;
        if job.task(task).is_none() {
            return Err(SchedulerError::UnknownTask {
                job: task.job,
                task: task.to_string(),
            });
        }

        if job.info.start_time.is_none() {
            job.start();
            notify_job(listener.as_ref(), job, SchedulerEvent::JobPendingToRunning);
            info!(job_id = %task.job, "job started");
        }
        job.start_task(task, host, node)?;
        notify_task(listener.as_ref(), job, task, SchedulerEvent::TaskPendingToRunning);
        info!(task_id = %task, node, "task started");

        self.running.insert(task, node.to_string());
        Ok(())
    }

    pub fn task_terminated_with_result(&mut self, result: &TaskResult) -> Result<TerminationData> {
        let task_id = result.task;
        let job_id = task_id.job;
        let mut data = TerminationData::default();

        let Some(job) = self.jobs.get_mut(&job_id) else {
            self.running.remove(&task_id);
            return Ok(data);
        };
        let Some(task) = job.task_mut(task_id) else {
            warn!(task_id = %task_id, "result for unknown task");
            return Ok(data);
        };
        if task.status != TaskStatus::Running {
            debug!(task_id = %task_id, status = %task.status, "task isn't running anymore");
            self.running.remove(&task_id);
            return Ok(data);
        }
        self.running.remove(&task_id);

        match &result.error {
            Some(error) => warn!(task_id = %task_id, error = %error, "task finished with errors"),
            None => info!(task_id = %task_id, "task finished without errors"),
        }

        if result.had_error() {
            task.number_of_execution_left = task.number_of_execution_left.saturating_sub(1);
            let left = task.number_of_execution_left;
            let max = task.max_number_of_execution;
            let policy = task.on_task_error;

            if left == 0 && policy.cancels_job() {
                info!(task_id = %task_id, "no execution left and task cancels its job on error");
                job.info.faulty_tasks += 1;
                self.end_job(job_id, Some(task_id), JobStatus::Canceled, &mut data);
                return Ok(data);
            }

            if left > 0 {
                info!(task_id = %task_id, left, "number of executions left");
                if !(policy.suspends_task() || policy.pauses_job()) {
                    job.info.faulty_tasks += 1;
                }
                let wait_ms = job.next_waiting_time(i64::from(max - left));
                self.restart_task_on_error(task_id, TaskStatus::WaitingOnError, wait_ms, &mut data)?;
                return Ok(data);
            }

            if policy.suspends_task() {
                self.suspend_task_on_error(task_id, result.duration_ms)?;
                info!(task_id = %task_id, "task still failing after automatic restarts, left in error");
                return Ok(data);
            }
            if policy.pauses_job() {
                self.suspend_task_on_error(task_id, result.duration_ms)?;
                self.pause_job(job_id)?;
                info!(job_id = %job_id, "task still failing after automatic restarts, job paused");
                return Ok(data);
            }
            self.alive_mut(job_id)?.info.faulty_tasks += 1;
        }

        self.terminate_task(task_id, result.had_error(), result.duration_ms, &mut data)?;
        Ok(data)
    }

    /// The node running `task` is gone. Retries while the failure budget lasts.
    pub fn restart_task_on_node_failure(&mut self, task_id: TaskId) -> Result<TerminationData> {
        let mut data = TerminationData::default();
        let listener = Arc::clone(&self.listener);
        let Some(job) = self.jobs.get_mut(&task_id.job) else {
            return Ok(data);
        };
        let Some(task) = job.task_mut(task_id) else {
            return Ok(data);
        };
        if task.status != TaskStatus::Running {
            return Ok(data);
        }

        let node = self.running.remove(&task_id);
        data.add_task_to_terminate(task_id, node, TerminationStatus::NodeFailed);

        task.progress = 0;
        task.number_of_execution_on_failure_left =
            task.number_of_execution_on_failure_left.saturating_sub(1);
        let left = task.number_of_execution_on_failure_left;
        info!(task_id = %task_id, left, "number of retries on failure left");

        if left > 0 {
            task.status = TaskStatus::WaitingOnFailure;
            job.new_waiting_task();
            notify_task(listener.as_ref(), job, task_id, SchedulerEvent::TaskWaitingForRestart);
            job.restart_task(task_id)?;
            info!(task_id = %task_id, "task is waiting for restart");
        } else {
            job.info.failed_tasks += 1;
            warn!(task_id = %task_id, "node failures exhausted the retries");
            self.end_job(task_id.job, Some(task_id), JobStatus::Failed, &mut data);
        }
        Ok(data)
    }

    /// Called when a restart delay expires.
    pub fn restart_waiting_task(&mut self, task_id: TaskId) -> Result<()> {
        let Some(job) = self.jobs.get_mut(&task_id.job) else {
            return Ok(());
        };
        // A stale timer must not touch a task that was launched or parked since.
        let waiting = job.task(task_id).is_some_and(|t| {
            t.status.is_alive() && !matches!(t.status, TaskStatus::Running | TaskStatus::InError)
        });
        if waiting {
            job.restart_task(task_id)?;
            debug!(task_id = %task_id, "task restarted");
        }
        Ok(())
    }

    /// Stop a running task and run it again after `delay_s`. Consumes one execution.
    pub fn restart_task(&mut self, job_id: JobId, name: &str, delay_s: u64) -> Result<TerminationData> {
        let task_id = self.task_id(job_id, name)?;
        let mut data = TerminationData::default();
        info!(task_id = %task_id, "restarting task");

        let job = self
            .jobs
            .get_mut(&job_id)
            .ok_or(SchedulerError::UnknownJob(job_id))?;
        let Some(task) = job.task_mut(task_id) else {
            return Ok(data);
        };
        if !task.status.is_alive() {
            warn!(task_id = %task_id, status = %task.status, "task isn't alive");
            return Ok(data);
        }
        let node = self
            .running
            .remove(&task_id)
            .ok_or(SchedulerError::NotRunning(task_id))?;
        data.add_task_to_terminate(task_id, Some(node), TerminationStatus::Aborted);

        task.number_of_execution_left = task.number_of_execution_left.saturating_sub(1);
        let left = task.number_of_execution_left;
        if left == 0 && task.on_task_error.cancels_job() {
            self.end_job(job_id, Some(task_id), JobStatus::Canceled, &mut data);
        } else if left > 0 {
            self.restart_task_on_error(task_id, TaskStatus::WaitingOnError, delay_s.saturating_mul(1000), &mut data)?;
        } else {
            self.terminate_task(task_id, true, None, &mut data)?;
        }
        Ok(data)
    }

    /// Stop a running task and run it again after `delay_s` without consuming an execution.
    pub fn preempt_task(&mut self, job_id: JobId, name: &str, delay_s: u64) -> Result<TerminationData> {
        let task_id = self.task_id(job_id, name)?;
        let mut data = TerminationData::default();
        info!(task_id = %task_id, "preempting task");

        let job = self.alive_mut(job_id)?;
        let alive = job.task(task_id).is_some_and(|t| t.status.is_alive());
        if !alive {
            return Ok(data);
        }
        let node = self
            .running
            .remove(&task_id)
            .ok_or(SchedulerError::NotRunning(task_id))?;
        data.add_task_to_terminate(task_id, Some(node), TerminationStatus::Aborted);

        self.restart_task_on_error(task_id, TaskStatus::Pending, delay_s.saturating_mul(1000), &mut data)?;
        Ok(data)
    }

    pub fn kill_task(&mut self, job_id: JobId, name: &str) -> Result<TerminationData> {
        let task_id = self.task_id(job_id, name)?;
        let mut data = TerminationData::default();
        info!(task_id = %task_id, "killing task");

        let listener = Arc::clone(&self.listener);
        let job = self.alive_mut(job_id)?;
        let Some(task) = job.task(task_id) else {
            return Ok(data);
        };
        if !task.status.is_alive() {
            warn!(task_id = %task_id, status = %task.status, "task isn't alive");
            return Ok(data);
        }
        if task.status == TaskStatus::InError {
            return self.finish_in_error_task(job_id, name);
        }
        let cancels_job = task.on_task_error.cancels_job();

        if job.info.start_time.is_none() {
            job.start();
            notify_job(listener.as_ref(), job, SchedulerEvent::JobPendingToRunning);
        }
        if let Some(node) = self.running.remove(&task_id) {
            data.add_task_to_terminate(task_id, Some(node), TerminationStatus::Aborted);
        }

        if cancels_job {
            self.end_job(job_id, Some(task_id), JobStatus::Canceled, &mut data);
        } else {
            self.terminate_task(task_id, true, None, &mut data)?;
        }
        Ok(data)
    }

    /// Returns whether any task was paused.
    pub fn pause_job(&mut self, job_id: JobId) -> Result<bool> {
        let listener = Arc::clone(&self.listener);
        let job = self.alive_mut(job_id)?;
        let was_paused = job.status() == JobStatus::Paused;
        let updated = job.set_paused();
        for task in &updated {
            notify_task(listener.as_ref(), job, *task, SchedulerEvent::JobPaused);
        }
        if !was_paused {
            notify_job(listener.as_ref(), job, SchedulerEvent::JobPaused);
            info!(job_id = %job_id, tasks = updated.len(), "job paused");
        }
        Ok(!updated.is_empty())
    }

    /// Returns whether any task was resumed.
    pub fn resume_job(&mut self, job_id: JobId) -> Result<bool> {
        let listener = Arc::clone(&self.listener);
        let job = self.alive_mut(job_id)?;
        let was_paused = job.status() == JobStatus::Paused;
        let updated = job.set_unpaused();
        for task in &updated {
            notify_task(listener.as_ref(), job, *task, SchedulerEvent::JobResumed);
        }
        if was_paused {
            notify_job(listener.as_ref(), job, SchedulerEvent::JobResumed);
            info!(job_id = %job_id, status = %job.status(), "job resumed");
        }
        Ok(!updated.is_empty())
    }

    pub fn restart_in_error_task(&mut self, job_id: JobId, name: &str) -> Result<bool> {
        let task_id = self.task_id(job_id, name)?;
        let listener = Arc::clone(&self.listener);
        let job = self.alive_mut(job_id)?;
        let restarted = job.restart_in_error_task(task_id)?;
        if restarted {
            info!(task_id = %task_id, "restarting in-error task");
            notify_job(listener.as_ref(), job, SchedulerEvent::JobRestartedFromError);
        }
        Ok(restarted)
    }

    pub fn restart_all_in_error_tasks(&mut self, job_id: JobId) -> Result<bool> {
        let names: Vec<String> = self
            .jobs
            .get(&job_id)
            .ok_or(SchedulerError::UnknownJob(job_id))?
            .tasks()
            .iter()
            .filter(|t| t.status == TaskStatus::InError)
            .map(|t| t.name.clone())
            .collect();

        let mut any = false;
        for name in names {
            any |= self.restart_in_error_task(job_id, &name)?;
        }
        Ok(any)
    }

    /// Accept an in-error task as faulty. May finish the job.
    pub fn finish_in_error_task(&mut self, job_id: JobId, name: &str) -> Result<TerminationData> {
        let task_id = self.task_id(job_id, name)?;
        let mut data = TerminationData::default();
        let listener = Arc::clone(&self.listener);
        let job = self.alive_mut(job_id)?;

        if job.finish_in_error_task(task_id)?.is_none() {
            info!(task_id = %task_id, "task must be in error to be finished");
            return Ok(data);
        }
        let finished = job.is_finished();
        if finished {
            job.terminate();
            data.add_job_terminated(job_id);
        }
        notify_task(listener.as_ref(), job, task_id, SchedulerEvent::TaskInErrorToFinished);
        info!(
            job_id = %job_id,
            finished_tasks = job.info.finished_tasks,
            total_tasks = job.info.total_tasks,
            finished,
            "in-error task finished"
        );
        if finished {
            notify_job(listener.as_ref(), job, SchedulerEvent::JobRunningToFinished);
            self.retire(job_id);
        }
        Ok(data)
    }

    pub fn change_job_priority(&mut self, job_id: JobId, priority: JobPriority) -> Result<()> {
        let listener = Arc::clone(&self.listener);
        let job = self.alive_mut(job_id)?;
        job.set_priority(priority);
        notify_job(listener.as_ref(), job, SchedulerEvent::JobChangePriority);
        info!(job_id = %job_id, %priority, "job priority changed");
        Ok(())
    }

    pub fn kill_job(&mut self, job_id: JobId) -> Result<TerminationData> {
        self.terminate_job(job_id, JobStatus::Killed)
    }

    /// Drop a job from every table. Alive jobs end without changing their status.
    pub fn remove_job(&mut self, job_id: JobId) -> Result<TerminationData> {
        let data = self.terminate_job(job_id, JobStatus::Finished)?;
        let Some(mut job) = self.ended.remove(&job_id) else {
            return Err(SchedulerError::UnknownJob(job_id));
        };
        job.info.removed_time = Some(chrono::Utc::now());
        notify_job(self.listener.as_ref(), &job, SchedulerEvent::JobRemoved);
        info!(job_id = %job_id, "job removed");
        Ok(data)
    }

    fn terminate_job(&mut self, job_id: JobId, status: JobStatus) -> Result<TerminationData> {
        let mut data = TerminationData::default();
        if self.jobs.contains_key(&job_id) {
            info!(job_id = %job_id, %status, "terminating job");
            self.end_job(job_id, None, status, &mut data);
        } else if !self.ended.contains_key(&job_id) {
            return Err(SchedulerError::UnknownJob(job_id));
        }
        Ok(data)
    }

    /// Take the job out of the alive table and settle its tasks.
    ///
    /// With `Finished` the job status is left untouched (used by removal).
    fn end_job(
        &mut self,
        job_id: JobId,
        cause: Option<TaskId>,
        status: JobStatus,
        data: &mut TerminationData,
    ) {
        let Some(mut job) = self.jobs.remove(&job_id) else {
            return;
        };
        data.add_job_terminated(job_id);

        let event = if job.status() == JobStatus::Pending {
            SchedulerEvent::JobPendingToFinished
        } else {
            SchedulerEvent::JobRunningToFinished
        };
        match cause {
            Some(task) => info!(job_id = %job_id, task_id = %task, "ending request caused by task"),
            None => info!(job_id = %job_id, "ending request"),
        }

        let mut running: Vec<(TaskId, String)> = self
            .running
            .iter()
            .filter(|(task, _)| task.job == job_id)
            .map(|(task, node)| (*task, node.clone()))
            .collect();
        running.sort();
        for (task, node) in running {
            self.running.remove(&task);
            if let Some(t) = job.task_mut(task) {
                t.progress = 0;
            }
            data.add_task_to_terminate(task, Some(node), TerminationStatus::Aborted);
        }

        if status != JobStatus::Finished {
            let cause = if status == JobStatus::Killed { None } else { cause };
            for task in job.failed(cause, status) {
                notify_task(self.listener.as_ref(), &job, task, SchedulerEvent::TaskRunningToFinished);
            }
        }

        notify_job(self.listener.as_ref(), &job, event);
        info!(job_id = %job_id, status = %job.status(), "job finished");
        self.ended.insert(job_id, job);
    }

    fn retire(&mut self, job_id: JobId) {
        if let Some(job) = self.jobs.remove(&job_id) {
            self.ended.insert(job_id, job);
        }
    }

    fn terminate_task(
        &mut self,
        task_id: TaskId,
        error: bool,
        duration_ms: Option<i64>,
        data: &mut TerminationData,
    ) -> Result<()> {
        let job_id = task_id.job;
        let listener = Arc::clone(&self.listener);
        let job = self.alive_mut(job_id)?;

        let ready = job.terminate_task(error, task_id, duration_ms)?;
        if !ready.is_empty() {
            debug!(task_id = %task_id, released = ready.len(), "children released");
        }
        let finished = job.is_finished();
        if finished {
            job.terminate();
            data.add_job_terminated(job_id);
        }

        notify_task(listener.as_ref(), job, task_id, SchedulerEvent::TaskRunningToFinished);
        info!(
            job_id = %job_id,
            finished_tasks = job.info.finished_tasks,
            total_tasks = job.info.total_tasks,
            finished,
            "task terminated"
        );
        if finished {
            notify_job(listener.as_ref(), job, SchedulerEvent::JobRunningToFinished);
            self.retire(job_id);
        }
        Ok(())
    }

    fn restart_task_on_error(
        &mut self,
        task_id: TaskId,
        status: TaskStatus,
        wait_ms: u64,
        data: &mut TerminationData,
    ) -> Result<()> {
        let listener = Arc::clone(&self.listener);
        let job = self.alive_mut(task_id.job)?;
        let Some(task) = job.task_mut(task_id) else {
            return Ok(());
        };

        if task.restart_mode == RestartMode::Elsewhere
            && let Some(node) = task.last_node.clone()
            && !task.is_excluded(&node)
        {
            debug!(task_id = %task_id, node = %node, "node excluded for next execution");
            task.excluded_nodes.push(node);
        }
        task.status = status;
        job.new_waiting_task();
        notify_task(listener.as_ref(), job, task_id, SchedulerEvent::TaskWaitingForRestart);

        data.add_restart(task_id, wait_ms);
        info!(task_id = %task_id, wait_ms, "new restart is scheduled");
        Ok(())
    }

    fn suspend_task_on_error(&mut self, task_id: TaskId, duration_ms: Option<i64>) -> Result<()> {
        let listener = Arc::clone(&self.listener);
        let job = self.alive_mut(task_id.job)?;
        job.suspend_task_on_error(task_id, duration_ms)?;
        notify_task(listener.as_ref(), job, task_id, SchedulerEvent::TaskInError);
        notify_job(listener.as_ref(), job, SchedulerEvent::JobInError);
        Ok(())
    }

    /// Tasks ready to launch, highest priority first, then by job and task id.
    pub fn eligible_tasks(&self, status: SchedulerStatus) -> Vec<TaskId> {
        if matches!(status, SchedulerStatus::Frozen | SchedulerStatus::Stopped) || status.is_down() {
            return Vec::new();
        }

        let mut eligible: Vec<(JobPriority, TaskId)> = Vec::new();
        for job in self.jobs.values() {
            // A paused scheduler only keeps already started jobs going.
            if status == SchedulerStatus::Paused && job.info.start_time.is_none() {
                continue;
            }
            for id in job.eligible_tasks() {
                let launchable = job
                    .task(id)
                    .is_some_and(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::Submitted));
                if launchable {
                    eligible.push((job.priority(), id));
                }
            }
        }
        eligible.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        eligible.into_iter().map(|(_, id)| id).collect()
    }

    /// Restore a job loaded from persisted state.
    pub fn job_recovered(&mut self, mut job: Job) {
        let id = job.id();
        job.rebuild_descriptor();
        if job.status().is_alive() {
            for task in job.tasks() {
                if task.status == TaskStatus::Running
                    && let Some(node) = &task.last_node
                {
                    self.running.insert(task.id, node.clone());
                }
            }
            info!(job_id = %id, status = %job.status(), "job recovered");
            self.jobs.insert(id, job);
        } else {
            debug!(job_id = %id, status = %job.status(), "ended job recovered");
            self.ended.insert(id, job);
        }
    }

    pub fn job_state(&self, id: JobId) -> Result<&Job> {
        self.jobs
            .get(&id)
            .or_else(|| self.ended.get(&id))
            .ok_or(SchedulerError::UnknownJob(id))
    }

    pub fn job_status(&self, id: JobId) -> Result<JobStatus> {
        self.job_state(id).map(Job::status)
    }

    pub fn task_status(&self, id: JobId, name: &str) -> Result<TaskStatus> {
        Ok(self.job_state(id)?.task_by_name(name)?.status)
    }

    /// Alive and ended jobs, by id.
    pub fn jobs(&self) -> Vec<&Job> {
        let mut all: Vec<&Job> = self.jobs.values().chain(self.ended.values()).collect();
        all.sort_by_key(|j| j.id());
        all
    }

    pub fn has_alive_jobs(&self) -> bool {
        !self.jobs.is_empty()
    }

    pub fn is_alive(&self, id: JobId) -> bool {
        self.jobs.contains_key(&id)
    }

    pub fn running_tasks(&self) -> Vec<(TaskId, String)> {
        let mut running: Vec<(TaskId, String)> =
            self.running.iter().map(|(t, n)| (*t, n.clone())).collect();
        running.sort();
        running
    }

    pub fn node_of(&self, task: TaskId) -> Option<&str> {
        self.running.get(&task).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Executable, JobDefaults, JobSpec, TaskSpec};
    use crate::model::OnTaskError;
    use crate::scheduler::events::EventLog;

    fn sleep() -> Executable {
        Executable::Sleep {
            duration_ms: 1,
            fail_attempts: 0,
        }
    }

    fn live() -> (LiveJobs, Arc<EventLog>) {
        let log = Arc::new(EventLog::new(128));
        (LiveJobs::new(log.clone()), log)
    }

    fn submit(live: &mut LiveJobs, id: u64, spec: &JobSpec) -> JobId {
        let id = JobId::new(id);
        let job = Job::build(id, "tester", spec, &JobDefaults::default()).unwrap();
        live.job_submitted(job).unwrap();
        id
    }

    fn single(policy: OnTaskError, max: u32) -> JobSpec {
        JobSpec::new("single").task(TaskSpec::new("work", sleep()).on_error(policy).max_executions(max))
    }

    #[test]
    fn successful_task_finishes_job() {
        let (mut live, log) = live();
        let job = submit(&mut live, 1, &single(OnTaskError::None, 1));
        let task = TaskId::new(job, 0);

        assert_eq!(live.eligible_tasks(SchedulerStatus::Started), vec![task]);
        live.task_started(task, "localhost", "n0").unwrap();
        assert!(matches!(
            live.task_started(task, "localhost", "n0"),
            Err(SchedulerError::AlreadyRunning(_))
        ));
        assert_eq!(live.job_status(job).unwrap(), JobStatus::Running);

        let data = live
            .task_terminated_with_result(&TaskResult::success(task, 5))
            .unwrap();
        assert_eq!(data.jobs_terminated, vec![job]);
        assert_eq!(live.job_status(job).unwrap(), JobStatus::Finished);
        assert!(!live.has_alive_jobs());
        assert_eq!(log.count(SchedulerEvent::JobRunningToFinished), 1);
        assert_eq!(log.count(SchedulerEvent::JobPendingToRunning), 1);
    }

    #[test]
    fn error_with_budget_schedules_restart_with_backoff() {
        let (mut live, _log) = live();
        let job = submit(&mut live, 1, &single(OnTaskError::None, 3));
        let task = TaskId::new(job, 0);

        live.task_started(task, "localhost", "n0").unwrap();
        let data = live
            .task_terminated_with_result(&TaskResult::failure(task, "boom", 3))
            .unwrap();
        assert_eq!(data.restarts.len(), 1);
        assert_eq!(data.restarts[0].wait_ms, 2000);
        let state = live.job_state(job).unwrap();
        assert_eq!(state.task(task).unwrap().status, TaskStatus::WaitingOnError);
        assert_eq!(state.info.faulty_tasks, 1);
        assert_eq!(state.status(), JobStatus::Stalled);
        assert!(live.eligible_tasks(SchedulerStatus::Started).is_empty());

        live.restart_waiting_task(task).unwrap();
        assert_eq!(live.eligible_tasks(SchedulerStatus::Started), vec![task]);

        live.task_started(task, "localhost", "n1").unwrap();
        let data = live
            .task_terminated_with_result(&TaskResult::failure(task, "boom", 3))
            .unwrap();
        assert_eq!(data.restarts[0].wait_ms, 4000);
    }

    #[test]
    fn huge_restart_delays_saturate() {
        let (mut live, _log) = live();
        let job = submit(&mut live, 1, &single(OnTaskError::None, 3));
        let task = TaskId::new(job, 0);

        live.task_started(task, "h", "n0").unwrap();
        let data = live.preempt_task(job, "work", u64::MAX / 10).unwrap();
        assert_eq!(data.restarts[0].wait_ms, u64::MAX);
        assert_eq!(live.task_status(job, "work").unwrap(), TaskStatus::Pending);

        live.restart_waiting_task(task).unwrap();
        live.task_started(task, "h", "n0").unwrap();
        let data = live.restart_task(job, "work", u64::MAX).unwrap();
        assert_eq!(data.restarts[0].wait_ms, u64::MAX);
        assert_eq!(
            live.task_status(job, "work").unwrap(),
            TaskStatus::WaitingOnError
        );
    }

    #[test]
    fn last_error_with_cancel_policy_cancels_job() {
        let (mut live, _log) = live();
        let spec = JobSpec::new("cancel")
            .task(TaskSpec::new("bad", sleep()).on_error(OnTaskError::CancelJob))
            .task(TaskSpec::new("other", sleep()));
        let job = submit(&mut live, 1, &spec);
        let bad = TaskId::new(job, 0);
        let other = TaskId::new(job, 1);

        live.task_started(bad, "h", "n0").unwrap();
        live.task_started(other, "h", "n1").unwrap();
        let data = live
            .task_terminated_with_result(&TaskResult::failure(bad, "boom", 1))
            .unwrap();

        assert!(data.job_terminated(job));
        assert_eq!(data.tasks_to_terminate.len(), 1);
        assert_eq!(data.tasks_to_terminate[0].task, other);
        let state = live.job_state(job).unwrap();
        assert_eq!(state.status(), JobStatus::Canceled);
        assert_eq!(state.task(bad).unwrap().status, TaskStatus::Faulty);
        assert_eq!(state.task(other).unwrap().status, TaskStatus::Aborted);
        assert!(live.running_tasks().is_empty());
    }

    #[test]
    fn suspend_and_pause_policies() {
        let (mut live, log) = live();
        let job = submit(&mut live, 1, &single(OnTaskError::SuspendTask, 1));
        let task = TaskId::new(job, 0);
        live.task_started(task, "h", "n0").unwrap();
        live.task_terminated_with_result(&TaskResult::failure(task, "x", 1))
            .unwrap();
        assert_eq!(live.job_status(job).unwrap(), JobStatus::InError);
        assert_eq!(live.task_status(job, "work").unwrap(), TaskStatus::InError);
        assert_eq!(log.count(SchedulerEvent::TaskInError), 1);

        let spec = JobSpec::new("pausing")
            .task(TaskSpec::new("work", sleep()).on_error(OnTaskError::PauseJob))
            .task(TaskSpec::new("later", sleep()).depends_on("work"));
        let paused = submit(&mut live, 2, &spec);
        let task = TaskId::new(paused, 0);
        live.task_started(task, "h", "n0").unwrap();
        live.task_terminated_with_result(&TaskResult::failure(task, "x", 1))
            .unwrap();
        assert_eq!(live.job_status(paused).unwrap(), JobStatus::Paused);
        assert_eq!(live.task_status(paused, "later").unwrap(), TaskStatus::Paused);

        live.resume_job(paused).unwrap();
        assert_eq!(live.job_status(paused).unwrap(), JobStatus::InError);
    }

    #[test]
    fn finishing_in_error_task_releases_children() {
        let (mut live, _log) = live();
        let spec = JobSpec::new("chain")
            .task(TaskSpec::new("first", sleep()).on_error(OnTaskError::SuspendTask))
            .task(TaskSpec::new("second", sleep()).depends_on("first"));
        let job = submit(&mut live, 1, &spec);
        let first = TaskId::new(job, 0);
        live.task_started(first, "h", "n0").unwrap();
        live.task_terminated_with_result(&TaskResult::failure(first, "x", 1))
            .unwrap();

        let data = live.finish_in_error_task(job, "first").unwrap();
        assert!(data.jobs_terminated.is_empty());
        assert_eq!(live.task_status(job, "first").unwrap(), TaskStatus::Faulty);
        assert_eq!(live.eligible_tasks(SchedulerStatus::Started), vec![TaskId::new(job, 1)]);
        assert_eq!(live.job_status(job).unwrap(), JobStatus::Stalled);
    }

    #[test]
    fn node_failure_retries_then_fails_job() {
        let (mut live, _log) = live();
        let job = submit(&mut live, 1, &single(OnTaskError::None, 1));
        let task = TaskId::new(job, 0);

        live.task_started(task, "h", "n0").unwrap();
        let data = live.restart_task_on_node_failure(task).unwrap();
        assert_eq!(data.tasks_to_terminate[0].status, TerminationStatus::NodeFailed);
        assert_eq!(live.task_status(job, "work").unwrap(), TaskStatus::Pending);
        assert_eq!(live.eligible_tasks(SchedulerStatus::Started), vec![task]);

        live.task_started(task, "h", "n1").unwrap();
        let data = live.restart_task_on_node_failure(task).unwrap();
        assert!(data.job_terminated(job));
        let state = live.job_state(job).unwrap();
        assert_eq!(state.status(), JobStatus::Failed);
        assert_eq!(state.task(task).unwrap().status, TaskStatus::Failed);
        assert_eq!(state.info.failed_tasks, 1);
    }

    #[test]
    fn elsewhere_mode_excludes_previous_node() {
        let (mut live, _log) = live();
        let spec = JobSpec::new("elsewhere").task(
            TaskSpec::new("work", sleep())
                .max_executions(2)
                .restart_mode(RestartMode::Elsewhere),
        );
        let job = submit(&mut live, 1, &spec);
        let task = TaskId::new(job, 0);
        live.task_started(task, "h", "n3").unwrap();
        live.task_terminated_with_result(&TaskResult::failure(task, "x", 1))
            .unwrap();
        let state = live.job_state(job).unwrap();
        assert!(state.task(task).unwrap().is_excluded("n3"));
    }

    #[test]
    fn eligible_tasks_follow_priority_and_scheduler_status() {
        let (mut live, _log) = live();
        let low = submit(
            &mut live,
            1,
            &JobSpec::new("low").priority(JobPriority::Low).task(TaskSpec::new("a", sleep())),
        );
        let high = submit(
            &mut live,
            2,
            &JobSpec::new("high").priority(JobPriority::High).task(TaskSpec::new("a", sleep())),
        );
        assert_eq!(
            live.eligible_tasks(SchedulerStatus::Started),
            vec![TaskId::new(high, 0), TaskId::new(low, 0)]
        );
        assert!(live.eligible_tasks(SchedulerStatus::Frozen).is_empty());
        assert!(live.eligible_tasks(SchedulerStatus::Paused).is_empty());

        live.change_job_priority(low, JobPriority::Highest).unwrap();
        assert_eq!(live.eligible_tasks(SchedulerStatus::Started)[0], TaskId::new(low, 0));
    }

    #[test]
    fn kill_and_remove_jobs() {
        let (mut live, log) = live();
        let job = submit(&mut live, 1, &single(OnTaskError::None, 1));
        assert!(live.kill_task(JobId::new(9), "work").is_err());

        let data = live.kill_job(job).unwrap();
        assert!(data.job_terminated(job));
        assert_eq!(live.job_status(job).unwrap(), JobStatus::Killed);
        assert_eq!(live.task_status(job, "work").unwrap(), TaskStatus::NotStarted);
        assert_eq!(log.count(SchedulerEvent::JobPendingToFinished), 1);

        live.remove_job(job).unwrap();
        assert!(live.job_state(job).is_err());
        assert!(live.remove_job(job).is_err());
    }

    #[test]
    fn recovered_running_task_is_tracked() {
        let (mut live, _log) = live();
        let id = submit(&mut live, 1, &single(OnTaskError::None, 1));
        let task = TaskId::new(id, 0);
        live.task_started(task, "h", "n0").unwrap();
        let snapshot = live.job_state(id).unwrap().clone();

        let (mut fresh, _log) = self::live();
        fresh.job_recovered(snapshot);
        assert_eq!(fresh.node_of(task), Some("n0"));
        assert!(fresh.has_alive_jobs());
        assert!(fresh.eligible_tasks(SchedulerStatus::Started).is_empty());
    }
}
