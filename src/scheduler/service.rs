use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::events::{SchedulerEvent, SchedulerListener};
use super::live_jobs::{LiveJobs, TaskResult};
use super::nodes::NodePool;
use super::termination::TerminationData;
use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::job::{Executable, Job, JobSpec};
use crate::model::{IdCounter, JobId, JobPriority, JobStatus, SchedulerStatus, TaskId, TaskStatus};
use crate::util::ThreadStore;

/// A task the scheduler decided to run, with the node it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLaunch {
    pub job: JobId,
    pub task: TaskId,
    pub name: String,
    pub executable: Executable,
    pub node: String,
    /// 1 for the first execution.
    pub attempt: u32,
}

/// Front door of the scheduler: owns the live jobs and the scheduler status.
pub struct Scheduler {
    config: SchedulerConfig,
    url: Url,
    live: Mutex<LiveJobs>,
    status: Mutex<SchedulerStatus>,
    gate: ThreadStore,
    ids: IdCounter,
    listener: Arc<dyn SchedulerListener>,
}

impl Scheduler {
    /// A started scheduler with no job.
    pub fn new(config: SchedulerConfig, listener: Arc<dyn SchedulerListener>) -> Result<Self> {
        let url = config.url()?;
        Ok(Self {
            config,
            url,
            live: Mutex::new(LiveJobs::new(Arc::clone(&listener))),
            status: Mutex::new(SchedulerStatus::Started),
            gate: ThreadStore::new(true),
            ids: IdCounter::new(),
            listener,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn status(&self) -> SchedulerStatus {
        *self.status.lock().await
    }

    async fn transition(
        &self,
        allowed: impl Fn(&SchedulerStatus) -> bool,
        next: SchedulerStatus,
        event: SchedulerEvent,
    ) -> bool {
        {
            let mut status = self.status.lock().await;
            if !allowed(&*status) {
                let current = *status;
                debug!(from = %current, to = %next, "scheduler transition refused");
                return false;
            }
            *status = next;
        }
        self.listener.scheduler_state_updated(event);
        info!(status = %next, "scheduler status changed");
        true
    }

    pub async fn start(&self) -> bool {
        let done = self
            .transition(SchedulerStatus::is_startable, SchedulerStatus::Started, SchedulerEvent::Started)
            .await;
        if done {
            self.gate.open();
        }
        done
    }

    pub async fn stop(&self) -> bool {
        let done = self
            .transition(SchedulerStatus::is_stoppable, SchedulerStatus::Stopped, SchedulerEvent::Stopped)
            .await;
        if done {
            self.gate.close().await;
        }
        done
    }

    /// Only jobs that already started keep getting tasks scheduled.
    pub async fn pause(&self) -> bool {
        self.transition(SchedulerStatus::is_pausable, SchedulerStatus::Paused, SchedulerEvent::Paused)
            .await
    }

    pub async fn freeze(&self) -> bool {
        let done = self
            .transition(SchedulerStatus::is_freezable, SchedulerStatus::Frozen, SchedulerEvent::Frozen)
            .await;
        if done {
            self.gate.close().await;
        }
        done
    }

    pub async fn resume(&self) -> bool {
        let done = self
            .transition(SchedulerStatus::is_resumable, SchedulerStatus::Started, SchedulerEvent::Resumed)
            .await;
        if done {
            self.gate.open();
        }
        done
    }

    /// Stop scheduling for good; running tasks may still report back.
    pub async fn shutdown(&self) -> bool {
        let done = self
            .transition(
                |s| !s.is_down(),
                SchedulerStatus::ShuttingDown,
                SchedulerEvent::ShuttingDown,
            )
            .await;
        if done {
            self.gate.close().await;
        }
        done
    }

    /// Kill every alive job. `None` if the scheduler was already killed.
    pub async fn kill(&self) -> Option<TerminationData> {
        let done = self
            .transition(|s| !s.is_killed(), SchedulerStatus::Killed, SchedulerEvent::Killed)
            .await;
        if !done {
            return None;
        }
        self.gate.close().await;

        let mut live = self.live.lock().await;
        let alive: Vec<JobId> = live
            .jobs()
            .into_iter()
            .filter(|j| j.status().is_alive())
            .map(Job::id)
            .collect();
        let mut data = TerminationData::default();
        for id in alive {
            match live.kill_job(id) {
                Ok(d) => data.merge(d),
                Err(e) => warn!(job_id = %id, error = %e, "failed to kill job"),
            }
        }
        Some(data)
    }

    pub async fn submit(&self, owner: &str, spec: &JobSpec) -> Result<JobId> {
        let status = self.status().await;
        if !status.is_submittable() {
            return Err(SchedulerError::SubmissionRefused(status));
        }
        spec.validate()?;

        let id = JobId::new(self.ids.next());
        let job = Job::build(id, owner, spec, &self.config.job_defaults())?;
        self.live.lock().await.job_submitted(job)?;
        Ok(id)
    }

    /// One scheduling pass: start as many eligible tasks as there are free nodes.
    ///
    /// Does nothing while the gate is closed.
    pub async fn schedule_cycle(&self, pool: &mut NodePool) -> Result<Vec<TaskLaunch>> {
        let Some(_guard) = self.gate.try_enter() else {
            return Ok(Vec::new());
        };
        let status = self.status().await;
        let mut live = self.live.lock().await;

        let mut launches = Vec::new();
        for task_id in live.eligible_tasks(status) {
            if pool.free_count() == 0 {
                break;
            }
            let (name, executable, excluded) = {
                let job = live.job_state(task_id.job)?;
                let Some(task) = job.task(task_id) else {
                    continue;
                };
                (task.name.clone(), task.executable.clone(), task.excluded_nodes.clone())
            };
            let Some(node) = pool.acquire(&excluded) else {
                continue;
            };

            if let Err(e) = live.task_started(task_id, pool.host(), &node) {
                pool.release(&node);
                return Err(e);
            }
            let attempt = live
                .job_state(task_id.job)?
                .task(task_id)
                .map_or(1, |t| t.executions);
            launches.push(TaskLaunch {
                job: task_id.job,
                task: task_id,
                name,
                executable,
                node,
                attempt,
            });
        }
        Ok(launches)
    }

    pub async fn task_terminated(&self, result: &TaskResult) -> Result<TerminationData> {
        self.live.lock().await.task_terminated_with_result(result)
    }

    pub async fn restart_task_on_node_failure(&self, task: TaskId) -> Result<TerminationData> {
        self.live.lock().await.restart_task_on_node_failure(task)
    }

    pub async fn restart_waiting_task(&self, task: TaskId) -> Result<()> {
        self.live.lock().await.restart_waiting_task(task)
    }

    pub async fn restart_task(&self, job: JobId, name: &str, delay_s: u64) -> Result<TerminationData> {
        self.live.lock().await.restart_task(job, name, delay_s)
    }

    pub async fn preempt_task(&self, job: JobId, name: &str, delay_s: u64) -> Result<TerminationData> {
        self.live.lock().await.preempt_task(job, name, delay_s)
    }

    pub async fn kill_task(&self, job: JobId, name: &str) -> Result<TerminationData> {
        self.live.lock().await.kill_task(job, name)
    }

    pub async fn pause_job(&self, job: JobId) -> Result<bool> {
        self.live.lock().await.pause_job(job)
    }

    pub async fn resume_job(&self, job: JobId) -> Result<bool> {
        self.live.lock().await.resume_job(job)
    }

    pub async fn restart_in_error_task(&self, job: JobId, name: &str) -> Result<bool> {
        self.live.lock().await.restart_in_error_task(job, name)
    }

    pub async fn restart_all_in_error_tasks(&self, job: JobId) -> Result<bool> {
        self.live.lock().await.restart_all_in_error_tasks(job)
    }

    pub async fn finish_in_error_task(&self, job: JobId, name: &str) -> Result<TerminationData> {
        self.live.lock().await.finish_in_error_task(job, name)
    }

    pub async fn change_job_priority(&self, job: JobId, priority: JobPriority) -> Result<()> {
        self.live.lock().await.change_job_priority(job, priority)
    }

    pub async fn kill_job(&self, job: JobId) -> Result<TerminationData> {
        self.live.lock().await.kill_job(job)
    }

    pub async fn remove_job(&self, job: JobId) -> Result<TerminationData> {
        self.live.lock().await.remove_job(job)
    }

    /// A copy of the job as it is now.
    pub async fn job_state(&self, job: JobId) -> Result<Job> {
        self.live.lock().await.job_state(job).cloned()
    }

    pub async fn job_status(&self, job: JobId) -> Result<JobStatus> {
        self.live.lock().await.job_status(job)
    }

    pub async fn task_status(&self, job: JobId, name: &str) -> Result<TaskStatus> {
        self.live.lock().await.task_status(job, name)
    }

    pub async fn has_alive_jobs(&self) -> bool {
        self.live.lock().await.has_alive_jobs()
    }

    pub async fn running_tasks(&self) -> Vec<(TaskId, String)> {
        self.live.lock().await.running_tasks()
    }

    /// Every known job, alive or ended.
    pub async fn snapshot(&self) -> Vec<Job> {
        self.live.lock().await.jobs().into_iter().cloned().collect()
    }

    /// Restore persisted jobs. New ids continue after the highest recovered one.
    pub async fn recover(&self, jobs: Vec<Job>) {
        let mut live = self.live.lock().await;
        for job in jobs {
            self.ids.bump_to(job.id().value());
            live.job_recovered(job);
        }
        info!(last_id = self.ids.last(), "jobs recovered");
    }
}
