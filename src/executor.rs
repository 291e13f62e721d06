use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::job::{Executable, JobSummary};
use crate::model::{JobId, TaskId, TaskStatus};
use crate::scheduler::{NodePool, Scheduler, TaskLaunch, TaskResult, TerminationData};
use crate::store::JobStore;

enum ExecutorMessage {
    Finished {
        launch_id: u64,
        node: String,
        result: TaskResult,
    },
    RestartDue(TaskId),
    Terminate(TerminationData),
}

struct RunningTask {
    launch_id: u64,
    node: String,
    abort: AbortHandle,
}

/// Runs scheduled tasks on a pool of local nodes.
///
/// Commands run as child processes; `Sleep` executables only wait. Results come
/// back over a channel and are fed to the scheduler, whose answer says which
/// tasks to abort and which restarts to arm.
pub struct LocalExecutor {
    scheduler: Arc<Scheduler>,
    pool: NodePool,
    store: Option<JobStore>,
    interval: Duration,
    running: HashMap<TaskId, RunningTask>,
    next_launch: u64,
    // Tasks with a restart timer in flight.
    armed: HashSet<TaskId>,
    tx: mpsc::UnboundedSender<ExecutorMessage>,
    rx: mpsc::UnboundedReceiver<ExecutorMessage>,
    summaries: Vec<JobSummary>,
}

/// Lets other tasks act on jobs while the executor runs.
#[derive(Clone)]
pub struct ExecutorHandle {
    scheduler: Arc<Scheduler>,
    tx: mpsc::UnboundedSender<ExecutorMessage>,
}

impl ExecutorHandle {
    fn forward(&self, job: JobId, data: TerminationData) {
        if data.is_empty() {
            return;
        }
        if self.tx.send(ExecutorMessage::Terminate(data)).is_err() {
            warn!(job_id = %job, "executor is gone, termination not applied");
        }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub async fn restart_task(&self, job: JobId, name: &str, delay_s: u64) -> Result<()> {
        let data = self.scheduler.restart_task(job, name, delay_s).await?;
        self.forward(job, data);
        Ok(())
    }

    pub async fn preempt_task(&self, job: JobId, name: &str, delay_s: u64) -> Result<()> {
        let data = self.scheduler.preempt_task(job, name, delay_s).await?;
        self.forward(job, data);
        Ok(())
    }

    pub async fn kill_task(&self, job: JobId, name: &str) -> Result<()> {
        let data = self.scheduler.kill_task(job, name).await?;
        self.forward(job, data);
        Ok(())
    }

    pub async fn kill_job(&self, job: JobId) -> Result<()> {
        let data = self.scheduler.kill_job(job).await?;
        self.forward(job, data);
        Ok(())
    }

    pub async fn finish_in_error_task(&self, job: JobId, name: &str) -> Result<()> {
        let data = self.scheduler.finish_in_error_task(job, name).await?;
        self.forward(job, data);
        Ok(())
    }
}

impl LocalExecutor {
    pub fn new(scheduler: Arc<Scheduler>, pool: NodePool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let interval = Duration::from_millis(scheduler.config().schedule_interval_ms.max(1));
        Self {
            scheduler,
            pool,
            store: None,
            interval,
            running: HashMap::new(),
            next_launch: 0,
            armed: HashSet::new(),
            tx,
            rx,
            summaries: Vec::new(),
        }
    }

    /// Persist every job change into `store`.
    pub fn with_store(mut self, store: JobStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn handle(&self) -> ExecutorHandle {
        ExecutorHandle {
            scheduler: Arc::clone(&self.scheduler),
            tx: self.tx.clone(),
        }
    }

    /// Drive the scheduler until no alive job is left, or until nothing can
    /// move anymore (no running task, no pending restart, nothing eligible).
    ///
    /// Returns the summaries of the jobs that ended during the run.
    pub async fn run_until_idle(&mut self) -> Result<Vec<JobSummary>> {
        self.fail_orphaned_tasks().await?;

        loop {
            let launches = self.scheduler.schedule_cycle(&mut self.pool).await?;
            let launched = !launches.is_empty();
            for launch in launches {
                self.persist(launch.job).await?;
                self.launch(launch);
            }

            if !launched && self.running.is_empty() && self.armed.is_empty() {
                if let Ok(msg) = self.rx.try_recv() {
                    self.on_message(msg).await?;
                    continue;
                }
                if self.scheduler.has_alive_jobs().await {
                    warn!("alive jobs cannot make progress, stopping");
                } else {
                    info!("no alive job left");
                }
                break;
            }

            tokio::select! {
                Some(msg) = self.rx.recv() => self.on_message(msg).await?,
                _ = sleep(self.interval) => {}
            }
        }

        Ok(std::mem::take(&mut self.summaries))
    }

    // Tasks recovered as Running have no process behind them anymore, and
    // recovered waiting tasks lost their restart timer.
    async fn fail_orphaned_tasks(&mut self) -> Result<()> {
        for (task, node) in self.scheduler.running_tasks().await {
            if self.running.contains_key(&task) {
                continue;
            }
            warn!(task_id = %task, node = %node, "no process for recovered task, treating as node failure");
            let data = self.scheduler.restart_task_on_node_failure(task).await?;
            self.apply(data).await?;
            self.persist(task.job).await?;
        }

        for job in self.scheduler.snapshot().await {
            if !job.status().is_alive() {
                continue;
            }
            for task in job.tasks() {
                if matches!(
                    task.status,
                    TaskStatus::WaitingOnError | TaskStatus::WaitingOnFailure
                ) && !self.armed.contains(&task.id)
                {
                    debug!(task_id = %task.id, "re-arming restart of recovered task");
                    self.armed.insert(task.id);
                    let _ = self.tx.send(ExecutorMessage::RestartDue(task.id));
                }
            }
        }
        Ok(())
    }

    fn launch(&mut self, launch: TaskLaunch) {
        self.next_launch += 1;
        let launch_id = self.next_launch;
        let tx = self.tx.clone();
        let task = launch.task;
        let node = launch.node.clone();

        debug!(task_id = %task, node = %node, attempt = launch.attempt, "launching task");
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let outcome = execute(&launch.executable, launch.attempt).await;
            let elapsed = started.elapsed().as_millis() as i64;
            let result = match outcome {
                Ok(()) => TaskResult::success(launch.task, elapsed),
                Err(e) => TaskResult::failure(launch.task, e, elapsed),
            };
            let _ = tx.send(ExecutorMessage::Finished {
                launch_id,
                node: launch.node,
                result,
            });
        });

        self.running.insert(
            task,
            RunningTask {
                launch_id,
                node,
                abort: handle.abort_handle(),
            },
        );
    }

    async fn on_message(&mut self, msg: ExecutorMessage) -> Result<()> {
        match msg {
            ExecutorMessage::Finished {
                launch_id,
                node,
                result,
            } => {
                // Results of aborted executions are stale.
                let current = self
                    .running
                    .get(&result.task)
                    .is_some_and(|r| r.launch_id == launch_id);
                if !current {
                    debug!(task_id = %result.task, "ignoring result of aborted execution");
                    return Ok(());
                }
                self.running.remove(&result.task);
                self.pool.release(&node);

                let data = self.scheduler.task_terminated(&result).await?;
                self.apply(data).await?;
                self.persist(result.task.job).await?;
            }
            ExecutorMessage::RestartDue(task) => {
                self.armed.remove(&task);
                self.scheduler.restart_waiting_task(task).await?;
                self.persist(task.job).await?;
            }
            ExecutorMessage::Terminate(data) => {
                let jobs: Vec<JobId> = data
                    .tasks_to_terminate
                    .iter()
                    .map(|t| t.task.job)
                    .chain(data.jobs_terminated.iter().copied())
                    .collect();
                self.apply(data).await?;
                for job in jobs {
                    self.persist(job).await?;
                }
            }
        }
        Ok(())
    }

    async fn apply(&mut self, data: TerminationData) -> Result<()> {
        for termination in &data.tasks_to_terminate {
            // The execution may have finished already and its node gone to
            // another task; only free what this termination still owns.
            let current = self.running.get(&termination.task).is_some_and(|r| {
                termination.node.as_deref().is_none_or(|node| node == r.node)
            });
            if current {
                if let Some(running) = self.running.remove(&termination.task) {
                    running.abort.abort();
                    self.pool.release(&running.node);
                    debug!(task_id = %termination.task, status = ?termination.status, "task aborted");
                }
            } else if let Some(node) = &termination.node
                && !self.running.contains_key(&termination.task)
                && !self.running.values().any(|r| r.node == *node)
            {
                self.pool.release(node);
            }
        }

        for restart in &data.restarts {
            self.armed.insert(restart.task);
            let tx = self.tx.clone();
            let task = restart.task;
            let wait = Duration::from_millis(restart.wait_ms);
            tokio::spawn(async move {
                sleep(wait).await;
                let _ = tx.send(ExecutorMessage::RestartDue(task));
            });
        }

        for job in &data.jobs_terminated {
            // Removed jobs have no state left to summarize.
            if let Ok(state) = self.scheduler.job_state(*job).await {
                self.summaries.push(JobSummary::from_job(&state));
            }
            self.persist(*job).await?;
        }
        Ok(())
    }

    async fn persist(&self, job: JobId) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        match self.scheduler.job_state(job).await {
            Ok(state) => store.save(&state),
            Err(_) => store.remove(job).map(|_| ()),
        }
    }
}

async fn execute(executable: &Executable, attempt: u32) -> std::result::Result<(), String> {
    match executable {
        Executable::Sleep {
            duration_ms,
            fail_attempts,
        } => {
            sleep(Duration::from_millis(*duration_ms)).await;
            if attempt <= *fail_attempts {
                Err(format!("simulated failure on attempt {attempt}"))
            } else {
                Ok(())
            }
        }
        Executable::Command { program, args } => {
            let output = tokio::process::Command::new(program)
                .args(args)
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| format!("failed to run '{program}': {e}"))?;
            if output.status.success() {
                Ok(())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(format!("'{program}' exited with {}: {}", output.status, stderr.trim()))
            }
        }
    }
}
