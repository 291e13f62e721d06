use crate::model::{JobId, TaskId};

/// Why a running task has to be stopped on its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    /// Stopped by the scheduler: job ended, or task killed, restarted or preempted.
    Aborted,
    /// The node running the task was lost.
    NodeFailed,
}

/// Side effects a caller must carry out after an engine call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminationData {
    pub jobs_terminated: Vec<JobId>,
    pub tasks_to_terminate: Vec<TaskTermination>,
    /// Tasks to hand back to `restart_waiting_task` after a delay.
    pub restarts: Vec<TaskRestart>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTermination {
    pub task: TaskId,
    pub node: Option<String>,
    pub status: TerminationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRestart {
    pub task: TaskId,
    pub wait_ms: u64,
}

impl TerminationData {
    pub fn is_empty(&self) -> bool {
        self.jobs_terminated.is_empty()
            && self.tasks_to_terminate.is_empty()
            && self.restarts.is_empty()
    }

    pub fn add_job_terminated(&mut self, job: JobId) {
        if !self.jobs_terminated.contains(&job) {
            self.jobs_terminated.push(job);
        }
    }

    pub fn add_task_to_terminate(
        &mut self,
        task: TaskId,
        node: Option<String>,
        status: TerminationStatus,
    ) {
        self.tasks_to_terminate.push(TaskTermination { task, node, status });
    }

    pub fn add_restart(&mut self, task: TaskId, wait_ms: u64) {
        self.restarts.push(TaskRestart { task, wait_ms });
    }

    pub fn job_terminated(&self, job: JobId) -> bool {
        self.jobs_terminated.contains(&job)
    }

    pub fn merge(&mut self, other: TerminationData) {
        for job in other.jobs_terminated {
            self.add_job_terminated(job);
        }
        self.tasks_to_terminate.extend(other.tasks_to_terminate);
        self.restarts.extend(other.restarts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_deduplicates_jobs() {
        let job = JobId::new(2);
        let mut a = TerminationData::default();
        assert!(a.is_empty());
        a.add_job_terminated(job);

        let mut b = TerminationData::default();
        b.add_job_terminated(job);
        b.add_restart(TaskId::new(job, 1), 500);
        b.add_task_to_terminate(TaskId::new(job, 0), Some("n0".into()), TerminationStatus::Aborted);

        a.merge(b);
        assert_eq!(a.jobs_terminated, vec![job]);
        assert_eq!(a.restarts.len(), 1);
        assert_eq!(a.tasks_to_terminate[0].status, TerminationStatus::Aborted);
        assert!(a.job_terminated(job));
    }
}
