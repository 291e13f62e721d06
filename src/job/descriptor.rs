use std::collections::{BTreeSet, HashMap};

use crate::model::{TaskId, TaskStatus};

/// Tracks which tasks of a job may be launched.
///
/// A task is eligible once every parent has terminated. Tasks move between the
/// eligible, running, paused and in-error sets as the job progresses.
#[derive(Debug, Clone, Default)]
pub struct JobDescriptor {
    eligible: BTreeSet<TaskId>,
    running: BTreeSet<TaskId>,
    paused: BTreeSet<TaskId>,
    in_error: BTreeSet<TaskId>,
    children: HashMap<TaskId, Vec<TaskId>>,
    remaining_parents: HashMap<TaskId, usize>,
}

impl JobDescriptor {
    /// Build from `(task, parents)` pairs. Tasks without parents start eligible.
    pub fn new<'a>(graph: impl IntoIterator<Item = (TaskId, &'a [TaskId])>) -> Self {
        let mut descriptor = Self::default();
        for (id, parents) in graph {
            descriptor.remaining_parents.insert(id, parents.len());
            for parent in parents {
                descriptor.children.entry(*parent).or_default().push(id);
            }
            if parents.is_empty() {
                descriptor.eligible.insert(id);
            }
        }
        descriptor
    }

    /// Rebuild the sets from persisted task statuses.
    pub fn rebuild<'a>(
        tasks: impl IntoIterator<Item = (TaskId, &'a [TaskId], TaskStatus)> + Clone,
    ) -> Self {
        let mut descriptor = Self::new(tasks.clone().into_iter().map(|(id, p, _)| (id, p)));
        descriptor.eligible.clear();

        let statuses: HashMap<TaskId, TaskStatus> =
            tasks.clone().into_iter().map(|(id, _, s)| (id, s)).collect();
        for (id, parents, status) in tasks {
            let done_parents = parents
                .iter()
                .filter(|p| statuses.get(*p).is_some_and(TaskStatus::is_done))
                .count();
            let remaining = parents.len().saturating_sub(done_parents);
            descriptor.remaining_parents.insert(id, remaining);

            match status {
                // Waiting tasks stay with the running ones until their restart fires.
                TaskStatus::Running | TaskStatus::WaitingOnError | TaskStatus::WaitingOnFailure => {
                    descriptor.running.insert(id);
                }
                TaskStatus::InError => {
                    descriptor.in_error.insert(id);
                }
                TaskStatus::Paused if remaining == 0 => {
                    descriptor.paused.insert(id);
                }
                TaskStatus::Submitted | TaskStatus::Pending if remaining == 0 => {
                    descriptor.eligible.insert(id);
                }
                _ => {}
            }
        }
        descriptor
    }

    pub fn start(&mut self, id: TaskId) {
        self.eligible.remove(&id);
        self.running.insert(id);
    }

    /// Make a running, paused or in-error task eligible again.
    pub fn restart(&mut self, id: TaskId) {
        self.running.remove(&id);
        self.in_error.remove(&id);
        self.paused.remove(&id);
        self.eligible.insert(id);
    }

    /// Drop the task from every set and release its children.
    ///
    /// Returns the children whose last parent just terminated; they are now eligible.
    pub fn terminate(&mut self, id: TaskId) -> Vec<TaskId> {
        self.running.remove(&id);
        self.eligible.remove(&id);
        self.paused.remove(&id);
        self.in_error.remove(&id);

        let mut ready = Vec::new();
        for child in self.children.get(&id).cloned().unwrap_or_default() {
            if let Some(count) = self.remaining_parents.get_mut(&child) {
                if *count == 0 {
                    continue;
                }
                *count -= 1;
                if *count == 0 {
                    self.eligible.insert(child);
                    ready.push(child);
                }
            }
        }
        ready
    }

    pub fn pause(&mut self, id: TaskId) {
        if self.eligible.remove(&id) {
            self.paused.insert(id);
        }
    }

    pub fn unpause(&mut self, id: TaskId) {
        if self.paused.remove(&id) {
            self.eligible.insert(id);
        }
    }

    pub fn park_in_error(&mut self, id: TaskId) {
        self.running.remove(&id);
        self.in_error.insert(id);
    }

    pub fn clear(&mut self) {
        self.eligible.clear();
        self.running.clear();
        self.paused.clear();
        self.in_error.clear();
    }

    pub fn eligible(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.eligible.iter().copied()
    }

    pub fn is_eligible(&self, id: TaskId) -> bool {
        self.eligible.contains(&id)
    }

    pub fn is_running(&self, id: TaskId) -> bool {
        self.running.contains(&id)
    }

    pub fn is_paused(&self, id: TaskId) -> bool {
        self.paused.contains(&id)
    }

    pub fn has_children(&self, id: TaskId) -> bool {
        self.children.get(&id).is_some_and(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JobId;

    fn t(index: u32) -> TaskId {
        TaskId::new(JobId::new(1), index)
    }

    // 0 -> 1, 0 -> 2, (1, 2) -> 3
    fn diamond() -> JobDescriptor {
        let root: [TaskId; 0] = [];
        let from_root = [t(0)];
        let join = [t(1), t(2)];
        JobDescriptor::new([
            (t(0), &root[..]),
            (t(1), &from_root[..]),
            (t(2), &from_root[..]),
            (t(3), &join[..]),
        ])
    }

    #[test]
    fn only_entry_points_start_eligible() {
        let d = diamond();
        assert_eq!(d.eligible().collect::<Vec<_>>(), vec![t(0)]);
        assert!(d.has_children(t(0)));
        assert!(!d.has_children(t(3)));
    }

    #[test]
    fn join_waits_for_every_parent() {
        let mut d = diamond();
        d.start(t(0));
        assert!(d.is_running(t(0)));
        assert_eq!(d.terminate(t(0)), vec![t(1), t(2)]);

        d.start(t(1));
        d.start(t(2));
        assert!(d.terminate(t(1)).is_empty());
        assert!(!d.is_eligible(t(3)));
        assert_eq!(d.terminate(t(2)), vec![t(3)]);
        assert!(d.is_eligible(t(3)));
    }

    #[test]
    fn restart_puts_task_back_in_eligible() {
        let mut d = diamond();
        d.start(t(0));
        d.restart(t(0));
        assert!(d.is_eligible(t(0)));
        assert!(!d.is_running(t(0)));

        d.start(t(0));
        d.park_in_error(t(0));
        assert!(!d.is_running(t(0)));
        d.restart(t(0));
        assert!(d.is_eligible(t(0)));
    }

    #[test]
    fn pause_only_moves_eligible_tasks() {
        let mut d = diamond();
        d.pause(t(0));
        d.pause(t(3));
        assert!(d.is_paused(t(0)));
        assert!(!d.is_paused(t(3)));
        assert_eq!(d.eligible().count(), 0);

        d.unpause(t(0));
        assert!(d.is_eligible(t(0)));
    }

    #[test]
    fn rebuild_from_statuses() {
        let root: [TaskId; 0] = [];
        let from_root = [t(0)];
        let join = [t(1), t(2)];
        let d = JobDescriptor::rebuild([
            (t(0), &root[..], TaskStatus::Finished),
            (t(1), &from_root[..], TaskStatus::Running),
            (t(2), &from_root[..], TaskStatus::Pending),
            (t(3), &join[..], TaskStatus::Pending),
        ]);
        assert!(d.is_running(t(1)));
        assert!(d.is_eligible(t(2)));
        assert!(!d.is_eligible(t(3)));
        assert!(!d.is_eligible(t(0)));
    }
}
