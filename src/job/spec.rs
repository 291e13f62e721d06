//! Job definitions as written by users, in TOML or JSON.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};
use crate::model::{JobPriority, OnTaskError, RestartMode};

/// What a task runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Executable {
    /// A process; a non-zero exit code is an error.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Simulated work that fails on its first `fail_attempts` executions.
    Sleep {
        #[serde(default)]
        duration_ms: u64,
        #[serde(default)]
        fail_attempts: u32,
    },
}

impl Default for Executable {
    fn default() -> Self {
        Executable::Sleep {
            duration_ms: 0,
            fail_attempts: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub executable: Executable,
    /// Falls back to the job's policy when unset.
    #[serde(default)]
    pub on_task_error: Option<OnTaskError>,
    #[serde(default)]
    pub restart_mode: RestartMode,
    #[serde(default)]
    pub max_number_of_execution: Option<u32>,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, executable: Executable) -> Self {
        Self {
            name: name.into(),
            description: None,
            depends_on: Vec::new(),
            executable,
            on_task_error: None,
            restart_mode: RestartMode::default(),
            max_number_of_execution: None,
        }
    }

    pub fn depends_on(mut self, parent: impl Into<String>) -> Self {
        self.depends_on.push(parent.into());
        self
    }

    pub fn on_error(mut self, policy: OnTaskError) -> Self {
        self.on_task_error = Some(policy);
        self
    }

    pub fn max_executions(mut self, max: u32) -> Self {
        self.max_number_of_execution = Some(max);
        self
    }

    pub fn restart_mode(mut self, mode: RestartMode) -> Self {
        self.restart_mode = mode;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: JobPriority,
    #[serde(default)]
    pub on_task_error: OnTaskError,
    /// Default execution budget for tasks that do not set their own.
    #[serde(default)]
    pub max_number_of_execution: Option<u32>,
    pub tasks: Vec<TaskSpec>,
}

impl JobSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            priority: JobPriority::default(),
            on_task_error: OnTaskError::default(),
            max_number_of_execution: None,
            tasks: Vec::new(),
        }
    }

    pub fn task(mut self, task: TaskSpec) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn on_error(mut self, policy: OnTaskError) -> Self {
        self.on_task_error = policy;
        self
    }

    /// Load a job definition from a `.toml` or `.json` file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let spec = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str::<JobSpec>(&contents)?,
            Some("json") => serde_json::from_str::<JobSpec>(&contents)?,
            _ => {
                return Err(SchedulerError::InvalidJob(format!(
                    "unsupported job file '{}', expected .toml or .json",
                    path.display()
                )));
            }
        };
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SchedulerError::InvalidJob("job name must not be empty".into()));
        }
        if self.tasks.is_empty() {
            return Err(SchedulerError::InvalidJob(format!(
                "job '{}' has no task",
                self.name
            )));
        }
        if self.max_number_of_execution == Some(0) {
            return Err(SchedulerError::InvalidJob(
                "max_number_of_execution must be at least 1".into(),
            ));
        }

        let mut names = HashSet::new();
        for task in &self.tasks {
            if task.name.trim().is_empty() {
                return Err(SchedulerError::InvalidJob("task name must not be empty".into()));
            }
            if !names.insert(task.name.as_str()) {
                return Err(SchedulerError::InvalidJob(format!(
                    "duplicate task name '{}'",
                    task.name
                )));
            }
            if task.max_number_of_execution == Some(0) {
                return Err(SchedulerError::InvalidJob(format!(
                    "task '{}': max_number_of_execution must be at least 1",
                    task.name
                )));
            }
        }

        for task in &self.tasks {
            for parent in &task.depends_on {
                if parent == &task.name {
                    return Err(SchedulerError::InvalidJob(format!(
                        "task '{}' depends on itself",
                        task.name
                    )));
                }
                if !names.contains(parent.as_str()) {
                    return Err(SchedulerError::InvalidJob(format!(
                        "task '{}' depends on unknown task '{parent}'",
                        task.name
                    )));
                }
            }
        }

        self.topological_order().map(|_| ())
    }

    /// Task names in dependency order; ties keep declaration order.
    pub fn topological_order(&self) -> Result<Vec<&str>> {
        let mut remaining: HashMap<&str, usize> = self
            .tasks
            .iter()
            .map(|t| (t.name.as_str(), t.depends_on.len()))
            .collect();
        let mut placed: Vec<&str> = Vec::with_capacity(self.tasks.len());

        while placed.len() < self.tasks.len() {
            let next = self
                .tasks
                .iter()
                .map(|t| t.name.as_str())
                .find(|name| remaining.get(name) == Some(&0));

            let Some(name) = next else {
                let mut stuck: Vec<&str> = remaining.keys().copied().collect();
                stuck.sort_unstable();
                return Err(SchedulerError::InvalidJob(format!(
                    "dependency cycle between tasks: {}",
                    stuck.join(", ")
                )));
            };

            remaining.remove(name);
            placed.push(name);
            for task in &self.tasks {
                let edges = task.depends_on.iter().filter(|p| p.as_str() == name).count();
                if edges > 0
                    && let Some(count) = remaining.get_mut(task.name.as_str())
                {
                    *count -= edges;
                }
            }
        }

        Ok(placed)
    }
}
