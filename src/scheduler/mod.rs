pub mod events;
mod live_jobs;
mod nodes;
mod service;
mod termination;

pub use events::{EventLog, EventRecord, Listeners, NoopListener, SchedulerEvent, SchedulerListener};
pub use live_jobs::{LiveJobs, TaskResult};
pub use nodes::{Node, NodePool};
pub use service::{Scheduler, TaskLaunch};
pub use termination::{TaskRestart, TaskTermination, TerminationData, TerminationStatus};
