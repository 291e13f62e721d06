mod ids;
mod policy;
mod status;

pub use ids::{IdCounter, JobId, TaskId};
pub use policy::{OnTaskError, RestartBackoff, RestartMode};
pub use status::{JobPriority, JobStatus, SchedulerStatus, TaskStatus};
