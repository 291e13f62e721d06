pub mod descriptor;
pub mod spec;
pub mod state;

pub use descriptor::JobDescriptor;
pub use spec::{Executable, JobSpec, TaskSpec};
pub use state::{Job, JobDefaults, JobInfo, JobSummary, Task, TaskInfo, TaskSummary};
