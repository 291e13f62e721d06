//! taskgrid: a job scheduler with task dependencies, execution budgets,
//! restart backoff and a local node pool.
//!
//! [`scheduler::Scheduler`] owns the live jobs; [`executor::LocalExecutor`]
//! runs their tasks and feeds results back.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod job;
pub mod model;
pub mod scheduler;
pub mod store;
pub mod ui;
pub mod util;
