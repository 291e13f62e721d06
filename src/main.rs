use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use taskgrid::cli::{Cli, Command};
use taskgrid::config::SchedulerConfig;
use taskgrid::executor::LocalExecutor;
use taskgrid::job::{Executable, JobSpec, JobSummary, TaskSpec};
use taskgrid::model::RestartMode;
use taskgrid::scheduler::{EventLog, Listeners, NodePool, Scheduler};
use taskgrid::store::JobStore;
use taskgrid::ui::{self, RunProgress};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => SchedulerConfig::load_from(path)?,
        None => SchedulerConfig::load()?,
    };
    if let Some(nodes) = cli.nodes {
        config.nodes = nodes;
    }
    if let Some(dir) = &cli.state_dir {
        config.state_dir = Some(dir.clone());
    }
    config.validate().context("invalid configuration")?;

    match &cli.command {
        Command::Run { files, json } => {
            let mut specs = Vec::with_capacity(files.len());
            for file in files {
                let spec = JobSpec::from_path(file)
                    .with_context(|| format!("failed to load job file {}", file.display()))?;
                specs.push(spec);
            }
            let summaries = run_jobs(config, &cli.owner, &specs).await?;
            for summary in &summaries {
                if *json {
                    ui::print_summary_json(summary);
                } else {
                    ui::print_summary(summary);
                }
            }
        }
        Command::Validate { file } => validate(file)?,
        Command::Status => status(&config)?,
        Command::Demo => {
            let summaries = run_jobs(config, &cli.owner, &[demo_job()]).await?;
            for summary in &summaries {
                ui::print_summary(summary);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "taskgrid=debug" } else { "taskgrid=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Recover persisted jobs, submit `specs` and run everything to completion.
async fn run_jobs(config: SchedulerConfig, owner: &str, specs: &[JobSpec]) -> Result<Vec<JobSummary>> {
    let progress = Arc::new(RunProgress::start("starting scheduler"));
    let events = Arc::new(EventLog::new(config.event_log_capacity));
    let listeners = Listeners::new().with(progress.clone()).with(events.clone());

    let store = config
        .state_dir
        .as_deref()
        .map(JobStore::open)
        .transpose()
        .context("failed to open state directory")?;

    let scheduler = Arc::new(Scheduler::new(config, Arc::new(listeners))?);
    if let Some(store) = &store {
        let jobs = store.load_all()?;
        if !jobs.is_empty() {
            info!(count = jobs.len(), dir = %store.dir().display(), "recovering jobs");
            scheduler.recover(jobs).await;
        }
    }

    for spec in specs {
        let id = scheduler
            .submit(owner, spec)
            .await
            .with_context(|| format!("failed to submit job '{}'", spec.name))?;
        if let Some(store) = &store {
            store.save(&scheduler.job_state(id).await?)?;
        }
    }

    let pool = NodePool::local(scheduler.url(), scheduler.config().nodes)?;
    let mut executor = LocalExecutor::new(Arc::clone(&scheduler), pool);
    if let Some(store) = store {
        executor = executor.with_store(store);
    }
    let summaries = executor.run_until_idle().await;
    progress.finish();
    info!(events = events.len(), "run finished");
    Ok(summaries?)
}

fn validate(file: &Path) -> Result<()> {
    let spec = JobSpec::from_path(file)
        .with_context(|| format!("failed to load job file {}", file.display()))?;
    spec.validate()?;
    println!("job '{}' is valid, {} task(s):", spec.name, spec.tasks.len());
    for (i, name) in spec.topological_order()?.into_iter().enumerate() {
        println!("  {:>2}. {name}", i + 1);
    }
    Ok(())
}

fn status(config: &SchedulerConfig) -> Result<()> {
    let Some(dir) = &config.state_dir else {
        bail!("no state directory configured, use --state-dir or state_dir in taskgrid.toml");
    };
    let store = JobStore::open(dir.as_path())?;
    let jobs = store.load_all()?;
    if jobs.is_empty() {
        println!("no job in {}", dir.display());
    }
    for job in &jobs {
        ui::print_summary(&JobSummary::from_job(job));
    }
    Ok(())
}

// Fetch fails twice before succeeding; publish needs the other two.
fn demo_job() -> JobSpec {
    let work = |duration_ms, fail_attempts| Executable::Sleep {
        duration_ms,
        fail_attempts,
    };
    JobSpec::new("demo")
        .task(TaskSpec::new("fetch", work(300, 2)).max_executions(3))
        .task(
            TaskSpec::new("build", work(500, 0))
                .depends_on("fetch")
                .restart_mode(RestartMode::Elsewhere),
        )
        .task(TaskSpec::new("lint", work(200, 0)))
        .task(
            TaskSpec::new("publish", work(200, 0))
                .depends_on("build")
                .depends_on("lint"),
        )
}
