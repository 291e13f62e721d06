//! Interface de terminal do taskgrid: spinner e saída colorida.
//!
//! Usa `indicatif` para o spinner de progresso e `console` para as cores.
//! O [`RunProgress`] escuta os eventos do scheduler e mostra no terminal
//! o andamento dos jobs.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::job::{JobInfo, JobSummary, TaskInfo};
use crate::model::{JobStatus, TaskStatus};
use crate::scheduler::{SchedulerEvent, SchedulerListener};

/// Indicador visual de progresso para uma execução do scheduler.
///
/// Mostra um spinner com o último evento e imprime linhas coloridas para
/// tarefas concluídas (verde), com falha (vermelho) e reagendadas (amarelo).
pub struct RunProgress {
    // Spinner do indicatif.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl RunProgress {
    /// Inicia o spinner com uma mensagem inicial.
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Para o spinner e limpa a linha.
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl SchedulerListener for RunProgress {
    fn scheduler_state_updated(&self, event: SchedulerEvent) {
        self.pb.set_message(format!("scheduler {event}"));
    }

    fn job_state_updated(&self, owner: &str, event: SchedulerEvent, job: &JobInfo) {
        self.pb.set_message(format!(
            "job {} ({owner}): {}/{} tasks finished",
            job.id, job.finished_tasks, job.total_tasks
        ));
        match event {
            SchedulerEvent::JobInError => self.pb.println(format!(
                "  {} job {} has tasks in error",
                self.red.apply_to("!"),
                job.id
            )),
            SchedulerEvent::JobPaused => {
                self.pb
                    .println(format!("  {} job {} paused", self.yellow.apply_to("‖"), job.id));
            }
            _ => {}
        }
    }

    fn task_state_updated(&self, _owner: &str, event: SchedulerEvent, task: &TaskInfo) {
        match event {
            SchedulerEvent::TaskPendingToRunning => {
                let host = task.execution_host.as_deref().unwrap_or("?");
                self.pb.set_message(format!("{} running on {host}", task.name));
            }
            SchedulerEvent::TaskWaitingForRestart => self.pb.println(format!(
                "  {} {} will be restarted",
                self.yellow.apply_to("↻"),
                task.name
            )),
            SchedulerEvent::TaskRunningToFinished | SchedulerEvent::TaskInErrorToFinished => {
                let line = match task.status {
                    TaskStatus::Finished => format!("  {} {}", self.green.apply_to("✓"), task.name),
                    status => format!("  {} {} ({status})", self.red.apply_to("✗"), task.name),
                };
                self.pb.println(line);
            }
            _ => {}
        }
    }
}

/// Imprime o resumo de um job, com o status colorido.
pub fn print_summary(summary: &JobSummary) {
    let style = match summary.status {
        JobStatus::Finished if summary.faulty_tasks == 0 => Style::new().green().bold(),
        JobStatus::Finished => Style::new().yellow().bold(),
        _ => Style::new().red().bold(),
    };
    let duration = summary
        .duration_ms
        .map(|ms| format!(" in {ms}ms"))
        .unwrap_or_default();
    println!(
        "{} job {} '{}': {}/{} tasks finished, {} faulty{duration}",
        style.apply_to(summary.status.to_string()),
        summary.job_id,
        summary.name,
        summary.finished_tasks,
        summary.total_tasks,
        summary.faulty_tasks,
    );
    for task in &summary.tasks {
        let host = task.execution_host.as_deref().unwrap_or("-");
        println!(
            "    {:<20} {:<12} executions={} host={host}",
            task.name,
            task.status.to_string(),
            task.executions
        );
    }
}

/// Imprime o resumo em JSON formatado.
pub fn print_summary_json(summary: &JobSummary) {
    println!(
        "{}",
        serde_json::to_string_pretty(summary).unwrap_or_default()
    );
}
