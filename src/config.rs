//! Configuração do taskgrid carregada a partir de `taskgrid.toml`.
//!
//! A struct [`SchedulerConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `TASKGRID_SCHEDULER_URL` tem precedência sobre o arquivo.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::SchedulerError;
use crate::job::JobDefaults;
use crate::model::RestartBackoff;
use crate::util::uri;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "taskgrid.toml";

/// Variável de ambiente que sobrescreve `scheduler_url`.
pub const SCHEDULER_URL_ENV: &str = "TASKGRID_SCHEDULER_URL";

/// Configuração de nível superior carregada de `taskgrid.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// URL do escalonador; também dá nome aos nós locais.
    #[serde(default = "default_scheduler_url")]
    pub scheduler_url: String,

    /// Espera inicial antes de reexecutar uma tarefa com erro.
    #[serde(default = "default_initial_waiting_time_ms")]
    pub reexecution_initial_waiting_time_ms: u64,

    /// Incremento da espera a cada reexecução.
    #[serde(default = "default_step_ms")]
    pub reexecution_step_ms: u64,

    /// Espera máxima entre reexecuções.
    #[serde(default = "default_max_waiting_time_ms")]
    pub reexecution_max_waiting_time_ms: u64,

    /// Número de execuções de uma tarefa quando o job não define.
    #[serde(default = "default_max_number_of_execution")]
    pub default_max_number_of_execution: u32,

    /// Falhas de nó toleradas por tarefa antes de o job falhar.
    #[serde(default = "default_number_of_execution_on_failure")]
    pub number_of_execution_on_failure: u32,

    /// Quantidade de nós locais.
    #[serde(default = "default_nodes")]
    pub nodes: usize,

    /// Quantidade de eventos mantidos no log circular.
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,

    /// Intervalo entre ciclos de escalonamento.
    #[serde(default = "default_schedule_interval_ms")]
    pub schedule_interval_ms: u64,

    /// Diretório onde o estado dos jobs é persistido. Sem persistência se ausente.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

// Valor padrão para a URL: "pnp://localhost:64738/".
fn default_scheduler_url() -> String {
    "pnp://localhost:64738/".to_string()
}

// Valor padrão para a espera inicial: 1000ms.
fn default_initial_waiting_time_ms() -> u64 {
    1000
}

// Valor padrão para o incremento: 1000ms.
fn default_step_ms() -> u64 {
    1000
}

// Valor padrão para a espera máxima: 60000ms.
fn default_max_waiting_time_ms() -> u64 {
    60_000
}

fn default_max_number_of_execution() -> u32 {
    1
}

fn default_number_of_execution_on_failure() -> u32 {
    2
}

fn default_nodes() -> usize {
    4
}

fn default_event_log_capacity() -> usize {
    256
}

fn default_schedule_interval_ms() -> u64 {
    100
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduler_url: default_scheduler_url(),
            reexecution_initial_waiting_time_ms: default_initial_waiting_time_ms(),
            reexecution_step_ms: default_step_ms(),
            reexecution_max_waiting_time_ms: default_max_waiting_time_ms(),
            default_max_number_of_execution: default_max_number_of_execution(),
            number_of_execution_on_failure: default_number_of_execution_on_failure(),
            nodes: default_nodes(),
            event_log_capacity: default_event_log_capacity(),
            schedule_interval_ms: default_schedule_interval_ms(),
            state_dir: None,
        }
    }
}

impl SchedulerConfig {
    /// Carrega a configuração de `taskgrid.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<SchedulerConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração para a URL.
        if let Ok(url) = std::env::var(SCHEDULER_URL_ENV)
            && !url.is_empty()
        {
            config.scheduler_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Verifica a URL e os limites numéricos, normalizando `scheduler_url`.
    pub fn validate(&mut self) -> crate::error::Result<()> {
        let url = self.url()?;
        self.scheduler_url = url.to_string();

        if self.nodes == 0 {
            return Err(SchedulerError::Config("nodes must be at least 1".into()));
        }
        if self.default_max_number_of_execution == 0 {
            return Err(SchedulerError::Config(
                "default_max_number_of_execution must be at least 1".into(),
            ));
        }
        if self.reexecution_max_waiting_time_ms < self.reexecution_initial_waiting_time_ms {
            return Err(SchedulerError::Config(
                "reexecution_max_waiting_time_ms is lower than the initial waiting time".into(),
            ));
        }
        Ok(())
    }

    /// URL do escalonador já normalizada.
    pub fn url(&self) -> crate::error::Result<Url> {
        uri::normalize(&self.scheduler_url, uri::DEFAULT_PROTOCOL)
    }

    pub fn backoff(&self) -> RestartBackoff {
        RestartBackoff {
            initial_ms: self.reexecution_initial_waiting_time_ms,
            step_ms: self.reexecution_step_ms,
            max_ms: self.reexecution_max_waiting_time_ms,
        }
    }

    /// Defaults aplicados aos jobs submetidos.
    pub fn job_defaults(&self) -> JobDefaults {
        JobDefaults {
            max_number_of_execution: self.default_max_number_of_execution,
            number_of_execution_on_failure: self.number_of_execution_on_failure,
            backoff: self.backoff(),
        }
    }
}
