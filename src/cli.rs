//! Interface de linha de comando do taskgrid baseada em clap.
//!
//! Define a struct [`Cli`] com os subcomandos [`Command`] (run, validate,
//! status, demo) e as flags globais (--config, --owner, --nodes,
//! --state-dir, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// taskgrid: escalonador local de jobs com dependências entre tarefas.
#[derive(Debug, Parser)]
#[command(name = "taskgrid", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Arquivo de configuração (padrão: `taskgrid.toml` no diretório atual).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Dono dos jobs submetidos.
    #[arg(long, global = true, default_value = "local")]
    pub owner: String,

    /// Número de nós locais, sobrepondo a configuração.
    #[arg(long, global = true)]
    pub nodes: Option<usize>,

    /// Diretório de persistência do estado, sobrepondo a configuração.
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submete e executa os jobs dos arquivos fornecidos.
    Run {
        /// Arquivos de definição de job (TOML ou JSON).
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Imprime os resumos em JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Valida um arquivo de job e mostra as tarefas em ordem de dependência.
    Validate {
        /// Arquivo de definição de job.
        file: PathBuf,
    },

    /// Lista os jobs persistidos no diretório de estado.
    Status,

    /// Executa um job de demonstração com falhas e retentativas.
    Demo,
}
