//! Interface de linha de comando baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, status,
//! estimate, cleanup, unlock) e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// traduza — motor assíncrono de jobs de tradução.
#[derive(Debug, Parser)]
#[command(name = "traduza", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho para o arquivo de configuração (padrão: traduza.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa um lote de jobs pendentes com conteúdo de demonstração.
    Run {
        /// Quantos jobs reivindicar neste lote (padrão: batch_size da config).
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Mostra contadores da fila, estado do lock e estatísticas de cache.
    Status,

    /// Estima o custo de tradução do backlog pendente.
    Estimate {
        /// Máximo de jobs a examinar.
        #[arg(long, default_value_t = 500)]
        max_jobs: usize,
    },

    /// Remove jobs terminais antigos, preservando um mínimo por campo.
    Cleanup {
        /// Idade mínima em dias para um job ser elegível.
        #[arg(long)]
        older_than_days: i64,

        /// Mínimo de jobs preservados por campo.
        #[arg(long, default_value_t = 5)]
        keep_min: usize,
    },

    /// Libera o lock de lote manualmente (intervenção administrativa).
    Unlock,
}
