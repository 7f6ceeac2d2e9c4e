//! Interface de terminal — spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner de progresso e `console` para
//! estilização com cores. O [`BatchProgress`] acompanha visualmente a
//! execução de um lote no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::processor::BatchSummary;

/// Indicador visual de progresso para a execução de um lote no terminal.
pub struct BatchProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para contadores de sucesso.
    green: Style,
    // Estilo vermelho para contadores de erro.
    red: Style,
    // Estilo amarelo para contadores de jobs pulados.
    yellow: Style,
}

impl BatchProgress {
    /// Inicia o spinner e retorna a instância de progresso.
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner e exibe o resumo do lote.
    pub fn complete(&self, summary: &BatchSummary) {
        self.pb.finish_and_clear();
        if summary.claimed == 0 {
            println!(
                "  {} Nenhum job reivindicado (fila vazia ou lock ativo)",
                self.yellow.apply_to("•")
            );
            return;
        }
        println!(
            "  {} {} processados, {} pulados, {} com erro (de {} reivindicados)",
            if summary.errors == 0 {
                self.green.apply_to("✓")
            } else {
                self.red.apply_to("✗")
            },
            self.green.apply_to(summary.processed),
            self.yellow.apply_to(summary.skipped),
            self.red.apply_to(summary.errors),
            summary.claimed,
        );
    }

    /// Imprime o resumo formatado em JSON.
    pub fn print_json(&self, summary: &BatchSummary) {
        println!(
            "{}",
            serde_json::to_string_pretty(summary).unwrap_or_default()
        );
    }
}
