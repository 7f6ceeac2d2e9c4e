use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use traduza::cli::{Cli, Command};
use traduza::config::EngineConfig;
use traduza::content::MemoryContent;
use traduza::engine::TranslationEngine;
use traduza::queue::{JobState, ObjectType};
use traduza::ui::BatchProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let config = EngineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run { batch_size } => {
            let batch_size = batch_size.unwrap_or(config.batch_size);
            let engine = TranslationEngine::from_config(config, Box::new(demo_content()))?;
            seed_demo_jobs(&engine)?;

            let progress = BatchProgress::start("Executando lote de tradução...");
            let summary = engine.run_batch(batch_size).await?;
            progress.complete(&summary);
            progress.print_json(&summary);
        }
        Command::Status => {
            let engine = TranslationEngine::from_config(config, Box::new(MemoryContent::new()))?;
            let counts = engine.queue_counts();
            println!("Fila:");
            for state in JobState::ALL {
                println!("  {state:<12} {}", counts[&state]);
            }
            println!("Lock ativo: {}", engine.is_locked());
            let slug = engine.config().provider.clone();
            let rate = engine.rate_limit_status(&slug);
            println!(
                "Rate limit ({slug}): {}/{} na janela, reinicia em {}s",
                rate.count,
                engine.config().rate_limit_per_window,
                rate.reset_in.as_secs()
            );
            let cache = engine.cache_stats();
            println!(
                "Cache: {} acertos, {} falhas ({:.0}%)",
                cache.hits,
                cache.misses,
                cache.hit_rate * 100.0
            );
        }
        Command::Estimate { max_jobs } => {
            let engine = TranslationEngine::from_config(config, Box::new(demo_content()))?;
            seed_demo_jobs(&engine)?;
            let estimate = engine.estimate_queue_cost(None, max_jobs)?;
            println!("{}", serde_json::to_string_pretty(&estimate)?);
        }
        Command::Cleanup {
            older_than_days,
            keep_min,
        } => {
            let engine = TranslationEngine::from_config(config, Box::new(MemoryContent::new()))?;
            let deleted = engine.cleanup(
                &[JobState::Done, JobState::Skipped, JobState::Error],
                older_than_days,
                keep_min,
            )?;
            println!("{deleted} jobs removidos");
        }
        Command::Unlock => {
            let engine = TranslationEngine::from_config(config, Box::new(MemoryContent::new()))?;
            engine.release_lock();
            println!("Lock liberado");
        }
    }

    Ok(())
}

/// Conteúdo de demonstração usado pelos comandos `run` e `estimate`.
fn demo_content() -> MemoryContent {
    let content = MemoryContent::new();
    content.insert(
        traduza::queue::ContentKey::new(ObjectType::ContentItem, "1", "title"),
        "Getting started with the platform",
    );
    content.insert(
        traduza::queue::ContentKey::new(ObjectType::ContentItem, "1", "body"),
        "This guide walks you through the first steps. Install the tools, \
         create a project and publish your first page.",
    );
    content.insert(
        traduza::queue::ContentKey::new(ObjectType::TaxonomyTerm, "7", "name"),
        "Tutorials",
    );
    content
}

/// Enfileira os campos de demonstração (idempotente entre execuções).
fn seed_demo_jobs(engine: &TranslationEngine) -> Result<()> {
    engine.enqueue(ObjectType::ContentItem, "1", "title", "demo-title-v1")?;
    engine.enqueue(ObjectType::ContentItem, "1", "body", "demo-body-v1")?;
    engine.enqueue(ObjectType::TaxonomyTerm, "7", "name", "demo-term-v1")?;
    Ok(())
}
