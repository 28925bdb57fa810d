mod config;
mod models;
mod orchestrator;
mod output;
mod scrapers;

use anyhow::Context;
use clap::Parser;
use config::Cli;
use orchestrator::{Orchestrator, RunOutcome};
use scrapers::ChromeSession;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("🏠 Rental Scout");
    info!("==========================================");

    let config = cli.into_config()?;
    info!(
        units = config.units.len(),
        pagination = ?config.pagination,
        dedup = ?config.dedup_scope,
        max_pages = ?config.max_pages,
        "Starting crawl"
    );

    // Ctrl-C stops new page requests; whatever was collected is still saved
    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing up...");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let browser_options = config.browser.clone();
    let orchestrator = Orchestrator::new(config, interrupt)?;

    // The browser is driven with blocking calls, so the crawl gets its own thread
    let summary = tokio::task::spawn_blocking(move || {
        let mut session = ChromeSession::launch(&browser_options)?;
        orchestrator.run(&mut session)
    })
    .await
    .context("Crawl thread panicked")??;

    // Display results
    println!();
    for report in &summary.units {
        println!(
            "{:<28} pages={:<3} cards={:<4} new={:<4} stop: {}",
            report.unit.to_string(),
            report.pages,
            report.cards_seen,
            report.admitted,
            report.stop
        );
    }
    println!();

    if summary.restored > 0 {
        info!("Resumed {} listings from a previous run", summary.restored);
    }
    match summary.outcome {
        RunOutcome::Completed => info!("✅ Collected {} listings", summary.entries.len()),
        RunOutcome::Interrupted => warn!(
            "⚠ Interrupted after {} listings; partial results saved",
            summary.entries.len()
        ),
    }

    Ok(())
}
