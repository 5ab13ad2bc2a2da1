//! Command-line interface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Mutex};
use tracing::info;

use crate::backoff::{FailureRegistry, Pacing};
use crate::browser::ChromiumSessionProvider;
use crate::config::{SearchSettings, Settings};
use crate::dataset;
use crate::extract::SourceExtractor;
use crate::models::{AttemptOutcome, SearchAttempt, StrategyKind};
use crate::orchestrator::{
    BatchOrchestrator, OrchestratorConfig, ProgressWriter, ResultsStore, RunEvent,
};
use crate::pipeline::ResolvePipeline;
use crate::search::{
    DirectUrl, GoogleSearch, LinkScorer, ResolveStrategy, SeznamSearch, StrategySelector,
};

#[derive(Parser)]
#[command(
    name = "scout",
    about = "Resolve published media credits for video dataset rows",
    version
)]
struct Cli {
    /// Increase log verbosity.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve credits for every row of the input table.
    Resolve {
        /// Input dataset (semicolon-separated CSV).
        #[arg(long, env = "SCOUT_INPUT")]
        input: PathBuf,

        /// Output results table.
        #[arg(long, env = "SCOUT_OUTPUT")]
        output: PathBuf,

        /// Settings file (TOML). Defaults apply when omitted.
        #[arg(long, env = "SCOUT_CONFIG")]
        config: Option<PathBuf>,

        /// Only process the first N qualifying rows.
        #[arg(long)]
        limit: Option<usize>,

        /// Override the configured batch size.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override the configured concurrency limit.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Run the browser with a visible window.
        #[arg(long)]
        headed: bool,
    },
}

/// Peek at argv before clap runs so logging can be set up first.
pub fn is_verbose() -> bool {
    std::env::args().any(|a| a == "-v" || a == "--verbose")
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Resolve {
            input,
            output,
            config,
            limit,
            batch_size,
            concurrency,
            headed,
        } => {
            let mut settings = Settings::load(config.as_deref())?;
            if let Some(batch_size) = batch_size {
                settings.run.batch_size = batch_size;
            }
            if let Some(concurrency) = concurrency {
                settings.run.concurrency = concurrency;
            }
            if headed {
                settings.browser.headless = false;
            }
            resolve(settings, input, output, limit).await
        }
    }
}

async fn resolve(
    settings: Settings,
    input: PathBuf,
    output: PathBuf,
    limit: Option<usize>,
) -> Result<()> {
    let mut items = dataset::load_work_items(&input, settings.run.view_count_threshold)?;
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    if items.is_empty() {
        anyhow::bail!("no work items above the view-count threshold");
    }
    info!(items = items.len(), "starting resolution run");

    let registry = Arc::new(Mutex::new(FailureRegistry::new(
        settings.search.disable_threshold,
    )));
    let pacing = Pacing {
        pre_navigation_ms: settings.pacing.pre_navigation_ms,
        bot_cooldown: Duration::from_secs(settings.pacing.bot_cooldown_secs),
    };
    let selector = StrategySelector::new(
        build_strategies(&settings.search, settings.pacing.pre_navigation_ms),
        registry,
        pacing,
    );
    let extractor = SourceExtractor::new(
        settings.search.extraction_attempts,
        settings.pacing.pre_navigation_ms,
    );
    let resolver = Arc::new(ResolvePipeline::new(selector, extractor));
    let provider = Arc::new(ChromiumSessionProvider::new(settings.browser.clone()));

    let results = ResultsStore::new(output.clone(), settings.search.not_found_label.clone());
    let progress = ProgressWriter::new(settings.run.progress_file.clone());

    let orchestrator_config = OrchestratorConfig {
        batch_size: settings.run.batch_size,
        concurrency: settings.run.concurrency,
        batch_timeout: Duration::from_secs(settings.run.batch_timeout_secs),
        flush_every: settings.run.flush_every,
        item_pause_ms: settings.pacing.item_pause_ms,
        batch_pause_ms: settings.pacing.batch_pause_ms,
    };

    let (events_tx, events_rx) = mpsc::channel(64);
    let display = tokio::spawn(drive_progress_bar(events_rx, items.len() as u64));

    let mut orchestrator =
        BatchOrchestrator::new(orchestrator_config, provider, resolver, results, progress)
            .with_events(events_tx);
    orchestrator.run(items).await?;
    let _ = display.await;

    let attempts = orchestrator.attempts().await;
    print_summary(orchestrator.results(), &attempts, &output);
    Ok(())
}

fn build_strategies(
    search: &SearchSettings,
    pre_navigation_ms: (u64, u64),
) -> Vec<Box<dyn ResolveStrategy>> {
    search
        .strategies
        .iter()
        .map(|kind| match kind {
            StrategyKind::SeznamSearch => Box::new(SeznamSearch::new(
                LinkScorer::new(search.target_host.clone(), search.seznam_threshold),
                search.site_filter.clone(),
            )) as Box<dyn ResolveStrategy>,
            StrategyKind::DirectUrl => Box::new(DirectUrl::new(
                search.base_url.clone(),
                search.google_threshold,
                pre_navigation_ms,
            )),
            StrategyKind::GoogleSearch => Box::new(GoogleSearch::new(
                LinkScorer::new(search.target_host.clone(), search.google_threshold),
                search.site_filter.clone(),
            )),
        })
        .collect()
}

async fn drive_progress_bar(mut events: mpsc::Receiver<RunEvent>, total: u64) {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg:>9} [{bar:30.cyan/blue}] {pos}/{len}")
            .unwrap()
            .progress_chars("█▓░"),
    );
    bar.set_message("resolving");

    while let Some(event) = events.recv().await {
        match event {
            RunEvent::ItemCompleted { .. } => bar.inc(1),
            RunEvent::RetryPassStarted { items } => {
                bar.set_position(0);
                bar.set_length(items as u64);
                bar.set_message("retrying");
            }
            RunEvent::Completed { .. } => break,
            _ => {}
        }
    }
    bar.finish_and_clear();
}

fn print_summary(results: &ResultsStore, attempts: &[SearchAttempt], output: &std::path::Path) {
    let total = results.len();
    let succeeded = results.success_count();
    let failed = total - succeeded;

    println!(
        "{} {} resolved, {} unresolved (of {})",
        console::style("done:").green().bold(),
        console::style(succeeded).green(),
        console::style(failed).red(),
        total
    );
    for kind in [
        StrategyKind::SeznamSearch,
        StrategyKind::DirectUrl,
        StrategyKind::GoogleSearch,
    ] {
        let tried = attempts.iter().filter(|a| a.strategy == kind).count();
        if tried == 0 {
            continue;
        }
        let resolved = attempts
            .iter()
            .filter(|a| a.strategy == kind && matches!(a.outcome, AttemptOutcome::Resolved(_)))
            .count();
        println!(
            "  {}: {} of {} attempts found a link",
            kind,
            console::style(resolved).green(),
            tried
        );
    }
    println!("results written to {}", output.display());
}
