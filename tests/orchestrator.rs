//! Orchestrator integration tests with scripted resolvers and session pools.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use common::{FakeProvider, PageMap};
use sourcescout::browser::PageDriver;
use sourcescout::models::{
    AttemptOutcome, BatchState, ExtractionResult, ResolutionStatus, RunPhase, SearchAttempt,
    StrategyKind, WorkItem,
};
use sourcescout::orchestrator::{
    BatchOrchestrator, ItemOutcome, ItemResolver, OrchestratorConfig, ProgressWriter,
    ResultsStore, RunEvent,
};

fn items(titles: &[&str]) -> Vec<WorkItem> {
    titles
        .iter()
        .enumerate()
        .map(|(id, title)| WorkItem {
            id,
            category: "Krimi".to_string(),
            title: title.to_string(),
            view_count: 2000,
            completion: [0.8, 0.6, 0.4, 0.2],
        })
        .collect()
}

fn quick_config() -> OrchestratorConfig {
    OrchestratorConfig {
        batch_size: 2,
        concurrency: 2,
        batch_timeout: Duration::from_secs(600),
        flush_every: 10,
        item_pause_ms: (0, 0),
        batch_pause_ms: (0, 0),
    }
}

fn success(item: &WorkItem) -> ExtractionResult {
    ExtractionResult {
        item: item.clone(),
        source_text: Some("ČTK".to_string()),
        resolved_url: Some("https://www.novinky.cz/clanek/krimi-x".to_string()),
        strategy_used: Some(StrategyKind::SeznamSearch),
        status: ResolutionStatus::Success,
    }
}

/// Fails each item the first time its key is seen, succeeds afterwards.
struct FlakyResolver {
    calls: Mutex<HashMap<String, usize>>,
}

impl FlakyResolver {
    fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ItemResolver for FlakyResolver {
    async fn resolve(&self, _driver: &dyn PageDriver, item: &WorkItem) -> ItemOutcome {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let counter = calls.entry(item.title.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        let (result, outcome) = if attempt == 1 {
            (
                ExtractionResult::failed(item.clone(), ResolutionStatus::LinkNotFound),
                AttemptOutcome::NoMatch,
            )
        } else {
            (
                success(item),
                AttemptOutcome::Resolved("https://www.novinky.cz/clanek/krimi-x".to_string()),
            )
        };
        ItemOutcome {
            result,
            attempts: vec![SearchAttempt::new(
                item.id,
                StrategyKind::SeznamSearch,
                format!("{} site:novinky.cz", item.title),
                outcome,
            )],
        }
    }
}

/// Hangs on one title, succeeds instantly on the rest.
struct HangingResolver {
    hang_title: String,
}

#[async_trait]
impl ItemResolver for HangingResolver {
    async fn resolve(&self, _driver: &dyn PageDriver, item: &WorkItem) -> ItemOutcome {
        if item.title == self.hang_title {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        ItemOutcome {
            result: success(item),
            attempts: Vec::new(),
        }
    }
}

fn orchestrator(
    config: OrchestratorConfig,
    resolver: Arc<dyn ItemResolver>,
    dir: &tempfile::TempDir,
) -> BatchOrchestrator {
    let provider = Arc::new(FakeProvider::new(PageMap::new()));
    let results = ResultsStore::new(dir.path().join("out.csv"), "Zdroj nenalezen");
    let progress = ProgressWriter::new(dir.path().join("progress.json"));
    BatchOrchestrator::new(config, provider, resolver, results, progress)
}

#[tokio::test(start_paused = true)]
async fn every_item_gets_exactly_one_result_including_retry() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = orchestrator(quick_config(), Arc::new(FlakyResolver::new()), &dir);

    let work = items(&["A", "B", "C", "D", "E"]);
    orchestrator.run(work).await.unwrap();

    let results = orchestrator.results();
    assert_eq!(results.len(), 5);
    // Everything failed on the first pass and succeeded on the retry pass.
    assert_eq!(results.success_count(), 5);

    let mut titles: Vec<_> = results
        .records()
        .iter()
        .map(|r| r.item.title.clone())
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["A", "B", "C", "D", "E"]);
}

#[tokio::test(start_paused = true)]
async fn retry_success_replaces_the_failure_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = orchestrator(quick_config(), Arc::new(FlakyResolver::new()), &dir);

    orchestrator.run(items(&["A", "B"])).await.unwrap();

    let records = orchestrator.results().records();
    assert_eq!(records.len(), 2);
    // Completion order from the first pass is preserved by the retry merge.
    assert!(records.iter().all(|r| r.status.is_success()));
    assert_eq!(records[0].source_text.as_deref(), Some("ČTK"));
}

#[tokio::test(start_paused = true)]
async fn deadline_expiry_records_timeout_for_unfinished_items() {
    let dir = tempfile::tempdir().unwrap();
    let config = OrchestratorConfig {
        batch_timeout: Duration::from_millis(200),
        ..quick_config()
    };
    let resolver = Arc::new(HangingResolver {
        hang_title: "H".to_string(),
    });
    let mut orchestrator = orchestrator(config, resolver, &dir);

    orchestrator.run(items(&["A", "H"])).await.unwrap();

    let results = orchestrator.results();
    assert_eq!(results.len(), 2);

    let by_title: HashMap<_, _> = results
        .records()
        .iter()
        .map(|r| (r.item.title.as_str(), r.status))
        .collect();
    assert_eq!(by_title["A"], ResolutionStatus::Success);
    // Hung on the first pass and again on the retry pass.
    assert_eq!(by_title["H"], ResolutionStatus::Timeout);
}

#[tokio::test(start_paused = true)]
async fn attempt_log_accumulates_across_both_passes() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = orchestrator(quick_config(), Arc::new(FlakyResolver::new()), &dir);

    orchestrator.run(items(&["A", "B"])).await.unwrap();

    // One attempt per resolve call: two initial failures, two retries.
    let attempts = orchestrator.attempts().await;
    assert_eq!(attempts.len(), 4);
    assert_eq!(
        attempts
            .iter()
            .filter(|a| matches!(a.outcome, AttemptOutcome::Resolved(_)))
            .count(),
        2
    );
    assert!(attempts
        .iter()
        .all(|a| a.strategy == StrategyKind::SeznamSearch));
}

#[tokio::test(start_paused = true)]
async fn retry_replacements_are_flushed_before_the_pass_ends() {
    let dir = tempfile::tempdir().unwrap();
    let config = OrchestratorConfig {
        batch_size: 3,
        concurrency: 1,
        flush_every: 2,
        ..quick_config()
    };
    let out_path = dir.path().join("out.csv");
    let (tx, mut rx) = tokio::sync::mpsc::channel(16);
    let mut orchestrator =
        orchestrator(config, Arc::new(FlakyResolver::new()), &dir).with_events(tx);

    let run = tokio::spawn(async move { orchestrator.run(items(&["A", "B", "C"])).await });

    // With a single lane the retry pass replaces A, then B, then C. The
    // second retry completion means the flush after A already ran.
    let mut in_retry_pass = false;
    let mut retry_completions = 0;
    while let Some(event) = rx.recv().await {
        match event {
            RunEvent::RetryPassStarted { .. } => in_retry_pass = true,
            RunEvent::ItemCompleted { .. } if in_retry_pass => {
                retry_completions += 1;
                if retry_completions == 2 {
                    let table = std::fs::read_to_string(&out_path).unwrap();
                    let row_a = table
                        .lines()
                        .find(|line| line.starts_with("Krimi;A;"))
                        .unwrap();
                    assert!(row_a.contains("ČTK"), "retry success not flushed: {row_a}");
                    break;
                }
            }
            _ => {}
        }
    }
    run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn results_table_and_progress_record_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = orchestrator(quick_config(), Arc::new(FlakyResolver::new()), &dir);

    orchestrator.run(items(&["A", "B", "C"])).await.unwrap();

    let table = std::fs::read_to_string(dir.path().join("out.csv")).unwrap();
    // Header plus one row per item.
    assert_eq!(table.lines().count(), 4);
    assert!(table.lines().next().unwrap().starts_with("category;title"));

    let progress: BatchState =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("progress.json")).unwrap())
            .unwrap();
    assert_eq!(progress.status, RunPhase::Completed);
    assert_eq!(progress.current, 3);
    assert_eq!(progress.percentage, 100.0);
}
