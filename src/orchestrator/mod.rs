//! Batch orchestration.
//!
//! Partitions work items into batches, drives them through per-batch browser
//! session pools under a concurrency bound and a wall-clock deadline,
//! persists cumulative results and the progress record, and finishes with a
//! retry pass over everything that did not succeed.

pub mod progress;
pub mod results;

pub use progress::ProgressWriter;
pub use results::ResultsStore;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{info, warn};

use crate::backoff::jitter_ms;
use crate::browser::{PageDriver, SessionProvider};
use crate::models::{
    BatchState, ExtractionResult, ResolutionStatus, ResultKey, RunPhase, SearchAttempt, WorkItem,
};

/// Progress events emitted while a run executes.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Started { total: usize },
    BatchStarted { batch: usize, total_batches: usize, items: usize },
    ItemCompleted { title: String, status: ResolutionStatus },
    BatchCompleted { batch: usize, total_batches: usize },
    RetryPassStarted { items: usize },
    Completed { processed: usize, succeeded: usize },
}

/// Everything one pipeline run produces for one work item.
#[derive(Debug)]
pub struct ItemOutcome {
    pub result: ExtractionResult,
    pub attempts: Vec<SearchAttempt>,
}

/// Per-item resolution pipeline. Infallible by contract: unexpected driver
/// failures must come back as a result with `status = Error`.
#[async_trait]
pub trait ItemResolver: Send + Sync {
    async fn resolve(&self, driver: &dyn PageDriver, item: &WorkItem) -> ItemOutcome;
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub batch_size: usize,
    pub concurrency: usize,
    /// Wall-clock deadline per batch; items still in flight when it expires
    /// are recorded with `status = Timeout`.
    pub batch_timeout: Duration,
    /// Flush the results table after this many completed items.
    pub flush_every: usize,
    /// Randomized pause after each completed item, milliseconds.
    pub item_pause_ms: (u64, u64),
    /// Randomized pause between batches, milliseconds.
    pub batch_pause_ms: (u64, u64),
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: 30,
            concurrency: 2,
            batch_timeout: Duration::from_secs(1200),
            flush_every: 10,
            item_pause_ms: (2000, 4000),
            batch_pause_ms: (5000, 10000),
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Pass {
    Initial,
    Retry,
}

/// Drives a full run: batches, retry pass, persistence, events.
pub struct BatchOrchestrator {
    config: OrchestratorConfig,
    provider: Arc<dyn SessionProvider>,
    resolver: Arc<dyn ItemResolver>,
    results: ResultsStore,
    attempts: Mutex<Vec<SearchAttempt>>,
    progress: ProgressWriter,
    events: Option<mpsc::Sender<RunEvent>>,
    /// Outcomes recorded across both passes. Drives the periodic flush;
    /// the store size stalls while retry overwrites records in place.
    recorded: usize,
}

impl BatchOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        provider: Arc<dyn SessionProvider>,
        resolver: Arc<dyn ItemResolver>,
        results: ResultsStore,
        progress: ProgressWriter,
    ) -> Self {
        Self {
            config,
            provider,
            resolver,
            results,
            attempts: Mutex::new(Vec::new()),
            progress,
            events: None,
            recorded: 0,
        }
    }

    pub fn with_events(mut self, events: mpsc::Sender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn results(&self) -> &ResultsStore {
        &self.results
    }

    /// Attempt log accumulated so far.
    pub async fn attempts(&self) -> Vec<SearchAttempt> {
        self.attempts.lock().await.clone()
    }

    async fn emit(&self, event: RunEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event).await;
        }
    }

    /// Run every item to a terminal status, then retry the failures once
    /// with fresh sessions. Exactly one record per item survives.
    pub async fn run(&mut self, items: Vec<WorkItem>) -> anyhow::Result<()> {
        let total = items.len();
        self.emit(RunEvent::Started { total }).await;
        self.progress
            .write(&BatchState::new(0, total, RunPhase::Starting, "starting run"));

        let batch_size = self.config.batch_size.max(1);
        let total_batches = total.div_ceil(batch_size);

        for (batch_index, batch) in items.chunks(batch_size).enumerate() {
            info!(
                batch = batch_index + 1,
                total_batches,
                items = batch.len(),
                "processing batch"
            );
            self.emit(RunEvent::BatchStarted {
                batch: batch_index + 1,
                total_batches,
                items: batch.len(),
            })
            .await;

            self.run_batch(batch, total, Pass::Initial).await?;

            if let Err(e) = self.results.flush() {
                warn!(error = %e, "failed to flush results after batch");
            }
            self.progress.write(&BatchState::new(
                self.results.len(),
                total,
                RunPhase::Processing,
                format!("batch {}/{} complete", batch_index + 1, total_batches),
            ));
            self.emit(RunEvent::BatchCompleted {
                batch: batch_index + 1,
                total_batches,
            })
            .await;

            if batch_index + 1 < total_batches {
                tokio::time::sleep(jitter_ms(self.config.batch_pause_ms)).await;
            }
        }

        let retry_items = self.results.failed_items();
        if !retry_items.is_empty() {
            info!(items = retry_items.len(), "starting retry pass");
            self.emit(RunEvent::RetryPassStarted {
                items: retry_items.len(),
            })
            .await;
            for batch in retry_items.chunks(batch_size) {
                self.run_batch(batch, total, Pass::Retry).await?;
                if let Err(e) = self.results.flush() {
                    warn!(error = %e, "failed to flush results during retry pass");
                }
            }
        }

        self.results.flush()?;
        self.progress.write(&BatchState::new(
            self.results.len(),
            total,
            RunPhase::Completed,
            format!("done, {} items", self.results.len()),
        ));
        self.emit(RunEvent::Completed {
            processed: self.results.len(),
            succeeded: self.results.success_count(),
        })
        .await;
        Ok(())
    }

    async fn run_batch(
        &mut self,
        batch: &[WorkItem],
        run_total: usize,
        pass: Pass,
    ) -> anyhow::Result<()> {
        let pool = self.provider.open_pool(self.config.concurrency).await?;
        let handles: Vec<Arc<dyn PageDriver>> = pool.handles().to_vec();

        // Round-robin lane assignment. Each lane owns exactly one session
        // handle and runs its items sequentially, so a handle is never
        // shared by two in-flight items.
        let lane_count = handles.len().max(1);
        let mut lanes: Vec<Vec<WorkItem>> = vec![Vec::new(); lane_count];
        for (i, item) in batch.iter().enumerate() {
            lanes[i % lane_count].push(item.clone());
        }

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let (tx, mut rx) = mpsc::channel::<ItemOutcome>(batch.len().max(1));
        let item_pause = self.config.item_pause_ms;

        let mut lane_futures = FuturesUnordered::new();
        for (lane, driver) in lanes.into_iter().zip(handles.into_iter()) {
            if lane.is_empty() {
                continue;
            }
            let tx = tx.clone();
            let semaphore = Arc::clone(&semaphore);
            let resolver = Arc::clone(&self.resolver);
            lane_futures.push(async move {
                for item in lane {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return;
                    };
                    let outcome = resolver.resolve(driver.as_ref(), &item).await;
                    if tx.send(outcome).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(jitter_ms(item_pause)).await;
                }
            });
        }
        drop(tx);

        let deadline = tokio::time::sleep(self.config.batch_timeout);
        tokio::pin!(deadline);
        let mut completed: HashSet<ResultKey> = HashSet::new();
        let mut lanes_running = !lane_futures.is_empty();

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    warn!("batch deadline expired, aborting in-flight work");
                    break;
                }
                maybe_done = lane_futures.next(), if lanes_running => {
                    if maybe_done.is_none() {
                        lanes_running = false;
                    }
                }
                outcome = rx.recv() => match outcome {
                    Some(outcome) => {
                        completed.insert(outcome.result.key());
                        self.record(outcome, run_total, pass).await;
                    }
                    // All lanes finished and the channel drained.
                    None => break,
                },
            }
        }

        // Cancels whatever is still in flight after a deadline break.
        drop(lane_futures);

        // Outcomes that were queued before the deadline still count.
        while let Ok(outcome) = rx.try_recv() {
            completed.insert(outcome.result.key());
            self.record(outcome, run_total, pass).await;
        }

        for item in batch {
            if !completed.contains(&item.key()) {
                let result = ExtractionResult::failed(item.clone(), ResolutionStatus::Timeout);
                self.record(
                    ItemOutcome {
                        result,
                        attempts: Vec::new(),
                    },
                    run_total,
                    pass,
                )
                .await;
            }
        }

        pool.close().await;
        Ok(())
    }

    async fn record(&mut self, outcome: ItemOutcome, run_total: usize, pass: Pass) {
        self.attempts.lock().await.extend(outcome.attempts);
        self.recorded += 1;

        let title = outcome.result.item.title.clone();
        let status = outcome.result.status;
        match pass {
            Pass::Initial => self.results.insert(outcome.result),
            Pass::Retry => self.results.merge_retry(outcome.result),
        }

        self.progress.write(&BatchState::new(
            self.results.len(),
            run_total,
            RunPhase::Processing,
            title.clone(),
        ));
        self.emit(RunEvent::ItemCompleted { title, status }).await;

        if self.config.flush_every > 0 && self.recorded % self.config.flush_every == 0 {
            if let Err(e) = self.results.flush() {
                warn!(error = %e, "failed to flush results");
            }
        }
    }
}
