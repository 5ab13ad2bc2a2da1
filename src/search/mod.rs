//! Article location strategies and their selection/fallback logic.

pub mod direct;
pub mod google;
pub mod scoring;
pub mod seznam;

pub use direct::DirectUrl;
pub use google::GoogleSearch;
pub use scoring::{similarity, LinkCandidate, LinkScorer};
pub use seznam::SeznamSearch;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backoff::{FailureRegistry, Pacing};
use crate::browser::PageDriver;
use crate::models::{AttemptOutcome, SearchAttempt, StrategyKind, WorkItem};

/// Failure of a single strategy attempt.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("bot challenge detected")]
    BotChallenge,
    #[error("driver failure: {0}")]
    Driver(String),
}

/// One method for turning a work item into an article URL.
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Query or candidate-URL description recorded in the attempt log.
    fn describe_query(&self, item: &WorkItem) -> String;

    /// Try to resolve an article URL. `Ok(None)` means the strategy ran but
    /// no candidate qualified; errors count against the strategy's health.
    async fn locate(
        &self,
        driver: &dyn PageDriver,
        item: &WorkItem,
    ) -> Result<Option<String>, LocateError>;
}

/// A resolved article URL together with the strategy that found it.
#[derive(Debug, Clone)]
pub struct Located {
    pub url: String,
    pub strategy: StrategyKind,
}

/// Runs strategies in configured order, gated on the failure registry,
/// stopping at the first resolved URL.
pub struct StrategySelector {
    strategies: Vec<Box<dyn ResolveStrategy>>,
    registry: Arc<Mutex<FailureRegistry>>,
    pacing: Pacing,
}

impl StrategySelector {
    pub fn new(
        strategies: Vec<Box<dyn ResolveStrategy>>,
        registry: Arc<Mutex<FailureRegistry>>,
        pacing: Pacing,
    ) -> Self {
        Self {
            strategies,
            registry,
            pacing,
        }
    }

    pub fn registry(&self) -> Arc<Mutex<FailureRegistry>> {
        Arc::clone(&self.registry)
    }

    /// Resolve an article URL for `item`. Infallible by contract: every
    /// internal failure is folded into the attempt log and a `None` result.
    pub async fn resolve(
        &self,
        driver: &dyn PageDriver,
        item: &WorkItem,
    ) -> (Option<Located>, Vec<SearchAttempt>) {
        let mut attempts = Vec::new();

        for strategy in &self.strategies {
            let kind = strategy.kind();
            let query = strategy.describe_query(item);

            if self.registry.lock().await.is_disabled(kind) {
                debug!(strategy = %kind, "strategy disabled, skipping");
                attempts.push(SearchAttempt::new(
                    item.id,
                    kind,
                    &query,
                    AttemptOutcome::Skipped,
                ));
                continue;
            }

            tokio::time::sleep(self.pacing.pre_navigation_delay()).await;

            match strategy.locate(driver, item).await {
                Ok(Some(url)) => {
                    self.registry.lock().await.record_success(kind);
                    attempts.push(SearchAttempt::new(
                        item.id,
                        kind,
                        &query,
                        AttemptOutcome::Resolved(url.clone()),
                    ));
                    info!(strategy = %kind, url = %url, "article resolved");
                    return (Some(Located { url, strategy: kind }), attempts);
                }
                Ok(None) => {
                    // The engine answered; not finding a match is not a
                    // health problem.
                    self.registry.lock().await.record_success(kind);
                    attempts.push(SearchAttempt::new(
                        item.id,
                        kind,
                        &query,
                        AttemptOutcome::NoMatch,
                    ));
                }
                Err(LocateError::BotChallenge) => {
                    warn!(strategy = %kind, "bot challenge, cooling down");
                    self.registry.lock().await.record_failure(kind);
                    attempts.push(SearchAttempt::new(
                        item.id,
                        kind,
                        &query,
                        AttemptOutcome::BotChallenge,
                    ));
                    tokio::time::sleep(self.pacing.bot_cooldown).await;
                }
                Err(e) => {
                    warn!(strategy = %kind, error = %e, "strategy failed");
                    self.registry.lock().await.record_failure(kind);
                    attempts.push(SearchAttempt::new(
                        item.id,
                        kind,
                        &query,
                        AttemptOutcome::EngineFailed,
                    ));
                }
            }
        }

        (None, attempts)
    }
}
