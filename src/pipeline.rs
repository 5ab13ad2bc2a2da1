//! Production per-item pipeline: locate the article, then extract the credit.

use async_trait::async_trait;
use tracing::warn;

use crate::browser::PageDriver;
use crate::extract::{ExtractError, SourceExtractor};
use crate::models::{AttemptOutcome, ExtractionResult, ResolutionStatus, WorkItem};
use crate::orchestrator::{ItemOutcome, ItemResolver};
use crate::search::StrategySelector;

/// Wires the strategy selector and the extractor into one resolver.
pub struct ResolvePipeline {
    selector: StrategySelector,
    extractor: SourceExtractor,
}

impl ResolvePipeline {
    pub fn new(selector: StrategySelector, extractor: SourceExtractor) -> Self {
        Self {
            selector,
            extractor,
        }
    }
}

#[async_trait]
impl ItemResolver for ResolvePipeline {
    async fn resolve(&self, driver: &dyn PageDriver, item: &WorkItem) -> ItemOutcome {
        let (located, attempts) = self.selector.resolve(driver, item).await;

        let result = match located {
            Some(located) => match self.extractor.extract(driver, &located.url).await {
                Ok(Some(text)) => ExtractionResult {
                    item: item.clone(),
                    source_text: Some(text),
                    resolved_url: Some(located.url),
                    strategy_used: Some(located.strategy),
                    status: ResolutionStatus::Success,
                },
                Ok(None) => ExtractionResult {
                    item: item.clone(),
                    source_text: None,
                    resolved_url: Some(located.url),
                    strategy_used: Some(located.strategy),
                    status: ResolutionStatus::ExtractionFailed,
                },
                Err(ExtractError::Navigation { .. }) => ExtractionResult {
                    item: item.clone(),
                    source_text: None,
                    resolved_url: Some(located.url),
                    strategy_used: Some(located.strategy),
                    status: ResolutionStatus::Timeout,
                },
                Err(e) => {
                    warn!(title = %item.title, error = %e, "driver failure during extraction");
                    ExtractionResult {
                        item: item.clone(),
                        source_text: None,
                        resolved_url: Some(located.url),
                        strategy_used: Some(located.strategy),
                        status: ResolutionStatus::Error,
                    }
                }
            },
            None => {
                // NoMatch anywhere means the searches worked but the article
                // was not found; otherwise every engine failed outright.
                let status = if attempts
                    .iter()
                    .any(|a| a.outcome == AttemptOutcome::NoMatch)
                {
                    ResolutionStatus::LinkNotFound
                } else {
                    ResolutionStatus::SearchFailed
                };
                ExtractionResult::failed(item.clone(), status)
            }
        };

        ItemOutcome { result, attempts }
    }
}
