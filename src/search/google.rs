//! Google search strategy, used as the last fallback.

use async_trait::async_trait;

use crate::backoff::is_bot_challenge;
use crate::browser::PageDriver;
use crate::models::{StrategyKind, WorkItem};

use super::scoring::LinkScorer;
use super::{LocateError, ResolveStrategy};

/// Google search URL prefix; Czech locale parameters keep results regional.
const GOOGLE_SEARCH_URL: &str = "https://www.google.com/search";

/// Searches Google with a site-restricted query.
pub struct GoogleSearch {
    scorer: LinkScorer,
    site_filter: String,
}

impl GoogleSearch {
    pub fn new(scorer: LinkScorer, site_filter: impl Into<String>) -> Self {
        Self {
            scorer,
            site_filter: site_filter.into(),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}?q={}&hl=cs&gl=cz",
            GOOGLE_SEARCH_URL,
            urlencoding::encode(query)
        )
    }
}

#[async_trait]
impl ResolveStrategy for GoogleSearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::GoogleSearch
    }

    fn describe_query(&self, item: &WorkItem) -> String {
        format!("{} site:{}", item.title, self.site_filter)
    }

    async fn locate(
        &self,
        driver: &dyn PageDriver,
        item: &WorkItem,
    ) -> Result<Option<String>, LocateError> {
        let query = self.describe_query(item);
        let url = self.search_url(&query);

        driver
            .navigate(&url)
            .await
            .map_err(|e| LocateError::Navigation(e.to_string()))?;
        let content = driver
            .content()
            .await
            .map_err(|e| LocateError::Driver(e.to_string()))?;

        if is_bot_challenge(&content) {
            return Err(LocateError::BotChallenge);
        }

        Ok(self.scorer.pick_best(&content, &item.title).map(|c| c.url))
    }
}
