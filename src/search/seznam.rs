//! Seznam.cz search strategy.

use async_trait::async_trait;

use crate::backoff::is_bot_challenge;
use crate::browser::PageDriver;
use crate::models::{StrategyKind, WorkItem};

use super::scoring::LinkScorer;
use super::{LocateError, ResolveStrategy};

/// Seznam search URL prefix.
const SEZNAM_SEARCH_URL: &str = "https://search.seznam.cz/?q=";

/// Searches Seznam with a site-restricted query.
pub struct SeznamSearch {
    scorer: LinkScorer,
    site_filter: String,
}

impl SeznamSearch {
    pub fn new(scorer: LinkScorer, site_filter: impl Into<String>) -> Self {
        Self {
            scorer,
            site_filter: site_filter.into(),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!("{}{}", SEZNAM_SEARCH_URL, urlencoding::encode(query))
    }
}

#[async_trait]
impl ResolveStrategy for SeznamSearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SeznamSearch
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

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy() -> SeznamSearch {
        SeznamSearch::new(LinkScorer::new("novinky.cz", 0.1), "novinky.cz")
    }

    #[test]
    fn query_carries_the_site_restriction() {
        let item = WorkItem {
            id: 0,
            category: "Krimi".to_string(),
            title: "Požár haly v Ostravě".to_string(),
            view_count: 1200,
            completion: [0.0; 4],
        };
        assert_eq!(
            strategy().describe_query(&item),
            "Požár haly v Ostravě site:novinky.cz"
        );
    }

    #[test]
    fn search_url_is_encoded() {
        let url = strategy().search_url("požár haly site:novinky.cz");
        assert!(url.starts_with("https://search.seznam.cz/?q="));
        assert!(!url.contains(' '));
        assert!(url.contains("po%C5%BE%C3%A1r"));
    }
}
