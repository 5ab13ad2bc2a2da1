//! chromiumoxide-backed page session.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::Page;
use tracing::debug;

use super::{DriverError, PageDriver};

/// JavaScript to wait for page ready state.
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// Pause after a click so the page can react before content is read.
const POST_CLICK_SETTLE: Duration = Duration::from_millis(300);

/// One CDP page with navigation timeout handling.
pub struct BrowserSession {
    page: Page,
    timeout: Duration,
}

impl BrowserSession {
    pub(crate) async fn new(
        page: Page,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, DriverError> {
        page.execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        Ok(Self { page, timeout })
    }

    /// Wait for the document to reach a ready state. Best-effort: a slow or
    /// non-HTML page only delays, never fails, the navigation.
    async fn wait_for_ready(&self) {
        match tokio::time::timeout(
            self.timeout,
            self.page.evaluate(WAIT_FOR_READY_SCRIPT.to_string()),
        )
        .await
        {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("page ready state: {}", state);
            }
            Ok(Err(e)) => debug!("could not check ready state: {}", e),
            Err(_) => debug!("timeout waiting for page ready state"),
        }
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        debug!(url, "navigating");
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| DriverError::Navigation(format!("invalid URL: {}", e)))?;

        tokio::time::timeout(self.timeout, self.page.execute(params))
            .await
            .map_err(|_| DriverError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| DriverError::Navigation(e.to_string()))?;

        self.wait_for_ready().await;
        Ok(())
    }

    async fn content(&self) -> Result<String, DriverError> {
        self.page
            .content()
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))
    }

    async fn click_first(&self, selectors: &[&str]) -> Result<bool, DriverError> {
        for selector in selectors {
            if let Ok(element) = self.page.find_element(selector.to_string()).await {
                if element.click().await.is_ok() {
                    debug!(selector = *selector, "clicked");
                    tokio::time::sleep(POST_CLICK_SETTLE).await;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        url.map(|u| u.to_string())
            .ok_or_else(|| DriverError::Protocol("page has no URL".to_string()))
    }
}
