//! Headless browser capability.
//!
//! All network interaction in the pipeline goes through the [`PageDriver`]
//! trait; search strategies and the extractor never issue requests
//! themselves.

mod config;
mod pool;
mod session;

pub use config::BrowserEngineConfig;
pub use pool::ChromiumSessionProvider;
pub use session::BrowserSession;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a page driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("navigation timed out after {0}s")]
    Timeout(u64),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Minimal page-automation surface used by the pipeline.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to `url` and wait for the document to render.
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String, DriverError>;

    /// Click the first element matching any of `selectors`, in order.
    /// Returns whether anything was clicked.
    async fn click_first(&self, selectors: &[&str]) -> Result<bool, DriverError>;

    /// URL the page ended up on after redirects.
    async fn current_url(&self) -> Result<String, DriverError>;
}

/// A set of page drivers backed by one browser process, opened per batch.
#[async_trait]
pub trait SessionPool: Send + Sync {
    /// Page handles. Each handle is used by at most one work item at a time.
    fn handles(&self) -> &[Arc<dyn PageDriver>];

    /// Close every session and release the underlying browser.
    async fn close(self: Box<Self>);
}

/// Opens fresh session pools; one pool per batch and per retry pass.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open_pool(&self, size: usize) -> anyhow::Result<Box<dyn SessionPool>>;
}
