//! Scripted page drivers and session pools for integration tests.
//! No browser process is involved.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sourcescout::browser::{DriverError, PageDriver, SessionPool, SessionProvider};

/// Pages served by URL prefix; the longest matching prefix wins.
#[derive(Default)]
pub struct PageMap {
    pages: HashMap<String, String>,
}

impl PageMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, url_prefix: &str, html: &str) -> Self {
        self.pages.insert(url_prefix.to_string(), html.to_string());
        self
    }

    fn lookup(&self, url: &str) -> Option<&str> {
        self.pages
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, html)| html.as_str())
    }
}

/// Driver that renders pages from a shared [`PageMap`].
pub struct FakeDriver {
    pages: Arc<PageMap>,
    current: Mutex<Option<String>>,
}

impl FakeDriver {
    pub fn new(pages: Arc<PageMap>) -> Self {
        Self {
            pages,
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        if self.pages.lookup(url).is_none() {
            return Err(DriverError::Navigation(format!("no page for {}", url)));
        }
        *self.current.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    async fn content(&self) -> Result<String, DriverError> {
        let current = self.current.lock().unwrap().clone();
        let url = current.ok_or_else(|| DriverError::Protocol("no page loaded".to_string()))?;
        self.pages
            .lookup(&url)
            .map(|html| html.to_string())
            .ok_or_else(|| DriverError::Protocol("page disappeared".to_string()))
    }

    async fn click_first(&self, _selectors: &[&str]) -> Result<bool, DriverError> {
        Ok(false)
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.current
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DriverError::Protocol("no page loaded".to_string()))
    }
}

pub struct FakePool {
    handles: Vec<Arc<dyn PageDriver>>,
}

#[async_trait]
impl SessionPool for FakePool {
    fn handles(&self) -> &[Arc<dyn PageDriver>] {
        &self.handles
    }

    async fn close(self: Box<Self>) {}
}

/// Provider handing out fresh [`FakeDriver`]s over one shared page map.
pub struct FakeProvider {
    pages: Arc<PageMap>,
}

impl FakeProvider {
    pub fn new(pages: PageMap) -> Self {
        Self {
            pages: Arc::new(pages),
        }
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    async fn open_pool(&self, size: usize) -> anyhow::Result<Box<dyn SessionPool>> {
        let handles = (0..size.max(1))
            .map(|_| Arc::new(FakeDriver::new(Arc::clone(&self.pages))) as Arc<dyn PageDriver>)
            .collect();
        Ok(Box::new(FakePool { handles }))
    }
}
