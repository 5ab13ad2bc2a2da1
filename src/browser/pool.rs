//! Browser launch and per-batch session pools.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::config::BrowserEngineConfig;
use super::session::BrowserSession;
use super::{PageDriver, SessionPool, SessionProvider};

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

/// Find a Chrome executable in common locations or PATH.
fn find_chrome() -> Result<PathBuf> {
    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            info!("found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    info!("found Chrome in PATH: {}", path);
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(anyhow::anyhow!(
        "Chrome/Chromium not found. Install it or set browser.executable in the settings file"
    ))
}

/// Launches local Chromium browsers, one per pool.
pub struct ChromiumSessionProvider {
    config: BrowserEngineConfig,
}

impl ChromiumSessionProvider {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionProvider for ChromiumSessionProvider {
    async fn open_pool(&self, size: usize) -> Result<Box<dyn SessionPool>> {
        let pool = ChromiumPool::launch(&self.config, size.max(1)).await?;
        Ok(Box::new(pool))
    }
}

struct ChromiumPool {
    browser: Browser,
    handler_task: JoinHandle<()>,
    handles: Vec<Arc<dyn PageDriver>>,
}

impl ChromiumPool {
    async fn launch(config: &BrowserEngineConfig, size: usize) -> Result<Self> {
        let executable = match &config.executable {
            Some(path) => path.clone(),
            None => find_chrome()?,
        };

        let mut builder = BrowserConfig::builder().chrome_executable(executable);

        // with_head means NOT headless, confusingly
        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--metrics-recording-only")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer");

        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let timeout = Duration::from_secs(config.navigation_timeout);
        let mut handles: Vec<Arc<dyn PageDriver>> = Vec::with_capacity(size);
        for _ in 0..size {
            let page = browser
                .new_page("about:blank")
                .await
                .context("failed to open page")?;
            let session = BrowserSession::new(page, timeout, &config.user_agent).await?;
            handles.push(Arc::new(session));
        }

        info!(size, headless = config.headless, "browser session pool ready");
        Ok(Self {
            browser,
            handler_task,
            handles,
        })
    }
}

#[async_trait]
impl SessionPool for ChromiumPool {
    fn handles(&self) -> &[Arc<dyn PageDriver>] {
        &self.handles
    }

    async fn close(self: Box<Self>) {
        let mut pool = *self;
        pool.handles.clear();
        let _ = pool.browser.close().await;
        let _ = pool.browser.wait().await;
        pool.handler_task.abort();
        debug!("browser pool closed");
    }
}
