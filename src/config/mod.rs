//! Runtime settings, resolved once at startup.
//!
//! Everything execution-relevant lives in one explicit object: an optional
//! TOML file provides the base, CLI flags override individual fields. No
//! environment sniffing decides behavior at runtime.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::browser::BrowserEngineConfig;
use crate::models::StrategyKind;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    #[serde(default)]
    pub run: RunSettings,
    #[serde(default)]
    pub pacing: PacingSettings,
    #[serde(default)]
    pub search: SearchSettings,
}

impl Settings {
    /// Load from a TOML file, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read settings {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("invalid settings file {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Concurrent pipelines; also the session-pool size.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,
    /// Flush the results table after this many completed items.
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
    /// Rows with fewer views are dropped at load.
    #[serde(default = "default_view_threshold")]
    pub view_count_threshold: u64,
    #[serde(default = "default_progress_file")]
    pub progress_file: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            batch_timeout_secs: default_batch_timeout(),
            flush_every: default_flush_every(),
            view_count_threshold: default_view_threshold(),
            progress_file: default_progress_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingSettings {
    /// Delay before each strategy navigation, milliseconds.
    #[serde(default = "default_pre_navigation")]
    pub pre_navigation_ms: (u64, u64),
    /// Pause after each completed item, milliseconds.
    #[serde(default = "default_item_pause")]
    pub item_pause_ms: (u64, u64),
    /// Pause between batches, milliseconds.
    #[serde(default = "default_batch_pause")]
    pub batch_pause_ms: (u64, u64),
    /// Extended pause after a bot challenge, seconds.
    #[serde(default = "default_bot_cooldown")]
    pub bot_cooldown_secs: u64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            pre_navigation_ms: default_pre_navigation(),
            item_pause_ms: default_item_pause(),
            batch_pause_ms: default_batch_pause(),
            bot_cooldown_secs: default_bot_cooldown(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Host whose articles we are after.
    #[serde(default = "default_target_host")]
    pub target_host: String,
    /// `site:` restriction appended to search queries.
    #[serde(default = "default_target_host")]
    pub site_filter: String,
    /// Base URL for direct-URL construction.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Strategy order; disabled strategies are skipped, not reordered.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyKind>,
    #[serde(default = "default_seznam_threshold")]
    pub seznam_threshold: f64,
    #[serde(default = "default_google_threshold")]
    pub google_threshold: f64,
    /// Consecutive failures before a strategy is disabled for the run.
    #[serde(default = "default_disable_threshold")]
    pub disable_threshold: u32,
    /// Navigation attempts per article before giving up on extraction.
    #[serde(default = "default_extraction_attempts")]
    pub extraction_attempts: usize,
    /// Label written for rows whose credit was never found.
    #[serde(default = "default_not_found_label")]
    pub not_found_label: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            target_host: default_target_host(),
            site_filter: default_target_host(),
            base_url: default_base_url(),
            strategies: default_strategies(),
            seznam_threshold: default_seznam_threshold(),
            google_threshold: default_google_threshold(),
            disable_threshold: default_disable_threshold(),
            extraction_attempts: default_extraction_attempts(),
            not_found_label: default_not_found_label(),
        }
    }
}

fn default_batch_size() -> usize {
    30
}

fn default_concurrency() -> usize {
    2
}

fn default_batch_timeout() -> u64 {
    1200
}

fn default_flush_every() -> usize {
    10
}

fn default_view_threshold() -> u64 {
    1000
}

fn default_progress_file() -> PathBuf {
    PathBuf::from("progress.json")
}

fn default_pre_navigation() -> (u64, u64) {
    (1000, 3000)
}

fn default_item_pause() -> (u64, u64) {
    (2000, 4000)
}

fn default_batch_pause() -> (u64, u64) {
    (5000, 10000)
}

fn default_bot_cooldown() -> u64 {
    15
}

fn default_target_host() -> String {
    "novinky.cz".to_string()
}

fn default_base_url() -> String {
    "https://www.novinky.cz".to_string()
}

fn default_strategies() -> Vec<StrategyKind> {
    vec![
        StrategyKind::SeznamSearch,
        StrategyKind::DirectUrl,
        StrategyKind::GoogleSearch,
    ]
}

fn default_seznam_threshold() -> f64 {
    0.10
}

fn default_google_threshold() -> f64 {
    0.15
}

fn default_disable_threshold() -> u32 {
    5
}

fn default_extraction_attempts() -> usize {
    2
}

fn default_not_found_label() -> String {
    "Zdroj nenalezen".to_string()
}
