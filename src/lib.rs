//! sourcescout - media-credit resolution for video datasets.
//!
//! For each video title in a dataset, locates the matching novinky.cz
//! article (search engines or direct URL construction), renders it in a
//! headless browser, and extracts the published media-credit string with a
//! cascade of heuristics.

pub mod backoff;
pub mod browser;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod extract;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod search;
