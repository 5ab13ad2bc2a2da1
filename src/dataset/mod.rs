//! Dataset table I/O.
//!
//! Reads the normalized input table (semicolon-separated) and writes the
//! cumulative results table. Column normalization itself happens upstream;
//! this module only consumes the agreed shape.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{ExtractionResult, WorkItem};

/// Output value for rows that never resolved a strategy.
const NO_STRATEGY: &str = "failed";

#[derive(Debug, Deserialize)]
struct InputRow {
    category: String,
    title: String,
    view_count: u64,
    #[serde(default)]
    completion_25: Option<f64>,
    #[serde(default)]
    completion_50: Option<f64>,
    #[serde(default)]
    completion_75: Option<f64>,
    #[serde(default)]
    completion_100: Option<f64>,
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    category: &'a str,
    title: &'a str,
    view_count: u64,
    completion_25: f64,
    completion_50: f64,
    completion_75: f64,
    completion_100: f64,
    extracted_source: String,
    resolved_url: &'a str,
    strategy_used: &'a str,
}

/// Load work items, dropping rows under the view-count threshold.
/// Malformed rows are logged and skipped rather than failing the run.
pub fn load_work_items(path: &Path, view_count_threshold: u64) -> Result<Vec<WorkItem>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open dataset {}", path.display()))?;

    let mut items = Vec::new();
    for (id, row) in reader.deserialize::<InputRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(row = id, error = %e, "skipping malformed row");
                continue;
            }
        };
        if row.view_count < view_count_threshold {
            continue;
        }
        items.push(WorkItem {
            id,
            category: row.category.trim().to_string(),
            title: row.title.trim().to_string(),
            view_count: row.view_count,
            completion: [
                row.completion_25.unwrap_or(0.0),
                row.completion_50.unwrap_or(0.0),
                row.completion_75.unwrap_or(0.0),
                row.completion_100.unwrap_or(0.0),
            ],
        });
    }

    info!(
        count = items.len(),
        threshold = view_count_threshold,
        "loaded work items"
    );
    Ok(items)
}

/// Rewrite the results table. Non-success rows carry
/// `"<not-found-label> - <reason>"` in the source column.
pub fn write_results(
    path: &Path,
    records: &[ExtractionResult],
    not_found_label: &str,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .with_context(|| format!("failed to open results table {}", path.display()))?;

    for record in records {
        let extracted_source = match (&record.source_text, record.status.is_success()) {
            (Some(text), true) => text.clone(),
            _ => format!("{} - {}", not_found_label, record.status.failure_reason()),
        };
        writer.serialize(OutputRow {
            category: &record.item.category,
            title: &record.item.title,
            view_count: record.item.view_count,
            completion_25: record.item.completion[0],
            completion_50: record.item.completion[1],
            completion_75: record.item.completion[2],
            completion_100: record.item.completion[3],
            extracted_source,
            resolved_url: record.resolved_url.as_deref().unwrap_or(""),
            strategy_used: record
                .strategy_used
                .map(|s| s.as_str())
                .unwrap_or(NO_STRATEGY),
        })?;
    }

    writer.flush()?;
    Ok(())
}
