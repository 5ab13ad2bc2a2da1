//! Completion-ordered result accumulation with keyed replacement.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;

use crate::models::{ExtractionResult, ResultKey, WorkItem};

/// Accumulates one record per work item, in completion order, and persists
/// the cumulative table at flush points.
pub struct ResultsStore {
    output_path: PathBuf,
    not_found_label: String,
    records: Vec<ExtractionResult>,
    index: HashMap<ResultKey, usize>,
}

impl ResultsStore {
    pub fn new(output_path: PathBuf, not_found_label: impl Into<String>) -> Self {
        Self {
            output_path,
            not_found_label: not_found_label.into(),
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ExtractionResult] {
        &self.records
    }

    pub fn success_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status.is_success())
            .count()
    }

    /// Insert or overwrite the record for the item's key. Position in the
    /// table is kept on overwrite.
    pub fn insert(&mut self, result: ExtractionResult) {
        let key = result.key();
        match self.index.get(&key) {
            Some(&i) => self.records[i] = result,
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(result);
            }
        }
    }

    /// Retry-pass merge: a success replaces a prior failure in place; a
    /// prior success is never downgraded; a repeated failure keeps the
    /// original record.
    pub fn merge_retry(&mut self, result: ExtractionResult) {
        let key = result.key();
        match self.index.get(&key) {
            Some(&i) => {
                if self.records[i].status.is_success() {
                    return;
                }
                if result.status.is_success() {
                    self.records[i] = result;
                }
            }
            None => self.insert(result),
        }
    }

    /// Items whose current record is not a success (retry candidates).
    pub fn failed_items(&self) -> Vec<WorkItem> {
        self.records
            .iter()
            .filter(|r| !r.status.is_success())
            .map(|r| r.item.clone())
            .collect()
    }

    /// Rewrite the cumulative results table.
    pub fn flush(&self) -> Result<()> {
        crate::dataset::write_results(&self.output_path, &self.records, &self.not_found_label)
    }
}
