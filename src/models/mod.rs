//! Core data model for the credit-resolution pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key identifying a dataset row across passes.
pub type ResultKey = (String, String);

/// One dataset row awaiting source resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    /// Row index in the input table.
    pub id: usize,
    /// Editorial rubric (e.g. "Domácí", "Krimi").
    pub category: String,
    pub title: String,
    pub view_count: u64,
    /// Share of viewers reaching 25/50/75/100 % of the video.
    pub completion: [f64; 4],
}

impl WorkItem {
    pub fn key(&self) -> ResultKey {
        (
            self.category.trim().to_string(),
            self.title.trim().to_string(),
        )
    }
}

/// One method for locating the article behind a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    SeznamSearch,
    DirectUrl,
    GoogleSearch,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SeznamSearch => "seznam_search",
            Self::DirectUrl => "direct_url",
            Self::GoogleSearch => "google_search",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single strategy attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// An article URL passed the similarity threshold.
    Resolved(String),
    /// The strategy ran but no candidate qualified.
    NoMatch,
    /// The engine could not be used (navigation or protocol failure).
    EngineFailed,
    /// The engine answered with an automated-traffic challenge.
    BotChallenge,
    /// The strategy was disabled and not tried.
    Skipped,
}

/// Audit-log entry, one per strategy tried for a work item.
#[derive(Debug, Clone)]
pub struct SearchAttempt {
    pub work_item_id: usize,
    pub strategy: StrategyKind,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

impl SearchAttempt {
    pub fn new(
        work_item_id: usize,
        strategy: StrategyKind,
        query: impl Into<String>,
        outcome: AttemptOutcome,
    ) -> Self {
        Self {
            work_item_id,
            strategy,
            query: query.into(),
            timestamp: Utc::now(),
            outcome,
        }
    }
}

/// Terminal status of a work item after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Success,
    /// Every search strategy failed outright.
    SearchFailed,
    /// Searches ran but no candidate link qualified.
    LinkNotFound,
    /// Article rendered, but no rule or vocabulary entry matched.
    ExtractionFailed,
    /// Aborted by the batch deadline.
    Timeout,
    /// Unexpected driver failure.
    Error,
}

impl ResolutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Reason code rendered into the output table for non-success rows.
    pub fn failure_reason(&self) -> &'static str {
        match self {
            Self::Success => "",
            Self::SearchFailed => "search_failed",
            Self::LinkNotFound => "link_not_found",
            Self::ExtractionFailed => "extraction_failed",
            Self::Timeout | Self::Error => "unknown_error",
        }
    }
}

/// Exactly one of these exists per work item once a run finishes.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub item: WorkItem,
    pub source_text: Option<String>,
    pub resolved_url: Option<String>,
    pub strategy_used: Option<StrategyKind>,
    pub status: ResolutionStatus,
}

impl ExtractionResult {
    pub fn failed(item: WorkItem, status: ResolutionStatus) -> Self {
        Self {
            item,
            source_text: None,
            resolved_url: None,
            strategy_used: None,
            status,
        }
    }

    pub fn key(&self) -> ResultKey {
        self.item.key()
    }
}

/// Phase of a run as recorded in the progress file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Starting,
    Processing,
    Completed,
}

/// Progress snapshot, overwritten after every completed item and batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchState {
    pub current: usize,
    pub total: usize,
    pub status: RunPhase,
    pub message: String,
    /// Percent complete, rounded to one decimal place.
    pub percentage: f64,
}

impl BatchState {
    pub fn new(current: usize, total: usize, status: RunPhase, message: impl Into<String>) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            (current as f64 / total as f64 * 1000.0).round() / 10.0
        };
        Self {
            current,
            total,
            status,
            message: message.into(),
            percentage,
        }
    }
}
