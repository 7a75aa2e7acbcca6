// src/ingest/report.rs
//
// Aggregation of one pipeline run into the summary returned to the caller.
// No partial or streaming results: the summary is the whole contract.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ingest::dedup::CategoryCounters;
use crate::ingest::store::SaveReport;
use crate::ingest::types::{Category, NormalizedArticle};

/// Errors beyond this many are counted but not echoed back in the response.
pub const MAX_REPORTED_ERRORS: usize = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CategoryResult {
    Counts {
        fetched: usize,
        filtered: usize,
        #[serde(rename = "duplicatesSkipped")]
        duplicates_skipped: usize,
    },
    Error {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOutcome {
    pub code: i64,
    pub name: String,
    #[serde(flatten)]
    pub result: CategoryResult,
}

impl CategoryOutcome {
    pub fn counts(category: Category, c: CategoryCounters) -> Self {
        Self {
            code: category.code(),
            name: category.name().to_string(),
            result: CategoryResult::Counts {
                fetched: c.fetched,
                filtered: c.filtered,
                duplicates_skipped: c.duplicates,
            },
        }
    }

    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: category.code(),
            name: category.name().to_string(),
            result: CategoryResult::Error {
                error: message.into(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.result, CategoryResult::Counts { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    pub categories_requested: usize,
    pub total_fetched: usize,
    pub total_unique: usize,
    pub filtered_out: usize,
    pub duplicates_skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateInfo {
    pub within_category: usize,
    pub cross_category: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub stats: IngestStats,
    pub duplicate_info: DuplicateInfo,
    pub categories: Vec<CategoryOutcome>,
    /// First `MAX_REPORTED_ERRORS` errors; the full list goes to the log.
    pub errors: Vec<String>,
    pub errors_total: usize,
    pub timestamp: DateTime<Utc>,
}

impl RunReport {
    pub fn push_error(&mut self, message: String) {
        self.errors_total += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(message);
        }
    }
}

/// Everything one run produced. `kept` is the deduplicated batch (also the
/// preview source); `save` is present only when persistence was requested.
#[derive(Debug)]
pub struct RunResult {
    pub report: RunReport,
    pub kept: Vec<NormalizedArticle>,
    pub save: Option<SaveReport>,
}

impl RunResult {
    /// Partial success is the expected common case. Only a run where nothing
    /// could be fetched (and, when saving, nothing could be written) counts
    /// as an overall failure.
    pub fn overall_success(&self) -> bool {
        let any_fetch_ok =
            self.report.categories.is_empty() || self.report.categories.iter().any(|c| c.is_ok());
        let writes_all_failed = self.save.as_ref().is_some_and(|s| s.all_failed());
        any_fetch_ok && !writes_all_failed
    }
}
