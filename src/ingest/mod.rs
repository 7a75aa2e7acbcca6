// src/ingest/mod.rs
pub mod dedup;
pub mod normalize;
pub mod report;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod wire;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use std::time::Duration;

use crate::ingest::dedup::DedupAccumulator;
use crate::ingest::report::{CategoryOutcome, DuplicateInfo, IngestStats, RunReport, RunResult};
use crate::ingest::store::{reconcile_batch, ContentStore};
use crate::ingest::types::{Category, SaveMode, SearchQuery, WireApi};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Raw items returned by the wire.");
        describe_counter!(
            "ingest_kept_total",
            "Articles kept after filtering + deduplication."
        );
        describe_counter!(
            "ingest_filtered_total",
            "Articles dropped by the priority/kind filter."
        );
        describe_counter!("ingest_dedup_total", "Articles removed as duplicates.");
        describe_counter!("ingest_wire_errors_total", "Wire fetch/decode errors.");
        describe_counter!("ingest_store_errors_total", "Per-article write errors.");
        describe_counter!("ingest_runs_total", "Completed pipeline runs.");
        describe_histogram!("ingest_fetch_ms", "Wire search time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when the ingest pipeline last ran."
        );
    });
}

/// Fully resolved inputs of one pipeline run (trigger body + configured
/// defaults, already merged by the HTTP layer).
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub categories: Vec<i64>,
    pub priorities: Vec<i64>,
    pub kinds: Vec<i64>,
    pub language: String,
    pub keywords: Option<String>,
    pub start_date: chrono::DateTime<Utc>,
    /// `None` means "NOW" on the wire.
    pub end_date: Option<chrono::DateTime<Utc>>,
    pub limit: u32,
    pub save: bool,
    pub save_mode: SaveMode,
    /// Pause between per-category wire calls (rate-limit throttle).
    pub request_delay: Duration,
}

impl RunOptions {
    fn query_for(&self, category: i64) -> SearchQuery {
        SearchQuery {
            category,
            start_date: self.start_date,
            end_date: self.end_date,
            keywords: self.keywords.clone(),
            language: self.language.clone(),
            limit: self.limit,
        }
    }
}

/// Run the pipeline once: fetch each category sequentially, normalize,
/// dedup into one shared accumulator, then reconcile the combined batch.
///
/// Categories are strictly sequential (the inter-request delay is a
/// deliberate throttle against the wire's rate limits), and a failure on one
/// category records an error outcome and moves on.
pub async fn run_once(
    wire: &dyn WireApi,
    store: &dyn ContentStore,
    opts: &RunOptions,
) -> RunResult {
    ensure_metrics_described();

    let mut acc = DedupAccumulator::new();
    let mut outcomes = Vec::with_capacity(opts.categories.len());
    let mut errors: Vec<String> = Vec::new();
    let mut kept = Vec::new();

    for (i, &code) in opts.categories.iter().enumerate() {
        if i > 0 && !opts.request_delay.is_zero() {
            tokio::time::sleep(opts.request_delay).await;
        }
        let category = Category::from_code(code);

        match wire.search(&opts.query_for(code)).await {
            Ok(items) => {
                let now = Utc::now();
                let batch: Vec<_> = items
                    .iter()
                    .map(|item| normalize::normalize_item(item, category, now))
                    .collect();
                let (mut survivors, counters) =
                    acc.fold_category(batch, &opts.priorities, &opts.kinds);
                tracing::debug!(
                    target: "ingest",
                    category = category.name(),
                    fetched = counters.fetched,
                    filtered = counters.filtered,
                    duplicates = counters.duplicates,
                    "category processed"
                );
                kept.append(&mut survivors);
                outcomes.push(CategoryOutcome::counts(category, counters));
            }
            Err(e) => {
                tracing::warn!(error = ?e, category = category.name(), "category fetch failed");
                counter!("ingest_wire_errors_total").increment(1);
                errors.push(format!("{}: {e:#}", category.name()));
                outcomes.push(CategoryOutcome::error(category, format!("{e:#}")));
            }
        }
    }

    let save = if opts.save {
        let report = reconcile_batch(store, &kept, opts.save_mode, Utc::now()).await;
        for r in report.results.iter().filter(|r| r.error.is_some()) {
            errors.push(format!(
                "{}: {}",
                r.natural_key,
                r.error.as_deref().unwrap_or("write failed")
            ));
        }
        Some(report)
    } else {
        None
    };

    let now = Utc::now();
    let mut report = RunReport {
        stats: IngestStats {
            categories_requested: opts.categories.len(),
            total_fetched: acc.total_fetched,
            total_unique: kept.len(),
            filtered_out: acc.filtered_out,
            duplicates_skipped: acc.duplicates_total(),
        },
        duplicate_info: DuplicateInfo {
            within_category: acc.within_category_dupes,
            cross_category: acc.cross_category_dupes,
            total: acc.duplicates_total(),
        },
        categories: outcomes,
        errors: Vec::new(),
        errors_total: 0,
        timestamp: now,
    };
    for e in errors {
        report.push_error(e);
    }

    // Telemetry
    counter!("ingest_runs_total").increment(1);
    counter!("ingest_kept_total").increment(kept.len() as u64);
    counter!("ingest_filtered_total").increment(acc.filtered_out as u64);
    counter!("ingest_dedup_total").increment(acc.duplicates_total() as u64);
    gauge!("ingest_pipeline_last_run_ts").set(now.timestamp().max(0) as f64);

    RunResult { report, kept, save }
}
