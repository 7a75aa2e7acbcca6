// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::IngestDefaults;
use crate::ingest::store::ContentStore;
use crate::ingest::types::{SaveMode, WireApi};
use crate::ingest::{run_once, RunOptions};

#[derive(Clone, Copy, Debug)]
pub struct IngestSchedulerCfg {
    pub interval: Duration,
    pub request_delay: Duration,
}

/// `INGEST_INTERVAL_SECS`; absent, unparseable or 0 disables the scheduler.
pub fn interval_from_env() -> Option<Duration> {
    let secs: u64 = std::env::var("INGEST_INTERVAL_SECS").ok()?.trim().parse().ok()?;
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Periodic re-ingest with the configured defaults, saving in overwrite mode.
/// The site normally pulls the wire on a schedule; the HTTP trigger stays
/// available for manual runs. Natural-key reconciliation makes the repeated
/// runs converge instead of piling up rows.
pub fn spawn_ingest_scheduler(
    wire: Arc<dyn WireApi>,
    store: Arc<dyn ContentStore>,
    defaults: IngestDefaults,
    cfg: IngestSchedulerCfg,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;

            let opts = RunOptions {
                categories: defaults.categories.clone(),
                priorities: defaults.priorities.clone(),
                kinds: defaults.types.clone(),
                language: defaults.languages.join(","),
                keywords: None,
                start_date: chrono::Utc::now() - chrono::Duration::hours(24),
                end_date: None,
                limit: defaults.limit,
                save: true,
                save_mode: SaveMode::Overwrite,
                request_delay: cfg.request_delay,
            };

            let result = run_once(wire.as_ref(), store.as_ref(), &opts).await;
            tracing::info!(
                target: "ingest",
                unique = result.report.stats.total_unique,
                duplicates = result.report.stats.duplicates_skipped,
                errors = result.report.errors_total,
                "scheduled ingest tick"
            );
        }
    })
}
