// src/ingest/store.rs
//
// Content-store seam and the persistence reconciler. The store only needs
// "find by natural key" and "write"; everything else about the site's
// database stays out of this crate.
//
// The reconciler does lookup-then-write without transactional isolation. A
// concurrent run against the same natural key could race; the pipeline is
// meant to be invoked by a single scheduler at a time.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ingest::types::{NormalizedArticle, SaveMode};

/// One stored article row. `id` and `created_at` are immutable once written;
/// overwrites only touch the article fields and `updated_at`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredArticle {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub article: NormalizedArticle,
}

#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    async fn find_by_natural_key(&self, key: &str) -> Result<Option<StoredArticle>>;
    async fn insert(&self, article: &NormalizedArticle, now: DateTime<Utc>) -> Result<StoredArticle>;
    /// Replace the article fields of an existing row, keeping its id and
    /// `created_at`.
    async fn replace(&self, id: &str, article: &NormalizedArticle, now: DateTime<Utc>)
        -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveAction {
    Created,
    Overwritten,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResult {
    pub natural_key: String,
    pub action: SaveAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one persistence batch.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub created: usize,
    pub overwritten: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: Vec<SaveResult>,
}

impl SaveReport {
    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.failed == self.results.len()
    }
}

/// Write a deduplicated batch to the store. Idempotent: a second run with the
/// same batch overwrites the same rows instead of inserting new ones. A
/// failed write is recorded per item and never aborts the batch.
pub async fn reconcile_batch(
    store: &dyn ContentStore,
    batch: &[NormalizedArticle],
    mode: SaveMode,
    now: DateTime<Utc>,
) -> SaveReport {
    let mut report = SaveReport::default();

    for article in batch {
        let outcome = reconcile_one(store, article, mode, now).await;
        match outcome {
            Ok(action) => {
                match action {
                    SaveAction::Created => report.created += 1,
                    SaveAction::Overwritten => report.overwritten += 1,
                    SaveAction::Skipped => report.skipped += 1,
                    SaveAction::Failed => unreachable!("reconcile_one maps failures to Err"),
                }
                report.results.push(SaveResult {
                    natural_key: article.natural_key.clone(),
                    action,
                    error: None,
                });
            }
            Err(e) => {
                tracing::warn!(error = ?e, key = %article.natural_key, "article write failed");
                metrics::counter!("ingest_store_errors_total").increment(1);
                report.failed += 1;
                report.results.push(SaveResult {
                    natural_key: article.natural_key.clone(),
                    action: SaveAction::Failed,
                    error: Some(format!("{e:#}")),
                });
            }
        }
    }

    report
}

async fn reconcile_one(
    store: &dyn ContentStore,
    article: &NormalizedArticle,
    mode: SaveMode,
    now: DateTime<Utc>,
) -> Result<SaveAction> {
    match store.find_by_natural_key(&article.natural_key).await? {
        Some(existing) => match mode {
            SaveMode::Overwrite => {
                store.replace(&existing.id, article, now).await?;
                Ok(SaveAction::Overwritten)
            }
            SaveMode::Skip => Ok(SaveAction::Skipped),
        },
        None => {
            store.insert(article, now).await?;
            Ok(SaveAction::Created)
        }
    }
}

/// In-memory store keyed by natural key. Backs the service out of the box and
/// doubles as the test store.
#[derive(Default)]
pub struct MemoryStore {
    inner: std::sync::Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    rows: std::collections::HashMap<String, StoredArticle>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("store mutex poisoned").rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<StoredArticle> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut rows: Vec<_> = inner.rows.values().cloned().collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows
    }
}

#[async_trait::async_trait]
impl ContentStore for MemoryStore {
    async fn find_by_natural_key(&self, key: &str) -> Result<Option<StoredArticle>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.rows.get(key).cloned())
    }

    async fn insert(&self, article: &NormalizedArticle, now: DateTime<Utc>) -> Result<StoredArticle> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.next_id += 1;
        let row = StoredArticle {
            id: format!("art-{:06}", inner.next_id),
            created_at: now,
            updated_at: now,
            article: article.clone(),
        };
        inner.rows.insert(article.natural_key.clone(), row.clone());
        Ok(row)
    }

    async fn replace(
        &self,
        id: &str,
        article: &NormalizedArticle,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let row = inner
            .rows
            .values_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow::anyhow!("no stored article with id {id}"))?;
        row.article = article.clone();
        row.updated_at = now;
        Ok(())
    }
}
