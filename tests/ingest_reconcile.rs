// tests/ingest_reconcile.rs
//
// Persistence reconciler: idempotency across runs, overwrite vs skip, and
// per-item failure isolation.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use aa_wire_ingest::ingest::normalize::normalize_item;
use aa_wire_ingest::ingest::store::{reconcile_batch, ContentStore, MemoryStore, StoredArticle};
use aa_wire_ingest::ingest::types::{Category, NormalizedArticle, SaveMode};

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn batch() -> Vec<NormalizedArticle> {
    let now = at("2025-01-10T12:00:00Z");
    [
        json!({"id": "A1", "type": "text", "date": "2025-01-10T08:00:00Z", "content": "bir"}),
        json!({"id": "A2", "type": "picture", "date": "2025-01-10T09:00:00Z", "content": "iki"}),
        json!({"id": "A3", "type": "video", "date": "2025-01-10T10:00:00Z", "content": "üç"}),
    ]
    .iter()
    .map(|item| normalize_item(item, Category::Genel, now))
    .collect()
}

#[tokio::test]
async fn reingesting_the_same_batch_is_idempotent() {
    let store = MemoryStore::new();
    let articles = batch();

    let first = reconcile_batch(&store, &articles, SaveMode::Overwrite, at("2025-01-10T12:00:00Z")).await;
    assert_eq!(first.created, 3);
    assert_eq!(first.overwritten, 0);
    assert_eq!(store.len(), 3);

    let second =
        reconcile_batch(&store, &articles, SaveMode::Overwrite, at("2025-01-10T13:00:00Z")).await;
    assert_eq!(second.created, 0);
    assert_eq!(second.overwritten, 3);
    assert_eq!(store.len(), 3, "no duplicate rows on re-ingest");

    // ids and created_at survive the overwrite
    for row in store.snapshot() {
        assert_eq!(row.created_at, at("2025-01-10T12:00:00Z"));
        assert_eq!(row.updated_at, at("2025-01-10T13:00:00Z"));
    }
}

#[tokio::test]
async fn overwrite_replaces_fields_and_skip_leaves_them() {
    let store = MemoryStore::new();
    let articles = batch();
    reconcile_batch(&store, &articles, SaveMode::Overwrite, at("2025-01-10T12:00:00Z")).await;

    let mut updated = articles.clone();
    updated[0].content = "güncellenmiş".to_string();

    let report = reconcile_batch(&store, &updated, SaveMode::Skip, at("2025-01-10T13:00:00Z")).await;
    assert_eq!(report.skipped, 3);
    let row = store
        .find_by_natural_key(&articles[0].natural_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.article.content, "bir", "skip mode must not touch rows");

    let report =
        reconcile_batch(&store, &updated, SaveMode::Overwrite, at("2025-01-10T14:00:00Z")).await;
    assert_eq!(report.overwritten, 3);
    let row = store
        .find_by_natural_key(&articles[0].natural_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.article.content, "güncellenmiş");
}

/// Store that refuses to write one specific natural key.
struct Flaky {
    inner: MemoryStore,
    poison: String,
}

#[async_trait]
impl ContentStore for Flaky {
    async fn find_by_natural_key(&self, key: &str) -> Result<Option<StoredArticle>> {
        self.inner.find_by_natural_key(key).await
    }
    async fn insert(&self, article: &NormalizedArticle, now: DateTime<Utc>) -> Result<StoredArticle> {
        if article.natural_key == self.poison {
            return Err(anyhow!("yazma hatası"));
        }
        self.inner.insert(article, now).await
    }
    async fn replace(
        &self,
        id: &str,
        article: &NormalizedArticle,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.inner.replace(id, article, now).await
    }
}

#[tokio::test]
async fn one_failed_write_does_not_abort_the_batch() {
    let articles = batch();
    let store = Flaky {
        inner: MemoryStore::new(),
        poison: articles[1].natural_key.clone(),
    };

    let report = reconcile_batch(&store, &articles, SaveMode::Overwrite, at("2025-01-10T12:00:00Z")).await;

    assert_eq!(report.created, 2);
    assert_eq!(report.failed, 1);
    assert!(!report.all_failed());
    assert_eq!(store.inner.len(), 2);

    let failed: Vec<_> = report.results.iter().filter(|r| r.error.is_some()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].natural_key, articles[1].natural_key);
    assert!(failed[0].error.as_deref().unwrap().contains("yazma hatası"));
}
