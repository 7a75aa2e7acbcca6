// src/ingest/wire.rs
//
// Client for the AA search endpoint. One authenticated POST per category; the
// caller sequences categories and inserts the rate-limit delay.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Serialize;

use crate::config::WireConfig;
use crate::ingest::types::{SearchQuery, WireApi, WireItem};

/// Literal the wire accepts as "right now" for the end of a date range.
const END_DATE_NOW: &str = "NOW";

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    limit: u32,
    category: i64,
    start_date: String,
    end_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
    language: &'a str,
}

impl<'a> SearchBody<'a> {
    fn from_query(q: &'a SearchQuery) -> Self {
        Self {
            limit: q.limit,
            category: q.category,
            start_date: q.start_date.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            end_date: q
                .end_date
                .map(|d| d.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
                .unwrap_or_else(|| END_DATE_NOW.to_string()),
            query: q.keywords.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            language: &q.language,
        }
    }
}

/// Pull the item list out of the wire's response wrapper
/// `{ response: { success, code }, data: { result: [...] } }`.
/// Anything that doesn't match (missing `success`, missing `result`) is
/// "no items", not an error; the wire sends partial wrappers on empty desks.
pub fn items_from_envelope(v: &serde_json::Value) -> Vec<WireItem> {
    let success = v
        .pointer("/response/success")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    if !success {
        return Vec::new();
    }
    v.pointer("/data/result")
        .and_then(serde_json::Value::as_array)
        .cloned()
        .unwrap_or_default()
}

pub struct HttpWireClient {
    client: reqwest::Client,
    cfg: WireConfig,
}

impl HttpWireClient {
    pub fn new(cfg: WireConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("building wire http client")?;
        Ok(Self { client, cfg })
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.cfg.base_url)
    }
}

/// Minimal single-category request for the reachability check behind
/// `GET /ingest?action=test`. Returns the number of items the probe saw.
pub async fn probe(wire: &dyn WireApi) -> Result<usize> {
    let query = SearchQuery {
        category: 1,
        start_date: chrono::Utc::now() - chrono::Duration::hours(24),
        end_date: None,
        keywords: None,
        language: "tr_TR".to_string(),
        limit: 1,
    };
    Ok(wire.search(&query).await?.len())
}

#[async_trait]
impl WireApi for HttpWireClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<WireItem>> {
        let t0 = std::time::Instant::now();
        let body = SearchBody::from_query(query);

        let resp = self
            .client
            .post(self.search_url())
            .basic_auth(&self.cfg.username, Some(&self.cfg.password))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("wire search for category {}", query.category))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!(
                "wire search for category {} returned {status}",
                query.category
            ));
        }

        let envelope: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("decoding wire response for category {}", query.category))?;
        let items = items_from_envelope(&envelope);

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_fetch_ms").record(ms);
        counter!("ingest_items_total").increment(items.len() as u64);

        Ok(items)
    }

    fn name(&self) -> &'static str {
        "aa-wire"
    }
}
