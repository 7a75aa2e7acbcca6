use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::config::{self, IngestDefaults, WireConfig, MAX_RESULT_LIMIT};
use crate::ingest::report::{CategoryOutcome, DuplicateInfo, IngestStats, RunResult};
use crate::ingest::store::{ContentStore, MemoryStore, SaveReport};
use crate::ingest::types::{NormalizedArticle, SaveMode, WireApi};
use crate::ingest::wire::{self, HttpWireClient};
use crate::ingest::{run_once, RunOptions};

/// At most this many normalized articles are echoed back in the trigger
/// response; the rest only reach the store.
pub const PREVIEW_CAP: usize = 20;

#[derive(Clone)]
pub struct AppState {
    /// `None` when wire credentials are missing; the server still serves
    /// status/health, but a triggered run fails fast.
    pub wire: Option<Arc<dyn WireApi>>,
    pub store: Arc<dyn ContentStore>,
    pub defaults: IngestDefaults,
    pub request_delay: Duration,
}

impl AppState {
    pub fn from_env() -> Self {
        let defaults = config::load_defaults().unwrap_or_else(|e| {
            tracing::warn!(error = ?e, "ingest defaults not loaded, using built-ins");
            IngestDefaults::default()
        });

        let mut request_delay = Duration::from_millis(config::DEFAULT_REQUEST_DELAY_MS);
        let wire: Option<Arc<dyn WireApi>> = match WireConfig::from_env() {
            Ok(cfg) => {
                request_delay = cfg.request_delay;
                match HttpWireClient::new(cfg) {
                    Ok(client) => Some(Arc::new(client)),
                    Err(e) => {
                        tracing::error!(error = ?e, "wire client construction failed");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = ?e, "wire not configured");
                None
            }
        };

        Self {
            wire,
            store: Arc::new(MemoryStore::new()),
            defaults,
            request_delay,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/ingest", get(ingest_get).post(ingest_post))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestRequest {
    pub categories: Vec<i64>,
    pub priorities: Vec<i64>,
    pub types: Vec<i64>,
    pub languages: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub keywords: Option<String>,
    pub limit: Option<u32>,
    #[serde(alias = "saveToFirestore")]
    pub save_to_store: Option<bool>,
    pub save_mode: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub message: String,
    pub stats: IngestStats,
    pub categories: Vec<CategoryOutcome>,
    pub news: Vec<NormalizedArticle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_results: Option<SaveReport>,
    pub errors: Vec<String>,
    pub duplicate_info: DuplicateInfo,
    pub timestamp: DateTime<Utc>,
}

impl IngestResponse {
    /// Run-aborting failure (credentials, malformed trigger body).
    fn fatal(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            stats: IngestStats::default(),
            categories: Vec::new(),
            news: Vec::new(),
            save_results: None,
            errors: Vec::new(),
            duplicate_info: DuplicateInfo::default(),
            timestamp: Utc::now(),
        }
    }

    fn from_run(result: RunResult) -> Self {
        let success = result.overall_success();
        let message = if success {
            format!(
                "ingest completed: {} unique articles, {} duplicates skipped",
                result.report.stats.total_unique, result.report.stats.duplicates_skipped
            )
        } else {
            "ingest failed: no category could be fetched or written".to_string()
        };

        // Preview without the raw payloads; they can be large and the caller
        // only needs them in the store.
        let news: Vec<NormalizedArticle> = result
            .kept
            .iter()
            .take(PREVIEW_CAP)
            .cloned()
            .map(|mut a| {
                a.original_payload = None;
                a
            })
            .collect();

        Self {
            success,
            message,
            stats: result.report.stats,
            categories: result.report.categories,
            news,
            save_results: result.save,
            errors: result.report.errors,
            duplicate_info: result.report.duplicate_info,
            timestamp: result.report.timestamp,
        }
    }
}

/// Merge the trigger body with the configured defaults into run options.
/// Empty lists fall back to the defaults; dates accept RFC3339 (and the
/// wire's looser shapes), `endDate` accepts the literal "NOW".
fn resolve_options(
    req: IngestRequest,
    defaults: &IngestDefaults,
    request_delay: Duration,
) -> Result<RunOptions, String> {
    let now = Utc::now();

    let start_date = match req.start_date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => crate::ingest::normalize::parse_wire_date(s)
            .ok_or_else(|| format!("invalid startDate '{s}'"))?,
        None => now - chrono::Duration::hours(24),
    };
    let end_date = match req.end_date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(s) if s.eq_ignore_ascii_case("now") => None,
        Some(s) => Some(
            crate::ingest::normalize::parse_wire_date(s)
                .ok_or_else(|| format!("invalid endDate '{s}'"))?,
        ),
    };

    let pick = |given: Vec<i64>, fallback: &[i64]| {
        if given.is_empty() {
            fallback.to_vec()
        } else {
            given
        }
    };
    let languages = if req.languages.is_empty() {
        defaults.languages.clone()
    } else {
        req.languages
    };

    Ok(RunOptions {
        categories: pick(req.categories, &defaults.categories),
        priorities: pick(req.priorities, &defaults.priorities),
        kinds: pick(req.types, &defaults.types),
        language: languages.join(","),
        keywords: req
            .keywords
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty()),
        start_date,
        end_date,
        limit: req.limit.unwrap_or(defaults.limit).clamp(1, MAX_RESULT_LIMIT),
        save: req.save_to_store.unwrap_or(false),
        save_mode: req
            .save_mode
            .as_deref()
            .map(SaveMode::parse)
            .unwrap_or(SaveMode::Overwrite),
        request_delay,
    })
}

async fn ingest_post(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Json<IngestResponse> {
    let Some(wire) = state.wire.clone() else {
        return Json(IngestResponse::fatal(
            "wire credentials not configured; set AA_API_USERNAME and AA_API_PASSWORD",
        ));
    };

    let opts = match resolve_options(req, &state.defaults, state.request_delay) {
        Ok(o) => o,
        Err(msg) => return Json(IngestResponse::fatal(msg)),
    };

    let result = run_once(wire.as_ref(), state.store.as_ref(), &opts).await;
    Json(IngestResponse::from_run(result))
}

async fn ingest_get(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    match q.get("action").map(String::as_str) {
        Some("status") => Json(status_payload(&state)),
        Some("test") => Json(test_payload(&state).await),
        _ => Json(serde_json::json!({
            "success": false,
            "message": "unknown action; use ?action=status or ?action=test",
        })),
    }
}

fn status_payload(state: &AppState) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "service": "aa-wire-ingest",
        "version": env!("CARGO_PKG_VERSION"),
        "wireConfigured": state.wire.is_some(),
        "defaults": state.defaults,
        "previewCap": PREVIEW_CAP,
        "features": [
            "per-category wire search with rate-limit delay",
            "ordered-field normalization with natural keys",
            "within-category recency dedup",
            "cross-category first-claim dedup",
            "overwrite-by-natural-key persistence",
            "partial-failure run summary",
        ],
    })
}

async fn test_payload(state: &AppState) -> serde_json::Value {
    let Some(wire) = &state.wire else {
        return serde_json::json!({
            "success": false,
            "message": "wire credentials not configured",
        });
    };
    match wire::probe(wire.as_ref()).await {
        Ok(n) => serde_json::json!({
            "success": true,
            "message": "wire reachable",
            "items": n,
        }),
        Err(e) => serde_json::json!({
            "success": false,
            "message": format!("wire unreachable: {e:#}"),
        }),
    }
}
