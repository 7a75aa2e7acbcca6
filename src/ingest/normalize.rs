// src/ingest/normalize.rs
//
// Turns one raw wire item, in the context of its requesting category, into a
// canonical `NormalizedArticle`. Everything here is a pure function of the
// payload plus an explicit `now`, so the key construction is testable without
// a live wire.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rand::{distr::Alphanumeric, Rng};

use crate::ingest::types::{ArticleKind, Category, NormalizedArticle, WireItem};

/// Ordered fallback lists for the wire's duck-typed field names. Text items
/// use the first name, picture/video payloads tend to use the later ones.
pub const TITLE_FIELDS: &[&str] = &["title", "headline", "header"];
pub const BRIEF_FIELDS: &[&str] = &["brief", "summary", "excerpt"];
pub const CONTENT_FIELDS: &[&str] = &["content", "text"];

/// Placeholder so a stored article never ends up with an empty title.
pub const FALLBACK_TITLE: &str = "Başlık bulunamadı";

/// Lowest wire urgency; used when `priority` is absent or unparseable.
pub const DEFAULT_PRIORITY: i64 = 4;

/// First non-empty string among `fields`, in order.
pub fn first_non_empty<'a>(item: &'a WireItem, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .filter_map(|f| item.get(*f).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Strip HTML tags/entities and collapse whitespace. Wire bodies arrive with
/// markup leftovers from the agency CMS.
pub fn clean_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

/// Wire ids are usually strings ("aa:text:20250110:38701") but picture items
/// occasionally carry bare numbers.
pub fn wire_id(item: &WireItem) -> Option<String> {
    match item.get("id") {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub fn parse_priority(item: &WireItem) -> i64 {
    match item.get("priority") {
        Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(DEFAULT_PRIORITY),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(DEFAULT_PRIORITY),
        _ => DEFAULT_PRIORITY,
    }
}

/// The wire's `date` is ISO-ish but not reliably RFC3339; try the shapes seen
/// in real payloads before giving up.
pub fn parse_wire_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0)?));
    }
    None
}

fn string_list(item: &WireItem, field: &str) -> Vec<String> {
    match item.get(field) {
        Some(serde_json::Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
        Some(serde_json::Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Natural key: `{categoryName}:{kind}:{YYYYMMDD}:{wireId}`. Items without a
/// wire id get a timestamped random key instead and are flagged degenerate;
/// that path is never deduplicable.
pub fn natural_key(
    category: Category,
    kind: ArticleKind,
    date: Option<DateTime<Utc>>,
    id: Option<&str>,
    now: DateTime<Utc>,
) -> (String, bool) {
    match id {
        Some(id) => {
            let stamp = date.unwrap_or(now).format("%Y%m%d");
            (
                format!("{}:{}:{}:{}", category.name(), kind.code(), stamp, id),
                false,
            )
        }
        None => {
            let suffix: String = rand::rng()
                .sample_iter(&Alphanumeric)
                .take(6)
                .map(char::from)
                .collect();
            (
                format!("{}_{}_{}", category.name(), now.timestamp_millis(), suffix),
                true,
            )
        }
    }
}

/// Normalize one wire item under its requesting category.
pub fn normalize_item(item: &WireItem, category: Category, now: DateTime<Utc>) -> NormalizedArticle {
    let kind = first_non_empty(item, &["type"])
        .map(ArticleKind::from_wire)
        .unwrap_or(ArticleKind::Text);

    let date = first_non_empty(item, &["date"]).and_then(parse_wire_date);
    let id = wire_id(item);
    let (key, degenerate) = natural_key(category, kind, date, id.as_deref(), now);

    let title = first_non_empty(item, TITLE_FIELDS)
        .map(clean_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| FALLBACK_TITLE.to_string());
    let brief = first_non_empty(item, BRIEF_FIELDS)
        .map(clean_text)
        .unwrap_or_default();
    let content = first_non_empty(item, CONTENT_FIELDS)
        .map(clean_text)
        .unwrap_or_default();

    NormalizedArticle {
        natural_key: key,
        title,
        brief,
        content,
        category: category.name().to_string(),
        category_code: category.code(),
        priority: parse_priority(item),
        kind,
        publish_date: date.unwrap_or(now),
        url: first_non_empty(item, &["url"]).unwrap_or_default().to_string(),
        images: string_list(item, "images"),
        tags: string_list(item, "tags"),
        location: first_non_empty(item, &["location"])
            .unwrap_or_default()
            .to_string(),
        source: "wire".to_string(),
        original_payload: Some(item.clone()),
        degenerate,
    }
}
