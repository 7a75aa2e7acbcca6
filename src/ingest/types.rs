// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One raw item from the AA search endpoint. Field names and presence vary
/// by content type (text/picture/video), so the payload stays opaque JSON and
/// is read through the ordered-fallback resolvers in `normalize`.
pub type WireItem = serde_json::Value;

/// Wire content kinds and their numeric codes as used by the AA API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArticleKind {
    Text = 1,
    Picture = 2,
    Video = 3,
}

impl ArticleKind {
    /// Free-text `type` field from the wire; anything unrecognized is text.
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "picture" => ArticleKind::Picture,
            "video" => ArticleKind::Video,
            _ => ArticleKind::Text,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ArticleKind::Text),
            2 => Some(ArticleKind::Picture),
            3 => Some(ArticleKind::Video),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }
}

// The admin dashboard and the legacy store both carry the numeric code, so
// the kind serializes as 1/2/3 rather than a string.
impl Serialize for ArticleKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for ArticleKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = serde_json::Value::deserialize(deserializer)?;
        match &v {
            serde_json::Value::Number(n) => n
                .as_i64()
                .and_then(ArticleKind::from_code)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown kind code {n}"))),
            serde_json::Value::String(s) => Ok(ArticleKind::from_wire(s)),
            other => Err(serde::de::Error::custom(format!(
                "kind must be a code or a string, got {other}"
            ))),
        }
    }
}

/// Fixed category table of the wire API. Codes outside the table are kept
/// observable via `Unknown` instead of being silently renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Genel,
    Spor,
    Ekonomi,
    Saglik,
    BilimTeknoloji,
    Politika,
    KulturSanat,
    Unknown(i64),
}

impl Category {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Category::Genel,
            2 => Category::Spor,
            3 => Category::Ekonomi,
            4 => Category::Saglik,
            5 => Category::BilimTeknoloji,
            6 => Category::Politika,
            7 => Category::KulturSanat,
            other => Category::Unknown(other),
        }
    }

    /// Slug used in natural keys and in the stored record. Unknown codes fall
    /// back to the generic desk.
    pub fn name(self) -> &'static str {
        match self {
            Category::Genel => "genel",
            Category::Spor => "spor",
            Category::Ekonomi => "ekonomi",
            Category::Saglik => "saglik",
            Category::BilimTeknoloji => "bilim-teknoloji",
            Category::Politika => "politika",
            Category::KulturSanat => "kultur-sanat",
            Category::Unknown(_) => "genel",
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Category::Genel => 1,
            Category::Spor => 2,
            Category::Ekonomi => 3,
            Category::Saglik => 4,
            Category::BilimTeknoloji => 5,
            Category::Politika => 6,
            Category::KulturSanat => 7,
            Category::Unknown(code) => code,
        }
    }
}

/// Canonical article record produced by the normalizer. `natural_key` is the
/// dedup/upsert key across runs; `degenerate` marks the no-wire-id key path
/// that must never deduplicate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedArticle {
    pub natural_key: String,
    pub title: String,
    pub brief: String,
    pub content: String,
    pub category: String,
    pub category_code: i64,
    pub priority: i64,
    #[serde(rename = "type")]
    pub kind: ArticleKind,
    pub publish_date: DateTime<Utc>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub location: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_payload: Option<serde_json::Value>,
    #[serde(skip)]
    pub degenerate: bool,
}

impl NormalizedArticle {
    /// Category-independent portion of the natural key (`kind:datestamp:id`).
    /// The same story surfaced under two desks shares this identity even
    /// though the desks produce different natural keys.
    pub fn dedup_identity(&self) -> &str {
        self.natural_key
            .split_once(':')
            .map(|(_, rest)| rest)
            .unwrap_or(&self.natural_key)
    }
}

/// Persistence policy on a natural-key collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    /// Replace the stored record's fields (default).
    Overwrite,
    /// Leave the stored record untouched.
    Skip,
}

impl SaveMode {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" | "insert-only" | "keep" => SaveMode::Skip,
            _ => SaveMode::Overwrite,
        }
    }
}

/// One search request against the wire, scoped to a single category.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub category: i64,
    pub start_date: DateTime<Utc>,
    /// `None` is sent as the literal "NOW" the wire expects.
    pub end_date: Option<DateTime<Utc>>,
    pub keywords: Option<String>,
    pub language: String,
    pub limit: u32,
}

/// Seam to the AA search endpoint so the pipeline and the HTTP surface are
/// testable without a live wire.
#[async_trait::async_trait]
pub trait WireApi: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<WireItem>>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_wire_defaults_to_text() {
        assert_eq!(ArticleKind::from_wire("picture"), ArticleKind::Picture);
        assert_eq!(ArticleKind::from_wire("VIDEO"), ArticleKind::Video);
        assert_eq!(ArticleKind::from_wire("gallery"), ArticleKind::Text);
        assert_eq!(ArticleKind::from_wire(""), ArticleKind::Text);
    }

    #[test]
    fn kind_serializes_as_code() {
        let v = serde_json::to_value(ArticleKind::Video).unwrap();
        assert_eq!(v, serde_json::json!(3));
        let k: ArticleKind = serde_json::from_value(serde_json::json!("picture")).unwrap();
        assert_eq!(k, ArticleKind::Picture);
        let k: ArticleKind = serde_json::from_value(serde_json::json!(1)).unwrap();
        assert_eq!(k, ArticleKind::Text);
    }

    #[test]
    fn unknown_category_keeps_code_but_falls_back_in_name() {
        let c = Category::from_code(42);
        assert_eq!(c, Category::Unknown(42));
        assert_eq!(c.name(), "genel");
        assert_eq!(c.code(), 42);
    }

    #[test]
    fn save_mode_parse_is_lenient() {
        assert_eq!(SaveMode::parse("skip"), SaveMode::Skip);
        assert_eq!(SaveMode::parse("OVERWRITE"), SaveMode::Overwrite);
        assert_eq!(SaveMode::parse("whatever"), SaveMode::Overwrite);
    }
}
