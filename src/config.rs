// src/config.rs
//
// Two configuration surfaces: wire credentials/tunables from the environment,
// and ingest defaults (which categories/priorities/kinds to pull when the
// trigger body leaves them out) from a TOML or JSON file with an env-var
// override path.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_DEFAULTS_PATH: &str = "INGEST_DEFAULTS_PATH";

/// The wire caps search results server-side; requests above this are clamped.
pub const MAX_RESULT_LIMIT: u32 = 100;

/// Delay between per-category wire calls unless overridden.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 500;

/// Credentials and tunables for the AA search endpoint.
#[derive(Debug, Clone)]
pub struct WireConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub request_delay: Duration,
    pub timeout: Duration,
}

impl WireConfig {
    /// Missing or blank credentials are fatal: no category fetch can succeed
    /// without them, so the run must not start.
    pub fn from_env() -> Result<Self> {
        let username = std::env::var("AA_API_USERNAME").unwrap_or_default();
        let password = std::env::var("AA_API_PASSWORD").unwrap_or_default();
        if username.trim().is_empty() || password.trim().is_empty() {
            return Err(anyhow!(
                "wire credentials missing: set AA_API_USERNAME and AA_API_PASSWORD"
            ));
        }

        let base_url = std::env::var("AA_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.aa.com.tr/abone".to_string());

        let delay_ms = env_u64("AA_REQUEST_DELAY_MS", DEFAULT_REQUEST_DELAY_MS)?;
        let timeout_secs = env_u64("AA_HTTP_TIMEOUT_SECS", 30)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
            request_delay: Duration::from_millis(delay_ms),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn env_u64(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{name} must be an integer, got '{v}'")),
        Err(_) => Ok(default),
    }
}

/// Filters applied when the trigger body omits them. The zero value of each
/// list means "allow everything", so an empty file is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestDefaults {
    pub categories: Vec<i64>,
    pub priorities: Vec<i64>,
    pub types: Vec<i64>,
    pub languages: Vec<String>,
    pub limit: u32,
}

impl Default for IngestDefaults {
    fn default() -> Self {
        Self {
            categories: vec![1, 2, 3, 4, 5, 6, 7],
            priorities: vec![1, 2, 3, 4],
            types: vec![1, 2, 3],
            languages: vec!["tr_TR".to_string()],
            limit: MAX_RESULT_LIMIT,
        }
    }
}

/// Load defaults from an explicit path. Supports TOML or JSON formats.
pub fn load_defaults_from(path: &Path) -> Result<IngestDefaults> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading ingest defaults from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_defaults(&content, ext.as_str())
}

/// Load defaults using env var + fallbacks:
/// 1) $INGEST_DEFAULTS_PATH
/// 2) config/ingest_defaults.toml
/// 3) config/ingest_defaults.json
/// 4) built-in defaults
pub fn load_defaults() -> Result<IngestDefaults> {
    if let Ok(p) = std::env::var(ENV_DEFAULTS_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_defaults_from(&pb);
        } else {
            return Err(anyhow!("INGEST_DEFAULTS_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/ingest_defaults.toml");
    if toml_p.exists() {
        return load_defaults_from(&toml_p);
    }
    let json_p = PathBuf::from("config/ingest_defaults.json");
    if json_p.exists() {
        return load_defaults_from(&json_p);
    }
    Ok(IngestDefaults::default())
}

fn parse_defaults(s: &str, hint_ext: &str) -> Result<IngestDefaults> {
    let try_toml = hint_ext == "toml" || s.contains('=');
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported ingest defaults format"))
}

fn parse_toml(s: &str) -> Result<IngestDefaults> {
    Ok(sanitize(toml::from_str(s)?))
}

fn parse_json(s: &str) -> Result<IngestDefaults> {
    Ok(sanitize(serde_json::from_str(s)?))
}

fn sanitize(mut d: IngestDefaults) -> IngestDefaults {
    for list in [&mut d.categories, &mut d.priorities, &mut d.types] {
        list.sort_unstable();
        list.dedup();
    }
    d.languages.retain(|l| !l.trim().is_empty());
    d.limit = d.limit.clamp(1, MAX_RESULT_LIMIT);
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn toml_and_json_both_parse() {
        let toml = r#"
categories = [3, 1, 1]
priorities = [1, 2]
limit = 500
"#;
        let out = parse_toml(toml).unwrap();
        assert_eq!(out.categories, vec![1, 3]);
        assert_eq!(out.priorities, vec![1, 2]);
        assert_eq!(out.limit, MAX_RESULT_LIMIT); // clamped
        // omitted fields keep the built-in defaults
        assert_eq!(out.types, vec![1, 2, 3]);

        let json = r#"{"categories": [2], "languages": ["tr_TR", " "]}"#;
        let out = parse_json(json).unwrap();
        assert_eq!(out.categories, vec![2]);
        assert_eq!(out.languages, vec!["tr_TR".to_string()]);
    }

    #[serial_test::serial]
    #[test]
    fn default_chain_uses_env_then_fallbacks() {
        // Isolate CWD so a real config/ dir in the repo can't interfere
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        env::remove_var(ENV_DEFAULTS_PATH);

        // No files in temp CWD → built-ins
        let v = load_defaults().unwrap();
        assert_eq!(v, IngestDefaults::default());

        // Env var takes precedence
        let p_json = tmp.path().join("ingest_defaults.json");
        std::fs::write(&p_json, r#"{"categories": [6]}"#).unwrap();
        env::set_var(ENV_DEFAULTS_PATH, p_json.display().to_string());
        let v2 = load_defaults().unwrap();
        assert_eq!(v2.categories, vec![6]);
        env::remove_var(ENV_DEFAULTS_PATH);

        env::set_current_dir(&old).unwrap();
    }

    #[serial_test::serial]
    #[test]
    fn wire_config_requires_credentials() {
        env::remove_var("AA_API_USERNAME");
        env::remove_var("AA_API_PASSWORD");
        assert!(WireConfig::from_env().is_err());

        env::set_var("AA_API_USERNAME", "abone");
        env::set_var("AA_API_PASSWORD", "parola");
        let cfg = WireConfig::from_env().unwrap();
        assert_eq!(cfg.request_delay, Duration::from_millis(DEFAULT_REQUEST_DELAY_MS));
        assert!(cfg.base_url.starts_with("https://"));
        env::remove_var("AA_API_USERNAME");
        env::remove_var("AA_API_PASSWORD");
    }
}
