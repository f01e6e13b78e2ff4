//! TOML configuration for the viewer.
//!
//! Every section has defaults, so an empty file (or [`Config::minimal`]) is a
//! valid configuration pointing at a remote service on `localhost:8000`.
//!
//! ```toml
//! [source]
//! transport = "remote"            # or "static-snapshot"
//! base_url = "http://localhost:8000"
//! data_dir = "./data/derived"
//! timeout_secs = 30
//! max_retries = 2
//!
//! [listing]
//! page_size = 20
//! fetch_limit = 5000
//!
//! [query]
//! top_k = 8
//!
//! [server]
//! bind = "127.0.0.1:3000"
//! ```
//!
//! After the file is read, the environment variables `CVIEW_TRANSPORT`,
//! `CVIEW_API_BASE` and `CVIEW_DATA_DIR` override the matching `[source]`
//! keys.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const ENV_TRANSPORT: &str = "CVIEW_TRANSPORT";
pub const ENV_API_BASE: &str = "CVIEW_API_BASE";
pub const ENV_DATA_DIR: &str = "CVIEW_DATA_DIR";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Which backend the record fetcher talks to.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    /// HTTP content/retrieval service at `base_url`.
    #[default]
    #[serde(alias = "api")]
    Remote,
    /// Precomputed JSON files under `data_dir`.
    #[serde(alias = "static")]
    StaticSnapshot,
}

impl Transport {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "remote" | "api" => Ok(Transport::Remote),
            "static-snapshot" | "static" => Ok(Transport::StaticSnapshot),
            other => anyhow::bail!(
                "Unknown transport: '{}'. Must be remote or static-snapshot.",
                other
            ),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Remote => f.write_str("remote"),
            Transport::StaticSnapshot => f.write_str("static-snapshot"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default)]
    pub transport: Transport,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            base_url: default_base_url(),
            data_dir: default_data_dir(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/derived")
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListingConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// `limit` sent to `GET /pages`; the index view filters client-side.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

fn default_page_size() -> usize {
    20
}
fn default_fetch_limit() -> usize {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Config {
    /// All-defaults configuration, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Apply `CVIEW_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in
    /// production, a map in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(t) = lookup(ENV_TRANSPORT).filter(|v| !v.trim().is_empty()) {
            self.source.transport = Transport::parse(&t)?;
        }
        if let Some(base) = lookup(ENV_API_BASE).filter(|v| !v.trim().is_empty()) {
            self.source.base_url = base;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.source.data_dir = PathBuf::from(dir);
        }
        validate(self)
    }
}

/// Read and validate a config file. A missing file yields
/// [`Config::minimal`]; a file that exists but does not parse is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        Config::minimal()
    };
    config.apply_env()?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.listing.page_size == 0 {
        anyhow::bail!("listing.page_size must be > 0");
    }
    if config.listing.fetch_limit == 0 {
        anyhow::bail!("listing.fetch_limit must be > 0");
    }
    if !(1..=50).contains(&config.query.top_k) {
        anyhow::bail!("query.top_k must be in [1, 50]");
    }
    if config.source.timeout_secs == 0 {
        anyhow::bail!("source.timeout_secs must be > 0");
    }
    if config.source.transport == Transport::Remote {
        let base = config.source.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            anyhow::bail!(
                "source.base_url must start with http:// or https:// (got '{}')",
                base
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.source.transport, Transport::Remote);
        assert_eq!(cfg.source.base_url, "http://localhost:8000");
        assert_eq!(cfg.listing.page_size, 20);
        assert_eq!(cfg.query.top_k, 8);
    }

    #[test]
    fn parses_static_snapshot_transport() {
        let cfg = parse_config(
            r#"
[source]
transport = "static-snapshot"
data_dir = "/srv/derived"
"#,
        )
        .unwrap();
        assert_eq!(cfg.source.transport, Transport::StaticSnapshot);
        assert_eq!(cfg.source.data_dir, PathBuf::from("/srv/derived"));
    }

    #[test]
    fn rejects_zero_page_size() {
        let err = parse_config("[listing]\npage_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn rejects_top_k_out_of_range() {
        assert!(parse_config("[query]\ntop_k = 51\n").is_err());
        assert!(parse_config("[query]\ntop_k = 0\n").is_err());
    }

    #[test]
    fn rejects_unknown_transport() {
        assert!(parse_config("[source]\ntransport = \"carrier-pigeon\"\n").is_err());
    }

    #[test]
    fn overrides_win_over_file() {
        let mut cfg = parse_config("[source]\nbase_url = \"http://file:1\"\n").unwrap();
        let env: HashMap<&str, &str> = [
            (ENV_TRANSPORT, "static"),
            (ENV_API_BASE, "http://env:2"),
            (ENV_DATA_DIR, "/tmp/snap"),
        ]
        .into_iter()
        .collect();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.source.transport, Transport::StaticSnapshot);
        assert_eq!(cfg.source.base_url, "http://env:2");
        assert_eq!(cfg.source.data_dir, PathBuf::from("/tmp/snap"));
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let mut cfg = Config::minimal();
        cfg.apply_overrides(|_| Some("  ".to_string())).unwrap();
        assert_eq!(cfg.source.transport, Transport::Remote);
        assert_eq!(cfg.source.base_url, "http://localhost:8000");
    }

    #[test]
    fn missing_file_is_minimal() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg.listing.page_size, 20);
    }
}
