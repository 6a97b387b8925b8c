use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable toggling the retry policy (`true`/`false`).
pub const ENV_USE_RETRY_POLICY: &str = "USE_RETRY_POLICY";
/// Environment variable overriding `retry.max_retries`.
pub const ENV_MAX_RETRIES: &str = "MAX_RETRIES";

/// Retry policy parameters (`[retry]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// When false every write gets exactly one attempt.
    pub enabled: bool,
    /// Retries allowed beyond the first attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff and jitter.
    pub base_delay_ms: u64,
    /// Ceiling in milliseconds for the exponential part of the backoff.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

/// Simulated partitioned backend (`[store]` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Number of physical partitions rows are hashed onto.
    pub partitions: usize,
    /// Provisioned request units per second, per partition; 0 disables throttling.
    pub request_units_per_sec: u32,
    /// Request units charged for one insert.
    pub write_cost: u32,
    /// Artificial latency added to every write.
    pub latency_ms: u64,
    /// Server-side write deadline; 0 disables it.
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            partitions: 4,
            request_units_per_sec: 100,
            write_cost: 10,
            latency_ms: 0,
            timeout_ms: 3_000,
        }
    }
}

/// Global configuration loaded from `~/.config/ordersink/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address the HTTP endpoint binds to.
    pub listen_addr: String,
    /// Per-request deadline in milliseconds for the HTTP endpoint; 0 = none.
    pub request_deadline_ms: u64,
    pub retry: RetryConfig,
    pub store: StoreConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            request_deadline_ms: 0,
            retry: RetryConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// Apply `USE_RETRY_POLICY` / `MAX_RETRIES` overrides from `lookup`.
    /// Unparseable values are errors rather than silently ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_USE_RETRY_POLICY).filter(|v| !v.is_empty()) {
            self.retry.enabled = parse_bool(&raw)
                .with_context(|| format!("invalid {ENV_USE_RETRY_POLICY}={raw:?}"))?;
        }
        if let Some(raw) = lookup(ENV_MAX_RETRIES).filter(|v| !v.is_empty()) {
            self.retry.max_retries = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {ENV_MAX_RETRIES}={raw:?}"))?;
        }
        Ok(())
    }
}

/// Accepts `1`/`0`, `t`/`f` and `true`/`false` in the usual casings.
fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("ordersink")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<AppConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = AppConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<AppConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: AppConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}

/// Load from `path` (or the XDG default) and apply environment overrides.
pub fn load(path: Option<&Path>) -> Result<AppConfig> {
    let mut cfg = match path {
        Some(p) => load_from_path(p)?,
        None => load_or_init()?,
    };
    cfg.apply_env_overrides(|key| std::env::var(key).ok())?;
    Ok(cfg)
}
