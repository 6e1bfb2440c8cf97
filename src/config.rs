//! Configuration for agencyflow.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (GEMINI_API_KEY, AGENCYFLOW_*)
//! 2. Config file (.agencyflow/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .agencyflow/config.yaml
//! - Falls back to ~/.agencyflow/config.yaml
//! - `metrics_path` in the config file is relative to the project root
//!   (the directory containing .agencyflow/)

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::gemini::DEFAULT_BASE_URL;
use crate::core::{InputLimits, RetryPolicy};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 12;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

const CONFIG_DIR: &str = ".agencyflow";
const CONFIG_FILE: &str = "config.yaml";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub gemini: GeminiSection,
    #[serde(default)]
    pub rate_limit: RateLimitSection,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    #[serde(default)]
    pub limits: Option<InputLimits>,
    pub metrics_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiSection {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimitSection {
    pub requests_per_minute: Option<u32>,
}

/// Generation service settings
#[derive(Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl GeminiSettings {
    /// The API key, or an error naming how to provide it
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => anyhow::bail!(
                "GEMINI_API_KEY is not set (export it or add gemini.api_key to {}/{})",
                CONFIG_DIR,
                CONFIG_FILE
            ),
        }
    }
}

impl fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub gemini: GeminiSettings,
    /// Token bucket capacity per 60 seconds
    pub requests_per_minute: u32,
    pub retry: RetryPolicy,
    pub limits: InputLimits,
    /// Metrics dataset override; the bundled dataset is used when unset
    pub metrics_path: Option<PathBuf>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl fmt::Display for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.gemini.api_key.is_some() {
            "[REDACTED]"
        } else {
            "(not set)"
        };
        writeln!(
            f,
            "Config file:      {}",
            self.config_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string())
        )?;
        writeln!(f, "API key:          {}", key)?;
        writeln!(f, "Model:            {}", self.gemini.model)?;
        writeln!(f, "API base:         {}", self.gemini.base_url)?;
        writeln!(f, "Request timeout:  {}s", self.gemini.request_timeout.as_secs())?;
        writeln!(f, "Rate limit:       {} requests/min", self.requests_per_minute)?;
        writeln!(
            f,
            "Retry:            {} attempts, {}ms base, {}ms max",
            self.retry.max_attempts, self.retry.base_delay_ms, self.retry.max_delay_ms
        )?;
        writeln!(f, "Max upload:       {} bytes", self.limits.max_upload_bytes)?;
        write!(
            f,
            "Metrics:          {}",
            self.metrics_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(bundled sample)".to_string())
        )
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Project config first, then the per-user one
fn discover_config_file(start: &Path) -> Option<PathBuf> {
    find_config_file(start).or_else(|| {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
            .filter(|path| path.exists())
    })
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Environment lookup, abstracted so tests don't touch the process env
trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Merge the config file (if any) with environment overrides
fn resolve(config_file: Option<PathBuf>, env: &dyn Env) -> Result<ResolvedConfig> {
    let file = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    // Project root is the parent of .agencyflow/
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));

    let gemini = GeminiSettings {
        api_key: env.var("GEMINI_API_KEY").or(file.gemini.api_key),
        model: env
            .var("AGENCYFLOW_MODEL")
            .or(file.gemini.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        base_url: env
            .var("AGENCYFLOW_API_BASE")
            .or(file.gemini.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        request_timeout: Duration::from_secs(
            file.gemini
                .request_timeout_seconds
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        ),
    };

    let requests_per_minute = match env.var("AGENCYFLOW_RPM_LIMIT") {
        Some(value) => value
            .trim()
            .parse::<u32>()
            .with_context(|| {
                format!("AGENCYFLOW_RPM_LIMIT must be a positive integer, got '{}'", value)
            })?,
        None => file
            .rate_limit
            .requests_per_minute
            .unwrap_or(DEFAULT_REQUESTS_PER_MINUTE),
    };
    if requests_per_minute == 0 {
        anyhow::bail!("Rate limit must be at least 1 request per minute");
    }

    let metrics_path = match env.var("AGENCYFLOW_METRICS") {
        Some(path) => Some(PathBuf::from(path)),
        None => file.metrics_path.as_deref().map(|p| resolve_path(base_dir, p)),
    };

    let retry = file.retry.unwrap_or_default();
    retry.validate().context("Invalid retry settings")?;

    Ok(ResolvedConfig {
        gemini,
        requests_per_minute,
        retry,
        limits: file.limits.unwrap_or_default(),
        metrics_path,
        config_file,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    resolve(discover_config_file(&cwd), &ProcessEnv)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
