//! Configuration for flipledger.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (FLIPLEDGER_HOME, FLIPLEDGER_API_KEY,
//!    FLIPLEDGER_API_URL, FLIPLEDGER_MODEL)
//! 2. Config file (.flipledger/config.yaml)
//! 3. Defaults (~/.flipledger)
//!
//! Config file discovery:
//! - Searches current directory and parents for .flipledger/config.yaml
//! - `paths.home` is relative to the .flipledger/ directory

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::adapters::transcriber::DEFAULT_TRANSCRIPTION_MODEL;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Identity reported for our own foreground window
pub const DEFAULT_OWN_IDENTITY: &str = "com.flipledger.app";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub capture: Option<CaptureConfig>,
    #[serde(default)]
    pub foreground: Option<ForegroundConfig>,
    #[serde(default)]
    pub ledger: Option<LedgerConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .flipledger/)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub transcription_model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    pub single_save_local: Option<bool>,
    pub bulk_save_multi: Option<bool>,
    pub book_name: Option<String>,
    pub own_identity: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForegroundConfig {
    /// Privilege wrapper prepended to the foreground query, e.g. `["su", "-c"]`
    #[serde(default)]
    pub wrapper: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Program that opens ledger URLs; defaults to the platform opener
    pub opener: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to flipledger home (settings, bills)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub llm: LlmSettings,
    pub capture: CaptureSettings,
    /// Empty means an unprivileged `sh -c`
    pub foreground_wrapper: Vec<String>,
    pub ledger_opener: Option<(String, Vec<String>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub transcription_model: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub single_save_local: bool,
    pub bulk_save_multi: bool,
    pub book_name: Option<String>,
    pub own_identity: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            single_save_local: false,
            bulk_save_multi: false,
            book_name: None,
            own_identity: DEFAULT_OWN_IDENTITY.to_string(),
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".flipledger").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
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

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Merge env overrides over the file's llm section
fn resolve_llm(file: Option<&LlmConfig>) -> LlmSettings {
    let defaults = LlmSettings::default();
    LlmSettings {
        api_key: env_var("FLIPLEDGER_API_KEY").or_else(|| file.and_then(|l| l.api_key.clone())),
        base_url: env_var("FLIPLEDGER_API_URL")
            .or_else(|| file.and_then(|l| l.base_url.clone()))
            .unwrap_or(defaults.base_url),
        model: env_var("FLIPLEDGER_MODEL")
            .or_else(|| file.and_then(|l| l.model.clone()))
            .unwrap_or(defaults.model),
        transcription_model: file
            .and_then(|l| l.transcription_model.clone())
            .unwrap_or(defaults.transcription_model),
    }
}

fn resolve_capture(file: Option<&CaptureConfig>) -> CaptureSettings {
    let defaults = CaptureSettings::default();
    match file {
        Some(c) => CaptureSettings {
            single_save_local: c.single_save_local.unwrap_or(defaults.single_save_local),
            bulk_save_multi: c.bulk_save_multi.unwrap_or(defaults.bulk_save_multi),
            book_name: c.book_name.clone().filter(|b| !b.trim().is_empty()),
            own_identity: c.own_identity.clone().unwrap_or(defaults.own_identity),
        },
        None => defaults,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".flipledger");

    let config_file = find_config_file();
    let parsed = match config_file {
        Some(ref config_path) => Some(load_config_file(config_path)?),
        None => None,
    };

    let home = if let Some(env_home) = env_var("FLIPLEDGER_HOME") {
        PathBuf::from(env_home)
    } else if let (Some(config_path), Some(home_path)) = (
        config_file.as_ref(),
        parsed.as_ref().and_then(|c| c.paths.home.as_ref()),
    ) {
        let dot_dir = config_path.parent().unwrap_or(Path::new("."));
        resolve_path(dot_dir, home_path)
    } else {
        default_home
    };

    let llm = resolve_llm(parsed.as_ref().and_then(|c| c.llm.as_ref()));
    let capture = resolve_capture(parsed.as_ref().and_then(|c| c.capture.as_ref()));
    let foreground_wrapper = parsed
        .as_ref()
        .and_then(|c| c.foreground.as_ref())
        .map(|f| f.wrapper.clone())
        .unwrap_or_default();
    let ledger_opener = parsed
        .as_ref()
        .and_then(|c| c.ledger.as_ref())
        .and_then(|l| l.opener.clone().map(|o| (o, l.args.clone())));

    Ok(ResolvedConfig {
        home,
        config_file,
        llm,
        capture,
        foreground_wrapper,
        ledger_opener,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
