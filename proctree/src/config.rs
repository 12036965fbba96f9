//! proctree configuration loading and parsing

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/proctree/config.toml";
pub const CONFIG_ENV: &str = "PROCTREE_CONFIG";

/// Root configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct ProctreeConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub proc: ProcConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub signals: SignalsConfig,
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProcConfig {
    #[serde(default = "default_proc_root")]
    pub root: PathBuf,
}

impl Default for ProcConfig {
    fn default() -> Self {
        Self {
            root: default_proc_root(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    /// Pid at which every parent chain ends
    #[serde(default = "default_init_pid")]
    pub init_pid: u32,
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            init_pid: default_init_pid(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignalsConfig {
    #[serde(default = "default_terminate")]
    pub terminate: String,
    #[serde(default = "default_stop")]
    pub stop: String,
    #[serde(default = "default_resume", rename = "continue")]
    pub resume: String,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            terminate: default_terminate(),
            stop: default_stop(),
            resume: default_resume(),
        }
    }
}

// Default value functions
fn default_log_level() -> String { "warn".into() }
fn default_proc_root() -> PathBuf { PathBuf::from("/proc") }
fn default_init_pid() -> u32 { 1 }
fn default_terminate() -> String { "SIGKILL".into() }
fn default_stop() -> String { "SIGSTOP".into() }
fn default_resume() -> String { "SIGCONT".into() }

/// Config file location: explicit path, then `$PROCTREE_CONFIG`, then the default.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
    }
}

/// Load configuration from `path`, falling back to defaults if it does not exist.
pub fn load_config(path: &Path) -> Result<ProctreeConfig> {
    if !path.exists() {
        return Ok(ProctreeConfig::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    parse_config(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<ProctreeConfig> {
    Ok(toml::from_str(content)?)
}
