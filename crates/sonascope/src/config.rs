//! Config file discovery, loading, and environment variable overlay.

use form_analysis::AnalysisParams;
use form_enhance::EnhanceConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    pub http_port: u16,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self { http_port: 5712 }
    }
}

/// Service configuration: bind address, analysis parameters, and the
/// optional enhancement backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: BindConfig,
    pub analysis: AnalysisParams,
    pub enhance: Option<EnhanceConfig>,
}

/// Locate the highest-priority config file that exists.
///
/// Priority: CLI override, `sonascope.toml` in the working directory, the
/// user config dir, `/etc/sonascope/config.toml`.
pub fn discover_config_file(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }

    let local = PathBuf::from("sonascope.toml");
    if local.exists() {
        return Some(local);
    }

    if let Some(dirs) = directories::BaseDirs::new() {
        let user = dirs.config_dir().join("sonascope/config.toml");
        if user.exists() {
            return Some(user);
        }
    }

    let system = PathBuf::from("/etc/sonascope/config.toml");
    if system.exists() {
        return Some(system);
    }

    None
}

/// Load configuration, then overlay `SONASCOPE_*` environment variables.
pub fn load(cli_path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let mut config = match discover_config_file(cli_path) {
        Some(path) => load_from_file(&path)?,
        None => ServerConfig::default(),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

pub fn load_from_file(path: &Path) -> Result<ServerConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn apply_env_overrides(config: &mut ServerConfig) {
    if let Ok(port) = std::env::var("SONASCOPE_HTTP_PORT") {
        if let Ok(port) = port.parse() {
            config.bind.http_port = port;
        }
    }

    if let Ok(endpoint) = std::env::var("SONASCOPE_ENHANCE_URL") {
        let enhance = config.enhance.get_or_insert_with(EnhanceConfig::default);
        enhance.endpoint = endpoint;
    }

    if let Ok(key) = std::env::var("SONASCOPE_ENHANCE_API_KEY") {
        if let Some(enhance) = config.enhance.as_mut() {
            enhance.api_key = Some(key);
        }
    }
}
