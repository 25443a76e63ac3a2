//! TOML configuration file loading
//!
//! Supports `~/.config/omni/beacon-nodes/config.toml` as a persistent config
//! source. All fields are optional — the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct NodesConfigFile {
    /// Gateway connection
    #[serde(default)]
    pub gateway: GatewayFileConfig,

    /// Dispatch behavior
    #[serde(default)]
    pub dispatch: DispatchFileConfig,
}

/// Gateway connection configuration
#[derive(Debug, Default, Deserialize)]
pub struct GatewayFileConfig {
    /// Gateway base URL (e.g. `http://127.0.0.1:18789`)
    pub url: Option<String>,

    /// Bearer token for gateway authentication
    pub token: Option<String>,
}

/// Dispatch behavior configuration
#[derive(Debug, Default, Deserialize)]
pub struct DispatchFileConfig {
    /// Agent identity commands run under
    pub agent: Option<String>,

    /// `node.list` timeout
    pub list_timeout_ms: Option<u64>,

    /// `node.invoke` timeout (prepare and run)
    pub invoke_timeout_ms: Option<u64>,

    /// Policy fetch timeout
    pub policy_timeout_ms: Option<u64>,

    /// Bound on the interactive approval round trip
    pub approval_timeout_ms: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `NodesConfigFile::default()` if the file doesn't exist or can't
/// be parsed.
#[must_use]
pub fn load_config_file() -> NodesConfigFile {
    let Some(path) = config_file_path() else {
        return NodesConfigFile::default();
    };
    load_config_file_from(&path)
}

/// Load a TOML config file from an explicit path, warn-and-default on error
#[must_use]
pub fn load_config_file_from(path: &Path) -> NodesConfigFile {
    if !path.exists() {
        return NodesConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                NodesConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            NodesConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/omni/beacon-nodes/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("omni")
            .join("beacon-nodes")
            .join("config.toml")
    })
}
