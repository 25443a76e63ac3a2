//! Configuration for the node dispatch client

pub mod file;

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::dispatch::DispatchTimeouts;
use crate::{Error, Result};

use file::NodesConfigFile;

/// Gateway URL used when none is configured
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:18789";

/// Resolved client configuration
///
/// Precedence, lowest to highest: built-in defaults, the TOML overlay file,
/// environment variables, CLI flags (applied by the binary).
#[derive(Debug, Clone)]
pub struct Config {
    /// Gateway base URL
    pub gateway_url: String,

    /// Bearer token for gateway authentication
    pub gateway_token: Option<SecretString>,

    /// Agent identity commands run under
    pub agent_id: String,

    /// Per-call deadlines for the dispatch pipeline
    pub timeouts: DispatchTimeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            gateway_token: None,
            agent_id: crate::dispatch::DEFAULT_AGENT_ID.to_string(),
            timeouts: DispatchTimeouts::default(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then the TOML overlay, then environment
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the resolved gateway URL does not
    /// parse.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        config.apply_file(&file::load_config_file());
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Overlay a parsed config file onto this configuration
    pub fn apply_file(&mut self, overlay: &NodesConfigFile) {
        if let Some(url) = &overlay.gateway.url {
            self.gateway_url.clone_from(url);
        }
        if let Some(token) = &overlay.gateway.token {
            self.gateway_token = Some(token.clone().into());
        }
        if let Some(agent) = &overlay.dispatch.agent {
            self.agent_id.clone_from(agent);
        }
        if let Some(ms) = overlay.dispatch.list_timeout_ms {
            self.timeouts.list = Duration::from_millis(ms);
        }
        if let Some(ms) = overlay.dispatch.invoke_timeout_ms {
            self.timeouts.invoke = Duration::from_millis(ms);
        }
        if let Some(ms) = overlay.dispatch.policy_timeout_ms {
            self.timeouts.policy = Duration::from_millis(ms);
        }
        if let Some(ms) = overlay.dispatch.approval_timeout_ms {
            self.timeouts.approval = Duration::from_millis(ms);
        }
    }

    /// Overlay environment variables onto this configuration
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("BEACON_NODES_GATEWAY_URL") {
            self.gateway_url = url;
        }
        if let Ok(token) = std::env::var("BEACON_NODES_GATEWAY_TOKEN") {
            self.gateway_token = Some(token.into());
        }
        if let Ok(agent) = std::env::var("BEACON_NODES_AGENT") {
            self.agent_id = agent;
        }
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the gateway URL does not parse.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.gateway_url)
            .map_err(|e| Error::Config(format!("invalid gateway url {:?}: {e}", self.gateway_url)))?;
        Ok(())
    }
}
