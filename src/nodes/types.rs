//! Fleet snapshot types
//!
//! Nodes are immutable point-in-time snapshots produced by a fleet listing
//! call. They are re-fetched, never mutated in place.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Node operating platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Platform {
    Macos,
    Ios,
    Android,
    Linux,
    Windows,
    /// A platform this client does not know about yet
    Other(String),
}

impl Platform {
    /// Wire name of the platform
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Macos => "macos",
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::Other(name) => name,
        }
    }

    /// Whether this platform is a desktop environment
    #[must_use]
    pub const fn is_desktop(&self) -> bool {
        matches!(self, Self::Macos | Self::Linux | Self::Windows)
    }
}

impl From<String> for Platform {
    fn from(value: String) -> Self {
        match value.as_str() {
            "macos" => Self::Macos,
            "ios" => Self::Ios,
            "android" => Self::Android,
            "linux" => Self::Linux,
            "windows" => Self::Windows,
            _ => Self::Other(value),
        }
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in the fleet listing: identity plus capability snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique node id, resolved by case-sensitive exact match
    pub node_id: String,

    #[serde(default)]
    pub display_name: Option<String>,

    pub platform: Platform,

    /// Capability tags (audio, display, ...)
    #[serde(default)]
    pub caps: Vec<String>,

    /// Advertised command set. A hint, not a guarantee: nodes have been
    /// observed omitting commands they do run, or declaring none at all.
    #[serde(default)]
    pub commands: Vec<String>,

    #[serde(default)]
    pub connected: bool,

    /// Granted capability permissions (e.g. `screenRecording`)
    #[serde(default)]
    pub permissions: HashMap<String, bool>,
}

impl Node {
    /// Whether the node's advertised command set contains `command`
    #[must_use]
    pub fn advertises(&self, command: &str) -> bool {
        self.commands.iter().any(|c| c == command)
    }

    /// Granted state of a permission key, if the node reported it
    #[must_use]
    pub fn permission_granted(&self, key: &str) -> Option<bool> {
        self.permissions.get(key).copied()
    }

    /// Human-facing label: display name when present, node id otherwise
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.node_id)
    }
}
