//! Approval policy documents
//!
//! The gateway stores one policy file per host class. Defaults apply to
//! every agent; per-agent overrides overlay individual fields. The core
//! treats the resolved policy as read-only input, loaded fresh per dispatch.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether command gating is enabled at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityMode {
    /// No gating; every command is implicitly authorized
    Off,
    /// Commands are gated against the allowlist and the ask mode
    #[default]
    Allowlist,
}

/// When to ask a human before running a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AskMode {
    /// Never prompt
    #[default]
    Off,
    /// Prompt only when the command is not pre-authorized by the allowlist
    OnMiss,
    /// Always prompt
    Always,
}

/// Decision applied when an approval round trip cannot be completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AskFallback {
    Allow,
    #[default]
    Deny,
}

/// Outcome of an approval round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalDecision {
    /// Approved for this dispatch only
    AllowOnce,
    /// Approved and remembered by the gateway
    AllowAlways,
    Deny,
}

impl ApprovalDecision {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllowOnce => "allow-once",
            Self::AllowAlways => "allow-always",
            Self::Deny => "deny",
        }
    }

    /// Whether this decision authorizes the dispatch
    #[must_use]
    pub const fn allows(self) -> bool {
        !matches!(self, Self::Deny)
    }
}

impl fmt::Display for ApprovalDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resolved rule set: what gating applies and how to ask
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRules {
    #[serde(default)]
    pub security: SecurityMode,

    #[serde(default)]
    pub ask: AskMode,

    #[serde(default)]
    pub ask_fallback: AskFallback,

    /// Pre-authorized command strings; exact, or prefix when the entry ends
    /// with `*`
    #[serde(default)]
    pub allowlist: Vec<String>,
}

impl PolicyRules {
    /// Whether `command` is pre-authorized by the allowlist
    #[must_use]
    pub fn allowlisted(&self, command: &str) -> bool {
        self.allowlist.iter().any(|entry| {
            entry
                .strip_suffix('*')
                .map_or_else(|| entry == command, |prefix| command.starts_with(prefix))
        })
    }
}

/// Per-agent overlay; unset fields inherit the defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyOverride {
    pub security: Option<SecurityMode>,
    pub ask: Option<AskMode>,
    pub ask_fallback: Option<AskFallback>,
    pub allowlist: Option<Vec<String>>,
}

/// The policy document returned by `exec.approvals.node.get`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyFile {
    #[serde(default)]
    pub version: u32,

    #[serde(default)]
    pub defaults: PolicyRules,

    #[serde(default)]
    pub agents: HashMap<String, PolicyOverride>,
}

impl PolicyFile {
    /// Effective policy for an agent: defaults overlaid field-by-field with
    /// the agent's override
    #[must_use]
    pub fn resolve(&self, agent_id: &str) -> PolicyRules {
        let mut rules = self.defaults.clone();
        if let Some(over) = self.agents.get(agent_id) {
            if let Some(security) = over.security {
                rules.security = security;
            }
            if let Some(ask) = over.ask {
                rules.ask = ask;
            }
            if let Some(ask_fallback) = over.ask_fallback {
                rules.ask_fallback = ask_fallback;
            }
            if let Some(allowlist) = &over.allowlist {
                rules.allowlist.clone_from(allowlist);
            }
        }
        rules
    }
}
