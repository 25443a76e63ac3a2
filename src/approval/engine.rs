//! Approval engine gating node invocations
//!
//! One pass per dispatch:
//!
//! ```text
//! PolicyUnresolved ──▶ PolicyResolved ──▶ Skipped ───────────────▶ Authorized
//!                            │
//!                            └──▶ RequestSent ──▶ DecisionReceived ─▶ Authorized | Rejected
//!                                      │
//!                                      └─ round trip failed ─▶ askFallback ─▶ Authorized | Rejected
//! ```
//!
//! Approval is resolved at most once per dispatch. A deny is terminal: the
//! dispatcher sends nothing to the node afterwards.

use std::time::Duration;

use crate::dispatch::CommandRequest;
use crate::gateway::GatewayClient;
use crate::gateway::types::{ApprovalRequestParams, NODE_HOST};
use crate::planner::CommandPlan;
use crate::{Error, Result};

use super::policy::{ApprovalDecision, AskFallback, AskMode, SecurityMode};

/// How a dispatch came to be authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// Policy did not require an approval round trip
    Implicit,
    /// An explicit decision authorized the dispatch
    Decided(ApprovalDecision),
    /// The round trip could not be completed and policy fallback allowed it
    FallbackAllow,
}

impl Authorization {
    /// The explicit decision value, for the node-side audit trail
    #[must_use]
    pub const fn decision(self) -> Option<ApprovalDecision> {
        match self {
            Self::Decided(decision) => Some(decision),
            Self::Implicit | Self::FallbackAllow => None,
        }
    }
}

/// Whether policy requires a human round trip for this command
#[must_use]
pub fn approval_required(security: SecurityMode, ask: AskMode, allowlisted: bool) -> bool {
    if security == SecurityMode::Off {
        return false;
    }
    match ask {
        AskMode::Off => false,
        AskMode::Always => true,
        AskMode::OnMiss => !allowlisted,
    }
}

/// Resolves policy and runs the approval round trip
#[derive(Debug, Clone)]
pub struct ApprovalEngine {
    gateway: GatewayClient,
    policy_timeout: Duration,
    /// Bound on the human round trip; `askFallback` applies on expiry
    approval_timeout: Duration,
}

impl ApprovalEngine {
    #[must_use]
    pub const fn new(
        gateway: GatewayClient,
        policy_timeout: Duration,
        approval_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            policy_timeout,
            approval_timeout,
        }
    }

    /// Gate a planned command for `request`
    ///
    /// Resolves the effective policy for the requesting agent, asks when the
    /// policy says to, and interprets the decision. The request's ask-mode
    /// override (CLI flag) replaces the resolved ask mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApprovalDenied`] on an explicit deny, or when the
    /// round trip cannot be completed and the policy fallback is deny.
    /// Policy-fetch failures propagate as-is.
    pub async fn authorize(
        &self,
        request: &CommandRequest,
        plan: &CommandPlan,
    ) -> Result<Authorization> {
        let file = self.gateway.node_approval_policy(self.policy_timeout).await?;
        let rules = file.resolve(&request.agent_id);
        let ask = request.ask_override.unwrap_or(rules.ask);

        let command_line = request.command_line();
        if !approval_required(rules.security, ask, rules.allowlisted(&command_line)) {
            tracing::debug!(
                agent = %request.agent_id,
                command = %command_line,
                "approval not required, implicit allow"
            );
            return Ok(Authorization::Implicit);
        }

        let params = ApprovalRequestParams {
            command: command_line,
            command_argv: request.command_argv.clone(),
            host: NODE_HOST.to_string(),
            agent_id: request.agent_id.clone(),
            system_run_plan_v2: plan.approval_run_plan().cloned(),
        };

        match self
            .gateway
            .request_approval(&params, self.approval_timeout)
            .await
        {
            Ok(decision) if decision.allows() => {
                tracing::info!(
                    agent = %request.agent_id,
                    command = %params.command,
                    decision = %decision,
                    "approval granted"
                );
                Ok(Authorization::Decided(decision))
            }
            Ok(decision) => Err(Error::ApprovalDenied(format!(
                "agent {} was denied {:?} ({decision})",
                request.agent_id, params.command
            ))),
            Err(err) => self.apply_fallback(rules.ask_fallback, &err),
        }
    }

    /// The round trip itself failed; apply `askFallback`
    ///
    /// Both outcomes are logged at warn, distinct from an explicit human
    /// decision, so an operator can tell them apart in the audit trail.
    fn apply_fallback(&self, ask_fallback: AskFallback, err: &Error) -> Result<Authorization> {
        match ask_fallback {
            AskFallback::Allow => {
                tracing::warn!(
                    error = %err,
                    timeout = ?self.approval_timeout,
                    "approval round trip unavailable, policy fallback allows the command"
                );
                Ok(Authorization::FallbackAllow)
            }
            AskFallback::Deny => {
                tracing::warn!(
                    error = %err,
                    timeout = ?self.approval_timeout,
                    "approval round trip unavailable, policy fallback denies the command"
                );
                Err(Error::ApprovalDenied(format!(
                    "approval unavailable ({err}) and policy fallback is deny"
                )))
            }
        }
    }
}
