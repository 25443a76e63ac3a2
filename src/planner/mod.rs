//! Two-phase command planning with capability fallback
//!
//! Some command families stage a run plan on the node before executing it
//! (`prepare`, then `run`). Planning drives the prepare phase and decides
//! what the single gated `run` invocation will look like:
//!
//! ```text
//! Planning ──▶ PreparePending ──▶ PrepareSucceeded ──▶ RunPending
//!     │              │
//!     │              └─ capability rejection ──▶ PrepareFallback ──▶ RunPending
//!     └─ single-phase command ─────────────────────────────────────▶ RunPending
//! ```
//!
//! A node's advertised command set is advisory. An empty or absent set never
//! suppresses the prepare attempt — nodes have been observed running
//! commands they forgot to advertise — and the node's own rejection at
//! invocation time is the authoritative signal. The one shortcut taken: a
//! node that *does* declare its commands and omits the prepare phase will
//! have that prepare refused by the gateway's declared-set check before the
//! node ever sees it, so the planner synthesizes the same rejection locally
//! and saves the round trip.

pub mod fallback;

use std::time::Duration;

use serde_json::Value;

use crate::approval::ApprovalDecision;
use crate::commands;
use crate::dispatch::CommandRequest;
use crate::gateway::GatewayClient;
use crate::gateway::types::{InvokeCommandParams, NODE_HOST, NodeInvokeParams};
use crate::nodes::Node;
use crate::{Error, Result};

/// Static two-phase table: the prepare command for a command family
#[must_use]
pub fn prepare_command_for(command: &str) -> Option<&'static str> {
    match command {
        commands::SYSTEM_RUN => Some(commands::SYSTEM_RUN_PREPARE),
        _ => None,
    }
}

/// One gateway invocation the dispatcher will issue
#[derive(Debug, Clone)]
pub struct InvocationStep {
    pub command: String,
    pub command_argv: Vec<String>,
    pub raw_command: Option<String>,
    /// Structured plan returned by a successful prepare phase, forwarded on
    /// the run invocation
    pub run_plan: Option<Value>,
    /// Minted once per step. A retry of this step reuses it unchanged; a
    /// fallback step is a new attempt with a new key.
    pub idempotency_key: String,
}

impl InvocationStep {
    fn run_for(request: &CommandRequest, run_plan: Option<Value>) -> Self {
        Self {
            command: request.command.clone(),
            command_argv: request.command_argv.clone(),
            raw_command: request.raw_command.clone(),
            run_plan,
            idempotency_key: GatewayClient::idempotency_key(),
        }
    }

    fn prepare_for(request: &CommandRequest, prepare_command: &str) -> Self {
        Self {
            command: prepare_command.to_string(),
            command_argv: request.command_argv.clone(),
            raw_command: request.raw_command.clone(),
            run_plan: None,
            idempotency_key: GatewayClient::idempotency_key(),
        }
    }

    /// Build the full `node.invoke` parameter bag for this step
    ///
    /// `decision` is the explicit approval decision when one authorized the
    /// dispatch; it rides along in the node-side params for audit.
    #[must_use]
    pub fn invoke_params(
        &self,
        node: &Node,
        agent_id: &str,
        run_id: &str,
        decision: Option<ApprovalDecision>,
        duration_ms: Option<u64>,
    ) -> NodeInvokeParams {
        NodeInvokeParams {
            id: node.node_id.clone(),
            command: self.command.clone(),
            command_argv: self.command_argv.clone(),
            system_run_plan_v2: self.run_plan.clone(),
            host: NODE_HOST.to_string(),
            agent_id: agent_id.to_string(),
            params: InvokeCommandParams {
                command: self.command_argv.clone(),
                raw_command: self.raw_command.clone(),
                agent_id: agent_id.to_string(),
                approved: decision.map(|_| true),
                approval_decision: decision,
                run_id: run_id.to_string(),
                duration_ms,
            },
        }
    }
}

/// How the run step came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanShape {
    /// Single-phase from the start
    Direct,
    /// Prepare succeeded; the run carries the staged plan
    TwoPhase,
    /// Prepare was rejected for capability reasons; the run is a downgraded
    /// single phase
    Fallback,
}

/// The planner's decision: the gated run invocation plus its provenance
///
/// Plans are value objects. Fallback produced this plan fresh; nothing
/// edits a plan in place.
#[derive(Debug, Clone)]
pub struct CommandPlan {
    pub run: InvocationStep,
    pub shape: PlanShape,
}

impl CommandPlan {
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self.shape, PlanShape::Fallback)
    }

    /// Run-plan payload eligible for the approval request
    ///
    /// Only a live two-phase plan surfaces it: a fallback plan must never
    /// show run-plan details the node will not act on.
    #[must_use]
    pub const fn approval_run_plan(&self) -> Option<&Value> {
        match self.shape {
            PlanShape::TwoPhase => self.run.run_plan.as_ref(),
            PlanShape::Direct | PlanShape::Fallback => None,
        }
    }
}

/// Drives planning for one dispatch attempt
#[derive(Debug, Clone)]
pub struct Planner {
    gateway: GatewayClient,
    invoke_timeout: Duration,
}

impl Planner {
    #[must_use]
    pub const fn new(gateway: GatewayClient, invoke_timeout: Duration) -> Self {
        Self {
            gateway,
            invoke_timeout,
        }
    }

    /// Plan the dispatch, driving the prepare phase when the command family
    /// has one
    ///
    /// `skip_prepare` short-circuits to a fallback plan when a prior
    /// dispatch in this process already saw the node reject the prepare
    /// command.
    ///
    /// # Errors
    ///
    /// Propagates prepare failures that are not capability rejections —
    /// transport errors, timeouts, unrelated refusals — verbatim.
    pub async fn plan(
        &self,
        node: &Node,
        request: &CommandRequest,
        run_id: &str,
        skip_prepare: bool,
    ) -> Result<CommandPlan> {
        let Some(prepare_command) = prepare_command_for(&request.command) else {
            return Ok(CommandPlan {
                run: InvocationStep::run_for(request, None),
                shape: PlanShape::Direct,
            });
        };

        if skip_prepare {
            tracing::debug!(
                node = %node.node_id,
                command = prepare_command,
                "prepare previously rejected by this node, planning single-phase run"
            );
            return Ok(fallback_plan(request));
        }

        if !node.commands.is_empty() && !node.advertises(prepare_command) {
            // The gateway refuses invokes outside a declared command set, so
            // this prepare cannot reach the node; classify the rejection it
            // would produce without spending the round trip.
            let rejection = Error::Gateway(format!(
                "node command not allowed: the node (platform: {}) does not support \"{prepare_command}\"",
                node.platform
            ));
            return match fallback::classify_prepare_rejection(rejection, prepare_command) {
                Ok(absorbed) => {
                    tracing::info!(
                        node = %node.node_id,
                        command = prepare_command,
                        reason = %absorbed,
                        "declared command set omits the prepare phase, falling back to single-phase run"
                    );
                    Ok(fallback_plan(request))
                }
                Err(err) => Err(err),
            };
        }

        let prepare = InvocationStep::prepare_for(request, prepare_command);
        let params = prepare.invoke_params(node, &request.agent_id, run_id, None, None);

        tracing::debug!(node = %node.node_id, command = prepare_command, "issuing prepare invocation");
        match self
            .gateway
            .invoke_node(&params, &prepare.idempotency_key, self.invoke_timeout)
            .await
        {
            Ok(payload) => Ok(CommandPlan {
                run: InvocationStep::run_for(request, extract_run_plan(&payload)),
                shape: PlanShape::TwoPhase,
            }),
            Err(err) => match fallback::classify_prepare_rejection(err, prepare_command) {
                Ok(absorbed) => {
                    tracing::info!(
                        node = %node.node_id,
                        command = prepare_command,
                        reason = %absorbed,
                        "prepare rejected for capability reasons, falling back to single-phase run"
                    );
                    Ok(fallback_plan(request))
                }
                Err(err) => Err(err),
            },
        }
    }
}

fn fallback_plan(request: &CommandRequest) -> CommandPlan {
    CommandPlan {
        run: InvocationStep::run_for(request, None),
        shape: PlanShape::Fallback,
    }
}

fn extract_run_plan(payload: &Value) -> Option<Value> {
    payload
        .get("systemRunPlanV2")
        .filter(|v| !v.is_null())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_request() -> CommandRequest {
        CommandRequest::new("mac-1", commands::SYSTEM_RUN).with_argv(["echo", "hi"])
    }

    #[test]
    fn two_phase_table() {
        assert_eq!(
            prepare_command_for(commands::SYSTEM_RUN),
            Some(commands::SYSTEM_RUN_PREPARE)
        );
        assert_eq!(prepare_command_for(commands::SCREEN_RECORD), None);
        assert_eq!(prepare_command_for("camera.snap"), None);
    }

    #[test]
    fn steps_get_distinct_idempotency_keys() {
        let request = run_request();
        let prepare = InvocationStep::prepare_for(&request, commands::SYSTEM_RUN_PREPARE);
        let run = InvocationStep::run_for(&request, None);
        assert_ne!(prepare.idempotency_key, run.idempotency_key);
    }

    #[test]
    fn fallback_plan_never_surfaces_a_run_plan() {
        let request = run_request();
        let plan = CommandPlan {
            run: InvocationStep::run_for(&request, Some(serde_json::json!({"steps": []}))),
            shape: PlanShape::Fallback,
        };
        assert!(plan.is_fallback());
        assert!(plan.approval_run_plan().is_none());
    }

    #[test]
    fn two_phase_plan_surfaces_its_run_plan() {
        let request = run_request();
        let plan = CommandPlan {
            run: InvocationStep::run_for(&request, Some(serde_json::json!({"steps": []}))),
            shape: PlanShape::TwoPhase,
        };
        assert!(plan.approval_run_plan().is_some());
    }

    #[test]
    fn extract_run_plan_ignores_null() {
        assert!(extract_run_plan(&serde_json::json!({"systemRunPlanV2": null})).is_none());
        assert!(extract_run_plan(&serde_json::json!({})).is_none());
        assert_eq!(
            extract_run_plan(&serde_json::json!({"systemRunPlanV2": {"v": 2}})),
            Some(serde_json::json!({"v": 2}))
        );
    }

    #[test]
    fn invoke_params_carry_audit_fields() {
        let request = run_request();
        let node: Node = serde_json::from_value(serde_json::json!({
            "nodeId": "mac-1",
            "platform": "macos",
            "commands": ["system.run"]
        }))
        .unwrap();

        let run = InvocationStep::run_for(&request, None);
        let params = run.invoke_params(
            &node,
            "main",
            "run-1",
            Some(ApprovalDecision::AllowOnce),
            None,
        );

        assert_eq!(params.params.approved, Some(true));
        assert_eq!(
            params.params.approval_decision,
            Some(ApprovalDecision::AllowOnce)
        );
        assert_eq!(params.params.run_id, "run-1");
        assert_eq!(params.agent_id, params.params.agent_id);

        let unapproved = run.invoke_params(&node, "main", "run-1", None, None);
        assert_eq!(unapproved.params.approved, None);
        assert_eq!(unapproved.params.approval_decision, None);
    }
}
