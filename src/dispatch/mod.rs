//! Dispatch orchestration
//!
//! The dispatcher ties the subsystems together, strictly top-down per
//! command: validate, snapshot and resolve the node, plan (driving the
//! prepare phase), authorize, invoke, normalize. Steps within one dispatch
//! never overlap; independent dispatches run fully concurrently and share
//! only the capability cache.
//!
//! Every wait lives inside the dispatch future: dropping it (CLI interrupt)
//! stops the network wait and nothing detached runs afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::approval::{ApprovalEngine, AskMode};
use crate::gateway::GatewayClient;
use crate::nodes::{CapabilityCache, FleetSnapshot, NodeRegistry};
use crate::planner::{PlanShape, Planner, prepare_command_for};
use crate::Result;
use crate::preflight;

/// Agent identity used when the caller does not name one
pub const DEFAULT_AGENT_ID: &str = "main";

/// Caller intent for one node command dispatch
///
/// Constructed once, immutable after validation.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Target node id
    pub node_id: String,
    /// Command name (`system.run`, `screen.record`, ...)
    pub command: String,
    /// Positional arguments
    pub command_argv: Vec<String>,
    /// Unparsed command line, when the caller has one
    pub raw_command: Option<String>,
    /// Requesting agent id
    pub agent_id: String,
    /// Recording duration in milliseconds (`screen.record`-class commands)
    pub duration_ms: Option<u64>,
    /// Human-readable duration string, parsed during preflight
    pub duration: Option<String>,
    /// Replaces the policy-resolved ask mode when set (CLI flag)
    pub ask_override: Option<AskMode>,
}

impl CommandRequest {
    /// New request for `command` on `node_id`, under the default agent
    #[must_use]
    pub fn new(node_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            command: command.into(),
            command_argv: Vec::new(),
            raw_command: None,
            agent_id: DEFAULT_AGENT_ID.to_string(),
            duration_ms: None,
            duration: None,
            ask_override: None,
        }
    }

    #[must_use]
    pub fn with_argv<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command_argv = argv.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_raw_command(mut self, raw: impl Into<String>) -> Self {
        self.raw_command = Some(raw.into());
        self
    }

    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    #[must_use]
    pub const fn with_ask(mut self, ask: AskMode) -> Self {
        self.ask_override = Some(ask);
        self
    }

    #[must_use]
    pub const fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    /// The literal command string shown to approvers: the raw command when
    /// present, the joined argv otherwise
    #[must_use]
    pub fn command_line(&self) -> String {
        self.raw_command
            .clone()
            .unwrap_or_else(|| self.command_argv.join(" "))
    }
}

/// Normalized outcome of a run invocation
///
/// Produced only from a successful run payload. A command the node ran but
/// that failed is `success: false` here, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub exit_code: i32,
    pub success: bool,
    #[serde(default)]
    pub timed_out: bool,
}

/// Per-call deadlines for the dispatch pipeline
#[derive(Debug, Clone, Copy)]
pub struct DispatchTimeouts {
    /// `node.list`
    pub list: Duration,
    /// `node.invoke` (prepare and run)
    pub invoke: Duration,
    /// `exec.approvals.node.get`
    pub policy: Duration,
    /// `exec.approval.request` — the bound on the human round trip
    pub approval: Duration,
}

impl Default for DispatchTimeouts {
    fn default() -> Self {
        Self {
            list: Duration::from_secs(10),
            invoke: Duration::from_secs(30),
            policy: Duration::from_secs(10),
            approval: Duration::from_secs(120),
        }
    }
}

/// Orchestrates node command dispatches
#[derive(Debug)]
pub struct Dispatcher {
    gateway: GatewayClient,
    registry: NodeRegistry,
    planner: Planner,
    approvals: ApprovalEngine,
    caps: Mutex<CapabilityCache>,
    invoke_timeout: Duration,
}

impl Dispatcher {
    #[must_use]
    pub fn new(gateway: GatewayClient, timeouts: DispatchTimeouts) -> Self {
        Self {
            registry: NodeRegistry::new(gateway.clone(), timeouts.list),
            planner: Planner::new(gateway.clone(), timeouts.invoke),
            approvals: ApprovalEngine::new(gateway.clone(), timeouts.policy, timeouts.approval),
            caps: Mutex::new(CapabilityCache::new()),
            invoke_timeout: timeouts.invoke,
            gateway,
        }
    }

    /// Take a fresh fleet snapshot (CLI listing)
    ///
    /// # Errors
    ///
    /// Returns an error if the listing call fails.
    pub async fn fleet(&self) -> Result<FleetSnapshot> {
        self.registry.snapshot().await
    }

    /// Run one command dispatch end to end
    ///
    /// # Errors
    ///
    /// Fails closed on every path: [`crate::Error::Validation`] before any
    /// network call, [`crate::Error::NodeNotFound`] on resolution,
    /// [`crate::Error::ApprovalDenied`] before any run invocation, and
    /// transport or gateway errors from the invocation itself. A command the
    /// node executed unsuccessfully is an `Ok` result with `success: false`.
    pub async fn dispatch(&self, request: &CommandRequest) -> Result<ExecutionResult> {
        preflight::validate(request)?;
        let duration_ms = preflight::resolved_duration_ms(request)?;

        let run_id = Uuid::new_v4().to_string();
        let snapshot = self.registry.snapshot().await?;
        let node = snapshot.resolve(&request.node_id)?;

        let skip_prepare = {
            let mut caps = self.caps.lock().await;
            caps.invalidate_from(&snapshot);
            prepare_command_for(&request.command)
                .is_some_and(|prepare| caps.is_unsupported(&node.node_id, prepare))
        };

        let plan = self
            .planner
            .plan(node, request, &run_id, skip_prepare)
            .await?;

        if plan.shape == PlanShape::Fallback && !skip_prepare {
            if let Some(prepare) = prepare_command_for(&request.command) {
                self.caps
                    .lock()
                    .await
                    .mark_unsupported(&node.node_id, prepare);
            }
        }

        let authorization = self.approvals.authorize(request, &plan).await?;

        tracing::debug!(
            node = %node.node_id,
            command = %plan.run.command,
            run_id = %run_id,
            fallback = plan.is_fallback(),
            "invoking run step"
        );

        let params = plan.run.invoke_params(
            node,
            &request.agent_id,
            &run_id,
            authorization.decision(),
            duration_ms,
        );
        let payload = self
            .gateway
            .invoke_node(&params, &plan.run.idempotency_key, self.invoke_timeout)
            .await?;

        let result: ExecutionResult = serde_json::from_value(payload)?;

        tracing::info!(
            node = %node.node_id,
            run_id = %run_id,
            success = result.success,
            exit_code = result.exit_code,
            "dispatch complete"
        );
        Ok(result)
    }
}
