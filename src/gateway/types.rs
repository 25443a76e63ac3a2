//! Wire types for the gateway RPC surface
//!
//! One closed set of request/response shapes per method, validated at the
//! boundary so malformed payloads never reach the planner or approval engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::approval::{ApprovalDecision, PolicyFile};
use crate::nodes::Node;

/// Fleet listing
pub const METHOD_NODE_LIST: &str = "node.list";

/// Command invocation on a node (mutating, carries an idempotency key)
pub const METHOD_NODE_INVOKE: &str = "node.invoke";

/// Effective node approval policy document
pub const METHOD_APPROVALS_GET: &str = "exec.approvals.node.get";

/// Interactive approval round trip
pub const METHOD_APPROVAL_REQUEST: &str = "exec.approval.request";

/// Host descriptor attached to approval requests and invocations
pub const NODE_HOST: &str = "node";

/// Response to `node.list`
#[derive(Debug, Clone, Deserialize)]
pub struct NodeListResponse {
    pub nodes: Vec<Node>,
}

/// Parameters for `node.invoke`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInvokeParams {
    /// Target node id
    pub id: String,
    /// Command name the node should execute
    pub command: String,
    /// Positional arguments
    pub command_argv: Vec<String>,
    /// Structured run plan produced by a successful prepare phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_run_plan_v2: Option<Value>,
    /// Originating host descriptor, always [`NODE_HOST`]
    pub host: String,
    /// Requesting agent id
    pub agent_id: String,
    /// Command parameter bag forwarded to the node process
    pub params: InvokeCommandParams,
}

/// Nested parameter bag sent to the node process for audit and execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeCommandParams {
    /// Argument vector, node-side form
    pub command: Vec<String>,
    /// Unparsed command line; explicit `null` when the caller sent argv only
    pub raw_command: Option<String>,
    /// Requesting agent id, repeated for the node-side audit trail
    pub agent_id: String,
    /// Set when an explicit approval decision authorized this invocation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    /// The explicit decision value, for audit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_decision: Option<ApprovalDecision>,
    /// Dispatch-unique run id
    pub run_id: String,
    /// Recording duration for `screen.record`-class commands, milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Response to `node.invoke`
#[derive(Debug, Clone, Deserialize)]
pub struct NodeInvokeResponse {
    /// Command-specific payload; the run phase of a dispatch normalizes this
    /// into an execution result
    pub payload: Value,
}

/// Response to `exec.approvals.node.get`
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalPolicyResponse {
    pub file: PolicyFile,
}

/// Parameters for `exec.approval.request`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequestParams {
    /// The literal command string the human is asked to approve
    pub command: String,
    /// Positional arguments
    pub command_argv: Vec<String>,
    /// Originating host descriptor, always [`NODE_HOST`]
    pub host: String,
    /// Requesting agent id
    pub agent_id: String,
    /// Attached only while the plan is still two-phase and non-fallback;
    /// approval is for the actual action about to be taken
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_run_plan_v2: Option<Value>,
}

/// Response to `exec.approval.request`
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalResponse {
    pub decision: ApprovalDecision,
}
