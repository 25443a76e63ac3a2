//! Typed RPC client for the Beacon gateway
//!
//! One typed async method per gateway method. Mutating calls always carry an
//! idempotency key supplied by the caller; the caller keeps the key across
//! retries of the same attempt so the remote can deduplicate.

pub mod transport;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use crate::Result;
use crate::approval::{ApprovalDecision, PolicyFile};
use crate::nodes::Node;

pub use transport::{GatewayTransport, HttpTransport};
use types::{
    ApprovalPolicyResponse, ApprovalRequestParams, ApprovalResponse, NodeInvokeParams,
    NodeInvokeResponse, NodeListResponse,
};

/// Typed client over a [`GatewayTransport`]
#[derive(Debug, Clone)]
pub struct GatewayClient {
    transport: Arc<dyn GatewayTransport>,
}

impl GatewayClient {
    /// Wrap an existing transport
    #[must_use]
    pub fn new(transport: Arc<dyn GatewayTransport>) -> Self {
        Self { transport }
    }

    /// Build a client over [`HttpTransport`]
    #[must_use]
    pub fn over_http(base_url: impl Into<String>, token: Option<secrecy::SecretString>) -> Self {
        Self::new(Arc::new(HttpTransport::new(base_url, token)))
    }

    /// Mint a fresh idempotency key
    #[must_use]
    pub fn idempotency_key() -> String {
        Uuid::new_v4().to_string()
    }

    /// Fetch the current fleet snapshot via `node.list`
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is malformed.
    pub async fn list_nodes(&self, timeout: Duration) -> Result<Vec<Node>> {
        let result = self
            .transport
            .call(types::METHOD_NODE_LIST, Value::Object(serde_json::Map::new()), None, timeout)
            .await?;
        let response: NodeListResponse = serde_json::from_value(result)?;
        Ok(response.nodes)
    }

    /// Invoke a command on a node via `node.invoke`
    ///
    /// Mutating: `idempotency_key` is required and must be reused unchanged
    /// when retrying the same attempt.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Gateway`] with the remote message verbatim
    /// when the gateway rejects the invocation; the planner classifies that
    /// message for fallback eligibility.
    pub async fn invoke_node(
        &self,
        params: &NodeInvokeParams,
        idempotency_key: &str,
        timeout: Duration,
    ) -> Result<Value> {
        let result = self
            .transport
            .call(
                types::METHOD_NODE_INVOKE,
                serde_json::to_value(params)?,
                Some(idempotency_key),
                timeout,
            )
            .await?;
        let response: NodeInvokeResponse = serde_json::from_value(result)?;
        Ok(response.payload)
    }

    /// Fetch the node approval policy document via `exec.approvals.node.get`
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is malformed.
    pub async fn node_approval_policy(&self, timeout: Duration) -> Result<PolicyFile> {
        let result = self
            .transport
            .call(types::METHOD_APPROVALS_GET, Value::Object(serde_json::Map::new()), None, timeout)
            .await?;
        let response: ApprovalPolicyResponse = serde_json::from_value(result)?;
        Ok(response.file)
    }

    /// Run one approval round trip via `exec.approval.request`
    ///
    /// Blocks until the gateway relays a decision or `timeout` expires; the
    /// approval engine applies the policy fallback on expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip cannot be completed.
    pub async fn request_approval(
        &self,
        params: &ApprovalRequestParams,
        timeout: Duration,
    ) -> Result<ApprovalDecision> {
        let result = self
            .transport
            .call(
                types::METHOD_APPROVAL_REQUEST,
                serde_json::to_value(params)?,
                None,
                timeout,
            )
            .await?;
        let response: ApprovalResponse = serde_json::from_value(result)?;
        Ok(response.decision)
    }
}
