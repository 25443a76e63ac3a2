//! Shared test utilities
//!
//! A scripted gateway double: every RPC call is recorded, and per-method
//! handlers decide the response, so tests can assert on the exact invocation
//! sequence a dispatch produced.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use beacon_nodes::dispatch::DispatchTimeouts;
use beacon_nodes::{Dispatcher, Error, GatewayClient, GatewayTransport};

/// One recorded RPC call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
    pub idempotency_key: Option<String>,
}

type Handler = Box<dyn Fn(&Value) -> beacon_nodes::Result<Value> + Send + Sync>;

/// Scripted gateway transport recording every call
pub struct MockTransport {
    handlers: HashMap<String, Handler>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport").finish_non_exhaustive()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Script a handler for one method
    pub fn on(
        mut self,
        method: &str,
        handler: impl Fn(&Value) -> beacon_nodes::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(method.to_string(), Box::new(handler));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, method: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    /// Commands of every `node.invoke` call, in order
    pub fn invoke_commands(&self) -> Vec<String> {
        self.calls_for("node.invoke")
            .iter()
            .filter_map(|c| c.params["command"].as_str().map(ToString::to_string))
            .collect()
    }
}

#[async_trait]
impl GatewayTransport for MockTransport {
    async fn call(
        &self,
        method: &str,
        params: Value,
        idempotency_key: Option<&str>,
        _timeout: Duration,
    ) -> beacon_nodes::Result<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: method.to_string(),
            params: params.clone(),
            idempotency_key: idempotency_key.map(ToString::to_string),
        });

        match self.handlers.get(method) {
            Some(handler) => handler(&params),
            None => Err(Error::Gateway(format!("unhandled method {method}"))),
        }
    }
}

/// Dispatcher over a scripted transport
pub fn dispatcher_over(transport: &Arc<MockTransport>) -> Dispatcher {
    Dispatcher::new(
        GatewayClient::new(transport.clone()),
        DispatchTimeouts::default(),
    )
}

/// Node JSON advertising the given command set
pub fn node_with_commands(commands: &[&str]) -> Value {
    json!({
        "nodeId": "mac-1",
        "displayName": "Mac",
        "platform": "macos",
        "caps": [],
        "commands": commands,
        "connected": true,
        "permissions": { "screenRecording": true }
    })
}

/// Node JSON with no `commands` key at all
pub fn node_without_commands() -> Value {
    json!({
        "nodeId": "mac-1",
        "displayName": "Mac",
        "platform": "macos",
        "connected": true
    })
}

/// `node.list` result wrapping the given nodes
pub fn nodes_result(nodes: Vec<Value>) -> Value {
    json!({ "nodes": nodes })
}

/// `exec.approvals.node.get` result with the given defaults and no overrides
pub fn policy_result(security: &str, ask: &str, ask_fallback: &str) -> Value {
    json!({
        "file": {
            "version": 1,
            "defaults": {
                "security": security,
                "ask": ask,
                "askFallback": ask_fallback
            },
            "agents": {}
        }
    })
}

/// Successful `node.invoke` run result
pub fn run_result() -> Value {
    json!({
        "payload": {
            "stdout": "",
            "stderr": "",
            "exitCode": 0,
            "success": true,
            "timedOut": false
        }
    })
}

/// The gateway's rejection of a prepare the node's declared set omits
pub fn prepare_rejection() -> Error {
    Error::Gateway(
        "node command not allowed: the node (platform: macos) does not support \"system.run.prepare\""
            .to_string(),
    )
}
