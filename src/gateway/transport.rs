//! HTTP transport for gateway RPC calls
//!
//! Calls are plain `POST {base}/rpc` with a JSON envelope. The transport
//! never retries: mutating methods are at-most-once on the node side and a
//! silent retry would duplicate side effects. Retry discipline belongs to
//! the caller, keyed by the idempotency key it supplied.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// One-method seam over the gateway RPC surface
///
/// The typed client and everything above it depend on this trait, so tests
/// can script gateway behavior without a network.
#[async_trait]
pub trait GatewayTransport: std::fmt::Debug + Send + Sync {
    /// Send one RPC call and return the raw `result` value
    ///
    /// `idempotency_key` is set for mutating methods only. The remote treats
    /// two calls with the same key as the same logical operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] on timeout or connectivity failure and
    /// [`Error::Gateway`] when the gateway reports an error, with the remote
    /// message preserved verbatim.
    async fn call(
        &self,
        method: &str,
        params: Value,
        idempotency_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Value>;
}

/// Request envelope for `POST {base}/rpc`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RpcEnvelope<'a> {
    method: &'a str,
    params: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    idempotency_key: Option<&'a str>,
}

/// Response envelope from the gateway
#[derive(Debug, Deserialize)]
struct RpcResponse {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    message: String,
}

/// reqwest-backed transport talking to a live gateway
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpTransport {
    /// Create a transport for the gateway at `base_url`
    ///
    /// `token`, when present, is sent as a bearer credential on every call.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: Option<SecretString>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            token,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/rpc", self.base_url)
    }
}

#[async_trait]
impl GatewayTransport for HttpTransport {
    async fn call(
        &self,
        method: &str,
        params: Value,
        idempotency_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Value> {
        let envelope = RpcEnvelope {
            method,
            params: &params,
            idempotency_key,
        };

        let mut request = self
            .client
            .post(self.endpoint())
            .timeout(timeout)
            .json(&envelope);

        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token.expose_secret()));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(format!("gateway call {method} timed out: {e}"))
            } else {
                Error::transport(format!("gateway call {method} failed: {e}"))
            }
        })?;

        let status = response.status();
        let body: RpcResponse = response.json().await.map_err(|e| {
            Error::transport(format!(
                "gateway call {method} returned an unreadable body (status {status}): {e}"
            ))
        })?;

        if body.ok {
            Ok(body.result.unwrap_or(Value::Null))
        } else {
            let message = body.error.map_or_else(
                || format!("gateway call {method} failed with status {status}"),
                |e| e.message,
            );
            Err(Error::Gateway(message))
        }
    }
}
