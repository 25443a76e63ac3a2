//! Fleet snapshots fetched from the gateway
//!
//! The registry performs a fresh `node.list` per dispatch. Connectivity and
//! advertised command sets change between calls, so reusing a snapshot
//! across dispatches is a correctness bug, not an optimization opportunity.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::types::Node;
use crate::gateway::GatewayClient;
use crate::{Error, Result};

/// Point-in-time view of the fleet
#[derive(Debug, Clone)]
pub struct FleetSnapshot {
    pub nodes: Vec<Node>,
    /// When the listing was taken
    pub fetched_at: DateTime<Utc>,
}

impl FleetSnapshot {
    /// Build a snapshot stamped with the current time
    #[must_use]
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            fetched_at: Utc::now(),
        }
    }

    /// Resolve a node by id, case-sensitive exact match
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] when no node carries the id.
    pub fn resolve(&self, node_id: &str) -> Result<&Node> {
        self.nodes
            .iter()
            .find(|n| n.node_id == node_id)
            .ok_or_else(|| Error::NodeNotFound(node_id.to_string()))
    }
}

/// Fetches fleet snapshots on demand
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    gateway: GatewayClient,
    list_timeout: Duration,
}

impl NodeRegistry {
    #[must_use]
    pub const fn new(gateway: GatewayClient, list_timeout: Duration) -> Self {
        Self {
            gateway,
            list_timeout,
        }
    }

    /// Take a fresh fleet snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the listing call fails.
    pub async fn snapshot(&self) -> Result<FleetSnapshot> {
        let nodes = self.gateway.list_nodes(self.list_timeout).await?;
        tracing::debug!(count = nodes.len(), "fetched fleet snapshot");
        Ok(FleetSnapshot::from_nodes(nodes))
    }
}
