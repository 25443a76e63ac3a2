//! Negative-capability tracking
//!
//! When a node rejects a prepare phase for capability reasons, that fact is
//! recorded here so repeat dispatches in the same process skip the doomed
//! round trip. The store is explicit and per-process, keyed by
//! `(node, command)`; there is no ambient global state and nothing is
//! persisted.

use std::collections::HashSet;

use super::registry::FleetSnapshot;

/// Per-process store of `(node, command)` pairs rejected as unsupported
#[derive(Debug, Default)]
pub struct CapabilityCache {
    unsupported: HashSet<(String, String)>,
}

impl CapabilityCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `node_id` rejected `command` as unsupported
    pub fn mark_unsupported(&mut self, node_id: &str, command: &str) {
        self.unsupported
            .insert((node_id.to_string(), command.to_string()));
    }

    /// Whether `node_id` is known to reject `command`
    #[must_use]
    pub fn is_unsupported(&self, node_id: &str, command: &str) -> bool {
        self.unsupported
            .contains(&(node_id.to_string(), command.to_string()))
    }

    /// Invalidate flags contradicted by a fresh listing
    ///
    /// A node that now advertises a flagged command gets a fresh prepare
    /// attempt on its next dispatch; a node that still omits it keeps the
    /// flag. Nodes absent from the listing keep their flags too — absence
    /// says nothing about capability.
    pub fn invalidate_from(&mut self, snapshot: &FleetSnapshot) {
        self.unsupported.retain(|(node_id, command)| {
            snapshot
                .nodes
                .iter()
                .find(|n| &n.node_id == node_id)
                .is_none_or(|n| !n.advertises(command))
        });
    }

    /// Drop every flag
    pub fn clear(&mut self) {
        self.unsupported.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.unsupported.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unsupported.is_empty()
    }
}
