//! Node fleet snapshots and capability tracking
//!
//! Nodes are remote execution agents (desktop, mobile) reachable through
//! the gateway. Each dispatch works from a fresh fleet snapshot; advertised
//! capabilities are treated as hints and corrected by observed rejections.

pub mod caps;
pub mod registry;
pub mod types;

pub use caps::CapabilityCache;
pub use registry::{FleetSnapshot, NodeRegistry};
pub use types::{Node, Platform};
