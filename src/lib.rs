//! Beacon Nodes - node command dispatch and approval client for the Beacon
//! gateway
//!
//! This library dispatches commands (shell execution, screen recording, ...)
//! to remote execution nodes through a central gateway, enforcing a
//! per-agent approval policy before anything runs. Nodes advertise which
//! commands they support; the advertisement is treated as a hint and
//! corrected by observed rejections.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Callers                           │
//! │        CLI  │  agent tools  │  HTTP front door      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Dispatcher                          │
//! │  resolve → validate → plan → authorize → invoke     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               Beacon Gateway (RPC)                   │
//! │  node.list │ node.invoke │ approvals │ approval req │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Each dispatch is one strictly ordered sequence: no step starts before the
//! previous step of the same dispatch completes. Independent dispatches are
//! fully concurrent and share only the per-process capability cache.

pub mod approval;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod nodes;
pub mod planner;
pub mod preflight;

pub use approval::{
    ApprovalDecision, ApprovalEngine, AskFallback, AskMode, Authorization, PolicyFile,
    PolicyRules, SecurityMode,
};
pub use config::Config;
pub use dispatch::{
    CommandRequest, DEFAULT_AGENT_ID, DispatchTimeouts, Dispatcher, ExecutionResult,
};
pub use error::{Error, Result};
pub use gateway::{GatewayClient, GatewayTransport, HttpTransport};
pub use nodes::{CapabilityCache, FleetSnapshot, Node, NodeRegistry, Platform};
pub use planner::{CommandPlan, InvocationStep, PlanShape, Planner};
