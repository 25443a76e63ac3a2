//! Approval policy resolution and interactive gating
//!
//! Security policy lives in the gateway; this module fetches the effective
//! rules for an agent/node pair, decides whether a human must approve the
//! command, and runs the approval round trip when one is required.

pub mod engine;
pub mod policy;

pub use engine::{ApprovalEngine, Authorization, approval_required};
pub use policy::{
    ApprovalDecision, AskFallback, AskMode, PolicyFile, PolicyOverride, PolicyRules, SecurityMode,
};
