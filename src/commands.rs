//! Well-known node command names
//!
//! Nodes namespace their commands by subsystem (`system.*`, `screen.*`).
//! Only the commands the dispatch core treats specially are listed here;
//! anything else is passed through untouched and the node decides.

/// Shell execution on desktop nodes
pub const SYSTEM_RUN: &str = "system.run";

/// Staging phase of the two-phase `system.run` protocol
pub const SYSTEM_RUN_PREPARE: &str = "system.run.prepare";

/// Screen recording (desktop and mobile)
pub const SCREEN_RECORD: &str = "screen.record";

/// Permission key nodes report for screen capture
pub const SCREEN_RECORDING_PERMISSION: &str = "screenRecording";
