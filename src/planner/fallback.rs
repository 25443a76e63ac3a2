//! Classification of prepare-phase rejections
//!
//! The gateway relays node rejections as free text, so fallback eligibility
//! is decided by matching known substrings. That is inherently fragile — a
//! reworded or translated message stops matching — which is why the whole
//! predicate lives here, in one place, under test. A structured capability
//! error code in the node protocol would replace this file.
//!
//! A rejection is fallback-eligible when it says one of:
//! - the node does not support the specific prepare command, quoted by name
//! - the node declared no supported commands at all
//! - a generic "command not supported" / "command not allowed"
//!
//! Everything else — transport failures, timeouts, rejections unrelated to
//! capability — propagates verbatim. Downgrading a command because of a real
//! outage would mask the outage as "unsupported".

use crate::Error;

/// Whether `message` rejects `command` for capability reasons
#[must_use]
pub fn is_capability_rejection(message: &str, command: &str) -> bool {
    if message.contains(&format!("does not support \"{command}\"")) {
        return true;
    }

    let lowered = message.to_lowercase();
    if lowered.contains("did not declare any supported commands") {
        return true;
    }

    lowered.contains("command not supported") || lowered.contains("command not allowed")
}

/// Absorb a prepare rejection when it is capability-related
///
/// A gateway-reported rejection matching [`is_capability_rejection`] comes
/// back as `Ok(Error::CommandUnsupported)` for the planner to log and absorb.
/// Any other error — including transport failures and timeouts — is handed
/// back unchanged in `Err` for verbatim propagation.
pub fn classify_prepare_rejection(err: Error, command: &str) -> Result<Error, Error> {
    match err {
        Error::Gateway(message) if is_capability_rejection(&message, command) => {
            Ok(Error::CommandUnsupported(message))
        }
        other => Err(other),
    }
}
