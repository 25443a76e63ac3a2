//! Pre-network request validation
//!
//! Validators are keyed by command name and run before anything touches the
//! network, so an invalid request never reaches the gateway or the approval
//! flow. They are total, pure functions of the request: node state is off
//! limits here, that would cost the round trip this stage exists to avoid.

use crate::commands;
use crate::dispatch::CommandRequest;
use crate::{Error, Result};

/// Hard ceiling the node runtime enforces on screen recordings
pub const SCREEN_RECORD_MAX_DURATION_MS: u64 = 60_000;

/// Validate a request before dispatch
///
/// Commands without a registered validator pass vacuously; the node is the
/// authority on anything this client does not know about.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the request must not be dispatched.
pub fn validate(request: &CommandRequest) -> Result<()> {
    match request.command.as_str() {
        commands::SCREEN_RECORD => validate_screen_record(request),
        commands::SYSTEM_RUN => validate_system_run(request),
        _ => Ok(()),
    }
}

/// Resolve the requested recording duration to milliseconds
///
/// An explicit `duration_ms` wins over a human-readable `duration` string.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the duration string does not parse.
pub fn resolved_duration_ms(request: &CommandRequest) -> Result<Option<u64>> {
    match (request.duration_ms, request.duration.as_deref()) {
        (Some(ms), _) => Ok(Some(ms)),
        (None, Some(text)) => parse_duration_ms(text).map(Some),
        (None, None) => Ok(None),
    }
}

fn validate_screen_record(request: &CommandRequest) -> Result<()> {
    if let Some(ms) = resolved_duration_ms(request)? {
        if ms > SCREEN_RECORD_MAX_DURATION_MS {
            return Err(Error::Validation(format!(
                "{} durationMs must be at most {SCREEN_RECORD_MAX_DURATION_MS}",
                commands::SCREEN_RECORD
            )));
        }
    }
    Ok(())
}

fn validate_system_run(request: &CommandRequest) -> Result<()> {
    if request.command_argv.is_empty() && request.raw_command.is_none() {
        return Err(Error::Validation(format!(
            "{} requires a command to execute",
            commands::SYSTEM_RUN
        )));
    }
    Ok(())
}

fn parse_duration_ms(text: &str) -> Result<u64> {
    let duration = humantime::parse_duration(text).map_err(|e| {
        Error::Validation(format!(
            "{} duration {text:?} is not a valid duration: {e}",
            commands::SCREEN_RECORD
        ))
    })?;
    u64::try_from(duration.as_millis()).map_err(|_| {
        Error::Validation(format!(
            "{} duration {text:?} is out of range",
            commands::SCREEN_RECORD
        ))
    })
}
