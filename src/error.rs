//! Failure taxonomy.
//!
//! Three distinct failure families with different propagation rules:
//!
//! - [`ConfigurationError`] - detected synchronously at activation or
//!   dispatch time; fatal, never retried. Misconfiguration should halt
//!   setup loudly.
//! - [`LoadFailure`] - the engine script never became available. Recoverable
//!   only through a caller-supplied `on_error` handler; without one the
//!   loader escalates.
//! - [`TypesetFailure`] - a dispatched pass rejected. Surfaced after the
//!   node has been reconciled back to a visually consistent state, so a
//!   failing pass never leaves content stuck hidden.

use thiserror::Error;

use crate::engine::EngineError;
use crate::types::EngineVersion;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Fatal misconfiguration, detected synchronously. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A loader requested a different engine version while one is already
    /// loading or loaded in this process.
    #[error(
        "engine version {requested} requested while version {active} is already active in this process"
    )]
    VersionConflict {
        active: EngineVersion,
        requested: EngineVersion,
    },

    /// A node was mounted with no loader active in the process.
    #[error("no typesetting loader is active; mount a loader before mounting typeset nodes")]
    NoActiveLoader,

    /// `Pre` mode was requested with missing or empty source text.
    #[error("render mode `pre` requires source text to be set and non-empty")]
    MissingSourceText,

    /// `Pre` mode was requested with no conversion function configured on
    /// the node or inherited from its loader.
    #[error("render mode `pre` requires a conversion function on the node or its loader")]
    MissingConversionFunction,

    /// `Pre` mode was requested under an engine version without a
    /// conversion pipeline.
    #[error("render mode `pre` is only available with engine version 3, and version {active} is in use")]
    PreModeUnsupported { active: EngineVersion },
}

// =============================================================================
// Load Failures
// =============================================================================

/// The engine script never became available.
///
/// `Clone` because the shared handle fans the same rejection out to every
/// consumer that awaits it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadFailure {
    /// Script injection was attempted and reported an error.
    #[error("engine script injection failed: {message}")]
    Injection { message: String },

    /// No document context exists to inject a script into. The handle
    /// settles permanently rejected; there is no retry.
    #[error("no document context is available for script injection")]
    NoDocument,
}

impl LoadFailure {
    /// Injection failure carrying the raw error payload.
    pub fn injection(message: impl Into<String>) -> Self {
        LoadFailure::Injection {
            message: message.into(),
        }
    }
}

// =============================================================================
// Typeset Failures
// =============================================================================

/// A dispatched typesetting pass rejected.
///
/// The message embeds the original engine payload. By the time this is
/// surfaced the node has already been reconciled (visibility restored,
/// callbacks fired), so the failure is terminal for the pass but leaves the
/// UI consistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("typesetting failed: {message}")]
pub struct TypesetFailure {
    pub message: String,
}

impl TypesetFailure {
    /// Failure with the given payload message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<EngineError> for TypesetFailure {
    fn from(err: EngineError) -> Self {
        Self::new(err.message)
    }
}

impl From<LoadFailure> for TypesetFailure {
    fn from(err: LoadFailure) -> Self {
        Self::new(err.to_string())
    }
}
