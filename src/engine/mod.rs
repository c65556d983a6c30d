//! Engine capability seam.
//!
//! The typesetting engine itself is an external collaborator: it is loaded
//! out-of-process-control (script injection) and invoked only through the
//! documented entry points modeled here. The two API generations are
//! incompatible, so the loaded capability is a tagged [`Engine`] variant and
//! every call site dispatches on the tag rather than probing properties.
//!
//! Hosts (or test harnesses) implement [`EngineV2`]/[`EngineV3`] over the
//! real engine object; the core never sees anything else.

pub mod queue;

use std::rc::Rc;

use futures::future::LocalBoxFuture;
use thiserror::Error;

use crate::node::NodeHandle;
use crate::types::{ConversionFunction, EngineVersion};

pub use queue::TaskQueue;

// =============================================================================
// Engine Error
// =============================================================================

/// Raw failure payload reported by an engine entry point.
///
/// Carried verbatim; the controller normalizes it into a
/// [`TypesetFailure`](crate::error::TypesetFailure) when surfacing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    /// Error with the given payload message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for EngineError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

// =============================================================================
// Conversion Request
// =============================================================================

/// One invocation of a v3 conversion entry point.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Which entry point to invoke.
    pub function: ConversionFunction,
    /// The source text to convert.
    pub text: String,
    /// Engine-specific parameters, passed through unmodified.
    pub params: serde_json::Value,
    /// Display-mode flag, merged in from the node's `inline` setting.
    pub display: bool,
}

// =============================================================================
// Version 3 Capability
// =============================================================================

/// The v3 engine call contract.
///
/// The handle resolving only means the script loaded; [`EngineV3::ready`]
/// must additionally complete before the engine can process content.
pub trait EngineV3 {
    /// Resolves once the engine's internal startup has completed.
    fn ready(&self) -> LocalBoxFuture<'static, Result<(), EngineError>>;

    /// Clears prior typeset annotations from the given nodes.
    fn typeset_clear(&self, nodes: &[NodeHandle]);

    /// Re-typesets markup already present inside the given nodes, in place.
    fn typeset(&self, nodes: &[NodeHandle]) -> LocalBoxFuture<'static, Result<(), EngineError>>;

    /// Invokes a synchronous conversion entry point (non-`…Promise` name).
    fn convert_sync(&self, request: &ConversionRequest) -> Result<String, EngineError>;

    /// Invokes a future-returning conversion entry point (`…Promise` name).
    fn convert_async(
        &self,
        request: &ConversionRequest,
    ) -> LocalBoxFuture<'static, Result<String, EngineError>>;

    /// Resets the engine's internal document state so the conversion
    /// pipeline can be reused for new text.
    fn reset_document(&self);
}

// =============================================================================
// Version 2 Capability
// =============================================================================

/// The v2 engine call contract.
///
/// There is no readiness future and no conversion pipeline; all work is
/// appended to the engine's serial hub queue, which guarantees FIFO ordering
/// relative to anything previously queued.
pub trait EngineV2 {
    /// The engine's serial task queue (`Hub.Queue`).
    fn hub_queue(&self) -> Rc<TaskQueue>;

    /// Typesets the markup inside the given node. Must only be called from
    /// a task running on [`EngineV2::hub_queue`].
    fn typeset_node(&self, node: &NodeHandle);
}

// =============================================================================
// Engine - the loaded capability
// =============================================================================

/// The opaque loaded-engine capability, tagged by API generation.
///
/// Cheap to clone (shared by reference); read-only shared state - consumers
/// invoke entry points but never mutate loader-owned configuration.
#[derive(Clone)]
pub enum Engine {
    V2(Rc<dyn EngineV2>),
    V3(Rc<dyn EngineV3>),
}

impl Engine {
    /// The API generation of this capability.
    pub fn version(&self) -> EngineVersion {
        match self {
            Engine::V2(_) => EngineVersion::V2,
            Engine::V3(_) => EngineVersion::V3,
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Engine").field(&self.version()).finish()
    }
}
