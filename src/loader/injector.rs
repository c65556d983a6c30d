//! Script injection seam.
//!
//! Getting the engine into the process is a host concern: in a browser-like
//! environment it means appending a script element and waiting for its
//! load/error events, then picking the engine object off the global scope.
//! The core only needs the shape of that operation - perform the side
//! effect now, report the capability (or the failure) later - so it lives
//! behind a trait and tests substitute a mock.

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::engine::Engine;
use crate::error::LoadFailure;
use crate::types::EngineVersion;

// =============================================================================
// Default Source Locations
// =============================================================================

/// Default v2 script resource.
pub const DEFAULT_V2_SRC: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/mathjax/2.7.9/MathJax.js?config=TeX-MML-AM_CHTML";

/// Default v3 script resource.
pub const DEFAULT_V3_SRC: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/mathjax/3.2.2/es5/tex-mml-chtml.js";

/// The default script resource for a version, used when the loader does not
/// override `src`.
pub fn default_src(version: EngineVersion) -> &'static str {
    match version {
        EngineVersion::V2 => DEFAULT_V2_SRC,
        EngineVersion::V3 => DEFAULT_V3_SRC,
    }
}

// =============================================================================
// Injection Request
// =============================================================================

/// Everything an injector needs to load one engine.
#[derive(Debug, Clone)]
pub struct InjectionRequest {
    /// Which API generation the script provides.
    pub version: EngineVersion,
    /// Script resource location.
    pub src: String,
    /// Engine-specific init object, installed before the script runs.
    pub config: Option<serde_json::Value>,
}

// =============================================================================
// Script Injector
// =============================================================================

/// Performs the script-injection side effect.
///
/// `inject` is called at most once per process per version - the loader
/// never re-injects, and a second version is rejected before injection.
/// The side effect must happen during the call; the returned future settles
/// once the engine capability is available (or the injection failed).
pub trait ScriptInjector {
    fn inject(&self, request: InjectionRequest)
    -> LocalBoxFuture<'static, Result<Engine, LoadFailure>>;
}

/// Injector for environments with no document context.
///
/// Settles immediately to a permanent [`LoadFailure::NoDocument`] rejection;
/// there is nothing to retry.
pub struct HeadlessInjector;

impl ScriptInjector for HeadlessInjector {
    fn inject(
        &self,
        request: InjectionRequest,
    ) -> LocalBoxFuture<'static, Result<Engine, LoadFailure>> {
        tracing::debug!(version = %request.version, "no document context; engine cannot load");
        futures::future::ready(Err(LoadFailure::NoDocument)).boxed_local()
    }
}
