//! # typeset-bridge
//!
//! Coordination layer between a host UI tree and an externally loaded
//! typesetting engine.
//!
//! The engine is not a library dependency: it arrives by script injection,
//! loads asynchronously, exposes one of two incompatible API generations,
//! and exists at most once per process. This crate manages that lifecycle
//! and keeps every typeset node's content, visibility, and callbacks
//! consistent with the engine's asynchronous progress.
//!
//! ## Architecture
//!
//! Two cooperating pieces:
//!
//! ```text
//! mount_loader → script injection (once) → EngineHandle (shared, deferred)
//!                                              │
//! TypesetContext (inherited config) ───────────┤
//!                                              ▼
//! TypesetController (per node) → Pass → exactly one engine call → settle
//! ```
//!
//! The **loader** ([`mount_loader`]) injects the engine script exactly once
//! per process, enforces version exclusivity, and publishes the shared
//! [`EngineHandle`] plus an inheritable [`TypesetContext`]. The per-node
//! **controller** ([`TypesetController`]) runs the typesetting lifecycle:
//! it decides when an input change warrants an engine call, keeps at most
//! one call in flight per node, applies the visibility policy, and fires
//! the node's callbacks when a pass settles.
//!
//! Everything runs on one cooperative UI thread; handles are `Rc`-shared
//! and futures are local.
//!
//! ## Modules
//!
//! - [`types`] - Configuration vocabulary (versions, modes, policies)
//! - [`error`] - Configuration, load, and typesetting failures
//! - [`engine`] - The engine capability seam (v2/v3 call contracts)
//! - [`loader`] - Singleton loading, the shared handle, context
//! - [`node`] - Per-node props, target seam, lifecycle controller

pub mod engine;
pub mod error;
pub mod loader;
pub mod node;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use error::{ConfigurationError, LoadFailure, TypesetFailure};

pub use engine::{ConversionRequest, Engine, EngineError, EngineV2, EngineV3, TaskQueue};

pub use loader::{
    DEFAULT_V2_SRC, DEFAULT_V3_SRC, EngineHandle, EngineResult, ErrorCallback, HeadlessInjector,
    InjectionRequest, LoadCallback, LoaderHandle, LoaderProps, ScriptInjector, StartupCallback,
    TypesetContext, active_context, default_src, mount_loader, reset_loader_state,
};

pub use node::{
    NodeHandle, NodeProps, Pass, PassDecision, SkipReason, TypesetCallback, TypesetController,
    TypesetTarget,
};
