//! Engine Loader - process-wide singleton loading and configuration.
//!
//! Mounting a loader near the root of the UI tree injects the engine script
//! (once), produces the shared [`EngineHandle`] every typeset node consumes,
//! and establishes the configuration bundle ([`TypesetContext`]) descendants
//! inherit. Exactly one engine version may be active per process; a loader
//! requesting a different version is a configuration error, never a silent
//! override.
//!
//! Nested loaders are allowed: a subtree may re-declare a loader with the
//! *same* version to override the non-version defaults (render mode,
//! visibility policy, conversion options) for its descendants. The handle is
//! always reused - the script is never injected twice.
//!
//! # Example
//!
//! ```ignore
//! use typeset_bridge::{mount_loader, LoaderProps, EngineVersion};
//!
//! let loader = mount_loader(LoaderProps {
//!     version: EngineVersion::V3,
//!     injector: Some(dom_injector),
//!     ..Default::default()
//! })?;
//!
//! // Descendant nodes mount against the loader's context.
//! let ctx = loader.context();
//! ```

mod handle;
mod injector;

use std::cell::RefCell;
use std::rc::Rc;

use futures::FutureExt;
use tracing::{debug, error};

use crate::engine::Engine;
use crate::error::{ConfigurationError, LoadFailure};
use crate::types::{ConversionOptions, EngineVersion, HideUntilTypeset, RenderMode};

pub use handle::{EngineHandle, EngineResult};
pub use injector::{
    DEFAULT_V2_SRC, DEFAULT_V3_SRC, HeadlessInjector, InjectionRequest, ScriptInjector,
    default_src,
};

// =============================================================================
// Callback Types
// =============================================================================

/// Fires exactly once, synchronously upon the handle's successful
/// resolution, receiving the loaded engine capability.
pub type StartupCallback = Rc<dyn Fn(&Engine)>;

/// Fires once, after the startup callback, on successful resolution.
pub type LoadCallback = Rc<dyn Fn()>;

/// Fires on rejection, receiving the raw load failure. If absent, the
/// rejection is escalated instead.
pub type ErrorCallback = Rc<dyn Fn(&LoadFailure)>;

// =============================================================================
// Loader Props
// =============================================================================

/// Loader configuration.
///
/// Only `version` matters for the singleton invariant; everything else
/// either shapes the one-time injection (`src`, `config`, `injector`,
/// callbacks) or sets inheritable defaults nodes may override.
#[derive(Default)]
pub struct LoaderProps {
    /// Engine API generation to load. Fixed per process on first mount.
    pub version: EngineVersion,
    /// Script resource override; defaults per version.
    pub src: Option<String>,
    /// Engine-specific init object, installed before the script runs.
    pub config: Option<serde_json::Value>,
    /// Host-provided injection capability. Without one (no document
    /// context), the handle settles permanently rejected.
    pub injector: Option<Rc<dyn ScriptInjector>>,
    /// See [`StartupCallback`].
    pub on_startup: Option<StartupCallback>,
    /// See [`LoadCallback`].
    pub on_load: Option<LoadCallback>,
    /// See [`ErrorCallback`].
    pub on_error: Option<ErrorCallback>,
    /// Default render mode for descendant nodes.
    pub render_mode: Option<RenderMode>,
    /// Default visibility policy for descendant nodes.
    pub hide_until_typeset: Option<HideUntilTypeset>,
    /// Default conversion options for descendant `pre` nodes.
    pub conversion: Option<ConversionOptions>,
}

// =============================================================================
// Typeset Context
// =============================================================================

/// The read-only configuration bundle descendants inherit.
///
/// Cheap to clone; immutable after creation. Nested loaders produce a new
/// context with overridden defaults, scoped to their subtree - the root
/// context is never mutated.
#[derive(Clone, Debug)]
pub struct TypesetContext {
    inner: Rc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    version: EngineVersion,
    handle: EngineHandle,
    render_mode: RenderMode,
    hide_until_typeset: HideUntilTypeset,
    conversion: Option<ConversionOptions>,
}

impl TypesetContext {
    fn new(version: EngineVersion, handle: EngineHandle, props: &LoaderProps) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                version,
                handle,
                render_mode: props.render_mode.unwrap_or_default(),
                hide_until_typeset: props.hide_until_typeset.unwrap_or_default(),
                conversion: props.conversion.clone(),
            }),
        }
    }

    /// Context for a nested loader: same version and handle, non-version
    /// fields overridden where the nested props set them.
    fn with_overrides(&self, props: &LoaderProps) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                version: self.inner.version,
                handle: self.inner.handle.clone(),
                render_mode: props.render_mode.unwrap_or(self.inner.render_mode),
                hide_until_typeset: props
                    .hide_until_typeset
                    .unwrap_or(self.inner.hide_until_typeset),
                conversion: props
                    .conversion
                    .clone()
                    .or_else(|| self.inner.conversion.clone()),
            }),
        }
    }

    /// The active engine version.
    pub fn version(&self) -> EngineVersion {
        self.inner.version
    }

    /// The shared engine handle.
    pub fn handle(&self) -> &EngineHandle {
        &self.inner.handle
    }

    /// Default render mode for nodes under this context.
    pub fn render_mode(&self) -> RenderMode {
        self.inner.render_mode
    }

    /// Default visibility policy for nodes under this context.
    pub fn hide_until_typeset(&self) -> HideUntilTypeset {
        self.inner.hide_until_typeset
    }

    /// Default conversion options for `pre` nodes under this context.
    pub fn conversion(&self) -> Option<&ConversionOptions> {
        self.inner.conversion.as_ref()
    }
}

// =============================================================================
// Loader Handle
// =============================================================================

/// Handle returned by [`mount_loader`].
///
/// There is deliberately no unmount: the engine handle lives for the
/// process and is never torn down or recreated.
#[derive(Debug)]
pub struct LoaderHandle {
    context: TypesetContext,
}

impl LoaderHandle {
    /// The configuration bundle for nodes under this loader.
    pub fn context(&self) -> TypesetContext {
        self.context.clone()
    }

    /// Wait for the engine to finish loading.
    pub async fn engine(&self) -> EngineResult {
        self.context.handle().engine().await
    }
}

// =============================================================================
// Process State
// =============================================================================

thread_local! {
    /// The process-active loader, if any. One cooperative UI thread owns
    /// the whole tree, so thread-local is process-scoped here.
    static ACTIVE_LOADER: RefCell<Option<ActiveLoader>> = const { RefCell::new(None) };
}

struct ActiveLoader {
    version: EngineVersion,
    /// The root loader's context; nested loaders derive from it.
    context: TypesetContext,
}

// =============================================================================
// Mounting
// =============================================================================

/// Activate a loader.
///
/// First activation for the process injects the script (or settles the
/// handle rejected when no injector is available) and records the active
/// version. Subsequent activations with the same version reuse the existing
/// handle - the script-injection side effect happens exactly once per
/// process regardless of how many loaders or nodes mount. An activation
/// with a different version fails before any injection occurs.
pub fn mount_loader(props: LoaderProps) -> Result<LoaderHandle, ConfigurationError> {
    ACTIVE_LOADER.with(|slot| {
        let mut slot = slot.borrow_mut();

        if let Some(active) = slot.as_ref() {
            if active.version != props.version {
                return Err(ConfigurationError::VersionConflict {
                    active: active.version,
                    requested: props.version,
                });
            }
            debug!(version = %props.version, "reusing active engine handle");
            return Ok(LoaderHandle {
                context: active.context.with_overrides(&props),
            });
        }

        let version = props.version;
        let src = props
            .src
            .clone()
            .unwrap_or_else(|| default_src(version).to_string());
        let request = InjectionRequest {
            version,
            src: src.clone(),
            config: props.config.clone(),
        };

        debug!(version = %version, src = %src, "injecting engine script");
        let load = match &props.injector {
            Some(injector) => injector.inject(request),
            None => HeadlessInjector.inject(request),
        };

        // Callback chain: startup then load on success; on_error (or an
        // escalated error event) on rejection. Runs once, when the shared
        // handle first settles.
        let on_startup = props.on_startup.clone();
        let on_load = props.on_load.clone();
        let on_error = props.on_error.clone();
        let observed = async move {
            let result = load.await;
            match &result {
                Ok(engine) => {
                    if let Some(callback) = &on_startup {
                        callback(engine);
                    }
                    if let Some(callback) = &on_load {
                        callback();
                    }
                }
                Err(failure) => match &on_error {
                    Some(callback) => callback(failure),
                    None => error!(%failure, "engine load failed and no error handler is set"),
                },
            }
            result
        }
        .boxed_local();

        let handle = EngineHandle::new(observed);
        let context = TypesetContext::new(version, handle, &props);
        *slot = Some(ActiveLoader {
            version,
            context: context.clone(),
        });

        Ok(LoaderHandle { context })
    })
}

/// The root loader's context, if a loader is active in the process.
///
/// Nodes mounted without an explicit context use this to find their
/// ancestor loader (and to report the misconfiguration when there is none).
pub fn active_context() -> Option<TypesetContext> {
    ACTIVE_LOADER.with(|slot| slot.borrow().as_ref().map(|active| active.context.clone()))
}

/// Reset all loader state (for testing).
///
/// The production lifecycle never tears the handle down; tests need a
/// fresh process state per case.
pub fn reset_loader_state() {
    ACTIVE_LOADER.with(|slot| {
        *slot.borrow_mut() = None;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineV2, TaskQueue};
    use crate::node::NodeHandle;
    use std::cell::Cell;

    struct NoopV2;

    impl EngineV2 for NoopV2 {
        fn hub_queue(&self) -> Rc<TaskQueue> {
            Rc::new(TaskQueue::new())
        }

        fn typeset_node(&self, _node: &NodeHandle) {}
    }

    /// Injector resolving to a fresh v2 engine, counting injections.
    struct CountingInjector {
        injections: Rc<Cell<usize>>,
    }

    impl ScriptInjector for CountingInjector {
        fn inject(
            &self,
            _request: InjectionRequest,
        ) -> futures::future::LocalBoxFuture<'static, Result<Engine, LoadFailure>> {
            self.injections.set(self.injections.get() + 1);
            futures::future::ready(Ok(Engine::V2(Rc::new(NoopV2)))).boxed_local()
        }
    }

    fn counting_injector() -> (Rc<CountingInjector>, Rc<Cell<usize>>) {
        let injections = Rc::new(Cell::new(0));
        (
            Rc::new(CountingInjector {
                injections: injections.clone(),
            }),
            injections,
        )
    }

    #[test]
    fn test_single_injection_across_activations() {
        reset_loader_state();
        let (injector, injections) = counting_injector();

        let first = mount_loader(LoaderProps {
            version: EngineVersion::V2,
            injector: Some(injector.clone()),
            ..Default::default()
        })
        .unwrap();
        let second = mount_loader(LoaderProps {
            version: EngineVersion::V2,
            injector: Some(injector),
            ..Default::default()
        })
        .unwrap();

        let a = futures::executor::block_on(first.engine()).unwrap();
        let b = futures::executor::block_on(second.engine()).unwrap();

        assert_eq!(injections.get(), 1);
        let (Engine::V2(a), Engine::V2(b)) = (a, b) else {
            panic!("expected v2 engines");
        };
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_version_conflict_before_second_injection() {
        reset_loader_state();
        let (injector_a, _) = counting_injector();
        let (injector_b, injections_b) = counting_injector();

        mount_loader(LoaderProps {
            version: EngineVersion::V2,
            injector: Some(injector_a),
            ..Default::default()
        })
        .unwrap();

        let err = mount_loader(LoaderProps {
            version: EngineVersion::V3,
            injector: Some(injector_b),
            ..Default::default()
        })
        .unwrap_err();

        assert_eq!(
            err,
            ConfigurationError::VersionConflict {
                active: EngineVersion::V2,
                requested: EngineVersion::V3,
            }
        );
        assert_eq!(injections_b.get(), 0);
    }

    #[test]
    fn test_nested_overrides_are_scoped() {
        reset_loader_state();
        let (injector, _) = counting_injector();

        let root = mount_loader(LoaderProps {
            version: EngineVersion::V2,
            injector: Some(injector),
            hide_until_typeset: Some(HideUntilTypeset::First),
            ..Default::default()
        })
        .unwrap();

        let nested = mount_loader(LoaderProps {
            version: EngineVersion::V2,
            render_mode: Some(RenderMode::Pre),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(nested.context().render_mode(), RenderMode::Pre);
        // Inherited where not overridden.
        assert_eq!(
            nested.context().hide_until_typeset(),
            HideUntilTypeset::First
        );
        // Root context untouched.
        assert_eq!(root.context().render_mode(), RenderMode::Post);
        assert_eq!(
            active_context().unwrap().render_mode(),
            RenderMode::Post
        );
    }

    #[test]
    fn test_no_injector_settles_rejected() {
        reset_loader_state();
        let loader = mount_loader(LoaderProps::default()).unwrap();
        let outcome = futures::executor::block_on(loader.engine());
        assert!(matches!(outcome, Err(LoadFailure::NoDocument)));
    }

    #[test]
    fn test_callback_chain_on_success() {
        reset_loader_state();
        let (injector, _) = counting_injector();
        let log = Rc::new(RefCell::new(Vec::new()));

        let startup_log = log.clone();
        let load_log = log.clone();
        let loader = mount_loader(LoaderProps {
            version: EngineVersion::V2,
            injector: Some(injector),
            on_startup: Some(Rc::new(move |engine| {
                startup_log
                    .borrow_mut()
                    .push(format!("startup v{}", engine.version()));
            })),
            on_load: Some(Rc::new(move || load_log.borrow_mut().push("load".into()))),
            ..Default::default()
        })
        .unwrap();

        // Not yet settled, not yet fired.
        assert!(log.borrow().is_empty());

        futures::executor::block_on(loader.engine()).unwrap();
        futures::executor::block_on(loader.engine()).unwrap();

        assert_eq!(*log.borrow(), vec!["startup v2".to_string(), "load".to_string()]);
    }

    #[test]
    fn test_on_error_receives_failure() {
        reset_loader_state();
        let seen = Rc::new(RefCell::new(None));

        let sink = seen.clone();
        let loader = mount_loader(LoaderProps {
            on_error: Some(Rc::new(move |failure: &LoadFailure| {
                *sink.borrow_mut() = Some(failure.clone());
            })),
            ..Default::default()
        })
        .unwrap();

        let _ = futures::executor::block_on(loader.engine());
        assert_eq!(*seen.borrow(), Some(LoadFailure::NoDocument));
    }

    #[test]
    fn test_active_context_requires_mount() {
        reset_loader_state();
        assert!(active_context().is_none());

        let (injector, _) = counting_injector();
        mount_loader(LoaderProps {
            version: EngineVersion::V2,
            injector: Some(injector),
            ..Default::default()
        })
        .unwrap();
        assert!(active_context().is_some());

        reset_loader_state();
        assert!(active_context().is_none());
    }
}
