//! Typesetting Lifecycle Controller.
//!
//! One controller per typeset node. It owns the node's private state
//! machine (Idle -> Requesting -> Settled), decides whether an input change
//! warrants an engine call, guarantees at most one call in flight per node,
//! applies the visibility policy around each pass, and reconciles the
//! result back into the node before surfacing any failure.
//!
//! The controller never spawns: a scheduled pass is returned to the host as
//! a [`Pass`] future to drive however its runtime likes. Everything before
//! the first await point (precondition checks, coalescing, hide-on-start)
//! happens synchronously inside [`TypesetController::on_inputs_changed`].

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use tracing::{debug, trace};

use crate::engine::{ConversionRequest, Engine};
use crate::error::{ConfigurationError, TypesetFailure};
use crate::loader::{self, EngineHandle, TypesetContext};
use crate::types::{
    ConversionOptions, DisplayStyle, EngineVersion, HideUntilTypeset, NodeFlags, RenderMode,
};

use super::{NodeHandle, NodeProps, ResolvedNodeConfig, TypesetCallback, TypesetTarget};

// =============================================================================
// Pass
// =============================================================================

/// One scheduled typesetting pass, ready to be driven by the host.
///
/// Settles with `Ok` on success or with the normalized failure after the
/// node has been reconciled. Dropping a `Pass` without driving it leaves
/// the node marked in-flight; hosts that schedule a pass must run it.
pub struct Pass {
    fut: LocalBoxFuture<'static, Result<(), TypesetFailure>>,
}

impl Future for Pass {
    type Output = Result<(), TypesetFailure>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.fut.poll_unpin(cx)
    }
}

impl std::fmt::Debug for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pass").finish_non_exhaustive()
    }
}

// =============================================================================
// Pass Decision
// =============================================================================

/// Why an input change did not schedule a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Static node already completed its single pass; updates are ignored.
    StaticComplete,
    /// A pass is already in flight; the new request is coalesced away.
    InFlight,
    /// Nothing to do - `pre` mode and the submitted text did not change.
    Unchanged,
}

/// Outcome of evaluating the state machine against new inputs.
#[derive(Debug)]
pub enum PassDecision {
    /// Exactly one engine call was scheduled; drive the pass to settle it.
    Scheduled(Pass),
    /// No engine call; the reason says why.
    Skipped(SkipReason),
}

impl PassDecision {
    /// Whether a pass was scheduled.
    pub fn is_scheduled(&self) -> bool {
        matches!(self, PassDecision::Scheduled(_))
    }

    /// The scheduled pass, if any.
    pub fn pass(self) -> Option<Pass> {
        match self {
            PassDecision::Scheduled(pass) => Some(pass),
            PassDecision::Skipped(_) => None,
        }
    }

    /// The skip reason, if no pass was scheduled.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            PassDecision::Scheduled(_) => None,
            PassDecision::Skipped(reason) => Some(*reason),
        }
    }
}

// =============================================================================
// Node State
// =============================================================================

#[derive(Default)]
struct NodeState {
    flags: NodeFlags,
    /// Text most recently converted successfully (`pre` mode); detects
    /// that re-conversion is unnecessary.
    last_source_text: String,
}

/// What a scheduled pass will actually do, fixed at decision time after
/// the preconditions passed.
enum PassPlan {
    Post,
    Pre {
        text: String,
        conversion: ConversionOptions,
        display: bool,
    },
}

// =============================================================================
// Controller
// =============================================================================

/// The per-node lifecycle controller.
///
/// Holds its target weakly: a node that unmounts mid-flight simply has the
/// late result discarded. Dropping the controller is unmounting - there is
/// no other teardown.
pub struct TypesetController {
    ctx: TypesetContext,
    config: ResolvedNodeConfig,
    target: Weak<dyn TypesetTarget>,
    on_init_typeset: Option<TypesetCallback>,
    on_typeset: Option<TypesetCallback>,
    text: Option<String>,
    state: Rc<RefCell<NodeState>>,
}

impl TypesetController {
    /// Mount a controller for `target` under the given loader context.
    ///
    /// Applies the initial visibility: any hide policy means the node
    /// starts hidden until its first pass settles.
    pub fn mount(ctx: &TypesetContext, target: &NodeHandle, props: NodeProps) -> Self {
        let config = ResolvedNodeConfig::resolve(&props, ctx);
        if config.hide_until_typeset != HideUntilTypeset::None {
            target.set_visible(false);
        }
        Self {
            ctx: ctx.clone(),
            config,
            target: Rc::downgrade(target),
            on_init_typeset: props.on_init_typeset.clone(),
            on_typeset: props.on_typeset.clone(),
            text: props.text.clone(),
            state: Rc::new(RefCell::new(NodeState::default())),
        }
    }

    /// Mount against the process-active loader.
    pub fn mount_active(target: &NodeHandle, props: NodeProps) -> Result<Self, ConfigurationError> {
        let ctx = loader::active_context().ok_or(ConfigurationError::NoActiveLoader)?;
        Ok(Self::mount(&ctx, target, props))
    }

    /// The display mode the host should give this node's container.
    pub fn display_style(&self) -> DisplayStyle {
        DisplayStyle::for_inline(self.config.inline)
    }

    /// Current lifecycle flags.
    pub fn flags(&self) -> NodeFlags {
        self.state.borrow().flags
    }

    /// Text most recently submitted for conversion (`pre` mode).
    pub fn last_source_text(&self) -> String {
        self.state.borrow().last_source_text.clone()
    }

    /// Feed new inputs into the state machine.
    ///
    /// This is the explicit re-render trigger: the host calls it whenever
    /// the node's inputs may have changed (including "the UI re-rendered
    /// with identical inputs", which still re-typesets `post` nodes).
    pub fn on_inputs_changed(
        &mut self,
        text: Option<String>,
    ) -> Result<PassDecision, ConfigurationError> {
        self.text = text;
        self.request_pass()
    }

    /// Evaluate the state machine against the current inputs.
    pub fn request_pass(&self) -> Result<PassDecision, ConfigurationError> {
        let flags = self.state.borrow().flags;

        // Static nodes perform at most one pass, then ignore everything.
        if !self.config.dynamic && flags.contains(NodeFlags::INITIALIZED) {
            return Ok(PassDecision::Skipped(SkipReason::StaticComplete));
        }

        // Precondition failures are reported before any engine call, in
        // flight or not.
        let plan = self.plan()?;

        let changed =
            self.text.as_deref().unwrap_or_default() != self.state.borrow().last_source_text;
        let triggered = self.config.render_mode == RenderMode::Post
            || !flags.contains(NodeFlags::INITIALIZED)
            || changed;
        if !triggered {
            return Ok(PassDecision::Skipped(SkipReason::Unchanged));
        }

        // Coalesce: at most one call in flight per node; the in-flight
        // pass will observe the node's state when it settles.
        if flags.contains(NodeFlags::IN_FLIGHT) {
            return Ok(PassDecision::Skipped(SkipReason::InFlight));
        }

        self.state.borrow_mut().flags.insert(NodeFlags::IN_FLIGHT);
        if self.config.hides_every_pass() {
            if let Some(node) = self.target.upgrade() {
                node.set_visible(false);
            }
        }

        trace!(mode = ?self.config.render_mode, version = %self.ctx.version(), "typeset pass scheduled");
        Ok(PassDecision::Scheduled(self.build_pass(plan)))
    }

    fn plan(&self) -> Result<PassPlan, ConfigurationError> {
        match self.config.render_mode {
            RenderMode::Post => Ok(PassPlan::Post),
            RenderMode::Pre => {
                let text = self.text.as_deref().unwrap_or_default();
                if text.is_empty() {
                    return Err(ConfigurationError::MissingSourceText);
                }
                let Some(conversion) = self.config.conversion.clone() else {
                    return Err(ConfigurationError::MissingConversionFunction);
                };
                if self.ctx.version() == EngineVersion::V2 {
                    return Err(ConfigurationError::PreModeUnsupported {
                        active: EngineVersion::V2,
                    });
                }
                Ok(PassPlan::Pre {
                    text: text.to_string(),
                    conversion,
                    display: !self.config.inline,
                })
            }
        }
    }

    fn build_pass(&self, plan: PassPlan) -> Pass {
        let handle = self.ctx.handle().clone();
        let target = self.target.clone();
        let state = Rc::clone(&self.state);
        let config = self.config.clone();
        let on_init_typeset = self.on_init_typeset.clone();
        let on_typeset = self.on_typeset.clone();

        let fut = async move {
            let result = dispatch(handle, plan, &target, &state).await;
            // Reconcile before surfacing anything: the node must not stay
            // hidden because a pass rejected.
            settle(
                &target,
                &state,
                &config,
                on_init_typeset.as_ref(),
                on_typeset.as_ref(),
            );
            result.inspect_err(|failure| debug!(%failure, "typeset pass rejected"))
        }
        .boxed_local();
        Pass { fut }
    }
}

// =============================================================================
// Pass Execution
// =============================================================================

/// Dispatch exactly one engine call appropriate to version and mode.
async fn dispatch(
    handle: EngineHandle,
    plan: PassPlan,
    target: &Weak<dyn TypesetTarget>,
    state: &Rc<RefCell<NodeState>>,
) -> Result<(), TypesetFailure> {
    let engine = handle.engine().await?;
    match engine {
        Engine::V3(engine) => {
            // The handle resolving only means the script loaded; wait for
            // the engine's own startup before touching content.
            engine.ready().await?;
            match plan {
                PassPlan::Post => {
                    let Some(node) = target.upgrade() else {
                        // Unmounted mid-flight: discard.
                        return Ok(());
                    };
                    engine.typeset_clear(std::slice::from_ref(&node));
                    engine.typeset(std::slice::from_ref(&node)).await?;
                }
                PassPlan::Pre {
                    text,
                    conversion,
                    display,
                } => {
                    let request = ConversionRequest {
                        function: conversion.function,
                        text: text.clone(),
                        params: conversion.params.clone(),
                        display,
                    };
                    let markup = if conversion.function.is_promise() {
                        engine.convert_async(&request).await?
                    } else {
                        engine.convert_sync(&request)?
                    };
                    state.borrow_mut().last_source_text = text;
                    engine.reset_document();
                    if let Some(node) = target.upgrade() {
                        node.set_markup(&markup);
                    }
                }
            }
        }
        Engine::V2(engine) => {
            // Pre under v2 was rejected before scheduling; only post work
            // reaches the hub queue. The completion callback joins the
            // same queue so ordering holds relative to other engine work.
            let queue = engine.hub_queue();
            let (done, settled) = oneshot::channel();
            {
                let engine = engine.clone();
                let target = target.clone();
                queue.enqueue(move || {
                    if let Some(node) = target.upgrade() {
                        engine.typeset_node(&node);
                    }
                });
            }
            queue.enqueue(move || {
                let _ = done.send(());
            });
            settled
                .await
                .map_err(|_| TypesetFailure::new("engine queue dropped the completion callback"))?;
        }
    }
    Ok(())
}

/// Settle reconciliation - runs on success and failure alike.
fn settle(
    target: &Weak<dyn TypesetTarget>,
    state: &Rc<RefCell<NodeState>>,
    config: &ResolvedNodeConfig,
    on_init_typeset: Option<&TypesetCallback>,
    on_typeset: Option<&TypesetCallback>,
) {
    if config.hides_every_pass() {
        if let Some(node) = target.upgrade() {
            node.set_visible(true);
        }
    }

    let first = !state.borrow().flags.contains(NodeFlags::INITIALIZED);
    if first {
        // First-settle reveal for the `First` policy and for `Every`
        // degraded outside dynamic post; the per-pass cycle above already
        // covered the non-degraded case.
        if config.hide_until_typeset != HideUntilTypeset::None && !config.hides_every_pass() {
            if let Some(node) = target.upgrade() {
                node.set_visible(true);
            }
        }
        if let Some(callback) = on_init_typeset {
            callback();
        }
        state.borrow_mut().flags.insert(NodeFlags::INITIALIZED);
    }

    if let Some(callback) = on_typeset {
        callback();
    }
    state.borrow_mut().flags.remove(NodeFlags::IN_FLIGHT);
}
