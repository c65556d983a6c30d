//! Typeset nodes - the per-node surface and configuration.
//!
//! A typeset node is one spot in the host's UI tree whose content the
//! engine transforms. The host exposes that spot through [`TypesetTarget`]
//! (the only three mutations the controller ever performs) and configures
//! it with [`NodeProps`]; unset props inherit from the nearest loader's
//! [`TypesetContext`](crate::loader::TypesetContext).

pub mod controller;

use std::rc::Rc;

use crate::loader::TypesetContext;
use crate::types::{ConversionOptions, HideUntilTypeset, RenderMode};

pub use controller::{Pass, PassDecision, SkipReason, TypesetController};

// =============================================================================
// Target Seam
// =============================================================================

/// The minimal node surface the controller touches.
///
/// Everything else about the node (its children, layout, styling) belongs
/// to the host and is never inspected here.
pub trait TypesetTarget {
    /// Toggle the node's visibility (the controller's only styling tool).
    fn set_visible(&self, visible: bool);

    /// Replace the node's content with produced markup (`pre` mode).
    fn set_markup(&self, markup: &str);

    /// Remove previously produced typeset output from inside the node,
    /// leaving the source markup for a fresh `post` pass.
    fn clear_markup(&self);
}

/// Shared reference to a host node.
pub type NodeHandle = Rc<dyn TypesetTarget>;

// =============================================================================
// Callback Types
// =============================================================================

/// Fires once per settled pass.
pub type TypesetCallback = Rc<dyn Fn()>;

// =============================================================================
// Node Props
// =============================================================================

/// Per-node configuration.
///
/// `render_mode`, `hide_until_typeset`, and `conversion` inherit from the
/// nearest loader context when unset; the node's own value wins when set.
#[derive(Default)]
pub struct NodeProps {
    /// Inline vs block display; also sets the conversion `display` flag
    /// (display math is the non-inline form).
    pub inline: bool,
    /// Source text to convert (`pre` mode only).
    pub text: Option<String>,
    /// Whether the node re-runs its pass on later input changes. Defaults
    /// to on in debug builds and off in release builds.
    pub dynamic: Option<bool>,
    /// Fires once, on the node's very first settled pass.
    pub on_init_typeset: Option<TypesetCallback>,
    /// Fires on every settled pass.
    pub on_typeset: Option<TypesetCallback>,
    /// Conversion options override (`pre` mode only).
    pub conversion: Option<ConversionOptions>,
    /// Render mode override.
    pub render_mode: Option<RenderMode>,
    /// Visibility policy override.
    pub hide_until_typeset: Option<HideUntilTypeset>,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// A node's effective configuration after inheritance.
#[derive(Clone)]
pub(crate) struct ResolvedNodeConfig {
    pub inline: bool,
    pub dynamic: bool,
    pub render_mode: RenderMode,
    pub hide_until_typeset: HideUntilTypeset,
    pub conversion: Option<ConversionOptions>,
}

impl ResolvedNodeConfig {
    pub(crate) fn resolve(props: &NodeProps, ctx: &TypesetContext) -> Self {
        Self {
            inline: props.inline,
            dynamic: props.dynamic.unwrap_or(cfg!(debug_assertions)),
            render_mode: props.render_mode.unwrap_or_else(|| ctx.render_mode()),
            hide_until_typeset: props
                .hide_until_typeset
                .unwrap_or_else(|| ctx.hide_until_typeset()),
            conversion: props.conversion.clone().or_else(|| ctx.conversion().cloned()),
        }
    }

    /// Whether the `Every` policy actually re-hides on each pass. Outside
    /// dynamic `post` nodes it degrades to the `First` behavior.
    pub(crate) fn hides_every_pass(&self) -> bool {
        self.hide_until_typeset == HideUntilTypeset::Every
            && self.dynamic
            && self.render_mode == RenderMode::Post
    }
}
