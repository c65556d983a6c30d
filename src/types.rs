//! Core types for typeset-bridge.
//!
//! These types define the configuration vocabulary that flows from the
//! loader down through every typeset node: which engine version is active,
//! how a node is rendered, when it is hidden, and which conversion entry
//! point is used for pre-rendered source text.

use std::fmt;

// =============================================================================
// Engine Version
// =============================================================================

/// Which engine API generation is in effect.
///
/// Fixed for the process lifetime once any loader mounts - the two
/// generations expose incompatible call contracts and cannot coexist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineVersion {
    /// Legacy API: work is queued on the engine's serial hub queue.
    V2,
    /// Current API: promise-based startup, typesetting, and conversion.
    #[default]
    V3,
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineVersion::V2 => write!(f, "2"),
            EngineVersion::V3 => write!(f, "3"),
        }
    }
}

// =============================================================================
// Render Mode
// =============================================================================

/// How a node's content reaches the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Convert standalone source text into markup, replacing node content.
    ///
    /// Only available under [`EngineVersion::V3`]; requires a configured
    /// conversion function and non-empty text.
    Pre,
    /// Typeset markup already present inside the node, in place.
    #[default]
    Post,
}

// =============================================================================
// Visibility Policy
// =============================================================================

/// When the controller hides a node to mask untypeset content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HideUntilTypeset {
    /// Never explicitly hidden by the controller.
    #[default]
    None,
    /// Hidden from mount until the first pass settles, then always visible.
    First,
    /// Hidden at the start of every pass and revealed when it settles.
    ///
    /// Only effective for dynamic [`RenderMode::Post`] nodes; in every other
    /// combination this degrades to the `First` behavior because nothing
    /// guarantees a re-render that would reveal the node again.
    Every,
}

// =============================================================================
// Display Style
// =============================================================================

/// The display mode a host should give a typeset node's container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStyle {
    Inline,
    Block,
}

impl DisplayStyle {
    /// Style for a node's `inline` setting.
    pub const fn for_inline(inline: bool) -> Self {
        if inline {
            DisplayStyle::Inline
        } else {
            DisplayStyle::Block
        }
    }

    /// CSS value for this style.
    pub const fn as_css(&self) -> &'static str {
        match self {
            DisplayStyle::Inline => "inline",
            DisplayStyle::Block => "block",
        }
    }
}

// =============================================================================
// Conversion Functions (v3, pre mode)
// =============================================================================

/// Named conversion entry points the v3 engine exposes.
///
/// Each source format has chtml/svg/mml output variants, and each of those a
/// synchronous and a future-returning (`…Promise`) form. The engine
/// distinguishes the two forms purely by name, so callers must check
/// [`ConversionFunction::is_promise`] before dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionFunction {
    Tex2Chtml,
    Tex2ChtmlPromise,
    Tex2Svg,
    Tex2SvgPromise,
    Tex2Mml,
    Tex2MmlPromise,
    Mathml2Chtml,
    Mathml2ChtmlPromise,
    Mathml2Svg,
    Mathml2SvgPromise,
    Mathml2Mml,
    Mathml2MmlPromise,
    Asciimath2Chtml,
    Asciimath2ChtmlPromise,
    Asciimath2Svg,
    Asciimath2SvgPromise,
    Asciimath2Mml,
    Asciimath2MmlPromise,
}

impl ConversionFunction {
    const ALL: [ConversionFunction; 18] = [
        ConversionFunction::Tex2Chtml,
        ConversionFunction::Tex2ChtmlPromise,
        ConversionFunction::Tex2Svg,
        ConversionFunction::Tex2SvgPromise,
        ConversionFunction::Tex2Mml,
        ConversionFunction::Tex2MmlPromise,
        ConversionFunction::Mathml2Chtml,
        ConversionFunction::Mathml2ChtmlPromise,
        ConversionFunction::Mathml2Svg,
        ConversionFunction::Mathml2SvgPromise,
        ConversionFunction::Mathml2Mml,
        ConversionFunction::Mathml2MmlPromise,
        ConversionFunction::Asciimath2Chtml,
        ConversionFunction::Asciimath2ChtmlPromise,
        ConversionFunction::Asciimath2Svg,
        ConversionFunction::Asciimath2SvgPromise,
        ConversionFunction::Asciimath2Mml,
        ConversionFunction::Asciimath2MmlPromise,
    ];

    /// The exact engine-facing function name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConversionFunction::Tex2Chtml => "tex2chtml",
            ConversionFunction::Tex2ChtmlPromise => "tex2chtmlPromise",
            ConversionFunction::Tex2Svg => "tex2svg",
            ConversionFunction::Tex2SvgPromise => "tex2svgPromise",
            ConversionFunction::Tex2Mml => "tex2mml",
            ConversionFunction::Tex2MmlPromise => "tex2mmlPromise",
            ConversionFunction::Mathml2Chtml => "mathml2chtml",
            ConversionFunction::Mathml2ChtmlPromise => "mathml2chtmlPromise",
            ConversionFunction::Mathml2Svg => "mathml2svg",
            ConversionFunction::Mathml2SvgPromise => "mathml2svgPromise",
            ConversionFunction::Mathml2Mml => "mathml2mml",
            ConversionFunction::Mathml2MmlPromise => "mathml2mmlPromise",
            ConversionFunction::Asciimath2Chtml => "asciimath2chtml",
            ConversionFunction::Asciimath2ChtmlPromise => "asciimath2chtmlPromise",
            ConversionFunction::Asciimath2Svg => "asciimath2svg",
            ConversionFunction::Asciimath2SvgPromise => "asciimath2svgPromise",
            ConversionFunction::Asciimath2Mml => "asciimath2mml",
            ConversionFunction::Asciimath2MmlPromise => "asciimath2mmlPromise",
        }
    }

    /// Look up a function by its engine-facing name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == name)
    }

    /// Whether this is a future-returning variant (the engine's naming
    /// convention: promise forms end in `Promise`).
    pub fn is_promise(&self) -> bool {
        self.as_str().ends_with("Promise")
    }
}

impl fmt::Display for ConversionFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Conversion Options
// =============================================================================

/// Conversion entry point plus its engine-specific parameters.
///
/// Only meaningful in [`RenderMode::Pre`]. The `display` flag is not part of
/// the parameters - the controller merges it in at call time from the node's
/// `inline` setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Which entry point to invoke.
    pub function: ConversionFunction,
    /// Opaque engine-specific parameter bag, passed through unmodified.
    pub params: serde_json::Value,
}

impl ConversionOptions {
    /// Options for a function with no extra parameters.
    pub fn new(function: ConversionFunction) -> Self {
        Self {
            function,
            params: serde_json::Value::Null,
        }
    }

    /// Options for a function with an engine-specific parameter bag.
    pub fn with_params(function: ConversionFunction, params: serde_json::Value) -> Self {
        Self { function, params }
    }
}

// =============================================================================
// Node State Flags (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Per-node lifecycle flags.
    ///
    /// Combine with bitwise OR: `NodeFlags::INITIALIZED | NodeFlags::IN_FLIGHT`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        const NONE = 0;
        /// The first pass (success or failure) has settled for this node.
        const INITIALIZED = 1 << 0;
        /// A typesetting call is currently pending; at most one at a time.
        const IN_FLIGHT = 1 << 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_display() {
        assert_eq!(EngineVersion::V2.to_string(), "2");
        assert_eq!(EngineVersion::V3.to_string(), "3");
        assert_eq!(EngineVersion::default(), EngineVersion::V3);
    }

    #[test]
    fn test_conversion_function_names() {
        assert_eq!(ConversionFunction::Tex2Chtml.as_str(), "tex2chtml");
        assert_eq!(
            ConversionFunction::Asciimath2MmlPromise.as_str(),
            "asciimath2mmlPromise"
        );
        assert_eq!(
            ConversionFunction::from_name("mathml2svgPromise"),
            Some(ConversionFunction::Mathml2SvgPromise)
        );
        assert_eq!(ConversionFunction::from_name("tex2pdf"), None);
    }

    #[test]
    fn test_promise_convention() {
        assert!(!ConversionFunction::Tex2Chtml.is_promise());
        assert!(ConversionFunction::Tex2ChtmlPromise.is_promise());
        assert!(ConversionFunction::Mathml2MmlPromise.is_promise());
        assert!(!ConversionFunction::Asciimath2Svg.is_promise());
    }

    #[test]
    fn test_name_round_trip() {
        for name in [
            "tex2chtml",
            "tex2svgPromise",
            "mathml2mml",
            "asciimath2chtmlPromise",
        ] {
            let function = ConversionFunction::from_name(name).unwrap();
            assert_eq!(function.as_str(), name);
        }
    }

    #[test]
    fn test_display_style() {
        assert_eq!(DisplayStyle::for_inline(true).as_css(), "inline");
        assert_eq!(DisplayStyle::for_inline(false).as_css(), "block");
    }

    #[test]
    fn test_node_flags() {
        let mut flags = NodeFlags::NONE;
        assert!(!flags.contains(NodeFlags::INITIALIZED));

        flags.insert(NodeFlags::IN_FLIGHT);
        assert!(flags.contains(NodeFlags::IN_FLIGHT));

        flags.insert(NodeFlags::INITIALIZED);
        flags.remove(NodeFlags::IN_FLIGHT);
        assert!(flags.contains(NodeFlags::INITIALIZED));
        assert!(!flags.contains(NodeFlags::IN_FLIGHT));
    }
}
