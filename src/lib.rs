//! Kryon Layout Engine
//!
//! Nodes derive their geometry and properties from small textual
//! expressions (`"parent.width - 20"`, `"50%"`, `"previous.bottom + 8"`)
//! that are re-evaluated incrementally whenever their inputs change.
//!
//! # Features
//!
//! - Expression language with percentages, ternaries, functions and `{}` interpolation
//! - Hierarchical symbol scoping: state, constants, macros, parameters
//! - Structural references: `parent.*`, `previous.*`, `next.*`, `#id.*`, `strings.*`
//! - Geometry derivation for legacy and modern layout modes, both writing directions
//! - Per-pass memoization with constant classification and dependency-aware invalidation
//! - Self-reference and circular-reference detection with the exact symbol path
//! - Error bubbling with suggestions for unknown symbols
//!
//! # Basic Usage
//!
//! ```rust
//! use krylay::{LayoutOptions, LayoutTree, NodeSpec, Value};
//!
//! let mut tree = LayoutTree::new(LayoutOptions::default());
//! let root = tree.create_node(NodeSpec::new("View").attribute("width", "100%"));
//! let card = tree.create_node(
//!     NodeSpec::new("View")
//!         .attribute("left", "16")
//!         .attribute("width", "parent.width - 32"),
//! );
//! tree.add_child(root, card).unwrap();
//!
//! assert_eq!(tree.resolve(card, "right").unwrap(), Value::Number(16.0));
//! ```
//!
//! # Resolution Pipeline
//!
//! 1. **Compiler** - parse, rewrite percentages, inline macros, fold constants
//! 2. **Evaluator** - attribute, state, constants, parameters, delegate
//! 3. **Geometry** - derived positional and size symbols
//! 4. **Scope** - host getters and structural references
//! 5. **Invalidation** - pass counter and dependent edges keep caches honest

pub mod cli;
pub mod compiler;
pub mod core;
pub mod document;
pub mod engine;
pub mod error;

use crate::core::types::{Direction, LayoutMode, Size};
use serde::{Deserialize, Serialize};

pub use crate::compiler::{compile, CompileScope, Expression};
pub use crate::core::properties::{Capability, CapabilityLookup, CapabilityRegistry, CapabilityTable, HostView};
pub use crate::core::types::{AttributeCategory, Axis, Color, Insets, NodeId, Rect, Value, ValueKind};
pub use crate::document::LayoutDocument;
pub use crate::engine::{
    ErrorRecord, EvaluationStats, Frame, LayoutTree, Node, NodeSpec, SymbolDelegate, UpdateLock,
    UpdateReport, Warning,
};
pub use crate::error::{LayoutError, Result};

/// Engine version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Engine build information
pub const BUILD_INFO: EngineInfo = EngineInfo {
    version: VERSION,
    name: NAME,
    description: DESCRIPTION,
    supported_features: &[
        "percentages",
        "interpolation",
        "macros",
        "parameters",
        "structural-references",
        "legacy-layout",
        "modern-layout",
        "right-to-left",
    ],
};

/// Engine information structure
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub version: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub supported_features: &'static [&'static str],
}

/// Tree-wide evaluation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// How `right`/`bottom` relate to `width`/`height`
    pub layout_mode: LayoutMode,

    /// Direction of nodes that neither set one nor inherit one
    pub default_direction: Direction,

    /// Keep unhandled errors for the overlay instead of only logging them
    pub debug_mode: bool,

    /// Maximum number of suggestions attached to an unknown symbol
    pub max_suggestions: usize,

    /// Size the root's `containerSize` and `parent.*` refer to
    pub root_container: Size,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            layout_mode: LayoutMode::Modern,
            default_direction: Direction::LeftToRight,
            debug_mode: false,
            max_suggestions: 3,
            root_container: Size::new(375.0, 667.0),
        }
    }
}

/// Load a layout document and run one layout pass over it
pub fn evaluate_file(path: &str, options: LayoutOptions) -> Result<(LayoutTree, UpdateReport)> {
    if options.debug_mode {
        log::info!("{} v{}", NAME, VERSION);
        log::info!("Evaluating '{}'...", path);
        log::debug!("Layout options: {:?}", options);
    }

    let (mut tree, _root) = document::load_file(path, options)?;
    let report = tree.update();

    log::debug!(
        "Evaluated {} node(s), {} error(s), {} warning(s)",
        report.nodes,
        report.errors.len(),
        report.warnings.len()
    );
    Ok((tree, report))
}

/// Check if the engine supports a specific feature
pub fn supports_feature(feature: &str) -> bool {
    BUILD_INFO.supported_features.contains(&feature)
}

/// Get engine build information
pub fn build_info() -> &'static EngineInfo {
    &BUILD_INFO
}
