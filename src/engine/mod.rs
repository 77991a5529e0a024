// FILE: src/engine/mod.rs

//! The value-resolution engine: node arena, symbol evaluation, geometry
//! derivation, scoping, invalidation and the layout pass.

pub mod constancy;
pub mod diagnostics;
pub mod evaluator;
pub mod geometry;
pub mod invalidation;
pub mod layout;
pub mod node;
pub mod scope;
pub mod tree;

pub use diagnostics::{suggest, ErrorRecord, Warning};
pub use evaluator::{EvaluationStack, EvaluationStats, Frame, SymbolDelegate};
pub use layout::UpdateReport;
pub use node::{Node, NodeSpec};
pub use tree::{LayoutTree, UpdateLock};
