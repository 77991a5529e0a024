// FILE: src/engine/evaluator.rs

//! Symbol evaluation: lookup order, per-pass memoization and
//! self-reference / circular-reference detection.

use crate::compiler::{self, Expression};
use crate::core::constants::{geometry_category, is_geometry_symbol};
use crate::core::properties::CapabilityLookup;
use crate::core::types::{AttributeCategory, NodeId, Value, ValueKind};
use crate::engine::scope::NodeScope;
use crate::engine::tree::LayoutTree;
use crate::error::{LayoutError, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Host hook consulted after state, constants and parameters, before geometry
pub trait SymbolDelegate {
    fn value_for_symbol(&self, node: NodeId, symbol: &str) -> Option<Value>;
}

#[derive(Debug, Clone)]
pub(crate) enum CachedValue {
    /// Classified constant; survives pass changes
    Fixed(Value),
    Pass { value: Value, pass: u64 },
}

/// Per-node memoization, discarded by invalidation
#[derive(Debug, Default)]
pub(crate) struct SymbolCache {
    pub(crate) evaluators: HashMap<String, Rc<Expression>>,
    pub(crate) values: HashMap<String, CachedValue>,
    pub(crate) constancy: HashMap<String, bool>,
    /// Nodes whose cached results read symbols of this node
    pub(crate) dependents: HashSet<NodeId>,
}

impl SymbolCache {
    pub(crate) fn clear(&mut self) -> HashSet<NodeId> {
        self.evaluators.clear();
        self.values.clear();
        self.constancy.clear();
        std::mem::take(&mut self.dependents)
    }
}

/// One in-progress symbol evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub node: NodeId,
    pub symbol: String,
}

/// Symbols currently being evaluated, innermost last
#[derive(Debug, Default)]
pub struct EvaluationStack {
    frames: Vec<Frame>,
    last_trail: Vec<Frame>,
}

impl EvaluationStack {
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn contains(&self, node: NodeId, symbol: &str) -> bool {
        self.frames
            .iter()
            .any(|f| f.node == node && f.symbol == symbol)
    }

    /// Innermost symbol being evaluated on `node`
    pub fn top_for(&self, node: NodeId) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .find(|f| f.node == node)
            .map(|f| f.symbol.as_str())
    }

    /// Frames from the first evaluation of `(node, symbol)` to the innermost one
    fn cycle(&self, node: NodeId, symbol: &str) -> &[Frame] {
        let start = self
            .frames
            .iter()
            .position(|f| f.node == node && f.symbol == symbol)
            .unwrap_or(0);
        &self.frames[start..]
    }

    fn push(&mut self, node: NodeId, symbol: &str) {
        self.frames.push(Frame {
            node,
            symbol: symbol.to_string(),
        });
    }

    fn pop(&mut self) {
        self.frames.pop();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationStats {
    /// Uncached resolutions
    pub evaluations: usize,
    pub cache_hits: usize,
    /// Cache hits on values classified constant
    pub constant_hits: usize,
    pub compilations: usize,
    pub invalidations: usize,
}

impl LayoutTree {
    /// Resolve `symbol` for `node`.
    ///
    /// Order: explicit attribute, state, constants, ancestor parameter,
    /// delegate, geometry, host getter, structural reference.
    pub fn resolve(&mut self, node: NodeId, symbol: &str) -> Result<Value> {
        self.node(node)?;

        if let Some(caller) = self.stack.top().map(|f| f.node) {
            if caller != node {
                self.add_dependent(node, caller);
            }
        }

        if let Some(value) = self.cached_value(node, symbol) {
            return Ok(value);
        }

        if self.stack.contains(node, symbol) {
            return self.resolve_reentrant(node, symbol);
        }

        self.stack.push(node, symbol);
        let result = self.resolve_uncached(node, symbol);
        self.stack.pop();
        let value = result?;

        let constant = self.is_symbol_constant(node, symbol);
        let cached = if constant {
            CachedValue::Fixed(value.clone())
        } else {
            CachedValue::Pass {
                value: value.clone(),
                pass: self.pass,
            }
        };
        self.node_mut(node)?
            .cache
            .values
            .insert(symbol.to_string(), cached);

        Ok(value)
    }

    /// Resolve and cast to `kind`
    pub fn resolve_as(&mut self, node: NodeId, symbol: &str, kind: ValueKind) -> Result<Value> {
        let value = self.resolve(node, symbol)?;
        cast(symbol, value, kind)
    }

    /// Frames of the most recent self or circular reference
    pub fn evaluation_trail(&self) -> &[Frame] {
        &self.stack.last_trail
    }

    pub fn evaluation_stack(&self) -> &EvaluationStack {
        &self.stack
    }

    fn cached_value(&mut self, node: NodeId, symbol: &str) -> Option<Value> {
        let pass = self.pass;
        let cached = self.node(node).ok()?.cache.values.get(symbol)?;
        let (value, constant) = match cached {
            CachedValue::Fixed(value) => (value.clone(), true),
            CachedValue::Pass { value, pass: at } if *at == pass => (value.clone(), false),
            CachedValue::Pass { .. } => return None,
        };
        self.stats.cache_hits += 1;
        if constant {
            self.stats.constant_hits += 1;
        }
        Some(value)
    }

    /// `symbol` is already being evaluated on `node`
    fn resolve_reentrant(&mut self, node: NodeId, symbol: &str) -> Result<Value> {
        let innermost = self
            .stack
            .top()
            .map_or(false, |f| f.node == node && f.symbol == symbol);

        // An expression reading its own name means the state, constant or
        // parameter it shadows
        if innermost || self.stack.top_for(node) == Some(symbol) {
            if let Some(value) = self.shadowed_value(node, symbol)? {
                log::trace!("{}.{} resolved through shadowing", node, symbol);
                return Ok(value);
            }
        }

        self.stack.last_trail = self.stack.cycle(node, symbol).to_vec();
        if innermost {
            return Err(LayoutError::SelfReference {
                symbol: symbol.to_string(),
            });
        }

        let mut path: Vec<String> = self
            .stack
            .cycle(node, symbol)
            .iter()
            .map(|f| self.frame_label(node, f))
            .collect();
        path.push(symbol.to_string());
        Err(LayoutError::CircularReference {
            symbol: symbol.to_string(),
            path,
        })
    }

    fn frame_label(&self, origin: NodeId, frame: &Frame) -> String {
        if frame.node == origin {
            return frame.symbol.clone();
        }
        match self.node(frame.node).ok().and_then(|n| n.id()) {
            Some(id) => format!("#{}.{}", id, frame.symbol),
            None => format!("{}.{}", frame.node, frame.symbol),
        }
    }

    fn shadowed_value(&mut self, node: NodeId, symbol: &str) -> Result<Option<Value>> {
        if let Some(value) = self.state_value(node, symbol) {
            return Ok(Some(value));
        }
        if let Some(value) = self.constant_value(node, symbol) {
            return Ok(Some(value));
        }
        self.parameter_value(node, symbol)
    }

    fn resolve_uncached(&mut self, node: NodeId, symbol: &str) -> Result<Value> {
        self.stats.evaluations += 1;
        log::trace!("Resolving {}.{} (depth {})", node, symbol, self.stack.depth());

        if let Some(expression) = self.attribute_evaluator(node, symbol)? {
            let value = self.evaluate_expression(node, &expression)?;
            return cast(symbol, value, expression.kind());
        }

        if let Some(value) = self.state_value(node, symbol) {
            return Ok(value);
        }

        if let Some(value) = self.constant_value(node, symbol) {
            return Ok(value);
        }

        if let Some(value) = self.parameter_value(node, symbol)? {
            return Ok(value);
        }

        if let Some(value) = self
            .delegate
            .as_ref()
            .and_then(|d| d.value_for_symbol(node, symbol))
        {
            return Ok(value);
        }

        if let Some(value) = self.geometry_value(node, symbol)? {
            return Ok(value);
        }

        if let Some(value) = self.host_value(node, symbol)? {
            return Ok(value);
        }

        if let Some(value) = self.resolve_structural(node, symbol)? {
            return Ok(value);
        }

        Err(LayoutError::unknown_symbol(
            symbol,
            self.suggestions(node, symbol),
        ))
    }

    pub(crate) fn evaluate_expression(
        &mut self,
        node: NodeId,
        expression: &Rc<Expression>,
    ) -> Result<Value> {
        let functions = Rc::clone(&self.functions);
        expression.evaluate(&functions, &mut |name| self.resolve(node, name))
    }

    /// Compiled form of the node's own expression for `name`, if it has one
    pub(crate) fn attribute_evaluator(
        &mut self,
        node: NodeId,
        name: &str,
    ) -> Result<Option<Rc<Expression>>> {
        let target = self.node(node)?;
        if !target.has_expression(name) {
            return Ok(None);
        }
        if let Some(expression) = target.cache.evaluators.get(name) {
            return Ok(Some(Rc::clone(expression)));
        }

        let source = target.attributes.get(name).cloned().unwrap_or_default();
        let (kind, category) = self.attribute_signature(node, name);
        self.compile_for(node, name, &source, kind, category, true)
    }

    pub(crate) fn compile_for(
        &mut self,
        node: NodeId,
        name: &str,
        source: &str,
        kind: ValueKind,
        category: AttributeCategory,
        inline_macros: bool,
    ) -> Result<Option<Rc<Expression>>> {
        let compiled = {
            let scope = NodeScope::new(self, node);
            compiler::compile(source, name, kind, category, &scope, inline_macros)?
        };
        let Some(expression) = compiled else {
            return Ok(None);
        };

        self.stats.compilations += 1;
        log::debug!(
            "Compiled {}.{} = \"{}\" ({} symbol(s))",
            node,
            name,
            source,
            expression.symbols().len()
        );
        let expression = Rc::new(expression);
        self.node_mut(node)?
            .cache
            .evaluators
            .insert(name.to_string(), Rc::clone(&expression));
        Ok(Some(expression))
    }

    /// Declared kind and compilation category of an attribute on `node`
    pub fn attribute_signature(&self, node: NodeId, name: &str) -> (ValueKind, AttributeCategory) {
        if let Some(category) = geometry_category(name) {
            return (ValueKind::Number, category);
        }
        if is_geometry_symbol(name) {
            return (ValueKind::Number, AttributeCategory::Generic);
        }
        let Ok(target) = self.node(node) else {
            return (ValueKind::Any, AttributeCategory::Generic);
        };
        if let Some(kind) = target.parameters.get(name) {
            return (*kind, AttributeCategory::for_kind(*kind));
        }
        if let Some(table) = self.capabilities.table_for(target.type_name()) {
            if let Some(capability) = table.lookup(name).capability() {
                return (capability.kind, capability.category);
            }
        }
        (ValueKind::Any, AttributeCategory::Generic)
    }

    fn host_value(&self, node: NodeId, symbol: &str) -> Result<Option<Value>> {
        let target = self.node(node)?;
        let Some(table) = self.capabilities.table_for(target.type_name()) else {
            return Ok(None);
        };
        let value = match table.lookup(symbol) {
            CapabilityLookup::Missing => None,
            CapabilityLookup::ReadOnly(c) | CapabilityLookup::Settable(c) => c.get(&target.host),
        };
        Ok(value)
    }

    pub(crate) fn add_dependent(&mut self, target: NodeId, dependent: NodeId) {
        if target == dependent {
            return;
        }
        if let Ok(node) = self.node_mut(target) {
            node.cache.dependents.insert(dependent);
        }
    }
}

pub(crate) fn cast(symbol: &str, value: Value, kind: ValueKind) -> Result<Value> {
    value
        .cast(kind)
        .ok_or_else(|| LayoutError::type_mismatch(symbol, kind.to_string(), value.kind_name()))
}

#[cfg(test)]
mod tests {
    use crate::core::types::{Size, Value, ValueKind};
    use crate::engine::node::NodeSpec;
    use crate::error::LayoutError;
    use crate::{LayoutOptions, LayoutTree};

    fn tree() -> LayoutTree {
        LayoutTree::new(LayoutOptions {
            root_container: Size::new(400.0, 300.0),
            ..Default::default()
        })
    }

    #[test]
    fn test_constant_expression_is_cached() {
        let mut tree = tree();
        let node = tree.create_node(NodeSpec::new("View").attribute("alpha", "0.25 * 2"));

        assert_eq!(tree.resolve(node, "alpha").unwrap(), Value::Number(0.5));
        let evaluations = tree.stats().evaluations;
        assert_eq!(tree.resolve(node, "alpha").unwrap(), Value::Number(0.5));

        assert_eq!(tree.stats().evaluations, evaluations);
        assert_eq!(tree.stats().constant_hits, 1);
        assert!(tree.is_expression_constant(node, "alpha").unwrap());
    }

    #[test]
    fn test_self_reference_is_an_error() {
        let mut tree = tree();
        let node = tree.create_node(NodeSpec::new("View").attribute("width", "width + 1"));

        let err = tree.resolve(node, "width").unwrap_err();
        assert!(matches!(err, LayoutError::SelfReference { ref symbol } if symbol == "width"));
        assert_eq!(tree.evaluation_trail().len(), 1);
        assert_eq!(tree.evaluation_stack().depth(), 0);
    }

    #[test]
    fn test_self_reference_reads_shadowed_state() {
        let mut tree = tree();
        let node = tree.create_node(
            NodeSpec::new("Label")
                .state("title", "Inbox")
                .attribute("title", "title + ' (3)'"),
        );
        assert_eq!(tree.resolve(node, "title").unwrap(), Value::from("Inbox (3)"));
    }

    #[test]
    fn test_circular_reference_reports_path() {
        let mut tree = tree();
        let node = tree.create_node(
            NodeSpec::new("View")
                .attribute("a", "b + 1")
                .attribute("b", "a + 1"),
        );

        match tree.resolve(node, "a").unwrap_err() {
            LayoutError::CircularReference { symbol, path } => {
                assert_eq!(symbol, "a");
                assert_eq!(path, vec!["a", "b", "a"]);
            }
            other => panic!("Expected circular reference, got {:?}", other),
        }
        let trail: Vec<&str> = tree
            .evaluation_trail()
            .iter()
            .map(|f| f.symbol.as_str())
            .collect();
        assert_eq!(trail, vec!["a", "b"]);
    }

    #[test]
    fn test_lookup_order_prefers_attribute_over_state() {
        let mut tree = tree();
        let node = tree.create_node(
            NodeSpec::new("View")
                .state("count", 2.0)
                .constant("count", 5.0)
                .constant("gap", 8.0),
        );
        assert_eq!(tree.resolve(node, "count").unwrap(), Value::Number(2.0));
        assert_eq!(tree.resolve(node, "gap").unwrap(), Value::Number(8.0));

        tree.set_expression(node, "count", "gap * 2").unwrap();
        assert_eq!(tree.resolve(node, "count").unwrap(), Value::Number(16.0));
    }

    #[test]
    fn test_unknown_symbol_carries_suggestions() {
        let mut tree = tree();
        let node = tree.create_node(NodeSpec::new("View").attribute("alpha", "widht / 2"));

        match tree.resolve(node, "alpha").unwrap_err() {
            LayoutError::UnknownSymbol { symbol, suggestions } => {
                assert_eq!(symbol, "widht");
                assert!(suggestions.contains(&"width".to_string()));
            }
            other => panic!("Expected unknown symbol, got {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch_on_declared_kind() {
        let mut tree = tree();
        let node = tree.create_node(NodeSpec::new("View").attribute("alpha", "'opaque'"));
        let err = tree.resolve(node, "alpha").unwrap_err();
        assert!(matches!(err, LayoutError::TypeMismatch { ref symbol, .. } if symbol == "alpha"));

        let label = tree.create_node(NodeSpec::new("Label").attribute("text", "{2 + 3}"));
        assert_eq!(
            tree.resolve_as(label, "text", ValueKind::String).unwrap(),
            Value::from("5")
        );
    }

    #[test]
    fn test_delegate_supplies_values() {
        struct Fixed;
        impl super::SymbolDelegate for Fixed {
            fn value_for_symbol(&self, _node: crate::NodeId, symbol: &str) -> Option<Value> {
                (symbol == "safeArea.top").then(|| Value::Number(44.0))
            }
        }

        let mut tree = tree();
        let node = tree.create_node(NodeSpec::new("View").attribute("top", "safeArea.top + 8"));
        tree.set_delegate(Some(Box::new(Fixed))).unwrap();
        assert_eq!(tree.resolve(node, "top").unwrap(), Value::Number(52.0));
        assert!(!tree.is_expression_constant(node, "top").unwrap());
    }
}
