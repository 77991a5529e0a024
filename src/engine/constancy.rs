// FILE: src/engine/constancy.rs

//! Constant classification.
//!
//! A symbol is constant when its value cannot change without a structural
//! or state change that invalidates the node. Classification follows the
//! same lookup order as evaluation but never evaluates anything; results are
//! memoized per node and dropped with the rest of the cache.

use crate::core::types::NodeId;
use crate::engine::geometry::GeometryRule;
use crate::engine::scope::Reference;
use crate::engine::tree::LayoutTree;
use crate::error::Result;

impl LayoutTree {
    /// Whether the node's value for `name` is input-independent
    pub fn is_expression_constant(&mut self, node: NodeId, name: &str) -> Result<bool> {
        self.node(node)?;
        Ok(self.is_symbol_constant(node, name))
    }

    pub(crate) fn is_symbol_constant(&mut self, node: NodeId, symbol: &str) -> bool {
        if let Some(constant) = self
            .node(node)
            .ok()
            .and_then(|n| n.cache.constancy.get(symbol).copied())
        {
            return constant;
        }

        // A symbol that reaches itself again is not constant
        let key = (node, symbol.to_string());
        if !self.classifying.insert(key.clone()) {
            return false;
        }
        let constant = self.classify(node, symbol);
        self.classifying.remove(&key);

        log::trace!("{}.{} classified {}", node, symbol, if constant { "constant" } else { "dynamic" });
        if let Ok(target) = self.node_mut(node) {
            target.cache.constancy.insert(symbol.to_string(), constant);
        }
        constant
    }

    fn classify(&mut self, node: NodeId, symbol: &str) -> bool {
        match self.attribute_evaluator(node, symbol) {
            Ok(Some(expression)) => {
                return expression.fixed_value().is_some()
                    || expression
                        .symbols()
                        .iter()
                        .all(|s| self.is_symbol_constant(node, s));
            }
            Ok(None) => {}
            Err(_) => return false,
        }

        if self.state_value(node, symbol).is_some() {
            return false;
        }
        if self.constant_value(node, symbol).is_some() {
            return true;
        }
        if let Some((owner, _)) = self.parameter_owner(node, symbol) {
            self.add_dependent(owner, node);
            let owned = self.node(owner).map_or(false, |n| n.has_expression(symbol));
            return !owned || self.is_symbol_constant(owner, symbol);
        }
        if self
            .delegate
            .as_ref()
            .map_or(false, |d| d.value_for_symbol(node, symbol).is_some())
        {
            return false;
        }

        match self.geometry_rule(node, symbol) {
            Ok(Some(GeometryRule::Derived(source))) => {
                return match self.derived_evaluator(node, symbol, &source) {
                    Ok(expression) => expression
                        .symbols()
                        .iter()
                        .all(|s| self.is_symbol_constant(node, s)),
                    Err(_) => false,
                };
            }
            Ok(Some(GeometryRule::Native(_))) | Err(_) => return false,
            Ok(None) => {}
        }

        if self.has_host_capability(node, symbol) {
            return false;
        }

        match Reference::parse(symbol) {
            Some(reference) => self.classify_reference(node, reference),
            None => false,
        }
    }

    fn classify_reference(&mut self, node: NodeId, reference: Reference<'_>) -> bool {
        let (target, symbol) = match reference {
            Reference::Strings(_) => return true,
            Reference::Parent(symbol) => match self.node(node).ok().and_then(|n| n.parent) {
                Some(parent) => (parent, symbol),
                // The root container can be resized at any time
                None => return false,
            },
            Reference::Previous(symbol) | Reference::Next(symbol) => {
                let forward = matches!(reference, Reference::Next(_));
                match self.visible_sibling(node, forward) {
                    Some(sibling) => (sibling, symbol),
                    None => return true,
                }
            }
            Reference::Id(id, symbol) => match self.find_by_id(node, id) {
                Some(found) => (found, symbol),
                None => return false,
            },
        };

        self.add_dependent(target, node);
        match self.edge_inputs(node, symbol) {
            Some(inputs) => inputs.iter().all(|s| self.is_symbol_constant(target, s)),
            None => self.is_symbol_constant(target, symbol),
        }
    }

    fn has_host_capability(&self, node: NodeId, symbol: &str) -> bool {
        self.node(node)
            .ok()
            .and_then(|n| self.capabilities.table_for(n.type_name()))
            .map_or(false, |t| t.lookup(symbol).capability().is_some())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::types::{Size, Value};
    use crate::engine::node::NodeSpec;
    use crate::{LayoutOptions, LayoutTree};

    fn tree() -> LayoutTree {
        LayoutTree::new(LayoutOptions {
            root_container: Size::new(200.0, 100.0),
            ..Default::default()
        })
    }

    #[test]
    fn test_constants_propagate_through_references() {
        let mut tree = tree();
        let root = tree.create_node(NodeSpec::new("View").constant("gap", 4.0).attribute("width", "300"));
        let child = tree.create_node(
            NodeSpec::new("View")
                .attribute("left", "gap * 2")
                .attribute("width", "parent.width / 2")
                .attribute("alpha", "count / 10")
                .state("count", 5.0),
        );
        tree.add_child(root, child).unwrap();

        assert!(tree.is_expression_constant(child, "left").unwrap());
        assert!(tree.is_expression_constant(child, "width").unwrap());
        assert!(!tree.is_expression_constant(child, "alpha").unwrap());
        assert!(tree.is_expression_constant(child, "strings.anything").unwrap());
    }

    #[test]
    fn test_root_container_is_dynamic() {
        let mut tree = tree();
        let root = tree.create_node(NodeSpec::new("View").attribute("width", "50%"));
        assert!(!tree.is_expression_constant(root, "width").unwrap());
        assert_eq!(tree.resolve(root, "width").unwrap(), Value::Number(100.0));

        tree.set_root_container_size(Size::new(333.0, 100.0)).unwrap();
        assert_eq!(tree.resolve(root, "width").unwrap(), Value::Number(166.5));
    }

    #[test]
    fn test_self_shadowing_is_not_constant() {
        let mut tree = tree();
        let node = tree.create_node(
            NodeSpec::new("View")
                .constant("spacing", 3.0)
                .attribute("spacing", "spacing + 1"),
        );
        assert!(!tree.is_expression_constant(node, "spacing").unwrap());
        assert_eq!(tree.resolve(node, "spacing").unwrap(), Value::Number(4.0));
    }
}
