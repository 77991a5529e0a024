// FILE: src/engine/invalidation.rs

//! Cache invalidation and dependency queries

use crate::core::types::{NodeId, Value};
use crate::engine::geometry::GeometryRule;
use crate::engine::tree::LayoutTree;
use crate::error::{LayoutError, Result};
use std::collections::{BTreeSet, HashSet};

impl LayoutTree {
    /// Discard compiled expressions, constancy and cached values of `node`
    /// (and its subtree when `recursive`), then of every node that read them.
    pub fn invalidate(&mut self, node: NodeId, recursive: bool) -> Result<()> {
        self.node(node)?;
        self.pass += 1;
        self.stats.invalidations += 1;
        self.needs_layout = true;

        let mut pending = if recursive {
            self.subtree(node)
        } else {
            vec![node]
        };
        let mut visited = HashSet::new();
        while let Some(current) = pending.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Ok(target) = self.node_mut(current) {
                pending.extend(target.cache.clear());
            }
        }

        log::debug!(
            "Invalidated {}{} ({} node(s), pass {})",
            node,
            if recursive { " recursively" } else { "" },
            visited.len(),
            self.pass
        );
        Ok(())
    }

    /// The host reported new content metrics (intrinsic size, scroll offset, baselines)
    pub fn content_changed(&mut self, node: NodeId) -> Result<()> {
        log::trace!("Content of {} changed", node);
        self.invalidate(node, false)
    }

    /// Update a declared state value. Returns whether the value changed.
    pub fn set_state(&mut self, node: NodeId, key: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        let target = self.node_mut(node)?;
        let Some(current) = target.state.get_mut(key) else {
            return Err(LayoutError::StateKeyNotDeclared { key: key.to_string() });
        };
        if !current.same_kind(&value) && *current != Value::Nil && value != Value::Nil {
            return Err(LayoutError::StateKindMismatch {
                key: key.to_string(),
                expected: current.kind_name().to_string(),
                found: value.kind_name().to_string(),
            });
        }
        if *current == value {
            return Ok(false);
        }
        *current = value;

        log::debug!("State {}.{} changed", node, key);
        self.invalidate(node, true)?;
        Ok(true)
    }

    /// Symbols read directly by the expression or derivation rule for `name`
    pub fn symbols_of(&mut self, node: NodeId, name: &str) -> Result<BTreeSet<String>> {
        if let Some(expression) = self.attribute_evaluator(node, name)? {
            return Ok(expression.symbols().clone());
        }
        if let Some(GeometryRule::Derived(source)) = self.geometry_rule(node, name)? {
            let expression = self.derived_evaluator(node, name, &source)?;
            return Ok(expression.symbols().clone());
        }
        Ok(BTreeSet::new())
    }

    /// Whether evaluating `symbol` on `node` transitively reads `other`
    pub fn depends_on(&mut self, node: NodeId, symbol: &str, other: &str) -> Result<bool> {
        self.depends_on_matching(node, &[symbol], &|read: &str| read == other)
    }

    /// Whether any of `roots` transitively reads a symbol accepted by `matches`.
    /// Only the node's own expressions and derivations are followed.
    pub(crate) fn depends_on_matching(
        &mut self,
        node: NodeId,
        roots: &[&str],
        matches: &dyn Fn(&str) -> bool,
    ) -> Result<bool> {
        let mut visited = HashSet::new();
        let mut pending: Vec<String> = roots.iter().map(|s| s.to_string()).collect();

        while let Some(symbol) = pending.pop() {
            if !visited.insert(symbol.clone()) {
                continue;
            }
            for read in self.symbols_of(node, &symbol)? {
                if matches(&read) {
                    return Ok(true);
                }
                pending.push(read);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use crate::core::properties::HostView;
    use crate::core::types::{Size, Value};
    use crate::engine::node::NodeSpec;
    use crate::error::LayoutError;
    use crate::{LayoutOptions, LayoutTree};

    fn tree() -> LayoutTree {
        LayoutTree::new(LayoutOptions {
            root_container: Size::new(320.0, 480.0),
            ..Default::default()
        })
    }

    #[test]
    fn test_id_reference_sees_new_value() {
        let mut tree = tree();
        let root = tree.create_node(NodeSpec::new("View").attribute("width", "100%"));
        let a = tree.create_node(NodeSpec::new("View").id("x").attribute("width", "100"));
        let b = tree.create_node(NodeSpec::new("View").attribute("width", "#x.width"));
        tree.add_child(root, a).unwrap();
        tree.add_child(root, b).unwrap();

        assert_eq!(tree.resolve(b, "width").unwrap(), Value::Number(100.0));
        assert!(tree.is_expression_constant(b, "width").unwrap());

        tree.set_expression(a, "width", "150").unwrap();
        assert_eq!(tree.resolve(b, "width").unwrap(), Value::Number(150.0));
    }

    #[test]
    fn test_reparenting_drops_values_from_old_parent() {
        let mut tree = tree();
        let first = tree.create_node(NodeSpec::new("View").attribute("width", "200"));
        let second = tree.create_node(NodeSpec::new("View").attribute("width", "300"));
        let child = tree.create_node(NodeSpec::new("View").attribute("width", "parent.width / 2"));

        tree.add_child(first, child).unwrap();
        assert_eq!(tree.resolve(child, "width").unwrap(), Value::Number(100.0));

        tree.move_node(child, second, None).unwrap();
        assert_eq!(tree.resolve(child, "width").unwrap(), Value::Number(150.0));

        tree.detach(child).unwrap();
        assert_eq!(tree.resolve(child, "width").unwrap(), Value::Number(160.0));
        tree.add_child(first, child).unwrap();
        assert_eq!(tree.resolve(child, "width").unwrap(), Value::Number(100.0));
    }

    #[test]
    fn test_set_state_invalidates_descendants() {
        let mut tree = tree();
        let root = tree.create_node(
            NodeSpec::new("View")
                .state("count", 1.0)
                .attribute("alpha", "count / 10"),
        );
        let child = tree.create_node(NodeSpec::new("View").attribute("top", "count * 2"));
        tree.add_child(root, child).unwrap();

        assert_eq!(tree.resolve(root, "alpha").unwrap(), Value::Number(0.1));
        assert_eq!(tree.resolve(child, "top").unwrap(), Value::Number(2.0));

        assert!(tree.set_state(root, "count", 5.0).unwrap());
        assert!(!tree.set_state(root, "count", 5.0).unwrap());
        assert_eq!(tree.resolve(root, "alpha").unwrap(), Value::Number(0.5));
        assert_eq!(tree.resolve(child, "top").unwrap(), Value::Number(10.0));

        assert!(matches!(
            tree.set_state(root, "missing", 1.0),
            Err(LayoutError::StateKeyNotDeclared { .. })
        ));
        assert!(matches!(
            tree.set_state(child, "count", 2.0),
            Err(LayoutError::StateKeyNotDeclared { .. })
        ));
        assert!(matches!(
            tree.set_state(root, "count", "five"),
            Err(LayoutError::StateKindMismatch { .. })
        ));
    }

    #[test]
    fn test_depends_on_follows_expressions_and_rules() {
        let mut tree = tree();
        let node = tree.create_node(
            NodeSpec::new("View")
                .state("inset", 4.0)
                .attribute("padding", "inset + 1")
                .attribute("width", "padding * 2"),
        );

        assert_eq!(
            tree.symbols_of(node, "width").unwrap().into_iter().collect::<Vec<_>>(),
            vec!["padding"]
        );
        assert!(tree.depends_on(node, "width", "inset").unwrap());
        assert!(!tree.depends_on(node, "width", "left").unwrap());
        assert!(tree.depends_on(node, "right", "width").unwrap());
        assert!(tree.depends_on(node, "center.x", "inset").unwrap());
    }

    #[test]
    fn test_content_changed_updates_readers() {
        let mut tree = tree();
        let scroll = tree.create_node(NodeSpec::new("ScrollView").host(HostView::new("ScrollView")));
        let row = tree.create_node(NodeSpec::new("View").attribute("top", "10 - parent.contentOffset.y"));
        tree.add_child(scroll, row).unwrap();
        assert_eq!(tree.resolve(row, "top").unwrap(), Value::Number(10.0));

        let invalidations = tree.stats().invalidations;
        tree.host_mut(scroll).unwrap().content_offset = (0.0, 40.0);
        tree.content_changed(scroll).unwrap();

        assert_eq!(tree.stats().invalidations, invalidations + 1);
        assert!(tree.needs_layout());
        assert_eq!(tree.resolve(row, "top").unwrap(), Value::Number(-30.0));
    }
}
