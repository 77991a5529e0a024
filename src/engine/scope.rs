// FILE: src/engine/scope.rs

//! Tree navigation and scoping: inherited state/constants, macros,
//! parameters, and `parent.` / `previous.` / `next.` / `#id.` / `strings.`
//! references.

use crate::compiler::functions::Functions;
use crate::compiler::CompileScope;
use crate::core::constants::{is_geometry_symbol, StaticConstants, GEOMETRY_SYMBOLS};
use crate::core::types::{Direction, NodeId, Value, ValueKind};
use crate::engine::diagnostics;
use crate::engine::tree::LayoutTree;
use crate::error::{LayoutError, Result};
use std::collections::{BTreeSet, HashSet, VecDeque};

/// A structural reference split into target and symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reference<'a> {
    Parent(&'a str),
    Previous(&'a str),
    Next(&'a str),
    Id(&'a str, &'a str),
    Strings(&'a str),
}

impl<'a> Reference<'a> {
    pub(crate) fn parse(symbol: &'a str) -> Option<Self> {
        if let Some(rest) = symbol.strip_prefix('#') {
            let (id, target) = rest.split_once('.')?;
            return Some(Reference::Id(id, target));
        }
        let (prefix, rest) = symbol.split_once('.')?;
        match prefix {
            "parent" => Some(Reference::Parent(rest)),
            "previous" => Some(Reference::Previous(rest)),
            "next" => Some(Reference::Next(rest)),
            "strings" => Some(Reference::Strings(rest)),
            _ => None,
        }
    }
}

impl LayoutTree {
    /// Writing direction of a node, inherited from the nearest ancestor that sets one
    pub fn effective_direction(&self, node: NodeId) -> Direction {
        std::iter::once(node)
            .chain(self.ancestors(node))
            .find_map(|id| self.node(id).ok().and_then(|n| n.direction))
            .unwrap_or(self.options.default_direction)
    }

    /// State is visible to the node itself and its descendants
    pub(crate) fn state_value(&self, node: NodeId, key: &str) -> Option<Value> {
        std::iter::once(node)
            .chain(self.ancestors(node))
            .find_map(|id| self.node(id).ok().and_then(|n| n.state.get(key).cloned()))
    }

    pub(crate) fn constant_value(&self, node: NodeId, key: &str) -> Option<Value> {
        std::iter::once(node)
            .chain(self.ancestors(node))
            .find_map(|id| self.node(id).ok().and_then(|n| n.constants.get(key).cloned()))
    }

    /// Nearest strict ancestor declaring a parameter `name`
    pub(crate) fn parameter_owner(&self, node: NodeId, name: &str) -> Option<(NodeId, ValueKind)> {
        self.ancestors(node).into_iter().find_map(|id| {
            self.node(id)
                .ok()
                .and_then(|n| n.parameters.get(name).map(|kind| (id, *kind)))
        })
    }

    /// Value of an inherited parameter: the owner's expression of the same
    /// name cast to the declared kind, or the kind's default
    pub(crate) fn parameter_value(&mut self, node: NodeId, name: &str) -> Result<Option<Value>> {
        let Some((owner, kind)) = self.parameter_owner(node, name) else {
            return Ok(None);
        };
        if !self.node(owner)?.has_expression(name) {
            self.add_dependent(owner, node);
            return Ok(Some(kind.default_value()));
        }
        self.resolve_as(owner, name, kind).map(Some)
    }

    /// Macro `name` as seen from `node`, skipping the `skip` nearest definitions
    pub(crate) fn macro_source(&self, node: NodeId, name: &str, skip: usize) -> Option<String> {
        self.ancestors(node)
            .into_iter()
            .filter_map(|id| self.node(id).ok().and_then(|n| n.macros.get(name).cloned()))
            .nth(skip)
    }

    pub(crate) fn has_plain_symbol(&self, node: NodeId, name: &str) -> bool {
        let Ok(target) = self.node(node) else {
            return false;
        };
        target.has_expression(name)
            || self.state_value(node, name).is_some()
            || self.constant_value(node, name).is_some()
            || self.parameter_owner(node, name).is_some()
            || is_geometry_symbol(name)
            || Reference::parse(name).is_some()
            || self
                .capabilities
                .table_for(target.type_name())
                .map_or(false, |t| t.lookup(name).capability().is_some())
    }

    /// Nearest visible sibling before or after (`forward`) the node
    pub fn visible_sibling(&self, node: NodeId, forward: bool) -> Option<NodeId> {
        let parent = self.node(node).ok()?.parent?;
        let siblings = &self.node(parent).ok()?.children;
        let index = siblings.iter().position(|c| *c == node)?;
        let visible = |id: &&NodeId| self.node(**id).map_or(false, |n| !n.hidden);
        if forward {
            siblings[index + 1..].iter().find(visible).copied()
        } else {
            siblings[..index].iter().rev().find(visible).copied()
        }
    }

    /// Find a node by id as seen from `from`: its own subtree first, then each
    /// ancestor and the ancestor's remaining subtree. First match wins.
    pub fn find_by_id(&self, from: NodeId, id: &str) -> Option<NodeId> {
        let mut searched: HashSet<NodeId> = HashSet::new();
        let mut start = Some(from);
        while let Some(root) = start {
            if let Some(found) = self.search_subtree(root, id, &searched) {
                return Some(found);
            }
            searched.insert(root);
            start = self.node(root).ok().and_then(|n| n.parent);
        }
        None
    }

    fn search_subtree(&self, root: NodeId, id: &str, skip: &HashSet<NodeId>) -> Option<NodeId> {
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            let Ok(node) = self.node(current) else {
                continue;
            };
            if node.id() == Some(id) {
                return Some(current);
            }
            queue.extend(node.children.iter().filter(|c| !skip.contains(c)).copied());
        }
        None
    }

    /// Resolve `parent.`, `previous.`, `next.`, `#id.` and `strings.` references
    pub(crate) fn resolve_structural(&mut self, node: NodeId, symbol: &str) -> Result<Option<Value>> {
        let Some(reference) = Reference::parse(symbol) else {
            return Ok(None);
        };

        match reference {
            Reference::Parent(target) => match self.node(node)?.parent {
                Some(parent) => self.resolve_on(node, parent, target).map(Some),
                None => Ok(self.root_parent_value(target)),
            },
            Reference::Previous(target) | Reference::Next(target) => {
                let forward = matches!(reference, Reference::Next(_));
                match self.visible_sibling(node, forward) {
                    Some(sibling) => self.resolve_on(node, sibling, target).map(Some),
                    None if is_geometry_symbol(target) => Ok(Some(Value::Number(0.0))),
                    None => Ok(Some(Value::Nil)),
                }
            }
            Reference::Id(id, target) => match self.find_by_id(node, id) {
                Some(found) => self.resolve_on(node, found, target).map(Some),
                None => Err(LayoutError::UnknownNodeId { id: id.to_string() }),
            },
            Reference::Strings(key) => match self.strings.get(key) {
                Some(text) => Ok(Some(Value::String(text.clone()))),
                None => {
                    let keys: Vec<String> = self.strings.keys().map(|k| format!("strings.{}", k)).collect();
                    Err(LayoutError::unknown_symbol(
                        symbol,
                        diagnostics::suggest(symbol, keys, self.options.max_suggestions),
                    ))
                }
            },
        }
    }

    /// The root's `parent.width`/`parent.height` is the root container
    fn root_parent_value(&self, target: &str) -> Option<Value> {
        let size = self.options.root_container;
        match target {
            "width" | "containerSize.width" => Some(Value::Number(size.width)),
            "height" | "containerSize.height" => Some(Value::Number(size.height)),
            _ => None,
        }
    }

    /// Resolve `symbol` on `target` on behalf of `from`.
    ///
    /// `leading`/`trailing` become edge coordinates in `from`'s direction.
    pub(crate) fn resolve_on(&mut self, from: NodeId, target: NodeId, symbol: &str) -> Result<Value> {
        let edge = match symbol {
            "leading" | "trailing" => symbol,
            _ => return self.resolve(target, symbol),
        };

        let left = self.resolve_as(target, "left", ValueKind::Number)?;
        let left = left.as_number().unwrap_or(0.0);
        let rtl = self.effective_direction(from) == Direction::RightToLeft;
        let value = match (edge, rtl) {
            ("leading", false) => left,
            ("trailing", false) => left + self.number_of(target, "width")?,
            ("leading", true) => {
                let width = self.number_of(target, "width")?;
                self.number_of(target, "containerSize.width")? - (left + width)
            }
            _ => self.number_of(target, "containerSize.width")? - left,
        };
        Ok(Value::Number(value))
    }

    /// Symbols of a referenced node that its `leading`/`trailing` edge reads
    /// when seen from `from`; `None` for any other symbol
    pub(crate) fn edge_inputs(&self, from: NodeId, symbol: &str) -> Option<&'static [&'static str]> {
        let rtl = self.effective_direction(from) == Direction::RightToLeft;
        match (symbol, rtl) {
            ("leading", false) => Some(&["left"]),
            ("trailing", false) => Some(&["left", "width"]),
            ("leading", true) => Some(&["containerSize.width", "left", "width"]),
            ("trailing", true) => Some(&["containerSize.width", "left"]),
            _ => None,
        }
    }

    pub(crate) fn number_of(&mut self, node: NodeId, symbol: &str) -> Result<f64> {
        Ok(self
            .resolve_as(node, symbol, ValueKind::Number)?
            .as_number()
            .unwrap_or(0.0))
    }

    /// Every name that would resolve on `node`, for suggestions and tooling
    pub fn available_symbols(&self, node: NodeId) -> Vec<String> {
        let mut names: BTreeSet<String> = GEOMETRY_SYMBOLS.iter().map(|s| s.to_string()).collect();
        let Ok(target) = self.node(node) else {
            return names.into_iter().collect();
        };

        names.extend(target.attributes.keys().cloned());
        for id in std::iter::once(node).chain(self.ancestors(node)) {
            if let Ok(scope) = self.node(id) {
                names.extend(scope.state.keys().cloned());
                names.extend(scope.constants.keys().cloned());
                if id != node {
                    names.extend(scope.macros.keys().cloned());
                    names.extend(scope.parameters.keys().cloned());
                }
            }
        }
        if let Some(table) = self.capabilities.table_for(target.type_name()) {
            names.extend(table.names().map(|n| n.to_string()));
        }
        if target.parent.is_some() {
            names.extend(["parent.width", "parent.height"].iter().map(|s| s.to_string()));
        }
        if self.visible_sibling(node, false).is_some() {
            names.extend(["previous.right", "previous.bottom"].iter().map(|s| s.to_string()));
        }
        names.extend(self.strings.keys().map(|k| format!("strings.{}", k)));
        names.into_iter().collect()
    }

    /// Similar names available on `node`, best match first
    pub fn suggestions(&self, node: NodeId, name: &str) -> Vec<String> {
        let mut candidates = self.available_symbols(node);
        if let Some((namespace, _)) = name.split_once('.') {
            candidates.extend(self.statics.members(namespace));
        }
        diagnostics::suggest(name, candidates, self.options.max_suggestions)
    }
}

/// Compile-time view of the scope around one node
pub(crate) struct NodeScope<'a> {
    tree: &'a LayoutTree,
    node: NodeId,
}

impl<'a> NodeScope<'a> {
    pub(crate) fn new(tree: &'a LayoutTree, node: NodeId) -> Self {
        Self { tree, node }
    }
}

impl<'a> CompileScope for NodeScope<'a> {
    fn macro_source(&self, name: &str, skip: usize) -> Option<String> {
        self.tree.macro_source(self.node, name, skip)
    }

    fn has_plain_symbol(&self, name: &str) -> bool {
        self.tree.has_plain_symbol(self.node, name)
    }

    fn string_literal(&self, key: &str) -> Option<String> {
        self.tree.strings.get(key).cloned()
    }

    fn statics(&self) -> &StaticConstants {
        &self.tree.statics
    }

    fn functions(&self) -> &Functions {
        &self.tree.functions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Size;
    use crate::engine::node::NodeSpec;
    use crate::LayoutOptions;
    use std::collections::BTreeMap;

    fn tree() -> LayoutTree {
        LayoutTree::new(LayoutOptions {
            root_container: Size::new(320.0, 480.0),
            ..Default::default()
        })
    }

    #[test]
    fn test_reference_parsing() {
        assert_eq!(Reference::parse("parent.width"), Some(Reference::Parent("width")));
        assert_eq!(
            Reference::parse("#header.center.y"),
            Some(Reference::Id("header", "center.y"))
        );
        assert_eq!(Reference::parse("strings.title"), Some(Reference::Strings("title")));
        assert_eq!(Reference::parse("center.x"), None);
    }

    #[test]
    fn test_macros_and_parameters_visible_to_descendants_only() {
        let mut tree = tree();
        let root = tree.create_node(
            NodeSpec::new("View")
                .macro_def("gap", "12")
                .parameter("title", ValueKind::String)
                .attribute("title", "Settings")
                .attribute("alpha", "gap"),
        );
        let child = tree.create_node(
            NodeSpec::new("Label")
                .attribute("text", "{title}")
                .attribute("tag", "gap * 2"),
        );
        tree.add_child(root, child).unwrap();

        assert_eq!(tree.resolve(child, "tag").unwrap(), Value::Number(24.0));
        assert_eq!(tree.resolve(child, "text").unwrap(), Value::from("Settings"));
        // The declaring node does not see its own macro
        assert!(matches!(
            tree.resolve(root, "alpha"),
            Err(LayoutError::UnknownSymbol { .. })
        ));
    }

    #[test]
    fn test_previous_and_next_skip_hidden_siblings() {
        let mut tree = tree();
        let root = tree.create_node(NodeSpec::new("View"));
        let first = tree.create_node(NodeSpec::new("View").attribute("height", "40"));
        let hidden = tree.create_node(NodeSpec::new("View").attribute("height", "99").hidden(true));
        let last = tree.create_node(
            NodeSpec::new("View")
                .attribute("top", "previous.bottom + 8")
                .attribute("height", "10"),
        );
        for child in [first, hidden, last] {
            tree.add_child(root, child).unwrap();
        }
        tree.set_layout_mode(crate::core::types::LayoutMode::Legacy).unwrap();

        assert_eq!(tree.visible_sibling(last, false), Some(first));
        assert_eq!(tree.visible_sibling(first, true), Some(last));
        assert_eq!(tree.resolve(last, "top").unwrap(), Value::Number(48.0));
        assert_eq!(tree.resolve(first, "previous.bottom").unwrap(), Value::Number(0.0));
    }

    #[test]
    fn test_id_lookup_searches_children_then_ancestors() {
        let mut tree = tree();
        let root = tree.create_node(NodeSpec::new("View"));
        let header = tree.create_node(NodeSpec::new("View").id("header").attribute("height", "64"));
        let body = tree.create_node(NodeSpec::new("View").attribute("top", "#header.height"));
        let inner = tree.create_node(NodeSpec::new("View").id("header"));
        tree.add_child(root, header).unwrap();
        tree.add_child(root, body).unwrap();

        assert_eq!(tree.find_by_id(body, "header"), Some(header));
        assert_eq!(tree.resolve(body, "top").unwrap(), Value::Number(64.0));

        tree.add_child(body, inner).unwrap();
        assert_eq!(tree.find_by_id(body, "header"), Some(inner));

        let err = tree.resolve(body, "#footer.top").unwrap_err();
        assert!(matches!(err, LayoutError::UnknownNodeId { ref id } if id == "footer"));
    }

    #[test]
    fn test_structural_leading_uses_referencing_direction() {
        let mut tree = tree();
        let root = tree.create_node(NodeSpec::new("View").attribute("width", "100%"));
        let first = tree.create_node(
            NodeSpec::new("View")
                .attribute("left", "20")
                .attribute("width", "100"),
        );
        let second = tree.create_node(NodeSpec::new("View").direction(Direction::RightToLeft));
        tree.add_child(root, first).unwrap();
        tree.add_child(root, second).unwrap();

        // In right-to-left terms the sibling's trailing edge is its left edge
        assert_eq!(tree.resolve(second, "previous.trailing").unwrap(), Value::Number(300.0));
        assert_eq!(tree.resolve(second, "previous.leading").unwrap(), Value::Number(200.0));
        assert_eq!(tree.resolve(first, "next.left").unwrap(), Value::Number(0.0));
    }

    #[test]
    fn test_strings_table_and_root_parent() {
        let mut tree = tree();
        let root = tree.create_node(NodeSpec::new("Label").attribute("text", "{strings.title}"));
        let mut strings = BTreeMap::new();
        strings.insert("title".to_string(), "Welcome".to_string());
        tree.set_strings(strings).unwrap();

        assert_eq!(tree.resolve(root, "text").unwrap(), Value::from("Welcome"));
        assert_eq!(tree.resolve(root, "parent.width").unwrap(), Value::Number(320.0));
        assert!(matches!(
            tree.resolve(root, "strings.titel"),
            Err(LayoutError::UnknownSymbol { ref suggestions, .. }) if suggestions == &vec!["strings.title".to_string()]
        ));
    }
}
