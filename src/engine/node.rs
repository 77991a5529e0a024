//! Node data held by the [`crate::LayoutTree`] arena

use crate::core::properties::HostView;
use crate::core::types::{Direction, NodeId, Value, ValueKind};
use crate::engine::evaluator::SymbolCache;
use std::collections::BTreeMap;

/// A tree element. Created through [`NodeSpec`] and owned by the tree.
#[derive(Debug)]
pub struct Node {
    pub(crate) id: Option<String>,
    pub(crate) attributes: BTreeMap<String, String>,
    pub(crate) macros: BTreeMap<String, String>,
    pub(crate) parameters: BTreeMap<String, ValueKind>,
    pub(crate) state: BTreeMap<String, Value>,
    pub(crate) constants: BTreeMap<String, Value>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) direction: Option<Direction>,
    pub(crate) hidden: bool,
    pub(crate) handles_errors: bool,
    pub(crate) host: HostView,
    pub(crate) cache: SymbolCache,
}

impl Node {
    pub(crate) fn from_spec(spec: NodeSpec) -> Self {
        let host = spec
            .host
            .unwrap_or_else(|| HostView::new(spec.type_name.clone()));
        Self {
            id: spec.id,
            attributes: spec.attributes,
            macros: spec.macros,
            parameters: spec.parameters,
            state: spec.state,
            constants: spec.constants,
            children: Vec::new(),
            parent: None,
            direction: spec.direction,
            hidden: spec.hidden,
            handles_errors: spec.handles_errors,
            host,
            cache: SymbolCache::default(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn type_name(&self) -> &str {
        self.host.type_name()
    }

    /// Source of an attribute expression
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether the node carries a non-empty expression for `name`
    pub fn has_expression(&self, name: &str) -> bool {
        self.attributes
            .get(name)
            .map_or(false, |source| !source.trim().is_empty())
    }

    pub fn macros(&self) -> &BTreeMap<String, String> {
        &self.macros
    }

    pub fn parameters(&self) -> &BTreeMap<String, ValueKind> {
        &self.parameters
    }

    pub fn state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn constant(&self, key: &str) -> Option<&Value> {
        self.constants.get(key)
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Direction set on this node; `None` inherits from the ancestors
    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn handles_errors(&self) -> bool {
        self.handles_errors
    }

    pub fn host(&self) -> &HostView {
        &self.host
    }
}

/// Construction-time description of a node.
///
/// State keys and constants are fixed here; later `set_state` calls may
/// only change values of keys declared at construction.
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    pub(crate) id: Option<String>,
    pub(crate) type_name: String,
    pub(crate) attributes: BTreeMap<String, String>,
    pub(crate) macros: BTreeMap<String, String>,
    pub(crate) parameters: BTreeMap<String, ValueKind>,
    pub(crate) state: BTreeMap<String, Value>,
    pub(crate) constants: BTreeMap<String, Value>,
    pub(crate) direction: Option<Direction>,
    pub(crate) hidden: bool,
    pub(crate) handles_errors: bool,
    pub(crate) host: Option<HostView>,
}

impl NodeSpec {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), source.into());
        self
    }

    pub fn macro_def(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.macros.insert(name.into(), source.into());
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.parameters.insert(name.into(), kind);
        self
    }

    pub fn state(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.state.insert(key.into(), value.into());
        self
    }

    pub fn constant(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constants.insert(key.into(), value.into());
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Unhandled errors from the subtree stop bubbling at this node
    pub fn handles_errors(mut self, handles: bool) -> Self {
        self.handles_errors = handles;
        self
    }

    pub fn host(mut self, host: HostView) -> Self {
        self.type_name = host.type_name().to_string();
        self.host = Some(host);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_builder_populates_node() {
        let spec = NodeSpec::new("Label")
            .id("title")
            .attribute("width", "100")
            .attribute("text", "  ")
            .state("count", 1.0)
            .constant("gap", 8.0)
            .parameter("title", ValueKind::String)
            .direction(Direction::RightToLeft);
        let node = Node::from_spec(spec);

        assert_eq!(node.id(), Some("title"));
        assert_eq!(node.type_name(), "Label");
        assert!(node.has_expression("width"));
        assert!(!node.has_expression("text"));
        assert_eq!(node.state("count"), Some(&Value::Number(1.0)));
        assert_eq!(node.constant("gap"), Some(&Value::Number(8.0)));
        assert_eq!(node.direction(), Some(Direction::RightToLeft));
        assert!(node.parent().is_none());
    }
}
