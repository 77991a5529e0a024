// FILE: src/engine/tree.rs

//! The node arena and its structural operations

use crate::compiler::functions::Functions;
use crate::core::constants::StaticConstants;
use crate::core::properties::{CapabilityRegistry, CapabilityTable, HostView};
use crate::core::types::{Direction, LayoutMode, NodeId, Size, Value};
use crate::engine::diagnostics::Diagnostics;
use crate::engine::evaluator::{EvaluationStack, EvaluationStats, SymbolDelegate};
use crate::engine::node::{Node, NodeSpec};
use crate::error::{LayoutError, Result};
use crate::LayoutOptions;
use std::cell::Cell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

/// Owns every node plus the caches and registries used to evaluate them.
///
/// Parent links are plain indices into the arena, so there are no
/// reference cycles between nodes, their parents and their host views.
pub struct LayoutTree {
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) options: LayoutOptions,
    pub(crate) strings: BTreeMap<String, String>,
    pub(crate) statics: StaticConstants,
    pub(crate) capabilities: CapabilityRegistry,
    pub(crate) functions: Rc<Functions>,
    pub(crate) delegate: Option<Box<dyn SymbolDelegate>>,
    /// Bumped by every invalidation; per-pass cached values older than this are stale
    pub(crate) pass: u64,
    pub(crate) stack: EvaluationStack,
    pub(crate) classifying: HashSet<(NodeId, String)>,
    pub(crate) stats: EvaluationStats,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) update_lock: Rc<Cell<usize>>,
    pub(crate) needs_layout: bool,
}

impl LayoutTree {
    pub fn new(options: LayoutOptions) -> Self {
        Self::with_registries(
            options,
            StaticConstants::with_defaults(),
            CapabilityRegistry::with_defaults(),
        )
    }

    pub fn with_registries(
        options: LayoutOptions,
        statics: StaticConstants,
        capabilities: CapabilityRegistry,
    ) -> Self {
        let diagnostics = Diagnostics::new(options.debug_mode);
        Self {
            nodes: Vec::new(),
            options,
            strings: BTreeMap::new(),
            statics,
            capabilities,
            functions: Rc::new(Functions::new()),
            delegate: None,
            pass: 0,
            stack: EvaluationStack::default(),
            classifying: HashSet::new(),
            stats: EvaluationStats::default(),
            diagnostics,
            update_lock: Rc::new(Cell::new(0)),
            needs_layout: true,
        }
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn layout_mode(&self) -> LayoutMode {
        self.options.layout_mode
    }

    pub fn stats(&self) -> &EvaluationStats {
        &self.stats
    }

    /// Current evaluation pass
    pub fn pass(&self) -> u64 {
        self.pass
    }

    pub fn needs_layout(&self) -> bool {
        self.needs_layout
    }

    pub fn create_node(&mut self, spec: NodeSpec) -> NodeId {
        let id = NodeId(self.nodes.len());
        if !self.capabilities.is_registered(&spec.type_name) {
            log::debug!(
                "Node type '{}' has no capability table; only geometry will be applied",
                spec.type_name
            );
        }
        self.nodes.push(Some(Node::from_spec(spec)));
        self.needs_layout = true;
        id
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .ok_or(LayoutError::InvalidNode)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .ok_or(LayoutError::InvalidNode)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Live nodes without a parent, in creation order
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| match slot {
                Some(node) if node.parent.is_none() => Some(NodeId(i)),
                _ => None,
            })
            .collect()
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.node(id)?.children)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    /// Strict ancestors, nearest first
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.node(id).ok().and_then(|n| n.parent);
        while let Some(ancestor) = current {
            out.push(ancestor);
            current = self.node(ancestor).ok().and_then(|n| n.parent);
        }
        out
    }

    /// The node and all of its descendants, pre-order
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Ok(node) = self.node(current) {
                out.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let index = self.node(parent)?.children.len();
        self.insert_child(parent, index, child)
    }

    /// Attach `child` at `index` (clamped to the child count).
    /// The child must not already have a parent.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        if self.node(child)?.parent.is_some() {
            return Err(LayoutError::tree(format!(
                "{} already has a parent; detach or move it instead",
                child
            )));
        }
        if parent == child || self.ancestors(parent).contains(&child) {
            return Err(LayoutError::tree(format!(
                "{} cannot become a descendant of itself",
                child
            )));
        }

        let parent_node = self.node_mut(parent)?;
        let index = index.min(parent_node.children.len());
        parent_node.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);

        log::debug!("Attached {} to {} at index {}", child, parent, index);
        self.invalidate(parent, true)
    }

    /// Unlink a node from its parent; it becomes a root of its own
    pub fn detach(&mut self, node: NodeId) -> Result<()> {
        let Some(parent) = self.node(node)?.parent else {
            return Ok(());
        };
        self.node_mut(parent)?.children.retain(|c| *c != node);
        self.node_mut(node)?.parent = None;

        log::debug!("Detached {} from {}", node, parent);
        self.invalidate(parent, true)?;
        self.invalidate(node, true)
    }

    /// Detach `child` from `parent` and destroy its subtree
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.node(child)?.parent != Some(parent) {
            return Err(LayoutError::tree(format!("{} is not a child of {}", child, parent)));
        }
        self.destroy(child)
    }

    /// Destroy a node and everything it owns
    pub fn destroy(&mut self, node: NodeId) -> Result<()> {
        self.detach(node)?;
        let doomed = self.subtree(node);
        for id in &doomed {
            self.nodes[id.0] = None;
            self.diagnostics.forget(*id);
        }
        log::debug!("Destroyed {} node(s) rooted at {}", doomed.len(), node);
        Ok(())
    }

    /// Move a node under a new parent, detaching it from its current one first
    pub fn move_node(&mut self, node: NodeId, new_parent: NodeId, index: Option<usize>) -> Result<()> {
        self.node(new_parent)?;
        if new_parent == node || self.ancestors(new_parent).contains(&node) {
            return Err(LayoutError::tree(format!(
                "{} cannot become a descendant of itself",
                node
            )));
        }
        let _lock = self.begin_update();
        self.detach(node)?;
        let index = index.unwrap_or_else(|| self.node(new_parent).map_or(0, |n| n.children.len()));
        self.insert_child(new_parent, index, node)
    }

    pub fn set_expression(
        &mut self,
        node: NodeId,
        name: &str,
        source: impl Into<String>,
    ) -> Result<()> {
        let source = source.into();
        log::debug!("{}.{} = \"{}\"", node, name, source);
        self.node_mut(node)?
            .attributes
            .insert(name.to_string(), source);
        self.invalidate(node, false)
    }

    pub fn remove_expression(&mut self, node: NodeId, name: &str) -> Result<bool> {
        let removed = self.node_mut(node)?.attributes.remove(name).is_some();
        if removed {
            self.invalidate(node, false)?;
        }
        Ok(removed)
    }

    /// Set or clear (`None`, inherit) a node's writing direction
    pub fn set_direction(&mut self, node: NodeId, direction: Option<Direction>) -> Result<()> {
        let current = &mut self.node_mut(node)?.direction;
        if *current == direction {
            return Ok(());
        }
        *current = direction;
        self.invalidate(node, true)
    }

    /// Hidden nodes are skipped by `previous`/`next` and by content-size inference
    pub fn set_hidden(&mut self, node: NodeId, hidden: bool) -> Result<()> {
        let target = self.node_mut(node)?;
        if target.hidden == hidden {
            return Ok(());
        }
        target.hidden = hidden;
        match self.node(node)?.parent {
            Some(parent) => self.invalidate(parent, true),
            None => self.invalidate(node, true),
        }
    }

    pub fn set_layout_mode(&mut self, mode: LayoutMode) -> Result<()> {
        if self.options.layout_mode == mode {
            return Ok(());
        }
        self.options.layout_mode = mode;
        self.invalidate_all()
    }

    pub fn set_root_container_size(&mut self, size: Size) -> Result<()> {
        if self.options.root_container == size {
            return Ok(());
        }
        self.options.root_container = size;
        self.invalidate_all()
    }

    /// Replace the string table used by `strings.key`
    pub fn set_strings(&mut self, strings: BTreeMap<String, String>) -> Result<()> {
        self.strings = strings;
        self.invalidate_all()
    }

    pub fn strings(&self) -> &BTreeMap<String, String> {
        &self.strings
    }

    pub fn register_static(&mut self, namespace: &str, member: &str, value: Value) -> Result<()> {
        self.statics.register(namespace, member, value);
        self.invalidate_all()
    }

    pub fn register_host_type(&mut self, type_name: &str, builder: fn() -> CapabilityTable) -> Result<()> {
        self.capabilities.register(type_name, builder);
        self.invalidate_all()
    }

    /// Bind new host content to a node (for example after the host recreated its view)
    pub fn bind_host(&mut self, node: NodeId, host: HostView) -> Result<()> {
        self.node_mut(node)?.host = host;
        self.invalidate(node, false)
    }

    pub fn host(&self, node: NodeId) -> Result<&HostView> {
        Ok(&self.node(node)?.host)
    }

    pub fn host_mut(&mut self, node: NodeId) -> Result<&mut HostView> {
        Ok(&mut self.node_mut(node)?.host)
    }

    pub fn set_delegate(&mut self, delegate: Option<Box<dyn SymbolDelegate>>) -> Result<()> {
        self.delegate = delegate;
        self.invalidate_all()
    }

    pub(crate) fn invalidate_all(&mut self) -> Result<()> {
        for root in self.roots() {
            self.invalidate(root, true)?;
        }
        self.pass += 1;
        Ok(())
    }
}

/// Suppresses layout passes while held; released on drop, including on early `?` returns
#[must_use = "the lock is released as soon as it is dropped"]
#[derive(Debug)]
pub struct UpdateLock {
    counter: Rc<Cell<usize>>,
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        self.counter.set(self.counter.get().saturating_sub(1));
    }
}

impl LayoutTree {
    /// Start a batch of structural changes. `update()` is suppressed until
    /// every outstanding lock is dropped.
    pub fn begin_update(&self) -> UpdateLock {
        self.update_lock.set(self.update_lock.get() + 1);
        UpdateLock {
            counter: Rc::clone(&self.update_lock),
        }
    }

    pub fn is_update_locked(&self) -> bool {
        self.update_lock.get() > 0
    }
}

impl Default for LayoutTree {
    fn default() -> Self {
        Self::new(LayoutOptions::default())
    }
}
