// FILE: src/engine/geometry.rs

//! Geometry resolver.
//!
//! Built-in layout symbols without an explicit expression are derived from
//! each other by ordered fallback rules. Rules are expressed as expression
//! source compiled on demand (and cached like any other evaluator); the few
//! values that come straight from the host or the tree are native.

use crate::core::constants::geometry_category;
use crate::core::types::{AttributeCategory, Axis, Direction, LayoutMode, NodeId, Value, ValueKind};
use crate::compiler::Expression;
use crate::engine::diagnostics::Warning;
use crate::engine::evaluator::cast;
use crate::engine::scope::Reference;
use crate::engine::tree::LayoutTree;
use crate::error::{LayoutError, Result};
use std::collections::HashSet;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NativeGeometry {
    RootContainer(Axis),
    Inferred(Axis),
    InferredContent(Axis),
    ContentOffset(Axis),
    FirstBaselineOffset,
    LastBaselineOffset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GeometryRule {
    Derived(String),
    Native(NativeGeometry),
}

/// Symbol names of one axis
struct AxisNames {
    low: &'static str,
    high: &'static str,
    size: &'static str,
    center: &'static str,
    container: &'static str,
}

const HORIZONTAL: AxisNames = AxisNames {
    low: "left",
    high: "right",
    size: "width",
    center: "center.x",
    container: "containerSize.width",
};

const VERTICAL: AxisNames = AxisNames {
    low: "top",
    high: "bottom",
    size: "height",
    center: "center.y",
    container: "containerSize.height",
};

fn derived(source: impl Into<String>) -> Option<GeometryRule> {
    Some(GeometryRule::Derived(source.into()))
}

impl LayoutTree {
    /// How `symbol` is derived on `node`, or `None` if it is not a
    /// built-in symbol or the node has an explicit expression for it
    pub(crate) fn geometry_rule(&self, node: NodeId, symbol: &str) -> Result<Option<GeometryRule>> {
        let target = self.node(node)?;
        if target.has_expression(symbol) {
            return Ok(None);
        }
        let explicit = |name: &str| target.has_expression(name);
        let modern = self.options.layout_mode == LayoutMode::Modern;

        // Insets anchored at the left and right edges for this direction
        let (left_inset, right_inset) = match self.effective_direction(node) {
            Direction::LeftToRight => ("leading", "trailing"),
            Direction::RightToLeft => ("trailing", "leading"),
        };

        let rule = match symbol {
            "width" => {
                if explicit("leading") && explicit("trailing") {
                    derived("containerSize.width - leading - trailing")
                } else {
                    let low = [HORIZONTAL.low, left_inset].into_iter().find(|s| explicit(*s));
                    let high = [HORIZONTAL.high, right_inset].into_iter().find(|s| explicit(*s));
                    self.size_rule(node, &HORIZONTAL, low, high, modern)
                }
            }
            "height" => {
                let low = explicit(VERTICAL.low).then_some(VERTICAL.low);
                let high = explicit(VERTICAL.high).then_some(VERTICAL.high);
                self.size_rule(node, &VERTICAL, low, high, modern)
            }
            "left" => {
                if explicit(left_inset) {
                    derived(left_inset)
                } else if explicit(right_inset) {
                    derived(format!("containerSize.width - {} - width", right_inset))
                } else {
                    low_rule(&HORIZONTAL, &explicit, modern)
                }
            }
            "top" => {
                if explicit("bottom") || explicit("center.y") {
                    low_rule(&VERTICAL, &explicit, modern)
                } else if explicit("firstBaseline") {
                    derived("firstBaseline - firstBaselineOffset")
                } else if explicit("lastBaseline") {
                    derived("lastBaseline - lastBaselineOffset")
                } else {
                    derived("0")
                }
            }
            "right" => {
                if explicit(right_inset) {
                    if modern {
                        derived(right_inset)
                    } else {
                        derived(format!("containerSize.width - {}", right_inset))
                    }
                } else {
                    high_rule(&HORIZONTAL, modern)
                }
            }
            "bottom" => high_rule(&VERTICAL, modern),
            "leading" | "trailing" if symbol == left_inset => derived("left"),
            "leading" | "trailing" => derived("containerSize.width - (left + width)"),
            "center.x" => derived("left + width / 2"),
            "center.y" => derived("top + height / 2"),
            "firstBaseline" => derived("top + firstBaselineOffset"),
            "lastBaseline" => derived("top + lastBaselineOffset"),
            "firstBaselineOffset" => Some(GeometryRule::Native(NativeGeometry::FirstBaselineOffset)),
            "lastBaselineOffset" => Some(GeometryRule::Native(NativeGeometry::LastBaselineOffset)),
            "containerSize.width" | "containerSize.height" => {
                let axis = axis_of(symbol);
                if target.parent.is_some() {
                    derived(format!("parent.{}", axis.dimension()))
                } else {
                    Some(GeometryRule::Native(NativeGeometry::RootContainer(axis)))
                }
            }
            "contentSize.width" => derived("inferredContentSize.width"),
            "contentSize.height" => derived("inferredContentSize.height"),
            "inferredSize.width" | "inferredSize.height" => {
                Some(GeometryRule::Native(NativeGeometry::Inferred(axis_of(symbol))))
            }
            "inferredContentSize.width" | "inferredContentSize.height" => {
                Some(GeometryRule::Native(NativeGeometry::InferredContent(axis_of(symbol))))
            }
            "contentOffset.x" => Some(GeometryRule::Native(NativeGeometry::ContentOffset(Axis::Horizontal))),
            "contentOffset.y" => Some(GeometryRule::Native(NativeGeometry::ContentOffset(Axis::Vertical))),
            _ => None,
        };
        Ok(rule)
    }

    fn size_rule(
        &self,
        node: NodeId,
        names: &AxisNames,
        low: Option<&str>,
        high: Option<&str>,
        modern: bool,
    ) -> Option<GeometryRule> {
        match (low, high) {
            // Legacy right/bottom are coordinates; insets are measured from the far edge either way
            (Some(low), Some(high)) if !modern && high == names.high => {
                derived(format!("{} - {}", high, low))
            }
            (Some(low), Some(high)) => derived(format!("{} - {} - {}", names.container, low, high)),
            _ if self.has_content(node) => derived(format!("inferredSize.{}", names.size)),
            _ => derived(names.container),
        }
    }

    /// Whether the node sizes itself to intrinsic content or visible children
    fn has_content(&self, node: NodeId) -> bool {
        let Ok(target) = self.node(node) else {
            return false;
        };
        target.host.intrinsic_size.is_some()
            || target
                .children
                .iter()
                .any(|c| self.node(*c).map_or(false, |n| !n.hidden))
    }

    pub(crate) fn geometry_value(&mut self, node: NodeId, symbol: &str) -> Result<Option<Value>> {
        let Some(rule) = self.geometry_rule(node, symbol)? else {
            return Ok(None);
        };
        let value = match rule {
            GeometryRule::Derived(source) => {
                let expression = self.derived_evaluator(node, symbol, &source)?;
                let value = self.evaluate_expression(node, &expression)?;
                cast(symbol, value, ValueKind::Number)?
            }
            GeometryRule::Native(native) => Value::Number(self.native_value(node, native)?),
        };
        Ok(Some(value))
    }

    pub(crate) fn derived_evaluator(
        &mut self,
        node: NodeId,
        symbol: &str,
        source: &str,
    ) -> Result<Rc<Expression>> {
        if let Some(expression) = self.node(node)?.cache.evaluators.get(symbol) {
            return Ok(Rc::clone(expression));
        }
        let category = geometry_category(symbol).unwrap_or(AttributeCategory::Generic);
        self.compile_for(node, symbol, source, ValueKind::Number, category, false)?
            .ok_or_else(|| LayoutError::syntax(symbol, "Empty geometry rule"))
    }

    fn native_value(&mut self, node: NodeId, native: NativeGeometry) -> Result<f64> {
        let value = match native {
            NativeGeometry::RootContainer(axis) => self.options.root_container.get(axis),
            NativeGeometry::Inferred(axis) => self.inferred_size(node, axis)?,
            NativeGeometry::InferredContent(axis) => {
                let inferred = self.number_of(node, &format!("inferredSize.{}", axis.dimension()))?;
                inferred + self.node(node)?.host.content_inset.along(axis)
            }
            NativeGeometry::ContentOffset(axis) => {
                let (x, y) = self.node(node)?.host.content_offset;
                match axis {
                    Axis::Horizontal => x,
                    Axis::Vertical => y,
                }
            }
            NativeGeometry::FirstBaselineOffset => self.node(node)?.host.first_baseline.unwrap_or(0.0),
            NativeGeometry::LastBaselineOffset => match self.node(node)?.host.last_baseline {
                Some(offset) => offset,
                None => self.number_of(node, "height")?,
            },
        };
        Ok(value)
    }

    /// Intrinsic size, else the extent of children that do not depend on
    /// this node's size, else the container size
    fn inferred_size(&mut self, node: NodeId, axis: Axis) -> Result<f64> {
        if let Some(size) = self.node(node)?.host.intrinsic_size {
            return Ok(size.get(axis));
        }

        let names = match axis {
            Axis::Horizontal => &HORIZONTAL,
            Axis::Vertical => &VERTICAL,
        };
        let children: Vec<NodeId> = self
            .node(node)?
            .children
            .iter()
            .copied()
            .filter(|c| self.node(*c).map_or(false, |n| !n.hidden))
            .collect();

        let mut extent: Option<(f64, f64)> = None;
        for child in children {
            // Broken children report their own errors
            if self
                .reads_container(node, child, &[names.low, names.size])
                .unwrap_or(true)
            {
                continue;
            }
            let (low, high) = match self.span_of(child, names) {
                Ok(span) => span,
                Err(error) => {
                    log::debug!("{} left out of the size of {}: {}", child, node, error);
                    continue;
                }
            };
            extent = Some(match extent {
                Some((min, max)) => (min.min(low), max.max(high)),
                None => (low.min(0.0), high),
            });
        }

        match extent {
            Some((min, max)) => Ok(max - min),
            None => self.number_of(node, names.container),
        }
    }

    fn span_of(&mut self, child: NodeId, names: &AxisNames) -> Result<(f64, f64)> {
        let low = self.number_of(child, names.low)?;
        Ok((low, low + self.number_of(child, names.size)?))
    }

    /// Whether `roots` on `child` transitively read the size of `container`.
    ///
    /// `parent.` and `containerSize.` reads are followed to the parent, and
    /// `previous.`, `next.` and `#id.` reads into the referenced node, so a
    /// sibling that sizes itself from the container counts as well.
    fn reads_container(&mut self, container: NodeId, child: NodeId, roots: &[&str]) -> Result<bool> {
        let mut visited: HashSet<(NodeId, String)> = HashSet::new();
        let mut pending: Vec<(NodeId, String)> = roots.iter().map(|s| (child, s.to_string())).collect();

        while let Some((node, symbol)) = pending.pop() {
            if node == container {
                return Ok(true);
            }
            if !visited.insert((node, symbol.clone())) {
                continue;
            }
            for read in self.symbols_of(node, &symbol)? {
                if let Some(axis) = read.strip_prefix("containerSize.") {
                    if let Some(parent) = self.node(node)?.parent {
                        pending.push((parent, axis.to_string()));
                    }
                    continue;
                }
                let (target, symbol) = match Reference::parse(&read) {
                    Some(Reference::Parent(symbol)) => (self.node(node)?.parent, symbol),
                    Some(Reference::Previous(symbol)) => (self.visible_sibling(node, false), symbol),
                    Some(Reference::Next(symbol)) => (self.visible_sibling(node, true), symbol),
                    Some(Reference::Id(id, symbol)) => (self.find_by_id(node, id), symbol),
                    Some(Reference::Strings(_)) => continue,
                    None => {
                        pending.push((node, read.clone()));
                        continue;
                    }
                };
                let Some(target) = target else {
                    continue;
                };
                match self.edge_inputs(node, symbol) {
                    Some(inputs) => pending.extend(inputs.iter().map(|s| (target, s.to_string()))),
                    None => pending.push((target, symbol.to_string())),
                }
            }
        }
        Ok(false)
    }

    /// Explicit expressions that lost to a higher-priority rule
    pub fn redundant_expressions(&mut self, node: NodeId) -> Result<Vec<Warning>> {
        let mut warnings = Vec::new();
        let groups: [(&[&str], [&str; 2]); 2] = [
            (&["leading", "trailing", "right", "center.x"], ["left", "width"]),
            (&["bottom", "center.y", "firstBaseline", "lastBaseline"], ["top", "height"]),
        ];

        for (candidates, [position, size]) in groups {
            for candidate in candidates {
                if !self.node(node)?.has_expression(candidate) {
                    continue;
                }
                if self.depends_on(node, position, candidate)? || self.depends_on(node, size, candidate)? {
                    continue;
                }
                warnings.push(Warning::RedundantExpression {
                    node,
                    symbol: candidate.to_string(),
                    superseded_by: format!("{}, {}", position, size),
                });
            }
        }
        Ok(warnings)
    }
}

fn low_rule(names: &AxisNames, explicit: &dyn Fn(&str) -> bool, modern: bool) -> Option<GeometryRule> {
    if explicit(names.high) {
        if modern {
            derived(format!("{} - {} - {}", names.container, names.high, names.size))
        } else {
            derived(format!("{} - {}", names.high, names.size))
        }
    } else if explicit(names.center) {
        derived(format!("{} - {} / 2", names.center, names.size))
    } else {
        derived("0")
    }
}

fn high_rule(names: &AxisNames, modern: bool) -> Option<GeometryRule> {
    if modern {
        derived(format!("{} - ({} + {})", names.container, names.low, names.size))
    } else {
        derived(format!("{} + {}", names.low, names.size))
    }
}

fn axis_of(symbol: &str) -> Axis {
    if symbol.ends_with(".height") {
        Axis::Vertical
    } else {
        Axis::Horizontal
    }
}

#[cfg(test)]
mod tests {
    use crate::core::properties::HostView;
    use crate::core::types::{Direction, Insets, LayoutMode, Size, Value};
    use crate::engine::diagnostics::Warning;
    use crate::engine::node::NodeSpec;
    use crate::{LayoutOptions, LayoutTree, NodeId};

    fn tree(mode: LayoutMode) -> (LayoutTree, NodeId) {
        let mut tree = LayoutTree::new(LayoutOptions {
            layout_mode: mode,
            root_container: Size::new(200.0, 100.0),
            ..Default::default()
        });
        let root = tree.create_node(NodeSpec::new("View").attribute("width", "100%").attribute("height", "100%"));
        (tree, root)
    }

    fn child(tree: &mut LayoutTree, parent: NodeId, spec: NodeSpec) -> NodeId {
        let node = tree.create_node(spec);
        tree.add_child(parent, node).unwrap();
        node
    }

    fn number(tree: &mut LayoutTree, node: NodeId, symbol: &str) -> f64 {
        tree.resolve(node, symbol).unwrap().as_number().unwrap()
    }

    #[test]
    fn test_modern_width_from_left_and_right() {
        for container in [0.0, 100.0, 333.0] {
            let (mut tree, root) = tree(LayoutMode::Modern);
            tree.set_root_container_size(Size::new(container, 100.0)).unwrap();
            let node = child(
                &mut tree,
                root,
                NodeSpec::new("View").attribute("left", "10").attribute("right", "20"),
            );
            let left = number(&mut tree, node, "left");
            let width = number(&mut tree, node, "width");
            let right = number(&mut tree, node, "right");
            assert_eq!(left + width, container - right);
        }
    }

    #[test]
    fn test_legacy_right_is_a_coordinate() {
        let (mut tree, root) = tree(LayoutMode::Legacy);
        let node = child(
            &mut tree,
            root,
            NodeSpec::new("View").attribute("left", "10").attribute("width", "50"),
        );
        assert_eq!(number(&mut tree, node, "right"), 60.0);
        assert_eq!(number(&mut tree, node, "bottom"), 100.0);

        let anchored = child(
            &mut tree,
            root,
            NodeSpec::new("View").attribute("left", "10").attribute("right", "150"),
        );
        assert_eq!(number(&mut tree, anchored, "width"), 140.0);
    }

    #[test]
    fn test_mirrored_direction() {
        let (mut tree, root) = tree(LayoutMode::Modern);
        let rtl = child(
            &mut tree,
            root,
            NodeSpec::new("View")
                .direction(Direction::RightToLeft)
                .attribute("leading", "10")
                .attribute("width", "50"),
        );
        let ltr = child(
            &mut tree,
            root,
            NodeSpec::new("View").attribute("trailing", "10").attribute("width", "50"),
        );
        assert_eq!(number(&mut tree, rtl, "left"), 140.0);
        assert_eq!(number(&mut tree, rtl, "left"), number(&mut tree, ltr, "left"));
        assert_eq!(number(&mut tree, rtl, "trailing"), 140.0);
    }

    #[test]
    fn test_width_from_leading_and_trailing() {
        let (mut tree, root) = tree(LayoutMode::Modern);
        let node = child(
            &mut tree,
            root,
            NodeSpec::new("View").attribute("leading", "16").attribute("trailing", "24"),
        );
        assert_eq!(number(&mut tree, node, "width"), 160.0);
        assert_eq!(number(&mut tree, node, "left"), 16.0);
        assert_eq!(number(&mut tree, node, "center.x"), 96.0);
    }

    #[test]
    fn test_percent_of_parent_width() {
        for container in [0.0, 100.0, 333.0] {
            let (mut tree, root) = tree(LayoutMode::Modern);
            tree.set_root_container_size(Size::new(container, 100.0)).unwrap();
            let node = child(&mut tree, root, NodeSpec::new("View").attribute("width", "50%"));
            let parent_width = number(&mut tree, node, "parent.width");
            assert_eq!(number(&mut tree, node, "width"), parent_width / 2.0);
        }
    }

    #[test]
    fn test_top_from_center_and_baseline() {
        let (mut tree, root) = tree(LayoutMode::Modern);
        let centered = child(
            &mut tree,
            root,
            NodeSpec::new("View").attribute("center.y", "50%").attribute("height", "20"),
        );
        assert_eq!(number(&mut tree, centered, "top"), 40.0);

        let mut host = HostView::new("Label");
        host.first_baseline = Some(12.0);
        host.intrinsic_size = Some(Size::new(80.0, 16.0));
        let label = child(
            &mut tree,
            root,
            NodeSpec::new("Label").host(host).attribute("firstBaseline", "30"),
        );
        assert_eq!(number(&mut tree, label, "top"), 18.0);
        assert_eq!(number(&mut tree, label, "width"), 80.0);
        assert_eq!(number(&mut tree, label, "lastBaseline"), 34.0);
    }

    #[test]
    fn test_inferred_size_skips_parent_dependent_children() {
        let (mut tree, root) = tree(LayoutMode::Modern);
        let container = child(&mut tree, root, NodeSpec::new("View"));
        child(
            &mut tree,
            container,
            NodeSpec::new("View")
                .attribute("left", "10")
                .attribute("width", "40")
                .attribute("height", "30"),
        );
        child(
            &mut tree,
            container,
            NodeSpec::new("View")
                .attribute("top", "50")
                .attribute("width", "20")
                .attribute("height", "25"),
        );
        child(
            &mut tree,
            container,
            NodeSpec::new("View").attribute("width", "100%").attribute("height", "parent.height"),
        );

        assert_eq!(number(&mut tree, container, "width"), 50.0);
        assert_eq!(number(&mut tree, container, "height"), 75.0);

        let empty = child(&mut tree, root, NodeSpec::new("View"));
        assert_eq!(number(&mut tree, empty, "width"), 200.0);
        assert_eq!(tree.resolve(empty, "contentSize.height").unwrap(), Value::Number(100.0));
    }

    #[test]
    fn test_inferred_size_skips_children_reading_the_container_through_siblings() {
        let (mut tree, root) = tree(LayoutMode::Legacy);
        let stack = child(&mut tree, root, NodeSpec::new("View"));
        let full = child(
            &mut tree,
            stack,
            NodeSpec::new("View").attribute("width", "100%").attribute("height", "40"),
        );
        let below = child(
            &mut tree,
            stack,
            NodeSpec::new("View")
                .attribute("top", "previous.bottom")
                .attribute("width", "previous.width")
                .attribute("height", "20"),
        );

        assert_eq!(number(&mut tree, stack, "width"), 200.0);
        assert_eq!(number(&mut tree, stack, "height"), 60.0);
        assert_eq!(number(&mut tree, below, "width"), 200.0);
        assert_eq!(number(&mut tree, full, "width"), 200.0);

        let report = tree.update();
        assert!(report.is_clean(), "{:?}", report.errors);
    }

    #[test]
    fn test_broken_child_does_not_size_its_parent() {
        let (mut tree, root) = tree(LayoutMode::Modern);
        let card = child(&mut tree, root, NodeSpec::new("View"));
        child(&mut tree, card, NodeSpec::new("View").attribute("width", "80"));
        let broken = child(&mut tree, card, NodeSpec::new("View").attribute("width", "widht"));

        assert_eq!(number(&mut tree, card, "width"), 80.0);

        let report = tree.update();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].origin, broken);
        assert_eq!(report.errors[0].symbol.as_deref(), Some("widht"));
        assert_eq!(tree.host(card).unwrap().frame.width, 80.0);
    }

    #[test]
    fn test_content_size_adds_scroll_insets() {
        let (mut tree, root) = tree(LayoutMode::Modern);
        let mut host = HostView::new("ScrollView");
        host.content_inset = Insets {
            top: 10.0,
            left: 4.0,
            bottom: 6.0,
            right: 4.0,
        };
        let scroll = child(
            &mut tree,
            root,
            NodeSpec::new("ScrollView").host(host).attribute("width", "100%"),
        );
        child(
            &mut tree,
            scroll,
            NodeSpec::new("View").attribute("width", "50").attribute("height", "30"),
        );
        child(
            &mut tree,
            scroll,
            NodeSpec::new("View")
                .attribute("left", "20")
                .attribute("top", "40")
                .attribute("width", "100")
                .attribute("height", "20"),
        );

        assert_eq!(number(&mut tree, scroll, "inferredSize.height"), 60.0);
        assert_eq!(number(&mut tree, scroll, "contentSize.height"), 76.0);
        assert_eq!(number(&mut tree, scroll, "inferredContentSize.width"), 128.0);
        assert_eq!(number(&mut tree, scroll, "width"), 200.0);
    }

    #[test]
    fn test_redundant_expression_warning() {
        let (mut tree, root) = tree(LayoutMode::Modern);
        let node = child(
            &mut tree,
            root,
            NodeSpec::new("View")
                .attribute("left", "0")
                .attribute("width", "100")
                .attribute("center.x", "50"),
        );
        let warnings = tree.redundant_expressions(node).unwrap();
        assert_eq!(
            warnings,
            vec![Warning::RedundantExpression {
                node,
                symbol: "center.x".into(),
                superseded_by: "left, width".into(),
            }]
        );

        let used = child(
            &mut tree,
            root,
            NodeSpec::new("View").attribute("center.x", "50").attribute("width", "10"),
        );
        assert!(tree.redundant_expressions(used).unwrap().is_empty());
    }
}
