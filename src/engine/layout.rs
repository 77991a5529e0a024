// FILE: src/engine/layout.rs

//! The layout pass: evaluate every attribute, hand values to the host
//! setters and compute frames.

use crate::core::constants::is_geometry_symbol;
use crate::core::properties::CapabilityLookup;
use crate::core::types::{NodeId, Rect};
use crate::engine::diagnostics::{ErrorRecord, Warning};
use crate::engine::tree::LayoutTree;
use crate::error::{LayoutError, Result};
use serde::Serialize;

/// Outcome of one [`LayoutTree::update`] pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateReport {
    /// Nodes visited
    pub nodes: usize,
    /// Attribute values handed to host setters
    pub applied: usize,
    #[serde(skip)]
    pub errors: Vec<ErrorRecord>,
    #[serde(skip)]
    pub warnings: Vec<Warning>,
    /// The pass was skipped because an update lock is held
    pub suppressed: bool,
}

impl UpdateReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.suppressed
    }
}

impl LayoutTree {
    /// Lay out every node. Errors are reported per node and never abort the
    /// pass; values that cannot be computed fall back to zero.
    pub fn update(&mut self) -> UpdateReport {
        if self.is_update_locked() {
            log::debug!("Layout update suppressed by {} lock(s)", self.update_lock.get());
            return UpdateReport {
                suppressed: true,
                ..Default::default()
            };
        }

        self.clear_transient_errors();
        self.diagnostics.clear_warnings();
        let mut report = UpdateReport::default();
        let order: Vec<NodeId> = self
            .roots()
            .into_iter()
            .flat_map(|root| self.subtree(root))
            .collect();
        for node in order {
            report.nodes += 1;
            self.update_node(node, &mut report);
        }

        report.warnings = self.warnings().to_vec();
        self.needs_layout = false;
        log::debug!(
            "Layout pass {}: {} node(s), {} value(s) applied, {} error(s)",
            self.pass,
            report.nodes,
            report.applied,
            report.errors.len()
        );
        report
    }

    /// Run [`update`](Self::update) only when something changed since the last pass
    pub fn update_if_needed(&mut self) -> Option<UpdateReport> {
        if !self.needs_layout || self.is_update_locked() {
            return None;
        }
        Some(self.update())
    }

    /// Resolved frame of a node, relative to its parent
    pub fn frame(&mut self, node: NodeId) -> Result<Rect> {
        Ok(Rect::new(
            self.number_of(node, "left")?,
            self.number_of(node, "top")?,
            self.number_of(node, "width")?,
            self.number_of(node, "height")?,
        ))
    }

    fn update_node(&mut self, node: NodeId, report: &mut UpdateReport) {
        let names: Vec<String> = match self.node(node) {
            Ok(target) => target.attributes.keys().cloned().collect(),
            Err(_) => return,
        };

        for name in names.iter().filter(|n| !is_geometry_symbol(n)) {
            match self.apply_attribute(node, name) {
                Ok(true) => report.applied += 1,
                Ok(false) => {}
                Err(error) => self.record_error(node, error, report),
            }
        }

        let mut frame = [0.0; 4];
        for (slot, symbol) in frame.iter_mut().zip(["left", "top", "width", "height"]) {
            match self.number_of(node, symbol) {
                Ok(value) => *slot = value,
                Err(error) => self.record_error(node, error, report),
            }
        }
        if let Ok(target) = self.node_mut(node) {
            target.host.frame = Rect::new(frame[0], frame[1], frame[2], frame[3]);
        }

        match self.redundant_expressions(node) {
            Ok(warnings) => {
                for warning in warnings {
                    self.diagnostics.warn(warning);
                }
            }
            Err(error) => self.record_error(node, error, report),
        }
    }

    /// Evaluate an attribute and hand it to the host. Returns `false` for
    /// parameter values, which only feed descendants.
    fn apply_attribute(&mut self, node: NodeId, name: &str) -> Result<bool> {
        let (kind, _) = self.attribute_signature(node, name);
        let value = self.resolve_as(node, name, kind)?;

        let target = self.node(node)?;
        if target.parameters.contains_key(name) {
            return Ok(false);
        }
        let Some(table) = self.capabilities.table_for(target.type_name()) else {
            return Ok(false);
        };
        let capability = match table.lookup(name) {
            CapabilityLookup::Settable(capability) => capability.clone(),
            CapabilityLookup::ReadOnly(_) => {
                return Err(LayoutError::AttributeNotSettable {
                    name: name.to_string(),
                })
            }
            CapabilityLookup::Missing => {
                return Err(LayoutError::AttributeNotFound {
                    name: name.to_string(),
                })
            }
        };

        log::trace!("Applying {}.{} = {}", node, name, value);
        capability.set(&mut self.node_mut(node)?.host, value)?;
        Ok(true)
    }

    fn record_error(&mut self, node: NodeId, error: LayoutError, report: &mut UpdateReport) {
        self.report_error(node, &error);
        report.errors.push(ErrorRecord::from_error(node, &error));
    }
}
