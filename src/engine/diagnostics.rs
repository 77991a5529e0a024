// FILE: src/engine/diagnostics.rs

//! Error attribution, warnings and symbol suggestions.
//!
//! Errors are attributed to the node that raised them and bubble up the
//! parent chain until a node that handles errors (or the root) is reached.
//! Every node on the way keeps at most one unhandled error.

use crate::core::types::NodeId;
use crate::engine::tree::LayoutTree;
use crate::error::LayoutError;
use std::collections::HashMap;
use std::fmt;

/// An error kept on a node until it is fixed
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub origin: NodeId,
    pub symbol: Option<String>,
    pub message: String,
    pub suggestions: Vec<String>,
    pub transient: bool,
}

impl ErrorRecord {
    pub(crate) fn from_error(origin: NodeId, error: &LayoutError) -> Self {
        Self {
            origin,
            symbol: error.symbol().map(|s| s.to_string()),
            message: error.to_string(),
            suggestions: error.suggestions().to_vec(),
            transient: error.is_transient(),
        }
    }
}

/// Non-fatal findings; never block evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// An explicit expression that no derivation reads because a
    /// higher-priority pair of expressions won
    RedundantExpression {
        node: NodeId,
        symbol: String,
        superseded_by: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::RedundantExpression {
                node,
                symbol,
                superseded_by,
            } => write!(
                f,
                "Expression for '{}' on {} is redundant; position is determined by {}",
                symbol, node, superseded_by
            ),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    debug_mode: bool,
    unhandled: HashMap<NodeId, ErrorRecord>,
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub(crate) fn new(debug_mode: bool) -> Self {
        Self {
            debug_mode,
            ..Default::default()
        }
    }

    /// Keep `record` on `node`; a pending non-transient error wins over a transient one
    fn keep(&mut self, node: NodeId, record: ErrorRecord) {
        match self.unhandled.get(&node) {
            Some(existing) if !existing.transient && record.transient => {}
            _ => {
                self.unhandled.insert(node, record);
            }
        }
    }

    pub(crate) fn warn(&mut self, warning: Warning) {
        if !self.warnings.contains(&warning) {
            log::warn!("{}", warning);
            self.warnings.push(warning);
        }
    }

    pub(crate) fn clear_warnings(&mut self) {
        self.warnings.clear();
    }

    pub(crate) fn forget(&mut self, node: NodeId) {
        self.unhandled.remove(&node);
        self.warnings.retain(|w| match w {
            Warning::RedundantExpression { node: n, .. } => *n != node,
        });
    }
}

impl LayoutTree {
    /// Attribute `error` to `origin` and bubble it to the nearest handler
    pub fn report_error(&mut self, origin: NodeId, error: &LayoutError) {
        let record = ErrorRecord::from_error(origin, error);
        if self.diagnostics.debug_mode {
            log::debug!("{}: {}", origin, record.message);
        } else {
            log::warn!("{}: {}", origin, record.message);
        }

        for node in std::iter::once(origin).chain(self.ancestors(origin)) {
            self.diagnostics.keep(node, record.clone());
            if self.node(node).map_or(true, |n| n.handles_errors) {
                break;
            }
        }
    }

    pub fn unhandled_error(&self, node: NodeId) -> Option<&ErrorRecord> {
        self.diagnostics.unhandled.get(&node)
    }

    /// Drop errors that a successful re-evaluation may have fixed
    pub fn clear_transient_errors(&mut self) {
        self.diagnostics.unhandled.retain(|_, record| !record.transient);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.diagnostics.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.diagnostics.warnings)
    }

    /// Text of the debug overlay: the errors pending on every root, with
    /// suggestions. `None` outside debug mode or when nothing is pending.
    pub fn overlay(&self) -> Option<String> {
        if !self.diagnostics.debug_mode {
            return None;
        }
        let lines: Vec<String> = self
            .roots()
            .into_iter()
            .filter_map(|root| self.unhandled_error(root))
            .map(|record| {
                let mut line = format!("{}: {}", record.origin, record.message);
                if !record.suggestions.is_empty() && !record.message.contains("did you mean") {
                    line.push_str(&format!(" (did you mean {}?)", record.suggestions.join(", ")));
                }
                line
            })
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

/// Candidates similar to `name`, best match first.
///
/// A candidate matches when its normalized edit distance similarity is at
/// least 0.5 or when one name is a prefix of the other. A transposed pair of
/// letters counts as one edit.
pub fn suggest(name: &str, candidates: Vec<String>, max: usize) -> Vec<String> {
    let lowered = name.to_lowercase();
    let mut scored: Vec<(f64, String)> = candidates
        .into_iter()
        .filter(|c| c != name)
        .filter_map(|candidate| {
            let other = candidate.to_lowercase();
            let mut score = strsim::normalized_damerau_levenshtein(&lowered, &other);
            if !lowered.is_empty() && (other.starts_with(&lowered) || lowered.starts_with(&other)) {
                score = score.max(0.75);
            }
            (score >= 0.5).then_some((score, candidate))
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored.dedup_by(|a, b| a.1 == b.1);
    scored.into_iter().take(max).map(|(_, name)| name).collect()
}
