// FILE: src/core/constants.rs

use crate::core::types::{Axis, AttributeCategory, Color, Value};
use std::collections::{BTreeMap, HashMap};

/// Geometry symbols the engine derives when no explicit expression exists
pub const GEOMETRY_SYMBOLS: &[&str] = &[
    "left",
    "top",
    "width",
    "height",
    "right",
    "bottom",
    "leading",
    "trailing",
    "center.x",
    "center.y",
    "firstBaseline",
    "lastBaseline",
    "containerSize.width",
    "containerSize.height",
    "contentSize.width",
    "contentSize.height",
    "inferredSize.width",
    "inferredSize.height",
    "inferredContentSize.width",
    "inferredContentSize.height",
    "contentOffset.x",
    "contentOffset.y",
    "firstBaselineOffset",
    "lastBaselineOffset",
];

pub fn is_geometry_symbol(name: &str) -> bool {
    GEOMETRY_SYMBOLS.contains(&name)
}

/// Category of a geometry attribute, `None` for everything else
pub fn geometry_category(name: &str) -> Option<AttributeCategory> {
    use AttributeCategory::*;
    let category = match name {
        "left" | "right" | "leading" | "trailing" | "center.x" => Position(Axis::Horizontal),
        "top" | "bottom" | "center.y" | "firstBaseline" | "lastBaseline" => {
            Position(Axis::Vertical)
        }
        "width" => Size(Axis::Horizontal),
        "height" => Size(Axis::Vertical),
        "contentSize.width" => ContentSize(Axis::Horizontal),
        "contentSize.height" => ContentSize(Axis::Vertical),
        _ => return None,
    };
    Some(category)
}

pub fn named_color(name: &str) -> Option<Color> {
    let color = match name {
        "black" => Color::rgba(0.0, 0.0, 0.0, 1.0),
        "white" => Color::rgba(1.0, 1.0, 1.0, 1.0),
        "red" => Color::rgba(1.0, 0.0, 0.0, 1.0),
        "green" => Color::rgba(0.0, 1.0, 0.0, 1.0),
        "blue" => Color::rgba(0.0, 0.0, 1.0, 1.0),
        "yellow" => Color::rgba(1.0, 1.0, 0.0, 1.0),
        "orange" => Color::rgba(1.0, 0.5, 0.0, 1.0),
        "purple" => Color::rgba(0.5, 0.0, 0.5, 1.0),
        "gray" | "grey" => Color::rgba(0.5, 0.5, 0.5, 1.0),
        "lightGray" => Color::rgba(2.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0, 1.0),
        "darkGray" => Color::rgba(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0, 1.0),
        "clear" => Color::CLEAR,
        _ => return None,
    };
    Some(color)
}

/// Type-level constants addressed as `Namespace.member`
///
/// Owned by a tree, never global, so independent trees can register
/// different members.
#[derive(Debug, Clone)]
pub struct StaticConstants {
    namespaces: HashMap<String, BTreeMap<String, Value>>,
}

impl StaticConstants {
    pub fn empty() -> Self {
        Self {
            namespaces: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut constants = Self::empty();

        for name in [
            "black", "white", "red", "green", "blue", "yellow", "orange", "purple", "gray",
            "lightGray", "darkGray", "clear",
        ] {
            if let Some(color) = named_color(name) {
                constants.register("Color", name, Value::Color(color));
            }
        }

        for (i, name) in ["left", "center", "right", "justified", "natural"].iter().enumerate() {
            constants.register("Alignment", name, Value::Number(i as f64));
        }

        for (i, name) in [
            "byWordWrapping",
            "byCharWrapping",
            "byClipping",
            "byTruncatingHead",
            "byTruncatingTail",
            "byTruncatingMiddle",
        ]
        .iter()
        .enumerate()
        {
            constants.register("LineBreak", name, Value::Number(i as f64));
        }

        constants
    }

    pub fn register(&mut self, namespace: &str, member: &str, value: Value) {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(member.to_string(), value);
    }

    pub fn is_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    pub fn lookup(&self, namespace: &str, member: &str) -> Option<&Value> {
        self.namespaces.get(namespace).and_then(|m| m.get(member))
    }

    /// Split `Namespace.member` when the namespace is registered
    pub fn split<'a>(&self, symbol: &'a str) -> Option<(&'a str, &'a str)> {
        let (namespace, member) = symbol.split_once('.')?;
        if self.is_namespace(namespace) {
            Some((namespace, member))
        } else {
            None
        }
    }

    pub fn members(&self, namespace: &str) -> Vec<String> {
        self.namespaces
            .get(namespace)
            .map(|m| m.keys().map(|k| format!("{}.{}", namespace, k)).collect())
            .unwrap_or_default()
    }
}

impl Default for StaticConstants {
    fn default() -> Self {
        Self::with_defaults()
    }
}
