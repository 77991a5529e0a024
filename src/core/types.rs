// FILE: src/core/types.rs

//! Value and geometry types shared by the compiler and the engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a node inside a [`crate::LayoutTree`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}

/// Expected kind of an attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Number,
    String,
    Bool,
    Color,
    Any,
}

impl ValueKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "number" | "float" | "double" | "int" | "cgfloat" => Some(Self::Number),
            "string" | "text" => Some(Self::String),
            "bool" | "boolean" => Some(Self::Bool),
            "color" | "uicolor" => Some(Self::Color),
            "any" => Some(Self::Any),
            _ => None,
        }
    }

    /// Value used when an expression evaluates to nil or fails in non-debug mode
    pub fn default_value(&self) -> Value {
        match self {
            Self::Number => Value::Number(0.0),
            Self::String => Value::String(String::new()),
            Self::Bool => Value::Bool(false),
            Self::Color => Value::Color(Color::CLEAR),
            Self::Any => Value::Nil,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Number => "number",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Color => "color",
            Self::Any => "any",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    pub fn dimension(&self) -> &'static str {
        match self {
            Axis::Horizontal => "width",
            Axis::Vertical => "height",
        }
    }
}

/// Attribute categories, each with its own compilation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeCategory {
    /// Edge and center positions: percentages refer to the container
    Position(Axis),
    /// `width` / `height`: percentages refer to the container, `auto` to the inferred size
    Size(Axis),
    /// `contentSize.*`: percentages refer to the inferred size
    ContentSize(Axis),
    Color,
    /// Text-bearing attributes, always compiled in interpolation mode
    Text,
    Generic,
}

impl AttributeCategory {
    pub fn for_kind(kind: ValueKind) -> Self {
        match kind {
            ValueKind::String => Self::Text,
            ValueKind::Color => Self::Color,
            _ => Self::Generic,
        }
    }

    /// Symbol that `N%` is taken relative to, if percentages are allowed
    pub fn percent_reference(&self) -> Option<String> {
        match self {
            Self::Position(axis) | Self::Size(axis) => {
                Some(format!("containerSize.{}", axis.dimension()))
            }
            Self::ContentSize(axis) => Some(format!("inferredSize.{}", axis.dimension())),
            _ => None,
        }
    }

    /// Symbol that `auto` stands for
    pub fn auto_reference(&self) -> Option<String> {
        match self {
            Self::Size(axis) => Some(format!("inferredSize.{}", axis.dimension())),
            Self::ContentSize(axis) => Some(format!("inferredContentSize.{}", axis.dimension())),
            _ => None,
        }
    }
}

/// Writing direction used to map leading/trailing onto left/right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "ltr", alias = "leftToRight")]
    LeftToRight,
    #[serde(rename = "rtl", alias = "rightToLeft")]
    RightToLeft,
}

impl Default for Direction {
    fn default() -> Self {
        Self::LeftToRight
    }
}

/// Layout-mode family, selected tree-wide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// `right = left + width`, `bottom = top + height`
    Legacy,
    /// `right`/`bottom` are insets from the container's far edges
    Modern,
}

impl Default for LayoutMode {
    fn default() -> Self {
        Self::Modern
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const CLEAR: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };

    pub fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
            a: a.clamp(0.0, 1.0),
        }
    }

    /// Parse `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let expanded: String = match digits.len() {
            3 | 4 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 | 8 => digits.to_string(),
            _ => return None,
        };
        let channel = |i: usize| -> Option<f64> {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .ok()
                .map(|v| v as f64 / 255.0)
        };
        let alpha = if expanded.len() == 8 { channel(6)? } else { 1.0 };
        Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, alpha))
    }

    pub fn to_hex(&self) -> String {
        let byte = |v: f64| (v * 255.0).round() as u8;
        if self.a >= 1.0 {
            format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
        } else {
            format!(
                "#{:02x}{:02x}{:02x}{:02x}",
                byte(self.r),
                byte(self.g),
                byte(self.b),
                byte(self.a)
            )
        }
    }
}

/// A dynamically typed expression value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Number(f64),
    Bool(bool),
    String(String),
    Color(Color),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Color(_) => "color",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Nil => Some(0.0),
            Value::String(s) => s.trim().parse().ok(),
            Value::Color(_) => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Number(n) => *n != 0.0,
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty(),
            Value::Color(c) => c.a > 0.0,
        }
    }

    /// Whether a value of this shape may replace `other` in a typed slot
    pub fn same_kind(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Cast to the declared kind of an attribute, `None` when impossible
    pub fn cast(&self, kind: ValueKind) -> Option<Value> {
        match kind {
            ValueKind::Any => Some(self.clone()),
            ValueKind::Number => match self {
                Value::Color(_) => None,
                other => other.as_number().map(Value::Number),
            },
            ValueKind::String => match self {
                Value::Nil => Some(Value::String(String::new())),
                other => Some(Value::String(other.to_string())),
            },
            ValueKind::Bool => match self {
                Value::String(s) => match s.as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    _ => None,
                },
                Value::Color(_) => None,
                other => Some(Value::Bool(other.is_truthy())),
            },
            ValueKind::Color => match self {
                Value::Color(c) => Some(Value::Color(*c)),
                Value::Nil => Some(Value::Color(Color::CLEAR)),
                Value::String(s) => Color::from_hex(s)
                    .or_else(|| crate::core::constants::named_color(s))
                    .map(Value::Color),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Bool(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::Color(c) => write!(f, "{}", c.to_hex()),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Color> for Value {
    fn from(value: Color) -> Self {
        Value::Color(value)
    }
}

/// Print integral numbers without a trailing `.0`
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.width,
            Axis::Vertical => self.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Insets {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl Insets {
    pub fn along(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.left + self.right,
            Axis::Vertical => self.top + self.bottom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex_parsing() {
        let c = Color::from_hex("#ff0000").unwrap();
        assert_eq!(c, Color::rgba(1.0, 0.0, 0.0, 1.0));
        assert_eq!(Color::from_hex("#f00").unwrap(), c);
        assert_eq!(Color::from_hex("#ff000080").unwrap().to_hex(), "#ff000080");
        assert!(Color::from_hex("#12345").is_none());
        assert!(Color::from_hex("#ggg").is_none());
    }

    #[test]
    fn test_value_casts() {
        assert_eq!(Value::Bool(true).cast(ValueKind::Number), Some(Value::Number(1.0)));
        assert_eq!(Value::from("12.5").cast(ValueKind::Number), Some(Value::Number(12.5)));
        assert_eq!(Value::from("abc").cast(ValueKind::Number), None);
        assert_eq!(Value::Number(3.0).cast(ValueKind::String), Some(Value::from("3")));
        assert_eq!(Value::Nil.cast(ValueKind::Number), Some(Value::Number(0.0)));
        assert_eq!(
            Value::from("red").cast(ValueKind::Color),
            Some(Value::Color(Color::rgba(1.0, 0.0, 0.0, 1.0)))
        );
        assert_eq!(Value::Number(1.0).cast(ValueKind::Color), None);
    }

    #[test]
    fn test_number_display() {
        assert_eq!(Value::Number(42.0).to_string(), "42");
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(Value::Nil.to_string(), "");
    }

    #[test]
    fn test_percent_reference_by_category() {
        assert_eq!(
            AttributeCategory::Position(Axis::Horizontal).percent_reference().as_deref(),
            Some("containerSize.width")
        );
        assert_eq!(
            AttributeCategory::Size(Axis::Vertical).percent_reference().as_deref(),
            Some("containerSize.height")
        );
        assert_eq!(
            AttributeCategory::ContentSize(Axis::Horizontal).percent_reference().as_deref(),
            Some("inferredSize.width")
        );
        assert_eq!(AttributeCategory::Text.percent_reference(), None);
    }
}
