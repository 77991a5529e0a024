// FILE: src/core/properties.rs

//! Statically registered capability tables for host objects
//!
//! Every host type (`View`, `Label`, `ScrollView`, ...) exposes a table of
//! `name -> (kind, category, getter, setter)` entries. Tables are assembled
//! once per type by the owning [`CapabilityRegistry`] and shared afterwards.

use crate::core::types::{AttributeCategory, Insets, Rect, Size, Value, ValueKind};
use crate::error::{LayoutError, Result};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

pub type Getter = Rc<dyn Fn(&HostView) -> Value>;
pub type Setter = Rc<dyn Fn(&mut HostView, Value) -> Result<()>>;

/// The native content bound to a node
#[derive(Debug, Clone, PartialEq)]
pub struct HostView {
    type_name: String,
    pub frame: Rect,
    pub intrinsic_size: Option<Size>,
    pub content_inset: Insets,
    pub content_offset: (f64, f64),
    pub first_baseline: Option<f64>,
    pub last_baseline: Option<f64>,
    properties: BTreeMap<String, Value>,
}

impl HostView {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            frame: Rect::default(),
            intrinsic_size: None,
            content_inset: Insets::default(),
            content_offset: (0.0, 0.0),
            first_baseline: None,
            last_baseline: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn set_property(&mut self, name: &str, value: Value) {
        self.properties.insert(name.to_string(), value);
    }
}

#[derive(Clone)]
pub struct Capability {
    pub name: String,
    pub kind: ValueKind,
    pub category: AttributeCategory,
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl Capability {
    pub fn get(&self, host: &HostView) -> Option<Value> {
        self.getter.as_ref().map(|get| get(host))
    }

    pub fn set(&self, host: &mut HostView, value: Value) -> Result<()> {
        match &self.setter {
            Some(set) => set(host, value),
            None => Err(LayoutError::AttributeNotSettable {
                name: self.name.clone(),
            }),
        }
    }

    pub fn is_settable(&self) -> bool {
        self.setter.is_some()
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("category", &self.category)
            .field("settable", &self.is_settable())
            .finish()
    }
}

/// Result of looking up an attribute in a capability table
#[derive(Debug)]
pub enum CapabilityLookup<'a> {
    Missing,
    ReadOnly(&'a Capability),
    Settable(&'a Capability),
}

impl<'a> CapabilityLookup<'a> {
    pub fn capability(&self) -> Option<&'a Capability> {
        match *self {
            CapabilityLookup::Missing => None,
            CapabilityLookup::ReadOnly(c) | CapabilityLookup::Settable(c) => Some(c),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapabilityTable {
    type_name: String,
    entries: BTreeMap<String, Capability>,
}

impl CapabilityTable {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Start from the entries of a base table
    pub fn inherit(mut self, base: &CapabilityTable) -> Self {
        for (name, capability) in &base.entries {
            self.entries.entry(name.clone()).or_insert_with(|| capability.clone());
        }
        self
    }

    /// A plain property stored in the host's property bag
    pub fn property(self, name: &str, kind: ValueKind) -> Self {
        let key = name.to_string();
        let getter_key = key.clone();
        let getter: Getter = Rc::new(move |host: &HostView| {
            host.property(&getter_key)
                .cloned()
                .unwrap_or_else(|| kind.default_value())
        });
        let setter: Setter = Rc::new(move |host: &mut HostView, value: Value| {
            let cast = value
                .cast(kind)
                .ok_or_else(|| LayoutError::type_mismatch(&key, kind.to_string(), value.kind_name()))?;
            host.set_property(&key, cast);
            Ok(())
        });
        self.custom(name, kind, Some(getter), Some(setter))
    }

    pub fn read_only(self, name: &str, kind: ValueKind, getter: Getter) -> Self {
        self.custom(name, kind, Some(getter), None)
    }

    pub fn custom(
        mut self,
        name: &str,
        kind: ValueKind,
        getter: Option<Getter>,
        setter: Option<Setter>,
    ) -> Self {
        self.entries.insert(
            name.to_string(),
            Capability {
                name: name.to_string(),
                kind,
                category: AttributeCategory::for_kind(kind),
                getter,
                setter,
            },
        );
        self
    }

    pub fn lookup(&self, name: &str) -> CapabilityLookup<'_> {
        match self.entries.get(name) {
            None => CapabilityLookup::Missing,
            Some(c) if c.is_settable() => CapabilityLookup::Settable(c),
            Some(c) => CapabilityLookup::ReadOnly(c),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }
}

/// Per-tree registry that assembles capability tables lazily and caches them
pub struct CapabilityRegistry {
    builders: HashMap<String, fn() -> CapabilityTable>,
    tables: RefCell<HashMap<String, Rc<CapabilityTable>>>,
}

impl CapabilityRegistry {
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
            tables: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("View", view_table);
        registry.register("Label", label_table);
        registry.register("Button", button_table);
        registry.register("ImageView", image_view_table);
        registry.register("ScrollView", scroll_view_table);
        registry
    }

    pub fn register(&mut self, type_name: &str, builder: fn() -> CapabilityTable) {
        self.builders.insert(type_name.to_string(), builder);
        self.tables.borrow_mut().remove(type_name);
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.builders.contains_key(type_name)
    }

    pub fn table_for(&self, type_name: &str) -> Option<Rc<CapabilityTable>> {
        if let Some(table) = self.tables.borrow().get(type_name) {
            return Some(Rc::clone(table));
        }
        let builder = self.builders.get(type_name)?;
        let table = Rc::new(builder());
        log::debug!("Assembled capability table for '{}'", type_name);
        self.tables
            .borrow_mut()
            .insert(type_name.to_string(), Rc::clone(&table));
        Some(table)
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn view_table() -> CapabilityTable {
    CapabilityTable::new("View")
        .property("alpha", ValueKind::Number)
        .property("backgroundColor", ValueKind::Color)
        .property("cornerRadius", ValueKind::Number)
        .property("tag", ValueKind::Number)
        .property("isHidden", ValueKind::Bool)
        .property("accessibilityLabel", ValueKind::String)
}

fn label_table() -> CapabilityTable {
    CapabilityTable::new("Label")
        .inherit(&view_table())
        .property("text", ValueKind::String)
        .property("textColor", ValueKind::Color)
        .property("fontSize", ValueKind::Number)
        .property("textAlignment", ValueKind::Number)
        .property("numberOfLines", ValueKind::Number)
}

fn button_table() -> CapabilityTable {
    CapabilityTable::new("Button")
        .inherit(&view_table())
        .property("title", ValueKind::String)
        .property("titleColor", ValueKind::Color)
        .property("isEnabled", ValueKind::Bool)
}

fn image_view_table() -> CapabilityTable {
    CapabilityTable::new("ImageView")
        .inherit(&view_table())
        .property("image", ValueKind::String)
}

fn scroll_view_table() -> CapabilityTable {
    fn inset(name: &str, get: fn(&Insets) -> f64, set: fn(&mut Insets, f64)) -> (Getter, Setter) {
        let key = name.to_string();
        let getter: Getter = Rc::new(move |host: &HostView| Value::Number(get(&host.content_inset)));
        let setter: Setter = Rc::new(move |host: &mut HostView, value: Value| {
            let n = value
                .as_number()
                .ok_or_else(|| LayoutError::type_mismatch(&key, "number", value.kind_name()))?;
            set(&mut host.content_inset, n);
            Ok(())
        });
        (getter, setter)
    }

    let (top_get, top_set) = inset("contentInset.top", |i| i.top, |i, v| i.top = v);
    let (left_get, left_set) = inset("contentInset.left", |i| i.left, |i, v| i.left = v);
    let (bottom_get, bottom_set) = inset("contentInset.bottom", |i| i.bottom, |i, v| i.bottom = v);
    let (right_get, right_set) = inset("contentInset.right", |i| i.right, |i, v| i.right = v);

    CapabilityTable::new("ScrollView")
        .inherit(&view_table())
        .property("isScrollEnabled", ValueKind::Bool)
        .custom("contentInset.top", ValueKind::Number, Some(top_get), Some(top_set))
        .custom("contentInset.left", ValueKind::Number, Some(left_get), Some(left_set))
        .custom("contentInset.bottom", ValueKind::Number, Some(bottom_get), Some(bottom_set))
        .custom("contentInset.right", ValueKind::Number, Some(right_get), Some(right_set))
        .read_only(
            "isDecelerating",
            ValueKind::Bool,
            Rc::new(|_: &HostView| Value::Bool(false)),
        )
}
