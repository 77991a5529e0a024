// FILE: src/document.rs

//! Serde-described layout documents.
//!
//! A document is a plain data description of a node tree (JSON or TOML),
//! loaded into a [`LayoutTree`]. It is not a markup language: every node
//! lists its attributes, macros, parameters, state and constants directly.

use crate::core::properties::HostView;
use crate::core::types::{Color, Direction, Insets, NodeId, Size, Value, ValueKind};
use crate::engine::node::NodeSpec;
use crate::engine::tree::LayoutTree;
use crate::error::{LayoutError, Result};
use crate::LayoutOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions `locate` and `load_file` understand
pub const DOCUMENT_EXTENSIONS: &[&str] = &["json", "toml"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutDocument {
    /// Table read by `strings.key`
    #[serde(default)]
    pub strings: BTreeMap<String, String>,
    pub root: NodeDescription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    #[serde(rename = "type", default = "default_type")]
    pub type_name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub macros: BTreeMap<String, String>,
    /// Parameter name to kind name (`number`, `string`, `bool`, `color`, `any`)
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub state: BTreeMap<String, Literal>,
    #[serde(default)]
    pub constants: BTreeMap<String, Literal>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub handles_errors: bool,
    /// Host-reported intrinsic content size
    #[serde(default)]
    pub intrinsic_size: Option<Size>,
    #[serde(default)]
    pub content_inset: Option<Insets>,
    #[serde(default)]
    pub first_baseline: Option<f64>,
    #[serde(default)]
    pub last_baseline: Option<f64>,
    #[serde(default)]
    pub children: Vec<NodeDescription>,
}

impl Default for NodeDescription {
    fn default() -> Self {
        Self {
            type_name: default_type(),
            id: None,
            attributes: BTreeMap::new(),
            macros: BTreeMap::new(),
            parameters: BTreeMap::new(),
            state: BTreeMap::new(),
            constants: BTreeMap::new(),
            direction: None,
            hidden: false,
            handles_errors: false,
            intrinsic_size: None,
            content_inset: None,
            first_baseline: None,
            last_baseline: None,
            children: Vec::new(),
        }
    }
}

fn default_type() -> String {
    "View".to_string()
}

/// A state or constant value. Strings starting with `#` that parse as a hex
/// color become colors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => Value::Number(*n),
            Literal::Text(s) if s.starts_with('#') => match Color::from_hex(s) {
                Some(color) => Value::Color(color),
                None => Value::String(s.clone()),
            },
            Literal::Text(s) => Value::String(s.clone()),
        }
    }
}

impl LayoutDocument {
    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str(source).map_err(|e| LayoutError::MalformedDocument {
            message: format!("JSON: {}", e),
        })
    }

    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| LayoutError::MalformedDocument {
            message: format!("TOML: {}", e),
        })
    }

    /// Create every node in a fresh tree. Returns the tree and the root node.
    pub fn build(&self, options: LayoutOptions) -> Result<(LayoutTree, NodeId)> {
        let mut tree = LayoutTree::new(options);
        let root = {
            let _lock = tree.begin_update();
            let root = build_node(&mut tree, &self.root)?;
            if !self.strings.is_empty() {
                tree.set_strings(self.strings.clone())?;
            }
            root
        };
        log::debug!("Built {} node(s) from document", tree.subtree(root).len());
        Ok((tree, root))
    }
}

fn build_node(tree: &mut LayoutTree, description: &NodeDescription) -> Result<NodeId> {
    let mut spec = NodeSpec::new(description.type_name.as_str())
        .hidden(description.hidden)
        .handles_errors(description.handles_errors);

    if let Some(id) = &description.id {
        spec = spec.id(id.as_str());
    }
    if let Some(direction) = description.direction {
        spec = spec.direction(direction);
    }
    for (name, source) in &description.attributes {
        spec = spec.attribute(name.as_str(), source.as_str());
    }
    for (name, source) in &description.macros {
        spec = spec.macro_def(name.as_str(), source.as_str());
    }
    for (name, kind) in &description.parameters {
        let kind = ValueKind::from_name(kind).ok_or_else(|| LayoutError::MalformedDocument {
            message: format!("Parameter '{}' has unknown kind '{}'", name, kind),
        })?;
        spec = spec.parameter(name.as_str(), kind);
    }
    for (key, literal) in &description.state {
        spec = spec.state(key.as_str(), Value::from(literal));
    }
    for (key, literal) in &description.constants {
        spec = spec.constant(key.as_str(), Value::from(literal));
    }

    let has_host_metrics = description.intrinsic_size.is_some()
        || description.content_inset.is_some()
        || description.first_baseline.is_some()
        || description.last_baseline.is_some();
    if has_host_metrics {
        let mut host = HostView::new(description.type_name.as_str());
        host.intrinsic_size = description.intrinsic_size;
        host.content_inset = description.content_inset.unwrap_or_default();
        host.first_baseline = description.first_baseline;
        host.last_baseline = description.last_baseline;
        spec = spec.host(host);
    }

    let node = tree.create_node(spec);
    for child in &description.children {
        let child = build_node(tree, child)?;
        tree.add_child(node, child)?;
    }
    Ok(node)
}

pub fn from_json_str(source: &str, options: LayoutOptions) -> Result<(LayoutTree, NodeId)> {
    LayoutDocument::from_json(source)?.build(options)
}

pub fn from_toml_str(source: &str, options: LayoutOptions) -> Result<(LayoutTree, NodeId)> {
    LayoutDocument::from_toml(source)?.build(options)
}

/// Parse a document file, picking the format from its extension
pub fn read_document(path: &Path) -> Result<LayoutDocument> {
    let source = fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => LayoutDocument::from_json(&source),
        Some("toml") => LayoutDocument::from_toml(&source),
        _ => Err(LayoutError::InvalidFormat {
            message: format!(
                "Unsupported document '{}'; expected a .json or .toml file",
                path.display()
            ),
        }),
    }
}

pub fn load_file(path: impl AsRef<Path>, options: LayoutOptions) -> Result<(LayoutTree, NodeId)> {
    let path = path.as_ref();
    log::debug!("Loading layout document {}", path.display());
    read_document(path)?.build(options)
}

/// Find the document called `name` (with or without extension) under `dir`.
/// More than one match is a [`LayoutError::DuplicateSource`].
pub fn locate(dir: impl AsRef<Path>, name: &str) -> Result<PathBuf> {
    let mut matches = Vec::new();
    for entry in walkdir::WalkDir::new(dir.as_ref()) {
        let entry = entry.map_err(|e| {
            LayoutError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Directory traversal error: {}", e),
            ))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| DOCUMENT_EXTENSIONS.contains(&e));
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let stem = path.file_stem().and_then(|n| n.to_str()).unwrap_or_default();
        if supported && (file_name == name || stem == name) {
            matches.push(path.to_path_buf());
        }
    }

    match matches.len() {
        0 => Err(LayoutError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("No layout document named '{}' in {}", name, dir.as_ref().display()),
        ))),
        1 => Ok(matches.remove(0)),
        _ => {
            matches.sort();
            let listed: Vec<String> = matches.iter().map(|p| p.display().to_string()).collect();
            Err(LayoutError::DuplicateSource {
                message: format!("'{}' matches {}", name, listed.join(", ")),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CARD_TOML: &str = r##"
[strings]
title = "Settings"

[root]
type = "View"
attributes = { width = "100%", height = "100%" }
constants = { gap = 12, accent = "#ff0000" }
macros = { inset = "gap * 2" }

[[root.children]]
type = "Label"
id = "title"
attributes = { text = "{strings.title}", left = "inset", top = "gap" }
intrinsic_size = { width = 80, height = 20 }

[[root.children]]
type = "View"
attributes = { top = "#title.top + #title.height + gap", left = "inset", right = "inset", height = "40" }
"##;

    fn options() -> LayoutOptions {
        LayoutOptions {
            root_container: Size::new(300.0, 500.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_toml_document_builds_tree() {
        let (mut tree, root) = from_toml_str(CARD_TOML, options()).unwrap();
        let children = tree.children(root).unwrap().to_vec();
        assert_eq!(children.len(), 2);

        assert_eq!(tree.resolve(children[0], "text").unwrap(), Value::from("Settings"));
        assert_eq!(tree.resolve(children[0], "width").unwrap(), Value::Number(80.0));
        assert_eq!(tree.resolve(children[1], "top").unwrap(), Value::Number(44.0));
        assert_eq!(tree.resolve(children[1], "width").unwrap(), Value::Number(252.0));
        assert_eq!(
            tree.resolve(root, "accent").unwrap(),
            Value::Color(Color::rgba(1.0, 0.0, 0.0, 1.0))
        );
        assert!(!tree.is_update_locked());
    }

    #[test]
    fn test_json_errors_are_malformed_document() {
        assert!(matches!(
            from_json_str("{ \"root\": ", options()),
            Err(LayoutError::MalformedDocument { .. })
        ));
        assert!(matches!(
            from_json_str(r#"{ "root": { "parameters": { "size": "vector" } } }"#, options()),
            Err(LayoutError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_load_file_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        let toml_path = temp_dir.path().join("card.toml");
        fs::write(&toml_path, CARD_TOML).unwrap();
        let (tree, root) = load_file(&toml_path, options()).unwrap();
        assert_eq!(tree.subtree(root).len(), 3);

        let xml_path = temp_dir.path().join("card.xml");
        fs::write(&xml_path, "<View/>").unwrap();
        assert!(matches!(
            load_file(&xml_path, options()),
            Err(LayoutError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_locate_reports_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        fs::write(temp_dir.path().join("card.toml"), CARD_TOML).unwrap();
        fs::write(temp_dir.path().join("list.json"), "{}").unwrap();
        fs::write(temp_dir.path().join("nested").join("list.toml"), "").unwrap();

        assert_eq!(
            locate(temp_dir.path(), "card").unwrap(),
            temp_dir.path().join("card.toml")
        );
        let err = locate(temp_dir.path(), "list").unwrap_err();
        assert!(matches!(err, LayoutError::DuplicateSource { .. }));
        assert!(!err.is_transient());
        assert!(matches!(locate(temp_dir.path(), "missing"), Err(LayoutError::Io(_))));
    }
}
