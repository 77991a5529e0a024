//! Error types for the Kryon layout engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Syntax error in '{symbol}': {message}")]
    Syntax { symbol: String, message: String },

    #[error("Unknown symbol '{symbol}'{}", format_suggestions(.suggestions))]
    UnknownSymbol { symbol: String, suggestions: Vec<String> },

    #[error("Symbol '{symbol}' references itself")]
    SelfReference { symbol: String },

    #[error("Circular reference detected for '{symbol}': {}", .path.join(" -> "))]
    CircularReference { symbol: String, path: Vec<String> },

    #[error("Type mismatch for '{symbol}': expected {expected}, found {found}")]
    TypeMismatch { symbol: String, expected: String, found: String },

    #[error("Unknown static constant '{symbol}'")]
    UnknownStaticConstant { symbol: String },

    #[error("Format string in '{symbol}' expects {expected} argument(s), found {found}")]
    FormatArity { symbol: String, expected: usize, found: usize },

    #[error("No node with id '{id}' found")]
    UnknownNodeId { id: String },

    #[error("Attribute '{name}' does not exist")]
    AttributeNotFound { name: String },

    #[error("Attribute '{name}' is not settable")]
    AttributeNotSettable { name: String },

    #[error("State key '{key}' was not declared when the node was created")]
    StateKeyNotDeclared { key: String },

    #[error("State key '{key}' holds {expected} values, cannot store {found}")]
    StateKindMismatch { key: String, expected: String, found: String },

    #[error("Invalid node handle")]
    InvalidNode,

    #[error("Invalid tree operation: {message}")]
    InvalidTreeOperation { message: String },

    #[error("Duplicate source: {message}")]
    DuplicateSource { message: String },

    #[error("Malformed layout document: {message}")]
    MalformedDocument { message: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, LayoutError>;

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean {}?)", suggestions.join(", "))
    }
}

impl LayoutError {
    pub fn syntax(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Syntax {
            symbol: symbol.into(),
            message: message.into(),
        }
    }

    pub fn unknown_symbol(symbol: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self::UnknownSymbol {
            symbol: symbol.into(),
            suggestions,
        }
    }

    pub fn type_mismatch(
        symbol: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            symbol: symbol.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn tree(message: impl Into<String>) -> Self {
        Self::InvalidTreeOperation {
            message: message.into(),
        }
    }

    /// Transient errors clear themselves once a later evaluation succeeds.
    /// The rest need a structural fix (new document, different files).
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            Self::DuplicateSource { .. }
                | Self::MalformedDocument { .. }
                | Self::Io(_)
                | Self::InvalidFormat { .. }
        )
    }

    /// The symbol the error is attributed to, if any
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::Syntax { symbol, .. }
            | Self::UnknownSymbol { symbol, .. }
            | Self::SelfReference { symbol }
            | Self::CircularReference { symbol, .. }
            | Self::TypeMismatch { symbol, .. }
            | Self::UnknownStaticConstant { symbol }
            | Self::FormatArity { symbol, .. } => Some(symbol),
            Self::AttributeNotFound { name } | Self::AttributeNotSettable { name } => Some(name),
            Self::StateKeyNotDeclared { key } | Self::StateKindMismatch { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::UnknownSymbol { suggestions, .. } => suggestions,
            _ => &[],
        }
    }

    /// Re-attribute a symbol-scoped error to the attribute that was being compiled.
    pub(crate) fn within(self, attribute: &str) -> Self {
        match self {
            Self::Syntax { symbol, message } if symbol.is_empty() => Self::Syntax {
                symbol: attribute.to_string(),
                message,
            },
            Self::FormatArity {
                symbol,
                expected,
                found,
            } if symbol.is_empty() => Self::FormatArity {
                symbol: attribute.to_string(),
                expected,
                found,
            },
            other => other,
        }
    }
}
