// FILE: src/compiler/mod.rs

//! Expression compiler: turns an attribute's source string into an
//! [`Expression`] with a known symbol set.
//!
//! The pipeline is lex -> parse (or split into interpolation parts) ->
//! symbol rewriting (keywords, static constants, colors, macro inlining) ->
//! compile-time checks -> constant folding.

pub mod ast;
pub mod functions;
pub mod lexer;
pub mod parser;

use crate::compiler::ast::{BinaryOp, Expr, Part, UnaryOp};
use crate::compiler::functions::Functions;
use crate::core::constants::{named_color, StaticConstants};
use crate::core::types::{AttributeCategory, Value, ValueKind};
use crate::error::{LayoutError, Result};
use std::collections::BTreeSet;
use std::fmt;

/// What the compiler needs to know about the node an expression is compiled for
pub trait CompileScope {
    /// Source of the macro `name` visible from the node, skipping the
    /// `skip` nearest definitions
    fn macro_source(&self, name: &str, skip: usize) -> Option<String>;

    /// Whether `name` resolves to something other than a macro
    fn has_plain_symbol(&self, name: &str) -> bool;

    /// Entry of the string table, for `strings.key`
    fn string_literal(&self, key: &str) -> Option<String>;

    fn statics(&self) -> &StaticConstants;

    fn functions(&self) -> &Functions;
}

#[derive(Debug, Clone, PartialEq)]
enum Body {
    Fixed(Value),
    Single(Expr),
    Parts(Vec<Part>),
}

/// A compiled attribute expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    attribute: String,
    source: String,
    kind: ValueKind,
    category: AttributeCategory,
    body: Body,
    symbols: BTreeSet<String>,
}

impl Expression {
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn category(&self) -> AttributeCategory {
        self.category
    }

    /// Symbols read by the expression, after macro inlining
    pub fn symbols(&self) -> &BTreeSet<String> {
        &self.symbols
    }

    /// The value computed at compile time when the expression reads no symbols
    pub fn fixed_value(&self) -> Option<&Value> {
        match &self.body {
            Body::Fixed(value) => Some(value),
            _ => None,
        }
    }

    /// Evaluate, reading symbols through `lookup`. The result is not yet cast to `kind`.
    pub fn evaluate(
        &self,
        functions: &Functions,
        lookup: &mut dyn FnMut(&str) -> Result<Value>,
    ) -> Result<Value> {
        let mut evaluator = Evaluator {
            attribute: &self.attribute,
            functions,
            lookup,
        };
        match &self.body {
            Body::Fixed(value) => Ok(value.clone()),
            Body::Single(expr) => evaluator.eval(expr),
            Body::Parts(parts) => evaluator.eval_parts(parts),
        }
    }
}

/// Normalized source that compiles back to the same symbols and constancy
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.category == AttributeCategory::Text;
        match &self.body {
            Body::Fixed(Value::String(s)) if text => write!(f, "{}", escape_braces(s)),
            Body::Fixed(value) if text => write!(f, "{{{}}}", Expr::Literal(value.clone())),
            Body::Fixed(value) => write!(f, "{}", Expr::Literal(value.clone())),
            Body::Single(expr) if text => write!(f, "{{{}}}", expr),
            Body::Single(expr) => write!(f, "{}", expr),
            Body::Parts(parts) => {
                for part in parts {
                    match part {
                        Part::Literal(s) => write!(f, "{}", escape_braces(s))?,
                        Part::Expr(expr) => write!(f, "{{{}}}", expr)?,
                    }
                }
                Ok(())
            }
        }
    }
}

fn escape_braces(s: &str) -> String {
    s.replace('{', "{{").replace('}', "}}")
}

/// Compile `source` for `attribute`.
///
/// Returns `Ok(None)` when the source is empty and the attribute has no effect.
/// With `inline_macros` off, macro names are left as plain symbols; derived
/// geometry expressions are compiled that way.
pub fn compile(
    source: &str,
    attribute: &str,
    kind: ValueKind,
    category: AttributeCategory,
    scope: &dyn CompileScope,
    inline_macros: bool,
) -> Result<Option<Expression>> {
    if source.trim().is_empty() {
        return Ok(None);
    }

    compile_body(source, attribute, kind, category, scope, inline_macros)
        .map(Some)
        .map_err(|e| e.within(attribute))
}

fn compile_body(
    source: &str,
    attribute: &str,
    kind: ValueKind,
    category: AttributeCategory,
    scope: &dyn CompileScope,
    inline_macros: bool,
) -> Result<Expression> {
    let percent = category.percent_reference();

    // STAGE 1: PARSING
    let body = if category == AttributeCategory::Text {
        parts_body(parser::parse_interpolated(source, percent)?)
    } else if source.contains('{') {
        let mut parts = parser::parse_interpolated(source, percent)?;
        match (parts.len(), parts.pop()) {
            (1, Some(Part::Expr(expr))) => Body::Single(expr),
            _ => {
                return Err(LayoutError::syntax(
                    attribute,
                    format!("Expected a single {{expression}} for a {} attribute", kind),
                ))
            }
        }
    } else {
        Body::Single(parser::parse_expression(source, percent)?)
    };

    // STAGE 2: SYMBOL REWRITING
    let mut rewriter = Rewriter {
        scope,
        category,
        inline_macros,
        inlining: Vec::new(),
    };
    let body = match body {
        Body::Single(expr) => Body::Single(rewriter.rewrite(expr)?),
        Body::Parts(parts) => Body::Parts(
            parts
                .into_iter()
                .map(|part| match part {
                    Part::Expr(expr) => rewriter.rewrite(expr).map(Part::Expr),
                    literal => Ok(literal),
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        fixed => fixed,
    };

    // STAGE 3: CHECKS
    let mut symbols = BTreeSet::new();
    for expr in body_exprs(&body) {
        check_calls(expr, attribute, scope)?;
        expr.collect_symbols(&mut symbols);
    }

    let mut expression = Expression {
        attribute: attribute.to_string(),
        source: source.to_string(),
        kind,
        category,
        body,
        symbols,
    };

    // STAGE 4: CONSTANT FOLDING
    if expression.symbols.is_empty() && expression.fixed_value().is_none() {
        let value = expression.evaluate(scope.functions(), &mut |name| {
            Err(LayoutError::unknown_symbol(name, Vec::new()))
        })?;
        log::trace!("Folded '{}' = {:?}", attribute, value);
        expression.body = Body::Fixed(value);
    }

    Ok(expression)
}

fn parts_body(parts: Vec<Part>) -> Body {
    if parts.iter().all(|p| matches!(p, Part::Literal(_))) {
        let text: String = parts
            .into_iter()
            .filter_map(|p| match p {
                Part::Literal(s) => Some(s),
                Part::Expr(_) => None,
            })
            .collect();
        Body::Fixed(Value::String(text))
    } else {
        Body::Parts(parts)
    }
}

fn body_exprs(body: &Body) -> Vec<&Expr> {
    match body {
        Body::Fixed(_) => Vec::new(),
        Body::Single(expr) => vec![expr],
        Body::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                Part::Expr(expr) => Some(expr),
                Part::Literal(_) => None,
            })
            .collect(),
    }
}

/// Unknown functions and `format` placeholder counts are caught before evaluation
fn check_calls(expr: &Expr, attribute: &str, scope: &dyn CompileScope) -> Result<()> {
    let mut error = None;
    expr.visit(&mut |node| {
        if error.is_some() {
            return;
        }
        let Expr::Call { name, args } = node else {
            return;
        };
        if !scope.functions().is_known(name) {
            error = Some(LayoutError::syntax(
                attribute,
                format!("Unknown function '{}'", name),
            ));
            return;
        }
        if name != "format" {
            return;
        }
        let format = match args.first() {
            Some(Expr::Literal(Value::String(s))) => Some(s.clone()),
            Some(Expr::Symbol(sym)) => sym
                .strip_prefix("strings.")
                .and_then(|key| scope.string_literal(key)),
            _ => None,
        };
        if let Some(format) = format {
            let expected = scope.functions().format_arity(&format);
            let found = args.len() - 1;
            if expected != found {
                error = Some(LayoutError::FormatArity {
                    symbol: attribute.to_string(),
                    expected,
                    found,
                });
            }
        }
    });
    error.map_or(Ok(()), Err)
}

struct Rewriter<'a> {
    scope: &'a dyn CompileScope,
    category: AttributeCategory,
    inline_macros: bool,
    /// Macros currently being inlined, with how many nearer definitions were skipped
    inlining: Vec<(String, usize)>,
}

impl<'a> Rewriter<'a> {
    fn rewrite(&mut self, expr: Expr) -> Result<Expr> {
        expr.try_map_symbols(&mut |name| self.rewrite_symbol(name))
    }

    fn rewrite_symbol(&mut self, name: String) -> Result<Expr> {
        match name.as_str() {
            "auto" => {
                return Ok(match self.category.auto_reference() {
                    Some(reference) => Expr::Symbol(reference),
                    None => Expr::Literal(Value::Nil),
                })
            }
            "pi" => return Ok(Expr::Literal(Value::Number(std::f64::consts::PI))),
            _ => {}
        }

        let statics = self.scope.statics();
        if let Some((namespace, member)) = statics.split(&name) {
            return statics
                .lookup(namespace, member)
                .cloned()
                .map(Expr::Literal)
                .ok_or_else(|| LayoutError::UnknownStaticConstant {
                    symbol: name.clone(),
                });
        }

        if self.inline_macros {
            if let Some(expr) = self.inline_macro(&name)? {
                return Ok(expr);
            }
        }

        if self.category == AttributeCategory::Color && !self.scope.has_plain_symbol(&name) {
            if let Some(color) = named_color(&name) {
                return Ok(Expr::Literal(Value::Color(color)));
            }
        }

        Ok(Expr::Symbol(name))
    }

    /// Inline the macro `name`, or `None` when no macro of that name is visible.
    ///
    /// Inside the body of macro `x`, a reference to `x` means the next outer
    /// definition of `x`, then a plain symbol `x`.
    fn inline_macro(&mut self, name: &str) -> Result<Option<Expr>> {
        let shadowing = matches!(self.inlining.last(), Some((top, _)) if top == name);
        let skip = match self.inlining.last() {
            Some((top, skip)) if top == name => skip + 1,
            _ => 0,
        };

        let Some(source) = self.scope.macro_source(name, skip) else {
            if shadowing && !self.scope.has_plain_symbol(name) {
                return Err(LayoutError::SelfReference {
                    symbol: name.to_string(),
                });
            }
            return Ok(None);
        };

        if self
            .inlining
            .iter()
            .any(|(active, level)| active == name && *level == skip)
        {
            let mut path: Vec<String> = self.inlining.iter().map(|(n, _)| n.clone()).collect();
            path.push(name.to_string());
            return Err(LayoutError::CircularReference {
                symbol: name.to_string(),
                path,
            });
        }

        log::trace!("Inlining macro '{}' (level {})", name, skip);
        let expr = parser::parse_expression(&source, self.category.percent_reference())
            .map_err(|e| e.within(name))?;

        self.inlining.push((name.to_string(), skip));
        let inlined = self.rewrite(expr);
        self.inlining.pop();
        inlined.map(Some)
    }
}

struct Evaluator<'a, 'b> {
    attribute: &'a str,
    functions: &'a Functions,
    lookup: &'b mut dyn FnMut(&str) -> Result<Value>,
}

impl<'a, 'b> Evaluator<'a, 'b> {
    fn eval_parts(&mut self, parts: &[Part]) -> Result<Value> {
        // A lone substitution keeps its type
        if let [Part::Expr(expr)] = parts {
            return self.eval(expr);
        }
        let mut out = String::new();
        for part in parts {
            match part {
                Part::Literal(s) => out.push_str(s),
                Part::Expr(expr) => out.push_str(&self.eval(expr)?.to_string()),
            }
        }
        Ok(Value::String(out))
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Symbol(name) => (self.lookup)(name),
            Expr::Percent { value, reference } => {
                let percent = self.number(value)?;
                let base = (self.lookup)(reference)?;
                let base = self.as_number(&base)?;
                Ok(Value::Number(percent / 100.0 * base))
            }
            Expr::Unary { op, operand } => match op {
                UnaryOp::Negate => Ok(Value::Number(-self.number(operand)?)),
                UnaryOp::Not => Ok(Value::Bool(!self.eval(operand)?.is_truthy())),
            },
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right),
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            Expr::Call { name, args } => {
                let values = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>>>()?;
                self.functions.call(name, &values).map_err(|e| e.within(self.attribute))
            }
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value> {
        match op {
            BinaryOp::And => {
                let l = self.eval(left)?;
                Ok(Value::Bool(l.is_truthy() && self.eval(right)?.is_truthy()))
            }
            BinaryOp::Or => {
                let l = self.eval(left)?;
                Ok(Value::Bool(l.is_truthy() || self.eval(right)?.is_truthy()))
            }
            _ => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                self.apply(op, l, r)
            }
        }
    }

    fn apply(&self, op: BinaryOp, l: Value, r: Value) -> Result<Value> {
        let value = match op {
            BinaryOp::Add => match (&l, &r) {
                (Value::String(_), _) | (_, Value::String(_)) => {
                    Value::String(format!("{}{}", l, r))
                }
                _ => Value::Number(self.as_number(&l)? + self.as_number(&r)?),
            },
            BinaryOp::Subtract => Value::Number(self.as_number(&l)? - self.as_number(&r)?),
            BinaryOp::Multiply => Value::Number(self.as_number(&l)? * self.as_number(&r)?),
            BinaryOp::Divide => Value::Number(self.as_number(&l)? / self.as_number(&r)?),
            BinaryOp::Equal => Value::Bool(values_equal(&l, &r)),
            BinaryOp::NotEqual => Value::Bool(!values_equal(&l, &r)),
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
                let ordering = match (&l, &r) {
                    (Value::String(a), Value::String(b)) => a.partial_cmp(b),
                    _ => self.as_number(&l)?.partial_cmp(&self.as_number(&r)?),
                };
                let Some(ordering) = ordering else {
                    return Ok(Value::Bool(false));
                };
                Value::Bool(match op {
                    BinaryOp::Less => ordering.is_lt(),
                    BinaryOp::LessEqual => ordering.is_le(),
                    BinaryOp::Greater => ordering.is_gt(),
                    _ => ordering.is_ge(),
                })
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit operators"),
        };
        Ok(value)
    }

    fn number(&mut self, expr: &Expr) -> Result<f64> {
        let value = self.eval(expr)?;
        self.as_number(&value)
    }

    fn as_number(&self, value: &Value) -> Result<f64> {
        match value {
            Value::String(_) | Value::Color(_) => Err(LayoutError::type_mismatch(
                self.attribute,
                "number",
                value.kind_name(),
            )),
            other => Ok(other.as_number().unwrap_or(0.0)),
        }
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(_) | Value::Bool(_) | Value::Nil, Value::Number(_) | Value::Bool(_) | Value::Nil)
            if !l.same_kind(r) =>
        {
            l.as_number() == r.as_number()
        }
        _ => l == r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Axis, Color};
    use std::collections::HashMap;

    #[derive(Default)]
    struct TestScope {
        macros: HashMap<String, Vec<String>>,
        plain: Vec<String>,
        strings: HashMap<String, String>,
        statics: StaticConstants,
        functions: Functions,
    }

    impl TestScope {
        fn with_macro(mut self, name: &str, source: &str) -> Self {
            self.macros
                .entry(name.to_string())
                .or_default()
                .push(source.to_string());
            self
        }
    }

    impl CompileScope for TestScope {
        fn macro_source(&self, name: &str, skip: usize) -> Option<String> {
            self.macros.get(name).and_then(|defs| defs.get(skip)).cloned()
        }

        fn has_plain_symbol(&self, name: &str) -> bool {
            self.plain.iter().any(|p| p == name)
        }

        fn string_literal(&self, key: &str) -> Option<String> {
            self.strings.get(key).cloned()
        }

        fn statics(&self) -> &StaticConstants {
            &self.statics
        }

        fn functions(&self) -> &Functions {
            &self.functions
        }
    }

    fn width(source: &str, scope: &TestScope) -> Result<Option<Expression>> {
        compile(
            source,
            "width",
            ValueKind::Number,
            AttributeCategory::Size(Axis::Horizontal),
            scope,
            true,
        )
    }

    fn eval_with(expression: &Expression, vars: &[(&str, Value)]) -> Result<Value> {
        let functions = Functions::new();
        expression.evaluate(&functions, &mut |name| {
            vars.iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| LayoutError::unknown_symbol(name, Vec::new()))
        })
    }

    #[test]
    fn test_empty_source_has_no_effect() {
        let scope = TestScope::default();
        assert!(width("   ", &scope).unwrap().is_none());
    }

    #[test]
    fn test_percent_refers_to_container() {
        let scope = TestScope::default();
        let expr = width("50% - 10", &scope).unwrap().unwrap();
        assert_eq!(
            expr.symbols().iter().collect::<Vec<_>>(),
            vec!["containerSize.width"]
        );
        for container in [0.0, 100.0, 333.0] {
            let value = eval_with(&expr, &[("containerSize.width", Value::Number(container))]);
            assert_eq!(value.unwrap(), Value::Number(container / 2.0 - 10.0));
        }

        let err = compile(
            "50%",
            "alpha",
            ValueKind::Number,
            AttributeCategory::Generic,
            &scope,
            true,
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::Syntax { ref symbol, .. } if symbol == "alpha"));
    }

    #[test]
    fn test_constant_expressions_fold() {
        let scope = TestScope::default();
        let expr = width("max(10, 20) * 2", &scope).unwrap().unwrap();
        assert!(expr.symbols().is_empty());
        assert_eq!(expr.fixed_value(), Some(&Value::Number(40.0)));

        let auto = width("auto", &scope).unwrap().unwrap();
        assert!(auto.symbols().contains("inferredSize.width"));
    }

    #[test]
    fn test_interpolation_preserves_single_part_type() {
        let scope = TestScope::default();
        let text = compile(
            "{count}",
            "text",
            ValueKind::String,
            AttributeCategory::Text,
            &scope,
            true,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            eval_with(&text, &[("count", Value::Number(3.0))]).unwrap(),
            Value::Number(3.0)
        );

        let mixed = compile(
            "{count} items",
            "text",
            ValueKind::String,
            AttributeCategory::Text,
            &scope,
            true,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            eval_with(&mixed, &[("count", Value::Number(3.0))]).unwrap(),
            Value::from("3 items")
        );

        let err = width("{a} {b}", &scope).unwrap_err();
        assert!(matches!(err, LayoutError::Syntax { .. }));
    }

    #[test]
    fn test_macro_inlining_and_shadowing() {
        // Nearest definition first
        let scope = TestScope::default()
            .with_macro("gap", "gap * 2")
            .with_macro("gap", "8");
        let expr = width("gap + 1", &scope).unwrap().unwrap();
        assert_eq!(expr.fixed_value(), Some(&Value::Number(17.0)));

        let scope = TestScope::default().with_macro("gap", "gap + 1");
        let err = width("gap", &scope).unwrap_err();
        assert!(matches!(err, LayoutError::SelfReference { ref symbol } if symbol == "gap"));

        let mut scope = TestScope::default().with_macro("gap", "gap + 1");
        scope.plain.push("gap".into());
        let expr = width("gap", &scope).unwrap().unwrap();
        assert!(expr.symbols().contains("gap"));

        let scope = TestScope::default()
            .with_macro("a", "b + 1")
            .with_macro("b", "a + 1");
        let err = width("a", &scope).unwrap_err();
        match err {
            LayoutError::CircularReference { path, .. } => {
                assert_eq!(path, vec!["a".to_string(), "b".to_string(), "a".to_string()]);
            }
            other => panic!("Expected circular reference, got {:?}", other),
        }
    }

    #[test]
    fn test_static_constants_and_colors() {
        let scope = TestScope::default();
        let expr = compile(
            "Alignment.center",
            "textAlignment",
            ValueKind::Number,
            AttributeCategory::Generic,
            &scope,
            true,
        )
        .unwrap()
        .unwrap();
        assert_eq!(expr.fixed_value(), Some(&Value::Number(1.0)));

        let err = width("Alignment.middle", &scope).unwrap_err();
        assert!(matches!(err, LayoutError::UnknownStaticConstant { .. }));

        let color = compile(
            "red",
            "backgroundColor",
            ValueKind::Color,
            AttributeCategory::Color,
            &scope,
            true,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            color.fixed_value(),
            Some(&Value::Color(Color::rgba(1.0, 0.0, 0.0, 1.0)))
        );
    }

    #[test]
    fn test_format_arity_checked_at_compile_time() {
        let mut scope = TestScope::default();
        scope.strings.insert("greeting".into(), "Hello %@, you have %d".into());

        let err = compile(
            "{format(strings.greeting, name)}",
            "text",
            ValueKind::String,
            AttributeCategory::Text,
            &scope,
            true,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LayoutError::FormatArity { ref symbol, expected: 2, found: 1 } if symbol == "text"
        ));

        let err = width("frobnicate(1)", &scope).unwrap_err();
        assert!(err.to_string().contains("Unknown function 'frobnicate'"));
    }

    #[test]
    fn test_round_trip_preserves_symbols_and_constancy() {
        let scope = TestScope::default().with_macro("gap", "4");
        let sources = [
            ("width", "100% - (gap + left) * 2"),
            ("width", "a > 1 ? -b : c"),
            ("width", "auto"),
            ("width", "10"),
        ];
        for (attribute, source) in sources {
            let first = width(source, &scope).unwrap().unwrap();
            let second = width(&first.to_string(), &scope).unwrap().unwrap();
            assert_eq!(first.symbols(), second.symbols(), "{} ({})", source, attribute);
            assert_eq!(first.fixed_value().is_some(), second.fixed_value().is_some());
        }

        let text = compile(
            "Hi {name}, {{braces}}",
            "text",
            ValueKind::String,
            AttributeCategory::Text,
            &scope,
            true,
        )
        .unwrap()
        .unwrap();
        assert_eq!(text.to_string(), "Hi {name}, {{braces}}");
    }

    #[test]
    fn test_string_concatenation_and_type_errors() {
        let scope = TestScope::default();
        let expr = compile(
            "title + ': ' + count",
            "accessibilityLabel",
            ValueKind::Any,
            AttributeCategory::Generic,
            &scope,
            true,
        )
        .unwrap()
        .unwrap();
        let value = eval_with(
            &expr,
            &[("title", Value::from("Items")), ("count", Value::Number(2.0))],
        );
        assert_eq!(value.unwrap(), Value::from("Items: 2"));

        let expr = width("title * 2", &scope).unwrap().unwrap();
        let err = eval_with(&expr, &[("title", Value::from("x"))]).unwrap_err();
        assert!(matches!(err, LayoutError::TypeMismatch { .. }));
    }
}
