//! Syntax tree for layout expressions

use crate::core::types::{format_number, Value};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual => 3,
            BinaryOp::Add | BinaryOp::Subtract => 4,
            BinaryOp::Multiply | BinaryOp::Divide => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Symbol(String),
    /// `N%`, bound to the symbol the percentage is taken of
    Percent {
        value: Box<Expr>,
        reference: String,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    /// Symbols this expression reads, including percent references
    pub fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Symbol(name) => {
                out.insert(name.clone());
            }
            Expr::Percent { value, reference } => {
                value.collect_symbols(out);
                out.insert(reference.clone());
            }
            Expr::Unary { operand, .. } => operand.collect_symbols(out),
            Expr::Binary { left, right, .. } => {
                left.collect_symbols(out);
                right.collect_symbols(out);
            }
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.collect_symbols(out);
                then_branch.collect_symbols(out);
                else_branch.collect_symbols(out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_symbols(out);
                }
            }
        }
    }

    /// Pre-order walk over every node of the tree
    pub fn visit(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Literal(_) | Expr::Symbol(_) => {}
            Expr::Percent { value, .. } => value.visit(f),
            Expr::Unary { operand, .. } => operand.visit(f),
            Expr::Binary { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.visit(f);
                then_branch.visit(f);
                else_branch.visit(f);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.visit(f);
                }
            }
        }
    }

    /// Rewrite every symbol through `f`, which may replace it with a subtree
    pub fn try_map_symbols<E>(
        self,
        f: &mut dyn FnMut(String) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Expr, E> {
        Ok(match self {
            Expr::Symbol(name) => f(name)?,
            Expr::Literal(v) => Expr::Literal(v),
            Expr::Percent { value, reference } => Expr::Percent {
                value: Box::new(value.try_map_symbols(f)?),
                reference,
            },
            Expr::Unary { op, operand } => Expr::Unary {
                op,
                operand: Box::new(operand.try_map_symbols(f)?),
            },
            Expr::Binary { op, left, right } => Expr::Binary {
                op,
                left: Box::new(left.try_map_symbols(f)?),
                right: Box::new(right.try_map_symbols(f)?),
            },
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => Expr::Ternary {
                condition: Box::new(condition.try_map_symbols(f)?),
                then_branch: Box::new(then_branch.try_map_symbols(f)?),
                else_branch: Box::new(else_branch.try_map_symbols(f)?),
            },
            Expr::Call { name, args } => Expr::Call {
                name,
                args: args
                    .into_iter()
                    .map(|a| a.try_map_symbols(f))
                    .collect::<std::result::Result<Vec<_>, E>>()?,
            },
        })
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Ternary { .. } => 0,
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary { .. } => 6,
            Expr::Percent { .. } => 7,
            _ => 8,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

/// Prints source that parses back to an equivalent tree
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => match value {
                Value::Nil => write!(f, "nil"),
                Value::Number(n) if *n < 0.0 => write!(f, "({})", format_number(*n)),
                Value::Number(n) => write!(f, "{}", format_number(*n)),
                Value::Bool(b) => write!(f, "{}", b),
                Value::String(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
                Value::Color(c) => write!(f, "{}", c.to_hex()),
            },
            Expr::Symbol(name) => write!(f, "{}", name),
            Expr::Percent { value, .. } => {
                value.fmt_operand(f, 8)?;
                write!(f, "%")
            }
            Expr::Unary { op, operand } => {
                match op {
                    UnaryOp::Negate => write!(f, "-")?,
                    UnaryOp::Not => write!(f, "!")?,
                }
                operand.fmt_operand(f, 6)
            }
            Expr::Binary { op, left, right } => {
                let p = op.precedence();
                left.fmt_operand(f, p)?;
                write!(f, " {} ", op.symbol())?;
                right.fmt_operand(f, p + 1)
            }
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.fmt_operand(f, 1)?;
                write!(f, " ? ")?;
                then_branch.fmt_operand(f, 1)?;
                write!(f, " : ")?;
                else_branch.fmt_operand(f, 0)
            }
            Expr::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// One segment of an interpolated string
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Literal(String),
    Expr(Expr),
}
