//! Built-in functions callable from expressions
//!
//! Numeric functions (`min`, `max`, `abs`, `round`, `sqrt`, `sin`, ...) are
//! dispatched through meval's built-in context; the rest are handled here.

use crate::core::types::{format_number, Color, Value};
use crate::error::{LayoutError, Result};
use meval::{Context, ContextProvider, FuncEvalError};
use regex::{Captures, Regex};

const LOCAL_FUNCTIONS: &[&str] = &[
    "mod", "pow", "clamp", "rgb", "rgba", "format", "uppercase", "lowercase", "trim", "length",
];

pub struct Functions {
    numeric: Context<'static>,
    placeholder: Regex,
}

impl Functions {
    pub fn new() -> Self {
        Self {
            numeric: Context::new(),
            placeholder: Regex::new(r"%(?:\.(\d+))?([@difs%])").expect("valid placeholder pattern"),
        }
    }

    pub fn is_known(&self, name: &str) -> bool {
        if LOCAL_FUNCTIONS.contains(&name) {
            return true;
        }
        !matches!(
            self.numeric.eval_func(name, &[]),
            Err(FuncEvalError::UnknownFunction)
        )
    }

    /// Names of every function, for suggestions
    pub fn names(&self) -> Vec<String> {
        let numeric = [
            "abs", "acos", "asin", "atan", "atan2", "ceil", "cos", "exp", "floor", "ln", "max",
            "min", "round", "signum", "sin", "sqrt", "tan",
        ];
        numeric
            .iter()
            .chain(LOCAL_FUNCTIONS.iter())
            .map(|s| s.to_string())
            .collect()
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "mod" => {
                let [a, b] = numbers::<2>(name, args)?;
                Ok(Value::Number(if b == 0.0 { 0.0 } else { a % b }))
            }
            "pow" => {
                let [a, b] = numbers::<2>(name, args)?;
                Ok(Value::Number(a.powf(b)))
            }
            "clamp" => {
                let [x, lo, hi] = numbers::<3>(name, args)?;
                Ok(Value::Number(x.max(lo).min(hi)))
            }
            "rgb" => {
                let [r, g, b] = numbers::<3>(name, args)?;
                Ok(Value::Color(Color::rgba(r / 255.0, g / 255.0, b / 255.0, 1.0)))
            }
            "rgba" => {
                let [r, g, b, a] = numbers::<4>(name, args)?;
                Ok(Value::Color(Color::rgba(r / 255.0, g / 255.0, b / 255.0, a)))
            }
            "format" => self.format(args),
            "uppercase" => Ok(Value::String(single(name, args)?.to_string().to_uppercase())),
            "lowercase" => Ok(Value::String(single(name, args)?.to_string().to_lowercase())),
            "trim" => Ok(Value::String(single(name, args)?.to_string().trim().to_string())),
            "length" => Ok(Value::Number(
                single(name, args)?.to_string().chars().count() as f64,
            )),
            _ => self.call_numeric(name, args),
        }
    }

    fn call_numeric(&self, name: &str, args: &[Value]) -> Result<Value> {
        let numbers = args
            .iter()
            .map(|v| {
                v.as_number()
                    .ok_or_else(|| LayoutError::type_mismatch(name, "number", v.kind_name()))
            })
            .collect::<Result<Vec<f64>>>()?;

        self.numeric
            .eval_func(name, &numbers)
            .map(Value::Number)
            .map_err(|e| {
                let message = match e {
                    FuncEvalError::UnknownFunction => format!("Unknown function '{}'", name),
                    FuncEvalError::TooFewArguments => {
                        format!("Too few arguments for '{}'", name)
                    }
                    FuncEvalError::TooManyArguments => {
                        format!("Too many arguments for '{}'", name)
                    }
                    FuncEvalError::NumberArgs(n) => {
                        format!("'{}' expects {} argument(s), found {}", name, n, numbers.len())
                    }
                };
                LayoutError::syntax("", message)
            })
    }

    /// Number of arguments a format string consumes
    pub fn format_arity(&self, format: &str) -> usize {
        self.placeholder
            .captures_iter(format)
            .filter(|c| &c[2] != "%")
            .count()
    }

    fn format(&self, args: &[Value]) -> Result<Value> {
        let (format, rest) = args
            .split_first()
            .ok_or_else(|| LayoutError::syntax("", "'format' expects a format string"))?;
        let format = format.to_string();

        let expected = self.format_arity(&format);
        if expected != rest.len() {
            return Err(LayoutError::FormatArity {
                symbol: String::new(),
                expected,
                found: rest.len(),
            });
        }

        let mut next = rest.iter();
        let output = self.placeholder.replace_all(&format, |caps: &Captures| {
            let conversion = &caps[2];
            if conversion == "%" {
                return "%".to_string();
            }
            let value = next.next().cloned().unwrap_or(Value::Nil);
            let precision = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok());
            match conversion {
                "d" | "i" => format_number(value.as_number().unwrap_or(0.0).trunc()),
                "f" => format!("{:.*}", precision.unwrap_or(6), value.as_number().unwrap_or(0.0)),
                _ => value.to_string(),
            }
        });

        Ok(Value::String(output.into_owned()))
    }
}

impl Default for Functions {
    fn default() -> Self {
        Self::new()
    }
}

fn numbers<const N: usize>(name: &str, args: &[Value]) -> Result<[f64; N]> {
    if args.len() != N {
        return Err(LayoutError::syntax(
            "",
            format!("'{}' expects {} argument(s), found {}", name, N, args.len()),
        ));
    }
    let mut out = [0.0; N];
    for (slot, value) in out.iter_mut().zip(args) {
        *slot = value
            .as_number()
            .ok_or_else(|| LayoutError::type_mismatch(name, "number", value.kind_name()))?;
    }
    Ok(out)
}

fn single<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value> {
    match args {
        [value] => Ok(value),
        _ => Err(LayoutError::syntax(
            "",
            format!("'{}' expects 1 argument, found {}", name, args.len()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_functions_go_through_meval() {
        let functions = Functions::new();
        assert_eq!(
            functions.call("max", &[Value::Number(3.0), Value::Number(7.0)]).unwrap(),
            Value::Number(7.0)
        );
        assert_eq!(
            functions.call("floor", &[Value::Number(2.7)]).unwrap(),
            Value::Number(2.0)
        );
        assert!(functions.is_known("sqrt"));
        assert!(!functions.is_known("frobnicate"));
        assert!(functions.call("frobnicate", &[]).is_err());
    }

    #[test]
    fn test_mod_and_colors() {
        let functions = Functions::new();
        assert_eq!(
            functions.call("mod", &[Value::Number(7.0), Value::Number(3.0)]).unwrap(),
            Value::Number(1.0)
        );
        assert_eq!(
            functions
                .call("rgb", &[Value::Number(255.0), Value::Number(0.0), Value::Number(0.0)])
                .unwrap(),
            Value::Color(Color::rgba(1.0, 0.0, 0.0, 1.0))
        );
        assert!(functions.call("pow", &[Value::Number(2.0)]).is_err());
    }

    #[test]
    fn test_format_placeholders() {
        let functions = Functions::new();
        assert_eq!(functions.format_arity("%@ of %d (100%%)"), 2);

        let result = functions
            .call(
                "format",
                &[
                    Value::from("%@: %.2f (%d%%)"),
                    Value::from("Total"),
                    Value::Number(3.14159),
                    Value::Number(42.9),
                ],
            )
            .unwrap();
        assert_eq!(result, Value::from("Total: 3.14 (42%)"));

        let err = functions
            .call("format", &[Value::from("%@ and %@"), Value::from("one")])
            .unwrap_err();
        assert!(matches!(err, LayoutError::FormatArity { expected: 2, found: 1, .. }));
    }
}
