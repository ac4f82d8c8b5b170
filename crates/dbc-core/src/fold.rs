//! Constant evaluation of expressions
//!
//! Answers "does this expression have the same value on every run?".
//! Only closed expressions fold: literals, the unbound globals
//! `undefined`/`NaN`/`Infinity`, and operators applied to foldable
//! operands. Anything that reads a binding, calls, accesses a member or
//! has an effect is inconclusive.

use std::collections::BTreeMap;

use crate::executor::ops;
use crate::executor::Value;
use crate::parser::ast::*;
use crate::scope::ScopeChain;

/// Outcome of constant evaluation
#[derive(Debug, Clone)]
pub enum Evaluation {
    /// The expression always produces this value
    Confident(Value),
    /// The value depends on something only known at run time
    Inconclusive,
}

impl Evaluation {
    pub fn is_confident(&self) -> bool {
        matches!(self, Evaluation::Confident(_))
    }

    /// True when the expression certainly evaluates falsy
    pub fn is_always_falsy(&self) -> bool {
        matches!(self, Evaluation::Confident(value) if !value.is_truthy())
    }
}

pub fn evaluate(expr: &Expr, scope: &ScopeChain) -> Evaluation {
    match fold(expr, scope) {
        Some(value) => Evaluation::Confident(value),
        None => Evaluation::Inconclusive,
    }
}

fn fold(expr: &Expr, scope: &ScopeChain) -> Option<Value> {
    match expr {
        Expr::Number { value, .. } => Some(Value::Number(*value)),
        Expr::Str { value, .. } => Some(Value::String(value.clone())),
        Expr::Bool(b) => Some(Value::Bool(*b)),
        Expr::Null => Some(Value::Null),
        Expr::Ident(name) if !scope.has_binding(name) => match name.as_str() {
            "undefined" => Some(Value::Undefined),
            "NaN" => Some(Value::Number(f64::NAN)),
            "Infinity" => Some(Value::Number(f64::INFINITY)),
            _ => None,
        },
        Expr::Array(elements) => {
            let values = elements
                .iter()
                .map(|element| fold(element, scope))
                .collect::<Option<Vec<_>>>()?;
            Some(Value::array(values))
        }
        Expr::Object(properties) => {
            let mut map = BTreeMap::new();
            for property in properties {
                map.insert(property.key.clone(), fold(&property.value, scope)?);
            }
            Some(Value::object(map))
        }
        Expr::Unary { op, argument } => {
            if *op == UnaryOp::Typeof {
                if let Expr::Function(_) = argument.as_ref() {
                    return Some(Value::string("function"));
                }
            }
            let operand = fold(argument, scope)?;
            ops::unary(*op, &operand).ok()
        }
        Expr::Binary { op, left, right } => {
            let left = fold(left, scope)?;
            let right = fold(right, scope)?;
            ops::binary(*op, &left, &right).ok()
        }
        Expr::Logical { op, left, right } => {
            let left = fold(left, scope)?;
            let short_circuit = match op {
                LogicalOp::And => !left.is_truthy(),
                LogicalOp::Or => left.is_truthy(),
                LogicalOp::Nullish => !left.is_nullish(),
            };
            if short_circuit {
                Some(left)
            } else {
                fold(right, scope)
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if fold(test, scope)?.is_truthy() {
                fold(consequent, scope)
            } else {
                fold(alternate, scope)
            }
        }
        Expr::Sequence(parts) => {
            let mut last = None;
            for part in parts {
                last = Some(fold(part, scope)?);
            }
            last
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, parse_expression};

    fn eval(source: &str) -> Evaluation {
        evaluate(&parse_expression(source).unwrap(), &ScopeChain::default())
    }

    #[test]
    fn test_literal_contradictions_fold_falsy() {
        assert!(eval("1 === 2").is_always_falsy());
        assert!(eval("false").is_always_falsy());
        assert!(eval("'' || 0").is_always_falsy());
        assert!(eval("typeof 1 === 'string'").is_always_falsy());
        assert!(eval("undefined").is_always_falsy());
        assert!(eval("NaN").is_always_falsy());
    }

    #[test]
    fn test_tautologies_are_confident_truthy() {
        let result = eval("1 + 1 === 2");
        assert!(result.is_confident());
        assert!(!result.is_always_falsy());
        assert!(!eval("[]").is_always_falsy());
        assert!(eval("({ a: 1 })").is_confident());
    }

    #[test]
    fn test_runtime_dependencies_are_inconclusive() {
        assert!(!eval("input > 0").is_confident());
        assert!(!eval("f()").is_confident());
        assert!(!eval("a.b").is_confident());
        assert!(!eval("x = 1").is_confident());
    }

    #[test]
    fn test_short_circuit_ignores_unfoldable_right_side() {
        assert!(eval("false && input").is_always_falsy());
        assert!(!eval("true && input").is_confident());
        assert!(eval("true ? 0 : input").is_always_falsy());
    }

    #[test]
    fn test_shadowed_globals_are_inconclusive() {
        let program = parse("let undefined = 5;").unwrap();
        let scope = ScopeChain::root(&program);
        let expr = parse_expression("undefined").unwrap();
        assert!(!evaluate(&expr, &scope).is_confident());
    }

    #[test]
    fn test_operator_errors_are_inconclusive() {
        assert!(!eval("'a' in 1").is_confident());
    }
}
