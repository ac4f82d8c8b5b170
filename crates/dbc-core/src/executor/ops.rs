//! Operator semantics shared by the evaluator and the constant folder

use std::rc::Rc;

use crate::parser::ast::{BinaryOp, UnaryOp};

use super::value::Value;

/// Why an operator could not produce a value
#[derive(Debug, Clone, PartialEq)]
pub enum OpError {
    /// The host would throw a TypeError with this message
    Type(String),
    /// The operator is outside the executable subset
    Unsupported(&'static str),
}

pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, OpError> {
    Ok(match op {
        UnaryOp::Not => Value::Bool(!operand.is_truthy()),
        UnaryOp::Minus => Value::Number(-operand.to_number()),
        UnaryOp::Plus => Value::Number(operand.to_number()),
        UnaryOp::BitNot => Value::Number(!to_int32(operand.to_number()) as f64),
        UnaryOp::Typeof => Value::string(operand.type_name()),
        UnaryOp::Void => Value::Undefined,
        UnaryOp::Delete => return Err(OpError::Unsupported("delete of a non-member")),
    })
}

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, OpError> {
    Ok(match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Exp => Value::Number(power(left.to_number(), right.to_number())),
        BinaryOp::Lt => Value::Bool(compare(left, right, |o| o.is_lt())),
        BinaryOp::Gt => Value::Bool(compare(left, right, |o| o.is_gt())),
        BinaryOp::LtEq => Value::Bool(compare(left, right, |o| o.is_le())),
        BinaryOp::GtEq => Value::Bool(compare(left, right, |o| o.is_ge())),
        BinaryOp::Eq => Value::Bool(loose_equals(left, right)),
        BinaryOp::NotEq => Value::Bool(!loose_equals(left, right)),
        BinaryOp::StrictEq => Value::Bool(strict_equals(left, right)),
        BinaryOp::StrictNotEq => Value::Bool(!strict_equals(left, right)),
        BinaryOp::In => Value::Bool(has_property(left, right)?),
        BinaryOp::Instanceof => return Err(OpError::Unsupported("instanceof")),
    })
}

fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    (n.trunc() as i64) as i32
}

fn power(base: f64, exponent: f64) -> f64 {
    // `1 ** NaN` is NaN in the host, 1 in Rust
    if exponent.is_nan() {
        f64::NAN
    } else {
        base.powf(exponent)
    }
}

fn concatenates(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_)
            | Value::Array(_)
            | Value::Object(_)
            | Value::Function(_)
            | Value::Builtin(_)
            | Value::Class(_)
    )
}

fn add(left: &Value, right: &Value) -> Value {
    if concatenates(left) || concatenates(right) {
        let mut out = left.to_display_string();
        out.push_str(&right.to_display_string());
        Value::String(out)
    } else {
        Value::Number(left.to_number() + right.to_number())
    }
}

fn compare(left: &Value, right: &Value, accept: fn(std::cmp::Ordering) -> bool) -> bool {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return accept(a.cmp(b));
    }
    match left.to_number().partial_cmp(&right.to_number()) {
        Some(ordering) => accept(ordering),
        None => false,
    }
}

pub fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
        (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
        (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

pub fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            left.to_number() == right.to_number()
        }
        (Value::Bool(_), _) => loose_equals(&Value::Number(left.to_number()), right),
        (_, Value::Bool(_)) => loose_equals(left, &Value::Number(right.to_number())),
        (Value::Array(_) | Value::Object(_), Value::Number(_) | Value::String(_)) => {
            loose_equals(&Value::String(left.to_display_string()), right)
        }
        (Value::Number(_) | Value::String(_), Value::Array(_) | Value::Object(_)) => {
            loose_equals(left, &Value::String(right.to_display_string()))
        }
        _ => strict_equals(left, right),
    }
}

fn has_property(key: &Value, target: &Value) -> Result<bool, OpError> {
    let key = key.to_display_string();
    match target {
        Value::Object(properties) => Ok(properties.borrow().contains_key(&key)),
        Value::Array(elements) => {
            let elements = elements.borrow();
            Ok(key == "length"
                || key
                    .parse::<usize>()
                    .map(|index| index < elements.len())
                    .unwrap_or(false))
        }
        other => Err(OpError::Type(format!(
            "Cannot use 'in' operator to search for '{}' in {}",
            key,
            other.to_display_string()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn truthy(result: Result<Value, OpError>) -> bool {
        result.unwrap().is_truthy()
    }

    #[test]
    fn test_addition_concatenates_strings() {
        let result = binary(BinaryOp::Add, &Value::string("a"), &num(1.0)).unwrap();
        assert_eq!(result.to_display_string(), "a1");
        let result = binary(BinaryOp::Add, &num(2.0), &Value::Bool(true)).unwrap();
        assert_eq!(result.to_number(), 3.0);
    }

    #[test]
    fn test_equality() {
        assert!(truthy(binary(BinaryOp::Eq, &Value::Null, &Value::Undefined)));
        assert!(!truthy(binary(BinaryOp::StrictEq, &Value::Null, &Value::Undefined)));
        assert!(truthy(binary(BinaryOp::Eq, &num(1.0), &Value::string("1"))));
        assert!(truthy(binary(BinaryOp::Eq, &Value::Bool(true), &num(1.0))));
        assert!(!truthy(binary(BinaryOp::StrictEq, &num(f64::NAN), &num(f64::NAN))));
        let obj = Value::object(BTreeMap::new());
        assert!(truthy(binary(BinaryOp::StrictEq, &obj, &obj.clone())));
        assert!(!truthy(binary(BinaryOp::StrictEq, &obj, &Value::object(BTreeMap::new()))));
    }

    #[test]
    fn test_relational() {
        assert!(truthy(binary(BinaryOp::Lt, &Value::string("a"), &Value::string("b"))));
        assert!(truthy(binary(BinaryOp::GtEq, &num(2.0), &Value::string("2"))));
        assert!(!truthy(binary(BinaryOp::Lt, &num(f64::NAN), &num(1.0))));
    }

    #[test]
    fn test_arithmetic_edge_cases() {
        assert_eq!(binary(BinaryOp::Rem, &num(-7.0), &num(3.0)).unwrap().to_number(), -1.0);
        assert!(binary(BinaryOp::Exp, &num(1.0), &num(f64::NAN)).unwrap().to_number().is_nan());
        assert_eq!(binary(BinaryOp::Div, &num(1.0), &num(0.0)).unwrap().to_number(), f64::INFINITY);
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary(UnaryOp::Typeof, &Value::Null).unwrap().to_display_string(), "object");
        assert_eq!(unary(UnaryOp::BitNot, &num(5.0)).unwrap().to_number(), -6.0);
        assert!(unary(UnaryOp::Delete, &num(1.0)).is_err());
    }

    #[test]
    fn test_in_operator() {
        let mut props = BTreeMap::new();
        props.insert("a".to_string(), num(1.0));
        let obj = Value::object(props);
        assert!(truthy(binary(BinaryOp::In, &Value::string("a"), &obj)));
        assert!(matches!(
            binary(BinaryOp::In, &Value::string("a"), &num(1.0)),
            Err(OpError::Type(_))
        ));
        assert!(matches!(
            binary(BinaryOp::Instanceof, &obj, &obj),
            Err(OpError::Unsupported("instanceof"))
        ));
    }
}
