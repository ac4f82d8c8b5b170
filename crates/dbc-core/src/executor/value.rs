//! Runtime values of the reference evaluator

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::parser::ast::{Class, Function};
use crate::printer::format_number;

use super::scope::Env;

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
/// BTreeMap for deterministic property order
pub type ObjectRef = Rc<RefCell<BTreeMap<String, Value>>>;

/// A runtime value; arrays, objects and functions are shared references
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Rc<Closure>),
    Builtin(Rc<Builtin>),
    Class(Rc<ClassValue>),
}

/// A user function together with the scope it closes over
pub struct Closure {
    pub func: Rc<Function>,
    pub env: Env,
}

/// A class declaration evaluated in its defining scope
pub struct ClassValue {
    pub class: Rc<Class>,
    pub env: Env,
    /// `static` methods, readable and writable as properties of the class
    pub statics: ObjectRef,
}

impl ClassValue {
    pub fn name(&self) -> &str {
        self.class.id.as_deref().unwrap_or("anonymous")
    }
}

/// Host-provided functions, including methods bound to their receiver
pub enum Builtin {
    Error,
    MathAbs,
    MathMax,
    MathMin,
    MathFloor,
    ArrayMethod(ArrayMethod, ArrayRef),
    StringMethod(StringMethod, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayMethod {
    Push,
    Includes,
    IndexOf,
    Join,
}

impl ArrayMethod {
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "push" => Some(ArrayMethod::Push),
            "includes" => Some(ArrayMethod::Includes),
            "indexOf" => Some(ArrayMethod::IndexOf),
            "join" => Some(ArrayMethod::Join),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMethod {
    Includes,
    IndexOf,
    ToUpperCase,
    ToLowerCase,
    Trim,
}

impl StringMethod {
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "includes" => Some(StringMethod::Includes),
            "indexOf" => Some(StringMethod::IndexOf),
            "toUpperCase" => Some(StringMethod::ToUpperCase),
            "toLowerCase" => Some(StringMethod::ToLowerCase),
            "trim" => Some(StringMethod::Trim),
            _ => None,
        }
    }
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    pub fn object(properties: BTreeMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(properties)))
    }

    /// Host truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_)
            | Value::Object(_)
            | Value::Function(_)
            | Value::Builtin(_)
            | Value::Class(_) => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Builtin(_) | Value::Class(_))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// The `typeof` result
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Function(_) | Value::Builtin(_) | Value::Class(_) => "function",
        }
    }

    /// Numeric coercion
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Array(_) => string_to_number(&self.to_display_string()),
            Value::Object(_) | Value::Function(_) | Value::Builtin(_) | Value::Class(_) => {
                f64::NAN
            }
        }
    }

    /// String coercion
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(elements) => elements
                .borrow()
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_display_string() })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(closure) => match &closure.func.id {
                Some(name) => format!("function {}() {{ [code] }}", name),
                None => "function () { [code] }".to_string(),
            },
            Value::Builtin(_) => "function () { [native code] }".to_string(),
            Value::Class(class) => format!("class {} {{ [code] }}", class.name()),
        }
    }

    /// The text an uncaught throw of this value reports
    pub fn thrown_message(&self) -> String {
        if let Value::Object(properties) = self {
            if let Some(message) = properties.borrow().get("message") {
                return message.to_display_string();
            }
        }
        self.to_display_string()
    }

    /// Convert from serde_json::Value
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(arr) => Value::array(arr.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Value::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to serde_json::Value; values JSON cannot represent become
    /// null, and object properties holding them are left out
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined
            | Value::Null
            | Value::Function(_)
            | Value::Builtin(_)
            | Value::Class(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    serde_json::json!(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.borrow().iter().map(|v| v.to_json()).collect())
            }
            Value::Object(map) => {
                let obj: serde_json::Map<String, serde_json::Value> = map
                    .borrow()
                    .iter()
                    .filter(|(_, v)| !v.is_callable() && !matches!(v, Value::Undefined))
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                serde_json::Value::Object(obj)
            }
        }
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust also accepts "inf" and "nan", which the host does not
        _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(_) | Value::Object(_) => write!(f, "{}", self.to_json()),
            other => write!(f, "{}", other.to_display_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::string("0").is_truthy());
        assert!(Value::array(vec![]).is_truthy());
        assert!(Value::object(BTreeMap::new()).is_truthy());
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(Value::string(" 42 ").to_number(), 42.0);
        assert_eq!(Value::string("").to_number(), 0.0);
        assert!(Value::string("inf").to_number().is_nan());
        assert!(Value::string("abc").to_number().is_nan());
        assert_eq!(Value::string("1e3").to_number(), 1000.0);
        assert_eq!(Value::Null.to_number(), 0.0);
        assert_eq!(Value::array(vec![Value::Number(7.0)]).to_number(), 7.0);
    }

    #[test]
    fn test_string_coercion() {
        let arr = Value::array(vec![Value::Number(1.0), Value::Null, Value::string("x")]);
        assert_eq!(arr.to_display_string(), "1,,x");
        assert_eq!(Value::Number(2.5).to_display_string(), "2.5");
        assert_eq!(Value::object(BTreeMap::new()).to_display_string(), "[object Object]");
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!({"balance": 100, "tags": ["a", true, null], "ratio": 0.5});
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
        assert_eq!(Value::Undefined.to_json(), serde_json::Value::Null);
        assert_eq!(Value::Number(f64::NAN).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_json_leaves_out_methods_and_undefined() {
        let mut props = BTreeMap::new();
        props.insert("kept".to_string(), Value::Number(1.0));
        props.insert("gone".to_string(), Value::Undefined);
        props.insert("abs".to_string(), Value::Builtin(Rc::new(Builtin::MathAbs)));
        assert_eq!(Value::object(props).to_json(), serde_json::json!({"kept": 1}));
    }

    #[test]
    fn test_thrown_message_prefers_message_property() {
        let mut props = BTreeMap::new();
        props.insert("message".to_string(), Value::string("boom"));
        assert_eq!(Value::object(props).thrown_message(), "boom");
        assert_eq!(Value::Number(3.0).thrown_message(), "3");
    }
}
