//! Host functions: `Error`, `Math.*` and the array/string methods

use std::collections::BTreeMap;
use std::rc::Rc;

use super::ops::strict_equals;
use super::value::{ArrayMethod, Builtin, StringMethod, Value};
use super::{error_object, Eval};

/// Global `Math` object
pub(crate) fn math() -> Value {
    let mut math = BTreeMap::new();
    for (name, builtin) in [
        ("abs", Builtin::MathAbs),
        ("max", Builtin::MathMax),
        ("min", Builtin::MathMin),
        ("floor", Builtin::MathFloor),
    ] {
        math.insert(name.to_string(), Value::Builtin(Rc::new(builtin)));
    }
    Value::object(math)
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

pub(crate) fn call(builtin: &Builtin, args: Vec<Value>) -> Eval<Value> {
    Ok(match builtin {
        Builtin::Error => {
            let message = match args.first() {
                None | Some(Value::Undefined) => String::new(),
                Some(message) => message.to_display_string(),
            };
            error_object("Error", message)
        }
        Builtin::MathAbs => Value::Number(arg(&args, 0).to_number().abs()),
        Builtin::MathFloor => Value::Number(arg(&args, 0).to_number().floor()),
        Builtin::MathMax => Value::Number(extremum(&args, f64::NEG_INFINITY, f64::max)),
        Builtin::MathMin => Value::Number(extremum(&args, f64::INFINITY, f64::min)),
        Builtin::ArrayMethod(method, elements) => match method {
            ArrayMethod::Push => {
                let mut elements = elements.borrow_mut();
                elements.extend(args);
                Value::Number(elements.len() as f64)
            }
            ArrayMethod::Includes => {
                let needle = arg(&args, 0);
                let found = elements
                    .borrow()
                    .iter()
                    .any(|v| strict_equals(v, &needle) || both_nan(v, &needle));
                Value::Bool(found)
            }
            ArrayMethod::IndexOf => {
                let needle = arg(&args, 0);
                let position = elements.borrow().iter().position(|v| strict_equals(v, &needle));
                Value::Number(position.map(|i| i as f64).unwrap_or(-1.0))
            }
            ArrayMethod::Join => {
                let separator = match args.first() {
                    None | Some(Value::Undefined) => ",".to_string(),
                    Some(separator) => separator.to_display_string(),
                };
                let parts: Vec<String> = elements
                    .borrow()
                    .iter()
                    .map(|v| if v.is_nullish() { String::new() } else { v.to_display_string() })
                    .collect();
                Value::String(parts.join(&separator))
            }
        },
        Builtin::StringMethod(method, text) => match method {
            StringMethod::Includes => {
                Value::Bool(text.contains(arg(&args, 0).to_display_string().as_str()))
            }
            StringMethod::IndexOf => {
                let needle = arg(&args, 0).to_display_string();
                let position = text
                    .find(needle.as_str())
                    .map(|byte| text[..byte].encode_utf16().count() as f64)
                    .unwrap_or(-1.0);
                Value::Number(position)
            }
            StringMethod::ToUpperCase => Value::String(text.to_uppercase()),
            StringMethod::ToLowerCase => Value::String(text.to_lowercase()),
            StringMethod::Trim => Value::string(text.trim()),
        },
    })
}

fn both_nan(a: &Value, b: &Value) -> bool {
    matches!((a, b), (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan())
}

fn extremum(args: &[Value], start: f64, pick: fn(f64, f64) -> f64) -> f64 {
    let mut result = start;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        result = pick(result, n);
    }
    result
}
