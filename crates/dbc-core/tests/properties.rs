use dbc_core::{Config, Error};
use proptest::prelude::*;

fn bounded(lower: i32, upper: i32) -> String {
    format!(
        "export default function clamp (n) {{\n  pre: {{\n    n >= {lower}, \"too small\";\n    n <= {upper}, \"too large\";\n  }}\n  post: it >= {lower};\n  return n;\n}}\n"
    )
}

// Property: the first failing guard decides the message
proptest! {
    #[test]
    fn first_failing_guard_wins(lower in -50i32..0, upper in 1i32..50, n in -100i32..100) {
        let source = bounded(lower, upper);
        let result = dbc_core::run(&source, &Config::default(), "default", &format!("[{}]", n));
        if n < lower {
            prop_assert!(matches!(result, Err(Error::Uncaught { ref message }) if message == "too small"), "expected Uncaught(\"too small\")");
        } else if n > upper {
            prop_assert!(matches!(result, Err(Error::Uncaught { ref message }) if message == "too large"), "expected Uncaught(\"too large\")");
        } else {
            prop_assert_eq!(result.ok(), Some(serde_json::json!(n)));
        }
    }
}

// Property: stripped code never throws a contract violation
proptest! {
    #[test]
    fn strip_mode_never_throws(lower in -50i32..0, upper in 1i32..50, n in -100i32..100) {
        let source = bounded(lower, upper);
        let result = dbc_core::run(&source, &Config::with_strip(true), "default", &format!("[{}]", n));
        prop_assert_eq!(result.ok(), Some(serde_json::json!(n)));
    }
}

// Property: lowering is deterministic
proptest! {
    #[test]
    fn lowering_is_deterministic(lower in -50i32..0, upper in 1i32..50) {
        let source = bounded(lower, upper);
        let first = dbc_core::lower(&source, &Config::default()).unwrap();
        let second = dbc_core::lower(&source, &Config::default()).unwrap();
        prop_assert_eq!(first, second);
    }
}

// Property: programs without contract labels survive lowering unchanged
proptest! {
    #[test]
    fn unlabeled_programs_are_untouched(a in 0i32..1000, b in 0i32..1000) {
        let source = format!("function add(x) {{\n  return x + {} * {};\n}}\n", a, b);
        let lowered = dbc_core::lower(&source, &Config::default()).unwrap();
        prop_assert_eq!(lowered, source);
    }
}
