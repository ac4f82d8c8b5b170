//! DBC Core - design-by-contract lowering for JavaScript
//!
//! Functions state their contracts with labeled statements:
//!
//! ```text
//! function withdraw(account, amount) {
//!   pre: amount > 0, "Cannot withdraw a zero or negative amount";
//!   post: account.balance === old(account.balance) - amount;
//!   ...
//! }
//! ```
//!
//! Lowering compiles those labels into ordinary guard code that throws
//! when a contract is violated, or strips them entirely.
//!
//! # Architecture
//!
//! ```text
//! Source → Parser → AST → Contracts (dispatch → assemble) → Printer → Source
//!                                           ↓
//!                               Executor (reference evaluation)
//! ```
//!
//! # Guarantees
//!
//! - **Deterministic**: same input and configuration, same output
//! - **Fail early**: side effects and contradictions abort the pass
//! - **Transparent**: code without contract labels comes back unchanged
//!   modulo formatting

pub mod config;
pub mod contracts;
pub mod error;
pub mod executor;
pub mod fold;
pub mod parser;
pub mod printer;
pub mod scope;
pub mod template;
pub mod visit;

pub use config::{Config, Names, Options};
pub use contracts::{lower_program, ContractKind, ContractSite};
pub use error::{Error, Result};
pub use executor::{Runtime, Value};

/// Lower every contract in `source` and print the result
pub fn lower(source: &str, config: &Config) -> Result<String> {
    let mut program = parser::parse(source)?;
    lower_program(&mut program, config)?;
    Ok(printer::program_to_string(&program))
}

/// Outcome of checking a source file's contracts without emitting code
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CheckReport {
    pub valid: bool,
    pub error: Option<String>,
}

/// Run the lowering pass and report build-time failures.
///
/// Parse errors and contract defects are reported, not returned;
/// only configuration errors propagate.
pub fn check(source: &str, config: &Config) -> Result<CheckReport> {
    config.validate()?;
    match lower(source, config) {
        Ok(_) => Ok(CheckReport {
            valid: true,
            error: None,
        }),
        Err(e) if e.is_build_time() => Ok(CheckReport {
            valid: false,
            error: Some(e.to_string()),
        }),
        Err(e) => Err(e),
    }
}

/// Lower `source`, load it and call `function` with JSON arguments
/// (convenience function, public API)
///
/// # Arguments
/// - `function`: a global function name, or `"default"` for the default export
/// - `args`: JSON array of arguments, or a single JSON value
///
/// # Returns
/// The call's result as JSON. A violated contract is `Error::Uncaught`
/// carrying the guard's message.
///
/// Evaluation runs on its own thread (see [`executor::with_eval_stack`]),
/// so runaway recursion ends in a catchable RangeError on any caller.
pub fn run(source: &str, config: &Config, function: &str, args: &str) -> Result<serde_json::Value> {
    let parsed: serde_json::Value = serde_json::from_str(args.trim())
        .map_err(|e| Error::ExecutionError(format!("Arguments must be JSON: {}", e)))?;

    let source = source.to_string();
    let config = config.clone();
    let function = function.to_string();
    executor::with_eval_stack(move || {
        let args = match &parsed {
            serde_json::Value::Array(items) => items.iter().map(Value::from_json).collect(),
            single => vec![Value::from_json(single)],
        };
        let mut program = parser::parse(&source)?;
        lower_program(&mut program, &config)?;
        let runtime = Runtime::load(&program)?;
        let result = runtime.call(&function, args)?;
        Ok(result.to_json())
    })
}
