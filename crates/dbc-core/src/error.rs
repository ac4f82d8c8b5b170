//! Error types for contract lowering
//!
//! All fallible operations return `Result<T, Error>`.
//! Build-time failures abort a lowering pass; `Uncaught` is the
//! runtime-visible signal of a failing guard.

use crate::contracts::{ContractKind, ContractSite};

/// Contract lowering error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Syntax violation while tokenizing or parsing source text
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A contract body mutates state, declares bindings, or returns
    #[error("{} cannot have side effects. ({site})", .kind.plural())]
    SideEffect { kind: ContractKind, site: ContractSite },

    /// A contract body that is not made of expression statements
    #[error("Malformed {kind}: {detail} ({site})")]
    MalformedContract {
        kind: ContractKind,
        site: ContractSite,
        detail: String,
    },

    /// A condition that folds to a falsy constant
    #[error("Contract always fails. {kind} `{condition}` ({site})")]
    ContractAlwaysFails {
        kind: ContractKind,
        site: ContractSite,
        condition: String,
    },

    /// Template instantiation without a required binding
    #[error("Template error: {0}")]
    TemplateError(String),

    /// Invalid lowering options
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The reference evaluator cannot run a construct
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// A thrown value escaped to the caller of the evaluator
    #[error("Uncaught exception: {message}")]
    Uncaught { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures that abort a lowering pass, as opposed to
    /// failures observed while running lowered code.
    pub fn is_build_time(&self) -> bool {
        matches!(
            self,
            Error::ParseError(_)
                | Error::SideEffect { .. }
                | Error::MalformedContract { .. }
                | Error::ContractAlwaysFails { .. }
        )
    }
}

/// Result type alias for lowering operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokenizer::Span;

    fn site() -> ContractSite {
        ContractSite::in_function(Some("demo"), Span { line: 2, column: 3, offset: 20 })
    }

    #[test]
    fn test_side_effect_message_names_kind_and_site() {
        let err = Error::SideEffect { kind: ContractKind::Precondition, site: site() };
        assert_eq!(
            err.to_string(),
            "Preconditions cannot have side effects. (function \"demo\" at 2:3)"
        );
        assert!(err.is_build_time());
    }

    #[test]
    fn test_always_fails_message() {
        let err = Error::ContractAlwaysFails {
            kind: ContractKind::Invariant,
            site: site(),
            condition: "1 === 2".into(),
        };
        assert!(err.to_string().starts_with("Contract always fails."));
        assert!(err.to_string().contains("1 === 2"));
    }

    #[test]
    fn test_uncaught_is_runtime() {
        let err = Error::Uncaught { message: "boom".into() };
        assert!(!err.is_build_time());
        assert_eq!(err.to_string(), "Uncaught exception: boom");
    }
}
