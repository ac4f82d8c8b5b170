//! Contract lowering — turns contract-labeled statements into guards
//!
//! # Pipeline
//!
//! ```text
//! labeled block ─→ dispatch ─→ purity ─→ extract ─→ contradiction
//!                                                       ↓
//!                     spliced guards / checker ←─ assemble (templates, old)
//! ```
//!
//! - `pre:` and `assert:` become inline `if (!c) throw` guards where the
//!   label stood.
//! - `post:` becomes a checker function at the top of the enclosing
//!   function; every `return e` becomes `return check(e)`.
//! - `invariant:` becomes a checker at the top of the nearest block,
//!   called on entry and wrapped around every exit of that block.
//!
//! Build-time defects (side effects, contradictions, malformed bodies)
//! abort the pass with an [`Error`](crate::Error).

pub mod assemble;
pub mod contradiction;
pub mod dispatch;
pub mod extract;
pub mod old;
pub mod purity;
pub mod templates;

use std::fmt;

use crate::config::Config;
use crate::parser::ast::Program;
use crate::parser::tokenizer::Span;
use crate::Result;

pub use dispatch::Dispatcher;

/// The four contract kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    Precondition,
    Postcondition,
    Invariant,
    Assertion,
}

impl ContractKind {
    /// Plural, capitalized: "Preconditions"
    pub fn plural(&self) -> &'static str {
        match self {
            ContractKind::Precondition => "Preconditions",
            ContractKind::Postcondition => "Postconditions",
            ContractKind::Invariant => "Invariants",
            ContractKind::Assertion => "Assertions",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContractKind::Precondition => "precondition",
            ContractKind::Postcondition => "postcondition",
            ContractKind::Invariant => "invariant",
            ContractKind::Assertion => "assertion",
        };
        f.write_str(name)
    }
}

/// Where a contract was written, for diagnostics and default messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSite {
    /// Name of the enclosing function; `None` when anonymous or at top level
    pub function: Option<String>,
    pub top_level: bool,
    /// Position of the contract label
    pub span: Span,
}

impl ContractSite {
    pub fn in_function(function: Option<&str>, span: Span) -> Self {
        ContractSite {
            function: function.map(str::to_string),
            top_level: false,
            span,
        }
    }

    pub fn top_level(span: Span) -> Self {
        ContractSite {
            function: None,
            top_level: true,
            span,
        }
    }
}

impl fmt::Display for ContractSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.function, self.top_level) {
            (Some(name), _) => write!(f, "function \"{}\" at {}", name, self.span),
            (None, true) => write!(f, "top level at {}", self.span),
            (None, false) => write!(f, "anonymous function at {}", self.span),
        }
    }
}

/// Lower every contract in `program` in place
pub fn lower_program(program: &mut Program, config: &Config) -> Result<()> {
    config.validate()?;
    let mut dispatcher = Dispatcher::new(program, config)?;
    dispatcher.run(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span {
            line: 4,
            column: 3,
            offset: 40,
        }
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ContractKind::Precondition.to_string(), "precondition");
        assert_eq!(ContractKind::Assertion.plural(), "Assertions");
    }

    #[test]
    fn test_site_display() {
        assert_eq!(
            ContractSite::in_function(Some("withdraw"), span()).to_string(),
            "function \"withdraw\" at 4:3"
        );
        assert_eq!(ContractSite::in_function(None, span()).to_string(), "anonymous function at 4:3");
        assert_eq!(ContractSite::top_level(span()).to_string(), "top level at 4:3");
    }
}
