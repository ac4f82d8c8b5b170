//! Guard templates: the shape of all emitted code

use crate::parser::ast::{Expr, Stmt};
use crate::template::{compile_template, Bindings, Replacement, Template};
use crate::Result;

const GUARD: &str = "if (!CONDITION) {\n  throw new Error(MESSAGE);\n}";

const CHECKER: &str = "const ID = (SUBJECT) => {\n  CONDITIONS;\n  return SUBJECT;\n};";

/// Compiled guard and checker snippets, built once per pass
#[derive(Debug, Clone)]
pub struct GuardTemplates {
    guard: Template,
    checker: Template,
}

impl GuardTemplates {
    pub fn new() -> Result<Self> {
        Ok(GuardTemplates {
            guard: compile_template(GUARD, &["CONDITION", "MESSAGE"])?,
            checker: compile_template(CHECKER, &["ID", "SUBJECT", "CONDITIONS"])?,
        })
    }

    /// `if (!condition) { throw new Error(message); }`
    pub fn guard(&self, condition: Expr, message: Expr) -> Result<Stmt> {
        let mut bindings = Bindings::new();
        bindings.insert("CONDITION", Replacement::Expr(condition));
        bindings.insert("MESSAGE", Replacement::Expr(message));
        self.guard.instantiate_stmt(&bindings)
    }

    /// `const id = (subject) => { guards; return subject; };`
    pub fn checker(&self, id: &str, subject: &str, guards: Vec<Stmt>) -> Result<Stmt> {
        let mut bindings = Bindings::new();
        bindings.insert("ID", Replacement::Name(id.to_string()));
        bindings.insert("SUBJECT", Replacement::Name(subject.to_string()));
        bindings.insert("CONDITIONS", Replacement::Statements(guards));
        self.checker.instantiate_stmt(&bindings)
    }
}
