//! Side-effect detection for contract bodies
//!
//! A contract must not change program state. Rejected anywhere in a
//! body: declarations, returns, assignments, `++`/`--`, `delete`,
//! `yield`, `await` and nested functions. Calls are allowed; their
//! purity is the caller's responsibility.

use crate::parser::ast::{Expr, Function, Stmt, UnaryOp};
use crate::visit::{self, Visit};
use crate::{Error, Result};

use super::{ContractKind, ContractSite};

/// Fail with `SideEffect` when `body` contains a forbidden construct
pub fn check(kind: ContractKind, site: &ContractSite, body: &Stmt) -> Result<()> {
    let mut detector = EffectDetector { kind, site };
    detector.visit_stmt(body)
}

struct EffectDetector<'a> {
    kind: ContractKind,
    site: &'a ContractSite,
}

impl EffectDetector<'_> {
    fn reject(&self) -> Result<()> {
        Err(Error::SideEffect {
            kind: self.kind,
            site: self.site.clone(),
        })
    }
}

impl Visit for EffectDetector<'_> {
    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Var(_) | Stmt::Function(_) | Stmt::Class(_) | Stmt::Return(_) => {
                self.reject()
            }
            _ => visit::walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Assign { .. } | Expr::Update { .. } | Expr::Yield(_) | Expr::Await(_) => {
                self.reject()
            }
            Expr::Unary {
                op: UnaryOp::Delete,
                ..
            } => self.reject(),
            _ => visit::walk_expr(self, expr),
        }
    }

    fn visit_function(&mut self, _func: &Function) -> Result<()> {
        self.reject()
    }
}
