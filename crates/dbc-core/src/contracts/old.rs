//! `old(expr)` capture in postconditions
//!
//! Each call to the configured old operator is replaced by a reference to
//! a fresh binding; the binding's initializer is the call's argument and
//! is hoisted to the top of the function body by the assembler.

use crate::parser::ast::{Declarator, Expr, Stmt, VarDecl, VarKind};
use crate::scope::{hint_for, ScopeChain, UidGenerator};
use crate::visit::{self, VisitMut};
use crate::Result;

/// A snapshot binding: `const <id> = <init>;`
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub id: String,
    pub init: Expr,
}

impl Capture {
    pub fn declaration(&self) -> Stmt {
        Stmt::Var(VarDecl {
            kind: VarKind::Const,
            declarations: vec![Declarator {
                name: self.id.clone(),
                init: Some(self.init.clone()),
            }],
        })
    }
}

/// Replace every `old(arg)` in `expr`, innermost first, appending one
/// capture per call to `captures`
pub fn substitute(
    expr: &mut Expr,
    old_name: &str,
    scope: &ScopeChain,
    uids: &mut UidGenerator,
    captures: &mut Vec<Capture>,
) -> Result<()> {
    if scope.has_binding(old_name) {
        return Ok(());
    }
    let mut rewriter = OldRewriter {
        old_name,
        uids,
        captures,
    };
    rewriter.visit_expr(expr)
}

struct OldRewriter<'a> {
    old_name: &'a str,
    uids: &'a mut UidGenerator,
    captures: &'a mut Vec<Capture>,
}

impl OldRewriter<'_> {
    fn is_old_call(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Call { callee, arguments } => {
                !arguments.is_empty()
                    && matches!(callee.as_ref(), Expr::Ident(name) if name == self.old_name)
            }
            _ => false,
        }
    }
}

impl VisitMut for OldRewriter<'_> {
    fn visit_expr(&mut self, expr: &mut Expr) -> Result<()> {
        visit::walk_expr_mut(self, expr)?;
        if !self.is_old_call(expr) {
            return Ok(());
        }
        let Expr::Call { arguments, .. } = expr else {
            return Ok(());
        };
        let init = arguments.swap_remove(0);
        let id = self.uids.generate(&hint_for(&init));
        tracing::trace!(capture = %id, "captured old value");
        *expr = Expr::Ident(id.clone());
        self.captures.push(Capture { id, init });
        Ok(())
    }
}
