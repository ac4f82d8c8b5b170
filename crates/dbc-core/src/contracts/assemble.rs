//! Guard and checker assembly, and return rewriting for governed regions

use crate::config::Names;
use crate::parser::ast::{Expr, Function, Stmt};
use crate::scope::{ScopeChain, UidGenerator};
use crate::visit::{self, VisitMut};
use crate::Result;

use super::extract::extract;
use super::old::{self, Capture};
use super::templates::GuardTemplates;
use super::{contradiction, purity, ContractKind, ContractSite};

/// A synthesized checker function and the captures its guards read
#[derive(Debug, Clone)]
pub struct Checker {
    pub id: String,
    pub declaration: Stmt,
    pub captures: Vec<Capture>,
}

/// Borrowed view of the pass state one contract block needs
pub struct Assembler<'a> {
    pub templates: &'a GuardTemplates,
    pub names: &'a Names,
    pub scope: &'a ScopeChain,
    pub uids: &'a mut UidGenerator,
}

impl Assembler<'_> {
    /// Preconditions and assertions: guards spliced where the label stood
    pub fn inline_guards(
        &mut self,
        kind: ContractKind,
        site: &ContractSite,
        body: Stmt,
    ) -> Result<Vec<Stmt>> {
        purity::check(kind, site, &body)?;
        let mut guards = Vec::new();
        for clause in extract(kind, site, body)? {
            contradiction::check(kind, site, &clause.condition, self.scope)?;
            guards.push(self.templates.guard(clause.condition, clause.message)?);
        }
        tracing::debug!(%kind, %site, guards = guards.len(), "assembled inline guards");
        Ok(guards)
    }

    /// Postconditions and invariants: a checker wrapping every exit of
    /// the governed region
    pub fn checker(
        &mut self,
        kind: ContractKind,
        site: &ContractSite,
        body: Stmt,
    ) -> Result<Checker> {
        purity::check(kind, site, &body)?;
        let mut guards = Vec::new();
        let mut captures = Vec::new();
        for mut clause in extract(kind, site, body)? {
            if kind == ContractKind::Postcondition {
                old::substitute(
                    &mut clause.condition,
                    &self.names.old,
                    self.scope,
                    self.uids,
                    &mut captures,
                )?;
            }
            contradiction::check(kind, site, &clause.condition, self.scope)?;
            guards.push(self.templates.guard(clause.condition, clause.message)?);
        }

        let suffix = match kind {
            ContractKind::Invariant => "Invariant",
            _ => "Postcondition",
        };
        let owner = site.function.as_deref().unwrap_or("check");
        let id = self.uids.generate(&format!("{}{}", owner, suffix));
        tracing::debug!(
            %kind,
            %site,
            guards = guards.len(),
            checker = %id,
            "assembled checker"
        );
        let declaration = self
            .templates
            .checker(&id, &self.names.return_subject, guards)?;
        Ok(Checker {
            id,
            declaration,
            captures,
        })
    }
}

// ── Governed regions ───────────────────────────────────────

/// `id(argument)`, or `id()` for a bare exit
pub fn exit_call(id: &str, argument: Option<Expr>) -> Expr {
    Expr::call(Expr::ident(id), argument.into_iter().collect())
}

fn exit_stmt(id: &str) -> Stmt {
    Stmt::Expr(exit_call(id, None))
}

/// Wrap every `return` in `stmts` with a call to `id`, without entering
/// nested functions; returns the number rewritten
pub fn rewrite_returns(stmts: &mut Vec<Stmt>, id: &str) -> Result<usize> {
    let mut rewriter = ReturnRewriter { id, count: 0 };
    rewriter.visit_stmts(stmts)?;
    tracing::trace!(checker = id, returns = rewriter.count, "rewrote returns");
    Ok(rewriter.count)
}

pub fn ends_with_return(stmts: &[Stmt]) -> bool {
    matches!(stmts.last(), Some(Stmt::Return(_)))
}

struct ReturnRewriter<'a> {
    id: &'a str,
    count: usize,
}

impl VisitMut for ReturnRewriter<'_> {
    fn visit_stmt(&mut self, stmt: &mut Stmt) -> Result<()> {
        if let Stmt::Return(argument) = stmt {
            let wrapped = exit_call(self.id, argument.take());
            *argument = Some(wrapped);
            self.count += 1;
            return Ok(());
        }
        visit::walk_stmt_mut(self, stmt)
    }

    fn visit_expr(&mut self, _expr: &mut Expr) -> Result<()> {
        Ok(())
    }

    fn visit_function(&mut self, _func: &mut Function) -> Result<()> {
        Ok(())
    }
}

/// Govern `block` with its invariants, in source order: each checker is
/// declared and called on entry, wraps every return, and runs on fall
/// through
pub fn apply_invariants(block: &mut Vec<Stmt>, checkers: Vec<Checker>) -> Result<()> {
    let mut prologue = Vec::with_capacity(checkers.len() * 2);
    for checker in checkers {
        rewrite_returns(block, &checker.id)?;
        if !ends_with_return(block) {
            block.push(exit_stmt(&checker.id));
        }
        prologue.push(checker.declaration);
        prologue.push(exit_stmt(&checker.id));
    }
    block.splice(0..0, prologue);
    Ok(())
}

/// Govern a function body with its postconditions: captures first, then
/// checker declarations, then the existing body with every exit wrapped
pub fn apply_postconditions(body: &mut Vec<Stmt>, checkers: Vec<Checker>) -> Result<()> {
    if checkers.is_empty() {
        return Ok(());
    }
    let mut captures = Vec::new();
    let mut declarations = Vec::with_capacity(checkers.len());
    for checker in checkers {
        rewrite_returns(body, &checker.id)?;
        if !ends_with_return(body) {
            body.push(exit_stmt(&checker.id));
        }
        captures.extend(checker.captures.iter().map(Capture::declaration));
        declarations.push(checker.declaration);
    }
    captures.extend(declarations);
    body.splice(0..0, captures);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::parser::tokenizer::Span;
    use crate::printer::program_to_string;

    fn labeled_body(source: &str) -> Stmt {
        let mut program = parse(source).unwrap();
        match program.body.remove(0) {
            Stmt::Labeled(labeled) => *labeled.body,
            other => panic!("expected a labeled statement, got {:?}", other),
        }
    }

    fn with_assembler<T>(f: impl FnOnce(&mut Assembler) -> T) -> T {
        let templates = GuardTemplates::new().unwrap();
        let names = Names::default();
        let scope = ScopeChain::default();
        let mut uids = UidGenerator::default();
        let mut assembler = Assembler {
            templates: &templates,
            names: &names,
            scope: &scope,
            uids: &mut uids,
        };
        f(&mut assembler)
    }

    fn site() -> ContractSite {
        ContractSite::in_function(Some("demo"), Span::default())
    }

    fn render(body: Vec<Stmt>) -> String {
        program_to_string(&crate::parser::ast::Program { body })
    }

    // ── Assembly ──────────────────────────────────────────────

    #[test]
    fn test_inline_guards_in_source_order() {
        let guards = with_assembler(|a| {
            a.inline_guards(
                ContractKind::Precondition,
                &site(),
                labeled_body("pre: { a > 0; b > 0, 'b'; }"),
            )
        })
        .unwrap();
        assert_eq!(guards.len(), 2);
        let text = render(guards);
        assert!(text.find("a > 0").unwrap() < text.find("b > 0").unwrap());
        assert!(text.contains("throw new Error('b');"));
    }

    #[test]
    fn test_postcondition_checker_with_old() {
        let checker = with_assembler(|a| {
            a.checker(
                ContractKind::Postcondition,
                &site(),
                labeled_body("post: it === old(input) + 5;"),
            )
        })
        .unwrap();
        assert_eq!(checker.id, "_demoPostcondition");
        assert_eq!(checker.captures.len(), 1);
        let text = render(vec![checker.declaration]);
        assert!(text.contains("if (!(it === _input + 5))"));
        assert!(text.contains("\"Function \\\"demo\\\" postcondition failed: it === old(input) + 5\""));
    }

    #[test]
    fn test_invariant_checker_ignores_old_and_names_anonymous() {
        let checker = with_assembler(|a| {
            a.checker(
                ContractKind::Invariant,
                &ContractSite::in_function(None, Span::default()),
                labeled_body("invariant: old(x) > 0;"),
            )
        })
        .unwrap();
        assert_eq!(checker.id, "_checkInvariant");
        assert!(checker.captures.is_empty());
    }

    #[test]
    fn test_static_failures_propagate() {
        let err = with_assembler(|a| {
            a.inline_guards(ContractKind::Assertion, &site(), labeled_body("assert: 1 > 2;"))
        })
        .unwrap_err();
        assert!(err.is_build_time());
    }

    // ── Regions ───────────────────────────────────────────────

    #[test]
    fn test_rewrite_returns_skips_nested_functions() {
        let mut program =
            parse("if (a) { return 1; }\nconst f = () => { return 2; };\nreturn;").unwrap();
        let count = rewrite_returns(&mut program.body, "_check").unwrap();
        assert_eq!(count, 2);
        let text = program_to_string(&program);
        assert!(text.contains("return _check(1);"));
        assert!(text.contains("return 2;"));
        assert!(text.contains("return _check();"));
    }

    #[test]
    fn test_apply_postconditions_layout() {
        let checker = with_assembler(|a| {
            a.checker(
                ContractKind::Postcondition,
                &site(),
                labeled_body("post: it === old(input);"),
            )
        })
        .unwrap();
        let mut body = parse("input = 1;").unwrap().body;
        apply_postconditions(&mut body, vec![checker]).unwrap();
        assert!(matches!(&body[0], Stmt::Var(decl) if decl.declarations[0].name == "_input"));
        assert!(
            matches!(&body[1], Stmt::Var(decl) if decl.declarations[0].name == "_demoPostcondition")
        );
        assert!(render(body).ends_with("_demoPostcondition();\n"));
    }

    #[test]
    fn test_apply_invariants_entry_and_exits() {
        let checker = with_assembler(|a| {
            a.checker(ContractKind::Invariant, &site(), labeled_body("invariant: x > 0;"))
        })
        .unwrap();
        let mut block = parse("x--;\nreturn x;").unwrap().body;
        apply_invariants(&mut block, vec![checker]).unwrap();
        assert_eq!(block.len(), 4);
        assert_eq!(
            crate::printer::stmt_to_string(&block[1]),
            "_demoInvariant();"
        );
        assert_eq!(
            crate::printer::stmt_to_string(&block[3]),
            "return _demoInvariant(x);"
        );
    }

    #[test]
    fn test_checkers_of_one_region_wrap_in_source_order() {
        let mut body = parse("return x;").unwrap().body;
        rewrite_returns(&mut body, "_first").unwrap();
        rewrite_returns(&mut body, "_second").unwrap();
        assert_eq!(render(body), "return _second(_first(x));\n");
    }
}
