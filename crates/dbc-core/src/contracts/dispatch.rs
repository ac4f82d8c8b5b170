//! Dispatcher — one walk over the program that finds contract labels,
//! routes each to its assembler and applies the governed regions

use crate::config::Config;
use crate::parser::ast::{Function, FunctionBody, Labeled, Program, Stmt};
use crate::parser::tokenizer::Span;
use crate::scope::{ScopeChain, UidGenerator};
use crate::visit::{self, VisitMut};
use crate::Result;

use super::assemble::{self, Assembler, Checker};
use super::templates::GuardTemplates;
use super::{ContractKind, ContractSite};

/// Per-function state while its body is being walked
#[derive(Debug)]
struct FunctionFrame {
    name: Option<String>,
    postconditions: Vec<Checker>,
}

/// Lowering pass state
pub struct Dispatcher<'c> {
    config: &'c Config,
    templates: GuardTemplates,
    uids: UidGenerator,
    scope: ScopeChain,
    functions: Vec<FunctionFrame>,
}

impl<'c> Dispatcher<'c> {
    pub fn new(program: &Program, config: &'c Config) -> Result<Self> {
        Ok(Dispatcher {
            config,
            templates: GuardTemplates::new()?,
            uids: UidGenerator::for_program(program),
            scope: ScopeChain::root(program),
            functions: Vec::new(),
        })
    }

    pub fn run(&mut self, program: &mut Program) -> Result<()> {
        self.visit_stmts(&mut program.body)
    }

    /// Contract kind of a label at the current position. Outside any
    /// function only assertions count.
    fn contract_kind(&self, label: &str) -> Option<ContractKind> {
        let kind = self.config.names.kind_of(label)?;
        if self.functions.is_empty() && kind != ContractKind::Assertion {
            return None;
        }
        Some(kind)
    }

    fn is_contract(&self, stmt: &Stmt) -> bool {
        match stmt {
            Stmt::Labeled(labeled) => self.contract_kind(&labeled.label).is_some(),
            _ => false,
        }
    }

    fn take_contract(&self, stmts: &mut Vec<Stmt>, index: usize) -> Option<(ContractKind, Labeled)> {
        let kind = match &stmts[index] {
            Stmt::Labeled(labeled) => self.contract_kind(&labeled.label)?,
            _ => return None,
        };
        match stmts.remove(index) {
            Stmt::Labeled(labeled) => Some((kind, labeled)),
            _ => None,
        }
    }

    fn site(&self, span: &Span) -> ContractSite {
        match self.functions.last() {
            Some(frame) => ContractSite::in_function(frame.name.as_deref(), span.clone()),
            None => ContractSite::top_level(span.clone()),
        }
    }

    fn assembler(&mut self) -> Assembler<'_> {
        Assembler {
            templates: &self.templates,
            names: &self.config.names,
            scope: &self.scope,
            uids: &mut self.uids,
        }
    }

    /// A contract written as the direct body of a compound statement
    /// gets its own block
    fn enclose(&self, body: &mut Box<Stmt>) {
        if self.is_contract(body) {
            let contract = std::mem::replace(body.as_mut(), Stmt::Empty);
            **body = Stmt::Block(vec![contract]);
        }
    }
}

impl VisitMut for Dispatcher<'_> {
    fn visit_stmts(&mut self, stmts: &mut Vec<Stmt>) -> Result<()> {
        let mut invariants = Vec::new();
        let mut i = 0;
        while i < stmts.len() {
            let Some((kind, labeled)) = self.take_contract(stmts, i) else {
                self.visit_stmt(&mut stmts[i])?;
                i += 1;
                continue;
            };
            let site = self.site(&labeled.span);
            if self.config.strip {
                tracing::debug!(%kind, %site, "stripped contract");
                continue;
            }
            match kind {
                ContractKind::Precondition | ContractKind::Assertion => {
                    let guards = self.assembler().inline_guards(kind, &site, *labeled.body)?;
                    let count = guards.len();
                    stmts.splice(i..i, guards);
                    i += count;
                }
                ContractKind::Postcondition => {
                    let checker = self.assembler().checker(kind, &site, *labeled.body)?;
                    if let Some(frame) = self.functions.last_mut() {
                        frame.postconditions.push(checker);
                    }
                }
                ContractKind::Invariant => {
                    invariants.push(self.assembler().checker(kind, &site, *labeled.body)?);
                }
            }
        }
        if !invariants.is_empty() {
            assemble::apply_invariants(stmts, invariants)?;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt) -> Result<()> {
        match stmt {
            Stmt::If {
                consequent,
                alternate,
                ..
            } => {
                self.enclose(consequent);
                if let Some(alternate) = alternate {
                    self.enclose(alternate);
                }
            }
            Stmt::While { body, .. } | Stmt::DoWhile { body, .. } | Stmt::For { body, .. } => {
                self.enclose(body)
            }
            Stmt::Labeled(labeled) => self.enclose(&mut labeled.body),
            _ => {}
        }
        visit::walk_stmt_mut(self, stmt)
    }

    fn visit_function(&mut self, func: &mut Function) -> Result<()> {
        self.scope.enter(func);
        if let FunctionBody::Expr(_) = func.body {
            let walked = visit::walk_function_mut(self, func);
            self.scope.exit();
            return walked;
        }

        tracing::debug!(
            function = func.id.as_deref().unwrap_or("<anonymous>"),
            line = func.span.line,
            "dispatching function"
        );
        self.functions.push(FunctionFrame {
            name: func.id.clone(),
            postconditions: Vec::new(),
        });
        let walked = visit::walk_function_mut(self, func);
        let frame = self.functions.pop();
        self.scope.exit();
        walked?;

        if let (Some(frame), FunctionBody::Block(body)) = (frame, &mut func.body) {
            assemble::apply_postconditions(body, frame.postconditions)?;
        }
        Ok(())
    }
}
