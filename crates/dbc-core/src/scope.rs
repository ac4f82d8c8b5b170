//! Name binding — declared names, lexical scope chain, fresh identifiers
//!
//! Scopes are function-granular: block-scoped declarations are treated
//! as bindings of the enclosing function. That over-approximates what is
//! visible at any point, which is the safe direction both for deciding
//! whether a name is user-bound and for avoiding collisions.

use std::collections::BTreeSet;

use crate::parser::ast::*;
use crate::visit::{self, Visit};
use crate::Result;

// ── Declared names ─────────────────────────────────────────

/// Names a statement list introduces, without entering nested functions
pub fn declared_names(stmts: &[Stmt]) -> BTreeSet<String> {
    let mut collector = DeclarationCollector::default();
    for stmt in stmts {
        collector.collect(stmt);
    }
    collector.names
}

#[derive(Default)]
struct DeclarationCollector {
    names: BTreeSet<String>,
}

impl DeclarationCollector {
    fn var_decl(&mut self, decl: &VarDecl) {
        for declarator in &decl.declarations {
            self.names.insert(declarator.name.clone());
        }
    }

    fn collect_all(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.collect(stmt);
        }
    }

    fn collect(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var(decl) => self.var_decl(decl),
            Stmt::Function(func) => {
                if let Some(id) = &func.id {
                    self.names.insert(id.clone());
                }
            }
            Stmt::Class(class) => {
                if let Some(id) = &class.id {
                    self.names.insert(id.clone());
                }
            }
            Stmt::If {
                consequent,
                alternate,
                ..
            } => {
                self.collect(consequent);
                if let Some(alternate) = alternate {
                    self.collect(alternate);
                }
            }
            Stmt::Block(body) => self.collect_all(body),
            Stmt::Switch { cases, .. } => {
                for case in cases {
                    self.collect_all(&case.consequent);
                }
            }
            Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => self.collect(body),
            Stmt::For { init, body, .. } => {
                if let Some(ForInit::Var(decl)) = init {
                    self.var_decl(decl);
                }
                self.collect(body);
            }
            Stmt::Labeled(labeled) => self.collect(&labeled.body),
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                self.collect_all(block);
                if let Some(handler) = handler {
                    if let Some(param) = &handler.param {
                        self.names.insert(param.clone());
                    }
                    self.collect_all(&handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.collect_all(finalizer);
                }
            }
            Stmt::Export { declaration, .. } => self.collect(declaration),
            Stmt::Expr(_)
            | Stmt::Return(_)
            | Stmt::Throw(_)
            | Stmt::Break(_)
            | Stmt::Continue(_)
            | Stmt::Empty => {}
        }
    }
}

// ── Scope chain ────────────────────────────────────────────

/// Bindings of the current function and its lexical ancestors
#[derive(Debug, Clone, Default)]
pub struct ScopeChain {
    frames: Vec<BTreeSet<String>>,
}

impl ScopeChain {
    /// Program scope
    pub fn root(program: &Program) -> Self {
        ScopeChain {
            frames: vec![declared_names(&program.body)],
        }
    }

    /// Enter a function: its name, parameters and body declarations
    pub fn enter(&mut self, func: &Function) {
        let mut names = match &func.body {
            FunctionBody::Block(body) => declared_names(body),
            FunctionBody::Expr(_) => BTreeSet::new(),
        };
        names.extend(func.params.iter().cloned());
        if let Some(id) = &func.id {
            names.insert(id.clone());
        }
        self.frames.push(names);
    }

    pub fn exit(&mut self) {
        self.frames.pop();
    }

    pub fn has_binding(&self, name: &str) -> bool {
        self.frames.iter().any(|frame| frame.contains(name))
    }
}

// ── Fresh identifiers ──────────────────────────────────────

/// Generates identifiers that collide with nothing in the program
#[derive(Debug, Clone, Default)]
pub struct UidGenerator {
    taken: BTreeSet<String>,
}

impl UidGenerator {
    /// Reserve every name the program mentions, in any scope
    pub fn for_program(program: &Program) -> Self {
        let mut collector = NameCollector::default();
        // NameCollector never fails; the Result is the visitor signature.
        let _ = visit::walk_program(&mut collector, program);
        UidGenerator {
            taken: collector.names,
        }
    }

    /// `_hint`, then `_hint2`, `_hint3`, … until unused
    pub fn generate(&mut self, hint: &str) -> String {
        let base = to_identifier(hint);
        let mut candidate = format!("_{}", base);
        let mut counter = 1;
        while self.taken.contains(&candidate) {
            counter += 1;
            candidate = format!("_{}{}", base, counter);
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}

/// Hint for a capture of `expr`: `input.price` → `inputPrice`
pub fn hint_for(expr: &Expr) -> String {
    let mut parts = Vec::new();
    gather_parts(expr, &mut parts);
    if parts.is_empty() {
        return "ref".to_string();
    }
    let mut hint = parts[0].clone();
    for part in &parts[1..] {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            hint.extend(first.to_uppercase());
            hint.push_str(chars.as_str());
        }
    }
    hint
}

fn gather_parts(expr: &Expr, parts: &mut Vec<String>) {
    match expr {
        Expr::Ident(name) => parts.push(name.clone()),
        Expr::Str { value, .. } => parts.push(value.clone()),
        Expr::Number { value, .. } => parts.push(crate::printer::format_number(*value)),
        Expr::This => parts.push("this".to_string()),
        Expr::Member { object, property } => {
            gather_parts(object, parts);
            match property {
                MemberProp::Ident(name) => parts.push(name.clone()),
                MemberProp::Computed(property) => gather_parts(property, parts),
            }
        }
        Expr::Call { callee, .. } | Expr::New { callee, .. } => gather_parts(callee, parts),
        Expr::Unary { argument, .. } => gather_parts(argument, parts),
        _ => {}
    }
}

/// Strip characters that cannot appear in an identifier, camel-casing
/// across the gaps; leading underscores and digits are dropped
fn to_identifier(hint: &str) -> String {
    let mut out = String::new();
    let mut upper_next = false;
    for c in hint.chars() {
        if c.is_alphanumeric() || c == '$' {
            if out.is_empty() && c.is_ascii_digit() {
                continue;
            }
            if upper_next && !out.is_empty() {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            upper_next = false;
        } else {
            upper_next = true;
        }
    }
    if out.is_empty() {
        "ref".to_string()
    } else {
        out
    }
}

#[derive(Default)]
struct NameCollector {
    names: BTreeSet<String>,
}

impl Visit for NameCollector {
    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Var(decl) => {
                for declarator in &decl.declarations {
                    self.names.insert(declarator.name.clone());
                }
            }
            Stmt::For {
                init: Some(ForInit::Var(decl)),
                ..
            } => {
                for declarator in &decl.declarations {
                    self.names.insert(declarator.name.clone());
                }
            }
            Stmt::Try {
                handler: Some(CatchClause { param: Some(param), .. }),
                ..
            } => {
                self.names.insert(param.clone());
            }
            Stmt::Class(Class { id: Some(id), .. }) => {
                self.names.insert(id.clone());
            }
            _ => {}
        }
        visit::walk_stmt(self, stmt)
    }

    fn visit_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Ident(name) => {
                self.names.insert(name.clone());
            }
            Expr::Class(class) => {
                if let Some(id) = &class.id {
                    self.names.insert(id.clone());
                }
            }
            _ => {}
        }
        visit::walk_expr(self, expr)
    }

    fn visit_function(&mut self, func: &Function) -> Result<()> {
        if let Some(id) = &func.id {
            self.names.insert(id.clone());
        }
        self.names.extend(func.params.iter().cloned());
        visit::walk_function(self, func)
    }
}
