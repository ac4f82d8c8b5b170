//! Tree traversal — shared (`Visit`) and exclusive (`VisitMut`) visitors
//!
//! Each trait method defaults to the matching `walk_*` function, which
//! recurses into every child. Override a method to intercept a node
//! kind; call the `walk_*` function from the override to keep
//! descending. Every method returns `Result` so a visitor can abort the
//! traversal with a build-time failure.

use crate::parser::ast::*;
use crate::Result;

// ── Shared traversal ──────────────────────────────────────

pub trait Visit {
    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        walk_stmt(self, stmt)
    }

    fn visit_expr(&mut self, expr: &Expr) -> Result<()> {
        walk_expr(self, expr)
    }

    fn visit_function(&mut self, func: &Function) -> Result<()> {
        walk_function(self, func)
    }
}

pub fn walk_program<V: Visit + ?Sized>(visitor: &mut V, program: &Program) -> Result<()> {
    walk_stmts(visitor, &program.body)
}

pub fn walk_stmts<V: Visit + ?Sized>(visitor: &mut V, stmts: &[Stmt]) -> Result<()> {
    for stmt in stmts {
        visitor.visit_stmt(stmt)?;
    }
    Ok(())
}

fn walk_var_decl<V: Visit + ?Sized>(visitor: &mut V, decl: &VarDecl) -> Result<()> {
    for declarator in &decl.declarations {
        if let Some(init) = &declarator.init {
            visitor.visit_expr(init)?;
        }
    }
    Ok(())
}

pub fn walk_stmt<V: Visit + ?Sized>(visitor: &mut V, stmt: &Stmt) -> Result<()> {
    match stmt {
        Stmt::Expr(expr) | Stmt::Throw(expr) => visitor.visit_expr(expr),
        Stmt::Var(decl) => walk_var_decl(visitor, decl),
        Stmt::Function(func) => visitor.visit_function(func),
        Stmt::Class(class) => walk_class(visitor, class),
        Stmt::Return(argument) => match argument {
            Some(argument) => visitor.visit_expr(argument),
            None => Ok(()),
        },
        Stmt::If {
            test,
            consequent,
            alternate,
        } => {
            visitor.visit_expr(test)?;
            visitor.visit_stmt(consequent)?;
            if let Some(alternate) = alternate {
                visitor.visit_stmt(alternate)?;
            }
            Ok(())
        }
        Stmt::Block(body) => walk_stmts(visitor, body),
        Stmt::Switch {
            discriminant,
            cases,
        } => {
            visitor.visit_expr(discriminant)?;
            for case in cases {
                if let Some(test) = &case.test {
                    visitor.visit_expr(test)?;
                }
                walk_stmts(visitor, &case.consequent)?;
            }
            Ok(())
        }
        Stmt::While { test, body } | Stmt::DoWhile { body, test } => {
            visitor.visit_expr(test)?;
            visitor.visit_stmt(body)
        }
        Stmt::For {
            init,
            test,
            update,
            body,
        } => {
            match init {
                Some(ForInit::Var(decl)) => walk_var_decl(visitor, decl)?,
                Some(ForInit::Expr(expr)) => visitor.visit_expr(expr)?,
                None => {}
            }
            if let Some(test) = test {
                visitor.visit_expr(test)?;
            }
            if let Some(update) = update {
                visitor.visit_expr(update)?;
            }
            visitor.visit_stmt(body)
        }
        Stmt::Labeled(labeled) => visitor.visit_stmt(&labeled.body),
        Stmt::Try {
            block,
            handler,
            finalizer,
        } => {
            walk_stmts(visitor, block)?;
            if let Some(handler) = handler {
                walk_stmts(visitor, &handler.body)?;
            }
            if let Some(finalizer) = finalizer {
                walk_stmts(visitor, finalizer)?;
            }
            Ok(())
        }
        Stmt::Export { declaration, .. } => visitor.visit_stmt(declaration),
        Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty => Ok(()),
    }
}

/// Methods are visited as functions
pub fn walk_class<V: Visit + ?Sized>(visitor: &mut V, class: &Class) -> Result<()> {
    for method in &class.methods {
        visitor.visit_function(&method.function)?;
    }
    Ok(())
}

pub fn walk_function<V: Visit + ?Sized>(visitor: &mut V, func: &Function) -> Result<()> {
    match &func.body {
        FunctionBody::Block(body) => walk_stmts(visitor, body),
        FunctionBody::Expr(expr) => visitor.visit_expr(expr),
    }
}

pub fn walk_expr<V: Visit + ?Sized>(visitor: &mut V, expr: &Expr) -> Result<()> {
    match expr {
        Expr::Ident(_)
        | Expr::Number { .. }
        | Expr::Str { .. }
        | Expr::Bool(_)
        | Expr::Null
        | Expr::This => Ok(()),
        Expr::Array(elements) | Expr::Sequence(elements) => {
            for element in elements {
                visitor.visit_expr(element)?;
            }
            Ok(())
        }
        Expr::Object(properties) => {
            for property in properties {
                visitor.visit_expr(&property.value)?;
            }
            Ok(())
        }
        Expr::Function(func) => visitor.visit_function(func),
        Expr::Class(class) => walk_class(visitor, class),
        Expr::Unary { argument, .. } | Expr::Update { argument, .. } | Expr::Await(argument) => {
            visitor.visit_expr(argument)
        }
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            visitor.visit_expr(left)?;
            visitor.visit_expr(right)
        }
        Expr::Assign { target, value, .. } => {
            visitor.visit_expr(target)?;
            visitor.visit_expr(value)
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            visitor.visit_expr(test)?;
            visitor.visit_expr(consequent)?;
            visitor.visit_expr(alternate)
        }
        Expr::Call { callee, arguments } | Expr::New { callee, arguments } => {
            visitor.visit_expr(callee)?;
            for argument in arguments {
                visitor.visit_expr(argument)?;
            }
            Ok(())
        }
        Expr::Member { object, property } => {
            visitor.visit_expr(object)?;
            match property {
                MemberProp::Computed(property) => visitor.visit_expr(property),
                MemberProp::Ident(_) => Ok(()),
            }
        }
        Expr::Yield(argument) => match argument {
            Some(argument) => visitor.visit_expr(argument),
            None => Ok(()),
        },
    }
}

// ── Exclusive traversal ───────────────────────────────────

pub trait VisitMut {
    /// Every statement list: program body, blocks, function bodies,
    /// try/catch/finally bodies, switch cases
    fn visit_stmts(&mut self, stmts: &mut Vec<Stmt>) -> Result<()> {
        walk_stmts_mut(self, stmts)
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt) -> Result<()> {
        walk_stmt_mut(self, stmt)
    }

    fn visit_expr(&mut self, expr: &mut Expr) -> Result<()> {
        walk_expr_mut(self, expr)
    }

    fn visit_function(&mut self, func: &mut Function) -> Result<()> {
        walk_function_mut(self, func)
    }
}

pub fn walk_stmts_mut<V: VisitMut + ?Sized>(visitor: &mut V, stmts: &mut Vec<Stmt>) -> Result<()> {
    for stmt in stmts.iter_mut() {
        visitor.visit_stmt(stmt)?;
    }
    Ok(())
}

fn walk_var_decl_mut<V: VisitMut + ?Sized>(visitor: &mut V, decl: &mut VarDecl) -> Result<()> {
    for declarator in &mut decl.declarations {
        if let Some(init) = &mut declarator.init {
            visitor.visit_expr(init)?;
        }
    }
    Ok(())
}

pub fn walk_stmt_mut<V: VisitMut + ?Sized>(visitor: &mut V, stmt: &mut Stmt) -> Result<()> {
    match stmt {
        Stmt::Expr(expr) | Stmt::Throw(expr) => visitor.visit_expr(expr),
        Stmt::Var(decl) => walk_var_decl_mut(visitor, decl),
        Stmt::Function(func) => visitor.visit_function(func),
        Stmt::Class(class) => walk_class_mut(visitor, class),
        Stmt::Return(argument) => match argument {
            Some(argument) => visitor.visit_expr(argument),
            None => Ok(()),
        },
        Stmt::If {
            test,
            consequent,
            alternate,
        } => {
            visitor.visit_expr(test)?;
            visitor.visit_stmt(consequent)?;
            if let Some(alternate) = alternate {
                visitor.visit_stmt(alternate)?;
            }
            Ok(())
        }
        Stmt::Block(body) => visitor.visit_stmts(body),
        Stmt::Switch {
            discriminant,
            cases,
        } => {
            visitor.visit_expr(discriminant)?;
            for case in cases {
                if let Some(test) = &mut case.test {
                    visitor.visit_expr(test)?;
                }
                visitor.visit_stmts(&mut case.consequent)?;
            }
            Ok(())
        }
        Stmt::While { test, body } | Stmt::DoWhile { body, test } => {
            visitor.visit_expr(test)?;
            visitor.visit_stmt(body)
        }
        Stmt::For {
            init,
            test,
            update,
            body,
        } => {
            match init {
                Some(ForInit::Var(decl)) => walk_var_decl_mut(visitor, decl)?,
                Some(ForInit::Expr(expr)) => visitor.visit_expr(expr)?,
                None => {}
            }
            if let Some(test) = test {
                visitor.visit_expr(test)?;
            }
            if let Some(update) = update {
                visitor.visit_expr(update)?;
            }
            visitor.visit_stmt(body)
        }
        Stmt::Labeled(labeled) => visitor.visit_stmt(&mut labeled.body),
        Stmt::Try {
            block,
            handler,
            finalizer,
        } => {
            visitor.visit_stmts(block)?;
            if let Some(handler) = handler {
                visitor.visit_stmts(&mut handler.body)?;
            }
            if let Some(finalizer) = finalizer {
                visitor.visit_stmts(finalizer)?;
            }
            Ok(())
        }
        Stmt::Export { declaration, .. } => visitor.visit_stmt(declaration),
        Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty => Ok(()),
    }
}

pub fn walk_class_mut<V: VisitMut + ?Sized>(visitor: &mut V, class: &mut Class) -> Result<()> {
    for method in &mut class.methods {
        visitor.visit_function(&mut method.function)?;
    }
    Ok(())
}

pub fn walk_function_mut<V: VisitMut + ?Sized>(visitor: &mut V, func: &mut Function) -> Result<()> {
    match &mut func.body {
        FunctionBody::Block(body) => visitor.visit_stmts(body),
        FunctionBody::Expr(expr) => visitor.visit_expr(expr),
    }
}

pub fn walk_expr_mut<V: VisitMut + ?Sized>(visitor: &mut V, expr: &mut Expr) -> Result<()> {
    match expr {
        Expr::Ident(_)
        | Expr::Number { .. }
        | Expr::Str { .. }
        | Expr::Bool(_)
        | Expr::Null
        | Expr::This => Ok(()),
        Expr::Array(elements) | Expr::Sequence(elements) => {
            for element in elements {
                visitor.visit_expr(element)?;
            }
            Ok(())
        }
        Expr::Object(properties) => {
            for property in properties {
                visitor.visit_expr(&mut property.value)?;
            }
            Ok(())
        }
        Expr::Function(func) => visitor.visit_function(func),
        Expr::Class(class) => walk_class_mut(visitor, class),
        Expr::Unary { argument, .. } | Expr::Update { argument, .. } | Expr::Await(argument) => {
            visitor.visit_expr(argument)
        }
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            visitor.visit_expr(left)?;
            visitor.visit_expr(right)
        }
        Expr::Assign { target, value, .. } => {
            visitor.visit_expr(target)?;
            visitor.visit_expr(value)
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            visitor.visit_expr(test)?;
            visitor.visit_expr(consequent)?;
            visitor.visit_expr(alternate)
        }
        Expr::Call { callee, arguments } | Expr::New { callee, arguments } => {
            visitor.visit_expr(callee)?;
            for argument in arguments {
                visitor.visit_expr(argument)?;
            }
            Ok(())
        }
        Expr::Member { object, property } => {
            visitor.visit_expr(object)?;
            match property {
                MemberProp::Computed(property) => visitor.visit_expr(property),
                MemberProp::Ident(_) => Ok(()),
            }
        }
        Expr::Yield(argument) => match argument {
            Some(argument) => visitor.visit_expr(argument),
            None => Ok(()),
        },
    }
}
