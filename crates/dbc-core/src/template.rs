//! Snippet templates with named placeholders
//!
//! A template is parsed once and instantiated many times. Placeholders
//! are ordinary identifiers in the snippet; instantiation clones the
//! parsed statements and substitutes each placeholder by its binding.

use std::collections::{BTreeMap, BTreeSet};

use crate::parser::ast::*;
use crate::parser::parse;
use crate::visit::{self, VisitMut};
use crate::{Error, Result};

/// What a placeholder is replaced with
#[derive(Debug, Clone, PartialEq)]
pub enum Replacement {
    /// Replaces an identifier expression
    Expr(Expr),
    /// Replaces an expression statement consisting solely of the placeholder
    Statements(Vec<Stmt>),
    /// Renames the placeholder wherever it appears, binding positions included
    Name(String),
}

pub type Bindings = BTreeMap<&'static str, Replacement>;

#[derive(Debug, Clone)]
pub struct Template {
    body: Vec<Stmt>,
    placeholders: BTreeSet<String>,
}

/// Parse `source` once, remembering which identifiers are placeholders
pub fn compile_template(source: &str, placeholders: &[&str]) -> Result<Template> {
    let program = parse(source)
        .map_err(|e| Error::TemplateError(format!("cannot compile `{}`: {}", source, e)))?;
    Ok(Template {
        body: program.body,
        placeholders: placeholders.iter().map(|p| p.to_string()).collect(),
    })
}

impl Template {
    /// Clone the snippet with every placeholder substituted
    pub fn instantiate(&self, bindings: &Bindings) -> Result<Vec<Stmt>> {
        for placeholder in &self.placeholders {
            if !bindings.contains_key(placeholder.as_str()) {
                return Err(Error::TemplateError(format!(
                    "missing binding for placeholder `{}`",
                    placeholder
                )));
            }
        }
        let mut body = self.body.clone();
        let mut substituter = Substituter {
            placeholders: &self.placeholders,
            bindings,
        };
        substituter.visit_stmts(&mut body)?;
        Ok(body)
    }

    /// Instantiate a template that is exactly one statement
    pub fn instantiate_stmt(&self, bindings: &Bindings) -> Result<Stmt> {
        let mut body = self.instantiate(bindings)?;
        if body.len() != 1 {
            return Err(Error::TemplateError(format!(
                "expected a single statement, template produced {}",
                body.len()
            )));
        }
        Ok(body.remove(0))
    }
}

struct Substituter<'a> {
    placeholders: &'a BTreeSet<String>,
    bindings: &'a Bindings,
}

impl Substituter<'_> {
    fn lookup(&self, name: &str) -> Option<&Replacement> {
        if self.placeholders.contains(name) {
            self.bindings.get(name)
        } else {
            None
        }
    }

    fn rename(&self, name: &mut String) -> Result<()> {
        match self.lookup(name) {
            Some(Replacement::Name(new_name)) => {
                *name = new_name.clone();
                Ok(())
            }
            Some(_) => Err(Error::TemplateError(format!(
                "placeholder `{}` in a binding position needs a name",
                name
            ))),
            None => Ok(()),
        }
    }

    fn rename_decl(&self, decl: &mut VarDecl) -> Result<()> {
        for declarator in &mut decl.declarations {
            self.rename(&mut declarator.name)?;
        }
        Ok(())
    }
}

impl VisitMut for Substituter<'_> {
    fn visit_stmts(&mut self, stmts: &mut Vec<Stmt>) -> Result<()> {
        let mut out = Vec::with_capacity(stmts.len());
        for mut stmt in stmts.drain(..) {
            if let Stmt::Expr(Expr::Ident(name)) = &stmt {
                if let Some(Replacement::Statements(replacement)) = self.lookup(name) {
                    out.extend(replacement.iter().cloned());
                    continue;
                }
            }
            self.visit_stmt(&mut stmt)?;
            out.push(stmt);
        }
        *stmts = out;
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt) -> Result<()> {
        match stmt {
            Stmt::Var(decl)
            | Stmt::For {
                init: Some(ForInit::Var(decl)),
                ..
            } => self.rename_decl(decl)?,
            _ => {}
        }
        visit::walk_stmt_mut(self, stmt)
    }

    fn visit_expr(&mut self, expr: &mut Expr) -> Result<()> {
        if let Expr::Ident(name) = expr {
            return match self.lookup(name) {
                Some(Replacement::Expr(replacement)) => {
                    *expr = replacement.clone();
                    Ok(())
                }
                Some(Replacement::Name(new_name)) => {
                    *name = new_name.clone();
                    Ok(())
                }
                Some(Replacement::Statements(_)) => Err(Error::TemplateError(format!(
                    "placeholder `{}` bound to statements used as an expression",
                    name
                ))),
                None => Ok(()),
            };
        }
        if let Expr::Object(properties) = expr {
            for property in properties.iter_mut() {
                if property.shorthand && self.lookup(&property.key).is_some() {
                    property.shorthand = false;
                }
            }
        }
        visit::walk_expr_mut(self, expr)
    }

    fn visit_function(&mut self, func: &mut Function) -> Result<()> {
        if let Some(id) = &mut func.id {
            self.rename(id)?;
        }
        for param in &mut func.params {
            self.rename(param)?;
        }
        visit::walk_function_mut(self, func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;
    use crate::printer::program_to_string;

    fn print(body: Vec<Stmt>) -> String {
        program_to_string(&Program { body })
    }

    #[test]
    fn test_expression_placeholders() {
        let template =
            compile_template("if (!CONDITION) { throw new Error(MESSAGE); }", &["CONDITION", "MESSAGE"])
                .unwrap();
        let mut bindings = Bindings::new();
        bindings.insert("CONDITION", Replacement::Expr(parse_expression("a > 0").unwrap()));
        bindings.insert("MESSAGE", Replacement::Expr(Expr::string("bad")));
        let out = print(template.instantiate(&bindings).unwrap());
        assert_eq!(out, "if (!(a > 0)) {\n  throw new Error(\"bad\");\n}\n");
    }

    #[test]
    fn test_statement_splice_and_rename() {
        let template = compile_template(
            "const ID = (SUBJECT) => { BODY; return SUBJECT; };",
            &["ID", "SUBJECT", "BODY"],
        )
        .unwrap();
        let mut bindings = Bindings::new();
        bindings.insert("ID", Replacement::Name("_check".into()));
        bindings.insert("SUBJECT", Replacement::Name("it".into()));
        bindings.insert(
            "BODY",
            Replacement::Statements(parse("first(); second();").unwrap().body),
        );
        let out = print(template.instantiate(&bindings).unwrap());
        assert_eq!(
            out,
            "const _check = (it) => {\n  first();\n  second();\n  return it;\n};\n"
        );
    }

    #[test]
    fn test_each_instantiation_is_independent() {
        let template = compile_template("X;", &["X"]).unwrap();
        let mut bindings = Bindings::new();
        bindings.insert("X", Replacement::Expr(Expr::number(1.0)));
        let first = template.instantiate(&bindings).unwrap();
        bindings.insert("X", Replacement::Expr(Expr::number(2.0)));
        let second = template.instantiate(&bindings).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_missing_binding_is_an_error() {
        let template = compile_template("X;", &["X"]).unwrap();
        let err = template.instantiate(&Bindings::new()).unwrap_err();
        assert!(matches!(err, Error::TemplateError(_)));
    }

    #[test]
    fn test_statements_in_expression_position_is_an_error() {
        let template = compile_template("f(X);", &["X"]).unwrap();
        let mut bindings = Bindings::new();
        bindings.insert("X", Replacement::Statements(vec![]));
        assert!(template.instantiate(&bindings).is_err());
    }

    #[test]
    fn test_instantiate_stmt_requires_one_statement() {
        let template = compile_template("a; b;", &[]).unwrap();
        assert!(template.instantiate_stmt(&Bindings::new()).is_err());
    }
}
