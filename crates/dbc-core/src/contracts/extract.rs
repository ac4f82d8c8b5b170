//! Condition extraction and default message synthesis

use crate::parser::ast::{Expr, Stmt};
use crate::printer::expr_to_string;
use crate::{Error, Result};

use super::{ContractKind, ContractSite};

/// One condition of a contract with the message thrown when it fails
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub condition: Expr,
    pub message: Expr,
}

/// Decompose a contract body into clauses, in source order.
///
/// The body is a single expression statement or a block of them.
/// `condition, message` (a two-part sequence) supplies an explicit
/// message; anything else gets a synthesized one.
pub fn extract(kind: ContractKind, site: &ContractSite, body: Stmt) -> Result<Vec<Clause>> {
    let expressions = match body {
        Stmt::Expr(expr) => vec![expr],
        Stmt::Block(stmts) => {
            let mut expressions = Vec::with_capacity(stmts.len());
            for stmt in stmts {
                match stmt {
                    Stmt::Expr(expr) => expressions.push(expr),
                    Stmt::Empty => {}
                    other => return Err(malformed(kind, site, &other)),
                }
            }
            expressions
        }
        other => return Err(malformed(kind, site, &other)),
    };
    Ok(expressions
        .into_iter()
        .map(|expr| clause(kind, site, expr))
        .collect())
}

fn malformed(kind: ContractKind, site: &ContractSite, stmt: &Stmt) -> Error {
    let found = match stmt {
        Stmt::If { .. } => "an if statement",
        Stmt::Switch { .. } => "a switch statement",
        Stmt::While { .. } | Stmt::DoWhile { .. } | Stmt::For { .. } => "a loop",
        Stmt::Labeled(_) => "a labeled statement",
        Stmt::Throw(_) => "a throw statement",
        Stmt::Try { .. } => "a try statement",
        Stmt::Break(_) | Stmt::Continue(_) => "a jump statement",
        Stmt::Export { .. } => "an export",
        Stmt::Block(_) => "a nested block",
        _ => "a statement",
    };
    Error::MalformedContract {
        kind,
        site: site.clone(),
        detail: format!("expected expression statements, found {}", found),
    }
}

fn clause(kind: ContractKind, site: &ContractSite, expr: Expr) -> Clause {
    match expr {
        Expr::Sequence(mut parts) if parts.len() == 2 => {
            let message = parts.remove(1);
            let condition = parts.remove(0);
            Clause { condition, message }
        }
        condition => {
            let message = default_message(kind, site, &condition);
            Clause { condition, message }
        }
    }
}

/// `Function "name" <kind> failed: <condition>`; top-level and anonymous
/// assertions read `Assertion failed: <condition>`
pub fn default_message(kind: ContractKind, site: &ContractSite, condition: &Expr) -> Expr {
    let code = expr_to_string(condition);
    let text = match (&site.function, kind) {
        (Some(name), _) => format!("Function \"{}\" {} failed: {}", name, kind, code),
        (None, ContractKind::Assertion) => format!("Assertion failed: {}", code),
        (None, _) => format!("Function {} failed: {}", kind, code),
    };
    Expr::string(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::parser::tokenizer::Span;

    fn body_of(source: &str) -> Stmt {
        let mut program = parse(source).unwrap();
        match program.body.remove(0) {
            Stmt::Labeled(labeled) => *labeled.body,
            other => panic!("expected a labeled statement, got {:?}", other),
        }
    }

    fn site(function: Option<&str>) -> ContractSite {
        ContractSite::in_function(function, Span::default())
    }

    fn message_text(clause: &Clause) -> String {
        match &clause.message {
            Expr::Str { value, .. } => value.clone(),
            other => panic!("expected string message, got {:?}", other),
        }
    }

    #[test]
    fn test_single_expression_default_message() {
        let clauses = extract(
            ContractKind::Precondition,
            &site(Some("demo")),
            body_of("pre: typeof input === 'string';"),
        )
        .unwrap();
        assert_eq!(clauses.len(), 1);
        assert_eq!(
            message_text(&clauses[0]),
            "Function \"demo\" precondition failed: typeof input === 'string'"
        );
    }

    #[test]
    fn test_block_with_explicit_messages() {
        let clauses = extract(
            ContractKind::Precondition,
            &site(Some("withdraw")),
            body_of("pre: { amount > 0, \"Cannot withdraw\"; typeof amount === 'number'; }"),
        )
        .unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(message_text(&clauses[0]), "Cannot withdraw");
        assert_eq!(
            message_text(&clauses[1]),
            "Function \"withdraw\" precondition failed: typeof amount === 'number'"
        );
    }

    #[test]
    fn test_three_part_sequence_is_a_condition() {
        let clauses = extract(
            ContractKind::Postcondition,
            &site(Some("f")),
            body_of("post: a, b, c;"),
        )
        .unwrap();
        assert!(matches!(clauses[0].condition, Expr::Sequence(ref parts) if parts.len() == 3));
    }

    #[test]
    fn test_assertion_messages_without_function_name() {
        let top = ContractSite::top_level(Span::default());
        let clauses = extract(ContractKind::Assertion, &top, body_of("assert: false;")).unwrap();
        assert_eq!(message_text(&clauses[0]), "Assertion failed: false");

        let clauses =
            extract(ContractKind::Invariant, &site(None), body_of("invariant: x > 0;")).unwrap();
        assert_eq!(message_text(&clauses[0]), "Function invariant failed: x > 0");
    }

    #[test]
    fn test_non_expression_statement_is_malformed() {
        let err = extract(
            ContractKind::Invariant,
            &site(Some("f")),
            body_of("invariant: { if (a) { b; } }"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedContract { .. }));
        assert!(err.to_string().contains("an if statement"));
    }
}
