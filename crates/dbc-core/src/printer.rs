//! Printer — renders a syntax tree back to source text
//!
//! Produces deterministic output with:
//! - 2-space indentation
//! - One statement per line
//! - Parentheses derived from operator precedence, never from the source
//! - String and number literals as they were written
//!
//! `expr_to_string` is also what default contract messages are built from.

use crate::parser::ast::*;

// ── Public API ─────────────────────────────────────────────

/// Render a whole program
pub fn program_to_string(program: &Program) -> String {
    let mut printer = Printer::default();
    for stmt in &program.body {
        printer.statement(stmt);
    }
    printer.out
}

/// Render a single statement (multi-line for compound statements)
pub fn stmt_to_string(stmt: &Stmt) -> String {
    let mut printer = Printer::default();
    printer.statement_inline(stmt);
    printer.out
}

/// Render an expression on one line (nested function bodies excepted)
pub fn expr_to_string(expr: &Expr) -> String {
    let mut printer = Printer::default();
    printer.expr(expr, 0);
    printer.out
}

/// Number formatting as the host language prints numeric literals
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "Infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if value == 0.0 {
        "0".to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

// ── Precedence ─────────────────────────────────────────────

const SEQUENCE: u8 = 1;
const ASSIGNMENT: u8 = 2;
const CONDITIONAL: u8 = 3;
const UNARY: u8 = 12;
const POSTFIX: u8 = 13;
const CALL: u8 = 14;
const PRIMARY: u8 = 15;

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Sequence(_) => SEQUENCE,
        Expr::Assign { .. } | Expr::Yield(_) => ASSIGNMENT,
        Expr::Function(func) if func.is_arrow => ASSIGNMENT,
        Expr::Conditional { .. } => CONDITIONAL,
        Expr::Logical { op, .. } => op.precedence(),
        Expr::Binary { op, .. } => op.precedence(),
        Expr::Unary { .. } | Expr::Await(_) => UNARY,
        Expr::Update { prefix: true, .. } => UNARY,
        Expr::Update { prefix: false, .. } => POSTFIX,
        Expr::Number { value, .. } if value.is_sign_negative() && *value != 0.0 => UNARY,
        Expr::Call { .. } | Expr::New { .. } | Expr::Member { .. } => CALL,
        _ => PRIMARY,
    }
}

/// Whether an expression statement would be misread as a block or declaration
fn starts_ambiguously(expr: &Expr) -> bool {
    match expr {
        Expr::Object(_) | Expr::Class(_) => true,
        Expr::Function(func) => !func.is_arrow,
        Expr::Binary { left, .. } | Expr::Logical { left, .. } => starts_ambiguously(left),
        Expr::Assign { target, .. } => starts_ambiguously(target),
        Expr::Conditional { test, .. } => starts_ambiguously(test),
        Expr::Call { callee, .. } => starts_ambiguously(callee),
        Expr::Member { object, .. } => starts_ambiguously(object),
        Expr::Update { prefix: false, argument, .. } => starts_ambiguously(argument),
        Expr::Sequence(parts) => parts.first().is_some_and(starts_ambiguously),
        _ => false,
    }
}

fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn quote_string(value: &str, quote: Quote) -> String {
    let delimiter = quote.as_char();
    let mut out = String::with_capacity(value.len() + 2);
    out.push(delimiter);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

// ── Printer ────────────────────────────────────────────────

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn write(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    /// Indented statement followed by a newline
    fn statement(&mut self, stmt: &Stmt) {
        self.write_indent();
        self.statement_inline(stmt);
        self.out.push('\n');
    }

    fn block(&mut self, body: &[Stmt]) {
        if body.is_empty() {
            self.write("{}");
            return;
        }
        self.write("{\n");
        self.indent += 1;
        for stmt in body {
            self.statement(stmt);
        }
        self.indent -= 1;
        self.write_indent();
        self.write("}");
    }

    /// Body of if/while/for: braces stay on the same line
    fn clause(&mut self, body: &Stmt) {
        if let Stmt::Block(stmts) = body {
            self.write(" ");
            self.block(stmts);
        } else {
            self.out.push('\n');
            self.indent += 1;
            self.write_indent();
            self.statement_inline(body);
            self.indent -= 1;
        }
    }

    /// Separator before `else` / `while` following a clause
    fn after_clause(&mut self, body: &Stmt) {
        if matches!(body, Stmt::Block(_)) {
            self.write(" ");
        } else {
            self.out.push('\n');
            self.write_indent();
        }
    }

    fn var_decl(&mut self, decl: &VarDecl) {
        self.write(decl.kind.as_str());
        self.write(" ");
        for (i, declarator) in decl.declarations.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(&declarator.name);
            if let Some(init) = &declarator.init {
                self.write(" = ");
                self.expr(init, ASSIGNMENT);
            }
        }
    }

    fn statement_inline(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => {
                if starts_ambiguously(expr) {
                    self.write("(");
                    self.expr(expr, 0);
                    self.write(")");
                } else {
                    self.expr(expr, 0);
                }
                self.write(";");
            }
            Stmt::Var(decl) => {
                self.var_decl(decl);
                self.write(";");
            }
            Stmt::Function(func) => self.function(func),
            Stmt::Class(class) => self.class(class),
            Stmt::Return(argument) => {
                self.write("return");
                if let Some(argument) = argument {
                    self.write(" ");
                    self.expr(argument, 0);
                }
                self.write(";");
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                self.write("if (");
                self.expr(test, 0);
                self.write(")");
                self.clause(consequent);
                if let Some(alternate) = alternate {
                    self.after_clause(consequent);
                    self.write("else");
                    if matches!(**alternate, Stmt::If { .. }) {
                        self.write(" ");
                        self.statement_inline(alternate);
                    } else {
                        self.clause(alternate);
                    }
                }
            }
            Stmt::Block(body) => self.block(body),
            Stmt::While { test, body } => {
                self.write("while (");
                self.expr(test, 0);
                self.write(")");
                self.clause(body);
            }
            Stmt::DoWhile { body, test } => {
                self.write("do");
                self.clause(body);
                self.after_clause(body);
                self.write("while (");
                self.expr(test, 0);
                self.write(");");
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                self.write("for (");
                match init {
                    Some(ForInit::Var(decl)) => self.var_decl(decl),
                    Some(ForInit::Expr(expr)) => self.expr(expr, 0),
                    None => {}
                }
                self.write(";");
                if let Some(test) = test {
                    self.write(" ");
                    self.expr(test, 0);
                }
                self.write(";");
                if let Some(update) = update {
                    self.write(" ");
                    self.expr(update, 0);
                }
                self.write(")");
                self.clause(body);
            }
            Stmt::Switch {
                discriminant,
                cases,
            } => {
                self.write("switch (");
                self.expr(discriminant, 0);
                self.write(") {\n");
                self.indent += 1;
                for case in cases {
                    self.write_indent();
                    match &case.test {
                        Some(test) => {
                            self.write("case ");
                            self.expr(test, 0);
                            self.write(":\n");
                        }
                        None => self.write("default:\n"),
                    }
                    self.indent += 1;
                    for stmt in &case.consequent {
                        self.statement(stmt);
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.write_indent();
                self.write("}");
            }
            Stmt::Labeled(labeled) => {
                self.write(&labeled.label);
                self.write(": ");
                self.statement_inline(&labeled.body);
            }
            Stmt::Throw(argument) => {
                self.write("throw ");
                self.expr(argument, 0);
                self.write(";");
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                self.write("try ");
                self.block(block);
                if let Some(handler) = handler {
                    self.write(" catch ");
                    if let Some(param) = &handler.param {
                        self.write("(");
                        self.write(param);
                        self.write(") ");
                    }
                    self.block(&handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.write(" finally ");
                    self.block(finalizer);
                }
            }
            Stmt::Break(label) | Stmt::Continue(label) => {
                self.write(if matches!(stmt, Stmt::Break(_)) {
                    "break"
                } else {
                    "continue"
                });
                if let Some(label) = label {
                    self.write(" ");
                    self.write(label);
                }
                self.write(";");
            }
            Stmt::Export {
                default,
                declaration,
            } => {
                self.write(if *default { "export default " } else { "export " });
                self.statement_inline(declaration);
            }
            Stmt::Empty => self.write(";"),
        }
    }

    fn params(&mut self, params: &[String]) {
        self.write("(");
        self.write(&params.join(", "));
        self.write(")");
    }

    fn function(&mut self, func: &Function) {
        if func.is_async {
            self.write("async ");
        }
        if func.is_arrow {
            self.params(&func.params);
            self.write(" => ");
            match &func.body {
                FunctionBody::Block(body) => self.block(body),
                FunctionBody::Expr(expr) if matches!(**expr, Expr::Object(_)) => {
                    self.write("(");
                    self.expr(expr, 0);
                    self.write(")");
                }
                FunctionBody::Expr(expr) => self.expr(expr, ASSIGNMENT),
            }
            return;
        }
        self.write("function");
        if func.is_generator {
            self.write("*");
        }
        if let Some(id) = &func.id {
            self.write(" ");
            self.write(id);
        }
        self.function_tail(func);
    }

    /// Parameters and block body
    fn function_tail(&mut self, func: &Function) {
        self.params(&func.params);
        self.write(" ");
        match &func.body {
            FunctionBody::Block(body) => self.block(body),
            FunctionBody::Expr(expr) => {
                // Only arrows carry expression bodies; print as a block.
                self.write("{ return ");
                self.expr(expr, 0);
                self.write("; }");
            }
        }
    }

    fn property_key(&mut self, key: &str) {
        if is_identifier_name(key) {
            self.write(key);
        } else {
            self.write(&quote_string(key, Quote::Double));
        }
    }

    /// `[async] [*]key(params) { body }`
    fn method(&mut self, key: &str, func: &Function) {
        if func.is_async {
            self.write("async ");
        }
        if func.is_generator {
            self.write("*");
        }
        self.property_key(key);
        self.function_tail(func);
    }

    fn class(&mut self, class: &Class) {
        self.write("class ");
        if let Some(id) = &class.id {
            self.write(id);
            self.write(" ");
        }
        if class.methods.is_empty() {
            self.write("{}");
            return;
        }
        self.write("{\n");
        self.indent += 1;
        for method in &class.methods {
            self.write_indent();
            if method.is_static {
                self.write("static ");
            }
            self.method(&method.key, &method.function);
            self.out.push('\n');
        }
        self.indent -= 1;
        self.write_indent();
        self.write("}");
    }

    fn arguments(&mut self, arguments: &[Expr]) {
        self.write("(");
        for (i, argument) in arguments.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.expr(argument, ASSIGNMENT);
        }
        self.write(")");
    }

    /// Print `expr`, parenthesized when it binds looser than `min`
    fn expr(&mut self, expr: &Expr, min: u8) {
        let wrap = precedence(expr) < min;
        if wrap {
            self.write("(");
        }
        self.expr_unwrapped(expr);
        if wrap {
            self.write(")");
        }
    }

    fn logical_operand(&mut self, parent: LogicalOp, operand: &Expr, min: u8) {
        // `??` cannot be mixed with `&&`/`||` without parentheses
        let mixes_nullish = matches!(operand, Expr::Logical { op, .. }
            if (*op == LogicalOp::Nullish) != (parent == LogicalOp::Nullish));
        if mixes_nullish {
            self.write("(");
            self.expr(operand, 0);
            self.write(")");
        } else {
            self.expr(operand, min);
        }
    }

    fn expr_unwrapped(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(name) => self.write(name),
            Expr::Number { raw: Some(raw), .. } => self.write(raw),
            Expr::Number { value, raw: None } => self.write(&format_number(*value)),
            Expr::This => self.write("this"),
            Expr::Class(class) => self.class(class),
            Expr::Str { value, quote } => self.write(&quote_string(value, *quote)),
            Expr::Bool(value) => self.write(if *value { "true" } else { "false" }),
            Expr::Null => self.write("null"),
            Expr::Array(elements) => {
                self.write("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.expr(element, ASSIGNMENT);
                }
                self.write("]");
            }
            Expr::Object(properties) => {
                if properties.is_empty() {
                    self.write("{}");
                    return;
                }
                self.write("{ ");
                for (i, property) in properties.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    if property.shorthand {
                        self.write(&property.key);
                        continue;
                    }
                    if let (true, Expr::Function(func)) = (property.method, &property.value) {
                        self.method(&property.key, func);
                        continue;
                    }
                    self.property_key(&property.key);
                    self.write(": ");
                    self.expr(&property.value, ASSIGNMENT);
                }
                self.write(" }");
            }
            Expr::Function(func) => self.function(func),
            Expr::Unary { op, argument } => {
                self.write(op.as_str());
                let needs_space = match op {
                    UnaryOp::Typeof | UnaryOp::Void | UnaryOp::Delete => true,
                    UnaryOp::Minus => matches!(**argument,
                        Expr::Unary { op: UnaryOp::Minus, .. }
                        | Expr::Update { op: UpdateOp::Decrement, prefix: true, .. })
                        || matches!(**argument, Expr::Number { value, .. } if value.is_sign_negative() && value != 0.0),
                    UnaryOp::Plus => matches!(**argument,
                        Expr::Unary { op: UnaryOp::Plus, .. }
                        | Expr::Update { op: UpdateOp::Increment, prefix: true, .. }),
                    UnaryOp::Not | UnaryOp::BitNot => false,
                };
                if needs_space {
                    self.write(" ");
                }
                self.expr(argument, UNARY);
            }
            Expr::Update {
                op,
                prefix,
                argument,
            } => {
                if *prefix {
                    self.write(op.as_str());
                    self.expr(argument, CALL);
                } else {
                    self.expr(argument, CALL);
                    self.write(op.as_str());
                }
            }
            Expr::Binary { op, left, right } => {
                let p = op.precedence();
                let (left_min, right_min) = if *op == BinaryOp::Exp {
                    (POSTFIX, p)
                } else {
                    (p, p + 1)
                };
                self.expr(left, left_min);
                self.write(" ");
                self.write(op.as_str());
                self.write(" ");
                self.expr(right, right_min);
            }
            Expr::Logical { op, left, right } => {
                let p = op.precedence();
                self.logical_operand(*op, left, p);
                self.write(" ");
                self.write(op.as_str());
                self.write(" ");
                self.logical_operand(*op, right, p + 1);
            }
            Expr::Assign { op, target, value } => {
                self.expr(target, CALL);
                self.write(" ");
                self.write(op.as_str());
                self.write(" ");
                self.expr(value, ASSIGNMENT);
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test, CONDITIONAL + 1);
                self.write(" ? ");
                self.expr(consequent, ASSIGNMENT);
                self.write(" : ");
                self.expr(alternate, ASSIGNMENT);
            }
            Expr::Call { callee, arguments } => {
                self.expr(callee, CALL);
                self.arguments(arguments);
            }
            Expr::New { callee, arguments } => {
                self.write("new ");
                if matches!(**callee, Expr::Call { .. }) {
                    self.write("(");
                    self.expr(callee, 0);
                    self.write(")");
                } else {
                    self.expr(callee, CALL);
                }
                self.arguments(arguments);
            }
            Expr::Member { object, property } => {
                self.expr(object, CALL);
                match property {
                    MemberProp::Ident(name) => {
                        self.write(".");
                        self.write(name);
                    }
                    MemberProp::Computed(property) => {
                        self.write("[");
                        self.expr(property, 0);
                        self.write("]");
                    }
                }
            }
            Expr::Sequence(expressions) => {
                for (i, expression) in expressions.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.expr(expression, ASSIGNMENT);
                }
            }
            Expr::Yield(argument) => {
                self.write("yield");
                if let Some(argument) = argument {
                    self.write(" ");
                    self.expr(argument, ASSIGNMENT);
                }
            }
            Expr::Await(argument) => {
                self.write("await ");
                self.expr(argument, UNARY);
            }
        }
    }
}
