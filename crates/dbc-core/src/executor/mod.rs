//! Reference evaluator — runs lowered programs
//!
//! A tree-walking interpreter for the supported subset. Its job is to
//! make the runtime-visible artifact of lowering observable: which guard
//! throws, and with what message.
//!
//! # Semantics
//!
//! Values, coercions and control flow follow the host language for the
//! subset the parser accepts. Thrown values unwind through
//! `try`/`catch`/`finally`; a throw that escapes [`Runtime::call`] or
//! [`Runtime::load`] becomes [`Error::Uncaught`]. Constructs that parse
//! but are not executable (`async`, generators, `instanceof`, `new` on
//! a plain function) abort with [`Error::ExecutionError`] and cannot be
//! caught by the program.
//!
//! Classes construct plain objects that carry their instance methods as
//! own properties; there is no prototype chain.
//!
//! # Stack
//!
//! Every nested program call costs several native frames. Callers that
//! may run deep recursion evaluate inside [`with_eval_stack`], which
//! gives the call-depth bound room to trigger before the native stack
//! runs out.

mod builtins;
pub mod ops;
mod scope;
pub mod value;

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::parser::ast::*;
use crate::printer::expr_to_string;
use crate::{Error, Result};

use ops::OpError;
use scope::{Env, Frame};
pub use value::{Builtin, ClassValue, Closure, Value};

/// Nested call limit before a RangeError is thrown
const MAX_CALL_DEPTH: usize = 128;

/// Longest array an index or `length` write may produce
const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// Native stack for evaluation threads; covers [`MAX_CALL_DEPTH`]
/// nested calls in unoptimized builds with a wide margin
pub const EVAL_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Run `task` on its own thread with [`EVAL_STACK_SIZE`] of stack.
///
/// [`Runtime`] is not `Send`: load and call inside `task`, and return
/// owned results (JSON) out of it.
pub fn with_eval_stack<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let handle = std::thread::Builder::new()
        .name("dbc-eval".to_string())
        .stack_size(EVAL_STACK_SIZE)
        .spawn(task)?;
    handle
        .join()
        .map_err(|_| Error::ExecutionError("evaluation thread panicked".to_string()))?
}

// ── Abrupt completion ─────────────────────────────────────

/// Non-local exits that unwind through expression evaluation
pub(crate) enum Abrupt {
    /// A thrown program value, catchable by `try`
    Throw(Value),
    /// An evaluator failure, never catchable
    Fatal(Error),
}

impl Abrupt {
    fn into_error(self) -> Error {
        match self {
            Abrupt::Throw(value) => Error::Uncaught {
                message: value.thrown_message(),
            },
            Abrupt::Fatal(error) => error,
        }
    }
}

impl From<Error> for Abrupt {
    fn from(error: Error) -> Self {
        Abrupt::Fatal(error)
    }
}

impl From<OpError> for Abrupt {
    fn from(error: OpError) -> Self {
        match error {
            OpError::Type(message) => type_error(message),
            OpError::Unsupported(what) => unsupported(what),
        }
    }
}

pub(crate) type Eval<T> = std::result::Result<T, Abrupt>;

/// `{ name, message }`, the shape of every error the evaluator throws
pub(crate) fn error_object(name: &str, message: impl Into<String>) -> Value {
    let mut properties = BTreeMap::new();
    properties.insert("name".to_string(), Value::string(name));
    properties.insert("message".to_string(), Value::String(message.into()));
    Value::object(properties)
}

fn type_error(message: impl Into<String>) -> Abrupt {
    Abrupt::Throw(error_object("TypeError", message))
}

fn reference_error(name: &str) -> Abrupt {
    Abrupt::Throw(error_object("ReferenceError", format!("{} is not defined", name)))
}

fn range_error(message: &str) -> Abrupt {
    Abrupt::Throw(error_object("RangeError", message))
}

fn unsupported(what: &str) -> Abrupt {
    Abrupt::Fatal(Error::ExecutionError(format!("{} is not supported", what)))
}

/// Statement completion
enum Completion {
    Normal,
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
}

// ── Runtime ───────────────────────────────────────────────

/// A loaded program: global bindings plus its default export
pub struct Runtime {
    globals: Env,
    default_export: RefCell<Option<Value>>,
    depth: Cell<usize>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// An empty runtime with only the host globals
    pub fn new() -> Self {
        let globals = Frame::global();
        globals.declare("undefined", Value::Undefined);
        globals.declare("this", Value::Undefined);
        globals.declare("NaN", Value::Number(f64::NAN));
        globals.declare("Infinity", Value::Number(f64::INFINITY));
        globals.declare("Error", Value::Builtin(Rc::new(Builtin::Error)));
        globals.declare("Math", builtins::math());
        Runtime {
            globals,
            default_export: RefCell::new(None),
            depth: Cell::new(0),
        }
    }

    /// Execute a program's top level
    pub fn load(program: &Program) -> Result<Self> {
        let runtime = Runtime::new();
        let globals = Rc::clone(&runtime.globals);
        match runtime.exec_stmts(&program.body, &globals) {
            Ok(Completion::Normal) => Ok(runtime),
            Ok(_) => Err(Error::ExecutionError(
                "return, break or continue at top level".to_string(),
            )),
            Err(abrupt) => Err(abrupt.into_error()),
        }
    }

    /// Call a global function, or the default export when `name` is `"default"`
    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        let callee = if name == "default" {
            self.default_export()
                .ok_or_else(|| Error::ExecutionError("program has no default export".to_string()))?
        } else {
            self.global(name)
                .ok_or_else(|| Error::ExecutionError(format!("no global named `{}`", name)))?
        };
        tracing::trace!(function = name, args = args.len(), "runtime call");
        self.call_value(&callee, args, Value::Undefined)
            .map_err(Abrupt::into_error)
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.lookup(name)
    }

    pub fn default_export(&self) -> Option<Value> {
        self.default_export.borrow().clone()
    }

    // ── Statements ────────────────────────────────────────

    fn closure(&self, func: &Function, env: &Env) -> Value {
        Value::Function(Rc::new(Closure {
            func: Rc::new(func.clone()),
            env: Rc::clone(env),
        }))
    }

    /// Evaluate a class definition; a named class sees its own binding
    fn class_value(&self, class: &Class, env: &Env) -> Value {
        let class_env = Frame::block(env);
        let statics: BTreeMap<String, Value> = class
            .methods
            .iter()
            .filter(|method| method.is_static)
            .map(|method| (method.key.clone(), self.closure(&method.function, &class_env)))
            .collect();
        let value = Value::Class(Rc::new(ClassValue {
            class: Rc::new(class.clone()),
            env: Rc::clone(&class_env),
            statics: Rc::new(RefCell::new(statics)),
        }));
        if let Some(id) = &class.id {
            class_env.declare(id, value.clone());
        }
        value
    }

    /// Bind the function declarations of a statement list up front
    fn hoist(&self, stmts: &[Stmt], env: &Env) {
        for stmt in stmts {
            let func = match stmt {
                Stmt::Function(func) => func,
                Stmt::Export { declaration, .. } => match declaration.as_ref() {
                    Stmt::Function(func) => func,
                    _ => continue,
                },
                _ => continue,
            };
            if let Some(id) = &func.id {
                env.declare(id, self.closure(func, env));
            }
        }
    }

    fn exec_stmts(&self, stmts: &[Stmt], env: &Env) -> Eval<Completion> {
        self.hoist(stmts, env);
        for stmt in stmts {
            match self.exec_stmt(stmt, env)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn declare(&self, decl: &VarDecl, env: &Env) -> Eval<()> {
        for declarator in &decl.declarations {
            let value = match &declarator.init {
                Some(init) => self.eval(init, env)?,
                None => Value::Undefined,
            };
            match decl.kind {
                VarKind::Var => env.declare_var(&declarator.name, value),
                VarKind::Let | VarKind::Const => env.declare(&declarator.name, value),
            }
        }
        Ok(())
    }

    fn exec_stmt(&self, stmt: &Stmt, env: &Env) -> Eval<Completion> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
                Ok(Completion::Normal)
            }
            Stmt::Var(decl) => {
                self.declare(decl, env)?;
                Ok(Completion::Normal)
            }
            // hoisted
            Stmt::Function(_) => Ok(Completion::Normal),
            Stmt::Class(class) => {
                let value = self.class_value(class, env);
                if let Some(id) = &class.id {
                    env.declare(id, value);
                }
                Ok(Completion::Normal)
            }
            Stmt::Return(argument) => Ok(Completion::Return(match argument {
                Some(argument) => self.eval(argument, env)?,
                None => Value::Undefined,
            })),
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, env)?.is_truthy() {
                    self.exec_stmt(consequent, env)
                } else if let Some(alternate) = alternate {
                    self.exec_stmt(alternate, env)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Stmt::Block(body) => self.exec_stmts(body, &Frame::block(env)),
            Stmt::While { .. } | Stmt::DoWhile { .. } | Stmt::For { .. } => {
                self.exec_loop(stmt, env, &[])
            }
            Stmt::Switch {
                discriminant,
                cases,
            } => self.exec_switch(discriminant, cases, env),
            Stmt::Labeled(labeled) => self.exec_labeled(labeled, env),
            Stmt::Throw(argument) => Err(Abrupt::Throw(self.eval(argument, env)?)),
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => self.exec_try(block, handler.as_ref(), finalizer.as_deref(), env),
            Stmt::Break(label) => Ok(Completion::Break(label.clone())),
            Stmt::Continue(label) => Ok(Completion::Continue(label.clone())),
            Stmt::Export {
                default,
                declaration,
            } => {
                if !*default {
                    return self.exec_stmt(declaration, env);
                }
                let value = match declaration.as_ref() {
                    Stmt::Function(func) => match &func.id {
                        Some(id) => env.lookup(id).unwrap_or(Value::Undefined),
                        None => self.closure(func, env),
                    },
                    Stmt::Class(class) => {
                        let value = self.class_value(class, env);
                        if let Some(id) = &class.id {
                            env.declare(id, value.clone());
                        }
                        value
                    }
                    Stmt::Expr(expr) => self.eval(expr, env)?,
                    _ => return Err(unsupported("this form of `export default`")),
                };
                *self.default_export.borrow_mut() = Some(value);
                Ok(Completion::Normal)
            }
            Stmt::Empty => Ok(Completion::Normal),
        }
    }

    fn exec_labeled(&self, labeled: &Labeled, env: &Env) -> Eval<Completion> {
        let mut labels = vec![labeled.label.clone()];
        let mut body = labeled.body.as_ref();
        while let Stmt::Labeled(inner) = body {
            labels.push(inner.label.clone());
            body = inner.body.as_ref();
        }
        let completion = match body {
            Stmt::While { .. } | Stmt::DoWhile { .. } | Stmt::For { .. } => {
                self.exec_loop(body, env, &labels)?
            }
            other => self.exec_stmt(other, env)?,
        };
        Ok(match completion {
            Completion::Break(Some(label)) if labels.contains(&label) => Completion::Normal,
            other => other,
        })
    }

    /// Strict-equality case selection with fall-through; an unlabeled
    /// `break` leaves the switch
    fn exec_switch(&self, discriminant: &Expr, cases: &[SwitchCase], env: &Env) -> Eval<Completion> {
        let value = self.eval(discriminant, env)?;
        let switch_env = Frame::block(env);
        for case in cases {
            self.hoist(&case.consequent, &switch_env);
        }
        let mut start = None;
        for (index, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if ops::strict_equals(&value, &self.eval(test, &switch_env)?) {
                    start = Some(index);
                    break;
                }
            }
        }
        let Some(start) = start.or_else(|| cases.iter().position(|case| case.test.is_none()))
        else {
            return Ok(Completion::Normal);
        };
        for case in &cases[start..] {
            for stmt in &case.consequent {
                match self.exec_stmt(stmt, &switch_env)? {
                    Completion::Normal => {}
                    Completion::Break(None) => return Ok(Completion::Normal),
                    abrupt => return Ok(abrupt),
                }
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_loop(&self, stmt: &Stmt, env: &Env, labels: &[String]) -> Eval<Completion> {
        let loop_env = Frame::block(env);
        let (test, update, body, test_first) = match stmt {
            Stmt::While { test, body } => (Some(test), None, body, true),
            Stmt::DoWhile { body, test } => (Some(test), None, body, false),
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                match init {
                    Some(ForInit::Var(decl)) => self.declare(decl, &loop_env)?,
                    Some(ForInit::Expr(expr)) => {
                        self.eval(expr, &loop_env)?;
                    }
                    None => {}
                }
                (test.as_ref(), update.as_ref(), body, true)
            }
            other => return self.exec_stmt(other, env),
        };
        let mut first = true;
        loop {
            if test_first || !first {
                if let Some(test) = test {
                    if !self.eval(test, &loop_env)?.is_truthy() {
                        break;
                    }
                }
            }
            first = false;
            match self.exec_stmt(body, &loop_env)? {
                Completion::Break(None) => break,
                Completion::Break(Some(label)) if labels.contains(&label) => break,
                Completion::Normal | Completion::Continue(None) => {}
                Completion::Continue(Some(label)) if labels.contains(&label) => {}
                other => return Ok(other),
            }
            if let Some(update) = update {
                self.eval(update, &loop_env)?;
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_try(
        &self,
        block: &[Stmt],
        handler: Option<&CatchClause>,
        finalizer: Option<&[Stmt]>,
        env: &Env,
    ) -> Eval<Completion> {
        let mut result = self.exec_stmts(block, &Frame::block(env));
        if let Some(handler) = handler {
            if let Err(Abrupt::Throw(thrown)) = result {
                let catch_env = Frame::block(env);
                if let Some(param) = &handler.param {
                    catch_env.declare(param, thrown);
                }
                result = self.exec_stmts(&handler.body, &catch_env);
            }
        }
        if let Some(finalizer) = finalizer {
            match self.exec_stmts(finalizer, &Frame::block(env))? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        result
    }

    // ── Expressions ───────────────────────────────────────

    fn eval(&self, expr: &Expr, env: &Env) -> Eval<Value> {
        match expr {
            Expr::Ident(name) => env.lookup(name).ok_or_else(|| reference_error(name)),
            Expr::Number { value, .. } => Ok(Value::Number(*value)),
            Expr::This => Ok(env.lookup("this").unwrap_or(Value::Undefined)),
            Expr::Str { value, .. } => Ok(Value::String(value.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Array(elements) => {
                let values = self.eval_all(elements, env)?;
                Ok(Value::array(values))
            }
            Expr::Object(properties) => {
                let mut map = BTreeMap::new();
                for property in properties {
                    map.insert(property.key.clone(), self.eval(&property.value, env)?);
                }
                Ok(Value::object(map))
            }
            Expr::Function(func) => Ok(self.closure(func, env)),
            Expr::Class(class) => Ok(self.class_value(class, env)),
            Expr::Unary {
                op: UnaryOp::Delete,
                argument,
            } => self.delete(argument, env),
            Expr::Unary {
                op: UnaryOp::Typeof,
                argument,
            } if matches!(argument.as_ref(), Expr::Ident(name) if env.lookup(name).is_none()) => {
                Ok(Value::string("undefined"))
            }
            Expr::Unary { op, argument } => {
                let operand = self.eval(argument, env)?;
                Ok(ops::unary(*op, &operand)?)
            }
            Expr::Update {
                op,
                prefix,
                argument,
            } => {
                let old = self.eval(argument, env)?.to_number();
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.assign_to(argument, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                Ok(ops::binary(*op, &left, &right)?)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, env)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, env)
                }
            }
            Expr::Assign { op, target, value } => {
                let value = match op.binary() {
                    None => self.eval(value, env)?,
                    Some(binary) => {
                        let current = self.eval(target, env)?;
                        let operand = self.eval(value, env)?;
                        ops::binary(binary, &current, &operand)?
                    }
                };
                self.assign_to(target, value.clone(), env)?;
                Ok(value)
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, env)?.is_truthy() {
                    self.eval(consequent, env)
                } else {
                    self.eval(alternate, env)
                }
            }
            Expr::Call { callee, arguments } => {
                // `obj.m()` binds `this` to `obj`
                let (function, this) = match callee.as_ref() {
                    Expr::Member { object, property } => {
                        let object = self.eval(object, env)?;
                        let key = self.property_key(property, env)?;
                        (self.get_member(&object, &key)?, object)
                    }
                    other => (self.eval(other, env)?, Value::Undefined),
                };
                let args = self.eval_all(arguments, env)?;
                if !function.is_callable() {
                    return Err(type_error(format!(
                        "{} is not a function",
                        expr_to_string(callee)
                    )));
                }
                self.call_value(&function, args, this)
            }
            Expr::New { callee, arguments } => {
                let constructor = self.eval(callee, env)?;
                let args = self.eval_all(arguments, env)?;
                match &constructor {
                    Value::Builtin(builtin) if matches!(builtin.as_ref(), Builtin::Error) => {
                        builtins::call(builtin, args)
                    }
                    Value::Class(class) => self.construct(class, args),
                    Value::Function(_) => Err(unsupported("`new` with a plain function")),
                    _ => Err(type_error(format!(
                        "{} is not a constructor",
                        expr_to_string(callee)
                    ))),
                }
            }
            Expr::Member { object, property } => {
                let object = self.eval(object, env)?;
                let key = self.property_key(property, env)?;
                self.get_member(&object, &key)
            }
            Expr::Sequence(parts) => {
                let mut last = Value::Undefined;
                for part in parts {
                    last = self.eval(part, env)?;
                }
                Ok(last)
            }
            Expr::Yield(_) => Err(unsupported("yield")),
            Expr::Await(_) => Err(unsupported("await")),
        }
    }

    fn eval_all(&self, exprs: &[Expr], env: &Env) -> Eval<Vec<Value>> {
        exprs.iter().map(|expr| self.eval(expr, env)).collect()
    }

    fn property_key(&self, property: &MemberProp, env: &Env) -> Eval<String> {
        match property {
            MemberProp::Ident(name) => Ok(name.clone()),
            MemberProp::Computed(expr) => Ok(self.eval(expr, env)?.to_display_string()),
        }
    }

    fn get_member(&self, object: &Value, key: &str) -> Eval<Value> {
        match object {
            Value::Undefined | Value::Null => Err(type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                object, key
            ))),
            Value::Object(properties) => {
                Ok(properties.borrow().get(key).cloned().unwrap_or(Value::Undefined))
            }
            Value::Class(class) => {
                Ok(class.statics.borrow().get(key).cloned().unwrap_or(Value::Undefined))
            }
            Value::Array(elements) => {
                if key == "length" {
                    return Ok(Value::Number(elements.borrow().len() as f64));
                }
                if let Ok(index) = key.parse::<usize>() {
                    return Ok(elements.borrow().get(index).cloned().unwrap_or(Value::Undefined));
                }
                Ok(match value::ArrayMethod::lookup(key) {
                    Some(method) => {
                        Value::Builtin(Rc::new(Builtin::ArrayMethod(method, Rc::clone(elements))))
                    }
                    None => Value::Undefined,
                })
            }
            Value::String(text) => {
                if key == "length" {
                    return Ok(Value::Number(text.encode_utf16().count() as f64));
                }
                if let Ok(index) = key.parse::<usize>() {
                    return Ok(text
                        .chars()
                        .nth(index)
                        .map(|c| Value::String(c.to_string()))
                        .unwrap_or(Value::Undefined));
                }
                Ok(match value::StringMethod::lookup(key) {
                    Some(method) => {
                        Value::Builtin(Rc::new(Builtin::StringMethod(method, text.clone())))
                    }
                    None => Value::Undefined,
                })
            }
            _ => Ok(Value::Undefined),
        }
    }

    fn set_member(&self, object: &Value, key: String, value: Value) -> Eval<()> {
        match object {
            Value::Undefined | Value::Null => Err(type_error(format!(
                "Cannot set properties of {} (setting '{}')",
                object, key
            ))),
            Value::Object(properties) => {
                properties.borrow_mut().insert(key, value);
                Ok(())
            }
            Value::Class(class) => {
                class.statics.borrow_mut().insert(key, value);
                Ok(())
            }
            Value::Array(elements) => {
                let mut elements = elements.borrow_mut();
                if let Ok(index) = key.parse::<usize>() {
                    if index >= elements.len() {
                        resize_array(&mut elements, index.saturating_add(1))?;
                    }
                    elements[index] = value;
                } else if key == "length" {
                    let length = value.to_number();
                    if !(length >= 0.0 && length.fract() == 0.0 && length <= MAX_ARRAY_LENGTH as f64)
                    {
                        return Err(range_error("Invalid array length"));
                    }
                    resize_array(&mut elements, length as usize)?;
                }
                Ok(())
            }
            // writes to primitives are silently dropped
            _ => Ok(()),
        }
    }

    fn assign_to(&self, target: &Expr, value: Value, env: &Env) -> Eval<()> {
        match target {
            Expr::Ident(name) => {
                if env.assign(name, value) {
                    Ok(())
                } else {
                    Err(reference_error(name))
                }
            }
            Expr::Member { object, property } => {
                let object = self.eval(object, env)?;
                let key = self.property_key(property, env)?;
                self.set_member(&object, key, value)
            }
            other => Err(Abrupt::Fatal(Error::ExecutionError(format!(
                "invalid assignment target `{}`",
                expr_to_string(other)
            )))),
        }
    }

    fn delete(&self, argument: &Expr, env: &Env) -> Eval<Value> {
        let Expr::Member { object, property } = argument else {
            let operand = self.eval(argument, env)?;
            return Ok(ops::unary(UnaryOp::Delete, &operand)?);
        };
        let object = self.eval(object, env)?;
        let key = self.property_key(property, env)?;
        match &object {
            Value::Object(properties) => {
                properties.borrow_mut().remove(&key);
            }
            Value::Undefined | Value::Null => {
                return Err(type_error(format!(
                    "Cannot convert {} to object",
                    object
                )))
            }
            _ => {}
        }
        Ok(Value::Bool(true))
    }

    // ── Calls ─────────────────────────────────────────────

    fn call_value(&self, function: &Value, args: Vec<Value>, this: Value) -> Eval<Value> {
        match function {
            Value::Function(closure) => self.call_closure(closure, args, this),
            Value::Builtin(builtin) => builtins::call(builtin, args),
            Value::Class(class) => Err(type_error(format!(
                "Class constructor {} cannot be invoked without 'new'",
                class.name()
            ))),
            other => Err(type_error(format!("{} is not a function", other))),
        }
    }

    /// `new C(args)`: a fresh object carrying the instance methods,
    /// initialized by `constructor`
    fn construct(&self, class: &ClassValue, args: Vec<Value>) -> Eval<Value> {
        let methods: BTreeMap<String, Value> = class
            .class
            .methods
            .iter()
            .filter(|method| !method.is_static && method.key != "constructor")
            .map(|method| (method.key.clone(), self.closure(&method.function, &class.env)))
            .collect();
        let instance = Value::object(methods);
        let Some(constructor) = class.class.constructor() else {
            return Ok(instance);
        };
        let closure = Rc::new(Closure {
            func: Rc::new(constructor.function.clone()),
            env: Rc::clone(&class.env),
        });
        match self.call_closure(&closure, args, instance.clone())? {
            // a constructor returning an object replaces the instance
            returned @ (Value::Object(_) | Value::Array(_)) => Ok(returned),
            _ => Ok(instance),
        }
    }

    fn call_closure(&self, closure: &Rc<Closure>, args: Vec<Value>, this: Value) -> Eval<Value> {
        let func = &closure.func;
        if func.is_async {
            return Err(unsupported("async function"));
        }
        if func.is_generator {
            return Err(unsupported("generator function"));
        }
        let depth = self.depth.get();
        if depth >= MAX_CALL_DEPTH {
            return Err(range_error("Maximum call stack size exceeded"));
        }
        self.depth.set(depth + 1);
        let result = self.invoke(closure, args, this);
        self.depth.set(depth);
        result
    }

    fn invoke(&self, closure: &Rc<Closure>, args: Vec<Value>, this: Value) -> Eval<Value> {
        let func = &closure.func;
        let frame = Frame::function(&closure.env);
        // arrows see the enclosing `this`
        if !func.is_arrow {
            frame.declare("this", this);
        }
        if let Some(id) = &func.id {
            frame.declare(id, Value::Function(Rc::clone(closure)));
        }
        let mut args = args.into_iter();
        for param in &func.params {
            frame.declare(param, args.next().unwrap_or(Value::Undefined));
        }
        match &func.body {
            FunctionBody::Expr(expr) => self.eval(expr, &frame),
            FunctionBody::Block(body) => match self.exec_stmts(body, &frame)? {
                Completion::Return(value) => Ok(value),
                Completion::Normal => Ok(Value::Undefined),
                Completion::Break(_) | Completion::Continue(_) => Err(Abrupt::Fatal(
                    Error::ExecutionError("break or continue outside a loop".to_string()),
                )),
            },
        }
    }
}

/// Grow or shrink an array, refusing lengths past [`MAX_ARRAY_LENGTH`]
/// or an allocation the host cannot satisfy
fn resize_array(elements: &mut Vec<Value>, length: usize) -> Eval<()> {
    if length > MAX_ARRAY_LENGTH {
        return Err(range_error("Invalid array length"));
    }
    if length > elements.len() {
        elements
            .try_reserve(length - elements.len())
            .map_err(|_| range_error("Invalid array length"))?;
    }
    elements.resize(length, Value::Undefined);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn load(source: &str) -> Runtime {
        Runtime::load(&parse(source).unwrap()).unwrap()
    }

    fn call_json(runtime: &Runtime, name: &str, args: serde_json::Value) -> Result<serde_json::Value> {
        let args = match Value::from_json(&args) {
            Value::Array(elements) => elements.borrow().clone(),
            other => vec![other],
        };
        runtime.call(name, args).map(|v| v.to_json())
    }

    // ── Basics ──────────────────────────────────────────

    #[test]
    fn test_arithmetic_and_return() {
        let rt = load("function add(a, b) { return a + b; }");
        assert_eq!(call_json(&rt, "add", serde_json::json!([2, 3])).unwrap(), 5);
    }

    #[test]
    fn test_default_export_is_callable() {
        let rt = load("export default function double(x) { return x * 2; }");
        assert_eq!(call_json(&rt, "default", serde_json::json!([21])).unwrap(), 42);
        let rt = load("export default (x) => x - 1;");
        assert_eq!(call_json(&rt, "default", serde_json::json!([1])).unwrap(), 0);
    }

    #[test]
    fn test_missing_default_export() {
        let rt = load("function f() {}");
        assert!(matches!(rt.call("default", vec![]), Err(Error::ExecutionError(_))));
    }

    #[test]
    fn test_objects_are_shared_references() {
        let rt = load(
            "function bump(account, amount) { account.balance -= amount; return account; }",
        );
        let result = call_json(&rt, "bump", serde_json::json!([{"balance": 100}, 30])).unwrap();
        assert_eq!(result, serde_json::json!({"balance": 70}));
    }

    #[test]
    fn test_closures_capture_environment() {
        let rt = load(
            "function counter() { let n = 0; const next = () => { n++; return n; }; next(); next(); return next(); }",
        );
        assert_eq!(call_json(&rt, "counter", serde_json::json!([])).unwrap(), 3);
    }

    #[test]
    fn test_hoisting_within_function() {
        let rt = load("function outer() { return inner(); function inner() { return 7; } }");
        assert_eq!(call_json(&rt, "outer", serde_json::json!([])).unwrap(), 7);
    }

    // ── Control flow ────────────────────────────────────

    #[test]
    fn test_loops_and_labels() {
        let rt = load(
            "function sum(limit) {\n  let total = 0;\n  outer: for (let i = 0; i < limit; i++) {\n    let j = 0;\n    while (true) {\n      j++;\n      if (j > i) continue outer;\n      if (j > 3) break outer;\n      total += j;\n    }\n  }\n  return total;\n}",
        );
        // i=0: none; i=1: 1; i=2: 1+2; i=3: 1+2+3; i=4: 1+2+3 then j=4 breaks outer
        assert_eq!(call_json(&rt, "sum", serde_json::json!([10])).unwrap(), 16);
    }

    #[test]
    fn test_do_while_runs_once() {
        let rt = load("function f() { let n = 0; do { n++; } while (false); return n; }");
        assert_eq!(call_json(&rt, "f", serde_json::json!([])).unwrap(), 1);
    }

    #[test]
    fn test_try_catch_finally() {
        let rt = load(
            "function f() { let log = []; try { log.push(1); throw new Error('x'); } catch (e) { log.push(e.message); } finally { log.push(3); } return log; }",
        );
        assert_eq!(
            call_json(&rt, "f", serde_json::json!([])).unwrap(),
            serde_json::json!([1, "x", 3])
        );
    }

    #[test]
    fn test_finally_return_overrides_throw() {
        let rt = load("function f() { try { throw 1; } finally { return 2; } }");
        assert_eq!(call_json(&rt, "f", serde_json::json!([])).unwrap(), 2);
    }

    // ── Errors ──────────────────────────────────────────

    #[test]
    fn test_uncaught_error_message() {
        let rt = load(
            "function withdraw(amount) { if (!(amount > 0)) { throw new Error(\"Function \\\"withdraw\\\" precondition failed: amount > 0\"); } return amount; }",
        );
        let err = rt.call("withdraw", vec![Value::Number(-1.0)]).unwrap_err();
        match err {
            Error::Uncaught { message } => {
                assert_eq!(message, "Function \"withdraw\" precondition failed: amount > 0")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(rt.call("withdraw", vec![Value::Number(1.0)]).is_ok());
    }

    #[test]
    fn test_error_called_without_new() {
        let rt = load("function f() { throw Error('plain'); }");
        assert!(matches!(
            rt.call("f", vec![]),
            Err(Error::Uncaught { message }) if message == "plain"
        ));
    }

    #[test]
    fn test_property_of_undefined_is_catchable() {
        let rt = load(
            "function f(x) { try { return x.missing.deeper; } catch (e) { return e.name; } }",
        );
        let result = call_json(&rt, "f", serde_json::json!([{}])).unwrap();
        assert_eq!(result, "TypeError");
    }

    #[test]
    fn test_unbound_identifier_is_reference_error() {
        let rt = load("function f() { return nope; }");
        assert!(matches!(
            rt.call("f", vec![]),
            Err(Error::Uncaught { message }) if message == "nope is not defined"
        ));
        let rt = load("function g() { return typeof nope; }");
        assert_eq!(call_json(&rt, "g", serde_json::json!([])).unwrap(), "undefined");
    }

    #[test]
    fn test_unsupported_constructs() {
        let rt = load("async function f() { return 1; }\nfunction g(a, b) { return a instanceof b; }");
        assert!(matches!(rt.call("f", vec![]), Err(Error::ExecutionError(_))));
        assert!(matches!(
            rt.call("g", vec![Value::Null, Value::Null]),
            Err(Error::ExecutionError(_))
        ));
    }

    #[test]
    fn test_runaway_recursion_throws_range_error() {
        let caught = with_eval_stack(|| {
            let rt = load(
                "function f() { return f(); }\nfunction g() { try { return f(); } catch (e) { return e.name; } }",
            );
            assert!(matches!(
                rt.call("f", vec![]),
                Err(Error::Uncaught { message }) if message == "Maximum call stack size exceeded"
            ));
            Ok(rt.call("g", vec![])?.to_json())
        })
        .unwrap();
        assert_eq!(caught, "RangeError");
    }

    #[test]
    fn test_eval_stack_reports_task_errors() {
        let result: Result<()> = with_eval_stack(|| Err(Error::ExecutionError("inner".into())));
        assert!(matches!(result, Err(Error::ExecutionError(msg)) if msg == "inner"));
    }

    #[test]
    fn test_array_growth_is_capped() {
        let rt = load(
            "function far() { const a = []; try { a[1e9] = 1; } catch (e) { return [e.name, e.message, a.length]; } }\nfunction long() { const a = [1, 2]; a.length = 1e12; return a; }\nfunction shrink() { const a = [1, 2, 3]; a[4] = 5; a.length = 2; return a; }",
        );
        assert_eq!(
            call_json(&rt, "far", serde_json::json!([])).unwrap(),
            serde_json::json!(["RangeError", "Invalid array length", 0])
        );
        assert!(matches!(
            rt.call("long", vec![]),
            Err(Error::Uncaught { message }) if message == "Invalid array length"
        ));
        assert_eq!(
            call_json(&rt, "shrink", serde_json::json!([])).unwrap(),
            serde_json::json!([1, 2])
        );
    }

    // ── Classes and switch ──────────────────────────────

    #[test]
    fn test_class_construction_and_methods() {
        let rt = load(
            "class Counter {\n  constructor(start) { this.count = start; }\n  bump(by) { this.count += by; return this.count; }\n  static zero() { return new Counter(0); }\n}\nfunction f(n) { const c = Counter.zero(); c.bump(n); return [c.bump(1), c.count, typeof Counter]; }\nfunction g() { const o = { n: 2, twice() { return this.n * 2; } }; return o.twice(); }",
        );
        assert_eq!(
            call_json(&rt, "f", serde_json::json!([4])).unwrap(),
            serde_json::json!([5, 5, "function"])
        );
        assert_eq!(call_json(&rt, "g", serde_json::json!([])).unwrap(), 4);
    }

    #[test]
    fn test_instances_serialize_without_methods() {
        let rt = load(
            "export default class Point {\n  constructor(x) { this.x = x; }\n  norm() { return this.x; }\n}\nfunction make() { return new Point(3); }",
        );
        assert_eq!(
            call_json(&rt, "make", serde_json::json!([])).unwrap(),
            serde_json::json!({"x": 3})
        );
        assert!(matches!(
            rt.call("default", vec![]),
            Err(Error::Uncaught { message })
                if message == "Class constructor Point cannot be invoked without 'new'"
        ));
    }

    #[test]
    fn test_arrow_keeps_enclosing_this() {
        let rt = load(
            "class Box {\n  constructor(v) { this.v = v; }\n  get() { const read = () => this.v; return read(); }\n}\nfunction f() { return [new Box(7).get(), this === undefined]; }",
        );
        assert_eq!(
            call_json(&rt, "f", serde_json::json!([])).unwrap(),
            serde_json::json!([7, true])
        );
    }

    #[test]
    fn test_switch_matches_strictly_and_falls_through() {
        let rt = load(
            "function f(k) {\n  const log = [];\n  switch (k) {\n    case 1:\n      log.push('one');\n    case 2:\n      log.push('two');\n      break;\n    default:\n      log.push('other');\n  }\n  return log;\n}",
        );
        assert_eq!(call_json(&rt, "f", serde_json::json!([1])).unwrap(), serde_json::json!(["one", "two"]));
        assert_eq!(call_json(&rt, "f", serde_json::json!([2])).unwrap(), serde_json::json!(["two"]));
        assert_eq!(call_json(&rt, "f", serde_json::json!(["1"])).unwrap(), serde_json::json!(["other"]));
    }

    #[test]
    fn test_switch_return_and_continue_escape() {
        let rt = load(
            "function f(n) {\n  let total = 0;\n  for (let i = 0; i < n; i++) {\n    switch (i % 3) {\n      case 0:\n        continue;\n      case 2:\n        return total;\n    }\n    total += 10;\n  }\n  return -1;\n}",
        );
        assert_eq!(call_json(&rt, "f", serde_json::json!([5])).unwrap(), 10);
    }

    #[test]
    fn test_top_level_throw_fails_load() {
        let err = Runtime::load(&parse("throw new Error('at load');").unwrap()).err();
        assert!(matches!(err, Some(Error::Uncaught { message }) if message == "at load"));
    }

    // ── Builtins ────────────────────────────────────────

    #[test]
    fn test_array_and_string_methods() {
        let rt = load(
            "function f(items, name) { items.push(4); return [items.length, items.includes(2), items.indexOf(9), items.join('-'), name.trim().toUpperCase(), name.indexOf('b'), Math.max(1, 5, 3), Math.floor(2.7), Math.abs(-2)]; }",
        );
        let result = call_json(&rt, "f", serde_json::json!([[1, 2, 3], " ab "])).unwrap();
        assert_eq!(
            result,
            serde_json::json!([4, true, -1, "1-2-3-4", "AB", 2, 5, 2, 2])
        );
    }
}
