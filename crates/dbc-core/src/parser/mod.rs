//! Parser — tokenizer, AST types, and recursive descent parser
//!
//! Converts source text into an Abstract Syntax Tree (AST) for the
//! subset of JavaScript the contract lowering pass operates on.

pub mod ast;
pub mod tokenizer;

use ast::*;
use tokenizer::{Span, SpannedToken, Token, Tokenizer};

use crate::{Error, Result};

/// Parse source text into a Program AST
///
/// # Errors
/// Returns `ParseError` with line:column for syntax violations.
pub fn parse(input: &str) -> Result<Program> {
    let tokens = Tokenizer::new(input).tokenize()?;
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

/// Parse a single expression, rejecting trailing input
pub fn parse_expression(input: &str) -> Result<Expr> {
    let tokens = Tokenizer::new(input).tokenize()?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expression()?;
    parser.expect(&Token::Eof, "end of input")?;
    Ok(expr)
}

/// Recursive descent parser over a token stream
pub struct Parser {
    tokens: Vec<SpannedToken>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Parser {
            tokens,
            position: 0,
        }
    }

    // ── Token helpers ──────────────────────────────────────

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.position + offset)
            .or_else(|| self.tokens.last())
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|t| t.span.clone())
            .unwrap_or_default()
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> Error {
        Error::ParseError(format!(
            "Expected {} but found {:?} at {}",
            what,
            self.peek(),
            self.span()
        ))
    }

    /// True when a line break separates the current token from the previous one
    fn newline_before(&self) -> bool {
        if self.position == 0 || self.position >= self.tokens.len() {
            return false;
        }
        self.tokens[self.position].span.line > self.tokens[self.position - 1].span.line
    }

    /// Statement terminator with automatic semicolon insertion
    fn consume_semicolon(&mut self) -> Result<()> {
        if self.eat(&Token::Semicolon) {
            return Ok(());
        }
        if matches!(self.peek(), Token::RBrace | Token::Eof) || self.newline_before() {
            return Ok(());
        }
        Err(self.unexpected("';'"))
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String> {
        match self.peek().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    // ── Program & statements ───────────────────────────────

    pub fn parse_program(&mut self) -> Result<Program> {
        let mut body = Vec::new();
        while !self.check(&Token::Eof) {
            body.push(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    fn parse_block_body(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&Token::LBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.check(&Token::Eof) {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        match self.peek() {
            Token::LBrace => Ok(Stmt::Block(self.parse_block_body()?)),
            Token::Semicolon => {
                self.advance();
                Ok(Stmt::Empty)
            }
            Token::Var | Token::Let | Token::Const => {
                let decl = self.parse_var_decl()?;
                self.consume_semicolon()?;
                Ok(Stmt::Var(decl))
            }
            Token::Function => Ok(Stmt::Function(self.parse_function(true)?)),
            Token::Async if self.peek_at(1) == &Token::Function => {
                Ok(Stmt::Function(self.parse_function(true)?))
            }
            Token::Class => Ok(Stmt::Class(self.parse_class(true)?)),
            Token::Switch => self.parse_switch(),
            Token::Return => {
                self.advance();
                let argument = if matches!(self.peek(), Token::Semicolon | Token::RBrace | Token::Eof)
                    || self.newline_before()
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return(argument))
            }
            Token::If => self.parse_if(),
            Token::While => {
                self.advance();
                let test = self.parse_paren_expression()?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While { test, body })
            }
            Token::Do => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect(&Token::While, "'while'")?;
                let test = self.parse_paren_expression()?;
                self.eat(&Token::Semicolon);
                Ok(Stmt::DoWhile { body, test })
            }
            Token::For => self.parse_for(),
            Token::Throw => {
                self.advance();
                if self.newline_before() {
                    return Err(self.unexpected("expression on the same line as 'throw'"));
                }
                let argument = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Throw(argument))
            }
            Token::Try => self.parse_try(),
            Token::Break | Token::Continue => {
                let is_break = self.advance() == Token::Break;
                let label = match self.peek().clone() {
                    Token::Identifier(name) if !self.newline_before() => {
                        self.advance();
                        Some(name)
                    }
                    _ => None,
                };
                self.consume_semicolon()?;
                Ok(if is_break {
                    Stmt::Break(label)
                } else {
                    Stmt::Continue(label)
                })
            }
            Token::Export => self.parse_export(),
            Token::Identifier(_) if self.peek_at(1) == &Token::Colon => {
                let span = self.span();
                let label = self.expect_identifier("label")?;
                self.advance(); // consume ':'
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::Labeled(Labeled { label, body, span }))
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl> {
        let kind = match self.advance() {
            Token::Var => VarKind::Var,
            Token::Let => VarKind::Let,
            _ => VarKind::Const,
        };
        let mut declarations = Vec::new();
        loop {
            let name = self.expect_identifier("binding name")?;
            let init = if self.eat(&Token::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            declarations.push(Declarator { name, init });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(VarDecl { kind, declarations })
    }

    fn parse_paren_expression(&mut self) -> Result<Expr> {
        self.expect(&Token::LParen, "'('")?;
        let expr = self.parse_expression()?;
        self.expect(&Token::RParen, "')'")?;
        Ok(expr)
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        self.advance();
        let test = self.parse_paren_expression()?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat(&Token::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        self.advance();
        self.expect(&Token::LParen, "'('")?;
        let init = match self.peek() {
            Token::Semicolon => None,
            Token::Var | Token::Let | Token::Const => Some(ForInit::Var(self.parse_var_decl()?)),
            _ => Some(ForInit::Expr(self.parse_expression()?)),
        };
        self.expect(&Token::Semicolon, "';'")?;
        let test = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&Token::Semicolon, "';'")?;
        let update = if self.check(&Token::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&Token::RParen, "')'")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn parse_switch(&mut self) -> Result<Stmt> {
        self.advance();
        let discriminant = self.parse_paren_expression()?;
        self.expect(&Token::LBrace, "'{'")?;
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.eat(&Token::RBrace) {
            let test = match self.peek() {
                Token::Case => {
                    self.advance();
                    Some(self.parse_expression()?)
                }
                Token::Default if !seen_default => {
                    self.advance();
                    seen_default = true;
                    None
                }
                _ => return Err(self.unexpected("'case', 'default' or '}'")),
            };
            self.expect(&Token::Colon, "':'")?;
            let mut consequent = Vec::new();
            while !matches!(self.peek(), Token::Case | Token::Default | Token::RBrace) {
                if self.check(&Token::Eof) {
                    return Err(self.unexpected("'}'"));
                }
                consequent.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, consequent });
        }
        Ok(Stmt::Switch {
            discriminant,
            cases,
        })
    }

    fn parse_try(&mut self) -> Result<Stmt> {
        self.advance();
        let block = self.parse_block_body()?;
        let handler = if self.eat(&Token::Catch) {
            let param = if self.eat(&Token::LParen) {
                let name = self.expect_identifier("catch parameter")?;
                self.expect(&Token::RParen, "')'")?;
                Some(name)
            } else {
                None
            };
            let body = self.parse_block_body()?;
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finalizer = if self.eat(&Token::Finally) {
            Some(self.parse_block_body()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("'catch' or 'finally'"));
        }
        Ok(Stmt::Try {
            block,
            handler,
            finalizer,
        })
    }

    fn parse_export(&mut self) -> Result<Stmt> {
        self.advance();
        if self.eat(&Token::Default) {
            let declaration = match self.peek() {
                Token::Function => Stmt::Function(self.parse_function(false)?),
                Token::Async if self.peek_at(1) == &Token::Function => {
                    Stmt::Function(self.parse_function(false)?)
                }
                Token::Class => Stmt::Class(self.parse_class(false)?),
                _ => {
                    let expr = self.parse_assignment()?;
                    self.consume_semicolon()?;
                    Stmt::Expr(expr)
                }
            };
            return Ok(Stmt::Export {
                default: true,
                declaration: Box::new(declaration),
            });
        }
        let declaration = match self.peek() {
            Token::Var | Token::Let | Token::Const => {
                let decl = self.parse_var_decl()?;
                self.consume_semicolon()?;
                Stmt::Var(decl)
            }
            Token::Function | Token::Async => Stmt::Function(self.parse_function(true)?),
            Token::Class => Stmt::Class(self.parse_class(true)?),
            _ => return Err(self.unexpected("declaration after 'export'")),
        };
        Ok(Stmt::Export {
            default: false,
            declaration: Box::new(declaration),
        })
    }

    /// `[async] function [*] [name] (params) { body }`
    fn parse_function(&mut self, require_name: bool) -> Result<Function> {
        let span = self.span();
        let is_async = self.eat(&Token::Async);
        self.expect(&Token::Function, "'function'")?;
        let is_generator = self.eat(&Token::Star);
        let id = match self.peek().clone() {
            Token::Identifier(name) => {
                self.advance();
                Some(name)
            }
            _ if require_name => return Err(self.unexpected("function name")),
            _ => None,
        };
        let params = self.parse_params()?;
        let body = self.parse_block_body()?;
        Ok(Function {
            id,
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
            is_async,
            is_generator,
            span,
        })
    }

    /// `class [name] { [static] method(params) { body } ... }`
    fn parse_class(&mut self, require_name: bool) -> Result<Class> {
        let span = self.span();
        self.expect(&Token::Class, "'class'")?;
        let id = match self.peek().clone() {
            Token::Identifier(name) if name != "extends" => {
                self.advance();
                Some(name)
            }
            _ if require_name => return Err(self.unexpected("class name")),
            _ => None,
        };
        self.expect(&Token::LBrace, "'{'")?;
        let mut methods = Vec::new();
        while !self.eat(&Token::RBrace) {
            if self.eat(&Token::Semicolon) {
                continue;
            }
            if self.check(&Token::Eof) {
                return Err(self.unexpected("'}'"));
            }
            let is_static = matches!(self.peek(), Token::Identifier(name) if name == "static")
                && self.peek_at(1) != &Token::LParen;
            if is_static {
                self.advance();
            }
            let (key, function) = self.parse_method()?;
            methods.push(Method {
                key,
                is_static,
                function,
            });
        }
        Ok(Class { id, methods, span })
    }

    /// `[async] [*] key(params) { body }`, shared by classes and object literals
    fn parse_method(&mut self) -> Result<(String, Function)> {
        let span = self.span();
        let is_async = self.peek() == &Token::Async
            && !matches!(self.peek_at(1), Token::LParen | Token::Colon | Token::Comma);
        if is_async {
            self.advance();
        }
        let is_generator = self.eat(&Token::Star);
        let key = self.property_key()?;
        let params = self.parse_params()?;
        let body = self.parse_block_body()?;
        Ok((
            key,
            Function {
                id: None,
                params,
                body: FunctionBody::Block(body),
                is_arrow: false,
                is_async,
                is_generator,
                span,
            },
        ))
    }

    fn parse_params(&mut self) -> Result<Vec<String>> {
        self.expect(&Token::LParen, "'('")?;
        let mut params = Vec::new();
        while !self.check(&Token::RParen) {
            params.push(self.expect_identifier("parameter name")?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen, "')'")?;
        Ok(params)
    }

    // ── Expressions ────────────────────────────────────────

    /// Expression including the comma operator
    pub fn parse_expression(&mut self) -> Result<Expr> {
        let first = self.parse_assignment()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.eat(&Token::Comma) {
            expressions.push(self.parse_assignment()?);
        }
        Ok(Expr::Sequence(expressions))
    }

    /// Whether an arrow function starts at the current position
    fn at_arrow(&self) -> bool {
        let offset = usize::from(self.peek() == &Token::Async);
        match self.peek_at(offset) {
            Token::Identifier(_) => self.peek_at(offset + 1) == &Token::Arrow,
            Token::LParen => {
                let mut depth = 0usize;
                let mut i = offset;
                loop {
                    match self.peek_at(i) {
                        Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                        Token::RParen | Token::RBracket | Token::RBrace => {
                            depth -= 1;
                            if depth == 0 {
                                return self.peek_at(i + 1) == &Token::Arrow;
                            }
                        }
                        Token::Eof => return false,
                        _ => {}
                    }
                    i += 1;
                }
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> Result<Expr> {
        let span = self.span();
        let is_async = self.eat(&Token::Async);
        let params = if self.check(&Token::LParen) {
            self.parse_params()?
        } else {
            vec![self.expect_identifier("parameter name")?]
        };
        self.expect(&Token::Arrow, "'=>'")?;
        let body = if self.check(&Token::LBrace) {
            FunctionBody::Block(self.parse_block_body()?)
        } else {
            FunctionBody::Expr(Box::new(self.parse_assignment()?))
        };
        Ok(Expr::Function(Box::new(Function {
            id: None,
            params,
            body,
            is_arrow: true,
            is_async,
            is_generator: false,
            span,
        })))
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        if self.at_arrow() {
            return self.parse_arrow();
        }
        if self.eat(&Token::Yield) {
            if matches!(
                self.peek(),
                Token::RParen
                    | Token::RBracket
                    | Token::RBrace
                    | Token::Semicolon
                    | Token::Comma
                    | Token::Colon
                    | Token::Eof
            ) || self.newline_before()
            {
                return Ok(Expr::Yield(None));
            }
            return Ok(Expr::Yield(Some(Box::new(self.parse_assignment()?))));
        }

        let target = self.parse_conditional()?;
        let op = match self.peek() {
            Token::Assign => AssignOp::Assign,
            Token::PlusAssign => AssignOp::Add,
            Token::MinusAssign => AssignOp::Sub,
            Token::StarAssign => AssignOp::Mul,
            Token::SlashAssign => AssignOp::Div,
            Token::PercentAssign => AssignOp::Rem,
            Token::StarStarAssign => AssignOp::Exp,
            _ => return Ok(target),
        };
        if !matches!(target, Expr::Ident(_) | Expr::Member { .. }) {
            return Err(Error::ParseError(format!(
                "Invalid assignment target at {}",
                self.span()
            )));
        }
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let test = self.parse_binary(0)?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect(&Token::Colon, "':'")?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary_operator(&self) -> Option<Operator> {
        let op = match self.peek() {
            Token::OrOr => Operator::Logical(LogicalOp::Or),
            Token::QuestionQuestion => Operator::Logical(LogicalOp::Nullish),
            Token::AndAnd => Operator::Logical(LogicalOp::And),
            Token::EqEq => Operator::Binary(BinaryOp::Eq),
            Token::NotEq => Operator::Binary(BinaryOp::NotEq),
            Token::EqEqEq => Operator::Binary(BinaryOp::StrictEq),
            Token::NotEqEq => Operator::Binary(BinaryOp::StrictNotEq),
            Token::Lt => Operator::Binary(BinaryOp::Lt),
            Token::Gt => Operator::Binary(BinaryOp::Gt),
            Token::LtEq => Operator::Binary(BinaryOp::LtEq),
            Token::GtEq => Operator::Binary(BinaryOp::GtEq),
            Token::In => Operator::Binary(BinaryOp::In),
            Token::Instanceof => Operator::Binary(BinaryOp::Instanceof),
            Token::Plus => Operator::Binary(BinaryOp::Add),
            Token::Minus => Operator::Binary(BinaryOp::Sub),
            Token::Star => Operator::Binary(BinaryOp::Mul),
            Token::Slash => Operator::Binary(BinaryOp::Div),
            Token::Percent => Operator::Binary(BinaryOp::Rem),
            Token::StarStar => Operator::Binary(BinaryOp::Exp),
            _ => return None,
        };
        Some(op)
    }

    /// Precedence climbing over binary and logical operators
    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.binary_operator() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();
            // `**` is right-associative
            let next = if op == Operator::Binary(BinaryOp::Exp) {
                precedence
            } else {
                precedence + 1
            };
            let right = self.parse_binary(next)?;
            left = match op {
                Operator::Binary(op) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Operator::Logical(op) => Expr::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Minus,
            Token::Plus => UnaryOp::Plus,
            Token::Tilde => UnaryOp::BitNot,
            Token::Typeof => UnaryOp::Typeof,
            Token::Void => UnaryOp::Void,
            Token::Delete => UnaryOp::Delete,
            Token::PlusPlus | Token::MinusMinus => {
                let op = if self.advance() == Token::PlusPlus {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                };
                let argument = self.parse_unary()?;
                return Ok(Expr::Update {
                    op,
                    prefix: true,
                    argument: Box::new(argument),
                });
            }
            Token::Await => {
                self.advance();
                return Ok(Expr::Await(Box::new(self.parse_unary()?)));
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let argument = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            argument: Box::new(argument),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let expr = self.parse_call_member()?;
        if self.newline_before() {
            return Ok(expr);
        }
        let op = match self.peek() {
            Token::PlusPlus => UpdateOp::Increment,
            Token::MinusMinus => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        self.advance();
        Ok(Expr::Update {
            op,
            prefix: false,
            argument: Box::new(expr),
        })
    }

    fn parse_call_member(&mut self) -> Result<Expr> {
        let mut expr = if self.eat(&Token::New) {
            let callee = self.parse_new_callee()?;
            let arguments = if self.check(&Token::LParen) {
                self.parse_arguments()?
            } else {
                Vec::new()
            };
            Expr::New {
                callee: Box::new(callee),
                arguments,
            }
        } else {
            self.parse_primary()?
        };

        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let name = self.property_name()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: MemberProp::Ident(name),
                    };
                }
                Token::LBracket => {
                    self.advance();
                    let property = self.parse_expression()?;
                    self.expect(&Token::RBracket, "']'")?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: MemberProp::Computed(Box::new(property)),
                    };
                }
                Token::LParen => {
                    let arguments = self.parse_arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        arguments,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Callee of `new`: a member chain without call arguments
    fn parse_new_callee(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        while self.eat(&Token::Dot) {
            let name = self.property_name()?;
            expr = Expr::Member {
                object: Box::new(expr),
                property: MemberProp::Ident(name),
            };
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>> {
        self.expect(&Token::LParen, "'('")?;
        let mut arguments = Vec::new();
        while !self.check(&Token::RParen) {
            arguments.push(self.parse_assignment()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen, "')'")?;
        Ok(arguments)
    }

    /// Identifier or reserved word in property position
    fn property_name(&mut self) -> Result<String> {
        let name = match self.peek() {
            Token::Identifier(name) => name.clone(),
            other => match keyword_text(other) {
                Some(text) => text.to_string(),
                None => return Err(self.unexpected("property name")),
            },
        };
        self.advance();
        Ok(name)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.peek().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(Expr::Ident(name))
            }
            Token::NumberLiteral(value, raw) => {
                self.advance();
                Ok(Expr::Number {
                    value,
                    raw: Some(raw),
                })
            }
            Token::This => {
                self.advance();
                Ok(Expr::This)
            }
            Token::StringLiteral(value, quote) => {
                self.advance();
                Ok(Expr::Str { value, quote })
            }
            Token::BooleanLiteral(value) => {
                self.advance();
                Ok(Expr::Bool(value))
            }
            Token::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            Token::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(expr)
            }
            Token::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(&Token::RBracket) {
                    elements.push(self.parse_assignment()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RBracket, "']'")?;
                Ok(Expr::Array(elements))
            }
            Token::LBrace => self.parse_object(),
            Token::Function => Ok(Expr::Function(Box::new(self.parse_function(false)?))),
            Token::Async if self.peek_at(1) == &Token::Function => {
                Ok(Expr::Function(Box::new(self.parse_function(false)?)))
            }
            Token::Class => Ok(Expr::Class(Box::new(self.parse_class(false)?))),
            _ => Err(self.unexpected("expression")),
        }
    }

    /// Identifier, reserved word, string or number in key position
    fn property_key(&mut self) -> Result<String> {
        let key = match self.peek().clone() {
            Token::Identifier(name) => name,
            Token::StringLiteral(value, _) => value,
            Token::NumberLiteral(value, _) => crate::printer::format_number(value),
            other => match keyword_text(&other) {
                Some(text) => text.to_string(),
                None => return Err(self.unexpected("property key")),
            },
        };
        self.advance();
        Ok(key)
    }

    fn parse_object(&mut self) -> Result<Expr> {
        self.expect(&Token::LBrace, "'{'")?;
        let mut properties = Vec::new();
        while !self.check(&Token::RBrace) {
            let is_method = match self.peek() {
                Token::Star => true,
                Token::Async => !matches!(self.peek_at(1), Token::Colon | Token::Comma | Token::RBrace),
                _ => self.peek_at(1) == &Token::LParen,
            };
            if is_method {
                let (key, function) = self.parse_method()?;
                properties.push(Property {
                    key,
                    value: Expr::Function(Box::new(function)),
                    shorthand: false,
                    method: true,
                });
            } else {
                let shorthand_allowed = matches!(self.peek(), Token::Identifier(_));
                let key = self.property_key()?;
                if self.eat(&Token::Colon) {
                    let value = self.parse_assignment()?;
                    properties.push(Property {
                        key,
                        value,
                        shorthand: false,
                        method: false,
                    });
                } else if shorthand_allowed {
                    properties.push(Property {
                        value: Expr::Ident(key.clone()),
                        key,
                        shorthand: true,
                        method: false,
                    });
                } else {
                    return Err(self.unexpected("':'"));
                }
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace, "'}'")?;
        Ok(Expr::Object(properties))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

impl Operator {
    fn precedence(&self) -> u8 {
        match self {
            Operator::Binary(op) => op.precedence(),
            Operator::Logical(op) => op.precedence(),
        }
    }
}

/// Source spelling of keyword tokens, for property names
fn keyword_text(token: &Token) -> Option<&'static str> {
    let text = match token {
        Token::Function => "function",
        Token::Return => "return",
        Token::If => "if",
        Token::Else => "else",
        Token::While => "while",
        Token::Do => "do",
        Token::For => "for",
        Token::Var => "var",
        Token::Let => "let",
        Token::Const => "const",
        Token::Throw => "throw",
        Token::Try => "try",
        Token::Catch => "catch",
        Token::Finally => "finally",
        Token::Break => "break",
        Token::Continue => "continue",
        Token::New => "new",
        Token::Typeof => "typeof",
        Token::Void => "void",
        Token::Delete => "delete",
        Token::In => "in",
        Token::Instanceof => "instanceof",
        Token::Yield => "yield",
        Token::Await => "await",
        Token::Async => "async",
        Token::Export => "export",
        Token::Default => "default",
        Token::Class => "class",
        Token::This => "this",
        Token::Switch => "switch",
        Token::Case => "case",
        Token::BooleanLiteral(true) => "true",
        Token::BooleanLiteral(false) => "false",
        Token::Null => "null",
        _ => return None,
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_stmt(input: &str) -> Stmt {
        parse(input).unwrap().body.remove(0)
    }

    #[test]
    fn test_parse_empty_program() {
        assert_eq!(parse("").unwrap(), Program::default());
    }

    #[test]
    fn test_parse_function_with_contract_labels() {
        let program = parse(
            "function demo(input) {\n  pre: typeof input === 'string';\n  post: {\n    it.length > 0;\n  }\n  return input;\n}",
        )
        .unwrap();
        let Stmt::Function(func) = &program.body[0] else {
            panic!("expected function declaration");
        };
        assert_eq!(func.id.as_deref(), Some("demo"));
        assert_eq!(func.params, vec!["input".to_string()]);
        let FunctionBody::Block(body) = &func.body else {
            panic!("expected block body");
        };
        assert_eq!(body.len(), 3);
        let Stmt::Labeled(pre) = &body[0] else {
            panic!("expected labeled statement");
        };
        assert_eq!(pre.label, "pre");
        assert_eq!(pre.span.line, 2);
        assert!(matches!(*pre.body, Stmt::Expr(Expr::Binary { op: BinaryOp::StrictEq, .. })));
        let Stmt::Labeled(post) = &body[1] else {
            panic!("expected labeled statement");
        };
        assert!(matches!(&*post.body, Stmt::Block(stmts) if stmts.len() == 1));
    }

    #[test]
    fn test_parse_sequence_message_form() {
        let stmt = first_stmt("x > 0, 'must be positive';");
        let Stmt::Expr(Expr::Sequence(parts)) = stmt else {
            panic!("expected sequence");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[1],
            Expr::Str { value: "must be positive".into(), quote: Quote::Single }
        );
    }

    #[test]
    fn test_parse_precedence() {
        let expr = parse_expression("a + b * c > d && !e").unwrap();
        let Expr::Logical { op: LogicalOp::And, left, right } = expr else {
            panic!("expected &&");
        };
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Gt, .. }));
        assert!(matches!(*right, Expr::Unary { op: UnaryOp::Not, .. }));
    }

    #[test]
    fn test_parse_exponent_right_associative() {
        let expr = parse_expression("2 ** 3 ** 2").unwrap();
        let Expr::Binary { op: BinaryOp::Exp, left, right } = expr else {
            panic!("expected **");
        };
        assert_eq!(
            *left,
            Expr::Number {
                value: 2.0,
                raw: Some("2".into())
            }
        );
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Exp, .. }));
    }

    #[test]
    fn test_parse_arrow_functions() {
        let expr = parse_expression("(a, b) => a + b").unwrap();
        let Expr::Function(func) = expr else {
            panic!("expected arrow");
        };
        assert!(func.is_arrow);
        assert_eq!(func.params, vec!["a".to_string(), "b".to_string()]);
        assert!(matches!(func.body, FunctionBody::Expr(_)));

        let expr = parse_expression("x => { return x; }").unwrap();
        let Expr::Function(func) = expr else {
            panic!("expected arrow");
        };
        assert!(matches!(func.body, FunctionBody::Block(_)));
    }

    #[test]
    fn test_parenthesized_expression_is_not_arrow() {
        let expr = parse_expression("(a, b)").unwrap();
        assert!(matches!(expr, Expr::Sequence(_)));
    }

    #[test]
    fn test_parse_member_call_and_new() {
        let expr = parse_expression("new Error(account.name + items[0].label)").unwrap();
        let Expr::New { callee, arguments } = expr else {
            panic!("expected new");
        };
        assert_eq!(*callee, Expr::ident("Error"));
        assert_eq!(arguments.len(), 1);
    }

    #[test]
    fn test_parse_update_and_compound_assignment() {
        let stmt = first_stmt("account.balance -= amount;");
        assert!(matches!(stmt, Stmt::Expr(Expr::Assign { op: AssignOp::Sub, .. })));
        let stmt = first_stmt("i++;");
        assert!(matches!(stmt, Stmt::Expr(Expr::Update { prefix: false, .. })));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse("1 = 2;").unwrap_err();
        assert!(err.to_string().contains("Invalid assignment target"));
    }

    #[test]
    fn test_parse_labeled_let_is_a_declaration_body() {
        let stmt = first_stmt("pre: let x = 1;");
        let Stmt::Labeled(labeled) = stmt else {
            panic!("expected labeled statement");
        };
        assert!(matches!(*labeled.body, Stmt::Var(_)));
    }

    #[test]
    fn test_parse_loops_and_try() {
        let program = parse(
            "for (let i = 0; i < 3; i++) { continue; }\nwhile (x) break;\ndo { x--; } while (x > 0);\ntry { f(); } catch (e) { g(e); } finally { h(); }",
        )
        .unwrap();
        assert!(matches!(program.body[0], Stmt::For { .. }));
        assert!(matches!(program.body[1], Stmt::While { .. }));
        assert!(matches!(program.body[2], Stmt::DoWhile { .. }));
        assert!(matches!(program.body[3], Stmt::Try { handler: Some(_), finalizer: Some(_), .. }));
    }

    #[test]
    fn test_parse_export_default_function() {
        let stmt = first_stmt("export default function withdraw(account, amount) {}");
        let Stmt::Export { default: true, declaration } = stmt else {
            panic!("expected export default");
        };
        assert!(matches!(*declaration, Stmt::Function(Function { id: Some(_), .. })));
    }

    #[test]
    fn test_automatic_semicolon_insertion() {
        let program = parse("let a = 1\nlet b = a\nreturnValue(b)").unwrap();
        assert_eq!(program.body.len(), 3);
    }

    #[test]
    fn test_missing_semicolon_on_same_line() {
        let err = parse("let a = 1 let b = 2").unwrap_err();
        assert!(err.to_string().contains("Expected ';'"));
    }

    #[test]
    fn test_object_literal_shorthand_and_keys() {
        let expr = parse_expression("{ price: 5, name, 'quoted key': true, default: null }").unwrap();
        let Expr::Object(properties) = expr else {
            panic!("expected object");
        };
        assert_eq!(properties.len(), 4);
        assert!(properties[1].shorthand);
        assert_eq!(properties[2].key, "quoted key");
        assert_eq!(properties[3].key, "default");
    }

    #[test]
    fn test_parse_class_methods() {
        let stmt = first_stmt(
            "class Pair {\n  constructor(a, b) { this.a = a; }\n  first(x) { pre: x > 0; return this.a; }\n  static of(a, b) { return new Pair(a, b); }\n}",
        );
        let Stmt::Class(class) = stmt else {
            panic!("expected class declaration");
        };
        assert_eq!(class.id.as_deref(), Some("Pair"));
        let keys: Vec<_> = class.methods.iter().map(|m| (m.key.as_str(), m.is_static)).collect();
        assert_eq!(keys, vec![("constructor", false), ("first", false), ("of", true)]);
        assert!(class.constructor().is_some());
        assert!(class.methods.iter().all(|m| m.function.id.is_none()));
        let FunctionBody::Block(body) = &class.methods[1].function.body else {
            panic!("expected block body");
        };
        assert!(matches!(&body[0], Stmt::Labeled(l) if l.label == "pre"));
    }

    #[test]
    fn test_parse_class_rejects_inheritance() {
        let err = parse("class A extends B {}").unwrap_err();
        assert!(err.to_string().contains("Expected '{'"));
    }

    #[test]
    fn test_parse_object_method_shorthand() {
        let expr = parse_expression("{ m(x) { return x; }, n: 1, async load() {} }").unwrap();
        let Expr::Object(properties) = expr else {
            panic!("expected object");
        };
        assert!(properties[0].method);
        assert!(matches!(&properties[0].value, Expr::Function(f) if f.params == vec!["x".to_string()]));
        assert!(!properties[1].method);
        assert!(matches!(&properties[2].value, Expr::Function(f) if f.is_async));
    }

    #[test]
    fn test_parse_switch() {
        let stmt = first_stmt(
            "switch (kind) {\n  case 'a':\n  case 'b':\n    return 1;\n  default:\n    x++;\n    return 2;\n}",
        );
        let Stmt::Switch { cases, .. } = stmt else {
            panic!("expected switch");
        };
        assert_eq!(cases.len(), 3);
        assert!(cases[0].consequent.is_empty());
        assert!(cases[2].test.is_none());
        assert_eq!(cases[2].consequent.len(), 2);
    }

    #[test]
    fn test_parse_switch_rejects_second_default() {
        assert!(parse("switch (x) { default: break; default: break; }").is_err());
    }

    #[test]
    fn test_number_keeps_source_text() {
        let expr = parse_expression("1.50").unwrap();
        assert_eq!(
            expr,
            Expr::Number {
                value: 1.5,
                raw: Some("1.50".into())
            }
        );
    }

    #[test]
    fn test_parse_generator_and_async() {
        let program = parse("function* gen() { yield 1; }\nasync function load() { await fetch(); }").unwrap();
        assert!(matches!(&program.body[0], Stmt::Function(f) if f.is_generator));
        assert!(matches!(&program.body[1], Stmt::Function(f) if f.is_async));
    }

    #[test]
    fn test_unclosed_block_reports_location() {
        let err = parse("function f() {\n  return 1;").unwrap_err();
        assert!(err.to_string().contains("Expected '}'"));
    }

    #[test]
    fn test_parse_determinism_100_iterations() {
        let input = "function demo(input) { pre: { input > 0; input < 10, 'small'; } return input; }";
        let first = parse(input).unwrap();
        for i in 0..100 {
            assert_eq!(first, parse(input).unwrap(), "Determinism failure at iteration {}", i);
        }
    }
}
