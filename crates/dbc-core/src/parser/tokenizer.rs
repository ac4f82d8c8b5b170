//! Tokenizer — converts source text into a token stream
//!
//! Handles: keywords, identifiers, string literals (single and double
//! quoted), numeric literals, punctuators and operators.
//! Comments (`//` and `/* */`) are discarded.
//!
//! Guarantees:
//! - Deterministic: same input always produces same token stream
//! - Every error carries line:column

use super::ast::Quote;

/// Token types for the supported source subset
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Function,
    Return,
    If,
    Else,
    While,
    Do,
    For,
    Var,
    Let,
    Const,
    Throw,
    Try,
    Catch,
    Finally,
    Break,
    Continue,
    New,
    Typeof,
    Void,
    Delete,
    In,
    Instanceof,
    Yield,
    Await,
    Async,
    Export,
    Default,
    Class,
    This,
    Switch,
    Case,

    // Literals
    StringLiteral(String, Quote),
    /// Value and source text
    NumberLiteral(f64, String),
    BooleanLiteral(bool),
    Null,

    // Punctuators
    LBrace,    // {
    RBrace,    // }
    LParen,    // (
    RParen,    // )
    LBracket,  // [
    RBracket,  // ]
    Semicolon, // ;
    Comma,     // ,
    Dot,       // .
    Colon,     // :
    Question,  // ?
    Arrow,     // =>

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Bang,
    Tilde,
    Lt,
    Gt,
    LtEq,
    GtEq,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    AndAnd,
    OrOr,
    QuestionQuestion,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    StarStarAssign,

    // Other
    Identifier(String),
    Eof,
}

/// Position in source text for error reporting
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Token with source position
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Tokenizer for source text
pub struct Tokenizer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Tokenizer {
    /// Create a new tokenizer for the given input text
    pub fn new(text: &str) -> Self {
        Tokenizer {
            input: text.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire input into a stream of spanned tokens
    pub fn tokenize(&mut self) -> crate::Result<Vec<SpannedToken>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments()?;

            if self.is_at_end() {
                tokens.push(SpannedToken {
                    token: Token::Eof,
                    span: self.current_span(),
                });
                break;
            }

            let token = self.next_token()?;
            tokens.push(token);
        }

        Ok(tokens)
    }

    // ── Character helpers ──────────────────────────────────

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_ahead(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.input.get(self.position).copied();
        if let Some(c) = ch {
            self.position += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        ch
    }

    /// Consume `expected` if it is the next character
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current_span(&self) -> Span {
        Span {
            line: self.line,
            column: self.column,
            offset: self.position,
        }
    }

    // ── Whitespace & Comments ──────────────────────────────

    fn skip_whitespace_and_comments(&mut self) -> crate::Result<()> {
        loop {
            while let Some(ch) = self.peek() {
                if ch.is_whitespace() {
                    self.advance();
                } else {
                    break;
                }
            }

            // Line comments: //
            if self.peek() == Some('/') && self.peek_ahead(1) == Some('/') {
                while let Some(ch) = self.peek() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
                continue;
            }

            // Block comments: /* ... */
            if self.peek() == Some('/') && self.peek_ahead(1) == Some('*') {
                let span = self.current_span();
                self.advance();
                self.advance();
                loop {
                    match self.advance() {
                        None => {
                            return Err(crate::Error::ParseError(format!(
                                "Unterminated comment starting at {}",
                                span
                            )));
                        }
                        Some('*') if self.peek() == Some('/') => {
                            self.advance();
                            break;
                        }
                        Some(_) => {}
                    }
                }
                continue;
            }

            break;
        }
        Ok(())
    }

    // ── Main dispatch ──────────────────────────────────────

    fn next_token(&mut self) -> crate::Result<SpannedToken> {
        let span = self.current_span();
        let Some(ch) = self.peek() else {
            return Ok(SpannedToken { token: Token::Eof, span });
        };

        if ch == '"' || ch == '\'' {
            return self.read_string(span);
        }
        if ch.is_ascii_digit() || (ch == '.' && self.peek_ahead(1).is_some_and(|c| c.is_ascii_digit())) {
            return self.read_number(span);
        }
        if is_identifier_start(ch) {
            return Ok(self.read_identifier_or_keyword(span));
        }

        self.advance();
        let token = match ch {
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ';' => Token::Semicolon,
            ',' => Token::Comma,
            '.' => Token::Dot,
            ':' => Token::Colon,
            '~' => Token::Tilde,
            '?' => {
                if self.eat('?') {
                    Token::QuestionQuestion
                } else {
                    Token::Question
                }
            }
            '+' => {
                if self.eat('+') {
                    Token::PlusPlus
                } else if self.eat('=') {
                    Token::PlusAssign
                } else {
                    Token::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    Token::MinusMinus
                } else if self.eat('=') {
                    Token::MinusAssign
                } else {
                    Token::Minus
                }
            }
            '*' => {
                if self.eat('*') {
                    if self.eat('=') {
                        Token::StarStarAssign
                    } else {
                        Token::StarStar
                    }
                } else if self.eat('=') {
                    Token::StarAssign
                } else {
                    Token::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    Token::SlashAssign
                } else {
                    Token::Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    Token::PercentAssign
                } else {
                    Token::Percent
                }
            }
            '<' => {
                if self.eat('=') {
                    Token::LtEq
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            '=' => {
                if self.eat('>') {
                    Token::Arrow
                } else if self.eat('=') {
                    if self.eat('=') {
                        Token::EqEqEq
                    } else {
                        Token::EqEq
                    }
                } else {
                    Token::Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        Token::NotEqEq
                    } else {
                        Token::NotEq
                    }
                } else {
                    Token::Bang
                }
            }
            '&' if self.eat('&') => Token::AndAnd,
            '|' if self.eat('|') => Token::OrOr,
            _ => {
                return Err(crate::Error::ParseError(format!(
                    "Unexpected character '{}' at {}",
                    ch, span
                )));
            }
        };

        Ok(SpannedToken { token, span })
    }

    // ── String literals ────────────────────────────────────

    fn read_string(&mut self, span: Span) -> crate::Result<SpannedToken> {
        let (quote, delimiter) = match self.advance() {
            Some('\'') => (Quote::Single, '\''),
            _ => (Quote::Double, '"'),
        };
        let mut value = String::new();

        loop {
            match self.advance() {
                None | Some('\n') => {
                    return Err(crate::Error::ParseError(format!(
                        "Unterminated string starting at {}",
                        span
                    )));
                }
                Some(c) if c == delimiter => break,
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('0') => value.push('\0'),
                    Some(c @ ('\\' | '"' | '\'')) => value.push(c),
                    Some(c) => {
                        return Err(crate::Error::ParseError(format!(
                            "Invalid escape sequence '\\{}' at {}",
                            c,
                            self.current_span()
                        )));
                    }
                    None => {
                        return Err(crate::Error::ParseError(format!(
                            "Unterminated escape sequence at {}",
                            self.current_span()
                        )));
                    }
                },
                Some(c) => value.push(c),
            }
        }

        Ok(SpannedToken {
            token: Token::StringLiteral(value, quote),
            span,
        })
    }

    // ── Numbers ────────────────────────────────────────────

    fn read_number(&mut self, span: Span) -> crate::Result<SpannedToken> {
        let start = self.position;

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text: String = self.input[start..self.position].iter().collect();
        if self.peek().is_some_and(is_identifier_start) {
            return Err(crate::Error::ParseError(format!(
                "Identifier directly after number '{}' at {}",
                text, span
            )));
        }

        let value: f64 = text.parse().map_err(|_| {
            crate::Error::ParseError(format!("Invalid number '{}' at {}", text, span))
        })?;
        Ok(SpannedToken {
            token: Token::NumberLiteral(value, text),
            span,
        })
    }

    // ── Identifiers & Keywords ─────────────────────────────

    fn read_identifier_or_keyword(&mut self, span: Span) -> SpannedToken {
        let start = self.position;

        while self.peek().is_some_and(is_identifier_part) {
            self.advance();
        }

        let text: String = self.input[start..self.position].iter().collect();

        let token = match text.as_str() {
            "function" => Token::Function,
            "return" => Token::Return,
            "if" => Token::If,
            "else" => Token::Else,
            "while" => Token::While,
            "do" => Token::Do,
            "for" => Token::For,
            "var" => Token::Var,
            "let" => Token::Let,
            "const" => Token::Const,
            "throw" => Token::Throw,
            "try" => Token::Try,
            "catch" => Token::Catch,
            "finally" => Token::Finally,
            "break" => Token::Break,
            "continue" => Token::Continue,
            "new" => Token::New,
            "typeof" => Token::Typeof,
            "void" => Token::Void,
            "delete" => Token::Delete,
            "in" => Token::In,
            "instanceof" => Token::Instanceof,
            "yield" => Token::Yield,
            "await" => Token::Await,
            "async" => Token::Async,
            "export" => Token::Export,
            "default" => Token::Default,
            "class" => Token::Class,
            "this" => Token::This,
            "switch" => Token::Switch,
            "case" => Token::Case,

            "true" => Token::BooleanLiteral(true),
            "false" => Token::BooleanLiteral(false),
            "null" => Token::Null,

            // Everything else is an identifier
            _ => Token::Identifier(text),
        };

        SpannedToken { token, span }
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_identifier_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}
