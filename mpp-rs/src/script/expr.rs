//! Expression lexer, AST, parser, and evaluator.
//!
//! Conditions of `#IF`/`#ELSEIF` and right-hand sides of `#SET` are evaluated
//! in two steps:
//!
//! 1. [`substitute_names`] rewrites every whole-word, case-insensitive
//!    occurrence of a defined variable name into a literal of its value.
//!    Quoted string literals in the expression are left alone.
//! 2. The resulting text is parsed and evaluated by a small recursive-descent
//!    evaluator.  Nothing outside the grammar below can run.
//!
//! Operator precedence (lowest → highest):
//!   ternary  →  or  →  and  →  equality  →  relational  →
//!   additive  →  multiplicative  →  unary  →  primary
//!
//! `and`, `or`, `not`, `true` and `false` are keywords (any case).  An
//! identifier that survives substitution is an error; conditions that are only
//! a list of names go through [`presence_test`] instead.

use std::borrow::Cow;
use std::cmp::Ordering;

use regex::{Captures, Regex};

use super::error::EvalError;
use super::looping::is_identifier;
use super::token::split_directive_tokens;
use super::value::Value;
use crate::var::VarStore;

// ── Pre-substitution ──────────────────────────────────────────────────────────

/// Literal form of `value` inside an expression.
fn literal(value: &Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        v if v.is_numeric() => {
            // "5." and " 7" are numeric strings the lexer cannot read back.
            let text = v.to_number().unwrap_or_else(|| v.clone()).to_string();
            if text.starts_with('-') {
                format!("({text})")
            } else {
                text
            }
        }
        v => {
            let mut s = String::from("\"");
            for c in v.to_string().chars() {
                if c == '"' || c == '\\' {
                    s.push('\\');
                }
                s.push(c);
            }
            s.push('"');
            s
        }
    }
}

/// Compiled matcher for the variable names of one [`VarStore`].
///
/// Compiling costs a regex build, so a parse keeps one and rebuilds it only
/// when a new name is defined.  Rebinding an existing name needs no rebuild:
/// values are looked up at substitution time.
#[derive(Debug, Clone, Default)]
pub struct NamePattern {
    re: Option<Regex>,
}

impl NamePattern {
    pub fn new(vars: &VarStore) -> Self {
        if vars.is_empty() {
            return NamePattern::default();
        }
        // Longest names first so that alternation prefers them.
        let mut names: Vec<&str> = vars.names().collect();
        names.sort_by_key(|n| std::cmp::Reverse(n.len()));
        let alternation = names
            .iter()
            .map(|n| regex::escape(n))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|\b(?i:({alternation}))\b"#);
        match Regex::new(&pattern) {
            Ok(re) => NamePattern { re: Some(re) },
            Err(e) => {
                tracing::warn!(error = %e, "cannot build variable substitution pattern");
                NamePattern::default()
            }
        }
    }

    /// Replace names in `src` with literals of their current values in `vars`.
    pub fn substitute<'a>(&self, src: &'a str, vars: &VarStore) -> Cow<'a, str> {
        let Some(re) = &self.re else {
            return Cow::Borrowed(src);
        };
        re.replace_all(src, |caps: &Captures<'_>| match caps.get(1) {
            Some(name) => vars
                .lookup(name.as_str())
                .map(literal)
                .unwrap_or_else(|| name.as_str().to_owned()),
            None => caps[0].to_owned(),
        })
    }
}

/// Replace defined variable names in `src` with literals of their values.
pub fn substitute_names<'a>(src: &'a str, vars: &VarStore) -> Cow<'a, str> {
    NamePattern::new(vars).substitute(src, vars)
}

/// Words the lexer reads as operators or literals rather than names.
fn is_keyword(word: &str) -> bool {
    ["and", "or", "not", "true", "false"]
        .iter()
        .any(|k| word.eq_ignore_ascii_case(k))
}

/// Presence form of a condition: `a, b c` is true when any listed variable is
/// defined and truthy.  An undefined name counts as false.
///
/// Returns `None` when `src` is not a plain list of names, in which case it is
/// an expression.
pub fn presence_test(src: &str, vars: &VarStore) -> Option<bool> {
    let names = split_directive_tokens(src);
    names
        .iter()
        .all(|n| is_identifier(n) && !is_keyword(n))
        .then(|| names.iter().any(|n| vars.lookup(n).is_some_and(Value::as_bool)))
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,

    // Comparison
    Eq, // ==
    Ne, // != or <>
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And, // && / and
    Or,  // || / or

    // Misc
    Assign,
    Question,
    Colon,
    LParen,
    RParen,
    Unknown(char),
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Int(n) => n.to_string(),
            Token::Float(x) => x.to_string(),
            Token::Str(s) => format!("\"{s}\""),
            Token::Ident(s) => s.clone(),
            Token::Unknown(c) => format!("'{c}'"),
            Token::Eof => "end of expression".to_owned(),
            other => format!("{other:?}"),
        }
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer {
    src: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(src: &str) -> Self {
        Lexer {
            src: src.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.src.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn read_number(&mut self, first: char) -> Token {
        let mut s = String::new();
        s.push(first);
        let mut is_float = false;

        // Hex literal
        if first == '0' && matches!(self.peek(), Some('x' | 'X'))
            && matches!(self.peek2(), Some(c) if c.is_ascii_hexdigit())
        {
            self.pos += 1;
            let mut hex = String::new();
            while let Some(c) = self.peek().filter(char::is_ascii_hexdigit) {
                hex.push(c);
                self.pos += 1;
            }
            return match i64::from_str_radix(&hex, 16) {
                Ok(n) => Token::Int(n),
                Err(_) => Token::Float(u128::from_str_radix(&hex, 16).map(|n| n as f64).unwrap_or(f64::MAX)),
            };
        }

        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            s.push(c);
            self.pos += 1;
        }
        if self.peek() == Some('.') && matches!(self.peek2(), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            s.push('.');
            self.pos += 1;
            while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                s.push(c);
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let exp_digits = match self.peek2() {
                Some(c) if c.is_ascii_digit() => true,
                Some('+' | '-') => matches!(self.src.get(self.pos + 2), Some(c) if c.is_ascii_digit()),
                _ => false,
            };
            if exp_digits {
                is_float = true;
                s.push('e');
                self.pos += 1;
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    s.push(sign);
                    self.pos += 1;
                }
                while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                    s.push(c);
                    self.pos += 1;
                }
            }
        }

        if !is_float {
            if let Ok(n) = s.parse::<i64>() {
                return Token::Int(n);
            }
        }
        // Integers too large for i64 degrade to reals.
        Token::Float(s.parse().unwrap_or(f64::MAX))
    }

    fn read_string(&mut self, quote: char) -> Result<Token, EvalError> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(EvalError::Syntax("unterminated string literal".into())),
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(c) => s.push(c),
                    None => return Err(EvalError::Syntax("unterminated string literal".into())),
                },
                Some(c) if c == quote => break,
                Some(c) => s.push(c),
            }
        }
        Ok(Token::Str(s))
    }

    fn read_ident(&mut self, first: char) -> Token {
        let mut s = String::new();
        s.push(first);
        while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
            s.push(c);
            self.pos += 1;
        }
        if s.eq_ignore_ascii_case("and") {
            Token::And
        } else if s.eq_ignore_ascii_case("or") {
            Token::Or
        } else if s.eq_ignore_ascii_case("not") {
            Token::Bang
        } else {
            Token::Ident(s)
        }
    }

    fn next_token(&mut self) -> Result<Token, EvalError> {
        self.skip_ws();
        let ch = match self.advance() {
            None => return Ok(Token::Eof),
            Some(c) => c,
        };

        Ok(match ch {
            '0'..='9' => self.read_number(ch),
            '.' if matches!(self.peek(), Some(c) if c.is_ascii_digit()) => {
                self.pos -= 1;
                self.read_number('0')
            }
            '"' | '\'' => self.read_string(ch)?,
            c if c.is_alphabetic() || c == '_' => self.read_ident(c),
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '!' => {
                if self.eat('=') {
                    Token::Ne
                } else {
                    Token::Bang
                }
            }
            '&' => {
                if self.eat('&') {
                    Token::And
                } else {
                    Token::Unknown('&')
                }
            }
            '|' => {
                if self.eat('|') {
                    Token::Or
                } else {
                    Token::Unknown('|')
                }
            }
            '<' => {
                if self.eat('=') {
                    Token::Le
                } else if self.eat('>') {
                    Token::Ne
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '=' => {
                if self.eat('=') {
                    Token::Eq
                } else {
                    Token::Assign
                }
            }
            '?' => Token::Question,
            ':' => Token::Colon,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c => Token::Unknown(c),
        })
    }

    fn tokenize(mut self) -> Result<Vec<Token>, EvalError> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token()?;
            let done = matches!(t, Token::Eof);
            tokens.push(t);
            if done {
                break;
            }
        }
        Ok(tokens)
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Nesting ceiling for parentheses and unary chains.
const MAX_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn descend(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EvalError::Syntax("expression nested too deeply".into()));
        }
        Ok(())
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr, EvalError> {
        self.descend()?;
        let e = self.parse_ternary();
        self.depth -= 1;
        e
    }

    fn parse_ternary(&mut self) -> Result<Expr, EvalError> {
        let cond = self.parse_or()?;
        if self.eat(&Token::Question) {
            let then = self.parse_expr()?;
            if !self.eat(&Token::Colon) {
                return Err(EvalError::Syntax("expected ':' in ternary".into()));
            }
            let else_ = self.parse_expr()?;
            Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(else_)))
        } else {
            Ok(cond)
        }
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinOp::Eq,
                Token::Ne => BinOp::Ne,
                Token::Assign => {
                    return Err(EvalError::Syntax("unexpected '=' (use '==' to compare)".into()))
                }
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinOp::Lt,
                Token::Le => BinOp::Le,
                Token::Gt => BinOp::Gt,
                Token::Ge => BinOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Bang => UnaryOp::Not,
            Token::Plus => {
                self.pos += 1;
                self.descend()?;
                let inner = self.parse_unary();
                self.depth -= 1;
                return inner;
            }
            _ => return self.parse_primary(),
        };
        self.pos += 1;
        self.descend()?;
        let inner = self.parse_unary();
        self.depth -= 1;
        Ok(Expr::Unary(op, Box::new(inner?)))
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Token::Int(n) => Ok(Expr::Literal(Value::Int(n))),
            Token::Float(x) => Ok(Expr::Literal(Value::Float(x))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::Ident(name) if name.eq_ignore_ascii_case("true") => Ok(Expr::Literal(Value::Bool(true))),
            Token::Ident(name) if name.eq_ignore_ascii_case("false") => Ok(Expr::Literal(Value::Bool(false))),
            Token::Ident(name) => Err(EvalError::UnknownIdentifier(name)),
            Token::LParen => {
                let inner = self.parse_expr()?;
                if !self.eat(&Token::RParen) {
                    return Err(EvalError::Syntax("expected ')'".into()));
                }
                Ok(inner)
            }
            other => Err(EvalError::Syntax(format!("unexpected {}", other.describe()))),
        }
    }
}

/// Parse an expression string (after pre-substitution) into an AST.
pub fn parse_expr(src: &str) -> Result<Expr, EvalError> {
    let tokens = Lexer::new(src).tokenize()?;
    if matches!(tokens.first(), Some(Token::Eof) | None) {
        return Err(EvalError::Empty);
    }
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(EvalError::Syntax(format!("unexpected {}", other.describe()))),
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Evaluate an [`Expr`] AST node.
pub fn eval_expr(expr: &Expr) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),

        Expr::Unary(op, inner) => {
            let v = eval_expr(inner)?;
            match op {
                UnaryOp::Neg => v.arith_neg(),
                UnaryOp::Not => Ok(Value::Bool(!v.as_bool())),
            }
        }

        Expr::Binary(op, lhs, rhs) => {
            // Short-circuit for && and ||
            match op {
                BinOp::And => {
                    if !eval_expr(lhs)?.as_bool() {
                        return Ok(Value::Bool(false));
                    }
                    return Ok(Value::Bool(eval_expr(rhs)?.as_bool()));
                }
                BinOp::Or => {
                    if eval_expr(lhs)?.as_bool() {
                        return Ok(Value::Bool(true));
                    }
                    return Ok(Value::Bool(eval_expr(rhs)?.as_bool()));
                }
                _ => {}
            }
            let l = eval_expr(lhs)?;
            let r = eval_expr(rhs)?;
            eval_binop(*op, &l, &r)
        }

        Expr::Ternary(cond, then, else_) => {
            if eval_expr(cond)?.as_bool() {
                eval_expr(then)
            } else {
                eval_expr(else_)
            }
        }
    }
}

fn eval_binop(op: BinOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => l.arith_add(r),
        BinOp::Sub => l.arith_sub(r),
        BinOp::Mul => l.arith_mul(r),
        BinOp::Div => l.arith_div(r),
        BinOp::Rem => l.arith_rem(r),
        BinOp::Eq => Ok(Value::Bool(l.loose_eq(r))),
        BinOp::Ne => Ok(Value::Bool(!l.loose_eq(r))),
        BinOp::Lt => Ok(Value::Bool(l.cmp_value(r) == Ordering::Less)),
        BinOp::Le => Ok(Value::Bool(l.cmp_value(r) != Ordering::Greater)),
        BinOp::Gt => Ok(Value::Bool(l.cmp_value(r) == Ordering::Greater)),
        BinOp::Ge => Ok(Value::Bool(l.cmp_value(r) != Ordering::Less)),
        BinOp::And | BinOp::Or => unreachable!("short-circuited in eval_expr"),
    }
}

/// Parse and evaluate an expression that has no variable names left in it.
pub fn eval_str(src: &str) -> Result<Value, EvalError> {
    let expr = parse_expr(src)?;
    eval_expr(&expr)
}

/// Substitute `vars` into `src`, then evaluate the result.
pub fn evaluate(src: &str, vars: &VarStore) -> Result<Value, EvalError> {
    evaluate_with(src, vars, &NamePattern::new(vars))
}

/// [`evaluate`] with a prebuilt [`NamePattern`] for `vars`.
pub fn evaluate_with(src: &str, vars: &VarStore, names: &NamePattern) -> Result<Value, EvalError> {
    let text = names.substitute(src, vars);
    eval_str(&text)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> Value {
        eval_str(src).expect("eval failed")
    }

    fn eval_with(src: &str, vars: &[(&str, Value)]) -> Result<Value, EvalError> {
        let store: VarStore = vars.iter().cloned().collect();
        evaluate(src, &store)
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn literals() {
        assert_eq!(eval("42"), Value::Int(42));
        assert_eq!(eval("3.14"), Value::Float(3.14));
        assert_eq!(eval("\"hello\""), Value::Str("hello".into()));
        assert_eq!(eval("TRUE"), Value::Bool(true));
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("2 + 3"), Value::Int(5));
        assert_eq!(eval("10 - 4"), Value::Int(6));
        assert_eq!(eval("3 * 4"), Value::Int(12));
        assert_eq!(eval("10 / 4"), Value::Float(2.5));
        assert_eq!(eval("10 % 3"), Value::Int(1));
        assert_eq!(eval("0x10 + 1"), Value::Int(17));
    }

    #[test]
    fn precedence() {
        assert_eq!(eval("2 + 3 * 4"), Value::Int(14));
        assert_eq!(eval("(2 + 3) * 4"), Value::Int(20));
        assert_eq!(eval("1 + 1 == 2 && 3 > 2"), Value::Bool(true));
    }

    #[test]
    fn unary() {
        assert_eq!(eval("-5"), Value::Int(-5));
        assert_eq!(eval("-(3 + 2)"), Value::Int(-5));
        assert_eq!(eval("!0"), Value::Bool(true));
        assert_eq!(eval("not 1"), Value::Bool(false));
        assert_eq!(eval("2 - -3"), Value::Int(5));
    }

    #[test]
    fn comparison() {
        assert_eq!(eval("3 == 3"), Value::Bool(true));
        assert_eq!(eval("3 != 4"), Value::Bool(true));
        assert_eq!(eval("3 <> 3"), Value::Bool(false));
        assert_eq!(eval("2 < 3"), Value::Bool(true));
        assert_eq!(eval("3 >= 3"), Value::Bool(true));
        assert_eq!(eval("\"de\" == 'de'"), Value::Bool(true));
        assert_eq!(eval("\"10\" > 9"), Value::Bool(true));
    }

    #[test]
    fn logical_keywords() {
        assert_eq!(eval("1 and 0"), Value::Bool(false));
        assert_eq!(eval("0 OR 1"), Value::Bool(true));
        assert_eq!(eval("1 && 1"), Value::Bool(true));
        assert_eq!(eval("0 || 0"), Value::Bool(false));
    }

    #[test]
    fn short_circuit_skips_errors() {
        assert_eq!(eval("0 && 1 / 0"), Value::Bool(false));
        assert_eq!(eval("1 || 1 / 0"), Value::Bool(true));
    }

    #[test]
    fn ternary() {
        assert_eq!(eval("1 ? 10 : 20"), Value::Int(10));
        assert_eq!(eval("0 ? 10 : 0 ? 20 : 30"), Value::Int(30));
    }

    #[test]
    fn variables_substituted() {
        assert_eq!(eval_with("x + 1", &[("x", Value::Int(2))]), Ok(Value::Int(3)));
        assert_eq!(
            eval_with("lang == \"de\"", &[("lang", Value::Str("de".into()))]),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn variable_names_are_case_insensitive() {
        assert_eq!(eval_with("X * 2", &[("x", Value::Int(4))]), Ok(Value::Int(8)));
    }

    #[test]
    fn substitution_respects_word_boundaries() {
        let store: VarStore = [("x", Value::Int(1))].into_iter().collect();
        assert_eq!(substitute_names("x + xx + x_1 + ax", &store), "1 + xx + x_1 + ax");
    }

    #[test]
    fn substitution_skips_string_literals() {
        let store: VarStore = [("x", Value::Int(2))].into_iter().collect();
        assert_eq!(substitute_names(r#"x == "x" or 'x' == x"#, &store), r#"2 == "x" or 'x' == 2"#);
    }

    #[test]
    fn substituted_forms() {
        let store: VarStore = [
            ("n", Value::Int(-3)),
            ("s", Value::Str("say \"hi\"".into())),
            ("b", Value::Bool(true)),
            ("ns", Value::Str("12".into())),
        ]
        .into_iter()
        .collect();
        assert_eq!(substitute_names("n s b ns", &store), r#"(-3) "say \"hi\"" true 12"#);
        assert_eq!(evaluate("s", &store), Ok(Value::Str("say \"hi\"".into())));
        assert_eq!(evaluate("2 * n", &store), Ok(Value::Int(-6)));
        assert_eq!(evaluate("ns + 1", &store), Ok(Value::Int(13)));
    }

    #[test]
    fn numeric_strings_substitute_canonically() {
        let store: VarStore = [("v", Value::Str("5.".into())), ("w", Value::Str(" 7".into()))]
            .into_iter()
            .collect();
        assert_eq!(substitute_names("v w", &store), "5 7");
        assert_eq!(evaluate("v > 1", &store), Ok(Value::Bool(true)));
        assert_eq!(evaluate("w * 2", &store), Ok(Value::Int(14)));
    }

    #[test]
    fn name_pattern_sees_rebound_values() {
        let mut store: VarStore = [("i", Value::Int(1))].into_iter().collect();
        let names = NamePattern::new(&store);
        assert_eq!(evaluate_with("i * 10", &store, &names), Ok(Value::Int(10)));
        store.set("i", Value::Int(4));
        assert_eq!(evaluate_with("i * 10", &store, &names), Ok(Value::Int(40)));
        assert_eq!(NamePattern::default().substitute("i", &store), "i");
    }

    #[test]
    fn presence_lists() {
        let store: VarStore = [("a", Value::Int(1)), ("off", Value::Int(0))].into_iter().collect();
        assert_eq!(presence_test("a, b", &store), Some(true));
        assert_eq!(presence_test("b c", &store), Some(false));
        assert_eq!(presence_test("feature", &store), Some(false));
        assert_eq!(presence_test("off", &store), Some(false));
        assert_eq!(presence_test("A", &store), Some(true));
        // Anything else is an expression.
        assert_eq!(presence_test("a == 1", &store), None);
        assert_eq!(presence_test("not a", &store), None);
        assert_eq!(presence_test("true", &store), None);
        assert_eq!(presence_test("\"a\"", &store), None);
    }

    #[test]
    fn unknown_identifier() {
        assert_eq!(eval_with("missing", &[]), Err(EvalError::UnknownIdentifier("missing".into())));
    }

    #[test]
    fn syntax_errors() {
        assert!(matches!(eval_str("1 +"), Err(EvalError::Syntax(_))));
        assert!(matches!(eval_str("(1"), Err(EvalError::Syntax(_))));
        assert!(matches!(eval_str("1 2"), Err(EvalError::Syntax(_))));
        assert!(matches!(eval_str("x = 1"), Err(EvalError::UnknownIdentifier(_))));
        assert!(matches!(eval_str("1 = 1"), Err(EvalError::Syntax(_))));
        assert!(matches!(eval_str("\"open"), Err(EvalError::Syntax(_))));
        assert!(matches!(eval_str("1 & 2"), Err(EvalError::Syntax(_))));
        assert_eq!(eval_str("   "), Err(EvalError::Empty));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let src = format!("{}1{}", "(".repeat(1000), ")".repeat(1000));
        assert!(matches!(eval_str(&src), Err(EvalError::Syntax(_))));
    }

    #[test]
    fn evaluation_errors() {
        assert_eq!(eval_str("1 / 0"), Err(EvalError::DivisionByZero));
        assert!(matches!(eval_str("\"a\" * 2"), Err(EvalError::Type { .. })));
    }

    #[test]
    fn large_integers_degrade_to_real() {
        assert_eq!(eval("99999999999999999999"), Value::Float(1e20));
    }
}
