//! Expression module - the restricted setpoint language over `x`
//!
//! User-supplied setpoint text is compiled to a small AST instead of being
//! evaluated as code. Grammar: `+ - * /`, right-associative `^`, unary
//! minus, parentheses, the variable `x`, the constants `pi`, `e`, `tau`,
//! and a fixed table of unary functions.

use thiserror::Error;

// ============================================================================
// EXPRESSION ERROR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("malformed number at position {pos}")]
    BadNumber { pos: usize },
    #[error("unexpected token at position {pos}")]
    UnexpectedToken { pos: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unknown identifier '{name}' at position {pos}")]
    UnknownIdent { name: String, pos: usize },
    #[error("expected ')' at position {pos}")]
    ExpectedClose { pos: usize },
    #[error("trailing input at position {pos}")]
    TrailingInput { pos: usize },
}

// ============================================================================
// TOKENIZER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let pos = i;
        match ch {
            c if c.is_whitespace() => {
                i += 1;
            }
            '+' => {
                tokens.push((Token::Plus, pos));
                i += 1;
            }
            '-' => {
                tokens.push((Token::Minus, pos));
                i += 1;
            }
            '*' => {
                tokens.push((Token::Star, pos));
                i += 1;
            }
            '/' => {
                tokens.push((Token::Slash, pos));
                i += 1;
            }
            '^' => {
                tokens.push((Token::Caret, pos));
                i += 1;
            }
            '(' => {
                tokens.push((Token::LParen, pos));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, pos));
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let begin = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[begin..i].iter().collect();
                let value: f64 = text.parse().map_err(|_| ExprError::BadNumber { pos })?;
                tokens.push((Token::Number(value), pos));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let begin = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[begin..i].iter().collect();
                tokens.push((Token::Ident(name), pos));
            }
            other => {
                return Err(ExprError::UnexpectedChar { ch: other, pos });
            }
        }
    }

    Ok(tokens)
}

// ============================================================================
// AST
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Sqrt,
    Abs,
    Exp,
    Ln,
    Log10,
    Floor,
    Ceil,
    Round,
    Signum,
}

impl Func {
    fn from_name(name: &str) -> Option<Func> {
        match name {
            "sin" => Some(Func::Sin),
            "cos" => Some(Func::Cos),
            "tan" => Some(Func::Tan),
            "asin" => Some(Func::Asin),
            "acos" => Some(Func::Acos),
            "atan" => Some(Func::Atan),
            "sinh" => Some(Func::Sinh),
            "cosh" => Some(Func::Cosh),
            "tanh" => Some(Func::Tanh),
            "sqrt" => Some(Func::Sqrt),
            "abs" => Some(Func::Abs),
            "exp" => Some(Func::Exp),
            "ln" => Some(Func::Ln),
            "log10" => Some(Func::Log10),
            "floor" => Some(Func::Floor),
            "ceil" => Some(Func::Ceil),
            "round" => Some(Func::Round),
            "signum" => Some(Func::Signum),
            _ => None,
        }
    }

    fn apply(self, v: f64) -> f64 {
        match self {
            Func::Sin => v.sin(),
            Func::Cos => v.cos(),
            Func::Tan => v.tan(),
            Func::Asin => v.asin(),
            Func::Acos => v.acos(),
            Func::Atan => v.atan(),
            Func::Sinh => v.sinh(),
            Func::Cosh => v.cosh(),
            Func::Tanh => v.tanh(),
            Func::Sqrt => v.sqrt(),
            Func::Abs => v.abs(),
            Func::Exp => v.exp(),
            Func::Ln => v.ln(),
            Func::Log10 => v.log10(),
            Func::Floor => v.floor(),
            Func::Ceil => v.ceil(),
            Func::Round => v.round(),
            Func::Signum => v.signum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Var,
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

fn eval_node(expr: &Expr, x: f64) -> f64 {
    match expr {
        Expr::Num(v) => *v,
        Expr::Var => x,
        Expr::Neg(inner) => -eval_node(inner, x),
        Expr::Binary(op, lhs, rhs) => {
            let a = eval_node(lhs, x);
            let b = eval_node(rhs, x);
            match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::Pow => a.powf(b),
            }
        }
        Expr::Call(func, arg) => func.apply(eval_node(arg, x)),
    }
}

// ============================================================================
// PARSER - Recursive descent over the token stream
// ============================================================================

struct Parser {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
    end: usize,
}

impl Parser {
    fn new(tokens: Vec<(Token, usize)>, end: usize) -> Self {
        Self {
            tokens,
            cursor: 0,
            end,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(t, _)| t)
    }

    fn pos(&self) -> usize {
        self.tokens
            .get(self.cursor)
            .map(|(_, p)| *p)
            .unwrap_or(self.end)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).map(|(t, _)| t.clone());
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    // expr := term (('+'|'-') term)*
    fn expr(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // term := factor (('*'|'/') factor)*
    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.bump();
            let rhs = self.factor()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // factor := unary ('^' factor)?   -- right-associative
    fn factor(&mut self) -> Result<Expr, ExprError> {
        let base = self.unary()?;
        if let Some(Token::Caret) = self.peek() {
            self.bump();
            let exponent = self.factor()?;
            return Ok(Expr::Binary(
                BinOp::Pow,
                Box::new(base),
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    // unary := '-' unary | primary
    fn unary(&mut self) -> Result<Expr, ExprError> {
        if let Some(Token::Minus) = self.peek() {
            self.bump();
            let inner = self.unary()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.primary()
    }

    // primary := number | 'x' | const | ident '(' expr ')' | '(' expr ')'
    fn primary(&mut self) -> Result<Expr, ExprError> {
        let pos = self.pos();
        match self.bump() {
            Some(Token::Number(v)) => Ok(Expr::Num(v)),
            Some(Token::Ident(name)) => match name.as_str() {
                "x" => Ok(Expr::Var),
                "pi" => Ok(Expr::Num(std::f64::consts::PI)),
                "e" => Ok(Expr::Num(std::f64::consts::E)),
                "tau" => Ok(Expr::Num(std::f64::consts::TAU)),
                other => {
                    let func = Func::from_name(other)
                        .ok_or_else(|| ExprError::UnknownIdent {
                            name: other.to_string(),
                            pos,
                        })?;
                    match self.bump() {
                        Some(Token::LParen) => {}
                        Some(_) => return Err(ExprError::UnexpectedToken { pos: self.pos() }),
                        None => return Err(ExprError::UnexpectedEnd),
                    }
                    let arg = self.expr()?;
                    match self.bump() {
                        Some(Token::RParen) => Ok(Expr::Call(func, Box::new(arg))),
                        Some(_) => Err(ExprError::ExpectedClose { pos: self.pos() }),
                        None => Err(ExprError::UnexpectedEnd),
                    }
                }
            },
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    Some(_) => Err(ExprError::ExpectedClose { pos: self.pos() }),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some(_) => Err(ExprError::UnexpectedToken { pos }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

// ============================================================================
// SETPOINT FUNCTION - Compiled expression plus its source text
// ============================================================================

/// A compiled setpoint function of the time coordinate `x`.
///
/// Compilation failures leave whatever function was previously installed in
/// effect; the caller surfaces the error message and carries on.
#[derive(Debug, Clone)]
pub struct SetpointFn {
    source: String,
    root: Expr,
}

pub const DEFAULT_SETPOINT: &str = "sin(x)";

impl SetpointFn {
    pub fn compile(source: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let mut parser = Parser::new(tokens, source.len());
        let root = parser.expr()?;
        if parser.peek().is_some() {
            return Err(ExprError::TrailingInput { pos: parser.pos() });
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn eval(&self, x: f64) -> f64 {
        eval_node(&self.root, x)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Default for SetpointFn {
    fn default() -> Self {
        SetpointFn::compile(DEFAULT_SETPOINT).expect("default setpoint parses")
    }
}
