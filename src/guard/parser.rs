//! Parser: recursive descent over guard tokens, plus the evaluator for the
//! resulting tree.
//!
//! Precedence, lowest first: `||`, `&&`, equality, ordering, additive,
//! multiplicative, unary.

use super::lexer::{Lexer, Token};
use super::value::{VariableValue, Variables};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(VariableValue),
    Variable(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// Deepest nesting of parentheses and unary operators the parser accepts
pub const MAX_NESTING: usize = 128;
/// Longest token stream accepted; bounds the depth of operator chains
pub const MAX_TOKENS: usize = 4096;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn parse(input: &str) -> Result<Expr, String> {
        let tokens = Lexer::new(input).tokenize()?;
        if tokens.len() > MAX_TOKENS {
            return Err(format!("expression longer than {MAX_TOKENS} tokens"));
        }
        let mut parser = Self {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_or()?;
        match parser.peek() {
            Token::Eof => Ok(expr),
            other => Err(format!("unexpected trailing token {other:?}")),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    // Every recursive path runs through here, so the depth is counted once
    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.depth >= MAX_NESTING {
            return Err("expression nested too deeply".to_string());
        }
        self.depth += 1;
        let result = self.parse_unary_operand();
        self.depth -= 1;
        result
    }

    fn parse_unary_operand(&mut self) -> Result<Expr, String> {
        let op = match self.peek() {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            _ => return self.parse_primary(),
        };
        self.advance();
        let expr = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        let token = self.peek().clone();
        self.advance();
        match token {
            Token::Number(n) => Ok(Expr::Literal(VariableValue::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(VariableValue::String(s))),
            Token::True => Ok(Expr::Literal(VariableValue::Bool(true))),
            Token::False => Ok(Expr::Literal(VariableValue::Bool(false))),
            Token::Ident(name) => Ok(Expr::Variable(name)),
            Token::LParen => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err("missing closing parenthesis".to_string());
                }
                Ok(inner)
            }
            Token::Eof => Err("unexpected end of expression".to_string()),
            other => Err(format!("unexpected token {other:?}")),
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

impl Expr {
    /// Evaluate against `variables` without touching them.
    pub fn eval(&self, variables: &Variables) -> Result<VariableValue, String> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(name) => variables
                .get(name)
                .cloned()
                .ok_or_else(|| format!("unknown variable '{name}'")),
            Expr::Unary { op, expr } => match (op, expr.eval(variables)?) {
                (UnaryOp::Not, VariableValue::Bool(b)) => Ok(VariableValue::Bool(!b)),
                (UnaryOp::Neg, VariableValue::Number(n)) => Ok(VariableValue::Number(-n)),
                (op, value) => Err(format!(
                    "operator {op:?} not applicable to {}",
                    value.type_name()
                )),
            },
            Expr::Binary { op, left, right } => match op {
                BinaryOp::And => {
                    if !expect_bool(left.eval(variables)?, "&&")? {
                        return Ok(VariableValue::Bool(false));
                    }
                    expect_bool(right.eval(variables)?, "&&").map(VariableValue::Bool)
                }
                BinaryOp::Or => {
                    if expect_bool(left.eval(variables)?, "||")? {
                        return Ok(VariableValue::Bool(true));
                    }
                    expect_bool(right.eval(variables)?, "||").map(VariableValue::Bool)
                }
                _ => apply(*op, left.eval(variables)?, right.eval(variables)?),
            },
        }
    }
}

fn expect_bool(value: VariableValue, op: &str) -> Result<bool, String> {
    match value {
        VariableValue::Bool(b) => Ok(b),
        other => Err(format!("'{op}' requires booleans, got {}", other.type_name())),
    }
}

fn apply(op: BinaryOp, left: VariableValue, right: VariableValue) -> Result<VariableValue, String> {
    use VariableValue::{Bool, Number, String as Str};

    let result = match (op, &left, &right) {
        // Different types are simply unequal
        (BinaryOp::Eq, _, _) => Bool(left == right),
        (BinaryOp::NotEq, _, _) => Bool(left != right),

        (BinaryOp::Lt, Number(a), Number(b)) => Bool(a < b),
        (BinaryOp::Le, Number(a), Number(b)) => Bool(a <= b),
        (BinaryOp::Gt, Number(a), Number(b)) => Bool(a > b),
        (BinaryOp::Ge, Number(a), Number(b)) => Bool(a >= b),
        (BinaryOp::Lt, Str(a), Str(b)) => Bool(a < b),
        (BinaryOp::Le, Str(a), Str(b)) => Bool(a <= b),
        (BinaryOp::Gt, Str(a), Str(b)) => Bool(a > b),
        (BinaryOp::Ge, Str(a), Str(b)) => Bool(a >= b),

        (BinaryOp::Add, Number(a), Number(b)) => Number(a + b),
        (BinaryOp::Add, Str(a), Str(b)) => Str(format!("{a}{b}")),
        (BinaryOp::Sub, Number(a), Number(b)) => Number(a - b),
        (BinaryOp::Mul, Number(a), Number(b)) => Number(a * b),
        (BinaryOp::Div | BinaryOp::Rem, Number(_), Number(b)) if *b == 0.0 => {
            return Err("division by zero".to_string())
        }
        (BinaryOp::Div, Number(a), Number(b)) => Number(a / b),
        (BinaryOp::Rem, Number(a), Number(b)) => Number(a % b),

        _ => {
            return Err(format!(
                "operator {op:?} not applicable to {} and {}",
                left.type_name(),
                right.type_name()
            ))
        }
    };
    Ok(result)
}
