//! Lexer: tokenizes normalized guard expressions.

/// Token types
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,

    OrOr,
    AndAnd,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,

    Eof,
}

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    /// Tokenize the entire input; the last token is always `Eof`.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            if self.pos >= self.input.len() {
                tokens.push(Token::Eof);
                return Ok(tokens);
            }
            tokens.push(self.next_token()?);
        }
    }

    fn next_token(&mut self) -> Result<Token, String> {
        let ch = self.input[self.pos];
        let token = match ch {
            '(' => self.single(Token::LParen),
            ')' => self.single(Token::RParen),
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '*' => self.single(Token::Star),
            '/' => self.single(Token::Slash),
            '%' => self.single(Token::Percent),
            '|' if self.peek_at(1) == Some('|') => self.double(Token::OrOr),
            '&' if self.peek_at(1) == Some('&') => self.double(Token::AndAnd),
            '=' if self.peek_at(1) == Some('=') => self.double(Token::EqEq),
            '!' if self.peek_at(1) == Some('=') => self.double(Token::NotEq),
            '!' => self.single(Token::Bang),
            '<' if self.peek_at(1) == Some('=') => self.double(Token::Le),
            '<' => self.single(Token::Lt),
            '>' if self.peek_at(1) == Some('=') => self.double(Token::Ge),
            '>' => self.single(Token::Gt),
            '"' | '\'' => return self.read_string(ch),
            c if c.is_ascii_digit() => return self.read_number(),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(),
            _ => {
                return Err(format!(
                    "unexpected character '{}' at offset {}",
                    ch, self.pos
                ))
            }
        };
        Ok(token)
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn double(&mut self, token: Token) -> Token {
        self.pos += 2;
        token
    }

    fn read_string(&mut self, quote: char) -> Result<Token, String> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut text = String::new();
        while self.pos < self.input.len() && self.input[self.pos] != quote {
            if self.input[self.pos] == '\\' && self.peek_at(1) == Some(quote) {
                self.pos += 1;
            }
            text.push(self.input[self.pos]);
            self.pos += 1;
        }
        if self.pos >= self.input.len() {
            return Err(format!("unterminated string starting at offset {start}"));
        }
        self.pos += 1; // closing quote
        Ok(Token::Str(text))
    }

    fn read_number(&mut self) -> Result<Token, String> {
        let start = self.pos;
        while self.pos < self.input.len()
            && (self.input[self.pos].is_ascii_digit() || self.input[self.pos] == '.')
        {
            self.pos += 1;
        }
        let text: String = self.input[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| format!("invalid number '{text}'"))
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.pos;
        while self.pos < self.input.len() {
            let c = self.input[self.pos];
            if c.is_alphanumeric() || c == '_' || c == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.input[start..self.pos].iter().collect();
        match text.as_str() {
            "true" => Token::True,
            "false" => Token::False,
            _ => Token::Ident(text),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }
}
