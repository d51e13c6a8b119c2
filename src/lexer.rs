use crate::error::{ScriptError, Span};
use crate::value::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    // Single-character tokens
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,

    // One or two character tokens
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals
    Identifier,
    String,
    Number,

    // Keywords
    Variable,
    Print,
    If,
    Else,
    While,
    For,
    Function,
    Return,

    // Special
    Eof,
}

/// The coarse lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCategory {
    Keyword,
    Identifier,
    Number,
    String,
    Symbol,
}

impl TokenType {
    pub fn category(&self) -> TokenCategory {
        match self {
            TokenType::Variable
            | TokenType::Print
            | TokenType::If
            | TokenType::Else
            | TokenType::While
            | TokenType::For
            | TokenType::Function
            | TokenType::Return => TokenCategory::Keyword,
            TokenType::Identifier => TokenCategory::Identifier,
            TokenType::Number => TokenCategory::Number,
            TokenType::String => TokenCategory::String,
            _ => TokenCategory::Symbol,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    /// Raw source text of the token; string tokens keep their quotes.
    pub lexeme: String,
    /// Decoded value for number and string literals.
    pub literal: Option<Value>,
    pub span: Span,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: String, span: Span) -> Self {
        Self {
            token_type,
            lexeme,
            literal: None,
            span,
        }
    }

    pub fn category(&self) -> TokenCategory {
        self.token_type.category()
    }
}

pub fn keywords() -> HashMap<&'static str, TokenType> {
    let mut keywords = HashMap::new();
    keywords.insert("variable", TokenType::Variable);
    keywords.insert("imprimir", TokenType::Print);
    keywords.insert("si", TokenType::If);
    keywords.insert("sino", TokenType::Else);
    keywords.insert("mientras", TokenType::While);
    keywords.insert("para", TokenType::For);
    keywords.insert("funcion", TokenType::Function);
    keywords.insert("retornar", TokenType::Return);
    keywords
}

pub struct Lexer {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    keywords: HashMap<&'static str, TokenType>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            keywords: keywords(),
        }
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub fn scan_tokens(mut self) -> Result<Vec<Token>, ScriptError> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()?;
        }

        self.tokens.push(Token::new(
            TokenType::Eof,
            String::new(),
            Span::single(self.current),
        ));

        tracing::debug!(count = self.tokens.len(), "tokenized source");
        Ok(self.tokens)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn scan_token(&mut self) -> Result<(), ScriptError> {
        let c = self.advance();

        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            '*' => self.add_token(TokenType::Star),
            '/' => self.add_token(TokenType::Slash),
            '!' => {
                if self.match_char('=') {
                    self.add_token(TokenType::BangEqual);
                } else {
                    return Err(ScriptError::lex_error(
                        Span::single(self.start),
                        "Unexpected character: '!'".to_string(),
                    )
                    .with_help("Use '!=' to compare for inequality."));
                }
            }
            '=' => {
                let token_type = if self.match_char('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.add_token(token_type);
            }
            '<' => {
                let token_type = if self.match_char('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.add_token(token_type);
            }
            '>' => {
                let token_type = if self.match_char('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.add_token(token_type);
            }
            '"' => self.string()?,
            c if c.is_whitespace() => {}
            c if c.is_ascii_digit() => self.number()?,
            c if c.is_alphabetic() || c == '_' => self.identifier(),
            _ => {
                return Err(ScriptError::lex_error(
                    Span::single(self.start),
                    format!("Unexpected character: '{}'", c),
                ));
            }
        }

        Ok(())
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        self.current += 1;
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            false
        } else {
            self.current += 1;
            true
        }
    }

    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn string(&mut self) -> Result<(), ScriptError> {
        let mut content = String::new();

        while self.peek() != '"' && !self.is_at_end() {
            let c = self.advance();
            if c != '\\' {
                content.push(c);
                continue;
            }
            if self.is_at_end() {
                break;
            }
            let escaped = self.advance();
            content.push(match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
        }

        if self.is_at_end() {
            return Err(ScriptError::lex_error(
                Span::new(self.start, self.current),
                "Unterminated string".to_string(),
            )
            .with_help("String literals must be closed with '\"'."));
        }

        // Closing quote
        self.advance();

        self.add_literal(TokenType::String, Value::String(content));
        Ok(())
    }

    fn number(&mut self) -> Result<(), ScriptError> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let text = self.current_text();
        let value = text.parse::<f64>().map_err(|_| {
            ScriptError::lex_error(
                Span::new(self.start, self.current),
                format!("Invalid number: {}", text),
            )
        })?;

        self.add_literal(TokenType::Number, Value::Number(value));
        Ok(())
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text = self.current_text();
        let token_type = self
            .keywords
            .get(text.as_str())
            .copied()
            .unwrap_or(TokenType::Identifier);

        self.add_token(token_type);
    }

    fn current_text(&self) -> String {
        self.source[self.start..self.current].iter().collect()
    }

    fn add_token(&mut self, token_type: TokenType) {
        let lexeme = self.current_text();
        self.tokens.push(Token::new(
            token_type,
            lexeme,
            Span::new(self.start, self.current),
        ));
    }

    fn add_literal(&mut self, token_type: TokenType, literal: Value) {
        self.add_token(token_type);
        if let Some(token) = self.tokens.last_mut() {
            token.literal = Some(literal);
        }
    }
}

/// Converts source text into a token sequence terminated by `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    Lexer::new(source).scan_tokens()
}
