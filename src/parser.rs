use crate::ast::{BinaryOp, Expr, FunctionDecl, Program, Stmt};
use crate::error::{ScriptError, Span};
use crate::lexer::{Token, TokenType};
use crate::value::Value;

/// Recursive-descent parser with one token of lookahead.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.token_type) != Some(TokenType::Eof) {
            let end = tokens.last().map(|t| t.span.end).unwrap_or(0);
            tokens.push(Token::new(TokenType::Eof, String::new(), Span::single(end)));
        }
        Self { tokens, current: 0 }
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub fn parse(&mut self) -> Result<Program, ScriptError> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            statements.push(self.statement()?);
        }

        tracing::debug!(statements = statements.len(), "parsed program");
        Ok(Program { statements })
    }

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        if self.match_types(&[TokenType::Variable]) {
            self.variable_declaration()
        } else if self.match_types(&[TokenType::Print]) {
            self.print_statement()
        } else if self.match_types(&[TokenType::If]) {
            self.if_statement()
        } else if self.match_types(&[TokenType::While]) {
            self.while_statement()
        } else if self.match_types(&[TokenType::For]) {
            self.for_statement()
        } else if self.match_types(&[TokenType::Function]) {
            self.function_declaration()
        } else if self.match_types(&[TokenType::Return]) {
            self.return_statement()
        } else {
            self.expression_statement()
        }
    }

    fn variable_declaration(&mut self) -> Result<Stmt, ScriptError> {
        let start = self.previous().span.clone();

        let name = self
            .consume(TokenType::Identifier, "variable name after 'variable'")?
            .lexeme
            .clone();
        self.consume_with_help(
            TokenType::Equal,
            "'=' after variable name",
            "Variables must be initialized: variable nombre = valor;",
        )?;
        let value = self.expression()?;
        let end = self.consume(TokenType::Semicolon, "';' after variable declaration")?;

        Ok(Stmt::VariableDeclaration {
            name,
            value,
            span: start.to(&end.span),
        })
    }

    fn print_statement(&mut self) -> Result<Stmt, ScriptError> {
        let start = self.previous().span.clone();

        self.consume_with_help(
            TokenType::LeftParen,
            "'(' after 'imprimir'",
            "The value to print goes in parentheses: imprimir(valor);",
        )?;
        let expr = self.expression()?;
        self.consume(TokenType::RightParen, "')' after value to print")?;
        let end = self.consume(TokenType::Semicolon, "';' after print statement")?;

        Ok(Stmt::Print {
            expr,
            span: start.to(&end.span),
        })
    }

    fn if_statement(&mut self) -> Result<Stmt, ScriptError> {
        let start = self.previous().span.clone();

        self.consume_with_help(
            TokenType::LeftParen,
            "'(' after 'si'",
            "If statements require parentheses around the condition: si (condicion) { ... }",
        )?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "')' after if condition")?;

        let then_branch = Box::new(self.block_statement()?);
        let else_branch = if self.match_types(&[TokenType::Else]) {
            Some(Box::new(self.block_statement()?))
        } else {
            None
        };

        let end = match else_branch {
            Some(ref else_stmt) => else_stmt.span().clone(),
            None => then_branch.span().clone(),
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            span: start.to(&end),
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, ScriptError> {
        let start = self.previous().span.clone();

        self.consume(TokenType::LeftParen, "'(' after 'mientras'")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "')' after loop condition")?;

        let body = Box::new(self.block_statement()?);
        let span = start.to(body.span());

        Ok(Stmt::While {
            condition,
            body,
            span,
        })
    }

    fn for_statement(&mut self) -> Result<Stmt, ScriptError> {
        let start = self.previous().span.clone();

        self.consume_with_help(
            TokenType::LeftParen,
            "'(' after 'para'",
            "For loops take three clauses: para (variable i = 0; i < n; i = i + 1) { ... }",
        )?;

        // The initializer is a complete statement and consumes its own ';'
        let initializer = Box::new(self.statement()?);

        let condition = self.expression()?;
        self.consume(TokenType::Semicolon, "';' after loop condition")?;

        let increment = self.expression()?;
        self.consume(TokenType::RightParen, "')' after for clauses")?;

        let body = Box::new(self.block_statement()?);
        let span = start.to(body.span());

        Ok(Stmt::For {
            initializer,
            condition,
            increment,
            body,
            span,
        })
    }

    fn function_declaration(&mut self) -> Result<Stmt, ScriptError> {
        let start = self.previous().span.clone();

        let name = self
            .consume(TokenType::Identifier, "function name after 'funcion'")?
            .lexeme
            .clone();
        self.consume(TokenType::LeftParen, "'(' after function name")?;

        let mut params = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                let param = self.consume_with_help(
                    TokenType::Identifier,
                    "parameter name",
                    "Parameters are plain names separated by commas: funcion f(a, b) { ... }",
                )?;
                params.push(param.lexeme.clone());
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "')' after parameters")?;

        let body = Box::new(self.block_statement()?);
        let span = start.to(body.span());

        Ok(Stmt::FunctionDeclaration(FunctionDecl {
            name,
            params,
            body,
            span,
        }))
    }

    fn return_statement(&mut self) -> Result<Stmt, ScriptError> {
        let start = self.previous().span.clone();

        let value = self.expression()?;
        let end = self.consume(TokenType::Semicolon, "';' after return value")?;

        Ok(Stmt::Return {
            value,
            span: start.to(&end.span),
        })
    }

    fn expression_statement(&mut self) -> Result<Stmt, ScriptError> {
        let expr = self.expression()?;
        let end = self.consume(TokenType::Semicolon, "';' after expression")?;
        let span = expr.span().to(&end.span);

        Ok(Stmt::Expression { expr, span })
    }

    fn block_statement(&mut self) -> Result<Stmt, ScriptError> {
        let open = self
            .consume_with_help(
                TokenType::LeftBrace,
                "'{' to start a block",
                "Bodies of si, sino, mientras, para and funcion are blocks: { ... }",
            )?
            .span
            .clone();

        let mut statements = Vec::new();
        while !self.check(&TokenType::RightBrace) {
            if self.is_at_end() {
                return Err(ScriptError::unclosed_block(open.to(&self.peek().span)));
            }
            statements.push(self.statement()?);
        }

        let close = self.advance().span.clone();

        Ok(Stmt::Block {
            statements,
            span: open.to(&close),
        })
    }

    fn expression(&mut self) -> Result<Expr, ScriptError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ScriptError> {
        let expr = self.comparison()?;

        if self.match_types(&[TokenType::Equal]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            if let Expr::Identifier { name, span } = expr {
                let span = span.to(value.span());
                return Ok(Expr::Assign {
                    name,
                    value: Box::new(value),
                    span,
                });
            }

            return Err(ScriptError::syntax_error(
                equals.span,
                "Invalid assignment target".to_string(),
            )
            .with_help("Only variables can be assigned to. Example: 'x = 10;'"));
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, ScriptError> {
        self.binary_level(
            &[
                (TokenType::Less, BinaryOp::Less),
                (TokenType::LessEqual, BinaryOp::LessEqual),
                (TokenType::Greater, BinaryOp::Greater),
                (TokenType::GreaterEqual, BinaryOp::GreaterEqual),
                (TokenType::EqualEqual, BinaryOp::Equal),
                (TokenType::BangEqual, BinaryOp::NotEqual),
            ],
            Self::addition,
            "Comparison operators require expressions on both sides.",
        )
    }

    fn addition(&mut self) -> Result<Expr, ScriptError> {
        self.binary_level(
            &[
                (TokenType::Plus, BinaryOp::Add),
                (TokenType::Minus, BinaryOp::Subtract),
            ],
            Self::multiplication,
            "Arithmetic operators like '+' and '-' require expressions on both sides.",
        )
    }

    fn multiplication(&mut self) -> Result<Expr, ScriptError> {
        self.binary_level(
            &[
                (TokenType::Star, BinaryOp::Multiply),
                (TokenType::Slash, BinaryOp::Divide),
            ],
            Self::primary,
            "Multiplication and division operators require expressions on both sides.",
        )
    }

    /// One left-associative precedence level: `next ((op) next)*`.
    fn binary_level(
        &mut self,
        operators: &[(TokenType, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ScriptError>,
        help: &str,
    ) -> Result<Expr, ScriptError> {
        let mut expr = next(self)?;

        while let Some(operator) = self.match_operator(operators) {
            let operator_token = self.previous().clone();
            let operand_start = self.peek().span.start;
            let right = match next(self) {
                Ok(right) => right,
                // Only an operand that is missing outright is reported against
                // the operator; errors deeper inside it are kept as they are
                Err(error)
                    if error.kind == crate::error::ErrorKind::SyntaxError
                        && error.span.start == operand_start =>
                {
                    return Err(ScriptError::syntax_error(
                        operator_token.span,
                        format!("Expected expression after '{}'", operator_token.lexeme),
                    )
                    .with_help(help));
                }
                Err(error) => return Err(error),
            };
            let span = expr.span().to(right.span());

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(expr)
    }

    fn match_operator(&mut self, operators: &[(TokenType, BinaryOp)]) -> Option<BinaryOp> {
        let operator = operators
            .iter()
            .find(|(token_type, _)| self.check(token_type))
            .map(|(_, op)| *op)?;
        self.advance();
        Some(operator)
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        if self.is_at_end() {
            return Err(ScriptError::syntax_error(
                self.peek().span.clone(),
                "Expected expression, found end of input".to_string(),
            )
            .with_help("Check for unmatched parentheses or incomplete statements."));
        }

        let token = self.advance().clone();

        match token.token_type {
            TokenType::Number | TokenType::String => Ok(Expr::Literal {
                value: token.literal.unwrap_or(Value::Nothing),
                span: token.span,
            }),
            TokenType::Identifier => {
                if self.match_types(&[TokenType::LeftParen]) {
                    self.finish_call(token)
                } else {
                    Ok(Expr::Identifier {
                        name: token.lexeme,
                        span: token.span,
                    })
                }
            }
            TokenType::LeftParen => {
                let expr = self.expression()?;
                self.consume_with_help(
                    TokenType::RightParen,
                    "')' after expression",
                    "Every opening parenthesis '(' must have a matching closing parenthesis ')'.",
                )?;
                Ok(expr)
            }
            _ => {
                let help_msg = match token.token_type {
                    TokenType::RightParen => {
                        "Found ')' without matching '('. Check for unbalanced parentheses."
                    }
                    TokenType::RightBrace => {
                        "Found '}' without matching '{'. Check for unbalanced braces."
                    }
                    TokenType::Else => "'sino' must follow the block of a 'si' statement.",
                    _ => "Expected a number, string, variable, call, or parenthesized expression here.",
                };

                Err(ScriptError::syntax_error(
                    token.span,
                    format!("Expected expression, found '{}'", token.lexeme),
                )
                .with_help(help_msg))
            }
        }
    }

    fn finish_call(&mut self, name: Token) -> Result<Expr, ScriptError> {
        let mut args = Vec::new();

        if !self.check(&TokenType::RightParen) {
            loop {
                args.push(self.expression()?);
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        let paren = self.consume_with_help(
            TokenType::RightParen,
            "')' after arguments",
            "Function calls must be closed with ')' after the arguments. Example: f(a, b)",
        )?;

        Ok(Expr::Call {
            name: name.lexeme,
            args,
            span: name.span.to(&paren.span),
        })
    }

    fn match_types(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, token_type: &TokenType) -> bool {
        &self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn consume(&mut self, token_type: TokenType, expected: &str) -> Result<&Token, ScriptError> {
        if self.check(&token_type) {
            Ok(self.advance())
        } else {
            Err(self.expected_error(expected))
        }
    }

    fn consume_with_help(
        &mut self,
        token_type: TokenType,
        expected: &str,
        help: &str,
    ) -> Result<&Token, ScriptError> {
        if self.check(&token_type) {
            Ok(self.advance())
        } else {
            Err(self.expected_error(expected).with_help(help))
        }
    }

    fn expected_error(&self, expected: &str) -> ScriptError {
        let found = self.peek();
        if found.token_type == TokenType::Eof {
            // Point just past the last real token
            let span = match self.current.checked_sub(1) {
                Some(last) => Span::single(self.tokens[last].span.end),
                None => found.span.clone(),
            };
            ScriptError::syntax_error(span, format!("Expected {}, found end of input", expected))
        } else {
            ScriptError::syntax_error(
                found.span.clone(),
                format!("Expected {}, found '{}'", expected, found.lexeme),
            )
        }
    }
}

/// Parses a token sequence into a program. All-or-nothing.
pub fn parse(tokens: Vec<Token>) -> Result<Program, ScriptError> {
    Parser::new(tokens).parse()
}
