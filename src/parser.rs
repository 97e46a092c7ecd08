use crate::{
    ast::{BinOp, Expr, Token, UnOp},
    error::ExprError,
    lexer::Lexer,
};
use std::mem;

/// Recursive-descent parser producing an immutable [`Expr`] tree.
///
/// One function per precedence level, lowest at the top. The parser holds
/// a single lookahead token; `consumed_end` reports how far into the
/// input the parsed expression reaches, which the string template
/// evaluator uses to resume its literal-text scan.
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    last_end: usize,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Result<Self, ExprError> {
        let current_token = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current_token,
            last_end: 0,
        })
    }

    /// Parse a complete statement; trailing input is a syntax error.
    pub fn parse(&mut self) -> Result<Expr, ExprError> {
        let expr = self.parse_expression()?;
        if self.current_token != Token::Eof {
            return Err(ExprError::Syntax(format!(
                "unexpected trailing input starting at '{}'",
                self.current_token.describe()
            )));
        }
        Ok(expr)
    }

    /// Parse a statement without requiring end-of-input afterwards.
    pub fn parse_expression(&mut self) -> Result<Expr, ExprError> {
        self.parse_ternary()
    }

    /// Parse a single primary expression plus any trailing method chain,
    /// leaving the rest of the input untouched. Used for embedded
    /// references inside string templates.
    pub fn parse_primary_chain(&mut self) -> Result<Expr, ExprError> {
        let primary = self.parse_primary()?;
        self.parse_method_chain(primary)
    }

    /// Char offset just past the last consumed token.
    pub fn consumed_end(&self) -> usize {
        self.last_end
    }

    fn advance(&mut self) -> Result<(), ExprError> {
        self.last_end = self.lexer.position();
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        if mem::discriminant(&self.current_token) != mem::discriminant(&expected) {
            return Err(ExprError::Syntax(format!(
                "expected '{}', got '{}'",
                expected.describe(),
                self.current_token.describe()
            )));
        }
        self.advance()
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(&self.current_token) == mem::discriminant(token)
    }

    fn parse_ternary(&mut self) -> Result<Expr, ExprError> {
        let condition = self.parse_or()?;

        if self.check(&Token::Question) {
            self.advance()?;
            let then_branch = self.parse_ternary()?;
            self.expect(Token::Colon)?;
            let else_branch = self.parse_ternary()?;

            return Ok(Expr::Ternary {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }
        Ok(condition)
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;

        while self.check(&Token::OrOr) {
            self.advance()?;
            let right = self.parse_and()?;

            left = Expr::BinaryOp {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_equality()?;

        while self.check(&Token::AndAnd) {
            self.advance()?;
            let right = self.parse_equality()?;

            left = Expr::BinaryOp {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_relational()?;

        loop {
            let op = match &self.current_token {
                Token::EqEq => BinOp::Equal,
                Token::NotEq => BinOp::NotEqual,
                _ => break,
            };

            self.advance()?;
            let right = self.parse_relational()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match &self.current_token {
                Token::Lt => BinOp::LessThan,
                Token::LtEq => BinOp::LessEqual,
                Token::Gt => BinOp::GreaterThan,
                Token::GtEq => BinOp::GreaterEqual,
                _ => break,
            };

            self.advance()?;
            let right = self.parse_additive()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current_token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Subtract,
                _ => break,
            };

            self.advance()?;
            let right = self.parse_multiplicative()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current_token {
                Token::Star => BinOp::Multiply,
                Token::Slash => BinOp::Divide,
                Token::Percent => BinOp::Modulo,
                _ => break,
            };

            self.advance()?;
            let right = self.parse_unary()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let op = match &self.current_token {
            Token::Minus => Some(UnOp::Negate),
            Token::Not => Some(UnOp::Not),
            _ => None,
        };

        if let Some(op) = op {
            self.advance()?;
            let operand = self.parse_unary()?; // right-associative
            return Ok(Expr::UnaryOp {
                op,
                operand: Box::new(operand),
            });
        }

        let primary = self.parse_primary()?;
        self.parse_method_chain(primary)
    }

    /// Postfix `.Name` / `.Name(args)` chains. A dotted name without
    /// parentheses is property-style access and becomes a zero-argument
    /// method call.
    fn parse_method_chain(&mut self, mut expr: Expr) -> Result<Expr, ExprError> {
        while self.check(&Token::Dot) {
            self.advance()?; // consume '.'

            let method = match mem::replace(&mut self.current_token, Token::Eof) {
                Token::Identifier(name) => name,
                token => {
                    return Err(ExprError::Syntax(format!(
                        "expected method name after '.', got '{}'",
                        token.describe()
                    )));
                }
            };
            self.advance()?;

            let args = if self.check(&Token::LParen) {
                self.parse_argument_list()?
            } else {
                Vec::new()
            };

            expr = Expr::MethodCall {
                object: Box::new(expr),
                method,
                args,
            };
        }
        Ok(expr)
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Expr>, ExprError> {
        self.expect(Token::LParen)?;

        let mut args = Vec::new();
        while !self.check(&Token::RParen) {
            args.push(self.parse_argument()?);

            if !self.check(&Token::RParen) {
                self.expect(Token::Comma)?;
            }
        }

        self.expect(Token::RParen)?;
        Ok(args)
    }

    /// An argument is either a filter lambda (`x => predicate`) or a
    /// plain expression. The lambda form is only recognized when a bare
    /// identifier is immediately followed by `=>`.
    fn parse_argument(&mut self) -> Result<Expr, ExprError> {
        let expr = self.parse_expression()?;

        if self.check(&Token::Arrow) {
            let var = match expr {
                Expr::Identifier(name) => name,
                other => {
                    return Err(ExprError::Syntax(format!(
                        "filter variable must be a bare identifier, got {:?}",
                        other
                    )));
                }
            };
            self.advance()?; // consume '=>'
            let body = self.parse_expression()?;
            return Ok(Expr::Lambda {
                var,
                body: Box::new(body),
            });
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Integer(n) => {
                self.advance()?;
                Ok(Expr::Integer(n))
            }
            Token::Float(n) => {
                self.advance()?;
                Ok(Expr::Float(n))
            }
            Token::String(s) => {
                self.advance()?;
                Ok(Expr::String(s))
            }
            Token::Boolean(b) => {
                self.advance()?;
                Ok(Expr::Boolean(b))
            }
            Token::Null => {
                self.advance()?;
                Ok(Expr::Null)
            }
            Token::Special(name) => {
                self.advance()?;
                Ok(Expr::Special(name))
            }
            Token::Identifier(name) => {
                self.advance()?;

                // An identifier followed immediately by '(' is a global
                // function call; otherwise resolution is deferred to the
                // evaluator's contextual type.
                if self.check(&Token::LParen) {
                    let args = self.parse_argument_list()?;
                    Ok(Expr::FunctionCall { name, args })
                } else {
                    Ok(Expr::Identifier(name))
                }
            }
            Token::LParen => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            token => Err(ExprError::Syntax(format!(
                "unexpected '{}' in expression",
                token.describe()
            ))),
        }
    }
}
