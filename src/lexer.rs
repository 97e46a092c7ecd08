use crate::ast::Token;
use crate::error::ExprError;

/// Cursor-based tokenizer for expression text.
///
/// Tokens are produced lazily; the lexer advances a position into the
/// input rather than materializing a token stream. `token_start` records
/// where the most recent token began so callers can attribute errors and
/// resume raw-text scanning (the string template evaluator does this).
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    token_start: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            token_start: 0,
        }
    }

    /// Current cursor position, in chars.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Position (in chars) where the most recently returned token began.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self) -> Result<String, ExprError> {
        let mut result = String::new();
        self.advance(); // consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance(); // consume backslash
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\\') => result.push('\\'),
                        Some(ch) => {
                            return Err(ExprError::Syntax(format!(
                                "invalid escape sequence: \\{}",
                                ch
                            )));
                        }
                        None => {
                            return Err(ExprError::Syntax(
                                "unterminated string: unexpected end of input after backslash"
                                    .to_string(),
                            ));
                        }
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(ExprError::Syntax(
            "unterminated string: missing closing quote".to_string(),
        ))
    }

    fn read_number(&mut self) -> Result<Token, ExprError> {
        let mut number = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_float {
            number
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| ExprError::Syntax(format!("malformed number literal '{}'", number)))
        } else {
            number
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| ExprError::Syntax(format!("malformed number literal '{}'", number)))
        }
    }

    pub fn next_token(&mut self) -> Result<Token, ExprError> {
        self.skip_whitespace();
        self.token_start = self.position;

        match self.current_char() {
            None => Ok(Token::Eof),
            Some('"') => Ok(Token::String(self.read_string()?)),
            Some('@') => {
                self.advance();
                let name = self.read_identifier();
                if name.is_empty() {
                    return Err(ExprError::Syntax(
                        "expected identifier after '@'".to_string(),
                    ));
                }
                Ok(Token::Special(name))
            }
            Some('=') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::EqEq)
                } else if self.peek_char(1) == Some('>') {
                    self.advance();
                    self.advance();
                    Ok(Token::Arrow)
                } else {
                    Err(ExprError::Syntax(format!(
                        "unexpected '=' at position {} (did you mean '=='?)",
                        self.position
                    )))
                }
            }
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::NotEq)
                } else {
                    self.advance();
                    Ok(Token::Not)
                }
            }
            Some('<') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::LtEq)
                } else {
                    self.advance();
                    Ok(Token::Lt)
                }
            }
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::GtEq)
                } else {
                    self.advance();
                    Ok(Token::Gt)
                }
            }
            Some('&') => {
                if self.peek_char(1) == Some('&') {
                    self.advance();
                    self.advance();
                    Ok(Token::AndAnd)
                } else {
                    Err(ExprError::Syntax(format!(
                        "unexpected '&' at position {} (did you mean '&&'?)",
                        self.position
                    )))
                }
            }
            Some('|') => {
                if self.peek_char(1) == Some('|') {
                    self.advance();
                    self.advance();
                    Ok(Token::OrOr)
                } else {
                    Err(ExprError::Syntax(format!(
                        "unexpected '|' at position {} (did you mean '||'?)",
                        self.position
                    )))
                }
            }
            Some('+') => {
                self.advance();
                Ok(Token::Plus)
            }
            Some('-') => {
                self.advance();
                Ok(Token::Minus)
            }
            Some('*') => {
                self.advance();
                Ok(Token::Star)
            }
            Some('/') => {
                self.advance();
                Ok(Token::Slash)
            }
            Some('%') => {
                self.advance();
                Ok(Token::Percent)
            }
            Some('?') => {
                self.advance();
                Ok(Token::Question)
            }
            Some(':') => {
                self.advance();
                Ok(Token::Colon)
            }
            Some('(') => {
                self.advance();
                Ok(Token::LParen)
            }
            Some(')') => {
                self.advance();
                Ok(Token::RParen)
            }
            Some(',') => {
                self.advance();
                Ok(Token::Comma)
            }
            Some('.') => {
                self.advance();
                Ok(Token::Dot)
            }
            Some(ch) if ch.is_alphabetic() => {
                let ident = self.read_identifier();

                match ident.as_str() {
                    "true" => Ok(Token::Boolean(true)),
                    "false" => Ok(Token::Boolean(false)),
                    "null" => Ok(Token::Null),
                    _ => Ok(Token::Identifier(ident)),
                }
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch) => Err(ExprError::Lexical {
                ch,
                position: self.position,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        let mut lexer = Lexer::new("true false null");
        assert_eq!(lexer.next_token().unwrap(), Token::Boolean(true));
        assert_eq!(lexer.next_token().unwrap(), Token::Boolean(false));
        assert_eq!(lexer.next_token().unwrap(), Token::Null);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn test_special_identifier() {
        let mut lexer = Lexer::new("@targetBody.Radius() > 200000");
        assert_eq!(
            lexer.next_token().unwrap(),
            Token::Special("targetBody".to_string())
        );
        assert_eq!(lexer.next_token().unwrap(), Token::Dot);
        assert_eq!(
            lexer.next_token().unwrap(),
            Token::Identifier("Radius".to_string())
        );
        assert_eq!(lexer.next_token().unwrap(), Token::LParen);
        assert_eq!(lexer.next_token().unwrap(), Token::RParen);
        assert_eq!(lexer.next_token().unwrap(), Token::Gt);
        assert_eq!(lexer.next_token().unwrap(), Token::Integer(200000));
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn test_multi_char_before_single() {
        let mut lexer = Lexer::new(">= > <= < == !=");
        assert_eq!(lexer.next_token().unwrap(), Token::GtEq);
        assert_eq!(lexer.next_token().unwrap(), Token::Gt);
        assert_eq!(lexer.next_token().unwrap(), Token::LtEq);
        assert_eq!(lexer.next_token().unwrap(), Token::Lt);
        assert_eq!(lexer.next_token().unwrap(), Token::EqEq);
        assert_eq!(lexer.next_token().unwrap(), Token::NotEq);
    }
}
