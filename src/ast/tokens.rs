#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Integer number
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 10000
    /// ```
    Integer(i64),

    /// Floating-point number
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 0.5
    /// ```
    Float(f64),

    /// String literal enclosed in double quotes
    ///
    /// # Examples
    /// ```text
    /// "Explore @targetBody"
    /// ```
    String(String),

    /// Boolean values
    Boolean(bool),

    /// Null literal, valid for reference-like types
    Null,

    // Identifiers and references
    /// Bare identifier, resolved by the contextual type's parser
    ///
    /// Must start with a letter, followed by letters, digits, or
    /// underscores.
    ///
    /// # Examples
    /// ```text
    /// Kerbin
    /// HomeWorld
    /// ```
    Identifier(String),

    /// Special identifier (`@name`), resolved from the caller-supplied
    /// context map rather than the type registry
    ///
    /// # Examples
    /// ```text
    /// @targetBody
    /// @contractName
    /// ```
    Special(String),

    // Operators
    /// Equality operator
    EqEq,

    /// Inequality operator
    NotEq,

    /// Less than
    Lt,

    /// Greater than
    Gt,

    /// Less than or equal
    LtEq,

    /// Greater than or equal
    GtEq,

    /// Addition or string concatenation
    Plus,

    /// Subtraction or unary negation
    Minus,

    /// Multiplication
    Star,

    /// Division
    Slash,

    /// Modulo
    Percent,

    /// Logical AND (`&&`)
    AndAnd,

    /// Logical OR (`||`)
    OrOr,

    /// Logical NOT (`!`)
    Not,

    /// Filter lambda binder (`=>`)
    Arrow,

    /// Ternary condition marker (`?`)
    Question,

    /// Ternary branch separator (`:`)
    Colon,

    // Punctuation
    /// Left parenthesis for grouping or argument lists
    LParen,

    /// Right parenthesis
    RParen,

    /// Comma separating arguments
    Comma,

    /// Dot for method calls or property-style access
    Dot,

    /// End of input
    Eof,
}

impl Token {
    /// Short human-readable description for syntax error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Integer(n) => n.to_string(),
            Token::Float(n) => n.to_string(),
            Token::String(s) => format!("\"{}\"", s),
            Token::Boolean(b) => b.to_string(),
            Token::Null => "null".to_string(),
            Token::Identifier(s) => s.clone(),
            Token::Special(s) => format!("@{}", s),
            Token::EqEq => "==".to_string(),
            Token::NotEq => "!=".to_string(),
            Token::Lt => "<".to_string(),
            Token::Gt => ">".to_string(),
            Token::LtEq => "<=".to_string(),
            Token::GtEq => ">=".to_string(),
            Token::Plus => "+".to_string(),
            Token::Minus => "-".to_string(),
            Token::Star => "*".to_string(),
            Token::Slash => "/".to_string(),
            Token::Percent => "%".to_string(),
            Token::AndAnd => "&&".to_string(),
            Token::OrOr => "||".to_string(),
            Token::Not => "!".to_string(),
            Token::Arrow => "=>".to_string(),
            Token::Question => "?".to_string(),
            Token::Colon => ":".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Comma => ",".to_string(),
            Token::Dot => ".".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}
