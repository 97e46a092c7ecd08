// tests/lexer_tests.rs

use charter::ast::Token;
use charter::error::ExprError;
use charter::lexer::Lexer;

// ============================================================================
// Single Character Tokens
// ============================================================================

#[test]
fn test_single_char_tokens() {
    let test_cases = vec![
        ("+", Token::Plus),
        ("-", Token::Minus),
        ("*", Token::Star),
        ("/", Token::Slash),
        ("%", Token::Percent),
        ("(", Token::LParen),
        (")", Token::RParen),
        (".", Token::Dot),
        (",", Token::Comma),
        ("?", Token::Question),
        (":", Token::Colon),
        ("!", Token::Not),
        ("<", Token::Lt),
        (">", Token::Gt),
    ];

    for (input, expected) in test_cases {
        let mut lexer = Lexer::new(input);
        let token = lexer.next_token().unwrap();
        assert_eq!(token, expected, "Failed for input: {}", input);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }
}

// ============================================================================
// Multi Character Tokens
// ============================================================================

#[test]
fn test_two_char_tokens() {
    let test_cases = vec![
        ("==", Token::EqEq),
        ("!=", Token::NotEq),
        ("<=", Token::LtEq),
        (">=", Token::GtEq),
        ("&&", Token::AndAnd),
        ("||", Token::OrOr),
        ("=>", Token::Arrow),
    ];

    for (input, expected) in test_cases {
        let mut lexer = Lexer::new(input);
        let token = lexer.next_token().unwrap();
        assert_eq!(token, expected, "Failed for input: {}", input);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }
}

#[test]
fn test_two_char_vs_single_char() {
    let mut lexer = Lexer::new("< =");
    assert_eq!(lexer.next_token().unwrap(), Token::Lt);
    assert!(lexer.next_token().is_err(), "bare '=' is not a token");

    let mut lexer = Lexer::new("<=");
    assert_eq!(lexer.next_token().unwrap(), Token::LtEq);
    assert_eq!(lexer.next_token().unwrap(), Token::Eof);
}

#[test]
fn test_single_ampersand_rejected() {
    let mut lexer = Lexer::new("a & b");
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::Identifier("a".to_string())
    );
    assert!(lexer.next_token().is_err());
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_integer_and_float() {
    let mut lexer = Lexer::new("42 3.5 0");
    assert_eq!(lexer.next_token().unwrap(), Token::Integer(42));
    assert_eq!(lexer.next_token().unwrap(), Token::Float(3.5));
    assert_eq!(lexer.next_token().unwrap(), Token::Integer(0));
    assert_eq!(lexer.next_token().unwrap(), Token::Eof);
}

#[test]
fn test_string_with_escapes() {
    let mut lexer = Lexer::new(r#""line\none" "tab\there" "quote\"inside""#);
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::String("line\none".to_string())
    );
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::String("tab\there".to_string())
    );
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::String("quote\"inside".to_string())
    );
}

#[test]
fn test_unterminated_string() {
    let mut lexer = Lexer::new("\"oops");
    assert!(lexer.next_token().is_err());
}

#[test]
fn test_keywords() {
    let mut lexer = Lexer::new("true false null trueish");
    assert_eq!(lexer.next_token().unwrap(), Token::Boolean(true));
    assert_eq!(lexer.next_token().unwrap(), Token::Boolean(false));
    assert_eq!(lexer.next_token().unwrap(), Token::Null);
    // prefix of a keyword is still an identifier
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::Identifier("trueish".to_string())
    );
}

// ============================================================================
// Identifiers
// ============================================================================

#[test]
fn test_special_identifier() {
    let mut lexer = Lexer::new("@targetBody");
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::Special("targetBody".to_string())
    );
    assert_eq!(lexer.next_token().unwrap(), Token::Eof);
}

#[test]
fn test_bare_at_rejected() {
    let mut lexer = Lexer::new("@ name");
    assert!(lexer.next_token().is_err());
}

#[test]
fn test_unknown_character_reports_position() {
    let mut lexer = Lexer::new("1 + #");
    lexer.next_token().unwrap();
    lexer.next_token().unwrap();
    match lexer.next_token() {
        Err(ExprError::Lexical { ch, position }) => {
            assert_eq!(ch, '#');
            assert_eq!(position, 4);
        }
        other => panic!("expected lexical error, got {:?}", other),
    }
}

#[test]
fn test_full_expression_token_stream() {
    let mut lexer = Lexer::new("@targetBody.Radius() > 100000.0 ? \"big\" : \"small\"");
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token().unwrap();
        if token == Token::Eof {
            break;
        }
        tokens.push(token);
    }
    assert_eq!(
        tokens,
        vec![
            Token::Special("targetBody".to_string()),
            Token::Dot,
            Token::Identifier("Radius".to_string()),
            Token::LParen,
            Token::RParen,
            Token::Gt,
            Token::Float(100000.0),
            Token::Question,
            Token::String("big".to_string()),
            Token::Colon,
            Token::String("small".to_string()),
        ]
    );
}
