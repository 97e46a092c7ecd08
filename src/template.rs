use std::sync::OnceLock;

use regex::Regex;

use crate::{
    ast::Expr,
    error::ExprError,
    evaluator::{EvalContext, Evaluator},
    lexer::Lexer,
    parser::Parser,
    registry::TypeRegistry,
};

// A function call embedded in literal text: start-of-scan or whitespace,
// then a name directly followed by '('.
fn function_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?:^|\s)[A-Za-z_]\w*\(").expect("valid regex"))
}

/// Evaluate a display-text template.
///
/// The whole input is literal text except for embedded `@name` references
/// and inline function calls, which are evaluated through the expression
/// evaluator and string-converted in place. A leading quote makes the
/// segment quoted: the earliest unescaped close quote ends the scan.
/// The two-character sequence `\n` becomes a real newline at the end.
///
/// Used for human-readable titles and descriptions, which may legitimately
/// re-render differently each time (e.g. random name functions).
pub fn render(text: &str, registry: &TypeRegistry, ctx: &EvalContext) -> Result<String, ExprError> {
    let trimmed = text.trim();

    // A template that starts with a reference or a call may be a complete
    // expression statement ("@firstName.ToUpper()"); prefer that reading
    // when the whole input parses as one.
    let starts_with_call = function_pattern()
        .find(trimmed)
        .is_some_and(|m| m.start() == 0);
    if trimmed.starts_with('@') || starts_with_call {
        if let Some(value) = try_full_statement(trimmed, registry, ctx)? {
            return Ok(unescape_newlines(&value));
        }
    }

    let mut remaining = trimmed;
    let quoted = remaining.starts_with('"');
    if quoted {
        remaining = &remaining[1..];
    }

    let mut value = String::new();

    while !remaining.is_empty() {
        let special_index = remaining.find('@');

        let function_match = function_pattern().find(remaining);

        // Only the first close quote counts; an escaped one hides the
        // close for this round of the scan.
        let mut quote_index = if quoted { remaining.find('"') } else { None };
        if let Some(qi) = quote_index {
            if qi > 0 && remaining.as_bytes()[qi - 1] == b'\\' {
                quote_index = None;
            }
        }

        // Tie-break: a function call dominates a special identifier at
        // the same or lower index, and a quote-close dominates both.
        let function_wins = function_match.is_some_and(|m| {
            special_index.map_or(true, |si| m.start() <= si)
                && quote_index.map_or(true, |qi| m.start() < qi)
        });
        let quote_wins = !function_wins
            && quote_index.is_some_and(|qi| special_index.map_or(true, |si| qi < si));

        if function_wins {
            let m = function_match.expect("checked above");
            // The match may include the separating whitespace; that
            // whitespace is literal text and may be wider than one byte.
            let name_start = match remaining[m.start()..].chars().next() {
                Some(c) if c.is_whitespace() => m.start() + c.len_utf8(),
                _ => m.start(),
            };
            value.push_str(&remaining[..name_start]);

            let (rendered, consumed) = eval_embedded(&remaining[name_start..], registry, ctx)?;
            value.push_str(&rendered);
            remaining = &remaining[name_start + consumed..];
        } else if quote_wins {
            let qi = quote_index.expect("checked above");
            value.push_str(&remaining[..qi]);
            break;
        } else if let Some(si) = special_index {
            value.push_str(&remaining[..si]);

            let (rendered, consumed) = eval_special(&remaining[si..], registry, ctx)?;
            value.push_str(&rendered);
            remaining = &remaining[si + consumed..];
        } else {
            value.push_str(remaining);
            break;
        }
    }

    Ok(unescape_newlines(&value))
}

/// Parse and evaluate the input as one complete string statement.
/// Returns `Ok(None)` when it does not parse as a full statement, so the
/// caller falls back to the literal scan.
fn try_full_statement(
    text: &str,
    registry: &TypeRegistry,
    ctx: &EvalContext,
) -> Result<Option<String>, ExprError> {
    let lexer = Lexer::new(text);
    let Ok(mut parser) = Parser::new(lexer) else {
        return Ok(None);
    };
    let Ok(expr) = parser.parse() else {
        return Ok(None);
    };

    let evaluator = Evaluator::new(registry, "string")?;
    let result = evaluator.eval(&expr, ctx)?;
    let converted = registry.convert(&result, "string")?;
    Ok(Some(converted.as_str()?.to_string()))
}

/// Evaluate an embedded function call (plus any trailing method chain)
/// starting at the beginning of `text`. Returns the string-converted
/// result and the number of bytes consumed.
fn eval_embedded(
    text: &str,
    registry: &TypeRegistry,
    ctx: &EvalContext,
) -> Result<(String, usize), ExprError> {
    let lexer = Lexer::new(text);
    let mut parser = Parser::new(lexer)?;
    let expr = parser.parse_primary_chain()?;
    let consumed_chars = parser.consumed_end();

    let evaluator = Evaluator::new(registry, "string")?;
    let result = evaluator.eval(&expr, ctx)?;
    let converted = registry.convert(&result, "string")?;

    Ok((
        converted.as_str()?.to_string(),
        byte_offset(text, consumed_chars),
    ))
}

/// Evaluate a `@name` reference at the beginning of `text`. Only the
/// identifier itself is consumed; a following '.' stays literal so prose
/// punctuation is not misread as a method chain.
fn eval_special(
    text: &str,
    registry: &TypeRegistry,
    ctx: &EvalContext,
) -> Result<(String, usize), ExprError> {
    let name: String = text[1..]
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        return Err(ExprError::Syntax(
            "expected identifier after '@'".to_string(),
        ));
    }

    let evaluator = Evaluator::new(registry, "string")?;
    let result = evaluator.eval(&Expr::Special(name.clone()), ctx)?;
    let converted = registry.convert(&result, "string")?;

    Ok((converted.as_str()?.to_string(), 1 + name.len()))
}

fn unescape_newlines(text: &str) -> String {
    text.replace("\\n", "\n")
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}
