// tests/template_tests.rs

use std::rc::Rc;

use charter::evaluator::EvalContext;
use charter::registry::TypeRegistry;
use charter::sim::{register_celestial_bodies, BodyCatalog};
use charter::template::render;
use charter::value::Value;

fn setup() -> (TypeRegistry, EvalContext) {
    let mut registry = TypeRegistry::new();
    register_celestial_bodies(&mut registry, Rc::new(BodyCatalog::sample())).unwrap();

    registry
        .add_global("string", "Greeting", |_| {
            Ok(Value::String("hello".to_string()))
        })
        .unwrap();

    let catalog = BodyCatalog::sample();
    let mun = catalog.lookup("Mun").unwrap().clone();
    let ctx = EvalContext::new()
        .with_value("name", Value::String("Val".to_string()))
        .with_value("targetBody", Value::Object(Rc::new(mun)));

    (registry, ctx)
}

// ============================================================================
// Literal Text
// ============================================================================

#[test]
fn test_plain_text_verbatim() {
    let (registry, ctx) = setup();
    assert_eq!(
        render("Collect science data from orbit.", &registry, &ctx).unwrap(),
        "Collect science data from orbit."
    );
}

#[test]
fn test_escaped_newline() {
    let (registry, ctx) = setup();
    assert_eq!(
        render("line one\\nline two", &registry, &ctx).unwrap(),
        "line one\nline two"
    );
}

// ============================================================================
// Embedded References
// ============================================================================

#[test]
fn test_embedded_special_identifier() {
    let (registry, ctx) = setup();
    assert_eq!(render("Hello @name!", &registry, &ctx).unwrap(), "Hello Val!");
}

#[test]
fn test_special_at_sentence_end_keeps_period() {
    let (registry, ctx) = setup();
    // the '.' after the reference is prose, not a method call
    assert_eq!(
        render("Visit @targetBody. Then return home.", &registry, &ctx).unwrap(),
        "Visit Mun. Then return home."
    );
}

#[test]
fn test_multiple_references() {
    let (registry, ctx) = setup();
    assert_eq!(
        render("@name goes to @targetBody", &registry, &ctx).unwrap(),
        "Val goes to Mun"
    );
}

#[test]
fn test_body_reference_converts_to_display_name() {
    let (registry, ctx) = setup();
    assert_eq!(
        render("Fly by @targetBody today", &registry, &ctx).unwrap(),
        "Fly by Mun today"
    );
}

// ============================================================================
// Embedded Function Calls
// ============================================================================

#[test]
fn test_embedded_function_call() {
    let (registry, ctx) = setup();
    assert_eq!(
        render("Say Greeting() to everyone", &registry, &ctx).unwrap(),
        "Say hello to everyone"
    );
}

#[test]
fn test_function_call_with_method_chain() {
    let (registry, ctx) = setup();
    assert_eq!(
        render("Say Greeting().ToUpper() loudly", &registry, &ctx).unwrap(),
        "Say HELLO loudly"
    );
}

#[test]
fn test_non_breaking_space_before_function_call() {
    let (registry, ctx) = setup();
    // U+00A0 is whitespace to the call scan but wider than one byte
    assert_eq!(
        render("crew:\u{00A0}Greeting() done", &registry, &ctx).unwrap(),
        "crew:\u{00A0}hello done"
    );
}

#[test]
fn test_bare_parenthesis_is_literal() {
    let (registry, ctx) = setup();
    // '(' with no function name in front never triggers evaluation
    assert_eq!(
        render("see (a) below", &registry, &ctx).unwrap(),
        "see (a) below"
    );
}

// ============================================================================
// Full-Statement Templates
// ============================================================================

#[test]
fn test_full_statement_with_method_chain() {
    let (registry, ctx) = setup();
    assert_eq!(render("@name.ToUpper()", &registry, &ctx).unwrap(), "VAL");
}

#[test]
fn test_leading_function_call_statement() {
    let (registry, ctx) = setup();
    assert_eq!(
        render("Greeting().FirstCap()", &registry, &ctx).unwrap(),
        "Hello"
    );
}

#[test]
fn test_unparseable_full_statement_falls_back_to_scan() {
    let (registry, ctx) = setup();
    // '@name!' is not a complete statement; the scan treats '!' as text
    assert_eq!(render("@name!", &registry, &ctx).unwrap(), "Val!");
}

// ============================================================================
// Quoted Segments
// ============================================================================

#[test]
fn test_quoted_segment_ends_at_close_quote() {
    let (registry, ctx) = setup();
    assert_eq!(
        render("\"Hello @name\" and trailing text", &registry, &ctx).unwrap(),
        "Hello Val"
    );
}

#[test]
fn test_escaped_quote_does_not_close() {
    let (registry, ctx) = setup();
    assert_eq!(
        render("\"say \\\" then @name\" rest", &registry, &ctx).unwrap(),
        "say \\\" then Val"
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unknown_reference_is_an_error() {
    let (registry, ctx) = setup();
    assert!(render("Hello @unknown!", &registry, &ctx).is_err());
}
