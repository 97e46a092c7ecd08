use thiserror::Error;

/// Errors from tokenizing, parsing, or evaluating an expression.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at position {position}")]
    Lexical { ch: char, position: usize },

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("'{name}' is not a known identifier for type {type_name}")]
    UnknownIdentifier { name: String, type_name: String },

    #[error("type {type_name} has no method or function '{name}'")]
    UnknownMethod { name: String, type_name: String },

    #[error("cannot convert {from} to {to}")]
    Conversion { from: String, to: String },

    #[error("{name}() takes {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("no value named '@{0}' in the evaluation context")]
    MissingContext(String),

    #[error("no type registered under '{0}'")]
    UnknownType(String),

    #[error("type {0} does not declare an ordering; <, <=, >, >= are not comparable")]
    NoOrdering(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    Overflow,
}

/// Errors from loading contract configuration.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error("config error at line {line}: {message}")]
    Config { line: usize, message: String },

    #[error("unknown {kind} type '{tag}'")]
    UnknownTag { kind: &'static str, tag: String },

    #[error("missing required field '{field}' in {node}")]
    MissingField { field: String, node: String },

    #[error("invalid value '{value}' for field '{field}': {message}")]
    InvalidValue {
        field: String,
        value: String,
        message: String,
    },

    #[error("duplicate contract type name '{0}'")]
    DuplicateName(String),
}

/// Errors from the condition aggregation engine.
#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("delegate '{title}' does not support {mode} checking")]
    UnsupportedAggregation { title: String, mode: &'static str },

    #[error("invalid persisted state: {0}")]
    BadState(String),
}
