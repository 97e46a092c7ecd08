//! # Charter expression language - Abstract Syntax Tree
//!
//! This module defines the AST for the expression language embedded in
//! contract configuration fields. Expressions are short, declarative
//! snippets written by content authors:
//!
//! ```text
//! 10000.0 + @reward * 2
//! @targetBody.HasAtmosphere() && @targetBody.Radius() > 200000
//! HomeWorld().Children().Where(cb => cb.HasOcean()).Random()
//! ```
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[operators]** - Binary and unary operators
//! - **[expressions]** - Expression tree nodes
//!
//! ## Core Concepts
//!
//! ### Contextual identifiers
//!
//! A bare identifier has no meaning on its own; it is resolved by the
//! identifier parser of the type the expression is being evaluated for.
//! In a celestial-body field, `Kerbin` names a body; in a boolean field
//! it is an error.
//!
//! ### Special identifiers
//!
//! Tokens beginning with `@` resolve against a caller-supplied context
//! map (e.g. `@targetBody` for the enclosing contract's target body),
//! never against the type registry.
//!
//! ### Precedence
//!
//! Standard left-associative binary operators, ternary on top:
//!
//! ```text
//! ternary > || > && > == != > < <= > >= > + - > * / % > unary > primary
//! ```

pub mod expressions;
pub mod operators;
pub mod tokens;

pub use expressions::Expr;
pub use operators::{BinOp, UnOp};
pub use tokens::Token;
