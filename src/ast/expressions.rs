use super::operators::{BinOp, UnOp};

/// An expression node.
///
/// Trees are immutable once parsed; the evaluator walks them against a
/// type registry and a context, so the same tree can be evaluated many
/// times (filter predicates are evaluated once per list element).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,

    /// Bare identifier, resolved through the contextual type's identifier
    /// parser (e.g. `Kerbin` in a celestial-body field).
    Identifier(String),

    /// Special identifier (`@name`), resolved from the caller-supplied
    /// context map.
    Special(String),

    /// Global (type-unbound) function call: `HomeWorld()`
    FunctionCall { name: String, args: Vec<Expr> },

    /// Method call on a value: `Kerbin.Children()`. Property-style access
    /// without parentheses parses to this with an empty argument list.
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },

    /// Filter lambda: `x => predicate`, only valid as a method argument
    /// (`list.Where(x => ...)`).
    Lambda { var: String, body: Box<Expr> },

    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    UnaryOp {
        op: UnOp,
        operand: Box<Expr>,
    },

    /// Ternary conditional: `cond ? then : else`
    Ternary {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
}
