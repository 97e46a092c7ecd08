use std::collections::HashMap;

use rust_decimal::{prelude::FromPrimitive, prelude::ToPrimitive, Decimal};
use tracing::trace;

use crate::{
    ast::{BinOp, Expr, UnOp},
    error::ExprError,
    lexer::Lexer,
    parser::Parser,
    registry::TypeRegistry,
    value::{FromValue, Value},
};

/// Evaluate an expression for a concrete Rust result type.
///
/// The registry entry for `T`'s type name selects identifier resolution
/// and final conversion, exactly as if the field had been declared with
/// that type in configuration.
///
/// # Examples
///
/// ```
/// use charter::{evaluate, EvalContext, TypeRegistry};
///
/// let registry = TypeRegistry::new();
/// let ctx = EvalContext::new();
///
/// let n: i64 = evaluate("3 + 4 * 2", &registry, &ctx).unwrap();
/// assert_eq!(n, 11);
/// ```
pub fn evaluate<T: FromValue>(
    text: &str,
    registry: &TypeRegistry,
    ctx: &EvalContext,
) -> Result<T, ExprError> {
    let evaluator = Evaluator::new(registry, T::TYPE_NAME)?;
    T::from_value(evaluator.evaluate_text(text, ctx)?)
}

/// Evaluation context: the caller-supplied map of named contextual values
/// (special identifiers such as `@targetBody`) plus the scoped temporary
/// bindings introduced by filter lambdas.
///
/// Filter iteration creates a child context per element via
/// [`EvalContext::with_binding`]; the binding disappears when the child
/// context goes out of scope, so it can never leak into sibling
/// expressions, error or not.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    special: HashMap<String, Value>,
    // innermost binding last; lookups search back to front so nested
    // filters shadow outer bindings of the same name
    bindings: Vec<(String, Value)>,
}

impl EvalContext {
    pub fn new() -> Self {
        EvalContext::default()
    }

    /// Builder-style addition of a named context value.
    pub fn with_value(mut self, name: &str, value: Value) -> Self {
        self.special.insert(name.to_string(), value);
        self
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.special.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.special.get(name)
    }

    fn with_binding(&self, var: &str, value: Value) -> Self {
        let mut child = self.clone();
        child.bindings.push((var.to_string(), value));
        child
    }

    fn lookup_binding(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .rev()
            .find(|(var, _)| var == name)
            .map(|(_, value)| value)
    }
}

/// Expression evaluator bound to one result type.
///
/// The target type selects which identifier parser resolves bare
/// identifiers and what the final statement value is converted to. Within
/// a statement, sub-expressions of other types are handled by switching
/// the resolution hint (e.g. both operands of a comparison resolve
/// against whichever operand's type is known first).
pub struct Evaluator<'a> {
    registry: &'a TypeRegistry,
    target: String,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator for the given target type. Fails if no entry
    /// is registered for that type: lookups are total.
    pub fn new(registry: &'a TypeRegistry, target: &str) -> Result<Self, ExprError> {
        registry.lookup(target)?;
        Ok(Evaluator {
            registry,
            target: target.to_string(),
        })
    }

    /// Tokenize, parse, and evaluate a complete statement, converting the
    /// result to the target type.
    pub fn evaluate_text(&self, text: &str, ctx: &EvalContext) -> Result<Value, ExprError> {
        let lexer = Lexer::new(text);
        let mut parser = Parser::new(lexer)?;
        let expr = parser.parse()?;
        let value = self.eval(&expr, ctx)?;
        self.registry.convert(&value, &self.target)
    }

    /// Evaluate a parsed expression tree.
    pub fn eval(&self, expr: &Expr, ctx: &EvalContext) -> Result<Value, ExprError> {
        self.eval_with_hint(expr, ctx, &self.target)
    }

    fn eval_with_hint(
        &self,
        expr: &Expr,
        ctx: &EvalContext,
        hint: &str,
    ) -> Result<Value, ExprError> {
        match expr {
            Expr::Integer(n) => Ok(Value::Integer(*n)),
            Expr::Float(n) => Ok(Value::Float(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Null => Ok(Value::Null),

            Expr::Identifier(name) => {
                if let Some(value) = ctx.lookup_binding(name) {
                    return Ok(value.clone());
                }
                self.registry
                    .parse_identifier(hint, name)
                    .ok_or_else(|| ExprError::UnknownIdentifier {
                        name: name.clone(),
                        type_name: hint.to_string(),
                    })
            }

            Expr::Special(name) => ctx
                .get(name)
                .cloned()
                .ok_or_else(|| ExprError::MissingContext(name.clone())),

            Expr::FunctionCall { name, args } => {
                let func = self
                    .registry
                    .find_global(name, Some(hint))
                    .ok_or_else(|| ExprError::UnknownMethod {
                        name: name.clone(),
                        type_name: hint.to_string(),
                    })?;
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval_with_hint(arg, ctx, hint)?);
                }
                trace!(function = %name, "invoking global function");
                func(&evaluated)
            }

            Expr::MethodCall {
                object,
                method,
                args,
            } => {
                let obj_value = self.eval_with_hint(object, ctx, hint)?;
                self.eval_method_call(&obj_value, method, args, ctx)
            }

            Expr::Lambda { .. } => Err(ExprError::Syntax(
                "filter lambda is only valid as a Where() argument".to_string(),
            )),

            Expr::UnaryOp { op, operand } => {
                let value = self.eval_with_hint(operand, ctx, hint)?;
                match op {
                    UnOp::Negate => match value {
                        Value::Integer(n) => n
                            .checked_neg()
                            .map(Value::Integer)
                            .ok_or(ExprError::Overflow),
                        Value::Float(n) => Ok(Value::Float(-n)),
                        other => Err(ExprError::Conversion {
                            from: other.type_name().to_string(),
                            to: "number".to_string(),
                        }),
                    },
                    UnOp::Not => Ok(Value::Boolean(!value.as_bool()?)),
                }
            }

            Expr::BinaryOp { op, left, right } => match op {
                BinOp::And => {
                    if !self.eval_with_hint(left, ctx, "bool")?.as_bool()? {
                        return Ok(Value::Boolean(false));
                    }
                    Ok(Value::Boolean(
                        self.eval_with_hint(right, ctx, "bool")?.as_bool()?,
                    ))
                }
                BinOp::Or => {
                    if self.eval_with_hint(left, ctx, "bool")?.as_bool()? {
                        return Ok(Value::Boolean(true));
                    }
                    Ok(Value::Boolean(
                        self.eval_with_hint(right, ctx, "bool")?.as_bool()?,
                    ))
                }
                _ => {
                    let (lv, rv) = self.eval_operands(left, right, ctx, hint)?;
                    self.apply_binop(*op, &lv, &rv)
                }
            },

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_with_hint(condition, ctx, "bool")?.as_bool()? {
                    self.eval_with_hint(then_branch, ctx, hint)
                } else {
                    self.eval_with_hint(else_branch, ctx, hint)
                }
            }
        }
    }

    /// Evaluate both operands of a binary operator, using whichever
    /// side's runtime type resolves first as the identifier-resolution
    /// hint for the other. This is what lets `@targetBody == Kerbin`
    /// resolve `Kerbin` as a celestial body inside a boolean statement.
    fn eval_operands(
        &self,
        left: &Expr,
        right: &Expr,
        ctx: &EvalContext,
        hint: &str,
    ) -> Result<(Value, Value), ExprError> {
        match self.eval_with_hint(left, ctx, hint) {
            Ok(lv) => {
                let right_hint = lv.type_name().to_string();
                let rv = self.eval_with_hint(right, ctx, &right_hint)?;
                Ok((lv, rv))
            }
            Err(err @ (ExprError::UnknownIdentifier { .. } | ExprError::UnknownType(_))) => {
                // Left side didn't resolve under the current hint; try the
                // other direction before giving up.
                let rv = self
                    .eval_with_hint(right, ctx, hint)
                    .map_err(|_| err.clone())?;
                let left_hint = rv.type_name().to_string();
                let lv = self
                    .eval_with_hint(left, ctx, &left_hint)
                    .map_err(|_| err)?;
                Ok((lv, rv))
            }
            Err(err) => Err(err),
        }
    }

    fn eval_method_call(
        &self,
        object: &Value,
        method: &str,
        args: &[Expr],
        ctx: &EvalContext,
    ) -> Result<Value, ExprError> {
        // The list filter introduces a scoped binding, so it is handled
        // here rather than through the method table.
        if method == "Where" {
            if let Value::List(items) = object {
                return self.eval_where(items, args, ctx);
            }
        }

        let entry = self.registry.lookup(object.type_name())?;
        if let Some(func) = entry.method(method) {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(self.eval_with_hint(arg, ctx, object.type_name())?);
            }
            trace!(method = %method, type_name = %object.type_name(), "invoking method");
            return func(object, &evaluated);
        }

        // Method table first, then global functions of the same type.
        if let Some(func) = entry.global(method) {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(self.eval_with_hint(arg, ctx, object.type_name())?);
            }
            return func(&evaluated);
        }

        Err(ExprError::UnknownMethod {
            name: method.to_string(),
            type_name: object.type_name().to_string(),
        })
    }

    /// `list.Where(x => predicate)`: evaluate the predicate once per
    /// element with `x` bound in a child context, keeping survivors in
    /// their original order.
    fn eval_where(
        &self,
        items: &[Value],
        args: &[Expr],
        ctx: &EvalContext,
    ) -> Result<Value, ExprError> {
        let (var, body) = match args {
            [Expr::Lambda { var, body }] => (var, body.as_ref()),
            _ => {
                return Err(ExprError::Syntax(
                    "Where() takes a single 'x => predicate' argument".to_string(),
                ));
            }
        };

        let mut survivors = Vec::new();
        for item in items {
            let child = ctx.with_binding(var, item.clone());
            let keep = self.eval_with_hint(body, &child, "bool")?.as_bool()?;
            if keep {
                survivors.push(item.clone());
            }
        }
        Ok(Value::List(survivors))
    }

    fn apply_binop(&self, op: BinOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
        match op {
            BinOp::Equal => Ok(Value::Boolean(left == right)),
            BinOp::NotEqual => Ok(Value::Boolean(left != right)),

            BinOp::LessThan | BinOp::LessEqual | BinOp::GreaterThan | BinOp::GreaterEqual => {
                // Ordering comparisons are only legal for types whose
                // registry entry declares an ordering.
                let entry = self.registry.lookup(left.type_name())?;
                let ordering_fn = entry
                    .ordering()
                    .ok_or_else(|| ExprError::NoOrdering(left.type_name().to_string()))?;
                let ordering = ordering_fn(left, right)?;
                let result = match op {
                    BinOp::LessThan => ordering.is_lt(),
                    BinOp::LessEqual => ordering.is_le(),
                    BinOp::GreaterThan => ordering.is_gt(),
                    BinOp::GreaterEqual => ordering.is_ge(),
                    _ => unreachable!(),
                };
                Ok(Value::Boolean(result))
            }

            BinOp::Add => match (left, right) {
                (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
                _ => numeric_binop(op, left, right),
            },

            BinOp::Subtract | BinOp::Multiply | BinOp::Divide | BinOp::Modulo => {
                numeric_binop(op, left, right)
            }

            BinOp::And | BinOp::Or => unreachable!("logical operators short-circuit in eval"),
        }
    }
}

/// Arithmetic with integer preservation: int/int stays int where exact,
/// and mixed int/float goes through decimal arithmetic so whole results
/// come back as integers instead of accumulating float error.
fn numeric_binop(op: BinOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    if matches!(op, BinOp::Divide | BinOp::Modulo) {
        let divisor = right.as_float().map_err(|_| type_error(op, left, right))?;
        if divisor == 0.0 {
            return Err(ExprError::DivisionByZero);
        }
    }

    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => {
            let result = match op {
                BinOp::Add => a.checked_add(*b),
                BinOp::Subtract => a.checked_sub(*b),
                BinOp::Multiply => a.checked_mul(*b),
                BinOp::Modulo => a.checked_rem(*b),
                BinOp::Divide => match a.checked_rem(*b) {
                    Some(0) => a.checked_div(*b),
                    Some(_) => return Ok(Value::Float(*a as f64 / *b as f64)),
                    // i64::MIN / -1 and i64::MIN % -1 both overflow
                    None => None,
                },
                _ => unreachable!(),
            };
            result.map(Value::Integer).ok_or(ExprError::Overflow)
        }
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_op(op, *a, *b))),
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            let (a, b) = (left.as_float()?, right.as_float()?);
            if let (Some(ad), Some(bd)) = (Decimal::from_f64(a), Decimal::from_f64(b)) {
                let rd = match op {
                    BinOp::Add => ad + bd,
                    BinOp::Subtract => ad - bd,
                    BinOp::Multiply => ad * bd,
                    BinOp::Divide => ad / bd,
                    BinOp::Modulo => ad % bd,
                    _ => unreachable!(),
                };
                if rd.is_integer() {
                    if let Some(n) = rd.to_i64() {
                        return Ok(Value::Integer(n));
                    }
                }
                if let Some(n) = rd.to_f64() {
                    return Ok(Value::Float(n));
                }
            }
            Ok(Value::Float(float_op(op, a, b)))
        }
        _ => Err(type_error(op, left, right)),
    }
}

fn float_op(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide => a / b,
        BinOp::Modulo => a % b,
        _ => unreachable!(),
    }
}

fn type_error(op: BinOp, left: &Value, right: &Value) -> ExprError {
    ExprError::Conversion {
        from: format!("{} {} {}", left.type_name(), op.symbol(), right.type_name()),
        to: "number".to_string(),
    }
}
