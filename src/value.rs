use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::ExprError;

/// A runtime value produced or consumed by the expression evaluator.
///
/// Integers and floats are kept distinct; arithmetic preserves integer
/// results when the math works out whole. Composite host types (celestial
/// bodies and the like) live behind the [`DomainObject`] trait so new
/// types can be registered without touching the evaluator.
#[derive(Debug, Clone)]
pub enum Value {
    /// Null, a valid literal for reference-like types
    Null,

    /// Boolean
    Boolean(bool),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// Floating-point number
    Float(f64),

    /// UTF-8 string
    String(String),

    /// Ordered list of values; duplicates and order are preserved
    List(Vec<Value>),

    /// A host-registered composite value
    Object(Rc<dyn DomainObject>),
}

/// Extension seam for host-defined value types.
///
/// Implementors register an entry in the [`TypeRegistry`] under
/// [`DomainObject::type_name`]; the evaluator dispatches method calls and
/// string conversion through that entry.
///
/// [`TypeRegistry`]: crate::registry::TypeRegistry
pub trait DomainObject: fmt::Debug {
    /// The registry key for this type. Must match the name the entry was
    /// registered under.
    fn type_name(&self) -> &'static str;

    /// Human-readable name, used when converting the value to a string
    /// (e.g. for display templates).
    fn display_name(&self) -> String;

    /// Identity comparison against another object of any registered type.
    fn object_eq(&self, other: &dyn DomainObject) -> bool;

    fn as_any(&self) -> &dyn Any;
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Integer(a), Float(b)) | (Float(b), Integer(a)) => *a as f64 == *b,
            (String(a), String(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Object(a), Object(b)) => a.object_eq(b.as_ref()),
            _ => false,
        }
    }
}

impl Value {
    /// Registry key for this value's type.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "bool",
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Object(obj) => obj.type_name(),
        }
    }

    /// Convert to boolean for conditions and filter predicates.
    pub fn as_bool(&self) -> Result<bool, ExprError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(conversion(other, "bool")),
        }
    }

    /// Get as float, widening integers.
    pub fn as_float(&self) -> Result<f64, ExprError> {
        match self {
            Value::Integer(n) => Ok(*n as f64),
            Value::Float(n) => Ok(*n),
            other => Err(conversion(other, "float")),
        }
    }

    /// Get as integer; floats must be whole.
    pub fn as_int(&self) -> Result<i64, ExprError> {
        match self {
            Value::Integer(n) => Ok(*n),
            Value::Float(n) if n.fract() == 0.0 => Ok(*n as i64),
            other => Err(conversion(other, "int")),
        }
    }

    pub fn as_str(&self) -> Result<&str, ExprError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(conversion(other, "string")),
        }
    }

    pub fn as_list(&self) -> Result<&[Value], ExprError> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(conversion(other, "list")),
        }
    }

    /// Downcast an object value to a concrete domain type.
    pub fn as_object<T: DomainObject + 'static>(&self) -> Result<&T, ExprError> {
        match self {
            Value::Object(obj) => obj
                .as_any()
                .downcast_ref::<T>()
                .ok_or_else(|| conversion(self, std::any::type_name::<T>())),
            other => Err(conversion(other, "object")),
        }
    }
}

/// Conversion from a runtime [`Value`] into a concrete Rust type, paired
/// with the registry type name expressions of that type evaluate under.
///
/// This is what the typed evaluation facade ([`crate::evaluate`]) uses to
/// pick the right evaluator and hand back a plain Rust value.
pub trait FromValue: Sized {
    /// Registry key of the evaluator for this type.
    const TYPE_NAME: &'static str;

    fn from_value(value: Value) -> Result<Self, ExprError>;
}

impl FromValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: Value) -> Result<Self, ExprError> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    const TYPE_NAME: &'static str = "int";

    fn from_value(value: Value) -> Result<Self, ExprError> {
        value.as_int()
    }
}

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "float";

    fn from_value(value: Value) -> Result<Self, ExprError> {
        value.as_float()
    }
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_value(value: Value) -> Result<Self, ExprError> {
        Ok(value.as_str()?.to_string())
    }
}

impl FromValue for Vec<Value> {
    const TYPE_NAME: &'static str = "list";

    fn from_value(value: Value) -> Result<Self, ExprError> {
        Ok(value.as_list()?.to_vec())
    }
}

fn conversion(value: &Value, target: &str) -> ExprError {
    ExprError::Conversion {
        from: value.type_name().to_string(),
        to: target.to_string(),
    }
}
