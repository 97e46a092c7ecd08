use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use rand::Rng;
use tracing::warn;

use crate::error::ExprError;
use crate::value::Value;

/// A method bound to a value of a registered type.
pub type MethodFn = Rc<dyn Fn(&Value, &[Value]) -> Result<Value, ExprError>>;

/// A global (type-unbound) function invocable from an expression.
pub type GlobalFn = Rc<dyn Fn(&[Value]) -> Result<Value, ExprError>>;

/// Resolves a bare identifier to a value of the entry's type
/// (e.g. `"Kerbin"` to a celestial body).
pub type IdentifierFn = Rc<dyn Fn(&str) -> Option<Value>>;

/// Total ordering for a type that declares one.
pub type OrderingFn = Rc<dyn Fn(&Value, &Value) -> Result<Ordering, ExprError>>;

/// Type-specific conversion hook: given a value of the entry's type and a
/// target type name, produce the converted value if the conversion is
/// supported.
pub type ConvertFn = Rc<dyn Fn(&Value, &str) -> Option<Value>>;

/// Per-type behavior table: how to resolve identifiers, which methods and
/// global functions exist, whether the type has an ordering, and how it
/// converts to other types.
pub struct TypeEntry {
    type_name: String,
    identifier: Option<IdentifierFn>,
    methods: HashMap<String, MethodFn>,
    globals: HashMap<String, GlobalFn>,
    ordering: Option<OrderingFn>,
    convert: Option<ConvertFn>,
}

impl TypeEntry {
    pub fn new(type_name: &str) -> Self {
        TypeEntry {
            type_name: type_name.to_string(),
            identifier: None,
            methods: HashMap::new(),
            globals: HashMap::new(),
            ordering: None,
            convert: None,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn with_identifier<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Option<Value> + 'static,
    {
        self.identifier = Some(Rc::new(f));
        self
    }

    /// Add a named method. Duplicates log a warning; the first
    /// registration wins.
    pub fn with_method<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, ExprError> + 'static,
    {
        if self.methods.contains_key(name) {
            warn!(type_name = %self.type_name, method = name, "duplicate method registration ignored");
        } else {
            self.methods.insert(name.to_string(), Rc::new(f));
        }
        self
    }

    /// Add a global function associated with this type's evaluator.
    pub fn with_global<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ExprError> + 'static,
    {
        if self.globals.contains_key(name) {
            warn!(type_name = %self.type_name, function = name, "duplicate function registration ignored");
        } else {
            self.globals.insert(name.to_string(), Rc::new(f));
        }
        self
    }

    /// Declare an ordering, enabling `<`, `<=`, `>`, `>=` on this type.
    pub fn with_ordering<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<Ordering, ExprError> + 'static,
    {
        self.ordering = Some(Rc::new(f));
        self
    }

    pub fn with_convert<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &str) -> Option<Value> + 'static,
    {
        self.convert = Some(Rc::new(f));
        self
    }

    pub fn method(&self, name: &str) -> Option<MethodFn> {
        self.methods.get(name).cloned()
    }

    pub fn global(&self, name: &str) -> Option<GlobalFn> {
        self.globals.get(name).cloned()
    }

    pub fn ordering(&self) -> Option<OrderingFn> {
        self.ordering.clone()
    }

    pub fn parse_identifier(&self, name: &str) -> Option<Value> {
        self.identifier.as_ref().and_then(|f| f(name))
    }
}

/// Registry of per-type evaluator behavior.
///
/// One instance is constructed during startup, populated by each domain
/// module's registration call, and passed by reference to all parsing and
/// evaluation calls. Tests construct their own fresh registries.
///
/// Registration is append-only: a duplicate type logs a warning and the
/// first registrant is kept. Lookups are total; a type with no entry is a
/// configuration-time error, never a silent default.
pub struct TypeRegistry {
    entries: HashMap<String, TypeEntry>,
    // registration order, for deterministic global-function resolution
    order: Vec<String>,
}

impl TypeRegistry {
    /// An empty registry with no entries at all.
    pub fn empty() -> Self {
        TypeRegistry {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// A registry pre-populated with the built-in scalar and list types.
    pub fn new() -> Self {
        let mut registry = TypeRegistry::empty();
        register_builtins(&mut registry);
        registry
    }

    /// Add an entry. Returns false (and logs a warning) if the type was
    /// already registered; the existing entry is kept.
    pub fn register(&mut self, entry: TypeEntry) -> bool {
        let name = entry.type_name.clone();
        if self.entries.contains_key(&name) {
            warn!(type_name = %name, "duplicate type registration ignored; first registrant wins");
            return false;
        }
        self.order.push(name.clone());
        self.entries.insert(name, entry);
        true
    }

    /// Look up the entry for a type, failing loudly if absent.
    pub fn lookup(&self, type_name: &str) -> Result<&TypeEntry, ExprError> {
        self.entries
            .get(type_name)
            .ok_or_else(|| ExprError::UnknownType(type_name.to_string()))
    }

    /// Add a method to an already-registered type. This is how domain
    /// modules extend built-in types (e.g. new string functions) after
    /// the initial registration.
    pub fn add_method<F>(&mut self, type_name: &str, name: &str, f: F) -> Result<(), ExprError>
    where
        F: Fn(&Value, &[Value]) -> Result<Value, ExprError> + 'static,
    {
        let entry = self
            .entries
            .get_mut(type_name)
            .ok_or_else(|| ExprError::UnknownType(type_name.to_string()))?;
        if entry.methods.contains_key(name) {
            warn!(type_name, method = name, "duplicate method registration ignored");
        } else {
            entry.methods.insert(name.to_string(), Rc::new(f));
        }
        Ok(())
    }

    /// Add a global function under an already-registered type's entry.
    pub fn add_global<F>(&mut self, type_name: &str, name: &str, f: F) -> Result<(), ExprError>
    where
        F: Fn(&[Value]) -> Result<Value, ExprError> + 'static,
    {
        let entry = self
            .entries
            .get_mut(type_name)
            .ok_or_else(|| ExprError::UnknownType(type_name.to_string()))?;
        if entry.globals.contains_key(name) {
            warn!(type_name, function = name, "duplicate function registration ignored");
        } else {
            entry.globals.insert(name.to_string(), Rc::new(f));
        }
        Ok(())
    }

    /// Find a global function by name. The preferred type's entry is
    /// consulted first, then every entry in registration order.
    pub fn find_global(&self, name: &str, preferred: Option<&str>) -> Option<GlobalFn> {
        if let Some(type_name) = preferred {
            if let Some(f) = self.entries.get(type_name).and_then(|e| e.global(name)) {
                return Some(f);
            }
        }
        for type_name in &self.order {
            if let Some(f) = self.entries[type_name].global(name) {
                return Some(f);
            }
        }
        None
    }

    /// Resolve a bare identifier for the given target type.
    pub fn parse_identifier(&self, type_name: &str, ident: &str) -> Option<Value> {
        self.entries
            .get(type_name)
            .and_then(|e| e.parse_identifier(ident))
    }

    /// Convert a value to the named target type through the source type's
    /// conversion hook. Identity conversions and integer widening are
    /// handled here; everything else is per-type.
    pub fn convert(&self, value: &Value, target: &str) -> Result<Value, ExprError> {
        if value.type_name() == target {
            return Ok(value.clone());
        }
        match (value, target) {
            (Value::Integer(n), "float") => return Ok(Value::Float(*n as f64)),
            (Value::Float(n), "int") if n.fract() == 0.0 => return Ok(Value::Integer(*n as i64)),
            (Value::Null, _) => return Ok(Value::Null),
            _ => {}
        }
        if let Some(entry) = self.entries.get(value.type_name()) {
            if let Some(convert) = &entry.convert {
                if let Some(converted) = convert(value, target) {
                    return Ok(converted);
                }
            }
        }
        Err(ExprError::Conversion {
            from: value.type_name().to_string(),
            to: target.to_string(),
        })
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        TypeRegistry::new()
    }
}

fn expect_args(name: &str, args: &[Value], expected: usize) -> Result<(), ExprError> {
    if args.len() != expected {
        return Err(ExprError::Arity {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

/// Install the built-in scalar and list entries.
///
/// List types get a generic `Random()` and `Count()` for any element type;
/// the `Where()` filter also lives on lists but is handled directly by the
/// evaluator because it introduces a scoped name binding.
fn register_builtins(registry: &mut TypeRegistry) {
    registry.register(TypeEntry::new("bool"));

    registry.register(
        TypeEntry::new("int")
            .with_ordering(|a, b| {
                let (a, b) = (a.as_float()?, b.as_float()?);
                Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal))
            })
            .with_convert(|v, target| match (v, target) {
                (Value::Integer(n), "string") => Some(Value::String(n.to_string())),
                _ => None,
            }),
    );

    registry.register(
        TypeEntry::new("float")
            .with_ordering(|a, b| {
                let (a, b) = (a.as_float()?, b.as_float()?);
                Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal))
            })
            .with_convert(|v, target| match (v, target) {
                (Value::Float(n), "string") => Some(Value::String(n.to_string())),
                _ => None,
            }),
    );

    registry.register(
        TypeEntry::new("string")
            .with_ordering(|a, b| Ok(a.as_str()?.cmp(b.as_str()?)))
            .with_method("ToLower", |v, args| {
                expect_args("ToLower", args, 0)?;
                Ok(Value::String(v.as_str()?.to_lowercase()))
            })
            .with_method("ToUpper", |v, args| {
                expect_args("ToUpper", args, 0)?;
                Ok(Value::String(v.as_str()?.to_uppercase()))
            })
            .with_method("FirstCap", |v, args| {
                expect_args("FirstCap", args, 0)?;
                let s = v.as_str()?;
                let capped = match s.char_indices().nth(1) {
                    Some((split, _)) if s.chars().count() > 2 => {
                        format!("{}{}", s[..split].to_uppercase(), &s[split..])
                    }
                    _ => s.to_uppercase(),
                };
                Ok(Value::String(capped))
            }),
    );

    registry.register(
        TypeEntry::new("list")
            .with_method("Random", |v, args| {
                expect_args("Random", args, 0)?;
                let items = v.as_list()?;
                if items.is_empty() {
                    return Ok(Value::Null);
                }
                let index = rand::thread_rng().gen_range(0..items.len());
                Ok(items[index].clone())
            })
            .with_method("Count", |v, args| {
                expect_args("Count", args, 0)?;
                Ok(Value::Integer(v.as_list()?.len() as i64))
            })
            .with_method("First", |v, args| {
                expect_args("First", args, 0)?;
                Ok(v.as_list()?.first().cloned().unwrap_or(Value::Null))
            }),
    );
}
