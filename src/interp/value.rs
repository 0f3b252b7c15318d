use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::compiler::ast::{FnDef, WellKnownSymbol};
use crate::compiler::lexer::Span;
use crate::interp::env::Env;
use crate::interp::protocol::LiteralProtocol;
use crate::interp::{Interpreter, RuntimeError};

/// Signature of functions implemented in Rust.
pub type NativeFn = dyn Fn(&mut Interpreter, Vec<Value>, Span) -> Result<Value, RuntimeError>;

/// A runtime value.
///
/// Collections and objects are shared by reference; everything else is
/// copied on assignment.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Symbol(WellKnownSymbol),
    Array(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<OrderedMap>>),
    Set(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Object>>),
    Function(Rc<Closure>),
    Native(Rc<NativeFunction>),
    Constructor(Rc<dyn LiteralProtocol>),
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(object: Object) -> Value {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn native(
        name: impl Into<String>,
        func: impl Fn(&mut Interpreter, Vec<Value>, Span) -> Result<Value, RuntimeError> + 'static,
    ) -> Value {
        Value::Native(Rc::new(NativeFunction {
            name: name.into(),
            func: Box::new(func),
        }))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Get the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Native(_) => "native function",
            Value::Constructor(_) => "constructor",
        }
    }

    /// Short description for diagnostics, e.g. `constructor Map`.
    pub fn describe(&self) -> String {
        match self {
            Value::Constructor(ctor) => format!("constructor {}", ctor.name()),
            Value::Native(native) => format!("native function {}", native.name),
            other => other.type_name().to_string(),
        }
    }

    /// Value equality: structural for scalars and strings, identity for
    /// everything held by reference.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Array(a), Value::Array(b)) | (Value::Set(a), Value::Set(b)) => {
                Rc::ptr_eq(a, b)
            }
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Constructor(a), Value::Constructor(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            _ => false,
        }
    }

    /// `path` holds the collections currently being written, so a value
    /// that contains itself prints as `[...]` instead of recursing.
    fn write(
        &self,
        f: &mut fmt::Formatter<'_>,
        nested: bool,
        path: &mut Vec<*const ()>,
    ) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::Str(s) if nested => write!(f, "{:?}", s),
            Value::Str(s) => write!(f, "{}", s),
            Value::Symbol(sym) => write!(f, "{}", sym),
            Value::Array(items) => {
                let ptr = Rc::as_ptr(items).cast();
                with_cycle_check(f, ptr, path, "[...]", |f, path| {
                    write!(f, "[")?;
                    write_seq(f, &items.borrow(), path)?;
                    write!(f, "]")
                })
            }
            Value::Set(items) => {
                let ptr = Rc::as_ptr(items).cast();
                with_cycle_check(f, ptr, path, "Set {...}", |f, path| {
                    write!(f, "Set {{")?;
                    write_seq(f, &items.borrow(), path)?;
                    write!(f, "}}")
                })
            }
            Value::Map(map) => {
                let ptr = Rc::as_ptr(map).cast();
                with_cycle_check(f, ptr, path, "Map {...}", |f, path| {
                    write!(f, "Map {{")?;
                    for (i, (key, value)) in map.borrow().entries().iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        key.write(f, true, path)?;
                        write!(f, " => ")?;
                        value.write(f, true, path)?;
                    }
                    write!(f, "}}")
                })
            }
            Value::Object(object) => {
                let ptr = Rc::as_ptr(object).cast();
                with_cycle_check(f, ptr, path, "{...}", |f, path| {
                    write!(f, "{{")?;
                    for (i, (key, value)) in object.borrow().properties.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        match key {
                            Key::Name(name) => write!(f, "{}: ", name)?,
                            Key::Symbol(sym) => write!(f, "[{}]: ", sym)?,
                        }
                        value.write(f, true, path)?;
                    }
                    write!(f, "}}")
                })
            }
            Value::Function(closure) => match &closure.def.name {
                Some(name) => write!(f, "<fun {}>", name),
                None => write!(f, "<fun>"),
            },
            Value::Native(native) => write!(f, "<native {}>", native.name),
            Value::Constructor(ctor) => write!(f, "<constructor {}>", ctor.name()),
        }
    }
}

fn with_cycle_check(
    f: &mut fmt::Formatter<'_>,
    ptr: *const (),
    path: &mut Vec<*const ()>,
    placeholder: &str,
    body: impl FnOnce(&mut fmt::Formatter<'_>, &mut Vec<*const ()>) -> fmt::Result,
) -> fmt::Result {
    if path.contains(&ptr) {
        return write!(f, "{}", placeholder);
    }
    path.push(ptr);
    let result = body(f, path);
    path.pop();
    result
}

fn write_seq(
    f: &mut fmt::Formatter<'_>,
    items: &[Value],
    path: &mut Vec<*const ()>,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        item.write(f, true, path)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, false, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, true, &mut Vec::new())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

/// Property key of an object: a plain name or a well-known symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Name(Rc<str>),
    Symbol(WellKnownSymbol),
}

impl Key {
    /// Keys may be strings or symbols; anything else is rejected.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Str(s) => Some(Key::Name(s.clone())),
            Value::Symbol(sym) => Some(Key::Symbol(*sym)),
            _ => None,
        }
    }
}

/// A plain object with insertion-ordered properties.
#[derive(Debug, Clone, Default)]
pub struct Object {
    properties: Vec<(Key, Value)>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Key) -> Option<Value> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn get_name(&self, name: &str) -> Option<Value> {
        self.properties
            .iter()
            .find(|(k, _)| matches!(k, Key::Name(n) if &**n == name))
            .map(|(_, v)| v.clone())
    }

    pub fn set(&mut self, key: Key, value: Value) {
        match self.properties.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.properties.push((key, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Insertion-ordered map keyed by [`Value::equals`].
#[derive(Debug, Clone, Default)]
pub struct OrderedMap {
    entries: Vec<(Value, Value)>,
}

impl OrderedMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites; an overwritten key keeps its first position.
    pub fn insert(&mut self, key: Value, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| k.equals(&key)) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.equals(key))
            .map(|(_, v)| v.clone())
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.iter().any(|(k, _)| k.equals(key))
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A host-language function together with its defining environment.
pub struct Closure {
    pub def: FnDef,
    pub env: Env,
}

pub struct NativeFunction {
    pub name: String,
    pub func: Box<NativeFn>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_nested_strings_are_quoted() {
        let array = Value::array(vec![Value::Int(1), Value::str("two"), Value::Float(3.0)]);
        assert_eq!(array.to_string(), "[1, \"two\", 3.0]");
        assert_eq!(Value::str("plain").to_string(), "plain");
    }

    #[test]
    fn test_display_self_containing_collections() {
        let array = Value::array(vec![Value::Int(1)]);
        if let Value::Array(items) = &array {
            items.borrow_mut().push(array.clone());
        }
        assert_eq!(array.to_string(), "[1, [...]]");

        let mut map = OrderedMap::new();
        map.insert(Value::str("k"), array.clone());
        let map = Value::Map(Rc::new(RefCell::new(map)));
        if let Value::Map(entries) = &map {
            entries.borrow_mut().insert(Value::str("self"), map.clone());
        }
        assert_eq!(map.to_string(), "Map {\"k\" => [1, [...]], \"self\" => Map {...}}");

        // Shared but acyclic values print in full.
        let shared = Value::array(vec![Value::Int(2)]);
        let pair = Value::array(vec![shared.clone(), shared]);
        assert_eq!(pair.to_string(), "[[2], [2]]");
    }

    #[test]
    fn test_ordered_map_overwrite_keeps_position() {
        let mut map = OrderedMap::new();
        map.insert(Value::Int(1), Value::str("a"));
        map.insert(Value::Int(2), Value::str("b"));
        map.insert(Value::Int(1), Value::str("c"));

        assert_eq!(map.len(), 2);
        assert!(map.entries()[0].1.equals(&Value::str("c")));
        assert!(map.contains_key(&Value::Float(2.0)));
    }

    #[test]
    fn test_reference_equality_for_collections() {
        let a = Value::array(vec![]);
        let b = Value::array(vec![]);
        assert!(a.equals(&a.clone()));
        assert!(!a.equals(&b));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::str("").is_truthy());
    }
}
