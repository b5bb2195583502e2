use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHasher};

use crate::ast::FunctionLiteral;
use crate::environment::Env;

/// Runtime datum produced by evaluation.
///
/// `Return` and `Error` are control-flow signals rather than data: they are
/// propagated outward by every composing operation and never bound to names.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Str(Rc<str>),
    Null,
    Array(Rc<Vec<Value>>),
    Map(Rc<MapValue>),
    Function(Rc<Function>),
    Builtin(Builtin),
    Return(Box<Value>),
    Error(String),
}

impl Value {
    pub fn error(message: impl Into<String>) -> Value {
        Value::Error(message.into())
    }

    pub fn string(text: impl Into<Rc<str>>) -> Value {
        Value::Str(text.into())
    }

    pub fn array(elements: Vec<Value>) -> Value {
        Value::Array(Rc::new(elements))
    }

    /// Name of the runtime type, as shown in error messages and by `typeof`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Boolean(_) => "BOOLEAN",
            Value::Str(_) => "STRING",
            Value::Null => "NULL",
            Value::Array(_) => "ARRAY",
            Value::Map(_) => "MAP",
            Value::Function(_) => "FUNCTION",
            Value::Builtin(_) => "BUILTIN",
            Value::Return(_) => "RETURN_VALUE",
            Value::Error(_) => "ERROR",
        }
    }

    /// Null and `false` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Boolean(false))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Identity comparison backing `==` on non-integer, non-string operands.
    ///
    /// Booleans and Null compare by value, containers and functions by
    /// allocation, builtins by name. Values of different types are never
    /// identical.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            _ => false,
        }
    }

    /// Key under which this value can be stored in a map, if it is hashable.
    pub fn map_key(&self) -> Option<MapKey> {
        match self {
            Value::Boolean(b) => Some(MapKey {
                kind: KeyKind::Boolean,
                hash: u64::from(*b),
            }),
            Value::Integer(n) => Some(MapKey {
                kind: KeyKind::Integer,
                hash: *n as u64,
            }),
            Value::Str(s) => {
                let mut hasher = FxHasher::default();
                s.hash(&mut hasher);
                Some(MapKey {
                    kind: KeyKind::Str,
                    hash: hasher.finish(),
                })
            }
            _ => None,
        }
    }

    pub fn inspect(&self) -> String {
        self.to_string()
    }
}

/// Structural equality, used by tests and host code. The language's own
/// `==` goes through `is_identical` for anything but integers and strings.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a.pairs == b.pairs,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Return(a), Value::Return(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Null => write!(f, "null"),
            Value::Array(elements) => {
                let elements: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", elements.join(", "))
            }
            Value::Map(map) => {
                let pairs: Vec<String> = map
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value))
                    .collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Value::Function(function) => write!(f, "{}", function),
            Value::Builtin(_) => write!(f, "builtin function"),
            Value::Return(value) => write!(f, "{}", value),
            Value::Error(message) => write!(f, "ERROR: {}", message),
        }
    }
}

/// A user-defined function closed over the scope it was created in.
pub struct Function {
    pub literal: Rc<FunctionLiteral>,
    pub env: Env,
}

impl Function {
    pub fn new(literal: Rc<FunctionLiteral>, env: Env) -> Self {
        Function { literal, env }
    }
}

// The captured scope may contain this very function, so it is left out.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self
            .literal
            .parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        f.debug_struct("Function").field("parameters", &params).finish()
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self
            .literal
            .parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        write!(f, "fn({}) {{\n{}\n}}", params.join(", "), self.literal.body)
    }
}

pub type BuiltinFn = fn(Vec<Value>) -> Value;

/// A native function exposed to programs under a reserved name.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

// Function pointers are not reliably comparable; the name is unique in the table.
impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Boolean,
    Integer,
    Str,
}

/// Hash key of a map entry. The type tag keeps `1` and `true` apart.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MapKey {
    pub kind: KeyKind,
    pub hash: u64,
}

/// Map contents in insertion order, indexed by key.
#[derive(Debug, Clone, Default)]
pub struct MapValue {
    pairs: Vec<(Value, Value)>,
    index: FxHashMap<MapKey, usize>,
}

impl MapValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a pair; an existing key keeps its position and gets the new value.
    pub fn insert(&mut self, hash_key: MapKey, key: Value, value: Value) {
        match self.index.get(&hash_key) {
            Some(&slot) => self.pairs[slot] = (key, value),
            None => {
                self.index.insert(hash_key, self.pairs.len());
                self.pairs.push((key, value));
            }
        }
    }

    pub fn get(&self, hash_key: &MapKey) -> Option<&Value> {
        self.index.get(hash_key).map(|&slot| &self.pairs[slot].1)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.pairs.iter().map(|(key, value)| (key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(value: &Value) -> MapKey {
        match value.map_key() {
            Some(key) => key,
            None => panic!("{} should be hashable", value.type_name()),
        }
    }

    #[test]
    fn test_string_keys_hash_by_content() {
        let hello1 = Value::string("Hello World");
        let hello2 = Value::string("Hello World");
        let diff = Value::string("My name is johnny");
        assert_eq!(key(&hello1), key(&hello2));
        assert_ne!(key(&hello1), key(&diff));
    }

    #[test]
    fn test_keys_of_different_types_never_collide() {
        assert_ne!(key(&Value::Integer(1)), key(&Value::Boolean(true)));
        assert_ne!(key(&Value::Integer(0)), key(&Value::Boolean(false)));
        assert_eq!(key(&Value::Integer(-1)).hash, u64::MAX);
    }

    #[test]
    fn test_unhashable_values() {
        assert!(Value::Null.map_key().is_none());
        assert!(Value::array(vec![]).map_key().is_none());
        assert!(Value::Map(Rc::new(MapValue::new())).map_key().is_none());
    }

    #[test]
    fn test_map_preserves_insertion_order_and_replaces_in_place() {
        let mut map = MapValue::new();
        for (name, n) in [("one", 1), ("two", 2), ("three", 3)] {
            let k = Value::string(name);
            map.insert(key(&k), k, Value::Integer(n));
        }
        let two = Value::string("two");
        map.insert(key(&two), two.clone(), Value::Integer(22));

        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&key(&two)), Some(&Value::Integer(22)));
        assert_eq!(
            Value::Map(Rc::new(map)).to_string(),
            "{one: 1, two: 22, three: 3}"
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Integer(-5).to_string(), "-5");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::string("raw \"text\"").to_string(), "raw \"text\"");
        assert_eq!(
            Value::array(vec![Value::Integer(1), Value::string("a")]).to_string(),
            "[1, a]"
        );
        assert_eq!(Value::error("boom").to_string(), "ERROR: boom");
        assert_eq!(Value::Return(Box::new(Value::Integer(7))).inspect(), "7");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::string("").is_truthy());
        assert!(Value::array(vec![]).is_truthy());
    }

    #[test]
    fn test_identity() {
        let array = Value::array(vec![Value::Integer(1)]);
        assert!(array.is_identical(&array.clone()));
        assert!(!array.is_identical(&Value::array(vec![Value::Integer(1)])));
        assert!(Value::Null.is_identical(&Value::Null));
        assert!(Value::Boolean(false).is_identical(&Value::Boolean(false)));
        assert!(!Value::Boolean(false).is_identical(&Value::Null));
        // Structural equality still sees the copies as equal.
        assert_eq!(array, Value::array(vec![Value::Integer(1)]));
    }

    #[test]
    fn test_type_names() {
        let cases = [
            (Value::Integer(1), "INTEGER"),
            (Value::Boolean(true), "BOOLEAN"),
            (Value::string("s"), "STRING"),
            (Value::Null, "NULL"),
            (Value::array(vec![]), "ARRAY"),
            (Value::Map(Rc::new(MapValue::new())), "MAP"),
            (Value::Return(Box::new(Value::Null)), "RETURN_VALUE"),
            (Value::error("e"), "ERROR"),
        ];
        for (value, name) in cases {
            assert_eq!(value.type_name(), name);
        }
    }
}
