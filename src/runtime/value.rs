use crate::language::ast::SyntaxNode;
use crate::runtime::error::{CoralError, RuntimeError};
use crate::runtime::interop::{NativeFn, NativeObject};
use crate::runtime::scope::ScopeId;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Every value a script can hold. Lists and maps have reference semantics:
/// clones share the underlying storage.
#[derive(Clone)]
pub enum Value {
    Null,
    Int(i64),
    Bool(bool),
    Str(String),
    List(ListValue),
    Map(MapValue),
    Function(Rc<FunctionValue>),
    Native(Rc<dyn NativeObject>),
}

#[derive(Clone, Debug, Default)]
pub struct ListValue {
    items: Rc<RefCell<Vec<Value>>>,
}

impl ListValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            items: Rc::new(RefCell::new(items)),
        }
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.borrow().get(index).cloned()
    }

    pub fn set(&self, index: usize, value: Value) -> bool {
        let mut items = self.items.borrow_mut();
        match items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn push(&self, value: Value) {
        self.items.borrow_mut().push(value);
    }

    /// A copy of the current contents, detached from the shared storage.
    pub fn snapshot(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }

    pub fn shares_storage(&self, other: &ListValue) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }
}

/// Insertion-ordered map. Key lookup is a linear scan with `key_eq`, which
/// keeps iteration order equal to insertion order.
#[derive(Clone, Debug, Default)]
pub struct MapValue {
    entries: Rc<RefCell<Vec<(Value, Value)>>>,
}

impl MapValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: Vec<(Value, Value)>) -> Self {
        let map = Self::new();
        for (key, value) in pairs {
            map.insert(key, value);
        }
        map
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries
            .borrow()
            .iter()
            .find(|(k, _)| k.key_eq(key))
            .map(|(_, v)| v.clone())
    }

    pub fn contains(&self, key: &Value) -> bool {
        self.entries.borrow().iter().any(|(k, _)| k.key_eq(key))
    }

    /// Replaces an existing entry in place or appends a new one.
    pub fn insert(&self, key: Value, value: Value) {
        let mut entries = self.entries.borrow_mut();
        for (k, v) in entries.iter_mut() {
            if k.key_eq(&key) {
                *v = value;
                return;
            }
        }
        entries.push((key, value));
    }

    pub fn remove(&self, key: &Value) -> Option<Value> {
        let mut entries = self.entries.borrow_mut();
        let index = entries.iter().position(|(k, _)| k.key_eq(key))?;
        Some(entries.remove(index).1)
    }

    /// Keys in insertion order, detached from the shared storage.
    pub fn keys(&self) -> Vec<Value> {
        self.entries.borrow().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn pairs(&self) -> Vec<(Value, Value)> {
        self.entries.borrow().clone()
    }

    pub fn shares_storage(&self, other: &MapValue) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }
}

pub enum FunctionValue {
    /// A script function: its body plus the scope it closed over.
    Interpreted {
        name: String,
        params: Vec<String>,
        body: Rc<SyntaxNode>,
        captured: ScopeId,
    },
    /// A host function exposed to scripts.
    Native { name: String, f: NativeFn },
}

impl FunctionValue {
    pub fn name(&self) -> &str {
        match self {
            FunctionValue::Interpreted { name, .. } => name,
            FunctionValue::Native { name, .. } => name,
        }
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionValue::Interpreted { name, params, .. } => f
                .debug_struct("Interpreted")
                .field("name", name)
                .field("params", params)
                .finish_non_exhaustive(),
            FunctionValue::Native { name, .. } => {
                f.debug_struct("Native").field("name", name).finish_non_exhaustive()
            }
        }
    }
}

impl Value {
    pub fn str(text: impl Into<String>) -> Value {
        Value::Str(text.into())
    }

    pub fn list_from(items: Vec<Value>) -> Value {
        Value::List(ListValue::from_vec(items))
    }

    pub fn map_from(pairs: Vec<(Value, Value)>) -> Value {
        Value::Map(MapValue::from_pairs(pairs))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Function(_) => "function",
            Value::Native(obj) => obj.type_name(),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(v) => *v != 0,
            Value::Bool(v) => *v,
            Value::Str(s) => !s.is_empty(),
            Value::List(_) | Value::Map(_) | Value::Function(_) | Value::Native(_) => true,
        }
    }

    pub fn coerce_int(&self) -> Result<i64, CoralError> {
        match self {
            Value::Int(v) => Ok(*v),
            Value::Bool(v) => Ok(i64::from(*v)),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| CoralError::arg(format!("Can't convert '{}' to a number", s))),
            other => Err(CoralError::arg(format!(
                "Can't use a {} value as a number",
                other.type_name()
            ))),
        }
    }

    pub fn coerce_string(&self) -> String {
        self.to_string()
    }

    /// Map-key identity: structural for scalars, shared storage for
    /// containers and functions.
    pub fn key_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a.shares_storage(b),
            (Value::Map(a), Value::Map(b)) => a.shares_storage(b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The `==` operator. Strings win over numbers: if either side is a
    /// string, both are compared as strings.
    pub fn script_eq(&self, other: &Value) -> Result<bool, CoralError> {
        match (self, other) {
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Ok(self.coerce_string() == other.coerce_string())
            }
            (Value::Null, Value::Null) => Ok(true),
            (Value::Null, _) | (_, Value::Null) => Ok(false),
            (Value::Int(_), _) | (_, Value::Int(_)) => {
                Ok(self.coerce_int()? == other.coerce_int()?)
            }
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Native(a), Value::Native(b)) => Ok(Rc::ptr_eq(a, b)),
            _ => Ok(self.truthy() == other.truthy()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Value::Function(func) => f.debug_tuple("Function").field(func).finish(),
            Value::Native(obj) => write!(f, "Native({})", obj.type_name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.snapshot().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (idx, (key, value)) in entries.pairs().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "<function {}>", func.name()),
            Value::Native(obj) => write!(f, "<{}>", obj.type_name()),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = RuntimeError;

    fn try_from(value: Value) -> Result<i64, RuntimeError> {
        match value {
            Value::Int(v) => Ok(v),
            other => Err(RuntimeError::Coerce {
                expected: "int",
                actual: other.type_name(),
            }),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = RuntimeError;

    fn try_from(value: Value) -> Result<bool, RuntimeError> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(RuntimeError::Coerce {
                expected: "bool",
                actual: other.type_name(),
            }),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = RuntimeError;

    fn try_from(value: Value) -> Result<String, RuntimeError> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(RuntimeError::Coerce {
                expected: "string",
                actual: other.type_name(),
            }),
        }
    }
}

/// Resolves optional slice bounds against a length, clamping rather than
/// failing. A negative end counts back from the length; a begin at or past
/// the end yields an empty slice. Begin does not count back.
pub fn slice_bounds(len: usize, begin: Option<i64>, end: Option<i64>) -> (usize, usize) {
    let len_i = len as i64;
    let begin = begin.unwrap_or(0).clamp(0, len_i);
    let end = match end {
        None => len_i,
        Some(e) if e < 0 => (len_i + e).clamp(0, len_i),
        Some(e) => e.min(len_i),
    };
    if begin >= end {
        (0, 0)
    } else {
        (begin as usize, end as usize)
    }
}
