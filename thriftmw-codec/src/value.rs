//! Type descriptions and wire values.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thriftmw_protocol::{
    ApplicationException, InputProtocol, OutputProtocol, ProtocolError, TType,
};

/// A structured type that knows how to read and write itself.
///
/// The codec never looks inside a struct; it hands the stream to the struct.
/// A struct that also reports an `error_message` is a declared exception and
/// is written back to the peer verbatim.
pub trait WireStruct: fmt::Debug + Send + Sync + 'static {
    fn read(&mut self, iprot: &mut dyn InputProtocol) -> Result<(), ProtocolError>;

    fn write(&self, oprot: &mut dyn OutputProtocol) -> Result<(), ProtocolError>;

    fn as_any(&self) -> &dyn Any;

    /// Human-readable rendering of the struct.
    fn describe(&self) -> String {
        format!("{self:?}")
    }

    /// `Some` when this struct is a declared exception.
    fn error_message(&self) -> Option<String> {
        None
    }

    /// Structural equality across trait objects.
    fn same_as(&self, other: &dyn WireStruct) -> bool {
        self.describe() == other.describe()
    }
}

impl WireStruct for ApplicationException {
    fn read(&mut self, iprot: &mut dyn InputProtocol) -> Result<(), ProtocolError> {
        *self = ApplicationException::read(iprot)?;
        Ok(())
    }

    fn write(&self, oprot: &mut dyn OutputProtocol) -> Result<(), ProtocolError> {
        ApplicationException::write(self, oprot)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn error_message(&self) -> Option<String> {
        Some(self.to_string())
    }
}

/// A named constructor for a structured type.
#[derive(Clone, Copy)]
pub struct StructType {
    pub name: &'static str,
    pub new: fn() -> Box<dyn WireStruct>,
}

impl StructType {
    pub fn new(name: &'static str, new: fn() -> Box<dyn WireStruct>) -> Self {
        Self { name, new }
    }

    /// Descriptor for any `Default` struct type.
    pub fn of<T: WireStruct + Default>(name: &'static str) -> Self {
        Self {
            name,
            new: || Box::new(T::default()),
        }
    }
}

impl fmt::Debug for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Struct({})", self.name)
    }
}

impl PartialEq for StructType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for StructType {}

/// Runtime description of an argument or result slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDesc {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Double,
    String,
    List(Box<TypeDesc>),
    Map(Box<TypeDesc>, Box<TypeDesc>),
    Struct(StructType),
    /// A plain error slot. Non-null errors become internal-error replies.
    Error,
    /// A kind the marshaler does not model; reads and writes are skipped.
    Unsupported(&'static str),
}

impl TypeDesc {
    pub fn list(element: TypeDesc) -> Self {
        TypeDesc::List(Box::new(element))
    }

    pub fn map(key: TypeDesc, value: TypeDesc) -> Self {
        TypeDesc::Map(Box::new(key), Box::new(value))
    }

    pub fn of_struct<T: WireStruct + Default>(name: &'static str) -> Self {
        TypeDesc::Struct(StructType::of::<T>(name))
    }

    /// Wire type id for this descriptor. Unmodeled kinds map to `Stop`.
    pub fn ttype(&self) -> TType {
        match self {
            TypeDesc::Bool => TType::Bool,
            TypeDesc::I8 => TType::Byte,
            TypeDesc::I16 => TType::I16,
            TypeDesc::I32 => TType::I32,
            TypeDesc::I64 => TType::I64,
            TypeDesc::Double => TType::Double,
            TypeDesc::String => TType::String,
            TypeDesc::List(_) => TType::List,
            TypeDesc::Map(_, _) => TType::Map,
            TypeDesc::Struct(_) | TypeDesc::Error => TType::Struct,
            TypeDesc::Unsupported(_) => TType::Stop,
        }
    }
}

/// Key-ordered mapping of wire values.
///
/// Entries keep decode/insertion order, but lookup and equality are by key
/// value.
#[derive(Debug)]
pub struct WireMap {
    pub key_type: TType,
    pub value_type: TType,
    entries: Vec<(Value, Value)>,
}

impl WireMap {
    pub fn new(key_type: TType, value_type: TType) -> Self {
        Self::with_capacity(key_type, value_type, 0)
    }

    pub fn with_capacity(key_type: TType, value_type: TType, capacity: usize) -> Self {
        Self {
            key_type,
            value_type,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Inserts an entry, replacing the value of an equal key in place.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl PartialEq for WireMap {
    fn eq(&self, other: &Self) -> bool {
        self.key_type == other.key_type
            && self.value_type == other.value_type
            && self.len() == other.len()
            && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

/// An owned wire value.
#[derive(Debug)]
pub enum Value {
    /// Absent optional value; never written.
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Double(f64),
    String(String),
    List { element_type: TType, items: Vec<Value> },
    Map(WireMap),
    Struct(Box<dyn WireStruct>),
    /// Plain error returned by a handler.
    Error(Box<dyn StdError + Send + Sync>),
    /// Value of a kind the marshaler does not model.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn list(element_type: TType, items: Vec<Value>) -> Self {
        Value::List {
            element_type,
            items,
        }
    }

    pub fn from_struct(value: impl WireStruct) -> Self {
        Value::Struct(Box::new(value))
    }

    pub fn error(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Value::Error(err.into())
    }

    /// Wraps an optional value, mapping `None` to `Null`.
    pub fn optional<T: Into<Value>>(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Wire type id for this value, `None` for values that are never written.
    pub fn ttype(&self) -> Option<TType> {
        Some(match self {
            Value::Null | Value::Error(_) | Value::Opaque(_) => return None,
            Value::Bool(_) => TType::Bool,
            Value::I8(_) => TType::Byte,
            Value::I16(_) => TType::I16,
            Value::I32(_) => TType::I32,
            Value::I64(_) => TType::I64,
            Value::Double(_) => TType::Double,
            Value::String(_) => TType::String,
            Value::List { .. } => TType::List,
            Value::Map(_) => TType::Map,
            Value::Struct(_) => TType::Struct,
        })
    }

    /// Returns the exception message when this is a declared exception.
    pub fn exception_message(&self) -> Option<String> {
        match self {
            Value::Struct(s) => s.error_message(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&WireMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Borrows a struct value as its concrete type.
    pub fn downcast_struct<T: WireStruct>(&self) -> Option<&T> {
        match self {
            Value::Struct(s) => s.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (
                Value::List {
                    element_type: ta,
                    items: a,
                },
                Value::List {
                    element_type: tb,
                    items: b,
                },
            ) => ta == tb && a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a.same_as(b.as_ref()),
            (Value::Error(a), Value::Error(b)) => a.to_string() == b.to_string(),
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::I8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::I16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<WireMap> for Value {
    fn from(v: WireMap) -> Self {
        Value::Map(v)
    }
}
