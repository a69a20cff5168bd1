//! Dynamically-typed values on both sides of the host boundary.
//!
//! [`HostValue`] is what the host stores and passes around: graph elements
//! travel as bare ids. [`Value`] is what routines see: graph elements travel
//! as scope-checked proxies. Converting host → routine wraps ids into proxies
//! bound to the invocation's graph; converting routine → host unwraps them and
//! re-validates each proxy on the way out.

use std::collections::BTreeMap;
use std::fmt;

use time::{Date, Duration, PrimitiveDateTime, Time};

use crate::error::{ProcError, Result};
use crate::proxy::{Edge, GraphRef, Path, Vertex};
use crate::types::{EdgeId, PathId, VertexId};

/// Value in the host's representation.
#[derive(Clone, Debug, PartialEq)]
pub enum HostValue {
    /// Absence of a value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list.
    List(Vec<HostValue>),
    /// String-keyed map.
    Map(BTreeMap<String, HostValue>),
    /// Vertex reference.
    Vertex(VertexId),
    /// Edge reference.
    Edge(EdgeId),
    /// Path reference.
    Path(PathId),
    /// Calendar date.
    Date(Date),
    /// Time of day without zone.
    LocalTime(Time),
    /// Date and time without zone.
    LocalDateTime(PrimitiveDateTime),
    /// Signed duration.
    Duration(Duration),
}

impl HostValue {
    /// Short name of the value's kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Int(_) => "integer",
            HostValue::Float(_) => "float",
            HostValue::String(_) => "string",
            HostValue::List(_) => "list",
            HostValue::Map(_) => "map",
            HostValue::Vertex(_) => "vertex",
            HostValue::Edge(_) => "edge",
            HostValue::Path(_) => "path",
            HostValue::Date(_) => "date",
            HostValue::LocalTime(_) => "local time",
            HostValue::LocalDateTime(_) => "local date time",
            HostValue::Duration(_) => "duration",
        }
    }

    /// Returns `true` if the value (or anything nested in it) is a graph element.
    pub fn contains_graph_element(&self) -> bool {
        match self {
            HostValue::Vertex(_) | HostValue::Edge(_) | HostValue::Path(_) => true,
            HostValue::List(items) => items.iter().any(HostValue::contains_graph_element),
            HostValue::Map(entries) => entries.values().any(HostValue::contains_graph_element),
            _ => false,
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Int(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_owned())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}

/// Result record in the host's representation.
pub type HostRecord = BTreeMap<String, HostValue>;

/// Value as seen by routine code.
#[derive(Clone, Debug)]
pub enum Value {
    /// Absence of a value. Storing it as a property removes the property.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list.
    List(Vec<Value>),
    /// String-keyed map.
    Map(BTreeMap<String, Value>),
    /// Vertex proxy.
    Vertex(Vertex),
    /// Edge proxy.
    Edge(Edge),
    /// Path proxy.
    Path(Path),
    /// Calendar date.
    Date(Date),
    /// Time of day without zone.
    LocalTime(Time),
    /// Date and time without zone.
    LocalDateTime(PrimitiveDateTime),
    /// Signed duration.
    Duration(Duration),
}

impl Value {
    /// Wraps a host value, binding graph elements to `graph`.
    pub fn from_host(graph: &GraphRef, value: HostValue) -> Self {
        match value {
            HostValue::Null => Value::Null,
            HostValue::Bool(v) => Value::Bool(v),
            HostValue::Int(v) => Value::Int(v),
            HostValue::Float(v) => Value::Float(v),
            HostValue::String(v) => Value::String(v),
            HostValue::List(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| Value::from_host(graph, item))
                    .collect(),
            ),
            HostValue::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(key, item)| (key, Value::from_host(graph, item)))
                    .collect(),
            ),
            HostValue::Vertex(id) => Value::Vertex(Vertex::new(graph.clone(), id)),
            HostValue::Edge(id) => Value::Edge(Edge::new(graph.clone(), id)),
            HostValue::Path(id) => Value::Path(Path::from_handle(graph.clone(), id)),
            HostValue::Date(v) => Value::Date(v),
            HostValue::LocalTime(v) => Value::LocalTime(v),
            HostValue::LocalDateTime(v) => Value::LocalDateTime(v),
            HostValue::Duration(v) => Value::Duration(v),
        }
    }

    /// Unwraps proxies back into host ids; fails with a scope error if any
    /// proxy is no longer valid.
    pub fn into_host(self) -> Result<HostValue> {
        Ok(match self {
            Value::Null => HostValue::Null,
            Value::Bool(v) => HostValue::Bool(v),
            Value::Int(v) => HostValue::Int(v),
            Value::Float(v) => HostValue::Float(v),
            Value::String(v) => HostValue::String(v),
            Value::List(items) => HostValue::List(
                items
                    .into_iter()
                    .map(Value::into_host)
                    .collect::<Result<_>>()?,
            ),
            Value::Map(entries) => HostValue::Map(
                entries
                    .into_iter()
                    .map(|(key, item)| item.into_host().map(|item| (key, item)))
                    .collect::<Result<_>>()?,
            ),
            Value::Vertex(vertex) => HostValue::Vertex(vertex.id()?),
            Value::Edge(edge) => HostValue::Edge(edge.id()?),
            Value::Path(path) => HostValue::Path(path.handle()?),
            Value::Date(v) => HostValue::Date(v),
            Value::LocalTime(v) => HostValue::LocalTime(v),
            Value::LocalDateTime(v) => HostValue::LocalDateTime(v),
            Value::Duration(v) => HostValue::Duration(v),
        })
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the value's kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Vertex(_) => "vertex",
            Value::Edge(_) => "edge",
            Value::Path(_) => "path",
            Value::Date(_) => "date",
            Value::LocalTime(_) => "local time",
            Value::LocalDateTime(_) => "local date time",
            Value::Duration(_) => "duration",
        }
    }

    /// Returns the integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i64 => Int,
    f64 => Float,
    String => String,
    Vertex => Vertex,
    Edge => Edge,
    Path => Path,
    Date => Date,
    Time => LocalTime,
    PrimitiveDateTime => LocalDateTime,
    Duration => Duration,
    BTreeMap<String, Value> => Map,
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Extraction of a typed Rust value from a dynamic [`Value`].
pub trait FromValue: Sized {
    /// Converts the value, failing with a conversion error on shape mismatch.
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T> {
    Err(ProcError::Conversion(format!(
        "expected {expected}, got {}",
        value.kind_name()
    )))
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

macro_rules! from_value_variant {
    ($($ty:ty => $variant:ident as $name:literal),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => mismatch($name, &other),
                    }
                }
            }
        )*
    };
}

from_value_variant! {
    bool => Bool as "boolean",
    i64 => Int as "integer",
    String => String as "string",
    Vertex => Vertex as "vertex",
    Edge => Edge as "edge",
    Path => Path as "path",
    Date => Date as "date",
    Time => LocalTime as "local time",
    PrimitiveDateTime => LocalDateTime as "local date time",
    Duration => Duration as "duration",
    BTreeMap<String, Value> => Map as "map",
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            other => mismatch("number", &other),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => mismatch("list", &other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// A record of result field values produced by a routine.
#[derive(Clone, Debug, Default)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a field.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Adds or replaces a field in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Returns a field value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Iterates over fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Converts every field into its host representation.
    pub fn into_host(self) -> Result<HostRecord> {
        self.fields
            .into_iter()
            .map(|(name, value)| value.into_host().map(|value| (name, value)))
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => f.write_str("null"),
            HostValue::Bool(v) => write!(f, "{v}"),
            HostValue::Int(v) => write!(f, "{v}"),
            HostValue::Float(v) => write!(f, "{v}"),
            HostValue::String(v) => write!(f, "{v:?}"),
            HostValue::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            HostValue::Map(entries) => {
                f.write_str("{")?;
                for (idx, (key, item)) in entries.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {item}")?;
                }
                f.write_str("}")
            }
            HostValue::Vertex(id) => write!(f, "vertex({id})"),
            HostValue::Edge(id) => write!(f, "edge({id})"),
            HostValue::Path(id) => write!(f, "path({})", id.0),
            HostValue::Date(v) => write!(f, "{v}"),
            HostValue::LocalTime(v) => write!(f, "{v}"),
            HostValue::LocalDateTime(v) => write!(f, "{v}"),
            HostValue::Duration(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_graph_elements_are_detected() {
        let value = HostValue::Map(BTreeMap::from([(
            "items".to_owned(),
            HostValue::List(vec![HostValue::Int(1), HostValue::Edge(EdgeId(4))]),
        )]));
        assert!(value.contains_graph_element());
        assert!(!HostValue::List(vec![HostValue::from("a")]).contains_graph_element());
    }

    #[test]
    fn scalar_values_round_trip_to_host() {
        let value = Value::from(vec![Value::from(1), Value::Null, Value::from("x")]);
        assert_eq!(
            value.into_host().unwrap(),
            HostValue::List(vec![
                HostValue::Int(1),
                HostValue::Null,
                HostValue::String("x".into())
            ])
        );
    }

    #[test]
    fn from_value_reports_shape_mismatch() {
        let err = i64::from_value(Value::from("seven")).unwrap_err();
        assert_eq!(err.code(), "ConversionError");
        assert_eq!(f64::from_value(Value::Int(3)).unwrap(), 3.0);
        assert_eq!(
            Option::<i64>::from_value(Value::Null).unwrap(),
            None::<i64>
        );
        assert_eq!(
            Vec::<i64>::from_value(Value::from(vec![1i64, 2])).unwrap(),
            vec![1, 2]
        );
    }

    #[test]
    fn records_collect_from_pairs() {
        let record: Record = [("a", 1i64), ("b", 2i64)].into_iter().collect();
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("b").and_then(Value::as_int), Some(2));
    }
}
