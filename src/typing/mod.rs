//! Type descriptors and the annotations they are derived from.
//!
//! Routine authors declare parameter and result types either statically,
//! through [`CypherType`] (`.arg::<Option<i64>>("x")`), or as an explicit
//! [`Annotation`] tree. Either way the declaration is reduced by
//! [`bridge`] to a [`TypeDescriptor`], the value the host enforces when it
//! binds arguments and checks results.

use std::fmt;

use crate::proxy::{Edge, Path, Vertex};
use crate::value::{HostValue, Value};

mod bridge;
mod textual;

pub use bridge::bridge;
pub use textual::bridge_text;

/// Host-side description of an accepted value shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    /// Any non-null value.
    Any,
    /// Boolean.
    Bool,
    /// String.
    String,
    /// Integer.
    Int,
    /// Float.
    Float,
    /// Integer or float.
    Number,
    /// Map, vertex or edge.
    Map,
    /// Vertex.
    Node,
    /// Edge.
    Relationship,
    /// Path.
    Path,
    /// Calendar date.
    Date,
    /// Time of day.
    LocalTime,
    /// Date and time.
    LocalDateTime,
    /// Duration.
    Duration,
    /// List whose items all match the inner type.
    List(Box<TypeDescriptor>),
    /// Null or the inner type.
    Nullable(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    /// `LIST OF inner`.
    pub fn list(inner: TypeDescriptor) -> Self {
        TypeDescriptor::List(Box::new(inner))
    }

    /// `inner?`.
    pub fn nullable(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Nullable(Box::new(inner))
    }

    /// Returns `true` if `value` has the described shape.
    pub fn accepts(&self, value: &HostValue) -> bool {
        match (self, value) {
            (TypeDescriptor::Nullable(_), HostValue::Null) => true,
            (TypeDescriptor::Nullable(inner), other) => inner.accepts(other),
            (_, HostValue::Null) => false,
            (TypeDescriptor::Any, _) => true,
            (TypeDescriptor::Bool, HostValue::Bool(_)) => true,
            (TypeDescriptor::String, HostValue::String(_)) => true,
            (TypeDescriptor::Int, HostValue::Int(_)) => true,
            (TypeDescriptor::Float, HostValue::Float(_)) => true,
            (TypeDescriptor::Number, HostValue::Int(_) | HostValue::Float(_)) => true,
            (
                TypeDescriptor::Map,
                HostValue::Map(_) | HostValue::Vertex(_) | HostValue::Edge(_),
            ) => true,
            (TypeDescriptor::Node, HostValue::Vertex(_)) => true,
            (TypeDescriptor::Relationship, HostValue::Edge(_)) => true,
            (TypeDescriptor::Path, HostValue::Path(_)) => true,
            (TypeDescriptor::Date, HostValue::Date(_)) => true,
            (TypeDescriptor::LocalTime, HostValue::LocalTime(_)) => true,
            (TypeDescriptor::LocalDateTime, HostValue::LocalDateTime(_)) => true,
            (TypeDescriptor::Duration, HostValue::Duration(_)) => true,
            (TypeDescriptor::List(inner), HostValue::List(items)) => {
                items.iter().all(|item| inner.accepts(item))
            }
            _ => false,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Any => f.write_str("ANY"),
            TypeDescriptor::Bool => f.write_str("BOOLEAN"),
            TypeDescriptor::String => f.write_str("STRING"),
            TypeDescriptor::Int => f.write_str("INTEGER"),
            TypeDescriptor::Float => f.write_str("FLOAT"),
            TypeDescriptor::Number => f.write_str("NUMBER"),
            TypeDescriptor::Map => f.write_str("MAP"),
            TypeDescriptor::Node => f.write_str("NODE"),
            TypeDescriptor::Relationship => f.write_str("RELATIONSHIP"),
            TypeDescriptor::Path => f.write_str("PATH"),
            TypeDescriptor::Date => f.write_str("DATE"),
            TypeDescriptor::LocalTime => f.write_str("LOCAL_TIME"),
            TypeDescriptor::LocalDateTime => f.write_str("LOCAL_DATE_TIME"),
            TypeDescriptor::Duration => f.write_str("DURATION"),
            TypeDescriptor::List(inner) => write!(f, "LIST OF {inner}"),
            TypeDescriptor::Nullable(inner) => write!(f, "{inner}?"),
        }
    }
}

/// Concrete classes an annotation can name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Class {
    /// Root object type; accepts anything including null.
    Object,
    /// The dynamic "any" marker; accepts anything including null.
    TypingAny,
    /// Un-parameterized list.
    BareList,
    /// Boolean.
    Bool,
    /// String.
    Str,
    /// Integer.
    Int,
    /// Float.
    Float,
    /// String-keyed map.
    Dict,
    /// Vertex proxy.
    Vertex,
    /// Edge proxy.
    Edge,
    /// Path proxy.
    Path,
    /// Calendar date.
    Date,
    /// Time of day.
    LocalTime,
    /// Date and time.
    LocalDateTime,
    /// Duration.
    Duration,
}

impl Class {
    /// Fully-qualified name, as printed inside composite annotations.
    pub fn qualified_name(self) -> &'static str {
        match self {
            Class::Object => "object",
            Class::TypingAny => "typing.Any",
            Class::BareList => "list",
            Class::Bool => "bool",
            Class::Str => "str",
            Class::Int => "int",
            Class::Float => "float",
            Class::Dict => "dict",
            Class::Vertex => "mgp.Vertex",
            Class::Edge => "mgp.Edge",
            Class::Path => "mgp.Path",
            Class::Date => "datetime.date",
            Class::LocalTime => "datetime.time",
            Class::LocalDateTime => "datetime.datetime",
            Class::Duration => "datetime.timedelta",
        }
    }
}

/// Declared type of a parameter or result field.
///
/// Unions are kept flat and duplicate-free; build them with
/// [`Annotation::union`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Annotation {
    /// A concrete class.
    Class(Class),
    /// A union of two or more members.
    Union(Vec<Annotation>),
    /// Homogeneous list.
    List(Box<Annotation>),
    /// The "no value" marker.
    NoneType,
    /// A named type outside the supported grammar.
    Other(String),
}

impl Annotation {
    /// Builds a union, flattening nested unions and dropping duplicates while
    /// keeping first-occurrence order. A single remaining member is returned
    /// as is.
    pub fn union(members: impl IntoIterator<Item = Annotation>) -> Annotation {
        let mut flat: Vec<Annotation> = Vec::new();
        for member in members {
            let nested = match member {
                Annotation::Union(inner) => inner,
                other => vec![other],
            };
            for item in nested {
                if !flat.contains(&item) {
                    flat.push(item);
                }
            }
        }
        if flat.len() == 1 {
            flat.pop().unwrap_or(Annotation::NoneType)
        } else {
            Annotation::Union(flat)
        }
    }

    /// `List[inner]`.
    pub fn list(inner: Annotation) -> Annotation {
        Annotation::List(Box::new(inner))
    }

    /// `Union[inner, None]`.
    pub fn optional(inner: Annotation) -> Annotation {
        Annotation::union([inner, Annotation::NoneType])
    }

    /// Integer or float.
    pub fn number() -> Annotation {
        Annotation::union([Annotation::Class(Class::Int), Annotation::Class(Class::Float)])
    }

    /// Map-like values: dicts and graph elements with properties.
    pub fn map() -> Annotation {
        Annotation::union([
            Annotation::Class(Class::Dict),
            Annotation::Class(Class::Edge),
            Annotation::Class(Class::Vertex),
        ])
    }

    /// Any non-null value.
    pub fn any() -> Annotation {
        Annotation::union([
            Annotation::Class(Class::Bool),
            Annotation::Class(Class::Str),
            Annotation::number(),
            Annotation::map(),
            Annotation::Class(Class::Path),
            Annotation::Class(Class::BareList),
        ])
    }

    /// Top-level printed form: classes print as `<class 'name'>`, everything
    /// else as its qualified form.
    pub fn printed(&self) -> String {
        match self {
            Annotation::Class(class) => format!("<class '{}'>", class.qualified_name()),
            Annotation::Other(name) => format!("<class '{name}'>"),
            other => other.to_string(),
        }
    }

    /// Compares two annotations, treating union members as a set.
    pub fn same_type(&self, other: &Annotation) -> bool {
        match (self, other) {
            (Annotation::Union(left), Annotation::Union(right)) => {
                left.len() == right.len()
                    && left
                        .iter()
                        .all(|member| right.iter().any(|candidate| member.same_type(candidate)))
            }
            (Annotation::List(left), Annotation::List(right)) => left.same_type(right),
            (left, right) => left == right,
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotation::Class(class) => f.write_str(class.qualified_name()),
            Annotation::Union(members) => {
                f.write_str("typing.Union[")?;
                for (idx, member) in members.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{member}")?;
                }
                f.write_str("]")
            }
            Annotation::List(inner) => write!(f, "typing.List[{inner}]"),
            Annotation::NoneType => f.write_str("NoneType"),
            Annotation::Other(name) => f.write_str(name),
        }
    }
}

/// Rust types usable as declared parameter or result types.
pub trait CypherType {
    /// The annotation this type declares.
    fn annotation() -> Annotation;
}

/// Marker for "any non-null value".
#[derive(Copy, Clone, Debug)]
pub struct Any;

/// Marker for "integer or float".
#[derive(Copy, Clone, Debug)]
pub struct Number;

/// Marker for "map, vertex or edge".
#[derive(Copy, Clone, Debug)]
pub struct Map;

/// Null or `T`.
pub type Nullable<T> = Option<T>;

/// List of `T`.
pub type List<T> = Vec<T>;

impl CypherType for Any {
    fn annotation() -> Annotation {
        Annotation::any()
    }
}

impl CypherType for Number {
    fn annotation() -> Annotation {
        Annotation::number()
    }
}

impl CypherType for Map {
    fn annotation() -> Annotation {
        Annotation::map()
    }
}

macro_rules! cypher_class {
    ($($ty:ty => $class:ident),* $(,)?) => {
        $(
            impl CypherType for $ty {
                fn annotation() -> Annotation {
                    Annotation::Class(Class::$class)
                }
            }
        )*
    };
}

cypher_class! {
    Value => Object,
    bool => Bool,
    String => Str,
    i64 => Int,
    f64 => Float,
    Vertex => Vertex,
    Edge => Edge,
    Path => Path,
    time::Date => Date,
    time::Time => LocalTime,
    time::PrimitiveDateTime => LocalDateTime,
    time::Duration => Duration,
}

impl<T: CypherType> CypherType for Vec<T> {
    fn annotation() -> Annotation {
        Annotation::list(T::annotation())
    }
}

impl<T: CypherType> CypherType for Option<T> {
    fn annotation() -> Annotation {
        Annotation::optional(T::annotation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VertexId;

    #[test]
    fn union_flattens_and_dedups() {
        let nested = Annotation::union([
            Annotation::number(),
            Annotation::Class(Class::Int),
            Annotation::NoneType,
        ]);
        assert_eq!(nested.to_string(), "typing.Union[int, float, NoneType]");
        assert_eq!(
            Annotation::union([Annotation::Class(Class::Str)]),
            Annotation::Class(Class::Str)
        );
    }

    #[test]
    fn any_alias_lists_nine_members() {
        match Annotation::any() {
            Annotation::Union(members) => assert_eq!(members.len(), 9),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn printed_form_wraps_top_level_classes() {
        assert_eq!(Annotation::Class(Class::Int).printed(), "<class 'int'>");
        assert_eq!(
            Annotation::list(Annotation::Class(Class::Vertex)).printed(),
            "typing.List[mgp.Vertex]"
        );
    }

    #[test]
    fn same_type_ignores_union_order() {
        let forward = Annotation::union([
            Annotation::Class(Class::Int),
            Annotation::Class(Class::Float),
        ]);
        let backward = Annotation::union([
            Annotation::Class(Class::Float),
            Annotation::Class(Class::Int),
        ]);
        assert!(forward.same_type(&backward));
        assert_ne!(forward, backward);
    }

    #[test]
    fn descriptors_check_value_shapes() {
        let ty = TypeDescriptor::list(TypeDescriptor::nullable(TypeDescriptor::Number));
        assert!(ty.accepts(&HostValue::List(vec![
            HostValue::Int(1),
            HostValue::Null,
            HostValue::Float(2.5)
        ])));
        assert!(!ty.accepts(&HostValue::List(vec![HostValue::from("x")])));
        assert!(!TypeDescriptor::Any.accepts(&HostValue::Null));
        assert!(TypeDescriptor::Map.accepts(&HostValue::Vertex(VertexId(1))));
        assert_eq!(ty.to_string(), "LIST OF NUMBER?");
    }
}
