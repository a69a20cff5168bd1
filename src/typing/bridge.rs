use super::{Annotation, Class, TypeDescriptor};
use crate::error::{ProcError, Result};

/// Reduces an annotation to the descriptor the host enforces.
///
/// Known classes and the `Any`/`Number`/`Map` aliases are looked up first.
/// A union holding the "no value" marker becomes nullable over the remaining
/// members, a list becomes a list over its item type, and everything else is
/// rejected.
pub fn bridge(annotation: &Annotation) -> Result<TypeDescriptor> {
    if let Some(descriptor) = lookup(annotation) {
        return Ok(descriptor);
    }
    match annotation {
        Annotation::Union(members) if members.contains(&Annotation::NoneType) => {
            let mut rest: Vec<Annotation> = members
                .iter()
                .filter(|member| **member != Annotation::NoneType)
                .cloned()
                .collect();
            let inner = if rest.len() == 1 {
                rest.remove(0)
            } else {
                Annotation::union(rest)
            };
            Ok(TypeDescriptor::nullable(bridge(&inner)?))
        }
        Annotation::List(inner) => Ok(TypeDescriptor::list(bridge(inner)?)),
        other => Err(unsupported(other)),
    }
}

pub(super) fn unsupported(annotation: &Annotation) -> ProcError {
    ProcError::UnsupportedType {
        annotation: annotation.to_string(),
    }
}

pub(super) fn class_descriptor(class: Class) -> Option<TypeDescriptor> {
    Some(match class {
        Class::Object | Class::TypingAny => TypeDescriptor::nullable(TypeDescriptor::Any),
        Class::BareList => {
            TypeDescriptor::list(TypeDescriptor::nullable(TypeDescriptor::Any))
        }
        Class::Bool => TypeDescriptor::Bool,
        Class::Str => TypeDescriptor::String,
        Class::Int => TypeDescriptor::Int,
        Class::Float => TypeDescriptor::Float,
        Class::Vertex => TypeDescriptor::Node,
        Class::Edge => TypeDescriptor::Relationship,
        Class::Path => TypeDescriptor::Path,
        Class::Date => TypeDescriptor::Date,
        Class::LocalTime => TypeDescriptor::LocalTime,
        Class::LocalDateTime => TypeDescriptor::LocalDateTime,
        Class::Duration => TypeDescriptor::Duration,
        Class::Dict => return None,
    })
}

/// Union aliases with their descriptors.
pub(super) fn union_aliases() -> [(Annotation, TypeDescriptor); 3] {
    [
        (Annotation::any(), TypeDescriptor::Any),
        (Annotation::number(), TypeDescriptor::Number),
        (Annotation::map(), TypeDescriptor::Map),
    ]
}

fn lookup(annotation: &Annotation) -> Option<TypeDescriptor> {
    match annotation {
        Annotation::Class(class) => class_descriptor(*class),
        Annotation::Union(_) => union_aliases()
            .into_iter()
            .find(|(alias, _)| alias.same_type(annotation))
            .map(|(_, descriptor)| descriptor),
        _ => None,
    }
}
