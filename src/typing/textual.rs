//! Descriptor derivation from the printed form of an annotation.
//!
//! Works on text such as `typing.Union[typing.List[int], NoneType]` and must
//! agree with [`bridge`](super::bridge) on every annotation both can express.

use super::bridge::{class_descriptor, union_aliases};
use super::{Annotation, Class, TypeDescriptor};
use crate::error::{ProcError, Result};

const UNION_PREFIX: &str = "typing.Union[";
const LIST_PREFIX: &str = "typing.List[";
const NONE_TYPE: &str = "NoneType";

const CLASSES: [Class; 15] = [
    Class::Object,
    Class::TypingAny,
    Class::BareList,
    Class::Bool,
    Class::Str,
    Class::Int,
    Class::Float,
    Class::Dict,
    Class::Vertex,
    Class::Edge,
    Class::Path,
    Class::Date,
    Class::LocalTime,
    Class::LocalDateTime,
    Class::Duration,
];

/// Reduces a printed annotation to a descriptor.
pub fn bridge_text(text: &str) -> Result<TypeDescriptor> {
    let text = text.trim();
    if let Some(descriptor) = simple_match(text) {
        return Ok(descriptor);
    }
    if let Some(inner) = strip_generic(text, UNION_PREFIX) {
        let args = split_args(inner)?;
        if args.iter().any(|arg| *arg == NONE_TYPE) {
            let rest: Vec<&str> = args.into_iter().filter(|arg| *arg != NONE_TYPE).collect();
            let inner = match rest.as_slice() {
                [] => return Err(unsupported(text)),
                [single] => (*single).to_owned(),
                many => format!("{UNION_PREFIX}{}]", many.join(", ")),
            };
            return Ok(TypeDescriptor::nullable(bridge_text(&inner)?));
        }
        return Err(unsupported(text));
    }
    if let Some(inner) = strip_generic(text, LIST_PREFIX) {
        return Ok(TypeDescriptor::list(bridge_text(inner)?));
    }
    Err(unsupported(text))
}

fn unsupported(text: &str) -> ProcError {
    ProcError::UnsupportedType {
        annotation: text.to_owned(),
    }
}

/// Exact printed match first, then qualified name, then union aliases
/// compared member-wise.
fn simple_match(text: &str) -> Option<TypeDescriptor> {
    for class in CLASSES {
        let annotation = Annotation::Class(class);
        if text == annotation.printed() {
            return class_descriptor(class);
        }
    }
    for class in CLASSES {
        if text == class.qualified_name() {
            return class_descriptor(class);
        }
    }
    let inner = strip_generic(text, UNION_PREFIX)?;
    let mut args = split_args(inner).ok()?;
    args.sort_unstable();
    union_aliases().into_iter().find_map(|(alias, descriptor)| {
        let printed = alias.to_string();
        let alias_inner = strip_generic(&printed, UNION_PREFIX)?;
        let mut members = split_args(alias_inner).ok()?;
        members.sort_unstable();
        (members == args).then_some(descriptor)
    })
}

fn strip_generic<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    text.strip_prefix(prefix)?.strip_suffix(']')
}

/// Splits a comma-separated argument list at bracket depth zero.
fn split_args(text: &str) -> Result<Vec<&str>> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1).ok_or_else(|| unsupported(text))?;
            }
            ',' if depth == 0 => {
                args.push(text[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(unsupported(text));
    }
    args.push(text[start..].trim());
    if args.iter().any(|arg| arg.is_empty()) {
        return Err(unsupported(text));
    }
    Ok(args)
}
