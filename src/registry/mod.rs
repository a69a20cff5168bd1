//! Routine registration.
//!
//! [`ProcedureBuilder`] and [`TransformationBuilder`] take the place of
//! signature introspection: a call site names each parameter and result with
//! its type, hands over the body, and the builder rejects unsupported shapes
//! and undeclarable types before anything reaches the host. The built routine
//! registers an invocation adapter that wraps raw host values into proxies on
//! the way in and unwraps records on the way out.

use std::fmt;

use crate::error::{ProcError, Result};
use crate::typing::TypeDescriptor;
use crate::value::{FromValue, HostValue, Value};

mod output;
mod procedure;
mod transformation;

pub use output::{AsyncGenerator, Coroutine, Generator, RoutineOutput, RoutineShape};
pub use procedure::{Procedure, ProcedureBuilder};
pub use transformation::{Transformation, TransformationBuilder};

/// A declared parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamDescriptor {
    /// Parameter name.
    pub name: String,
    /// Accepted values.
    pub ty: TypeDescriptor,
    /// Default for optional parameters.
    pub default: Option<HostValue>,
}

/// A declared result field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultDescriptor {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: TypeDescriptor,
    /// Whether the field is flagged as deprecated.
    pub deprecated: bool,
}

/// Parameters and result fields of a routine, built once at registration.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutineDescriptor {
    /// Routine name.
    pub name: String,
    /// Parameters in declaration order.
    pub params: Vec<ParamDescriptor>,
    /// Result fields in declaration order.
    pub results: Vec<ResultDescriptor>,
}

impl fmt::Display for RoutineDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            match &param.default {
                Some(default) => write!(f, "{} = {} :: {}", param.name, default, param.ty)?,
                None => write!(f, "{} :: {}", param.name, param.ty)?,
            }
        }
        f.write_str(") :: (")?;
        for (idx, result) in self.results.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} :: {}", result.name, result.ty)?;
            if result.deprecated {
                f.write_str(" (deprecated)")?;
            }
        }
        f.write_str(")")
    }
}

/// Positional arguments of one invocation, addressable by parameter name.
#[derive(Clone, Debug)]
pub struct Args {
    names: std::rc::Rc<[String]>,
    values: Vec<Value>,
}

impl Args {
    pub(crate) fn new(names: std::rc::Rc<[String]>, values: Vec<Value>) -> Self {
        Self { names, values }
    }

    /// Converts the argument bound to `name`.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<T> {
        let index = self
            .names
            .iter()
            .position(|candidate| candidate == name)
            .ok_or_else(|| ProcError::InvalidArgument(format!("no parameter named '{name}'")))?;
        let value = self
            .values
            .get(index)
            .cloned()
            .ok_or_else(|| ProcError::InvalidArgument(format!("'{name}' was not bound")))?;
        T::from_value(value)
    }

    /// Argument at `index`.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// All arguments in declaration order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of bound arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` for routines without parameters.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the arguments.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_resolve_by_name() {
        let names: std::rc::Rc<[String]> = vec!["a".to_owned(), "b".to_owned()].into();
        let args = Args::new(names, vec![Value::from(1), Value::Null]);
        assert_eq!(args.get::<i64>("a").unwrap(), 1);
        assert_eq!(args.get::<Option<String>>("b").unwrap(), None);
        assert_eq!(args.get::<i64>("c").unwrap_err().code(), "InvalidArgumentError");
        assert_eq!(args.get::<String>("a").unwrap_err().code(), "ConversionError");
    }

    #[test]
    fn descriptor_renders_a_signature() {
        let descriptor = RoutineDescriptor {
            name: "example.procedure".into(),
            params: vec![
                ParamDescriptor {
                    name: "required_arg".into(),
                    ty: TypeDescriptor::Any,
                    default: None,
                },
                ParamDescriptor {
                    name: "optional_arg".into(),
                    ty: TypeDescriptor::nullable(TypeDescriptor::Any),
                    default: Some(HostValue::Null),
                },
            ],
            results: vec![ResultDescriptor {
                name: "result".into(),
                ty: TypeDescriptor::String,
                deprecated: true,
            }],
        };
        assert_eq!(
            descriptor.to_string(),
            "example.procedure(required_arg :: ANY, optional_arg = null :: ANY?) :: (result :: STRING (deprecated))"
        );
    }
}
