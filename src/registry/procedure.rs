use std::rc::Rc;

use tracing::{debug, debug_span};

use super::{Args, ParamDescriptor, ResultDescriptor, RoutineDescriptor, RoutineOutput, RoutineShape};
use crate::error::{ProcError, Result, SignatureReason};
use crate::host::{GraphRef, HostModule, ProcAdapter};
use crate::proxy::ProcCtx;
use crate::typing::{bridge, Annotation, CypherType};
use crate::value::{HostValue, Record, Value};

type Body = Rc<dyn Fn(ProcCtx, Args) -> Result<Vec<Record>>>;

struct ParamSpec {
    name: String,
    annotation: Annotation,
    default: Option<Value>,
}

struct ResultSpec {
    name: String,
    annotation: Annotation,
    deprecated: bool,
}

/// Declares a read or write procedure.
///
/// ```
/// use sombra_procs::registry::ProcedureBuilder;
/// use sombra_procs::value::Record;
/// use sombra_procs::Result;
///
/// let procedure = ProcedureBuilder::read("answer")
///     .arg::<i64>("offset")
///     .result::<i64>("value")
///     .body(|_ctx, args| -> Result<Record> {
///         Ok(Record::new().with("value", 42 + args.get::<i64>("offset")?))
///     })
///     .build()
///     .unwrap();
/// assert_eq!(procedure.descriptor().params.len(), 1);
/// ```
pub struct ProcedureBuilder {
    name: String,
    write: bool,
    params: Vec<ParamSpec>,
    results: Vec<ResultSpec>,
    body: Option<(RoutineShape, Body)>,
}

impl ProcedureBuilder {
    /// Starts a procedure that only reads the graph.
    pub fn read(name: impl Into<String>) -> Self {
        Self::new(name.into(), false)
    }

    /// Starts a procedure that may mutate the graph.
    pub fn write(name: impl Into<String>) -> Self {
        Self::new(name.into(), true)
    }

    fn new(name: String, write: bool) -> Self {
        Self {
            name,
            write,
            params: Vec::new(),
            results: Vec::new(),
            body: None,
        }
    }

    /// Appends a required parameter of type `T`.
    pub fn arg<T: CypherType>(self, name: impl Into<String>) -> Self {
        self.arg_with(name, T::annotation())
    }

    /// Appends a required parameter with an explicit annotation.
    pub fn arg_with(mut self, name: impl Into<String>, annotation: Annotation) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            annotation,
            default: None,
        });
        self
    }

    /// Appends an optional parameter of type `T`.
    pub fn opt_arg<T: CypherType>(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.opt_arg_with(name, T::annotation(), default)
    }

    /// Appends an optional parameter with an explicit annotation.
    pub fn opt_arg_with(
        mut self,
        name: impl Into<String>,
        annotation: Annotation,
        default: impl Into<Value>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            annotation,
            default: Some(default.into()),
        });
        self
    }

    /// Appends a result field of type `T`.
    pub fn result<T: CypherType>(self, name: impl Into<String>) -> Self {
        self.result_with(name, T::annotation(), false)
    }

    /// Appends a deprecated result field of type `T`.
    pub fn deprecated_result<T: CypherType>(self, name: impl Into<String>) -> Self {
        self.result_with(name, T::annotation(), true)
    }

    /// Appends a result field with an explicit annotation.
    pub fn result_with(
        mut self,
        name: impl Into<String>,
        annotation: Annotation,
        deprecated: bool,
    ) -> Self {
        self.results.push(ResultSpec {
            name: name.into(),
            annotation,
            deprecated,
        });
        self
    }

    /// Sets a body that receives the invocation context.
    pub fn body<F, R>(mut self, body: F) -> Self
    where
        F: Fn(ProcCtx, Args) -> R + 'static,
        R: RoutineOutput,
    {
        let body: Body = Rc::new(move |ctx, args| body(ctx, args).into_records());
        self.body = Some((R::SHAPE, body));
        self
    }

    /// Sets a body that only receives the arguments.
    pub fn body_without_context<F, R>(self, body: F) -> Self
    where
        F: Fn(Args) -> R + 'static,
        R: RoutineOutput,
    {
        self.body(move |_ctx: ProcCtx, args| body(args))
    }

    /// Validates the declaration and derives every type descriptor.
    pub fn build(self) -> Result<Procedure> {
        let Some((shape, body)) = self.body else {
            return Err(ProcError::signature(self.name, SignatureReason::MissingBody));
        };
        check_shape(&self.name, shape)?;

        let mut params: Vec<ParamDescriptor> = Vec::with_capacity(self.params.len());
        let mut seen_optional = false;
        for spec in self.params {
            if params.iter().any(|param| param.name == spec.name) {
                return Err(ProcError::signature(
                    self.name,
                    SignatureReason::DuplicateParameter(spec.name),
                ));
            }
            if spec.default.is_none() && seen_optional {
                return Err(ProcError::signature(
                    self.name,
                    SignatureReason::RequiredAfterOptional(spec.name),
                ));
            }
            seen_optional |= spec.default.is_some();
            let ty = bridge(&spec.annotation)?;
            let default = spec.default.map(Value::into_host).transpose()?;
            if let Some(default) = &default {
                if !ty.accepts(default) {
                    return Err(ProcError::Conversion(format!(
                        "default {default} of '{}' is not a {ty}",
                        spec.name
                    )));
                }
            }
            params.push(ParamDescriptor {
                name: spec.name,
                ty,
                default,
            });
        }

        let mut results: Vec<ResultDescriptor> = Vec::with_capacity(self.results.len());
        for spec in self.results {
            if results.iter().any(|result| result.name == spec.name) {
                return Err(ProcError::signature(
                    self.name,
                    SignatureReason::DuplicateResult(spec.name),
                ));
            }
            results.push(ResultDescriptor {
                ty: bridge(&spec.annotation)?,
                name: spec.name,
                deprecated: spec.deprecated,
            });
        }

        Ok(Procedure {
            descriptor: RoutineDescriptor {
                name: self.name,
                params,
                results,
            },
            write: self.write,
            body,
        })
    }
}

pub(super) fn check_shape(name: &str, shape: RoutineShape) -> Result<()> {
    let reason = match shape {
        RoutineShape::Plain => return Ok(()),
        RoutineShape::Coroutine => SignatureReason::Coroutine,
        RoutineShape::AsyncGenerator => SignatureReason::AsyncGenerator,
        RoutineShape::Generator => SignatureReason::Generator,
    };
    Err(ProcError::signature(name, reason))
}

/// A validated procedure, ready to be registered.
pub struct Procedure {
    descriptor: RoutineDescriptor,
    write: bool,
    body: Body,
}

impl Procedure {
    /// Declared parameters and result fields.
    pub fn descriptor(&self) -> &RoutineDescriptor {
        &self.descriptor
    }

    /// Returns `true` for write procedures.
    pub fn is_write(&self) -> bool {
        self.write
    }

    /// Registers the procedure and its signature with `module`.
    pub fn register(self, module: &mut dyn HostModule) -> Result<()> {
        let Procedure {
            descriptor,
            write,
            body,
        } = self;
        let adapter = adapter(descriptor.name.clone(), &descriptor.params, body);
        let handle = if write {
            module.add_write_procedure(&descriptor.name, adapter)?
        } else {
            module.add_read_procedure(&descriptor.name, adapter)?
        };
        for param in &descriptor.params {
            match &param.default {
                Some(default) => {
                    module.add_opt_argument(handle, &param.name, &param.ty, default.clone())?
                }
                None => module.add_argument(handle, &param.name, &param.ty)?,
            }
        }
        for result in &descriptor.results {
            if result.deprecated {
                module.add_deprecated_result(handle, &result.name, &result.ty)?;
            } else {
                module.add_result(handle, &result.name, &result.ty)?;
            }
        }
        debug!(
            procedure = %descriptor.name,
            arity = descriptor.params.len(),
            results = descriptor.results.len(),
            write,
            "registered procedure"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Procedure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Procedure")
            .field("descriptor", &self.descriptor)
            .field("write", &self.write)
            .finish_non_exhaustive()
    }
}

fn adapter(name: String, params: &[ParamDescriptor], body: Body) -> ProcAdapter {
    let names: Rc<[String]> = params.iter().map(|param| param.name.clone()).collect();
    Rc::new(move |graph: GraphRef, raw: Vec<HostValue>| {
        let span = debug_span!("procedure", name = %name);
        let _guard = span.enter();
        let values = raw
            .into_iter()
            .map(|value| Value::from_host(&graph, value))
            .collect();
        let ctx = ProcCtx::new(graph);
        let records = body(ctx, Args::new(names.clone(), values))?;
        records.into_iter().map(Record::into_host).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Generator;
    use crate::typing::Any;

    fn noop() -> ProcedureBuilder {
        ProcedureBuilder::read("noop").body(|_ctx, _args| ())
    }

    #[test]
    fn debug_output_names_the_procedure() {
        let procedure = noop().build().unwrap();
        let rendered = format!("{procedure:?}");
        assert!(rendered.contains("noop"), "{rendered}");
        assert!(rendered.contains("write: false"), "{rendered}");
    }

    #[test]
    fn missing_body_is_a_signature_error() {
        let err = ProcedureBuilder::read("empty").build().unwrap_err();
        assert!(matches!(
            err,
            ProcError::Signature {
                reason: SignatureReason::MissingBody,
                ..
            }
        ));
    }

    #[test]
    fn generator_body_is_rejected_at_build() {
        let err = ProcedureBuilder::read("lazy")
            .body(|_ctx, _args| Generator(Box::new(std::iter::empty())))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("not yet supported"));
    }

    #[test]
    fn duplicate_and_misordered_parameters_are_rejected() {
        let duplicate = noop().arg::<i64>("x").arg::<String>("x").build();
        assert!(matches!(
            duplicate,
            Err(ProcError::Signature {
                reason: SignatureReason::DuplicateParameter(_),
                ..
            })
        ));
        let misordered = noop()
            .opt_arg::<i64>("a", 1)
            .arg::<i64>("b")
            .build();
        assert!(matches!(
            misordered,
            Err(ProcError::Signature {
                reason: SignatureReason::RequiredAfterOptional(_),
                ..
            })
        ));
        let results = noop().result::<i64>("r").result::<i64>("r").build();
        assert!(matches!(
            results,
            Err(ProcError::Signature {
                reason: SignatureReason::DuplicateResult(_),
                ..
            })
        ));
    }

    #[test]
    fn defaults_must_match_their_type() {
        let err = noop().opt_arg::<i64>("n", "three").build().unwrap_err();
        assert_eq!(err.code(), "ConversionError");
        let ok = noop().opt_arg::<Option<Any>>("n", Value::Null).build();
        assert!(ok.is_ok());
    }

    #[test]
    fn descriptors_follow_declaration_order() {
        let procedure = noop()
            .arg::<Any>("first")
            .opt_arg::<Option<Vec<i64>>>("second", Value::Null)
            .deprecated_result::<String>("old")
            .build()
            .unwrap();
        let descriptor = procedure.descriptor();
        assert_eq!(descriptor.params[0].name, "first");
        assert_eq!(
            descriptor.params[1].ty.to_string(),
            "LIST OF INTEGER?"
        );
        assert!(descriptor.results[0].deprecated);
    }
}
