use std::rc::Rc;

use tracing::{debug, debug_span};

use super::procedure::check_shape;
use super::{RoutineOutput, RoutineShape};
use crate::error::{ProcError, Result, SignatureReason};
use crate::host::{GraphRef, HostModule, MessagesRef, TransAdapter};
use crate::proxy::{Messages, TransCtx};
use crate::value::Record;

type Body = Rc<dyn Fn(TransCtx, Messages) -> Result<Vec<Record>>>;

/// Declares a stream transformation.
///
/// Transformations take no typed arguments: the body always receives the
/// batch of messages, optionally preceded by the context.
pub struct TransformationBuilder {
    name: String,
    body: Option<(RoutineShape, Body)>,
}

impl TransformationBuilder {
    /// Starts a transformation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: None,
        }
    }

    /// Sets a body that receives the context and the batch.
    pub fn body<F, R>(mut self, body: F) -> Self
    where
        F: Fn(TransCtx, Messages) -> R + 'static,
        R: RoutineOutput,
    {
        let body: Body = Rc::new(move |ctx, messages| body(ctx, messages).into_records());
        self.body = Some((R::SHAPE, body));
        self
    }

    /// Sets a body that only receives the batch.
    pub fn body_without_context<F, R>(self, body: F) -> Self
    where
        F: Fn(Messages) -> R + 'static,
        R: RoutineOutput,
    {
        self.body(move |_ctx: TransCtx, messages| body(messages))
    }

    /// Validates the routine shape.
    pub fn build(self) -> Result<Transformation> {
        let Some((shape, body)) = self.body else {
            return Err(ProcError::signature(self.name, SignatureReason::MissingBody));
        };
        check_shape(&self.name, shape)?;
        Ok(Transformation {
            name: self.name,
            body,
        })
    }
}

/// A validated transformation, ready to be registered.
pub struct Transformation {
    name: String,
    body: Body,
}

impl Transformation {
    /// Transformation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers the transformation with `module`.
    pub fn register(self, module: &mut dyn HostModule) -> Result<()> {
        let Transformation { name, body } = self;
        let span_name = name.clone();
        let adapter: TransAdapter = Rc::new(move |graph: GraphRef, messages: MessagesRef| {
            let span = debug_span!("transformation", name = %span_name);
            let _guard = span.enter();
            let records = body(TransCtx::new(graph), Messages::new(messages))?;
            records.into_iter().map(Record::into_host).collect()
        });
        module.add_transformation(&name, adapter)?;
        debug!(transformation = %name, "registered transformation");
        Ok(())
    }
}

impl std::fmt::Debug for Transformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformation")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Coroutine;

    #[test]
    fn coroutine_transformation_is_rejected() {
        let err = TransformationBuilder::new("later")
            .body_without_context(|_messages| Coroutine::<Record>(Box::pin(async { Record::new() })))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ProcError::Signature {
                reason: SignatureReason::Coroutine,
                ..
            }
        ));
    }

    #[test]
    fn plain_transformation_builds() {
        let transformation = TransformationBuilder::new("noop")
            .body(|_ctx, _messages| Vec::<Record>::new())
            .build()
            .unwrap();
        assert_eq!(transformation.name(), "noop");
        assert_eq!(format!("{transformation:?}"), "Transformation { name: \"noop\", .. }");
    }
}
