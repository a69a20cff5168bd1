use std::future::Future;
use std::pin::Pin;

use crate::error::{ProcError, Result};
use crate::value::Record;

/// Execution shape of a routine, derived from its return type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoutineShape {
    /// Runs to completion and returns its records.
    Plain,
    /// Returns a future.
    Coroutine,
    /// Returns an asynchronous stream of records.
    AsyncGenerator,
    /// Returns a lazy iterator of records.
    Generator,
}

/// Return types a routine body may have.
///
/// Only [`RoutineShape::Plain`] outputs are invocable; the other shapes exist
/// so the builders can name and reject them before registration.
pub trait RoutineOutput: 'static {
    /// Shape of routines returning this type.
    const SHAPE: RoutineShape;

    /// Collects the produced records.
    fn into_records(self) -> Result<Vec<Record>>;
}

impl RoutineOutput for () {
    const SHAPE: RoutineShape = RoutineShape::Plain;

    fn into_records(self) -> Result<Vec<Record>> {
        Ok(Vec::new())
    }
}

impl RoutineOutput for Record {
    const SHAPE: RoutineShape = RoutineShape::Plain;

    fn into_records(self) -> Result<Vec<Record>> {
        Ok(vec![self])
    }
}

impl RoutineOutput for Vec<Record> {
    const SHAPE: RoutineShape = RoutineShape::Plain;

    fn into_records(self) -> Result<Vec<Record>> {
        Ok(self)
    }
}

impl RoutineOutput for Option<Record> {
    const SHAPE: RoutineShape = RoutineShape::Plain;

    fn into_records(self) -> Result<Vec<Record>> {
        Ok(self.into_iter().collect())
    }
}

impl<T: RoutineOutput> RoutineOutput for Result<T> {
    const SHAPE: RoutineShape = T::SHAPE;

    fn into_records(self) -> Result<Vec<Record>> {
        self?.into_records()
    }
}

/// A routine result produced asynchronously.
pub struct Coroutine<T>(pub Pin<Box<dyn Future<Output = T>>>);

impl<T: 'static> RoutineOutput for Coroutine<T> {
    const SHAPE: RoutineShape = RoutineShape::Coroutine;

    fn into_records(self) -> Result<Vec<Record>> {
        Err(not_invocable(Self::SHAPE))
    }
}

/// Records pulled one at a time from asynchronous steps.
pub struct AsyncGenerator(pub Box<dyn FnMut() -> Pin<Box<dyn Future<Output = Option<Record>>>>>);

impl RoutineOutput for AsyncGenerator {
    const SHAPE: RoutineShape = RoutineShape::AsyncGenerator;

    fn into_records(self) -> Result<Vec<Record>> {
        Err(not_invocable(Self::SHAPE))
    }
}

/// Records produced lazily by an iterator.
pub struct Generator(pub Box<dyn Iterator<Item = Record>>);

impl RoutineOutput for Generator {
    const SHAPE: RoutineShape = RoutineShape::Generator;

    fn into_records(self) -> Result<Vec<Record>> {
        Err(not_invocable(Self::SHAPE))
    }
}

fn not_invocable(shape: RoutineShape) -> ProcError {
    ProcError::Logic(format!("{shape:?} routines cannot be invoked"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_wrapping_keeps_the_inner_shape() {
        assert_eq!(<Result<Vec<Record>>>::SHAPE, RoutineShape::Plain);
        assert_eq!(<Result<Generator>>::SHAPE, RoutineShape::Generator);
        assert_eq!(<Coroutine<Record>>::SHAPE, RoutineShape::Coroutine);
    }

    #[test]
    fn plain_outputs_collect_records() {
        assert!(().into_records().unwrap().is_empty());
        assert_eq!(Some(Record::new()).into_records().unwrap().len(), 1);
        let failed: Result<Record> = Err(ProcError::Abort);
        assert!(matches!(failed.into_records(), Err(ProcError::Abort)));
    }
}
