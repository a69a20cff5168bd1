use std::cell::Cell;

use super::{ensure_valid, GraphRef, ScopedIter};
use crate::error::{ElementKind, ProcError, Result};
use crate::types::ElementRef;
use crate::value::{HostValue, Value};

/// Property map of a vertex or edge.
///
/// Enumeration copies the property set at call time; later writes are not
/// reflected in an iterator already handed out.
pub struct Properties {
    graph: GraphRef,
    owner: ElementRef,
    len: Cell<Option<usize>>,
}

/// Lazy iterator over `(name, value)` pairs.
pub type PropertyIter = ScopedIter<(String, HostValue), (String, Value)>;

impl Properties {
    pub(crate) fn new(graph: GraphRef, owner: ElementRef) -> Self {
        Self {
            graph,
            owner,
            len: Cell::new(None),
        }
    }

    fn check(&self) -> Result<()> {
        ensure_valid(&self.graph, ElementKind::Properties)?;
        if self.graph.contains_element(self.owner) {
            Ok(())
        } else {
            Err(ProcError::deleted(ElementKind::Properties))
        }
    }

    /// Returns `true` while the invocation scope is open.
    pub fn is_valid(&self) -> bool {
        self.graph.is_valid()
    }

    /// Value of `name`, or [`Value::Null`] when absent.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.check()?;
        let value = self.graph.get_property(self.owner, name)?;
        Ok(Value::from_host(&self.graph, value))
    }

    /// Value of `name`, or `default` when absent.
    pub fn get_or(&self, name: &str, default: impl Into<Value>) -> Result<Value> {
        let value = self.get(name)?;
        Ok(if value.is_null() { default.into() } else { value })
    }

    /// Stores `value` under `name`; [`Value::Null`] removes the key.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.check()?;
        let value = value.into().into_host()?;
        self.graph.set_property(self.owner, name, value)?;
        self.len.set(None);
        Ok(())
    }

    /// Returns `true` if `name` is present.
    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(!self.get(name)?.is_null())
    }

    /// Number of properties, counted once per proxy.
    pub fn len(&self) -> Result<usize> {
        self.check()?;
        if let Some(len) = self.len.get() {
            return Ok(len);
        }
        let mut count = 0;
        for item in self.items()? {
            item?;
            count += 1;
        }
        self.len.set(Some(count));
        Ok(count)
    }

    /// Returns `true` when the element has no properties.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Snapshot of all `(name, value)` pairs.
    pub fn items(&self) -> Result<PropertyIter> {
        self.check()?;
        let cursor = self.graph.iter_properties(self.owner)?;
        Ok(ScopedIter::new(
            self.graph.clone(),
            ElementKind::Properties,
            Some(self.owner),
            cursor,
            |graph, (name, value)| (name, Value::from_host(graph, value)),
        ))
    }

    /// Snapshot of property names.
    pub fn keys(&self) -> Result<impl Iterator<Item = Result<String>>> {
        Ok(self.items()?.map(|item| item.map(|(name, _)| name)))
    }

    /// Snapshot of property values.
    pub fn values(&self) -> Result<impl Iterator<Item = Result<Value>>> {
        Ok(self.items()?.map(|item| item.map(|(_, value)| value)))
    }
}
