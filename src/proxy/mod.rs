//! Scope-checked views over host handles.
//!
//! A proxy is a cheap reference: cloning one clones an `Rc` to the host
//! handle, never host data. Every public accessor first checks that the
//! owning scope is still open and fails with a scope error otherwise. Proxies
//! are neither `Send` nor `Sync`; they belong to the invocation that
//! produced them.

use std::marker::PhantomData;

use crate::error::{ElementKind, ProcError, Result};
use crate::host::{HostCursor, HostIter};
use crate::types::ElementRef;

mod context;
mod edge;
mod graph;
mod message;
mod path;
mod properties;
mod vertex;

pub use crate::host::GraphRef;
pub use context::{ProcCtx, TransCtx};
pub use edge::Edge;
pub use graph::{Graph, Vertices};
pub use message::{Message, MessageIter, Messages};
pub use path::Path;
pub use properties::Properties;
pub use vertex::Vertex;

pub(crate) fn ensure_valid(graph: &GraphRef, element: ElementKind) -> Result<()> {
    if graph.is_valid() {
        Ok(())
    } else {
        Err(ProcError::stale(element))
    }
}

/// Lazy iterator over a host cursor.
///
/// Each step re-checks the scope (and, for owned sequences such as edges or
/// properties, that the owner still exists) before pulling the next item. The
/// first error ends the iteration.
pub struct ScopedIter<H, T> {
    graph: GraphRef,
    element: ElementKind,
    owner: Option<ElementRef>,
    cursor: Option<HostCursor<H>>,
    wrap: fn(&GraphRef, H) -> T,
    _marker: PhantomData<fn() -> T>,
}

impl<H, T> ScopedIter<H, T> {
    pub(crate) fn new(
        graph: GraphRef,
        element: ElementKind,
        owner: Option<ElementRef>,
        cursor: HostCursor<H>,
        wrap: fn(&GraphRef, H) -> T,
    ) -> Self {
        Self {
            graph,
            element,
            owner,
            cursor: Some(cursor),
            wrap,
            _marker: PhantomData,
        }
    }

    fn check_owner(&self) -> Result<()> {
        ensure_valid(&self.graph, self.element)?;
        match self.owner {
            Some(owner) if !self.graph.contains_element(owner) => {
                Err(ProcError::deleted(self.element))
            }
            _ => Ok(()),
        }
    }
}

impl<H, T> Iterator for ScopedIter<H, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.as_ref()?;
        if let Err(err) = self.check_owner() {
            self.cursor = None;
            return Some(Err(err));
        }
        let cursor = self.cursor.as_mut()?;
        match cursor.next() {
            Ok(Some(item)) => Some(Ok((self.wrap)(&self.graph, item))),
            Ok(None) => {
                self.cursor = None;
                None
            }
            Err(err) => {
                self.cursor = None;
                Some(Err(err.into()))
            }
        }
    }
}

impl<H, T> std::iter::FusedIterator for ScopedIter<H, T> {}
