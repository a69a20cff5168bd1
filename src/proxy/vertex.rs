use std::fmt;

use super::{ensure_valid, Edge, GraphRef, Properties, ScopedIter};
use crate::error::{ElementKind, Result};
use crate::types::{EdgeId, ElementRef, Label, VertexId};

/// A vertex of the graph, valid for the invocation that produced it.
///
/// Proxies do not implement `PartialEq` or `Hash`, since comparing them must
/// fail once the scope ends. Compare with [`Vertex::try_eq`] and key maps or
/// sets on [`Vertex::id`].
#[derive(Clone)]
pub struct Vertex {
    graph: GraphRef,
    id: VertexId,
}

/// Lazy iterator over incident edges.
pub type EdgeIter = ScopedIter<EdgeId, Edge>;

impl Vertex {
    pub(crate) fn new(graph: GraphRef, id: VertexId) -> Self {
        Self { graph, id }
    }

    pub(crate) fn graph_ref(&self) -> GraphRef {
        self.graph.clone()
    }

    fn check(&self) -> Result<()> {
        ensure_valid(&self.graph, ElementKind::Vertex)
    }

    /// Returns `true` while the invocation scope is open.
    pub fn is_valid(&self) -> bool {
        self.graph.is_valid()
    }

    /// Host id of the vertex, stable only within the current scope.
    pub fn id(&self) -> Result<VertexId> {
        self.check()?;
        Ok(self.id)
    }

    /// Returns `true` if the graph behind this vertex can be modified.
    pub fn underlying_graph_is_mutable(&self) -> Result<bool> {
        self.check()?;
        Ok(self.graph.is_mutable())
    }

    /// Labels in host order.
    pub fn labels(&self) -> Result<Vec<Label>> {
        self.check()?;
        let count = self.graph.labels_count(self.id)?;
        let mut labels = Vec::with_capacity(count);
        for index in 0..count {
            labels.push(self.graph.label_at(self.id, index)?);
        }
        Ok(labels)
    }

    /// Returns `true` if the vertex carries `name`.
    pub fn has_label(&self, name: &str) -> Result<bool> {
        Ok(self.labels()?.iter().any(|label| label == name))
    }

    /// Adds a label.
    pub fn add_label(&self, name: &str) -> Result<()> {
        self.check()?;
        self.graph.add_label(self.id, &Label::new(name))?;
        Ok(())
    }

    /// Removes a label.
    pub fn remove_label(&self, name: &str) -> Result<()> {
        self.check()?;
        self.graph.remove_label(self.id, &Label::new(name))?;
        Ok(())
    }

    /// Property map of the vertex.
    pub fn properties(&self) -> Result<Properties> {
        self.check()?;
        Ok(Properties::new(
            self.graph.clone(),
            ElementRef::Vertex(self.id),
        ))
    }

    /// Edges pointing at this vertex.
    pub fn in_edges(&self) -> Result<EdgeIter> {
        self.check()?;
        let cursor = self.graph.iter_in_edges(self.id)?;
        Ok(self.edge_iter(cursor))
    }

    /// Edges leaving this vertex.
    pub fn out_edges(&self) -> Result<EdgeIter> {
        self.check()?;
        let cursor = self.graph.iter_out_edges(self.id)?;
        Ok(self.edge_iter(cursor))
    }

    fn edge_iter(&self, cursor: crate::host::HostCursor<EdgeId>) -> EdgeIter {
        ScopedIter::new(
            self.graph.clone(),
            ElementKind::Vertex,
            Some(ElementRef::Vertex(self.id)),
            cursor,
            |graph, id| Edge::new(graph.clone(), id),
        )
    }

    /// Identity comparison. Fails if either side is out of scope.
    pub fn try_eq(&self, other: &Vertex) -> Result<bool> {
        Ok(self.id()? == other.id()?)
    }
}

impl fmt::Debug for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Vertex").field(&self.id.0).finish()
    }
}
