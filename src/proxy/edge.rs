use std::fmt;

use super::{ensure_valid, GraphRef, Properties, Vertex};
use crate::error::{ElementKind, Result};
use crate::types::{EdgeId, EdgeType, ElementRef};

/// A directed edge, valid for the invocation that produced it.
///
/// Like [`Vertex`], an edge is compared with [`Edge::try_eq`] and hashed
/// through [`Edge::id`].
#[derive(Clone)]
pub struct Edge {
    graph: GraphRef,
    id: EdgeId,
}

impl Edge {
    pub(crate) fn new(graph: GraphRef, id: EdgeId) -> Self {
        Self { graph, id }
    }

    fn check(&self) -> Result<()> {
        ensure_valid(&self.graph, ElementKind::Edge)
    }

    /// Returns `true` while the invocation scope is open.
    pub fn is_valid(&self) -> bool {
        self.graph.is_valid()
    }

    /// Host id of the edge.
    pub fn id(&self) -> Result<EdgeId> {
        self.check()?;
        Ok(self.id)
    }

    /// Returns `true` if the graph behind this edge can be modified.
    pub fn underlying_graph_is_mutable(&self) -> Result<bool> {
        self.check()?;
        Ok(self.graph.is_mutable())
    }

    /// Type tag fixed at creation.
    pub fn edge_type(&self) -> Result<EdgeType> {
        self.check()?;
        Ok(self.graph.edge_type(self.id)?)
    }

    /// Source vertex.
    pub fn from_vertex(&self) -> Result<Vertex> {
        self.check()?;
        let id = self.graph.edge_from(self.id)?;
        Ok(Vertex::new(self.graph.clone(), id))
    }

    /// Destination vertex.
    pub fn to_vertex(&self) -> Result<Vertex> {
        self.check()?;
        let id = self.graph.edge_to(self.id)?;
        Ok(Vertex::new(self.graph.clone(), id))
    }

    /// Property map of the edge.
    pub fn properties(&self) -> Result<Properties> {
        self.check()?;
        Ok(Properties::new(self.graph.clone(), ElementRef::Edge(self.id)))
    }

    /// Identity comparison. Fails if either side is out of scope.
    pub fn try_eq(&self, other: &Edge) -> Result<bool> {
        Ok(self.id()? == other.id()?)
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Edge").field(&self.id.0).finish()
    }
}
