use std::cell::Cell;
use std::fmt;

use super::{ensure_valid, Edge, GraphRef, ScopedIter, Vertex};
use crate::error::{ElementKind, ProcError, Result};
use crate::host::HostErrorCode;
use crate::types::{EdgeType, VertexId};

/// State of the graph for the duration of one invocation.
#[derive(Clone)]
pub struct Graph {
    graph: GraphRef,
}

impl Graph {
    /// Wraps a native graph handle.
    pub fn new(graph: GraphRef) -> Self {
        Self { graph }
    }

    fn check(&self) -> Result<()> {
        ensure_valid(&self.graph, ElementKind::Graph)
    }

    /// Returns `true` while the invocation scope is open.
    pub fn is_valid(&self) -> bool {
        self.graph.is_valid()
    }

    /// Returns `true` if the graph can be modified.
    pub fn is_mutable(&self) -> Result<bool> {
        self.check()?;
        Ok(self.graph.is_mutable())
    }

    /// Returns `true` once the host asked the routine to stop.
    pub fn must_abort(&self) -> Result<bool> {
        self.check()?;
        Ok(self.graph.must_abort())
    }

    /// Looks up a vertex; unknown ids fail with a range error.
    pub fn get_vertex_by_id(&self, id: VertexId) -> Result<Vertex> {
        self.check()?;
        let id = self.graph.vertex_by_id(id)?;
        Ok(Vertex::new(self.graph.clone(), id))
    }

    /// Looks up a vertex, returning `None` for unknown ids.
    pub fn find_vertex(&self, id: VertexId) -> Result<Option<Vertex>> {
        match self.get_vertex_by_id(id) {
            Ok(vertex) => Ok(Some(vertex)),
            Err(ProcError::Range(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// All vertices of the graph.
    pub fn vertices(&self) -> Result<Vertices> {
        self.check()?;
        Ok(Vertices {
            graph: self.graph.clone(),
            len: Cell::new(None),
        })
    }

    /// Creates a vertex with no labels or properties.
    pub fn create_vertex(&self) -> Result<Vertex> {
        self.check()?;
        let id = self.graph.create_vertex()?;
        Ok(Vertex::new(self.graph.clone(), id))
    }

    /// Removes a vertex that has no incident edges.
    pub fn delete_vertex(&self, vertex: &Vertex) -> Result<()> {
        self.check()?;
        self.graph.delete_vertex(vertex.id()?)?;
        Ok(())
    }

    /// Removes a vertex together with every incident edge.
    pub fn detach_delete_vertex(&self, vertex: &Vertex) -> Result<()> {
        self.check()?;
        self.graph.detach_delete_vertex(vertex.id()?)?;
        Ok(())
    }

    /// Creates a directed edge of type `edge_type`.
    pub fn create_edge(
        &self,
        from: &Vertex,
        to: &Vertex,
        edge_type: impl Into<EdgeType>,
    ) -> Result<Edge> {
        self.check()?;
        let edge_type = edge_type.into();
        let id = self.graph.create_edge(from.id()?, to.id()?, &edge_type)?;
        Ok(Edge::new(self.graph.clone(), id))
    }

    /// Removes an edge.
    pub fn delete_edge(&self, edge: &Edge) -> Result<()> {
        self.check()?;
        self.graph.delete_edge(edge.id()?)?;
        Ok(())
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("valid", &self.graph.is_valid())
            .finish()
    }
}

/// All vertices of a graph.
///
/// Each call to [`Vertices::iter`] starts a fresh pass over a snapshot of the
/// vertex set. The length is counted once and then cached.
pub struct Vertices {
    graph: GraphRef,
    len: Cell<Option<usize>>,
}

/// Lazy iterator over vertices.
pub type VertexIter = ScopedIter<VertexId, Vertex>;

impl Vertices {
    /// Returns `true` while the invocation scope is open.
    pub fn is_valid(&self) -> bool {
        self.graph.is_valid()
    }

    /// Starts a new pass over the vertices.
    pub fn iter(&self) -> Result<VertexIter> {
        ensure_valid(&self.graph, ElementKind::Graph)?;
        let cursor = self.graph.iter_vertices()?;
        Ok(ScopedIter::new(
            self.graph.clone(),
            ElementKind::Graph,
            None,
            cursor,
            |graph, id| Vertex::new(graph.clone(), id),
        ))
    }

    /// Number of vertices when first asked.
    pub fn len(&self) -> Result<usize> {
        ensure_valid(&self.graph, ElementKind::Graph)?;
        if let Some(len) = self.len.get() {
            return Ok(len);
        }
        let mut count = 0;
        for vertex in self.iter()? {
            vertex?;
            count += 1;
        }
        self.len.set(Some(count));
        Ok(count)
    }

    /// Returns `true` if the graph has no vertices.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns `true` if `vertex` is part of the current vertex set.
    pub fn contains(&self, vertex: &Vertex) -> Result<bool> {
        let id = vertex.id()?;
        ensure_valid(&self.graph, ElementKind::Graph)?;
        match self.graph.vertex_by_id(id) {
            Ok(_) => Ok(true),
            Err(err) if err.code == HostErrorCode::OutOfRange => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
