use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{ensure_valid, Edge, GraphRef, Vertex};
use crate::error::{ElementKind, ProcError, Result};
use crate::types::{EdgeId, PathId, VertexId};

/// Alternating vertex/edge sequence built edge by edge.
///
/// Clones share the host path and its cached snapshots; use
/// [`Path::duplicate`] for an independent copy.
#[derive(Clone)]
pub struct Path {
    graph: GraphRef,
    id: PathId,
    cache: Rc<RefCell<PathCache>>,
}

#[derive(Default)]
struct PathCache {
    vertices: Option<Vec<VertexId>>,
    edges: Option<Vec<EdgeId>>,
}

impl Path {
    pub(crate) fn from_handle(graph: GraphRef, id: PathId) -> Self {
        Self {
            graph,
            id,
            cache: Rc::default(),
        }
    }

    fn check(&self) -> Result<()> {
        ensure_valid(&self.graph, ElementKind::Path)
    }

    /// Starts a path of length zero at `start`.
    pub fn make_with_start(start: &Vertex) -> Result<Path> {
        let id = start.id()?;
        let graph = start.graph_ref();
        let handle = graph.path_make_with_start(id)?;
        Ok(Path::from_handle(graph, handle))
    }

    /// Returns `true` while the invocation scope is open.
    pub fn is_valid(&self) -> bool {
        self.graph.is_valid()
    }

    pub(crate) fn handle(&self) -> Result<PathId> {
        self.check()?;
        Ok(self.id)
    }

    /// Appends `edge`, which must touch the current last vertex.
    pub fn expand(&self, edge: &Edge) -> Result<()> {
        self.check()?;
        self.graph.path_expand(self.id, edge.id()?)?;
        *self.cache.borrow_mut() = PathCache::default();
        Ok(())
    }

    /// Number of edges.
    pub fn len(&self) -> Result<usize> {
        self.check()?;
        Ok(self.graph.path_size(self.id)?)
    }

    /// Returns `true` for a path holding only its start vertex.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Vertices in order; always one more than [`Path::edges`].
    pub fn vertices(&self) -> Result<Vec<Vertex>> {
        self.check()?;
        let ids = self.vertex_ids()?;
        Ok(ids
            .into_iter()
            .map(|id| Vertex::new(self.graph.clone(), id))
            .collect())
    }

    /// Edges in order.
    pub fn edges(&self) -> Result<Vec<Edge>> {
        self.check()?;
        let ids = self.edge_ids()?;
        Ok(ids
            .into_iter()
            .map(|id| Edge::new(self.graph.clone(), id))
            .collect())
    }

    /// Builds an independent host path with the same vertices and edges.
    pub fn duplicate(&self) -> Result<Path> {
        self.check()?;
        let vertices = self.vertex_ids()?;
        let start = *vertices
            .first()
            .ok_or_else(|| ProcError::Logic("path has no start vertex".into()))?;
        let copy = self.graph.path_make_with_start(start)?;
        for edge in self.edge_ids()? {
            self.graph.path_expand(copy, edge)?;
        }
        Ok(Path::from_handle(self.graph.clone(), copy))
    }

    fn vertex_ids(&self) -> Result<Vec<VertexId>> {
        if let Some(ids) = &self.cache.borrow().vertices {
            return Ok(ids.clone());
        }
        let size = self.graph.path_size(self.id)?;
        let ids = (0..=size)
            .map(|index| self.graph.path_vertex_at(self.id, index))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.cache.borrow_mut().vertices = Some(ids.clone());
        Ok(ids)
    }

    fn edge_ids(&self) -> Result<Vec<EdgeId>> {
        if let Some(ids) = &self.cache.borrow().edges {
            return Ok(ids.clone());
        }
        let size = self.graph.path_size(self.id)?;
        let ids = (0..size)
            .map(|index| self.graph.path_edge_at(self.id, index))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.cache.borrow_mut().edges = Some(ids.clone());
        Ok(ids)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Path").field(&self.id.0).finish()
    }
}
