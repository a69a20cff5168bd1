use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::{AccessMode, EdgeRecord, MemoryDb, Store, VertexRecord};
use crate::host::{HostCursor, HostError, HostErrorCode, HostGraph, HostResult, VecCursor};
use crate::types::{EdgeId, EdgeType, ElementRef, Label, PathId, VertexId};
use crate::value::HostValue;

#[derive(Debug, Default)]
struct PathRecord {
    vertices: Vec<VertexId>,
    edges: Vec<EdgeId>,
}

/// Cloneable, thread-safe handle used to ask a running invocation to stop.
#[derive(Clone, Debug)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    /// Sets the abort flag observed by the scope's `must_abort`.
    pub fn request_abort(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// One execution scope over a [`MemoryDb`].
///
/// Ending the scope, explicitly or by dropping it, invalidates every proxy
/// derived from it and releases the elements it claimed for writing.
pub struct MemoryScope {
    db: MemoryDb,
    tx: u64,
    mode: AccessMode,
    valid: Cell<bool>,
    abort: Arc<AtomicBool>,
    paths: RefCell<Vec<PathRecord>>,
}

fn deleted(kind: &str, id: impl Display) -> HostError {
    HostError::new(HostErrorCode::DeletedObject, format!("{kind} {id}"))
}

fn vertex_ref(store: &Store, id: VertexId) -> HostResult<&VertexRecord> {
    store.vertices.get(&id).ok_or_else(|| deleted("vertex", id))
}

fn vertex_mut(store: &mut Store, id: VertexId) -> HostResult<&mut VertexRecord> {
    store.vertices.get_mut(&id).ok_or_else(|| deleted("vertex", id))
}

fn edge_ref(store: &Store, id: EdgeId) -> HostResult<&EdgeRecord> {
    store.edges.get(&id).ok_or_else(|| deleted("edge", id))
}

fn props_ref(store: &Store, owner: ElementRef) -> HostResult<&BTreeMap<String, HostValue>> {
    match owner {
        ElementRef::Vertex(id) => vertex_ref(store, id).map(|vertex| &vertex.props),
        ElementRef::Edge(id) => edge_ref(store, id).map(|edge| &edge.props),
    }
}

impl MemoryScope {
    pub(super) fn new(db: MemoryDb, tx: u64, mode: AccessMode) -> Self {
        debug!(tx, ?mode, "scope opened");
        Self {
            db,
            tx,
            mode,
            valid: Cell::new(true),
            abort: Arc::new(AtomicBool::new(false)),
            paths: RefCell::new(Vec::new()),
        }
    }

    /// Transaction id of the scope.
    pub fn tx(&self) -> u64 {
        self.tx
    }

    /// Access mode the scope was opened with.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Ends the scope. Later calls are no-ops.
    pub fn end(&self) {
        if self.valid.replace(false) {
            self.db.store().write().release_claims(self.tx);
            self.paths.borrow_mut().clear();
            debug!(tx = self.tx, "scope ended");
        }
    }

    /// Asks the running routine to stop.
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    /// Handle for requesting an abort from another thread.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle(self.abort.clone())
    }

    fn open(&self) -> HostResult<()> {
        if self.valid.get() {
            Ok(())
        } else {
            Err(HostError::new(
                HostErrorCode::LogicError,
                format!("scope {} has ended", self.tx),
            ))
        }
    }

    fn writable(&self) -> HostResult<()> {
        self.open()?;
        match self.mode {
            AccessMode::ReadWrite => Ok(()),
            AccessMode::ReadOnly => Err(HostError::new(
                HostErrorCode::ImmutableObject,
                "graph is immutable",
            )),
        }
    }

    fn check_claim(&self, writer: Option<u64>, what: impl Display) -> HostResult<()> {
        match writer {
            Some(other) if other != self.tx => {
                warn!(tx = self.tx, holder = other, element = %what, "write conflict");
                Err(HostError::new(
                    HostErrorCode::Serialization,
                    format!("{what} is being modified by transaction {other}"),
                ))
            }
            _ => Ok(()),
        }
    }

    fn claim(&self, writer: &mut Option<u64>, what: impl Display) -> HostResult<()> {
        self.check_claim(*writer, what)?;
        *writer = Some(self.tx);
        Ok(())
    }

    /// Checks and takes claims on an edge and both endpoints, then unlinks it.
    fn unlink_edge(&self, store: &mut Store, id: EdgeId) -> HostResult<()> {
        let (from, to) = {
            let edge = edge_ref(store, id)?;
            (edge.from, edge.to)
        };
        self.check_claim(edge_ref(store, id)?.writer, format_args!("edge {id}"))?;
        self.check_claim(vertex_ref(store, from)?.writer, format_args!("vertex {from}"))?;
        self.check_claim(vertex_ref(store, to)?.writer, format_args!("vertex {to}"))?;
        store.edges.remove(&id);
        let source = vertex_mut(store, from)?;
        source.out_edges.retain(|edge| *edge != id);
        source.writer = Some(self.tx);
        let target = vertex_mut(store, to)?;
        target.in_edges.retain(|edge| *edge != id);
        target.writer = Some(self.tx);
        Ok(())
    }

    fn with_path<T>(&self, path: PathId, f: impl FnOnce(&mut PathRecord) -> HostResult<T>) -> HostResult<T> {
        self.open()?;
        let mut paths = self.paths.borrow_mut();
        let index = usize::try_from(path.0).map_err(|_| unknown_path(path))?;
        let record = paths.get_mut(index).ok_or_else(|| unknown_path(path))?;
        f(record)
    }
}

fn unknown_path(path: PathId) -> HostError {
    HostError::new(HostErrorCode::OutOfRange, format!("unknown path {}", path.0))
}

impl Drop for MemoryScope {
    fn drop(&mut self) {
        self.end();
    }
}

impl HostGraph for MemoryScope {
    fn is_valid(&self) -> bool {
        self.valid.get()
    }

    fn is_mutable(&self) -> bool {
        self.mode == AccessMode::ReadWrite
    }

    fn must_abort(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    fn contains_element(&self, element: ElementRef) -> bool {
        let store = self.db.store().read();
        match element {
            ElementRef::Vertex(id) => store.vertices.contains_key(&id),
            ElementRef::Edge(id) => store.edges.contains_key(&id),
        }
    }

    fn vertex_by_id(&self, id: VertexId) -> HostResult<VertexId> {
        self.open()?;
        if self.db.store().read().vertices.contains_key(&id) {
            Ok(id)
        } else {
            Err(HostError::new(
                HostErrorCode::OutOfRange,
                format!("no vertex with id {id}"),
            ))
        }
    }

    fn iter_vertices(&self) -> HostResult<HostCursor<VertexId>> {
        self.open()?;
        let mut ids: Vec<VertexId> = self.db.store().read().vertices.keys().copied().collect();
        ids.sort_unstable();
        Ok(VecCursor::boxed(ids))
    }

    fn create_vertex(&self) -> HostResult<VertexId> {
        self.writable()?;
        let mut store = self.db.store().write();
        if store.vertices.len() >= self.db.options().max_vertices {
            return Err(HostError::new(
                HostErrorCode::UnableToAllocate,
                format!("vertex limit {} reached", self.db.options().max_vertices),
            ));
        }
        let id = VertexId(store.next_vertex);
        store.next_vertex += 1;
        store.vertices.insert(
            id,
            VertexRecord {
                writer: Some(self.tx),
                ..VertexRecord::default()
            },
        );
        trace!(tx = self.tx, vertex = id.0, "vertex created");
        Ok(id)
    }

    fn delete_vertex(&self, id: VertexId) -> HostResult<()> {
        self.writable()?;
        let mut store = self.db.store().write();
        let vertex = vertex_ref(&store, id)?;
        self.check_claim(vertex.writer, format_args!("vertex {id}"))?;
        let degree = vertex.in_edges.len() + vertex.out_edges.len();
        if degree > 0 {
            return Err(HostError::new(
                HostErrorCode::LogicError,
                format!("vertex {id} still has {degree} edges"),
            ));
        }
        store.vertices.remove(&id);
        Ok(())
    }

    fn detach_delete_vertex(&self, id: VertexId) -> HostResult<()> {
        self.writable()?;
        let mut store = self.db.store().write();
        let vertex = vertex_ref(&store, id)?;
        self.check_claim(vertex.writer, format_args!("vertex {id}"))?;
        let mut incident: Vec<EdgeId> = vertex
            .in_edges
            .iter()
            .chain(vertex.out_edges.iter())
            .copied()
            .collect();
        incident.sort_unstable();
        incident.dedup();
        for edge in &incident {
            let record = edge_ref(&store, *edge)?;
            self.check_claim(record.writer, format_args!("edge {edge}"))?;
            let other = if record.from == id { record.to } else { record.from };
            self.check_claim(vertex_ref(&store, other)?.writer, format_args!("vertex {other}"))?;
        }
        for edge in incident {
            self.unlink_edge(&mut store, edge)?;
        }
        store.vertices.remove(&id);
        Ok(())
    }

    fn create_edge(&self, from: VertexId, to: VertexId, edge_type: &EdgeType) -> HostResult<EdgeId> {
        self.writable()?;
        let mut store = self.db.store().write();
        self.check_claim(vertex_ref(&store, from)?.writer, format_args!("vertex {from}"))?;
        self.check_claim(vertex_ref(&store, to)?.writer, format_args!("vertex {to}"))?;
        let id = EdgeId(store.next_edge);
        store.next_edge += 1;
        let source = vertex_mut(&mut store, from)?;
        source.out_edges.push(id);
        source.writer = Some(self.tx);
        let target = vertex_mut(&mut store, to)?;
        target.in_edges.push(id);
        target.writer = Some(self.tx);
        store.edges.insert(
            id,
            EdgeRecord {
                edge_type: edge_type.clone(),
                from,
                to,
                props: BTreeMap::new(),
                writer: Some(self.tx),
            },
        );
        Ok(id)
    }

    fn delete_edge(&self, id: EdgeId) -> HostResult<()> {
        self.writable()?;
        let mut store = self.db.store().write();
        self.unlink_edge(&mut store, id)
    }

    fn labels_count(&self, id: VertexId) -> HostResult<usize> {
        self.open()?;
        let store = self.db.store().read();
        Ok(vertex_ref(&store, id)?.labels.len())
    }

    fn label_at(&self, id: VertexId, index: usize) -> HostResult<Label> {
        self.open()?;
        let store = self.db.store().read();
        let labels = &vertex_ref(&store, id)?.labels;
        labels.get(index).cloned().ok_or_else(|| {
            HostError::new(
                HostErrorCode::OutOfRange,
                format!("label index {index} of vertex {id} with {} labels", labels.len()),
            )
        })
    }

    fn add_label(&self, id: VertexId, label: &Label) -> HostResult<()> {
        self.writable()?;
        let mut store = self.db.store().write();
        let vertex = vertex_mut(&mut store, id)?;
        self.claim(&mut vertex.writer, format_args!("vertex {id}"))?;
        if !vertex.labels.contains(label) {
            vertex.labels.push(label.clone());
        }
        Ok(())
    }

    fn remove_label(&self, id: VertexId, label: &Label) -> HostResult<()> {
        self.writable()?;
        let mut store = self.db.store().write();
        let vertex = vertex_mut(&mut store, id)?;
        self.claim(&mut vertex.writer, format_args!("vertex {id}"))?;
        vertex.labels.retain(|existing| existing != label);
        Ok(())
    }

    fn iter_in_edges(&self, id: VertexId) -> HostResult<HostCursor<EdgeId>> {
        self.open()?;
        let store = self.db.store().read();
        Ok(VecCursor::boxed(vertex_ref(&store, id)?.in_edges.clone()))
    }

    fn iter_out_edges(&self, id: VertexId) -> HostResult<HostCursor<EdgeId>> {
        self.open()?;
        let store = self.db.store().read();
        Ok(VecCursor::boxed(vertex_ref(&store, id)?.out_edges.clone()))
    }

    fn edge_type(&self, id: EdgeId) -> HostResult<EdgeType> {
        self.open()?;
        let store = self.db.store().read();
        Ok(edge_ref(&store, id)?.edge_type.clone())
    }

    fn edge_from(&self, id: EdgeId) -> HostResult<VertexId> {
        self.open()?;
        let store = self.db.store().read();
        Ok(edge_ref(&store, id)?.from)
    }

    fn edge_to(&self, id: EdgeId) -> HostResult<VertexId> {
        self.open()?;
        let store = self.db.store().read();
        Ok(edge_ref(&store, id)?.to)
    }

    fn get_property(&self, owner: ElementRef, name: &str) -> HostResult<HostValue> {
        self.open()?;
        let store = self.db.store().read();
        Ok(props_ref(&store, owner)?
            .get(name)
            .cloned()
            .unwrap_or(HostValue::Null))
    }

    fn set_property(&self, owner: ElementRef, name: &str, value: HostValue) -> HostResult<()> {
        self.writable()?;
        if value.contains_graph_element() {
            return Err(HostError::new(
                HostErrorCode::ValueConversion,
                format!("a {} cannot be stored as property '{name}'", value.kind_name()),
            ));
        }
        let mut store = self.db.store().write();
        let (props, writer) = match owner {
            ElementRef::Vertex(id) => {
                let vertex = vertex_mut(&mut store, id)?;
                (&mut vertex.props, &mut vertex.writer)
            }
            ElementRef::Edge(id) => {
                let edge = store.edges.get_mut(&id).ok_or_else(|| deleted("edge", id))?;
                (&mut edge.props, &mut edge.writer)
            }
        };
        self.claim(writer, format_args!("{owner:?}"))?;
        if value == HostValue::Null {
            props.remove(name);
        } else {
            props.insert(name.to_owned(), value);
        }
        Ok(())
    }

    fn iter_properties(&self, owner: ElementRef) -> HostResult<HostCursor<(String, HostValue)>> {
        self.open()?;
        let store = self.db.store().read();
        let items = props_ref(&store, owner)?
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Ok(VecCursor::boxed(items))
    }

    fn path_make_with_start(&self, start: VertexId) -> HostResult<PathId> {
        self.open()?;
        vertex_ref(&self.db.store().read(), start)?;
        let mut paths = self.paths.borrow_mut();
        let id = PathId(paths.len() as u64);
        paths.push(PathRecord {
            vertices: vec![start],
            edges: Vec::new(),
        });
        Ok(id)
    }

    fn path_expand(&self, path: PathId, edge: EdgeId) -> HostResult<()> {
        self.open()?;
        let (from, to) = {
            let store = self.db.store().read();
            let record = edge_ref(&store, edge)?;
            (record.from, record.to)
        };
        let max_len = self.db.options().max_path_length;
        self.with_path(path, |record| {
            if record.edges.len() >= max_len {
                return Err(HostError::new(
                    HostErrorCode::UnableToAllocate,
                    format!("path length limit {max_len} reached"),
                ));
            }
            let last = record
                .vertices
                .last()
                .copied()
                .ok_or_else(|| HostError::new(HostErrorCode::LogicError, "path has no vertices"))?;
            let next = if from == last {
                to
            } else if to == last {
                from
            } else {
                return Err(HostError::new(
                    HostErrorCode::LogicError,
                    format!("edge {edge} does not touch vertex {last}"),
                ));
            };
            record.edges.push(edge);
            record.vertices.push(next);
            Ok(())
        })
    }

    fn path_size(&self, path: PathId) -> HostResult<usize> {
        self.with_path(path, |record| Ok(record.edges.len()))
    }

    fn path_vertex_at(&self, path: PathId, index: usize) -> HostResult<VertexId> {
        self.with_path(path, |record| {
            record.vertices.get(index).copied().ok_or_else(|| {
                HostError::new(
                    HostErrorCode::OutOfRange,
                    format!("path vertex index {index}"),
                )
            })
        })
    }

    fn path_edge_at(&self, path: PathId, index: usize) -> HostResult<EdgeId> {
        self.with_path(path, |record| {
            record.edges.get(index).copied().ok_or_else(|| {
                HostError::new(HostErrorCode::OutOfRange, format!("path edge index {index}"))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_scope_rejects_mutation_before_storage() {
        let db = MemoryDb::new();
        let scope = db.begin_scope(AccessMode::ReadOnly);
        let err = scope.create_vertex().unwrap_err();
        assert_eq!(err.code, HostErrorCode::ImmutableObject);
        assert_eq!(db.vertex_count(), 0);
    }

    #[test]
    fn second_writer_hits_a_serialization_failure() {
        let db = MemoryDb::new();
        let first = db.begin_scope(AccessMode::ReadWrite);
        let vertex = first.create_vertex().unwrap();
        let second = db.begin_scope(AccessMode::ReadWrite);
        let err = second
            .set_property(ElementRef::Vertex(vertex), "x", HostValue::Int(1))
            .unwrap_err();
        assert_eq!(err.code, HostErrorCode::Serialization);
        first.end();
        second
            .set_property(ElementRef::Vertex(vertex), "x", HostValue::Int(1))
            .unwrap();
    }

    #[test]
    fn rejected_delete_leaves_the_vertex_unclaimed() {
        let db = MemoryDb::new();
        let setup = db.begin_scope(AccessMode::ReadWrite);
        let a = setup.create_vertex().unwrap();
        let b = setup.create_vertex().unwrap();
        setup.create_edge(a, b, &EdgeType::new("NEXT")).unwrap();
        setup.end();

        let first = db.begin_scope(AccessMode::ReadWrite);
        let second = db.begin_scope(AccessMode::ReadWrite);
        assert_eq!(
            first.delete_vertex(a).unwrap_err().code,
            HostErrorCode::LogicError
        );
        second
            .set_property(ElementRef::Vertex(a), "x", HostValue::Int(1))
            .unwrap();
        assert_eq!(
            first.delete_vertex(a).unwrap_err().code,
            HostErrorCode::Serialization
        );
    }

    #[test]
    fn detach_delete_handles_self_loops() {
        let db = MemoryDb::new();
        let scope = db.begin_scope(AccessMode::ReadWrite);
        let vertex = scope.create_vertex().unwrap();
        scope.create_edge(vertex, vertex, &EdgeType::new("SELF")).unwrap();
        assert_eq!(
            scope.delete_vertex(vertex).unwrap_err().code,
            HostErrorCode::LogicError
        );
        scope.detach_delete_vertex(vertex).unwrap();
        assert_eq!(db.vertex_count(), 0);
        assert_eq!(db.edge_count(), 0);
    }

    #[test]
    fn path_expand_requires_a_touching_edge() {
        let db = MemoryDb::new();
        let scope = db.begin_scope(AccessMode::ReadWrite);
        let a = scope.create_vertex().unwrap();
        let b = scope.create_vertex().unwrap();
        let c = scope.create_vertex().unwrap();
        let ab = scope.create_edge(a, b, &EdgeType::new("NEXT")).unwrap();
        let bc = scope.create_edge(b, c, &EdgeType::new("NEXT")).unwrap();
        let path = scope.path_make_with_start(a).unwrap();
        assert_eq!(
            scope.path_expand(path, bc).unwrap_err().code,
            HostErrorCode::LogicError
        );
        scope.path_expand(path, ab).unwrap();
        scope.path_expand(path, bc).unwrap();
        assert_eq!(scope.path_size(path).unwrap(), 2);
        assert_eq!(scope.path_vertex_at(path, 2).unwrap(), c);
    }

    #[test]
    fn ending_a_scope_twice_is_harmless() {
        let db = MemoryDb::new();
        let scope = db.begin_scope(AccessMode::ReadWrite);
        scope.end();
        scope.end();
        assert!(!scope.is_valid());
        assert_eq!(scope.create_vertex().unwrap_err().code, HostErrorCode::LogicError);
    }
}
