//! Native API consumed from the host engine.
//!
//! The host owns graph storage, transactions and the query engine. This
//! module describes what the proxies need from it as object-safe traits;
//! [`memory`] provides an in-process implementation used by the CLI and the
//! test suite.

use std::rc::Rc;

use bytes::Bytes;
use thiserror::Error;

use crate::typing::TypeDescriptor;
use crate::types::{EdgeId, EdgeType, ElementRef, Label, PathId, VertexId};
use crate::value::{HostRecord, HostValue};

pub mod memory;

/// Raw failure codes reported by the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HostErrorCode {
    /// Unspecified failure.
    Unknown,
    /// Backing storage could not be allocated.
    UnableToAllocate,
    /// A caller-provided buffer was too small.
    InsufficientBuffer,
    /// Index-like argument out of bounds.
    OutOfRange,
    /// Precondition violated.
    LogicError,
    /// Element was deleted inside the current scope.
    DeletedObject,
    /// Argument rejected.
    InvalidArgument,
    /// Duplicate key.
    KeyAlreadyExists,
    /// Mutation on an immutable object.
    ImmutableObject,
    /// Value cannot be converted to the storage representation.
    ValueConversion,
    /// Concurrent transaction touched the same element.
    Serialization,
}

/// Failure reported by a host call.
#[derive(Clone, Debug, Error)]
#[error("{code:?}: {message}")]
pub struct HostError {
    /// Raw code.
    pub code: HostErrorCode,
    /// Host-provided detail.
    pub message: String,
}

impl HostError {
    /// Creates a host error.
    pub fn new(code: HostErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Result of a host call.
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Step-wise iterator over host items.
pub trait HostIter<T> {
    /// Advances the iterator. `Ok(None)` marks exhaustion.
    fn next(&mut self) -> HostResult<Option<T>>;
}

/// Boxed host iterator.
pub type HostCursor<T> = Box<dyn HostIter<T>>;

/// Cursor over a point-in-time copy of the host's items.
pub struct VecCursor<T> {
    items: std::vec::IntoIter<T>,
}

impl<T> VecCursor<T> {
    /// Creates a cursor over `items`.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }

    /// Boxes the cursor.
    pub fn boxed(items: Vec<T>) -> HostCursor<T>
    where
        T: 'static,
    {
        Box::new(Self::new(items))
    }
}

impl<T> HostIter<T> for VecCursor<T> {
    fn next(&mut self) -> HostResult<Option<T>> {
        Ok(self.items.next())
    }
}

/// A native graph handle bound to one execution scope.
///
/// Every accessor may be called with ids of removed elements and must then
/// report [`HostErrorCode::DeletedObject`]. Mutations on an immutable handle
/// must report [`HostErrorCode::ImmutableObject`] without touching storage.
pub trait HostGraph {
    /// Returns `false` once the execution scope has ended.
    fn is_valid(&self) -> bool;
    /// Returns `true` if the scope may mutate the graph.
    fn is_mutable(&self) -> bool;
    /// Returns `true` once the host asked the running routine to stop.
    fn must_abort(&self) -> bool;
    /// Returns `true` if the element still exists.
    fn contains_element(&self, element: ElementRef) -> bool;

    /// Looks up a vertex; unknown ids report [`HostErrorCode::OutOfRange`].
    fn vertex_by_id(&self, id: VertexId) -> HostResult<VertexId>;
    /// Snapshot of all vertex ids.
    fn iter_vertices(&self) -> HostResult<HostCursor<VertexId>>;
    /// Creates a vertex without labels or properties.
    fn create_vertex(&self) -> HostResult<VertexId>;
    /// Removes a vertex that has no incident edges.
    fn delete_vertex(&self, id: VertexId) -> HostResult<()>;
    /// Removes a vertex together with its incident edges.
    fn detach_delete_vertex(&self, id: VertexId) -> HostResult<()>;
    /// Creates a directed edge.
    fn create_edge(&self, from: VertexId, to: VertexId, edge_type: &EdgeType)
        -> HostResult<EdgeId>;
    /// Removes an edge.
    fn delete_edge(&self, id: EdgeId) -> HostResult<()>;

    /// Number of labels on a vertex.
    fn labels_count(&self, id: VertexId) -> HostResult<usize>;
    /// Label at `index`.
    fn label_at(&self, id: VertexId, index: usize) -> HostResult<Label>;
    /// Adds a label; adding a present label is a no-op.
    fn add_label(&self, id: VertexId, label: &Label) -> HostResult<()>;
    /// Removes a label; removing an absent label is a no-op.
    fn remove_label(&self, id: VertexId, label: &Label) -> HostResult<()>;
    /// Snapshot of incoming edges.
    fn iter_in_edges(&self, id: VertexId) -> HostResult<HostCursor<EdgeId>>;
    /// Snapshot of outgoing edges.
    fn iter_out_edges(&self, id: VertexId) -> HostResult<HostCursor<EdgeId>>;

    /// Type tag of an edge.
    fn edge_type(&self, id: EdgeId) -> HostResult<EdgeType>;
    /// Source vertex of an edge.
    fn edge_from(&self, id: EdgeId) -> HostResult<VertexId>;
    /// Destination vertex of an edge.
    fn edge_to(&self, id: EdgeId) -> HostResult<VertexId>;

    /// Property value, [`HostValue::Null`] when absent.
    fn get_property(&self, owner: ElementRef, name: &str) -> HostResult<HostValue>;
    /// Stores a property; [`HostValue::Null`] removes it.
    fn set_property(&self, owner: ElementRef, name: &str, value: HostValue) -> HostResult<()>;
    /// Snapshot of all properties of an element.
    fn iter_properties(&self, owner: ElementRef) -> HostResult<HostCursor<(String, HostValue)>>;

    /// Starts a path at `start`.
    fn path_make_with_start(&self, start: VertexId) -> HostResult<PathId>;
    /// Appends an edge touching the current last vertex.
    fn path_expand(&self, path: PathId, edge: EdgeId) -> HostResult<()>;
    /// Number of edges in the path.
    fn path_size(&self, path: PathId) -> HostResult<usize>;
    /// Vertex at `index`, `0..=size`.
    fn path_vertex_at(&self, path: PathId, index: usize) -> HostResult<VertexId>;
    /// Edge at `index`, `0..size`.
    fn path_edge_at(&self, path: PathId, index: usize) -> HostResult<EdgeId>;
}

/// Shared graph handle held by every proxy of one invocation.
pub type GraphRef = Rc<dyn HostGraph>;

/// A native batch of stream messages.
pub trait HostMessages {
    /// Returns `false` once the batch's scope has ended.
    fn is_valid(&self) -> bool;
    /// Number of messages in the batch.
    fn total_messages(&self) -> HostResult<usize>;
    /// Raw payload of the message at `index`.
    fn payload(&self, index: usize) -> HostResult<Bytes>;
    /// Source topic of the message at `index`.
    fn topic_name(&self, index: usize) -> HostResult<String>;
    /// Key of the message at `index`.
    fn key(&self, index: usize) -> HostResult<Bytes>;
    /// Broker timestamp of the message at `index`.
    fn timestamp(&self, index: usize) -> HostResult<i64>;
}

/// Shared message batch handle.
pub type MessagesRef = Rc<dyn HostMessages>;

/// Invocation adapter for a procedure: graph handle plus positional raw
/// arguments in, zero or more records out.
pub type ProcAdapter = Rc<dyn Fn(GraphRef, Vec<HostValue>) -> crate::Result<Vec<HostRecord>>>;

/// Invocation adapter for a transformation.
pub type TransAdapter = Rc<dyn Fn(GraphRef, MessagesRef) -> crate::Result<Vec<HostRecord>>>;

/// Host-side handle of a registered procedure, used to attach its signature.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProcHandle(pub usize);

/// Registration sink of a query module.
pub trait HostModule {
    /// Registers a procedure that only reads the graph.
    fn add_read_procedure(&mut self, name: &str, adapter: ProcAdapter) -> HostResult<ProcHandle>;
    /// Registers a procedure that may mutate the graph.
    fn add_write_procedure(&mut self, name: &str, adapter: ProcAdapter)
        -> HostResult<ProcHandle>;
    /// Registers a stream transformation.
    fn add_transformation(&mut self, name: &str, adapter: TransAdapter) -> HostResult<()>;
    /// Appends a required argument.
    fn add_argument(&mut self, proc: ProcHandle, name: &str, ty: &TypeDescriptor)
        -> HostResult<()>;
    /// Appends an optional argument with its default.
    fn add_opt_argument(
        &mut self,
        proc: ProcHandle,
        name: &str,
        ty: &TypeDescriptor,
        default: HostValue,
    ) -> HostResult<()>;
    /// Appends a result field.
    fn add_result(&mut self, proc: ProcHandle, name: &str, ty: &TypeDescriptor)
        -> HostResult<()>;
    /// Appends a result field flagged as deprecated.
    fn add_deprecated_result(
        &mut self,
        proc: ProcHandle,
        name: &str,
        ty: &TypeDescriptor,
    ) -> HostResult<()>;
}
