//! In-process host engine.
//!
//! Keeps a vertex/edge store behind a lock and hands out one [`MemoryScope`]
//! per invocation. There is no persistence and no isolation beyond
//! first-writer-wins claims: a scope that mutates an element claims it until
//! the scope ends, and any other open scope touching the element gets a
//! serialization failure.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::types::{EdgeId, EdgeType, Label, VertexId};
use crate::value::HostValue;

mod messages;
mod module;
mod scope;

pub use messages::{MemoryMessages, MessageRecord};
pub use module::MemoryModule;
pub use scope::{AbortHandle, MemoryScope};

/// Whether a scope may mutate the graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccessMode {
    /// Every mutation fails with an immutability error.
    ReadOnly,
    /// Mutations are allowed.
    ReadWrite,
}

/// Capacity limits of the in-memory engine.
#[derive(Clone, Debug)]
pub struct MemoryHostOptions {
    /// Maximum number of live vertices.
    pub max_vertices: usize,
    /// Maximum number of edges in one path.
    pub max_path_length: usize,
}

impl Default for MemoryHostOptions {
    fn default() -> Self {
        Self {
            max_vertices: 1 << 20,
            max_path_length: 1 << 12,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct VertexRecord {
    pub(crate) labels: SmallVec<[Label; 4]>,
    pub(crate) props: BTreeMap<String, HostValue>,
    pub(crate) in_edges: Vec<EdgeId>,
    pub(crate) out_edges: Vec<EdgeId>,
    pub(crate) writer: Option<u64>,
}

#[derive(Debug)]
pub(crate) struct EdgeRecord {
    pub(crate) edge_type: EdgeType,
    pub(crate) from: VertexId,
    pub(crate) to: VertexId,
    pub(crate) props: BTreeMap<String, HostValue>,
    pub(crate) writer: Option<u64>,
}

#[derive(Debug, Default)]
pub(crate) struct Store {
    pub(crate) next_vertex: u64,
    pub(crate) next_edge: u64,
    pub(crate) vertices: FxHashMap<VertexId, VertexRecord>,
    pub(crate) edges: FxHashMap<EdgeId, EdgeRecord>,
}

impl Store {
    pub(crate) fn release_claims(&mut self, tx: u64) {
        for vertex in self.vertices.values_mut() {
            if vertex.writer == Some(tx) {
                vertex.writer = None;
            }
        }
        for edge in self.edges.values_mut() {
            if edge.writer == Some(tx) {
                edge.writer = None;
            }
        }
    }
}

struct DbInner {
    store: RwLock<Store>,
    options: MemoryHostOptions,
    next_tx: AtomicU64,
}

/// Shared in-memory graph.
#[derive(Clone)]
pub struct MemoryDb {
    inner: Arc<DbInner>,
}

impl MemoryDb {
    /// Creates an empty graph with default limits.
    pub fn new() -> Self {
        Self::with_options(MemoryHostOptions::default())
    }

    /// Creates an empty graph with the given limits.
    pub fn with_options(options: MemoryHostOptions) -> Self {
        Self {
            inner: Arc::new(DbInner {
                store: RwLock::new(Store::default()),
                options,
                next_tx: AtomicU64::new(1),
            }),
        }
    }

    /// Capacity limits.
    pub fn options(&self) -> &MemoryHostOptions {
        &self.inner.options
    }

    /// Opens a new execution scope.
    pub fn begin_scope(&self, mode: AccessMode) -> std::rc::Rc<MemoryScope> {
        let tx = self.inner.next_tx.fetch_add(1, Ordering::Relaxed);
        std::rc::Rc::new(MemoryScope::new(self.clone(), tx, mode))
    }

    /// Number of live vertices.
    pub fn vertex_count(&self) -> usize {
        self.inner.store.read().vertices.len()
    }

    /// Number of live edges.
    pub fn edge_count(&self) -> usize {
        self.inner.store.read().edges.len()
    }

    pub(crate) fn store(&self) -> &RwLock<Store> {
        &self.inner.store
    }
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self.inner.store.read();
        f.debug_struct("MemoryDb")
            .field("vertices", &store.vertices.len())
            .field("edges", &store.edges.len())
            .finish()
    }
}
