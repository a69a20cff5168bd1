use super::{Graph, GraphRef};
use crate::error::{ElementKind, ProcError, Result};

/// Root object handed to a procedure for one invocation.
#[derive(Clone, Debug)]
pub struct ProcCtx {
    graph: Graph,
}

impl ProcCtx {
    /// Wraps the native graph handle of one invocation.
    pub fn new(graph: GraphRef) -> Self {
        Self {
            graph: Graph::new(graph),
        }
    }

    /// Returns `true` while the invocation is running.
    pub fn is_valid(&self) -> bool {
        self.graph.is_valid()
    }

    /// Graph the procedure runs against.
    pub fn graph(&self) -> Result<&Graph> {
        if self.graph.is_valid() {
            Ok(&self.graph)
        } else {
            Err(ProcError::stale(ElementKind::Context))
        }
    }

    /// Returns `true` once the host asked the routine to stop.
    pub fn must_abort(&self) -> Result<bool> {
        self.graph()?.must_abort()
    }

    /// Fails with [`ProcError::Abort`] once the host asked the routine to stop.
    pub fn check_must_abort(&self) -> Result<()> {
        if self.must_abort()? {
            Err(ProcError::Abort)
        } else {
            Ok(())
        }
    }
}

/// Root object handed to a transformation for one batch.
#[derive(Clone, Debug)]
pub struct TransCtx {
    graph: Graph,
}

impl TransCtx {
    /// Wraps the native graph handle of one invocation.
    pub fn new(graph: GraphRef) -> Self {
        Self {
            graph: Graph::new(graph),
        }
    }

    /// Returns `true` while the batch is being processed.
    pub fn is_valid(&self) -> bool {
        self.graph.is_valid()
    }

    /// Graph the transformation runs against.
    pub fn graph(&self) -> Result<&Graph> {
        if self.graph.is_valid() {
            Ok(&self.graph)
        } else {
            Err(ProcError::stale(ElementKind::Context))
        }
    }

    /// Returns `true` once the host asked the routine to stop.
    pub fn must_abort(&self) -> Result<bool> {
        self.graph()?.must_abort()
    }
}
