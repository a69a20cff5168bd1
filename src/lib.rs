//! Procedure-authoring layer for Sombra query modules.
//!
//! Routines are declared with the builders in [`registry`], receive
//! scope-checked proxies from [`proxy`], and declare their parameter and
//! result types through [`typing`]. Everything the host engine provides is
//! consumed through the traits in [`host`]; [`host::memory`] implements them
//! in-process.

#![warn(missing_docs)]

pub mod error;
pub mod example;
pub mod host;
pub mod logging;
pub mod proxy;
pub mod registry;
pub mod types;
pub mod typing;
pub mod value;

pub use error::{ElementKind, ProcError, Result, ScopeKind, SignatureReason};
pub use proxy::{Edge, Graph, Message, Messages, Path, ProcCtx, Properties, TransCtx, Vertex, Vertices};
pub use registry::{Args, ProcedureBuilder, TransformationBuilder};
pub use types::{EdgeId, EdgeType, Label, VertexId};
pub use typing::{bridge, bridge_text, Annotation, Class, CypherType, TypeDescriptor};
pub use value::{HostValue, Record, Value};
