//! Error handling for routine authors.
//!
//! Every proxy, bridge and registrar call returns [`Result`]. Failures
//! reported by the host arrive as a [`HostError`] carrying a raw
//! [`HostErrorCode`]; the `From<HostError>` implementation below is the only
//! place such codes are mapped onto [`ProcError`], so `?` at any host call
//! site performs the translation.
//!
//! # Taxonomy
//!
//! | Kind | Raised when |
//! |------|-------------|
//! | [`ProcError::Scope`] | handle used after its scope ended, or the element was deleted |
//! | [`ProcError::UnsupportedType`] | annotation outside the host type grammar |
//! | [`ProcError::Conversion`] | non-scalar property value, or value/type mismatch |
//! | [`ProcError::Allocation`] | host could not allocate a handle or iterator |
//! | [`ProcError::Range`] | index-like argument out of bounds |
//! | [`ProcError::KeyConflict`] | duplicate key in a container-like structure |
//! | [`ProcError::Immutable`] | mutation on an immutable graph |
//! | [`ProcError::Conflict`] | concurrent transaction touched the same element |
//! | [`ProcError::Logic`] | violated precondition |
//! | [`ProcError::Abort`] | cooperative cancellation |
//! | [`ProcError::Signature`] | unsupported routine shape or declaration |

use std::fmt;

use thiserror::Error;
use tracing::trace;

use crate::host::{HostError, HostErrorCode};

/// Result type for every operation exposed to routine authors.
pub type Result<T> = std::result::Result<T, ProcError>;

/// Kind of handle named in a scope error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElementKind {
    /// A vertex proxy.
    Vertex,
    /// An edge proxy.
    Edge,
    /// A path proxy.
    Path,
    /// A property map of a vertex or edge.
    Properties,
    /// The graph proxy or its vertex collection.
    Graph,
    /// A procedure or transformation context.
    Context,
    /// A single stream message.
    Message,
    /// A batch of stream messages.
    Messages,
    /// An element the host reported without naming its kind.
    Object,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Vertex => "vertex",
            ElementKind::Edge => "edge",
            ElementKind::Path => "path",
            ElementKind::Properties => "properties",
            ElementKind::Graph => "graph",
            ElementKind::Context => "context",
            ElementKind::Message => "message",
            ElementKind::Messages => "messages",
            ElementKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// The two ways a handle can fall out of its scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    /// The execution scope that granted the handle has ended.
    StaleContext,
    /// The element behind the handle was deleted inside the scope.
    DeletedObject,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::StaleContext => f.write_str("used outside of its execution scope"),
            ScopeKind::DeletedObject => f.write_str("has been deleted"),
        }
    }
}

/// Why a routine declaration was rejected at registration time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignatureReason {
    /// The routine produces a future.
    Coroutine,
    /// The routine produces an asynchronous stream of records.
    AsyncGenerator,
    /// The routine produces a lazy iterator of records.
    Generator,
    /// No body was supplied.
    MissingBody,
    /// Two parameters share a name.
    DuplicateParameter(String),
    /// Two result fields share a name.
    DuplicateResult(String),
    /// A required parameter follows an optional one.
    RequiredAfterOptional(String),
}

impl fmt::Display for SignatureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureReason::Coroutine => f.write_str("routine must not be asynchronous"),
            SignatureReason::AsyncGenerator => {
                f.write_str("routine must not be an asynchronous generator")
            }
            SignatureReason::Generator => f.write_str("generator routines are not yet supported"),
            SignatureReason::MissingBody => f.write_str("routine has no body"),
            SignatureReason::DuplicateParameter(name) => {
                write!(f, "parameter '{name}' is declared more than once")
            }
            SignatureReason::DuplicateResult(name) => {
                write!(f, "result field '{name}' is declared more than once")
            }
            SignatureReason::RequiredAfterOptional(name) => {
                write!(f, "required parameter '{name}' follows an optional parameter")
            }
        }
    }
}

/// Structured errors surfaced to routine authors.
#[derive(Debug, Clone, Error)]
pub enum ProcError {
    /// Handle used outside its granted execution scope.
    #[error("{element} {kind}")]
    Scope {
        /// Stale context or deleted element.
        kind: ScopeKind,
        /// Kind of handle that was used.
        element: ElementKind,
    },
    /// Annotation is not reducible to the host type grammar.
    #[error("unsupported type annotation '{annotation}'")]
    UnsupportedType {
        /// Printed form of the offending annotation.
        annotation: String,
    },
    /// Value cannot be stored or does not match its declared type.
    #[error("value conversion failed: {0}")]
    Conversion(String),
    /// Host failed to allocate backing storage.
    #[error("unable to allocate: {0}")]
    Allocation(String),
    /// Index-like argument out of bounds.
    #[error("out of range: {0}")]
    Range(String),
    /// Duplicate key insertion.
    #[error("key already exists: {0}")]
    KeyConflict(String),
    /// Mutation attempted on an immutable graph.
    #[error("immutable object: {0}")]
    Immutable(String),
    /// Concurrent transaction modified the same element.
    #[error("serialization conflict: {0}")]
    Conflict(String),
    /// Logical precondition violated.
    #[error("logic error: {0}")]
    Logic(String),
    /// Execution was asked to abort.
    #[error("routine was asked to abort its execution")]
    Abort,
    /// Routine shape or declaration is unsupported.
    #[error("cannot register '{routine}': {reason}")]
    Signature {
        /// Name of the rejected routine.
        routine: String,
        /// What was wrong with it.
        reason: SignatureReason,
    },
    /// Argument values rejected by the host.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Host buffer was too small.
    #[error("insufficient buffer: {0}")]
    InsufficientBuffer(String),
    /// Unspecified host failure.
    #[error("unknown host error: {0}")]
    Unknown(String),
}

impl ProcError {
    /// Builds a scope error for a handle whose execution scope has ended.
    pub fn stale(element: ElementKind) -> Self {
        ProcError::Scope {
            kind: ScopeKind::StaleContext,
            element,
        }
    }

    /// Builds a scope error for a handle whose element was deleted.
    pub fn deleted(element: ElementKind) -> Self {
        ProcError::Scope {
            kind: ScopeKind::DeletedObject,
            element,
        }
    }

    pub(crate) fn signature(routine: impl Into<String>, reason: SignatureReason) -> Self {
        ProcError::Signature {
            routine: routine.into(),
            reason,
        }
    }

    /// Returns `true` for any scope error, stale or deleted.
    pub fn is_scope_error(&self) -> bool {
        matches!(self, ProcError::Scope { .. })
    }

    /// Returns `true` when re-running the whole invocation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProcError::Conflict(_))
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ProcError::Scope { .. } => "ScopeError",
            ProcError::UnsupportedType { .. } => "UnsupportedTypeError",
            ProcError::Conversion(_) => "ConversionError",
            ProcError::Allocation(_) => "AllocationError",
            ProcError::Range(_) => "RangeError",
            ProcError::KeyConflict(_) => "KeyConflictError",
            ProcError::Immutable(_) => "ImmutableError",
            ProcError::Conflict(_) => "ConflictError",
            ProcError::Logic(_) => "LogicError",
            ProcError::Abort => "AbortError",
            ProcError::Signature { .. } => "SignatureError",
            ProcError::InvalidArgument(_) => "InvalidArgumentError",
            ProcError::InsufficientBuffer(_) => "InsufficientBufferError",
            ProcError::Unknown(_) => "UnknownError",
        }
    }
}

impl From<HostError> for ProcError {
    fn from(err: HostError) -> Self {
        trace!(code = ?err.code, message = %err.message, "translating host error");
        let HostError { code, message } = err;
        match code {
            HostErrorCode::Unknown => ProcError::Unknown(message),
            HostErrorCode::UnableToAllocate => ProcError::Allocation(message),
            HostErrorCode::InsufficientBuffer => ProcError::InsufficientBuffer(message),
            HostErrorCode::OutOfRange => ProcError::Range(message),
            HostErrorCode::LogicError => ProcError::Logic(message),
            HostErrorCode::DeletedObject => ProcError::deleted(ElementKind::Object),
            HostErrorCode::InvalidArgument => ProcError::InvalidArgument(message),
            HostErrorCode::KeyAlreadyExists => ProcError::KeyConflict(message),
            HostErrorCode::ImmutableObject => ProcError::Immutable(message),
            HostErrorCode::ValueConversion => ProcError::Conversion(message),
            HostErrorCode::Serialization => ProcError::Conflict(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CODES: [HostErrorCode; 11] = [
        HostErrorCode::Unknown,
        HostErrorCode::UnableToAllocate,
        HostErrorCode::InsufficientBuffer,
        HostErrorCode::OutOfRange,
        HostErrorCode::LogicError,
        HostErrorCode::DeletedObject,
        HostErrorCode::InvalidArgument,
        HostErrorCode::KeyAlreadyExists,
        HostErrorCode::ImmutableObject,
        HostErrorCode::ValueConversion,
        HostErrorCode::Serialization,
    ];

    #[test]
    fn every_host_code_maps_to_a_distinct_kind() {
        let mut codes: Vec<&str> = ALL_CODES
            .iter()
            .map(|code| ProcError::from(HostError::new(*code, "boom")).code())
            .collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ALL_CODES.len());
    }

    #[test]
    fn deleted_object_is_a_scope_error() {
        let err = ProcError::from(HostError::new(HostErrorCode::DeletedObject, "vertex 3"));
        assert!(err.is_scope_error());
        assert!(matches!(
            err,
            ProcError::Scope {
                kind: ScopeKind::DeletedObject,
                ..
            }
        ));
    }

    #[test]
    fn only_conflicts_are_retryable() {
        for code in ALL_CODES {
            let err = ProcError::from(HostError::new(code, "x"));
            assert_eq!(err.is_retryable(), code == HostErrorCode::Serialization);
        }
        assert!(!ProcError::Abort.is_retryable());
    }

    #[test]
    fn messages_keep_host_detail() {
        let err = ProcError::from(HostError::new(
            HostErrorCode::LogicError,
            "vertex 7 still has edges",
        ));
        assert_eq!(err.to_string(), "logic error: vertex 7 still has edges");
        assert_eq!(
            ProcError::stale(ElementKind::Edge).to_string(),
            "edge used outside of its execution scope"
        );
    }

    #[test]
    fn generator_rejection_reads_as_a_limitation() {
        let err = ProcError::signature("walk", SignatureReason::Generator);
        assert_eq!(
            err.to_string(),
            "cannot register 'walk': generator routines are not yet supported"
        );
        assert_eq!(err.code(), "SignatureError");
    }
}
