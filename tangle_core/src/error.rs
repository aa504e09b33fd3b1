//! Error taxonomy for the dependency tracker.
//!
//! Resolution misses are not errors: a chain that stops early reports
//! partial success through its result type. Errors are reserved for host
//! identity churn, contract violations at the execution-layer boundary, and
//! structurally unmodeled syntax in the precheck walker.

use crate::ids::{CellNum, ObjectId};
use thiserror::Error;

/// Errors surfaced by the host runtime while walking the live object graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// An object's identity changed or vanished mid-traversal (a container
    /// shrank while being walked). Surfaced to the accessor's caller rather
    /// than swallowed: continuing risks indexing garbage.
    #[error("object {0:?} changed identity mid-traversal")]
    IdentityChurn(ObjectId),

    /// A member step was attempted on an object with no member storage of
    /// the requested style.
    #[error("object {0:?} does not support the requested member access")]
    NotAContainer(ObjectId),
}

/// Errors produced by the tangle engine.
#[derive(Debug, Error)]
pub enum TangleError {
    /// A provenance query named a cell number that has not executed.
    #[error("cell {0} has not been run yet")]
    UnknownCell(CellNum),

    /// The precheck walker met an assignment or loop target of a syntactic
    /// shape it does not model. Fatal for that unit's precheck only; the
    /// caller falls back to full resolution.
    #[error("unmodeled {construct} shape in {walker}: {detail}")]
    StructuralInconsistency {
        /// The walker that gave up (e.g. "precheck").
        walker: &'static str,
        /// The construct that was unmodeled (e.g. "assignment target").
        construct: &'static str,
        /// What was actually seen.
        detail: String,
    },

    /// The execution layer violated a boundary contract (e.g. more than one
    /// of the function-def/import/class kind hints set).
    #[error("contract violation: {0}")]
    Contract(&'static str),

    /// Error reported by the host runtime.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Convenience result alias.
pub type TangleResult<T> = Result<T, TangleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_error_propagates() {
        fn inner() -> TangleResult<()> {
            Err(HostError::IdentityChurn(ObjectId::new(3)).into())
        }
        match inner() {
            Err(TangleError::Host(HostError::IdentityChurn(obj))) => {
                assert_eq!(obj, ObjectId::new(3));
            }
            _ => panic!("expected identity churn to surface as a host error"),
        }
    }

    #[test]
    fn test_display_messages() {
        let err = TangleError::UnknownCell(CellNum::new(4));
        assert_eq!(err.to_string(), "cell 4 has not been run yet");
    }
}
