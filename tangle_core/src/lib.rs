//! Tangle core types.
//!
//! Leaf definitions shared by every other tangle crate: cell numbers and
//! object identities, member keys for attribute/subscript addressing, the
//! structural-event vocabulary delivered by the execution layer, the error
//! taxonomy, and the host-runtime boundary through which the engine sees the
//! live object graph.
//!
//! Nothing here depends on the symbol graph itself; these are the types that
//! cross crate boundaries.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod event;
pub mod host;
pub mod ids;
pub mod key;

pub use error::{HostError, TangleError, TangleResult};
pub use event::MutationKind;
pub use host::{ContainerKind, FrameBindings, HostRuntime, PendingGarbage};
pub use ids::{CellId, CellNum, ObjectId};
pub use key::{IndexKey, MemberKey};
