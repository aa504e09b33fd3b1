//! The mutation vocabulary of the execution-layer boundary.
//!
//! Structural events (statement boundaries, attribute/subscript access, call
//! boundaries, argument binds) arrive as method calls on the tracker facade.
//! In-place container mutations arrive as records tagged with one of these
//! kinds, because the engine must distinguish how the mutation reshapes the
//! container's namespace.

/// The kind of an in-place mutation reported by the execution layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Generic in-place mutation of a container or object
    /// (`d.update(...)`, `obj.method()` with observable writes).
    InPlace,
    /// A single element appended to a position-indexed container.
    ///
    /// The appended element becomes a namespace child of the container so
    /// that later propagation does not tunnel through to unrelated
    /// dependency children.
    Append,
    /// A callee mutated one of its arguments; the argument symbols are the
    /// mutated ones, not the receiver.
    ArgumentMutate,
}

impl MutationKind {
    /// Whether the receiver's aliases are the mutated symbols.
    #[inline]
    pub fn mutates_receiver(self) -> bool {
        !matches!(self, MutationKind::ArgumentMutate)
    }
}
