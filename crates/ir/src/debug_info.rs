//! Debug location modeling.
//!
//! Every instruction may carry a [`DebugLoc`]; a location whose `inlined_at`
//! is set forms a chain from the innermost (most-inlined) frame out to the
//! location in the caller the code was ultimately inlined into. Scopes are
//! module-level [`Subprogram`] entries carrying the linkage name and
//! declaration line needed to compute line offsets.

use cranelift_entity::packed_option::PackedOption;

/// An opaque reference to a [`Subprogram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeRef(pub u32);
cranelift_entity::entity_impl!(ScopeRef);

/// An opaque reference to a [`DebugLoc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DebugLocId(pub u32);
cranelift_entity::entity_impl!(DebugLocId);

/// The subprogram a debug location belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subprogram {
    /// Linkage name of the enclosing function.
    pub linkage_name: String,
    /// Source line of the function declaration.
    pub decl_line: u32,
}

impl Subprogram {
    pub fn new(linkage_name: impl Into<String>, decl_line: u32) -> Self {
        Self {
            linkage_name: linkage_name.into(),
            decl_line,
        }
    }
}

/// A single source location, possibly inlined into an outer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugLoc {
    pub line: u32,
    pub column: u32,
    pub scope: ScopeRef,
    pub inlined_at: PackedOption<DebugLocId>,
}

impl DebugLoc {
    pub fn new(line: u32, column: u32, scope: ScopeRef) -> Self {
        Self {
            line,
            column,
            scope,
            inlined_at: None.into(),
        }
    }

    pub fn inlined(line: u32, column: u32, scope: ScopeRef, inlined_at: DebugLocId) -> Self {
        Self {
            line,
            column,
            scope,
            inlined_at: inlined_at.into(),
        }
    }
}
