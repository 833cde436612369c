//! The guest-state schema contract (component B).

use crate::error::LiftBug;
use crate::ir::ty::IrType;

/// A per-architecture, compile-time-constant map from register names to
/// `(offset, type)` pairs, plus the precise-exception ranges the lifter
/// must consult before emitting a memory access.
///
/// Implementations are plain data + pure functions — no virtual dispatch,
/// no mutable state. A single process may hold any number of schemas
/// (typically one per supported guest architecture) and share them freely
/// across threads, since nothing here is ever mutated after construction.
pub trait GuestSchema: Sync {
    /// Byte offset of `name` within the guest-state region.
    fn offset_of(&self, name: &str) -> Result<u32, LiftBug>;

    /// IR type of `name`'s value.
    fn type_of(&self, name: &str) -> Result<IrType, LiftBug>;

    /// Whether any memory access overlapping the half-open byte range
    /// `[lo, hi)` of guest state must take the conservative (precise
    /// exception) path downstream — true for the stack pointer, frame
    /// pointer, and instruction pointer ranges.
    fn requires_precise_exceptions(&self, lo: u32, hi: u32) -> bool;

    /// Total size of the guest-state region, in bytes.
    fn state_size(&self) -> u32;
}

pub(crate) fn unknown_register(name: &str) -> LiftBug {
    LiftBug::UnknownRegister {
        name: name.to_string(),
    }
}
