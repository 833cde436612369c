//! The per-block temporary type table.

use crate::ir::expr::TempId;
use crate::ir::ty::IrType;

/// Append-only table mapping each [`TempId`] to its fixed [`IrType`].
///
/// Temps are dense integer identifiers assigned in allocation order, so
/// `type_of` is a direct index into a `Vec` — O(1) as required by the
/// contract.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TempTable {
    types: Vec<IrType>,
}

impl TempTable {
    /// An empty table.
    pub fn new() -> Self {
        Self { types: Vec::new() }
    }

    /// Allocate a new temp of the given type and return its id.
    pub fn alloc(&mut self, ty: IrType) -> TempId {
        let id = TempId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    /// O(1) type lookup. Panics if `t` was not allocated from this table —
    /// that is an internal bug (temps never outlive their owning IRSB).
    pub fn type_of(&self, t: TempId) -> IrType {
        self.types[t.0 as usize]
    }

    /// Number of temps allocated so far.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether any temps have been allocated.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_assigns_dense_ids_in_order() {
        let mut table = TempTable::new();
        let t0 = table.alloc(IrType::I64);
        let t1 = table.alloc(IrType::I32);
        assert_eq!(t0, TempId(0));
        assert_eq!(t1, TempId(1));
        assert_eq!(table.type_of(t0), IrType::I64);
        assert_eq!(table.type_of(t1), IrType::I32);
        assert_eq!(table.len(), 2);
    }
}
