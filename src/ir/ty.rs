//! Closed type tag set for IR expressions.

use core::fmt;

/// The type of an IR expression or temporary.
///
/// This is a closed enumeration: every [`crate::ir::expr::Expr`] has exactly
/// one `IrType`, determinable statically from its constructor and operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IrType {
    /// 1-bit boolean-ish integer, used for guards and comparison results.
    I1,
    /// 8-bit integer.
    I8,
    /// 16-bit integer.
    I16,
    /// 32-bit integer.
    I32,
    /// 64-bit integer.
    I64,
    /// 128-bit integer.
    I128,
    /// IEEE-754 single precision float.
    F32,
    /// IEEE-754 double precision float.
    F64,
    /// 128-bit vector register value.
    V128,
    /// 256-bit vector register value.
    V256,
    /// 512-bit vector register value.
    V512,
}

impl IrType {
    /// Size of a value of this type, in bytes.
    pub const fn byte_size(self) -> usize {
        match self {
            IrType::I1 => 1,
            IrType::I8 => 1,
            IrType::I16 => 2,
            IrType::I32 => 4,
            IrType::I64 => 8,
            IrType::I128 => 16,
            IrType::F32 => 4,
            IrType::F64 => 8,
            IrType::V128 => 16,
            IrType::V256 => 32,
            IrType::V512 => 64,
        }
    }

    /// Whether this is one of the plain integer widths (excludes `I1`).
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            IrType::I8 | IrType::I16 | IrType::I32 | IrType::I64 | IrType::I128
        )
    }

    /// Whether this is a vector width.
    pub const fn is_vector(self) -> bool {
        matches!(self, IrType::V128 | IrType::V256 | IrType::V512)
    }

    /// Whether this is a floating-point width.
    pub const fn is_float(self) -> bool {
        matches!(self, IrType::F32 | IrType::F64)
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IrType::I1 => "I1",
            IrType::I8 => "I8",
            IrType::I16 => "I16",
            IrType::I32 => "I32",
            IrType::I64 => "I64",
            IrType::I128 => "I128",
            IrType::F32 => "F32",
            IrType::F64 => "F64",
            IrType::V128 => "V128",
            IrType::V256 => "V256",
            IrType::V512 => "V512",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_sizes_match_width_names() {
        assert_eq!(IrType::I1.byte_size(), 1);
        assert_eq!(IrType::I64.byte_size(), 8);
        assert_eq!(IrType::V256.byte_size(), 32);
        assert_eq!(IrType::V512.byte_size(), 64);
    }

    #[test]
    fn classification_is_exclusive() {
        for ty in [
            IrType::I1,
            IrType::I8,
            IrType::I16,
            IrType::I32,
            IrType::I64,
            IrType::I128,
            IrType::F32,
            IrType::F64,
            IrType::V128,
            IrType::V256,
            IrType::V512,
        ] {
            let flags = [ty.is_integer(), ty.is_vector(), ty.is_float()]
                .into_iter()
                .filter(|b| *b)
                .count();
            assert!(flags <= 1, "{ty:?} classified as more than one kind");
        }
    }
}
