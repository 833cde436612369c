//! Crate-wide error taxonomy.
//!
//! Two families, per the error-handling design: recoverable conditions that
//! a caller is expected to encounter on ordinary malformed input
//! ([`DecodeError`]), and internal-consistency violations that indicate a
//! bug in the decoder/lifter rather than bad guest input ([`LiftBug`]).
//! `DecodeError` is recovered locally by [`crate::decode::decode`], which
//! turns it into `None` at its public boundary; `LiftBug` propagates to the
//! caller because no correct mnemonic/op-table combination should ever
//! produce one.

use derive_more::Display;

use crate::ir::ty::IrType;

/// Malformed bytes, a truncated stream, or an unknown opcode cell.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum DecodeError {
    /// Fewer bytes remained in the buffer than the encoding required.
    #[display(fmt = "truncated instruction stream at offset {offset}")]
    Truncated {
        /// Byte offset, relative to the decode call's `position`, where the read failed.
        offset: usize,
    },
    /// The opcode byte(s), once prefixes and maps are resolved, name no
    /// known mnemonic.
    #[display(fmt = "unknown opcode byte 0x{byte:02x} in map {map:?}")]
    UnknownOpcode {
        /// The opcode byte that failed to resolve.
        byte: u8,
        /// Which opcode map it was read from.
        map: OpcodeMap,
    },
    /// A group opcode's ModR/M `reg` field selected a sub-encoding with no
    /// defined mnemonic.
    #[display(fmt = "invalid group sub-encoding: group {group}, reg field {reg_field}")]
    InvalidGroupEncoding {
        /// Which instruction group (1/2/3/5/7/8/9/15/16).
        group: u8,
        /// The ModR/M `reg` field value that had no table entry.
        reg_field: u8,
    },
    /// A VEX/EVEX `pp`-indexed table cell was empty for the decoded map/opcode pair.
    #[display(fmt = "no AVX mnemonic for pp={pp:?} in map {map:?} opcode 0x{opcode:02x}")]
    EmptyVexCell {
        /// The VEX/EVEX `pp` field.
        pp: u8,
        /// Opcode map the lookup was performed in.
        map: OpcodeMap,
        /// Opcode byte.
        opcode: u8,
    },
    /// ModR/M byte selected an addressing mode the decoder does not model.
    #[display(fmt = "invalid ModR/M encoding")]
    InvalidModRm,
}

/// Which opcode map a byte was read from, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcodeMap {
    /// One-byte primary opcode map.
    OneByte,
    /// Two-byte map introduced by a `0x0F` escape.
    TwoByte,
    /// Three-byte map introduced by `0x0F 0x38`.
    ThreeByte38,
    /// Three-byte map introduced by `0x0F 0x3A`.
    ThreeByte3A,
}

/// Internal-consistency violations: programmer errors, not runtime conditions.
///
/// None of these should ever be observed from a well-formed decode feeding a
/// correctly implemented lifter; if one surfaces, it indicates a bug in the
/// op-signature table, the guest-state schema, or the IRSB bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum LiftBug {
    /// A constructor was asked to build an expression or statement whose
    /// operand types do not match the operator's fixed signature.
    #[display(fmt = "ill-typed IR construction: expected {expected}, found {found}")]
    IrTypeError {
        /// The type the signature required.
        expected: IrType,
        /// The type that was actually supplied.
        found: IrType,
    },
    /// A guest-state schema lookup named a register the schema does not define.
    #[display(fmt = "unknown guest register: {name}")]
    UnknownRegister {
        /// The register name that failed to resolve.
        name: String,
    },
    /// A temp was defined more than once, or read before being defined.
    #[display(fmt = "{_0}")]
    InvariantViolation(InvariantViolation),
}

/// A specific IRSB well-formedness invariant that was violated.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum InvariantViolation {
    /// [`crate::ir::stmt::Stmt::WrTmp`] issued for a temp that already has a definition.
    #[display(fmt = "temp t{_0} assigned more than once")]
    DoubleDefinition(u32),
    /// [`crate::ir::expr::Expr::RdTmp`] referenced a temp with no prior `WrTmp` in the block.
    #[display(fmt = "temp t{_0} read before being defined")]
    ReadBeforeDefinition(u32),
    /// A statement was appended before the first `IMark` of the block.
    #[display(fmt = "statement appended with no preceding IMark")]
    MissingImark,
}

impl From<InvariantViolation> for LiftBug {
    fn from(v: InvariantViolation) -> Self {
        LiftBug::InvariantViolation(v)
    }
}
