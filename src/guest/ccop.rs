//! Lazy-flag encoding for AMD64: the `CC_OP` enumeration and the pure
//! expressions that re-derive Z/S/C/O/P/A from the `(CC_OP, CC_DEP1,
//! CC_DEP2, CC_NDEP)` quadruple on demand.
//!
//! The `CC_OP` enumeration values and the reconstruction formulas are
//! normative (spec §6): consumers that share the reference IR model expect
//! `Copy == 0` followed by the `Add/Sub/Logic/Inc/Dec/Shl/Shr/Sar/Rol/Ror/
//! Adc/Sbb/Neg/Mul` families in byte/word/long/quad order, exactly as laid
//! out here.

use crate::guest::amd64::{OFFSET_CC_DEP1, OFFSET_CC_DEP2, OFFSET_CC_NDEP, OFFSET_CC_OP};
use crate::ir::expr::{ConstValue, Expr};
use crate::ir::op::Callee;
use crate::ir::ty::IrType;

/// Tags the last flag-affecting operation. Numeric values are normative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[repr(u64)]
pub enum CcOp {
    /// `CC_DEP1` already holds the flag bits verbatim.
    Copy = 0,
    AddB,
    AddW,
    AddL,
    AddQ,
    SubB,
    SubW,
    SubL,
    SubQ,
    LogicB,
    LogicW,
    LogicL,
    LogicQ,
    IncB,
    IncW,
    IncL,
    IncQ,
    DecB,
    DecW,
    DecL,
    DecQ,
    ShlB,
    ShlW,
    ShlL,
    ShlQ,
    ShrB,
    ShrW,
    ShrL,
    ShrQ,
    SarB,
    SarW,
    SarL,
    SarQ,
    RolB,
    RolW,
    RolL,
    RolQ,
    RorB,
    RorW,
    RorL,
    RorQ,
    AdcB,
    AdcW,
    AdcL,
    AdcQ,
    SbbB,
    SbbW,
    SbbL,
    SbbQ,
    NegB,
    NegW,
    NegL,
    NegQ,
    MulB,
    MulW,
    MulL,
    MulQ,
}

/// The branch/`SETcc`/`CMOVcc` condition codes, numbered per the x86 `Jcc`
/// opcode low nibble (`0x70 + code` and `0x0F 0x80 + code`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Overflow = 0x0,
    NotOverflow = 0x1,
    Below = 0x2,
    AboveOrEqual = 0x3,
    Equal = 0x4,
    NotEqual = 0x5,
    BelowOrEqual = 0x6,
    Above = 0x7,
    Sign = 0x8,
    NotSign = 0x9,
    Parity = 0xA,
    NotParity = 0xB,
    Less = 0xC,
    GreaterOrEqual = 0xD,
    LessOrEqual = 0xE,
    Greater = 0xF,
}

impl Condition {
    /// Decode a `Jcc`/`SETcc`/`CMOVcc` condition nibble.
    pub fn from_nibble(n: u8) -> Condition {
        use Condition::*;
        match n & 0xF {
            0x0 => Overflow,
            0x1 => NotOverflow,
            0x2 => Below,
            0x3 => AboveOrEqual,
            0x4 => Equal,
            0x5 => NotEqual,
            0x6 => BelowOrEqual,
            0x7 => Above,
            0x8 => Sign,
            0x9 => NotSign,
            0xA => Parity,
            0xB => NotParity,
            0xC => Less,
            0xD => GreaterOrEqual,
            0xE => LessOrEqual,
            _ => Greater,
        }
    }
}

fn get_cc(offset: u32) -> Expr {
    Expr::get(offset, IrType::I64)
}

/// The four `CC_*` reads, as expressions, for use as `CCall` arguments.
pub fn cc_quadruple() -> [Expr; 4] {
    [
        get_cc(OFFSET_CC_OP),
        get_cc(OFFSET_CC_DEP1),
        get_cc(OFFSET_CC_DEP2),
        get_cc(OFFSET_CC_NDEP),
    ]
}

/// Build the pure expression that re-derives a single flag bit from the
/// lazy-flag quadruple. Flag-dependent consumers (conditional branches,
/// `SETcc`, `CMOVcc`) use this instead of reading a materialized flag
/// register, so unused flags are eliminable downstream.
pub fn calc_flag(callee: Callee) -> Expr {
    let [op, dep1, dep2, ndep] = cc_quadruple();
    Expr::ccall(callee, vec![op, dep1, dep2, ndep])
        .expect("CC_* reads are always well-typed I64 Gets")
}

/// Build the pure expression for a full `Jcc`/`SETcc`/`CMOVcc` condition
/// test, given the condition code. This is the normal path; the
/// single-flag `calc_flag` helpers exist for conditions that need just one
/// bit without paying for the combined-condition helper's dispatch.
pub fn calc_condition(cond: Condition) -> Expr {
    let [op, dep1, dep2, ndep] = cc_quadruple();
    let cond_expr = Expr::konst(ConstValue::I64(cond as u64));
    Expr::ccall(Callee::CalcCondition, vec![op, dep1, dep2, ndep, cond_expr])
        .expect("CC_* reads and the condition constant are always well-typed")
}

/// Which `CcOp` family (and width) a given ALU mnemonic with the given
/// operand byte-width produces.
pub fn cc_op_for_add(width_bytes: u32) -> CcOp {
    match width_bytes {
        1 => CcOp::AddB,
        2 => CcOp::AddW,
        4 => CcOp::AddL,
        _ => CcOp::AddQ,
    }
}

pub fn cc_op_for_sub(width_bytes: u32) -> CcOp {
    match width_bytes {
        1 => CcOp::SubB,
        2 => CcOp::SubW,
        4 => CcOp::SubL,
        _ => CcOp::SubQ,
    }
}

pub fn cc_op_for_logic(width_bytes: u32) -> CcOp {
    match width_bytes {
        1 => CcOp::LogicB,
        2 => CcOp::LogicW,
        4 => CcOp::LogicL,
        _ => CcOp::LogicQ,
    }
}

pub fn cc_op_for_inc(width_bytes: u32) -> CcOp {
    match width_bytes {
        1 => CcOp::IncB,
        2 => CcOp::IncW,
        4 => CcOp::IncL,
        _ => CcOp::IncQ,
    }
}

pub fn cc_op_for_dec(width_bytes: u32) -> CcOp {
    match width_bytes {
        1 => CcOp::DecB,
        2 => CcOp::DecW,
        4 => CcOp::DecL,
        _ => CcOp::DecQ,
    }
}

/// Which shift `CcOp` family a mnemonic maps to: `Shl` for left shifts,
/// `Sar` for the arithmetic right shift, `Shr` for the logical right shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftKind {
    Left,
    LogicalRight,
    ArithmeticRight,
}

pub fn cc_op_for_shift(width_bytes: u32, kind: ShiftKind) -> CcOp {
    use ShiftKind::*;
    match (width_bytes, kind) {
        (1, Left) => CcOp::ShlB,
        (2, Left) => CcOp::ShlW,
        (4, Left) => CcOp::ShlL,
        (_, Left) => CcOp::ShlQ,
        (1, LogicalRight) => CcOp::ShrB,
        (2, LogicalRight) => CcOp::ShrW,
        (4, LogicalRight) => CcOp::ShrL,
        (_, LogicalRight) => CcOp::ShrQ,
        (1, ArithmeticRight) => CcOp::SarB,
        (2, ArithmeticRight) => CcOp::SarW,
        (4, ArithmeticRight) => CcOp::SarL,
        (_, ArithmeticRight) => CcOp::SarQ,
    }
}

/// `ROL`/`ROR` flag family. Unlike the shift families, x86 rotates only
/// ever touch `CF` (and `OF` for single-bit rotates); the lazy-flag helper
/// still routes through the same `CcOp`-tagged quadruple scheme for
/// consistency, using the dedicated `Rol*`/`Ror*` tags.
pub fn cc_op_for_rotate(width_bytes: u32, is_ror: bool) -> CcOp {
    match (width_bytes, is_ror) {
        (1, false) => CcOp::RolB,
        (2, false) => CcOp::RolW,
        (4, false) => CcOp::RolL,
        (_, false) => CcOp::RolQ,
        (1, true) => CcOp::RorB,
        (2, true) => CcOp::RorW,
        (4, true) => CcOp::RorL,
        (_, true) => CcOp::RorQ,
    }
}

pub fn cc_op_for_adc(width_bytes: u32) -> CcOp {
    match width_bytes {
        1 => CcOp::AdcB,
        2 => CcOp::AdcW,
        4 => CcOp::AdcL,
        _ => CcOp::AdcQ,
    }
}

pub fn cc_op_for_sbb(width_bytes: u32) -> CcOp {
    match width_bytes {
        1 => CcOp::SbbB,
        2 => CcOp::SbbW,
        4 => CcOp::SbbL,
        _ => CcOp::SbbQ,
    }
}

pub fn cc_op_for_neg(width_bytes: u32) -> CcOp {
    match width_bytes {
        1 => CcOp::NegB,
        2 => CcOp::NegW,
        4 => CcOp::NegL,
        _ => CcOp::NegQ,
    }
}

/// Offset helper re-exported for lifter code that writes the lazy-flag
/// quadruple directly; kept here rather than in `amd64` so flag-writing call
/// sites only need one `use`.
pub const OFFSETS: (u32, u32, u32, u32) = (
    OFFSET_CC_OP,
    OFFSET_CC_DEP1,
    OFFSET_CC_DEP2,
    OFFSET_CC_NDEP,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cc_op_is_copy_zero() {
        assert_eq!(CcOp::Copy as u64, 0);
        assert_eq!(CcOp::AddB as u64, 1);
    }

    #[test]
    fn condition_round_trips_through_nibble() {
        for n in 0u8..16 {
            let cond = Condition::from_nibble(n);
            assert_eq!(cond as u8, n);
        }
    }

    #[test]
    fn calc_condition_builds_a_ccall_with_five_args() {
        let e = calc_condition(Condition::Equal);
        match e {
            Expr::CCall { callee, args, ret_ty } => {
                assert_eq!(callee, Callee::CalcCondition);
                assert_eq!(args.len(), 5);
                assert_eq!(ret_ty, IrType::I1);
            }
            _ => panic!("expected CCall"),
        }
    }
}
