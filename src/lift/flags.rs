//! Lazy-flag emission: after an ALU op, write the `(CC_OP, CC_DEP1,
//! CC_DEP2, CC_NDEP)` quadruple instead of computing Z/S/C/O/P/A eagerly.
//! Consumers that need a flag reconstruct it via [`crate::guest::ccop::calc_flag`]
//! or [`crate::guest::ccop::calc_condition`].

use crate::error::LiftBug;
use crate::guest::ccop::OFFSETS;
use crate::guest::CcOp;
use crate::ir::expr::{ConstValue, Expr};
use crate::ir::irsb::Irsb;
use crate::ir::op::UnaryOp;
use crate::ir::stmt::Stmt;
use crate::ir::ty::IrType;

/// Zero-extend `value` (of type `ty`) to `I64` for storage in a `CC_*` slot.
/// The lazy-flag quadruple is always `I64`-typed regardless of the
/// operation's actual operand width (spec §6).
pub fn widen_to_i64(value: Expr, ty: IrType, irsb: &Irsb) -> Result<Expr, LiftBug> {
    let op = match ty {
        IrType::I64 => return Ok(value),
        IrType::I8 => UnaryOp::ZeroExt8to64,
        IrType::I16 => UnaryOp::ZeroExt16to64,
        IrType::I32 => UnaryOp::ZeroExt32to64,
        IrType::I1 => UnaryOp::Ext1to64,
        other => {
            return Err(LiftBug::IrTypeError {
                expected: IrType::I64,
                found: other,
            })
        }
    };
    Expr::unop(op, value, irsb.temps())
}

/// Emit the four `Put`s that record a flag-affecting operation's lazy-flag
/// state. `dep1`/`dep2`/`ndep` must already be `I64`-typed (see
/// [`widen_to_i64`]); `ndep` is the flag bits the new `cc_op` does not
/// itself determine (e.g. the incoming carry for `ADC`/`SBB`, preserved
/// verbatim for `INC`/`DEC`).
pub fn emit_flags(
    irsb: &mut Irsb,
    cc_op: CcOp,
    dep1: Expr,
    dep2: Expr,
    ndep: Expr,
) -> Result<(), LiftBug> {
    let (off_op, off_dep1, off_dep2, off_ndep) = OFFSETS;
    irsb.add(Stmt::Put {
        offset: off_op,
        value: Expr::konst(ConstValue::I64(cc_op as u64)),
    })?;
    irsb.add(Stmt::Put {
        offset: off_dep1,
        value: dep1,
    })?;
    irsb.add(Stmt::Put {
        offset: off_dep2,
        value: dep2,
    })?;
    irsb.add(Stmt::Put {
        offset: off_ndep,
        value: ndep,
    })?;
    Ok(())
}

/// The "no second operand" zero used for flag families that don't need
/// `CC_DEP2` (logic-unary ops, `NEG`).
pub fn zero_i64() -> Expr {
    Expr::konst(ConstValue::I64(0))
}

/// Read the current lazy-flag `cc_op`'s dependent-on-old-carry slot, used by
/// `INC`/`DEC` (which must not disturb `CF`) to preserve the previous
/// `CC_NDEP`. Implemented as a read of `CC_NDEP` itself: since `INC`/`DEC`
/// never change it, carrying the old value forward is exactly correct.
pub fn preserved_ndep() -> Expr {
    let (_, _, _, off_ndep) = OFFSETS;
    Expr::get(off_ndep, IrType::I64)
}
