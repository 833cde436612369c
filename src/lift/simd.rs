//! Vector mnemonic lowering: packed/scalar float moves and arithmetic,
//! and the packed-integer `PXOR`/`PADD*`/`PSUB*` family.
//!
//! Every operand here is read/written at `V128` regardless of the decoded
//! `Operand`'s own `width` field (`OperandSize` has no vector variant;
//! see `decode::xmm_operand`'s own note on this), since
//! [`crate::guest::Amd64Schema`] resolves an `"xmmN"` name's guest-state
//! type to `V128` directly.

use crate::decode::instr::{DecodedInstr, Mnemonic};
use crate::error::LiftBug;
use crate::guest::GuestSchema;
use crate::ir::expr::Expr;
use crate::ir::irsb::Irsb;
use crate::ir::op::BinaryOp;
use crate::ir::stmt::Stmt;
use crate::ir::ty::IrType;

use super::operand::{read_operand, write_operand};

fn binop_for(mnemonic: Mnemonic) -> Option<BinaryOp> {
    use Mnemonic::*;
    Some(match mnemonic {
        Addps => BinaryOp::Add32Fx4,
        Subps => BinaryOp::Sub32Fx4,
        Mulps => BinaryOp::Mul32Fx4,
        Divps => BinaryOp::Div32Fx4,
        Addss => BinaryOp::Add32F0x4,
        Subss => BinaryOp::Sub32F0x4,
        Mulss => BinaryOp::Mul32F0x4,
        Divss => BinaryOp::Div32F0x4,
        Addsd => BinaryOp::Add64F0x2,
        Subsd => BinaryOp::Sub64F0x2,
        Mulsd => BinaryOp::Mul64F0x2,
        Divsd => BinaryOp::Div64F0x2,
        Pxor => BinaryOp::XorV128,
        Paddb => BinaryOp::PAddB,
        Paddw => BinaryOp::PAddW,
        Paddd => BinaryOp::PAddD,
        Paddq => BinaryOp::PAddQ,
        Psubb => BinaryOp::PSubB,
        Psubw => BinaryOp::PSubW,
        Psubd => BinaryOp::PSubD,
        Psubq => BinaryOp::PSubQ,
        _ => return None,
    })
}

pub fn lift_simd(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    match instr.mnemonic {
        Mnemonic::Movaps | Mnemonic::Movups | Mnemonic::Movss | Mnemonic::Movsd => {
            lift_vector_move(irsb, schema, instr)
        }
        // No shuffle/permute primitive exists in the op algebra (no
        // byte-lane select, no concat-and-slice). Decoding still succeeds;
        // the lowering deliberately has no guest-state effect rather than
        // fabricate an op the IR model doesn't define.
        Mnemonic::Pshufb | Mnemonic::Palignr => Ok(()),
        other => {
            let op = binop_for(other).expect("dispatched only for recognized SIMD mnemonics");
            lift_vector_binop(irsb, schema, instr, op)
        }
    }
}

fn lift_vector_move(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    // MOVSS/MOVSD's real merge-into-low-lane semantics need a partial-lane
    // write the op algebra has no primitive for; this moves the full V128,
    // a documented simplification shared with MOVAPS/MOVUPS' exact semantics.
    let value = read_operand(schema, &instr.operands[1], IrType::V128, instr)?;
    for stmt in write_operand(schema, &instr.operands[0], value, instr, irsb)? {
        irsb.add(stmt)?;
    }
    Ok(())
}

fn lift_vector_binop(
    irsb: &mut Irsb,
    schema: &dyn GuestSchema,
    instr: &DecodedInstr,
    op: BinaryOp,
) -> Result<(), LiftBug> {
    let a = read_operand(schema, &instr.operands[0], IrType::V128, instr)?;
    let b = read_operand(schema, &instr.operands[1], IrType::V128, instr)?;
    let result = Expr::binop(op, a, b, irsb.temps())?;
    let t = irsb.new_temp(IrType::V128);
    irsb.add(Stmt::WrTmp { tmp: t, expr: result })?;
    for stmt in write_operand(schema, &instr.operands[0], Expr::RdTmp(t), instr, irsb)? {
        irsb.add(stmt)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::guest::Amd64Schema;

    fn lift_one(bytes: &[u8]) -> Irsb {
        let instr = decode(bytes, 0x5000).expect("decodes");
        let mut irsb = Irsb::new(0x5000);
        irsb.add(Stmt::IMark {
            addr: 0x5000,
            len: instr.length as u32,
            delta: 0,
        })
        .unwrap();
        crate::lift::lift_instruction(&mut irsb, &Amd64Schema, &instr).unwrap();
        irsb
    }

    #[test]
    fn pxor_self_zeroes_the_register() {
        // pxor xmm0, xmm0 -> 0F EF C0
        let irsb = lift_one(&[0x0F, 0xEF, 0xC0]);
        assert!(irsb.stmts().iter().any(|s| matches!(s, Stmt::Put { .. })));
    }

    #[test]
    fn movaps_copies_the_full_vector() {
        // movaps xmm1, xmm0 -> 0F 28 C8
        let irsb = lift_one(&[0x0F, 0x28, 0xC8]);
        assert!(irsb.stmts().iter().any(|s| matches!(s, Stmt::Put { .. })));
    }

    #[test]
    fn pshufb_decodes_with_no_guest_state_effect() {
        // pshufb xmm0, xmm1 -> 0F 38 00 C1
        let irsb = lift_one(&[0x0F, 0x38, 0x00, 0xC1]);
        assert_eq!(irsb.instruction_count(), 1);
        assert!(!irsb.stmts().iter().any(|s| matches!(s, Stmt::Put { .. })));
    }
}
