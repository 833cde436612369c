//! Component D: per-mnemonic lowering from [`crate::decode::instr::DecodedInstr`]
//! into [`crate::ir::irsb::Irsb`] statements.
//!
//! Dispatch mirrors the reference interpreter's own style: one big `match`
//! on the mnemonic, delegating to a family-specific module. Every lowering
//! starts with an `IMark` so the IRSB's IMark-first invariant holds, and
//! ends by updating `next`/`jump_kind` only for block-terminating mnemonics
//! (the driver leaves non-terminating instructions' fall-through implicit).

pub mod alu;
pub mod control_flow;
pub mod flags;
pub mod memops;
pub mod operand;
pub mod simd;

use tracing::trace;

use crate::decode::instr::{DecodedInstr, Mnemonic, OperandSize, RegisterOperand};
use crate::error::LiftBug;
use crate::guest::{Amd64Schema, GuestSchema};
use crate::ir::irsb::Irsb;
use crate::ir::stmt::Stmt;

/// Build the `RegisterOperand` for the accumulator GPR at a given width
/// (`al`/`ax`/`eax`/`rax`), used by the one-operand `MUL`/`IMUL`/`DIV`/`IDIV`
/// forms whose implicit operand the decoder does not materialize.
pub(crate) fn operand_reg(index: u8, width: OperandSize) -> RegisterOperand {
    let name = match width {
        OperandSize::Qword => Amd64Schema::gpr64_name(index),
        OperandSize::Dword => Amd64Schema::gpr32_name(index),
        OperandSize::Word => Amd64Schema::gpr16_name(index),
        OperandSize::Byte => Amd64Schema::gpr8_name(index),
    };
    RegisterOperand { name, width }
}

/// Lower one decoded instruction into `irsb`, which must already have had
/// its `IMark` appended by the caller (the driver owns address bookkeeping
/// across a whole block, so it issues `IMark`s itself; see
/// [`crate::driver::lift_block`]).
#[tracing::instrument(level = "trace", skip(irsb, schema, instr), fields(mnemonic = %instr.mnemonic))]
pub fn lift_instruction(
    irsb: &mut Irsb,
    schema: &dyn GuestSchema,
    instr: &DecodedInstr,
) -> Result<(), LiftBug> {
    trace!(address = instr.address, length = instr.length, "lifting instruction");
    use Mnemonic::*;
    match instr.mnemonic {
        Add | Sub | And | Or | Xor | Cmp | Test => alu::lift_basic_alu(irsb, schema, instr),
        Adc | Sbb => alu::lift_adc_sbb(irsb, schema, instr),
        Inc | Dec => alu::lift_inc_dec(irsb, schema, instr),
        Neg | Not => alu::lift_neg_not(irsb, schema, instr),
        Mul => alu::lift_mul_imul_unary(irsb, schema, instr),
        Imul if instr.operands.len() == 1 => alu::lift_mul_imul_unary(irsb, schema, instr),
        Imul => memops::lift_imul_multi_operand(irsb, schema, instr),
        Div | Idiv => alu::lift_div_idiv_unary(irsb, schema, instr),
        Shl | Shr | Sar | Rol | Ror => alu::lift_shift_rotate(irsb, schema, instr),
        Mov => memops::lift_mov(irsb, schema, instr),
        MovZx | MovSx => memops::lift_movx(irsb, schema, instr),
        Lea => memops::lift_lea(irsb, schema, instr),
        Push => memops::lift_push(irsb, schema, instr),
        Pop => memops::lift_pop(irsb, schema, instr),
        Xchg => memops::lift_xchg(irsb, schema, instr),
        Cmovcc => control_flow::lift_cmovcc(irsb, schema, instr),
        Setcc => control_flow::lift_setcc(irsb, schema, instr),
        Jmp => control_flow::lift_jmp(irsb, schema, instr),
        JmpCc => control_flow::lift_jmpcc(irsb, schema, instr),
        Call => control_flow::lift_call(irsb, schema, instr),
        Ret | Retf => control_flow::lift_ret(irsb, schema, instr),
        Leave => control_flow::lift_leave(irsb, schema, instr),
        Int3 => control_flow::lift_trap(irsb, instr, crate::ir::stmt::JumpKind::SigTrap),
        Into => control_flow::lift_trap(irsb, instr, crate::ir::stmt::JumpKind::SigTrap),
        Int => control_flow::lift_trap(irsb, instr, crate::ir::stmt::JumpKind::SigTrap),
        Ud2 => control_flow::lift_trap(irsb, instr, crate::ir::stmt::JumpKind::SigIll),
        Syscall => control_flow::lift_syscall(irsb, schema, instr),
        Hlt => control_flow::lift_trap(irsb, instr, crate::ir::stmt::JumpKind::NoDecode),
        Swapgs => control_flow::lift_trap(irsb, instr, crate::ir::stmt::JumpKind::Privileged),
        Nop | Cld | Std | Clc | Stc => lift_flag_or_noop(irsb, instr),
        Movaps | Movups | Movss | Movsd | Addps | Addsd | Addss | Subps | Subsd | Subss
        | Mulps | Mulsd | Mulss | Divps | Divsd | Divss | Pxor | Paddb | Paddw | Paddd | Paddq
        | Psubb | Psubw | Psubd | Psubq | Pshufb | Palignr => simd::lift_simd(irsb, schema, instr),
    }
}

/// `NOP` does nothing; `CLD`/`STD`/`CLC`/`STC` each set one scalar sticky
/// flag outside the lazy `CC_*` quadruple (spec §6: `DFLAG`/`ACFLAG` carry
/// their own state since they are read far more often than they are
/// written, unlike the ALU condition flags).
fn lift_flag_or_noop(irsb: &mut Irsb, instr: &DecodedInstr) -> Result<(), LiftBug> {
    use crate::guest::amd64::OFFSET_DFLAG;
    use crate::ir::expr::{ConstValue, Expr};
    match instr.mnemonic {
        Mnemonic::Cld => irsb.add(Stmt::Put {
            offset: OFFSET_DFLAG,
            value: Expr::konst(ConstValue::I64(1)),
        }),
        Mnemonic::Std => irsb.add(Stmt::Put {
            offset: OFFSET_DFLAG,
            value: Expr::konst(ConstValue::I64(u64::MAX)),
        }),
        Mnemonic::Clc | Mnemonic::Stc => {
            use crate::ir::op::{BinaryOp, Callee};
            let all_flags = crate::guest::ccop::calc_flag(Callee::CalcAllFlags);
            let new_flags = if instr.mnemonic == Mnemonic::Stc {
                Expr::Binop(BinaryOp::Or64, Box::new(all_flags), Box::new(Expr::konst(ConstValue::I64(1))))
            } else {
                Expr::Binop(
                    BinaryOp::And64,
                    Box::new(all_flags),
                    Box::new(Expr::konst(ConstValue::I64(!1u64))),
                )
            };
            let (off_op, off_dep1, off_dep2, off_ndep) = crate::guest::ccop::OFFSETS;
            irsb.add(Stmt::Put {
                offset: off_op,
                value: Expr::konst(ConstValue::I64(crate::guest::CcOp::Copy as u64)),
            })?;
            irsb.add(Stmt::Put { offset: off_dep1, value: new_flags })?;
            irsb.add(Stmt::Put { offset: off_dep2, value: Expr::konst(ConstValue::I64(0)) })?;
            irsb.add(Stmt::Put { offset: off_ndep, value: Expr::konst(ConstValue::I64(0)) })
        }
        _ => Ok(()),
    }
}
