//! Control-transfer mnemonic lowering: conditional moves/sets, jumps,
//! calls, returns, and the trap-class mnemonics that terminate a block
//! without a normal fall-through.

use crate::decode::instr::DecodedInstr;
use crate::error::LiftBug;
use crate::guest::ccop::calc_condition;
use crate::guest::GuestSchema;
use crate::ir::expr::{ConstValue, Expr};
use crate::ir::irsb::Irsb;
use crate::ir::op::{BinaryOp, UnaryOp};
use crate::ir::stmt::{JumpKind, Stmt};
use crate::ir::ty::IrType;

use super::operand::{effective_width, read_operand, width_to_type, write_operand};

fn condition_of(instr: &DecodedInstr) -> crate::guest::ccop::Condition {
    instr
        .condition
        .expect("Cmovcc/Setcc/JmpCc always carry a decoded condition")
}

pub fn lift_cmovcc(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    let width = effective_width(instr);
    let ty = width_to_type(width);
    let dest_cur = read_operand(schema, &instr.operands[0], ty, instr)?;
    let src = read_operand(schema, &instr.operands[1], ty, instr)?;
    let cond = calc_condition(condition_of(instr));
    let result = Expr::ite(cond, src, dest_cur, irsb.temps())?;
    let t = irsb.new_temp(ty);
    irsb.add(Stmt::WrTmp { tmp: t, expr: result })?;
    for stmt in write_operand(schema, &instr.operands[0], Expr::RdTmp(t), instr, irsb)? {
        irsb.add(stmt)?;
    }
    Ok(())
}

pub fn lift_setcc(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    let cond = calc_condition(condition_of(instr));
    let widened = Expr::unop(UnaryOp::Ext1to8, cond, irsb.temps())?;
    let t = irsb.new_temp(IrType::I8);
    irsb.add(Stmt::WrTmp { tmp: t, expr: widened })?;
    for stmt in write_operand(schema, &instr.operands[0], Expr::RdTmp(t), instr, irsb)? {
        irsb.add(stmt)?;
    }
    Ok(())
}

pub fn lift_jmp(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    let target = read_operand(schema, &instr.operands[0], IrType::I64, instr)?;
    irsb.next = target;
    irsb.jump_kind = JumpKind::Boring;
    Ok(())
}

/// `Jcc`: a side exit to a known constant address when the condition holds,
/// falling through otherwise. The block keeps lifting after this — `JmpCc`
/// is not in [`crate::decode::instr::Mnemonic::is_block_terminator`]'s set —
/// so `irsb.next`/`irsb.jump_kind` are left for the driver to set once it
/// reaches this block's actual terminator.
pub fn lift_jmpcc(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    let target = read_operand(schema, &instr.operands[0], IrType::I64, instr)?;
    let guard = calc_condition(condition_of(instr));
    irsb.add(Stmt::Exit {
        guard,
        jump_kind: JumpKind::Boring,
        target,
    })
}

fn push_return_address(irsb: &mut Irsb, schema: &dyn GuestSchema, return_addr: u64) -> Result<(), LiftBug> {
    let rsp_off = schema.offset_of("rsp")?;
    let new_rsp_expr = Expr::binop(
        BinaryOp::Sub64,
        Expr::get(rsp_off, IrType::I64),
        Expr::konst(ConstValue::I64(8)),
        irsb.temps(),
    )?;
    let t = irsb.new_temp(IrType::I64);
    irsb.add(Stmt::WrTmp { tmp: t, expr: new_rsp_expr })?;
    let new_rsp = Expr::RdTmp(t);
    irsb.add(Stmt::StoreLE {
        addr: new_rsp.clone(),
        value: Expr::konst(ConstValue::I64(return_addr)),
    })?;
    irsb.add(Stmt::Put { offset: rsp_off, value: new_rsp })
}

pub fn lift_call(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    let target = read_operand(schema, &instr.operands[0], IrType::I64, instr)?;
    let return_addr = instr.address.wrapping_add(instr.length as u64);
    push_return_address(irsb, schema, return_addr)?;
    irsb.next = target;
    irsb.jump_kind = JumpKind::Call;
    Ok(())
}

/// `RET`/`RETF`. The `0xC2 imm16` form additionally deallocates `imm16`
/// bytes of caller-supplied stack arguments; `RETF`'s far-return semantics
/// (separate code-segment pop) are out of this milestone's flat-address
/// model and are lowered identically to a near `RET`.
pub fn lift_ret(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    let rsp_off = schema.offset_of("rsp")?;
    let old_rsp = Expr::get(rsp_off, IrType::I64);
    let t = irsb.new_temp(IrType::I64);
    irsb.add(Stmt::WrTmp {
        tmp: t,
        expr: Expr::load_le(IrType::I64, old_rsp, irsb.temps())?,
    })?;
    irsb.next = Expr::RdTmp(t);
    irsb.jump_kind = JumpKind::Ret;

    let extra = match instr.operands.first() {
        Some(crate::decode::instr::Operand::Immediate { value, .. }) => *value as u64,
        _ => 0,
    };
    let new_rsp = Expr::binop(
        BinaryOp::Add64,
        Expr::get(rsp_off, IrType::I64),
        Expr::konst(ConstValue::I64(8 + extra)),
        irsb.temps(),
    )?;
    irsb.add(Stmt::Put { offset: rsp_off, value: new_rsp })
}

pub fn lift_leave(irsb: &mut Irsb, schema: &dyn GuestSchema, _instr: &DecodedInstr) -> Result<(), LiftBug> {
    let rsp_off = schema.offset_of("rsp")?;
    let rbp_off = schema.offset_of("rbp")?;
    irsb.add(Stmt::Put {
        offset: rsp_off,
        value: Expr::get(rbp_off, IrType::I64),
    })?;
    let t = irsb.new_temp(IrType::I64);
    irsb.add(Stmt::WrTmp {
        tmp: t,
        expr: Expr::load_le(IrType::I64, Expr::get(rsp_off, IrType::I64), irsb.temps())?,
    })?;
    irsb.add(Stmt::Put { offset: rbp_off, value: Expr::RdTmp(t) })?;
    let new_rsp = Expr::binop(
        BinaryOp::Add64,
        Expr::get(rsp_off, IrType::I64),
        Expr::konst(ConstValue::I64(8)),
        irsb.temps(),
    )?;
    irsb.add(Stmt::Put { offset: rsp_off, value: new_rsp })
}

/// Shared lowering for the mnemonics that terminate a block via a trap
/// rather than an ordinary jump: `INT3`/`INTO`/`INT`/`UD2`/`HLT`/`SWAPGS`.
/// `next` points at the following instruction, matching the reference
/// model's convention for a block that traps out without resuming normally
/// within this IRSB.
pub fn lift_trap(irsb: &mut Irsb, instr: &DecodedInstr, jump_kind: JumpKind) -> Result<(), LiftBug> {
    let fallthrough = instr.address.wrapping_add(instr.length as u64);
    irsb.next = Expr::konst(ConstValue::I64(fallthrough));
    irsb.jump_kind = jump_kind;
    Ok(())
}

/// `SYSCALL`: saves the return address to `rcx`, assembles the current
/// `RFLAGS` into `r11` (the kernel entry restores from there on `SYSRET`),
/// records the pre-transfer address in `ip_at_syscall`, and terminates the
/// block with a side exit rather than a plain fallthrough, per spec.
pub fn lift_syscall(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    let return_addr = instr.address.wrapping_add(instr.length as u64);
    let rcx_off = schema.offset_of("rcx")?;
    irsb.add(Stmt::Put {
        offset: rcx_off,
        value: Expr::konst(ConstValue::I64(return_addr)),
    })?;

    let r11_off = schema.offset_of("r11")?;
    let all_flags = crate::guest::ccop::calc_flag(crate::ir::op::Callee::CalcAllFlags);
    irsb.add(Stmt::Put { offset: r11_off, value: all_flags })?;

    let ip_at_syscall_off = schema.offset_of("ip_at_syscall")?;
    irsb.add(Stmt::Put {
        offset: ip_at_syscall_off,
        value: Expr::konst(ConstValue::I64(instr.address)),
    })?;

    irsb.add(Stmt::Exit {
        guard: Expr::konst(ConstValue::I1(true)),
        jump_kind: JumpKind::Syscall,
        target: Expr::konst(ConstValue::I64(0)),
    })?;
    irsb.next = Expr::konst(ConstValue::I64(0));
    irsb.jump_kind = JumpKind::Syscall;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::guest::Amd64Schema;

    fn lift_one(bytes: &[u8]) -> Irsb {
        let instr = decode(bytes, 0x4000).expect("decodes");
        let mut irsb = Irsb::new(0x4000);
        irsb.add(Stmt::IMark {
            addr: 0x4000,
            len: instr.length as u32,
            delta: 0,
        })
        .unwrap();
        crate::lift::lift_instruction(&mut irsb, &Amd64Schema, &instr).unwrap();
        irsb
    }

    #[test]
    fn unconditional_jmp_sets_next_to_the_resolved_target() {
        // jmp +5 (rel8) -> EB 05
        let irsb = lift_one(&[0xEB, 0x05]);
        match irsb.next {
            Expr::Const(ConstValue::I64(addr)) => assert_eq!(addr, 0x4000 + 2 + 5),
            other => panic!("expected a resolved constant target, got {other:?}"),
        }
        assert_eq!(irsb.jump_kind, JumpKind::Boring);
    }

    #[test]
    fn conditional_jump_emits_a_side_exit_not_a_block_terminator() {
        // jz +5 -> 74 05
        let irsb = lift_one(&[0x74, 0x05]);
        assert!(irsb
            .stmts()
            .iter()
            .any(|s| matches!(s, Stmt::Exit { .. })));
        assert_eq!(irsb.jump_kind, JumpKind::Boring);
    }

    #[test]
    fn ret_pops_into_next_and_sets_ret_jump_kind() {
        let irsb = lift_one(&[0xC3]);
        assert_eq!(irsb.jump_kind, JumpKind::Ret);
    }

    #[test]
    fn call_pushes_return_address_before_transferring() {
        // call +0 -> E8 00 00 00 00
        let irsb = lift_one(&[0xE8, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(irsb.jump_kind, JumpKind::Call);
        assert!(irsb.stmts().iter().any(|s| matches!(s, Stmt::StoreLE { .. })));
    }

    #[test]
    fn syscall_saves_return_address_and_flags_and_exits() {
        // syscall -> 0F 05
        let irsb = lift_one(&[0x0F, 0x05]);
        let schema = Amd64Schema;
        let rcx_off = schema.offset_of("rcx").unwrap();
        let r11_off = schema.offset_of("r11").unwrap();
        let ip_at_syscall_off = schema.offset_of("ip_at_syscall").unwrap();

        let rcx_put = irsb.stmts().iter().find_map(|s| match s {
            Stmt::Put { offset, value } if *offset == rcx_off => Some(value),
            _ => None,
        });
        assert_eq!(rcx_put, Some(&Expr::konst(ConstValue::I64(0x4000 + 2))));

        assert!(irsb.stmts().iter().any(|s| matches!(
            s,
            Stmt::Put { offset, value: Expr::CCall { callee, .. } }
                if *offset == r11_off && *callee == crate::ir::op::Callee::CalcAllFlags
        )));

        assert!(irsb.stmts().iter().any(|s| matches!(
            s,
            Stmt::Put { offset, value: Expr::Const(ConstValue::I64(0x4000)) } if *offset == ip_at_syscall_off
        )));

        assert!(irsb
            .stmts()
            .iter()
            .any(|s| matches!(s, Stmt::Exit { jump_kind: JumpKind::Syscall, .. })));
        assert_eq!(irsb.jump_kind, JumpKind::Syscall);
    }
}
