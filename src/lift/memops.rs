//! Data-movement mnemonic lowering: `MOV`, `MOVZX`/`MOVSX`, `LEA`, `PUSH`,
//! `POP`, `XCHG`, and the multi-operand `IMUL` forms.

use crate::decode::instr::{DecodedInstr, Mnemonic, Operand, OperandSize};
use crate::error::LiftBug;
use crate::guest::GuestSchema;
use crate::ir::expr::{ConstValue, Expr};
use crate::ir::irsb::Irsb;
use crate::ir::op::{BinaryOp, UnaryOp};
use crate::ir::stmt::Stmt;
use crate::ir::ty::IrType;

use super::operand::{
    address_expr, effective_width, operand_width, read_operand, width_to_type, write_operand,
};

pub fn lift_mov(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    let width = effective_width(instr);
    let ty = width_to_type(width);
    let value = read_operand(schema, &instr.operands[1], ty, instr)?;
    for stmt in write_operand(schema, &instr.operands[0], value, instr, irsb)? {
        irsb.add(stmt)?;
    }
    Ok(())
}

fn widen_op(src: IrType, dst: IrType, signed: bool) -> Option<UnaryOp> {
    use IrType::*;
    Some(match (src, dst, signed) {
        (I8, I16, false) => UnaryOp::ZeroExt8to16,
        (I8, I32, false) => UnaryOp::ZeroExt8to32,
        (I8, I64, false) => UnaryOp::ZeroExt8to64,
        (I16, I32, false) => UnaryOp::ZeroExt16to32,
        (I16, I64, false) => UnaryOp::ZeroExt16to64,
        (I8, I16, true) => UnaryOp::SignExt8to16,
        (I8, I32, true) => UnaryOp::SignExt8to32,
        (I8, I64, true) => UnaryOp::SignExt8to64,
        (I16, I32, true) => UnaryOp::SignExt16to32,
        (I16, I64, true) => UnaryOp::SignExt16to64,
        _ => return None,
    })
}

/// `MOVZX`/`MOVSX`: the source's width is its own (narrower) operand width,
/// not the destination's — `operand_width` reads it straight off whichever
/// `Operand` variant the decoder produced (including a `Memory` operand,
/// whose width the decoder stamps in at the opcode that knows it).
pub fn lift_movx(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    let dest_width = effective_width(instr);
    let dest_ty = width_to_type(dest_width);
    let src_width = operand_width(&instr.operands[1], dest_width);
    let src_ty = width_to_type(src_width);
    let raw = read_operand(schema, &instr.operands[1], src_ty, instr)?;
    let signed = instr.mnemonic == Mnemonic::MovSx;
    let value = match widen_op(src_ty, dest_ty, signed) {
        Some(op) => Expr::unop(op, raw, irsb.temps())?,
        None => raw,
    };
    for stmt in write_operand(schema, &instr.operands[0], value, instr, irsb)? {
        irsb.add(stmt)?;
    }
    Ok(())
}

pub fn lift_lea(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    let mem = match &instr.operands[1] {
        Operand::Memory(m) => m,
        _ => unreachable!("LEA's second operand is always memory"),
    };
    let addr = address_expr(mem, instr);
    for stmt in write_operand(schema, &instr.operands[0], addr, instr, irsb)? {
        irsb.add(stmt)?;
    }
    Ok(())
}

fn rsp(schema: &dyn GuestSchema) -> Result<u32, LiftBug> {
    schema.offset_of("rsp")
}

pub fn lift_push(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    let width = effective_width(instr);
    let ty = width_to_type(width);
    let value = read_operand(schema, &instr.operands[0], ty, instr)?;
    let rsp_off = rsp(schema)?;
    let old_rsp = Expr::get(rsp_off, IrType::I64);
    let new_rsp_expr = Expr::binop(
        BinaryOp::Sub64,
        old_rsp,
        Expr::konst(ConstValue::I64(width.bytes() as u64)),
        irsb.temps(),
    )?;
    let t = irsb.new_temp(IrType::I64);
    irsb.add(Stmt::WrTmp { tmp: t, expr: new_rsp_expr })?;
    let new_rsp = Expr::RdTmp(t);
    irsb.add(Stmt::StoreLE { addr: new_rsp.clone(), value })?;
    irsb.add(Stmt::Put { offset: rsp_off, value: new_rsp })
}

pub fn lift_pop(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    let width = effective_width(instr);
    let ty = width_to_type(width);
    let rsp_off = rsp(schema)?;
    let old_rsp = Expr::get(rsp_off, IrType::I64);
    let t = irsb.new_temp(ty);
    irsb.add(Stmt::WrTmp {
        tmp: t,
        expr: Expr::load_le(ty, old_rsp, irsb.temps())?,
    })?;
    let loaded = Expr::RdTmp(t);
    for stmt in write_operand(schema, &instr.operands[0], loaded, instr, irsb)? {
        irsb.add(stmt)?;
    }
    let new_rsp = Expr::binop(
        BinaryOp::Add64,
        Expr::get(rsp_off, IrType::I64),
        Expr::konst(ConstValue::I64(width.bytes() as u64)),
        irsb.temps(),
    )?;
    irsb.add(Stmt::Put { offset: rsp_off, value: new_rsp })
}

pub fn lift_xchg(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    let width = effective_width(instr);
    let ty = width_to_type(width);
    let a = read_operand(schema, &instr.operands[0], ty, instr)?;
    let b = read_operand(schema, &instr.operands[1], ty, instr)?;
    let ta = irsb.new_temp(ty);
    irsb.add(Stmt::WrTmp { tmp: ta, expr: a })?;
    let tb = irsb.new_temp(ty);
    irsb.add(Stmt::WrTmp { tmp: tb, expr: b })?;
    for stmt in write_operand(schema, &instr.operands[0], Expr::RdTmp(tb), instr, irsb)? {
        irsb.add(stmt)?;
    }
    for stmt in write_operand(schema, &instr.operands[1], Expr::RdTmp(ta), instr, irsb)? {
        irsb.add(stmt)?;
    }
    Ok(())
}

fn truncating_mul(width: OperandSize) -> BinaryOp {
    match width {
        OperandSize::Byte => BinaryOp::Mul8,
        OperandSize::Word => BinaryOp::Mul16,
        OperandSize::Dword => BinaryOp::Mul32,
        OperandSize::Qword => BinaryOp::Mul64,
    }
}

/// Two- and three-operand `IMUL`: `reg *= rm` (`0F AF`) or `reg = rm * imm`
/// (`69`/`6B`). Only the destination register is written — unlike the
/// one-operand form, there is no implicit high-half register, so the
/// truncating same-width multiply is exact, not a simplification.
pub fn lift_imul_multi_operand(
    irsb: &mut Irsb,
    schema: &dyn GuestSchema,
    instr: &DecodedInstr,
) -> Result<(), LiftBug> {
    let width = effective_width(instr);
    let ty = width_to_type(width);
    let (lhs, rhs) = if instr.operands.len() == 3 {
        // `reg = rm * imm`
        (
            read_operand(schema, &instr.operands[1], ty, instr)?,
            read_operand(schema, &instr.operands[2], ty, instr)?,
        )
    } else {
        // `reg *= rm`
        (
            read_operand(schema, &instr.operands[0], ty, instr)?,
            read_operand(schema, &instr.operands[1], ty, instr)?,
        )
    };
    let result = Expr::binop(truncating_mul(width), lhs, rhs, irsb.temps())?;
    let t = irsb.new_temp(ty);
    irsb.add(Stmt::WrTmp { tmp: t, expr: result })?;
    for stmt in write_operand(schema, &instr.operands[0], Expr::RdTmp(t), instr, irsb)? {
        irsb.add(stmt)?;
    }
    Ok(())
}
