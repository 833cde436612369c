//! ALU mnemonic lowering: arithmetic, logic, shift/rotate, and the
//! `INC`/`DEC`/`NEG`/`NOT`/`MUL`/`IMUL`/`DIV`/`IDIV` unary/group families.
//!
//! Every flag-affecting op here ends by calling [`emit_flags`] with the
//! `CcOp` family matching its mnemonic and width, per spec §6's lazy-flag
//! design: the concrete Z/S/C/O/P/A bits are never computed inline.

use crate::decode::instr::{DecodedInstr, Mnemonic, OperandSize};
use crate::error::LiftBug;
use crate::guest::ccop::{
    cc_op_for_add, cc_op_for_adc, cc_op_for_dec, cc_op_for_inc, cc_op_for_logic, cc_op_for_rotate,
    cc_op_for_sbb, cc_op_for_shift, cc_op_for_sub, ShiftKind,
};
use crate::guest::GuestSchema;
use crate::ir::expr::Expr;
use crate::ir::irsb::Irsb;
use crate::ir::op::{BinaryOp, Callee, UnaryOp};
use crate::ir::stmt::Stmt;

use super::flags::{emit_flags, preserved_ndep, widen_to_i64, zero_i64};
use super::operand::{effective_width, read_operand, width_to_type, write_operand};

fn binop_for(mnemonic: Mnemonic, width: OperandSize) -> BinaryOp {
    use Mnemonic::*;
    use OperandSize::*;
    match (mnemonic, width) {
        (Add, Byte) => BinaryOp::Add8,
        (Add, Word) => BinaryOp::Add16,
        (Add, Dword) => BinaryOp::Add32,
        (Add, Qword) => BinaryOp::Add64,
        (Sub, Byte) | (Cmp, Byte) => BinaryOp::Sub8,
        (Sub, Word) | (Cmp, Word) => BinaryOp::Sub16,
        (Sub, Dword) | (Cmp, Dword) => BinaryOp::Sub32,
        (Sub, Qword) | (Cmp, Qword) => BinaryOp::Sub64,
        (And, Byte) | (Test, Byte) => BinaryOp::And8,
        (And, Word) | (Test, Word) => BinaryOp::And16,
        (And, Dword) | (Test, Dword) => BinaryOp::And32,
        (And, Qword) | (Test, Qword) => BinaryOp::And64,
        (Or, Byte) => BinaryOp::Or8,
        (Or, Word) => BinaryOp::Or16,
        (Or, Dword) => BinaryOp::Or32,
        (Or, Qword) => BinaryOp::Or64,
        (Xor, Byte) => BinaryOp::Xor8,
        (Xor, Word) => BinaryOp::Xor16,
        (Xor, Dword) => BinaryOp::Xor32,
        (Xor, Qword) => BinaryOp::Xor64,
        _ => unreachable!("binop_for called with a non-ALU mnemonic/width pair"),
    }
}

fn add_sub_cc_op(mnemonic: Mnemonic, width_bytes: u32) -> crate::guest::CcOp {
    match mnemonic {
        Mnemonic::Add => cc_op_for_add(width_bytes),
        Mnemonic::Sub | Mnemonic::Cmp => cc_op_for_sub(width_bytes),
        _ => cc_op_for_logic(width_bytes),
    }
}

/// `ADD`/`SUB`/`AND`/`OR`/`XOR`/`CMP`/`TEST`: all share the read-compute-
/// (write)-flag shape, differing only in whether the result is written back
/// (`CMP`/`TEST` discard it) and which `CcOp` family applies.
pub fn lift_basic_alu(
    irsb: &mut Irsb,
    schema: &dyn GuestSchema,
    instr: &DecodedInstr,
) -> Result<(), LiftBug> {
    let width = effective_width(instr);
    let ty = width_to_type(width);
    let a = read_operand(schema, &instr.operands[0], ty, instr)?;
    let b = read_operand(schema, &instr.operands[1], ty, instr)?;
    let op = binop_for(instr.mnemonic, width);
    let result = Expr::binop(op, a, b.clone(), irsb.temps())?;

    let writes_back = !matches!(instr.mnemonic, Mnemonic::Cmp | Mnemonic::Test);
    let dep1 = if writes_back {
        let t = irsb.new_temp(ty);
        irsb.add(Stmt::WrTmp { tmp: t, expr: result })?;
        Expr::RdTmp(t)
    } else {
        result
    };
    if writes_back {
        for stmt in write_operand(schema, &instr.operands[0], dep1.clone(), instr, irsb)? {
            irsb.add(stmt)?;
        }
    }

    let cc_op = add_sub_cc_op(instr.mnemonic, width.bytes());
    let dep1_64 = widen_to_i64(dep1, ty, irsb)?;
    let dep2_64 = widen_to_i64(b, ty, irsb)?;
    emit_flags(irsb, cc_op, dep1_64, dep2_64, zero_i64())
}

fn carry_in_as(width: OperandSize, irsb: &mut Irsb) -> Result<Expr, LiftBug> {
    let carry = crate::guest::ccop::calc_flag(Callee::CalcFlagC);
    let as64 = Expr::unop(UnaryOp::Ext1to64, carry, irsb.temps())?;
    Ok(match width {
        OperandSize::Qword => as64,
        OperandSize::Dword => Expr::unop(UnaryOp::Trunc64to32, as64, irsb.temps())?,
        OperandSize::Word => Expr::unop(UnaryOp::Trunc64to16, as64, irsb.temps())?,
        OperandSize::Byte => Expr::unop(UnaryOp::Trunc64to8, as64, irsb.temps())?,
    })
}

/// `ADC`/`SBB`: like `ADD`/`SUB` but with the incoming carry folded in, and
/// with `CC_NDEP` recording that carry rather than zero.
pub fn lift_adc_sbb(
    irsb: &mut Irsb,
    schema: &dyn GuestSchema,
    instr: &DecodedInstr,
) -> Result<(), LiftBug> {
    let width = effective_width(instr);
    let ty = width_to_type(width);
    let a = read_operand(schema, &instr.operands[0], ty, instr)?;
    let b = read_operand(schema, &instr.operands[1], ty, instr)?;
    let carry = carry_in_as(width, irsb)?;

    let add_op = binop_for(Mnemonic::Add, width);
    let sub_op = binop_for(Mnemonic::Sub, width);
    let (step1, step2_op) = match instr.mnemonic {
        Mnemonic::Adc => (Expr::binop(add_op, a, b.clone(), irsb.temps())?, add_op),
        _ => (Expr::binop(sub_op, a, b.clone(), irsb.temps())?, sub_op),
    };
    let result = Expr::binop(step2_op, step1, carry.clone(), irsb.temps())?;

    let t = irsb.new_temp(ty);
    irsb.add(Stmt::WrTmp { tmp: t, expr: result })?;
    let dep1 = Expr::RdTmp(t);
    for stmt in write_operand(schema, &instr.operands[0], dep1.clone(), instr, irsb)? {
        irsb.add(stmt)?;
    }

    let cc_op = match instr.mnemonic {
        Mnemonic::Adc => cc_op_for_adc(width.bytes()),
        _ => cc_op_for_sbb(width.bytes()),
    };
    let dep1_64 = widen_to_i64(dep1, ty, irsb)?;
    let dep2_64 = widen_to_i64(b, ty, irsb)?;
    let ndep_64 = widen_to_i64(carry, ty, irsb)?;
    emit_flags(irsb, cc_op, dep1_64, dep2_64, ndep_64)
}

/// `INC`/`DEC`: preserve `CF` by carrying the old `CC_NDEP` forward.
pub fn lift_inc_dec(
    irsb: &mut Irsb,
    schema: &dyn GuestSchema,
    instr: &DecodedInstr,
) -> Result<(), LiftBug> {
    let width = effective_width(instr);
    let ty = width_to_type(width);
    let a = read_operand(schema, &instr.operands[0], ty, instr)?;
    let one = const_one(width);
    let op = if instr.mnemonic == Mnemonic::Inc {
        binop_for(Mnemonic::Add, width)
    } else {
        binop_for(Mnemonic::Sub, width)
    };
    let result = Expr::binop(op, a, one, irsb.temps())?;
    let t = irsb.new_temp(ty);
    irsb.add(Stmt::WrTmp { tmp: t, expr: result })?;
    let dep1 = Expr::RdTmp(t);
    for stmt in write_operand(schema, &instr.operands[0], dep1.clone(), instr, irsb)? {
        irsb.add(stmt)?;
    }
    let cc_op = if instr.mnemonic == Mnemonic::Inc {
        cc_op_for_inc(width.bytes())
    } else {
        cc_op_for_dec(width.bytes())
    };
    let dep1_64 = widen_to_i64(dep1, ty, irsb)?;
    emit_flags(irsb, cc_op, dep1_64, zero_i64(), preserved_ndep())
}

fn const_one(width: OperandSize) -> Expr {
    use crate::ir::expr::ConstValue;
    match width {
        OperandSize::Byte => Expr::konst(ConstValue::I8(1)),
        OperandSize::Word => Expr::konst(ConstValue::I16(1)),
        OperandSize::Dword => Expr::konst(ConstValue::I32(1)),
        OperandSize::Qword => Expr::konst(ConstValue::I64(1)),
    }
}

fn neg_op(width: OperandSize) -> UnaryOp {
    match width {
        OperandSize::Byte => UnaryOp::Neg8,
        OperandSize::Word => UnaryOp::Neg16,
        OperandSize::Dword => UnaryOp::Neg32,
        OperandSize::Qword => UnaryOp::Neg64,
    }
}

fn not_op(width: OperandSize) -> UnaryOp {
    match width {
        OperandSize::Byte => UnaryOp::Not8,
        OperandSize::Word => UnaryOp::Not16,
        OperandSize::Dword => UnaryOp::Not32,
        OperandSize::Qword => UnaryOp::Not64,
    }
}

/// `NEG`: flag-affecting. `NOT`: pure bitwise complement, no flags at all.
pub fn lift_neg_not(
    irsb: &mut Irsb,
    schema: &dyn GuestSchema,
    instr: &DecodedInstr,
) -> Result<(), LiftBug> {
    let width = effective_width(instr);
    let ty = width_to_type(width);
    let a = read_operand(schema, &instr.operands[0], ty, instr)?;
    let op = if instr.mnemonic == Mnemonic::Neg {
        neg_op(width)
    } else {
        not_op(width)
    };
    let result = Expr::unop(op, a.clone(), irsb.temps())?;
    let t = irsb.new_temp(ty);
    irsb.add(Stmt::WrTmp { tmp: t, expr: result })?;
    let dep1 = Expr::RdTmp(t);
    for stmt in write_operand(schema, &instr.operands[0], dep1.clone(), instr, irsb)? {
        irsb.add(stmt)?;
    }
    if instr.mnemonic == Mnemonic::Neg {
        let cc_op = crate::guest::ccop::cc_op_for_neg(width.bytes());
        let dep1_64 = widen_to_i64(dep1, ty, irsb)?;
        let dep2_64 = widen_to_i64(a, ty, irsb)?;
        emit_flags(irsb, cc_op, dep1_64, dep2_64, zero_i64())?;
    }
    Ok(())
}

/// `MUL`/`IMUL` (one-operand form). Only the 32-bit width gets a fully
/// widened `edx:eax` product, since that is the only width for which the
/// op algebra has both a widening multiply (`MullU32`/`MullS32`, `I64`
/// result) and a way to split the result (`Trunc64to32` for the low half,
/// `Shr64` + `Trunc64to32` for the high half). 8/16/64-bit widths fall back
/// to a same-width truncating multiply written only to the accumulator;
/// see `DESIGN.md` for why (no `Trunc128to64`/widening 8x8 or 16x16 op
/// exists in this op set).
pub fn lift_mul_imul_unary(
    irsb: &mut Irsb,
    schema: &dyn GuestSchema,
    instr: &DecodedInstr,
) -> Result<(), LiftBug> {
    let width = effective_width(instr);
    let ty = width_to_type(width);
    let signed = instr.mnemonic == Mnemonic::Imul;
    let acc_idx = 0u8; // rax/eax/ax/al
    let acc = crate::lift::operand::read_operand(
        schema,
        &crate::decode::instr::Operand::Register(crate::lift::operand_reg(acc_idx, width)),
        ty,
        instr,
    )?;
    let src = read_operand(schema, &instr.operands[0], ty, instr)?;

    if width == OperandSize::Dword {
        let wide_op = if signed { BinaryOp::MullS32 } else { BinaryOp::MullU32 };
        let product = Expr::binop(wide_op, acc, src, irsb.temps())?;
        let t = irsb.new_temp(crate::ir::ty::IrType::I64);
        irsb.add(Stmt::WrTmp { tmp: t, expr: product })?;
        let wide = Expr::RdTmp(t);
        let low = Expr::unop(UnaryOp::Trunc64to32, wide.clone(), irsb.temps())?;
        let shifted = Expr::binop(
            BinaryOp::Shr64,
            wide,
            Expr::konst(crate::ir::expr::ConstValue::I64(32)),
            irsb.temps(),
        )?;
        let high = Expr::unop(UnaryOp::Trunc64to32, shifted, irsb.temps())?;
        let eax = crate::decode::instr::Operand::Register(crate::lift::operand_reg(0, width));
        let edx = crate::decode::instr::Operand::Register(crate::lift::operand_reg(2, width));
        for stmt in write_operand(schema, &eax, low, instr, irsb)? {
            irsb.add(stmt)?;
        }
        for stmt in write_operand(schema, &edx, high, instr, irsb)? {
            irsb.add(stmt)?;
        }
    } else {
        let mul_op = match width {
            OperandSize::Byte => BinaryOp::Mul8,
            OperandSize::Word => BinaryOp::Mul16,
            OperandSize::Qword => BinaryOp::Mul64,
            OperandSize::Dword => unreachable!(),
        };
        let product = Expr::binop(mul_op, acc, src, irsb.temps())?;
        let dst = crate::lift::operand_reg(acc_idx, width);
        for stmt in write_operand(
            schema,
            &crate::decode::instr::Operand::Register(dst),
            product,
            instr,
            irsb,
        )? {
            irsb.add(stmt)?;
        }
    }
    Ok(())
}

/// `DIV`/`IDIV` (one-operand form). For the Byte/Word/Dword widths, the
/// accumulator is combined with its architectural upper-half register
/// (`ah`/`dx`/`edx`) into the true double-width dividend before dividing,
/// matching hardware: `al`'s dividend is `ax`, `ax`'s is `dx:ax`, `eax`'s is
/// `edx:eax`. The 64-bit form divides using `rax` alone — the op algebra has
/// no way to assemble an `I128` dividend from two `I64` halves (only
/// `MullU64`/`MullS64` ever produce an `I128`), so `rdx` is never folded in
/// for 64-bit `DIV`/`IDIV`; see `DESIGN.md` for the matching `MUL`/`IMUL`
/// limitation. The op algebra also has no remainder operator, so
/// `edx`/`dx`/`ah` never receives a remainder.
pub fn lift_div_idiv_unary(
    irsb: &mut Irsb,
    schema: &dyn GuestSchema,
    instr: &DecodedInstr,
) -> Result<(), LiftBug> {
    use crate::ir::expr::ConstValue;
    use crate::ir::ty::IrType;

    let width = effective_width(instr);
    let ty = width_to_type(width);
    let signed = instr.mnemonic == Mnemonic::Idiv;
    let acc = read_operand(
        schema,
        &crate::decode::instr::Operand::Register(crate::lift::operand_reg(0, width)),
        ty,
        instr,
    )?;
    let divisor = read_operand(schema, &instr.operands[0], ty, instr)?;

    let (dividend, divisor_wide, wide_ty) = if width == OperandSize::Qword {
        (acc, divisor, IrType::I64)
    } else {
        let upper_reg = match width {
            OperandSize::Byte => crate::decode::instr::RegisterOperand {
                name: crate::guest::Amd64Schema::gpr8_high_name(0),
                width: OperandSize::Byte,
            },
            _ => crate::lift::operand_reg(2, width),
        };
        let upper = read_operand(
            schema,
            &crate::decode::instr::Operand::Register(upper_reg),
            ty,
            instr,
        )?;
        let wide_ty = if width == OperandSize::Dword { IrType::I64 } else { IrType::I32 };
        let acc_wide = extend_operand(acc, wide_ty, signed, irsb)?;
        let upper_wide = extend_operand(upper, wide_ty, signed, irsb)?;
        let divisor_wide = extend_operand(divisor, wide_ty, signed, irsb)?;
        let shift_bits = width.bytes() * 8;
        let (shl_op, or_op, shift_const) = match wide_ty {
            IrType::I32 => (BinaryOp::Shl32, BinaryOp::Or32, Expr::konst(ConstValue::I32(shift_bits))),
            _ => (BinaryOp::Shl64, BinaryOp::Or64, Expr::konst(ConstValue::I64(shift_bits as u64))),
        };
        let shifted_upper = Expr::binop(shl_op, upper_wide, shift_const, irsb.temps())?;
        let dividend = Expr::binop(or_op, shifted_upper, acc_wide, irsb.temps())?;
        (dividend, divisor_wide, wide_ty)
    };

    let quotient = Expr::binop(div_op_for(wide_ty, signed), dividend, divisor_wide, irsb.temps())?;
    let narrowed = match width {
        OperandSize::Byte => Expr::unop(UnaryOp::Trunc32to8, quotient, irsb.temps())?,
        OperandSize::Word => Expr::unop(UnaryOp::Trunc32to16, quotient, irsb.temps())?,
        OperandSize::Dword | OperandSize::Qword => quotient,
    };
    let dst = crate::lift::operand_reg(0, width);
    for stmt in write_operand(
        schema,
        &crate::decode::instr::Operand::Register(dst),
        narrowed,
        instr,
        irsb,
    )? {
        irsb.add(stmt)?;
    }
    Ok(())
}

fn div_op_for(ty: crate::ir::ty::IrType, signed: bool) -> BinaryOp {
    match (ty, signed) {
        (crate::ir::ty::IrType::I32, false) => BinaryOp::DivU32,
        (crate::ir::ty::IrType::I32, true) => BinaryOp::DivS32,
        (_, false) => BinaryOp::DivU64,
        (_, true) => BinaryOp::DivS64,
    }
}

/// Zero/sign-extend (per `signed`) a value already read at its natural
/// width up to `target`, leaving it unchanged if it's already there.
fn extend_operand(
    value: Expr,
    target: crate::ir::ty::IrType,
    signed: bool,
    irsb: &mut Irsb,
) -> Result<Expr, LiftBug> {
    use crate::ir::ty::IrType;
    let found = value.ty(irsb.temps());
    if found == target {
        return Ok(value);
    }
    let op = match (found, target, signed) {
        (IrType::I8, IrType::I32, false) => UnaryOp::ZeroExt8to32,
        (IrType::I8, IrType::I32, true) => UnaryOp::SignExt8to32,
        (IrType::I16, IrType::I32, false) => UnaryOp::ZeroExt16to32,
        (IrType::I16, IrType::I32, true) => UnaryOp::SignExt16to32,
        (IrType::I32, IrType::I64, false) => UnaryOp::ZeroExt32to64,
        (IrType::I32, IrType::I64, true) => UnaryOp::SignExt32to64,
        _ => return Ok(value),
    };
    Expr::unop(op, value, irsb.temps())
}

fn shift_op(mnemonic: Mnemonic, width: OperandSize) -> BinaryOp {
    use Mnemonic::*;
    use OperandSize::*;
    match (mnemonic, width) {
        (Shl, Byte) => BinaryOp::Shl8,
        (Shl, Word) => BinaryOp::Shl16,
        (Shl, Dword) => BinaryOp::Shl32,
        (Shl, Qword) => BinaryOp::Shl64,
        (Shr, Byte) => BinaryOp::Shr8,
        (Shr, Word) => BinaryOp::Shr16,
        (Shr, Dword) => BinaryOp::Shr32,
        (Shr, Qword) => BinaryOp::Shr64,
        (Sar, Byte) => BinaryOp::Sar8,
        (Sar, Word) => BinaryOp::Sar16,
        (Sar, Dword) => BinaryOp::Sar32,
        (Sar, Qword) => BinaryOp::Sar64,
        (Rol, Byte) => BinaryOp::Rol8,
        (Rol, Word) => BinaryOp::Rol16,
        (Rol, Dword) => BinaryOp::Rol32,
        (Rol, Qword) => BinaryOp::Rol64,
        (Ror, Byte) => BinaryOp::Ror8,
        (Ror, Word) => BinaryOp::Ror16,
        (Ror, Dword) => BinaryOp::Ror32,
        (Ror, Qword) => BinaryOp::Ror64,
        _ => unreachable!("shift_op called with a non-shift mnemonic"),
    }
}

fn widen_count_to(count: Expr, want: crate::ir::ty::IrType, irsb: &mut Irsb) -> Result<Expr, LiftBug> {
    use crate::ir::ty::IrType;
    let found = count.ty(irsb.temps());
    if found == want {
        return Ok(count);
    }
    let op = match want {
        IrType::I16 => UnaryOp::ZeroExt8to16,
        IrType::I32 => UnaryOp::ZeroExt8to32,
        IrType::I64 => UnaryOp::ZeroExt8to64,
        _ => return Ok(count),
    };
    Expr::unop(op, count, irsb.temps())
}

/// `SHL`/`SHR`/`SAR`/`ROL`/`ROR`: the shift/rotate count is always carried
/// as an 8-bit operand (`imm8` or `cl`) regardless of the destination's
/// width, so it is widened to match before the binop's fixed same-width
/// signature applies.
pub fn lift_shift_rotate(
    irsb: &mut Irsb,
    schema: &dyn GuestSchema,
    instr: &DecodedInstr,
) -> Result<(), LiftBug> {
    let width = effective_width(instr);
    let ty = width_to_type(width);
    let a = read_operand(schema, &instr.operands[0], ty, instr)?;
    let count_raw = read_operand(
        schema,
        &instr.operands[1],
        crate::ir::ty::IrType::I8,
        instr,
    )?;
    let count = widen_count_to(count_raw, ty, irsb)?;
    let op = shift_op(instr.mnemonic, width);
    let result = Expr::binop(op, a, count.clone(), irsb.temps())?;
    let t = irsb.new_temp(ty);
    irsb.add(Stmt::WrTmp { tmp: t, expr: result })?;
    let dep1 = Expr::RdTmp(t);
    for stmt in write_operand(schema, &instr.operands[0], dep1.clone(), instr, irsb)? {
        irsb.add(stmt)?;
    }
    let cc_op = match instr.mnemonic {
        Mnemonic::Shl => cc_op_for_shift(width.bytes(), ShiftKind::Left),
        Mnemonic::Shr => cc_op_for_shift(width.bytes(), ShiftKind::LogicalRight),
        Mnemonic::Sar => cc_op_for_shift(width.bytes(), ShiftKind::ArithmeticRight),
        Mnemonic::Rol => cc_op_for_rotate(width.bytes(), false),
        Mnemonic::Ror => cc_op_for_rotate(width.bytes(), true),
        _ => unreachable!("lift_shift_rotate dispatched on a non-shift mnemonic"),
    };
    let dep1_64 = widen_to_i64(dep1, ty, irsb)?;
    let dep2_64 = widen_to_i64(count, ty, irsb)?;
    emit_flags(irsb, cc_op, dep1_64, dep2_64, zero_i64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::guest::Amd64Schema;

    fn lift_one(bytes: &[u8]) -> Irsb {
        let instr = decode(bytes, 0x1000).expect("decodes");
        let mut irsb = Irsb::new(0x1000);
        irsb.add(Stmt::IMark {
            addr: 0x1000,
            len: instr.length as u32,
            delta: 0,
        })
        .unwrap();
        crate::lift::lift_instruction(&mut irsb, &Amd64Schema, &instr).unwrap();
        irsb
    }

    #[test]
    fn add_eax_ebx_writes_result_and_flags() {
        // add eax, ebx -> 01 D8
        let irsb = lift_one(&[0x01, 0xD8]);
        assert!(irsb.stmts().len() > 1);
        let puts_cc_op = irsb.stmts().iter().any(|s| {
            matches!(s, Stmt::Put { offset, .. } if *offset == crate::guest::ccop::OFFSETS.0)
        });
        assert!(puts_cc_op);
    }

    #[test]
    fn cmp_does_not_write_back_to_destination() {
        // cmp eax, ebx -> 39 D8
        let irsb = lift_one(&[0x39, 0xD8]);
        let writes_eax = irsb.stmts().iter().any(|s| {
            matches!(s, Stmt::Put { offset, .. } if *offset == Amd64Schema::gpr64_offset(0))
        });
        assert!(!writes_eax);
    }

    #[test]
    fn inc_preserves_carry_via_old_ndep_read() {
        // inc eax -> FF C0
        let irsb = lift_one(&[0xFF, 0xC0]);
        assert!(irsb.instruction_count() == 1);
    }

    #[test]
    fn shl_widens_the_imm8_count_to_operand_width() {
        // shl eax, 4 -> C1 E0 04
        let irsb = lift_one(&[0xC1, 0xE0, 0x04]);
        assert!(irsb.stmts().len() > 1);
    }

    fn expr_reads_offset(e: &Expr, offset: u32) -> bool {
        match e {
            Expr::Get { offset: o, .. } => *o == offset,
            Expr::Unop(_, a) => expr_reads_offset(a, offset),
            Expr::Binop(_, a, b) => expr_reads_offset(a, offset) || expr_reads_offset(b, offset),
            Expr::LoadLE { addr, .. } => expr_reads_offset(addr, offset),
            Expr::ITE { cond, then, els } => {
                expr_reads_offset(cond, offset) || expr_reads_offset(then, offset) || expr_reads_offset(els, offset)
            }
            _ => false,
        }
    }

    fn last_put_to(irsb: &Irsb, offset: u32) -> &Expr {
        irsb.stmts()
            .iter()
            .rev()
            .find_map(|s| match s {
                Stmt::Put { offset: o, value } if *o == offset => Some(value),
                _ => None,
            })
            .expect("expected a Put to the given offset")
    }

    #[test]
    fn div_ecx_reads_edx_as_the_dividend_upper_half() {
        // div ecx -> F7 F1
        let irsb = lift_one(&[0xF7, 0xF1]);
        let eax_off = Amd64Schema::gpr64_offset(0);
        let edx_off = Amd64Schema::gpr64_offset(2);
        let quotient = last_put_to(&irsb, eax_off);
        assert!(expr_reads_offset(quotient, edx_off));
        assert!(expr_reads_offset(quotient, eax_off));
    }

    #[test]
    fn div_cl_writes_only_al_width_not_the_full_eax() {
        // div cl -> F6 F1
        let irsb = lift_one(&[0xF6, 0xF1]);
        let al_off = Amd64Schema::gpr64_offset(0);
        let quotient = last_put_to(&irsb, al_off);
        assert_eq!(quotient.ty(irsb.temps()), crate::ir::ty::IrType::I8);
        assert!(expr_reads_offset(
            quotient,
            Amd64Schema::gpr64_offset(0) + 1 // ah
        ));
    }

    #[test]
    fn idiv_cx_reads_dx_as_the_dividend_upper_half() {
        // idiv cx -> 66 F7 F9
        let irsb = lift_one(&[0x66, 0xF7, 0xF9]);
        let ax_off = Amd64Schema::gpr64_offset(0);
        let dx_off = Amd64Schema::gpr64_offset(2);
        let quotient = last_put_to(&irsb, ax_off);
        assert_eq!(quotient.ty(irsb.temps()), crate::ir::ty::IrType::I16);
        assert!(expr_reads_offset(quotient, dx_off));
    }
}
