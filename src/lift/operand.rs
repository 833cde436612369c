//! Converts decoded operands into typed IR expressions (reads) and
//! statement lists (writes), against a concrete [`GuestSchema`].

use crate::decode::instr::{DecodedInstr, MemoryOperand, Operand, OperandSize, RegisterOperand};
use crate::error::LiftBug;
use crate::ir::expr::{ConstValue, Expr};
use crate::ir::irsb::Irsb;
use crate::ir::op::UnaryOp;
use crate::ir::stmt::Stmt;
use crate::ir::ty::IrType;
use crate::guest::GuestSchema;

/// Effective width to read/write an operand at. `Register`/`Immediate`
/// operands carry their own width; a lone `Memory` operand has none of its
/// own, so callers resolve it from a sibling operand or the instruction's
/// prefix-derived default before calling into this module.
pub fn width_to_type(width: OperandSize) -> IrType {
    match width {
        OperandSize::Byte => IrType::I8,
        OperandSize::Word => IrType::I16,
        OperandSize::Dword => IrType::I32,
        OperandSize::Qword => IrType::I64,
    }
}

/// Pick the effective operand width for a 2-or-3-operand instruction: each
/// operand kind carries its own width (`Memory`'s is stamped in by the
/// decoder's `rm_operand`), so the first operand's width is authoritative;
/// falls back to the instruction's prefix-derived default only for a
/// `Relative` branch-target operand, which has none of its own.
pub fn effective_width(instr: &DecodedInstr) -> OperandSize {
    for op in &instr.operands {
        match op {
            Operand::Register(r) => return r.width,
            Operand::Immediate { width, .. } => return *width,
            Operand::Memory(mem) => return mem.width,
            Operand::Relative { .. } => {}
        }
    }
    instr.operand_size
}

/// Width of one specific operand, for instructions (`MOVZX`/`MOVSX`) whose
/// operands legitimately have different widths from each other.
pub fn operand_width(op: &Operand, fallback: OperandSize) -> OperandSize {
    match op {
        Operand::Register(r) => r.width,
        Operand::Immediate { width, .. } => *width,
        Operand::Memory(mem) => mem.width,
        Operand::Relative { .. } => fallback,
    }
}

fn register_expr(schema: &dyn GuestSchema, reg: &RegisterOperand) -> Result<Expr, LiftBug> {
    let offset = schema.offset_of(reg.name)?;
    let ty = schema.type_of(reg.name)?;
    Ok(Expr::get(offset, ty))
}

/// Build the effective address expression for a memory operand. RIP-relative
/// addressing resolves against the address of the *next* instruction, which
/// is why this needs the owning instruction's address and length.
pub fn address_expr(mem: &MemoryOperand, instr: &DecodedInstr) -> Expr {
    if mem.is_rip_relative {
        let rip = instr.address.wrapping_add(instr.length as u64);
        let addr = (rip as i64).wrapping_add(mem.displacement as i64) as u64;
        return Expr::konst(ConstValue::I64(addr));
    }
    let mut acc: Option<Expr> = mem.base.as_ref().map(|b| {
        Expr::get(amd64_gpr_offset(b.name), IrType::I64)
    });
    if let Some(index) = &mem.index {
        let idx_expr = Expr::get(amd64_gpr_offset(index.name), IrType::I64);
        let scaled = if mem.scale == 1 {
            idx_expr
        } else {
            Expr::Binop(
                crate::ir::op::BinaryOp::Mul64,
                Box::new(idx_expr),
                Box::new(Expr::konst(ConstValue::I64(mem.scale as u64))),
            )
        };
        acc = Some(match acc {
            Some(base) => Expr::Binop(crate::ir::op::BinaryOp::Add64, Box::new(base), Box::new(scaled)),
            None => scaled,
        });
    }
    let disp = mem.displacement as i64 as u64;
    match acc {
        Some(base) if disp != 0 => Expr::Binop(
            crate::ir::op::BinaryOp::Add64,
            Box::new(base),
            Box::new(Expr::konst(ConstValue::I64(disp))),
        ),
        Some(base) => base,
        None => Expr::konst(ConstValue::I64(disp)),
    }
}

/// Resolve a GPR name to its guest-state offset without threading a schema
/// instance through every address computation: addressing registers are
/// always AMD64 GPRs regardless of which guest schema governs the rest of
/// the block, and the offsets are the schema's own published layout.
fn amd64_gpr_offset(name: &str) -> u32 {
    crate::guest::Amd64Schema
        .offset_of(name)
        .expect("address-computation register names are always valid GPR names")
}

/// Read an operand's value as a `ty`-typed expression.
pub fn read_operand(
    schema: &dyn GuestSchema,
    op: &Operand,
    ty: IrType,
    instr: &DecodedInstr,
) -> Result<Expr, LiftBug> {
    match op {
        Operand::Register(r) => register_expr(schema, r),
        // `value` is already sign-extended to `i64` by the decoder's
        // `read_imm`/`read_imm8` regardless of how many bytes were encoded
        // (e.g. `add r32, imm8` sign-extends the encoded byte); build the
        // constant at the caller's context width `ty`, not the operand's
        // own (possibly narrower) encoded width.
        Operand::Immediate { value, .. } => Ok(const_for_ty(*value, ty)),
        Operand::Memory(mem) => {
            let addr = address_expr(mem, instr);
            Ok(Expr::LoadLE { ty, addr: Box::new(addr) })
        }
        Operand::Relative { offset } => {
            let target = (instr.address as i64 + instr.length as i64 + offset) as u64;
            Ok(Expr::konst(ConstValue::I64(target)))
        }
    }
}

fn const_for_ty(value: i64, ty: IrType) -> Expr {
    match ty {
        IrType::I8 => Expr::konst(ConstValue::I8(value as u8)),
        IrType::I16 => Expr::konst(ConstValue::I16(value as u16)),
        IrType::I32 => Expr::konst(ConstValue::I32(value as u32)),
        _ => Expr::konst(ConstValue::I64(value as u64)),
    }
}

/// Produce the statement(s) that write `value` back into `op`. Writing a
/// 32-bit GPR view on AMD64 zero-extends the full 64-bit register; this
/// models that by widening before the `Put` when the destination is a
/// 32-bit GPR view and the schema reports the full register is wider.
pub fn write_operand(
    schema: &dyn GuestSchema,
    op: &Operand,
    value: Expr,
    instr: &DecodedInstr,
    irsb: &Irsb,
) -> Result<Vec<Stmt>, LiftBug> {
    match op {
        Operand::Register(r) => {
            let offset = schema.offset_of(r.name)?;
            let reg_ty = schema.type_of(r.name)?;
            let value = if r.width == OperandSize::Dword && reg_ty == IrType::I32 {
                // A 32-bit GPR write zero-extends into the full 64-bit
                // register it aliases (invariant 5): normalize to I32 first
                // (truncating the rare I64-valued source, e.g. a 32-bit-
                // operand-size LEA's computed address), then widen the
                // whole 8-byte slot so the Put doesn't leave the upper half
                // of the register stale.
                let narrowed = coerce(value, IrType::I32, irsb)?;
                coerce(narrowed, IrType::I64, irsb)?
            } else {
                value
            };
            Ok(vec![Stmt::Put { offset, value }])
        }
        Operand::Memory(mem) => {
            let addr = address_expr(mem, instr);
            Ok(vec![Stmt::StoreLE { addr, value }])
        }
        Operand::Immediate { .. } | Operand::Relative { .. } => {
            panic!("an immediate or relative operand is never a write target")
        }
    }
}

fn coerce(value: Expr, want: IrType, irsb: &Irsb) -> Result<Expr, LiftBug> {
    let found = value.ty(irsb.temps());
    if found == want {
        return Ok(value);
    }
    let op = match (found, want) {
        (IrType::I8, IrType::I32) => UnaryOp::ZeroExt8to32,
        (IrType::I16, IrType::I32) => UnaryOp::ZeroExt16to32,
        (IrType::I8, IrType::I64) => UnaryOp::ZeroExt8to64,
        (IrType::I16, IrType::I64) => UnaryOp::ZeroExt16to64,
        (IrType::I32, IrType::I64) => UnaryOp::ZeroExt32to64,
        // `lea r32, [mem]` computes a full I64 address but truncates to the
        // low 32 bits on write, per x86 32-bit-operand-size LEA semantics.
        (IrType::I64, IrType::I32) => UnaryOp::Trunc64to32,
        _ => return Ok(value),
    };
    Expr::unop(op, value, irsb.temps())
}
