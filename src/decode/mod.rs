//! Component C: the x86/AMD64 decoder.
//!
//! Turns a byte slice plus an absolute address into a single
//! [`DecodedInstr`], or `None` if the bytes do not name a mnemonic this
//! decoder's first milestone covers. Decode failures are deliberately not
//! surfaced as a typed error to callers: [`DecodeError`] is this module's
//! internal vocabulary, absorbed into `None` at the public boundary (see
//! `SPEC_FULL.md` §7 error-handling design).

pub mod instr;
pub mod modrm;
pub mod prefix;

use tracing::trace;

use crate::decode::instr::{
    AddressSize, DecodedInstr, EncodedPrefixes, MemoryOperand, Mnemonic, Operand, OperandSize,
    RegisterOperand,
};
use crate::decode::modrm::{decode_modrm, ModRm};
use crate::decode::prefix::{scan_prefixes, PrefixScan};
use crate::error::{DecodeError, OpcodeMap};
use crate::guest::{Amd64Schema, Condition};

/// Decode one instruction starting at `bytes[0]`, which represents guest
/// address `address`. Returns `None` on anything this decoder's first
/// milestone does not cover: an unknown opcode, an unsupported encoding, or
/// a truncated stream.
#[tracing::instrument(level = "trace", skip(bytes), fields(address = %format_args!("{address:#x}")))]
pub fn decode(bytes: &[u8], address: u64) -> Option<DecodedInstr> {
    match decode_inner(bytes, address) {
        Ok(instr) => {
            trace!(mnemonic = %instr.mnemonic, length = instr.length, "decoded instruction");
            Some(instr)
        }
        Err(err) => {
            trace!(%err, "decode failed");
            None
        }
    }
}

/// Selects which legacy SIMD prefix (if any) disambiguates a two-/three-byte
/// opcode cell: `66` selects packed-double / explicit-operand-size variants,
/// `F3` selects scalar-single, `F2` selects scalar-double, none selects
/// packed-single. Mirrors the VEX `pp` field so legacy-SSE and VEX opcode
/// tables can share one lookup shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegacyPp {
    None,
    Op66,
    RepF3,
    RepneF2,
}

fn legacy_pp(prefixes: EncodedPrefixes) -> LegacyPp {
    if prefixes.contains(EncodedPrefixes::REPNE) {
        LegacyPp::RepneF2
    } else if prefixes.contains(EncodedPrefixes::REP) {
        LegacyPp::RepF3
    } else if prefixes.contains(EncodedPrefixes::OPERAND_SIZE) {
        LegacyPp::Op66
    } else {
        LegacyPp::None
    }
}

struct Ctx<'a> {
    bytes: &'a [u8],
    scan: PrefixScan,
    operand_size: OperandSize,
    address_size: AddressSize,
}

fn decode_inner(bytes: &[u8], address: u64) -> Result<DecodedInstr, DecodeError> {
    let scan = scan_prefixes(bytes)?;
    let address_size = if scan.prefixes.contains(EncodedPrefixes::ADDRESS_SIZE) {
        AddressSize::Dword
    } else {
        AddressSize::Qword
    };
    // AMD64 default operand size is 32 bits; REX.W promotes to 64, 0x66
    // demotes to 16. REX.W wins when both are present.
    let operand_size = if scan.prefixes.contains(EncodedPrefixes::REX_W) {
        OperandSize::Qword
    } else if scan.prefixes.contains(EncodedPrefixes::OPERAND_SIZE) {
        OperandSize::Word
    } else {
        OperandSize::Dword
    };
    let mut ctx = Ctx {
        bytes,
        scan,
        operand_size,
        address_size,
    };

    let (mnemonic, operands, condition, is_arch_specific, uses_rip_relative, length) =
        if let Some(vex) = ctx.scan.vex {
            decode_vex(&mut ctx, vex)?
        } else {
            let opcode_pos = ctx.scan.consumed;
            let opcode = byte_at(bytes, opcode_pos)?;
            if opcode == 0x0F {
                decode_two_or_three_byte(&mut ctx, opcode_pos + 1)?
            } else {
                decode_one_byte(&mut ctx, opcode, opcode_pos + 1)?
            }
        };

    Ok(DecodedInstr {
        mnemonic,
        length: length as u8,
        address,
        operands,
        prefixes: ctx.scan.prefixes,
        operand_size: ctx.operand_size,
        address_size: ctx.address_size,
        condition,
        is_arch_specific,
        uses_rip_relative,
    })
}

fn byte_at(bytes: &[u8], pos: usize) -> Result<u8, DecodeError> {
    bytes.get(pos).copied().ok_or(DecodeError::Truncated { offset: pos })
}

type DecodeResult = Result<(Mnemonic, Vec<Operand>, Option<Condition>, bool, bool, usize), DecodeError>;

fn gpr_operand(schema_index: u8, width: OperandSize, rex_present: bool) -> RegisterOperand {
    let name = match width {
        OperandSize::Qword => Amd64Schema::gpr64_name(schema_index),
        OperandSize::Dword => Amd64Schema::gpr32_name(schema_index),
        OperandSize::Word => Amd64Schema::gpr16_name(schema_index),
        OperandSize::Byte => {
            if !rex_present && schema_index >= 4 && schema_index < 8 {
                Amd64Schema::gpr8_high_name(schema_index - 4)
            } else {
                Amd64Schema::gpr8_name(schema_index)
            }
        }
    };
    RegisterOperand { name, width }
}

fn rm_operand(
    modrm: &ModRm,
    width: OperandSize,
    rex_present: bool,
) -> (Operand, bool) {
    match modrm.memory {
        Some(mem) => {
            let mem = MemoryOperand { width, ..mem };
            (Operand::Memory(mem), mem.is_rip_relative)
        }
        None => (
            Operand::Register(gpr_operand(modrm.rm_reg, width, rex_present)),
            false,
        ),
    }
}

fn read_imm(bytes: &[u8], pos: usize, width: OperandSize) -> Result<(i64, usize), DecodeError> {
    match width {
        OperandSize::Byte => {
            let v = byte_at(bytes, pos)? as i8;
            Ok((v as i64, 1))
        }
        OperandSize::Word => {
            let b = bytes
                .get(pos..pos + 2)
                .ok_or(DecodeError::Truncated { offset: pos })?;
            Ok((i16::from_le_bytes([b[0], b[1]]) as i64, 2))
        }
        OperandSize::Dword | OperandSize::Qword => {
            let b = bytes
                .get(pos..pos + 4)
                .ok_or(DecodeError::Truncated { offset: pos })?;
            Ok((i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64, 4))
        }
    }
}

fn read_imm8(bytes: &[u8], pos: usize) -> Result<(i64, usize), DecodeError> {
    let v = byte_at(bytes, pos)? as i8;
    Ok((v as i64, 1))
}

fn read_rel32(bytes: &[u8], pos: usize) -> Result<(i64, usize), DecodeError> {
    let b = bytes
        .get(pos..pos + 4)
        .ok_or(DecodeError::Truncated { offset: pos })?;
    Ok((i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64, 4))
}

/// ALU opcode base for the 8 families laid out identically across
/// `0x00..=0x3D` (add/or/adc/sbb/and/sub/xor/cmp), each with the same 6
/// sub-encodings (`Eb,Gb` / `Ev,Gv` / `Gb,Eb` / `Gv,Ev` / `AL,Ib` / `eAX,Iz`).
fn alu_mnemonic(family: u8) -> Mnemonic {
    match family {
        0 => Mnemonic::Add,
        1 => Mnemonic::Or,
        2 => Mnemonic::Adc,
        3 => Mnemonic::Sbb,
        4 => Mnemonic::And,
        5 => Mnemonic::Sub,
        6 => Mnemonic::Xor,
        _ => Mnemonic::Cmp,
    }
}

fn decode_one_byte(ctx: &mut Ctx, opcode: u8, mut pos: usize) -> DecodeResult {
    let bytes = ctx.bytes;
    let rex = ctx.scan.has_rex();
    let (rex_r, rex_x, rex_b) = (ctx.scan.rex_r, ctx.scan.rex_x, ctx.scan.rex_b);

    // The 8 ALU families share one encoding layout across 0x00..=0x3D.
    if opcode < 0x40 {
        let family = opcode >> 3;
        let sub = opcode & 0b111;
        if family <= 7 && sub <= 5 {
            let mnemonic = alu_mnemonic(family);
            return match sub {
                0 | 1 => {
                    let width = if sub == 0 { OperandSize::Byte } else { ctx.operand_size };
                    let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
                    pos += modrm.consumed;
                    let (rm, rip) = rm_operand(&modrm, width, rex);
                    let reg = Operand::Register(gpr_operand(modrm.reg, width, rex));
                    Ok((mnemonic, vec![rm, reg], None, false, rip, total_len(ctx, pos)))
                }
                2 | 3 => {
                    let width = if sub == 2 { OperandSize::Byte } else { ctx.operand_size };
                    let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
                    pos += modrm.consumed;
                    let (rm, rip) = rm_operand(&modrm, width, rex);
                    let reg = Operand::Register(gpr_operand(modrm.reg, width, rex));
                    Ok((mnemonic, vec![reg, rm], None, false, rip, total_len(ctx, pos)))
                }
                4 => {
                    let (imm, n) = read_imm8(bytes, pos)?;
                    pos += n;
                    let al = Operand::Register(gpr_operand(0, OperandSize::Byte, rex));
                    Ok((
                        mnemonic,
                        vec![al, Operand::Immediate { value: imm, width: OperandSize::Byte }],
                        None,
                        false,
                        false,
                        total_len(ctx, pos),
                    ))
                }
                _ => {
                    let (imm, n) = read_imm(bytes, pos, ctx.operand_size)?;
                    pos += n;
                    let eax = Operand::Register(gpr_operand(0, ctx.operand_size, rex));
                    Ok((
                        mnemonic,
                        vec![eax, Operand::Immediate { value: imm, width: ctx.operand_size }],
                        None,
                        false,
                        false,
                        total_len(ctx, pos),
                    ))
                }
            };
        }
    }

    match opcode {
        0x50..=0x57 => {
            let idx = (opcode - 0x50) | if rex_b { 0b1000 } else { 0 };
            let reg = Operand::Register(gpr_operand(idx, OperandSize::Qword, rex));
            Ok((Mnemonic::Push, vec![reg], None, false, false, total_len(ctx, pos)))
        }
        0x58..=0x5F => {
            let idx = (opcode - 0x58) | if rex_b { 0b1000 } else { 0 };
            let reg = Operand::Register(gpr_operand(idx, OperandSize::Qword, rex));
            Ok((Mnemonic::Pop, vec![reg], None, false, false, total_len(ctx, pos)))
        }
        0x68 => {
            let (imm, n) = read_imm(bytes, pos, ctx.operand_size)?;
            pos += n;
            Ok((
                Mnemonic::Push,
                vec![Operand::Immediate { value: imm, width: ctx.operand_size }],
                None,
                false,
                false,
                total_len(ctx, pos),
            ))
        }
        0x6A => {
            let (imm, n) = read_imm8(bytes, pos)?;
            pos += n;
            Ok((
                Mnemonic::Push,
                vec![Operand::Immediate { value: imm, width: OperandSize::Byte }],
                None,
                false,
                false,
                total_len(ctx, pos),
            ))
        }
        0x69 | 0x6B => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, ctx.operand_size, rex);
            let reg = Operand::Register(gpr_operand(modrm.reg, ctx.operand_size, rex));
            let imm_width = if opcode == 0x6B { OperandSize::Byte } else { ctx.operand_size };
            let (imm, n) = if opcode == 0x6B {
                read_imm8(bytes, pos)?
            } else {
                read_imm(bytes, pos, imm_width)?
            };
            pos += n;
            Ok((
                Mnemonic::Imul,
                vec![reg, rm, Operand::Immediate { value: imm, width: imm_width }],
                None,
                false,
                rip,
                total_len(ctx, pos),
            ))
        }
        0x70..=0x7F => {
            let cond = Condition::from_nibble(opcode - 0x70);
            let (rel, n) = read_imm8(bytes, pos)?;
            pos += n;
            Ok((
                Mnemonic::JmpCc,
                vec![Operand::Relative { offset: rel }],
                Some(cond),
                false,
                false,
                total_len(ctx, pos),
            ))
        }
        0x80 | 0x81 | 0x83 => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let width = if opcode == 0x80 { OperandSize::Byte } else { ctx.operand_size };
            let (rm, rip) = rm_operand(&modrm, width, rex);
            let mnemonic = alu_mnemonic(modrm.reg & 0b111);
            let imm_width = if opcode == 0x81 { width } else { OperandSize::Byte };
            let (imm, n) = if opcode == 0x81 {
                read_imm(bytes, pos, imm_width)?
            } else {
                read_imm8(bytes, pos)?
            };
            pos += n;
            Ok((
                mnemonic,
                vec![rm, Operand::Immediate { value: imm, width: imm_width }],
                None,
                false,
                rip,
                total_len(ctx, pos),
            ))
        }
        0x84 | 0x85 => {
            let width = if opcode == 0x84 { OperandSize::Byte } else { ctx.operand_size };
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, width, rex);
            let reg = Operand::Register(gpr_operand(modrm.reg, width, rex));
            Ok((Mnemonic::Test, vec![rm, reg], None, false, rip, total_len(ctx, pos)))
        }
        0x86 | 0x87 => {
            let width = if opcode == 0x86 { OperandSize::Byte } else { ctx.operand_size };
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, width, rex);
            let reg = Operand::Register(gpr_operand(modrm.reg, width, rex));
            Ok((Mnemonic::Xchg, vec![rm, reg], None, false, rip, total_len(ctx, pos)))
        }
        0x88 | 0x89 | 0x8A | 0x8B => {
            let width = if opcode == 0x88 || opcode == 0x8A { OperandSize::Byte } else { ctx.operand_size };
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, width, rex);
            let reg = Operand::Register(gpr_operand(modrm.reg, width, rex));
            let operands = if opcode == 0x88 || opcode == 0x89 {
                vec![rm, reg]
            } else {
                vec![reg, rm]
            };
            Ok((Mnemonic::Mov, operands, None, false, rip, total_len(ctx, pos)))
        }
        0x8D => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let mem = modrm.memory.ok_or(DecodeError::InvalidModRm)?;
            let rip = mem.is_rip_relative;
            let reg = Operand::Register(gpr_operand(modrm.reg, ctx.operand_size, rex));
            Ok((Mnemonic::Lea, vec![reg, Operand::Memory(mem)], None, false, rip, total_len(ctx, pos)))
        }
        0x90 => Ok((Mnemonic::Nop, vec![], None, false, false, total_len(ctx, pos))),
        0x91..=0x97 => {
            let idx = (opcode - 0x90) | if rex_b { 0b1000 } else { 0 };
            let eax = Operand::Register(gpr_operand(0, ctx.operand_size, rex));
            let other = Operand::Register(gpr_operand(idx, ctx.operand_size, rex));
            Ok((Mnemonic::Xchg, vec![eax, other], None, false, false, total_len(ctx, pos)))
        }
        0xA8 => {
            let (imm, n) = read_imm8(bytes, pos)?;
            pos += n;
            let al = Operand::Register(gpr_operand(0, OperandSize::Byte, rex));
            Ok((
                Mnemonic::Test,
                vec![al, Operand::Immediate { value: imm, width: OperandSize::Byte }],
                None,
                false,
                false,
                total_len(ctx, pos),
            ))
        }
        0xA9 => {
            let (imm, n) = read_imm(bytes, pos, ctx.operand_size)?;
            pos += n;
            let eax = Operand::Register(gpr_operand(0, ctx.operand_size, rex));
            Ok((
                Mnemonic::Test,
                vec![eax, Operand::Immediate { value: imm, width: ctx.operand_size }],
                None,
                false,
                false,
                total_len(ctx, pos),
            ))
        }
        0xB0..=0xB7 => {
            let idx = (opcode - 0xB0) | if rex_b { 0b1000 } else { 0 };
            let (imm, n) = read_imm8(bytes, pos)?;
            pos += n;
            let reg = Operand::Register(gpr_operand(idx, OperandSize::Byte, rex));
            Ok((
                Mnemonic::Mov,
                vec![reg, Operand::Immediate { value: imm, width: OperandSize::Byte }],
                None,
                false,
                false,
                total_len(ctx, pos),
            ))
        }
        0xB8..=0xBF => {
            let idx = (opcode - 0xB8) | if rex_b { 0b1000 } else { 0 };
            // The one exception to "64-bit operand size reads a 32-bit
            // sign-extended immediate": MOV r64, imm64 takes a full 8-byte
            // immediate.
            let (imm, n) = if ctx.operand_size == OperandSize::Qword {
                let b = bytes
                    .get(pos..pos + 8)
                    .ok_or(DecodeError::Truncated { offset: pos })?;
                (
                    i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
                    8,
                )
            } else {
                read_imm(bytes, pos, ctx.operand_size)?
            };
            pos += n;
            let reg = Operand::Register(gpr_operand(idx, ctx.operand_size, rex));
            Ok((
                Mnemonic::Mov,
                vec![reg, Operand::Immediate { value: imm, width: ctx.operand_size }],
                None,
                false,
                false,
                total_len(ctx, pos),
            ))
        }
        0xC0 | 0xC1 | 0xD0..=0xD3 => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let width = if opcode == 0xC0 || opcode == 0xD0 || opcode == 0xD2 {
                OperandSize::Byte
            } else {
                ctx.operand_size
            };
            let (rm, rip) = rm_operand(&modrm, width, rex);
            let mnemonic = shift_group_mnemonic(modrm.reg & 0b111)?;
            let (count, n) = if opcode == 0xC0 || opcode == 0xC1 {
                let (v, n) = read_imm8(bytes, pos)?;
                (Operand::Immediate { value: v, width: OperandSize::Byte }, n)
            } else if opcode == 0xD0 || opcode == 0xD1 {
                (Operand::Immediate { value: 1, width: OperandSize::Byte }, 0)
            } else {
                let cl = gpr_operand(1, OperandSize::Byte, rex);
                (Operand::Register(cl), 0)
            };
            pos += n;
            Ok((mnemonic, vec![rm, count], None, false, rip, total_len(ctx, pos)))
        }
        0xC2 => {
            let (imm, n) = read_imm(bytes, pos, OperandSize::Word)?;
            pos += n;
            Ok((
                Mnemonic::Ret,
                vec![Operand::Immediate { value: imm, width: OperandSize::Word }],
                None,
                false,
                false,
                total_len(ctx, pos),
            ))
        }
        0xC3 => Ok((Mnemonic::Ret, vec![], None, false, false, total_len(ctx, pos))),
        0xC6 | 0xC7 => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let width = if opcode == 0xC6 { OperandSize::Byte } else { ctx.operand_size };
            let (rm, rip) = rm_operand(&modrm, width, rex);
            let (imm, n) = if opcode == 0xC6 {
                read_imm8(bytes, pos)?
            } else {
                read_imm(bytes, pos, width)?
            };
            pos += n;
            Ok((
                Mnemonic::Mov,
                vec![rm, Operand::Immediate { value: imm, width }],
                None,
                false,
                rip,
                total_len(ctx, pos),
            ))
        }
        0xC9 => Ok((Mnemonic::Leave, vec![], None, false, false, total_len(ctx, pos))),
        0xCC => Ok((Mnemonic::Int3, vec![], None, false, false, total_len(ctx, pos))),
        0xCD => {
            let (imm, n) = read_imm8(bytes, pos)?;
            pos += n;
            Ok((
                Mnemonic::Int,
                vec![Operand::Immediate { value: imm, width: OperandSize::Byte }],
                None,
                false,
                false,
                total_len(ctx, pos),
            ))
        }
        0xCE => Ok((Mnemonic::Into, vec![], None, false, false, total_len(ctx, pos))),
        0xE8 => {
            let (rel, n) = read_rel32(bytes, pos)?;
            pos += n;
            Ok((
                Mnemonic::Call,
                vec![Operand::Relative { offset: rel }],
                None,
                false,
                false,
                total_len(ctx, pos),
            ))
        }
        0xE9 => {
            let (rel, n) = read_rel32(bytes, pos)?;
            pos += n;
            Ok((
                Mnemonic::Jmp,
                vec![Operand::Relative { offset: rel }],
                None,
                false,
                false,
                total_len(ctx, pos),
            ))
        }
        0xEB => {
            let (rel, n) = read_imm8(bytes, pos)?;
            pos += n;
            Ok((
                Mnemonic::Jmp,
                vec![Operand::Relative { offset: rel }],
                None,
                false,
                false,
                total_len(ctx, pos),
            ))
        }
        0xF4 => Ok((Mnemonic::Hlt, vec![], None, false, false, total_len(ctx, pos))),
        0xF6 | 0xF7 => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let width = if opcode == 0xF6 { OperandSize::Byte } else { ctx.operand_size };
            let (rm, rip) = rm_operand(&modrm, width, rex);
            match modrm.reg & 0b111 {
                0 | 1 => {
                    let (imm, n) = if opcode == 0xF6 {
                        read_imm8(bytes, pos)?
                    } else {
                        read_imm(bytes, pos, width)?
                    };
                    pos += n;
                    Ok((
                        Mnemonic::Test,
                        vec![rm, Operand::Immediate { value: imm, width }],
                        None,
                        false,
                        rip,
                        total_len(ctx, pos),
                    ))
                }
                2 => Ok((Mnemonic::Not, vec![rm], None, false, rip, total_len(ctx, pos))),
                3 => Ok((Mnemonic::Neg, vec![rm], None, false, rip, total_len(ctx, pos))),
                4 => Ok((Mnemonic::Mul, vec![rm], None, false, rip, total_len(ctx, pos))),
                5 => Ok((Mnemonic::Imul, vec![rm], None, false, rip, total_len(ctx, pos))),
                6 => Ok((Mnemonic::Div, vec![rm], None, false, rip, total_len(ctx, pos))),
                _ => Ok((Mnemonic::Idiv, vec![rm], None, false, rip, total_len(ctx, pos))),
            }
        }
        0xF8 => Ok((Mnemonic::Clc, vec![], None, false, false, total_len(ctx, pos))),
        0xF9 => Ok((Mnemonic::Stc, vec![], None, false, false, total_len(ctx, pos))),
        0xFC => Ok((Mnemonic::Cld, vec![], None, false, false, total_len(ctx, pos))),
        0xFD => Ok((Mnemonic::Std, vec![], None, false, false, total_len(ctx, pos))),
        0xFE | 0xFF => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let width = if opcode == 0xFE { OperandSize::Byte } else { ctx.operand_size };
            let (rm, rip) = rm_operand(&modrm, width, rex);
            match modrm.reg & 0b111 {
                0 => Ok((Mnemonic::Inc, vec![rm], None, false, rip, total_len(ctx, pos))),
                1 => Ok((Mnemonic::Dec, vec![rm], None, false, rip, total_len(ctx, pos))),
                2 => Ok((Mnemonic::Call, vec![rm], None, false, rip, total_len(ctx, pos))),
                4 => Ok((Mnemonic::Jmp, vec![rm], None, false, rip, total_len(ctx, pos))),
                6 => Ok((Mnemonic::Push, vec![rm], None, false, rip, total_len(ctx, pos))),
                reg => Err(DecodeError::InvalidGroupEncoding { group: 5, reg_field: reg }),
            }
        }
        other => Err(DecodeError::UnknownOpcode { byte: other, map: OpcodeMap::OneByte }),
    }
}

fn shift_group_mnemonic(reg_field: u8) -> Result<Mnemonic, DecodeError> {
    match reg_field {
        0 => Ok(Mnemonic::Rol),
        1 => Ok(Mnemonic::Ror),
        4 => Ok(Mnemonic::Shl),
        5 => Ok(Mnemonic::Shr),
        7 => Ok(Mnemonic::Sar),
        reg => Err(DecodeError::InvalidGroupEncoding { group: 2, reg_field: reg }),
    }
}

fn decode_two_or_three_byte(ctx: &mut Ctx, pos: usize) -> DecodeResult {
    let bytes = ctx.bytes;
    let second = byte_at(bytes, pos)?;
    if second == 0x38 || second == 0x3A {
        let map_byte = second;
        let opcode = byte_at(bytes, pos + 1)?;
        return decode_three_byte(ctx, map_byte, opcode, pos + 2);
    }
    decode_two_byte(ctx, second, pos + 1)
}

fn decode_two_byte(ctx: &mut Ctx, opcode: u8, mut pos: usize) -> DecodeResult {
    let bytes = ctx.bytes;
    let rex = ctx.scan.has_rex();
    let (rex_r, rex_x, rex_b) = (ctx.scan.rex_r, ctx.scan.rex_x, ctx.scan.rex_b);
    let pp = legacy_pp(ctx.scan.prefixes);

    match opcode {
        0x05 => Ok((Mnemonic::Syscall, vec![], None, false, false, total_len(ctx, pos))),
        0x0B => Ok((Mnemonic::Ud2, vec![], None, false, false, total_len(ctx, pos))),
        0x01 => {
            // only SWAPGS (0F 01 F8) is covered in this milestone
            let modrm_byte = byte_at(bytes, pos)?;
            if modrm_byte == 0xF8 {
                pos += 1;
                Ok((Mnemonic::Swapgs, vec![], None, false, false, total_len(ctx, pos)))
            } else {
                Err(DecodeError::UnknownOpcode { byte: opcode, map: OpcodeMap::TwoByte })
            }
        }
        0x10 | 0x11 => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, OperandSize::Qword, rex);
            let xmm_reg = Operand::Register(xmm_operand(modrm.reg));
            let mnemonic = match pp {
                LegacyPp::RepF3 => Mnemonic::Movss,
                LegacyPp::RepneF2 => Mnemonic::Movsd,
                _ => Mnemonic::Movups,
            };
            let (rm, xmm_reg) = resolve_rm_xmm(&modrm, rm, xmm_reg);
            let operands = if opcode == 0x10 { vec![xmm_reg, rm] } else { vec![rm, xmm_reg] };
            Ok((mnemonic, operands, None, false, rip, total_len(ctx, pos)))
        }
        0x28 | 0x29 => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, OperandSize::Qword, rex);
            let xmm_reg = Operand::Register(xmm_operand(modrm.reg));
            let (rm, xmm_reg) = resolve_rm_xmm(&modrm, rm, xmm_reg);
            let operands = if opcode == 0x28 { vec![xmm_reg, rm] } else { vec![rm, xmm_reg] };
            Ok((Mnemonic::Movaps, operands, None, false, rip, total_len(ctx, pos)))
        }
        0x40..=0x4F => {
            let cond = Condition::from_nibble(opcode - 0x40);
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, ctx.operand_size, rex);
            let reg = Operand::Register(gpr_operand(modrm.reg, ctx.operand_size, rex));
            Ok((Mnemonic::Cmovcc, vec![reg, rm], Some(cond), false, rip, total_len(ctx, pos)))
        }
        0x58 | 0x59 | 0x5C | 0x5E => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, OperandSize::Qword, rex);
            let xmm_reg = Operand::Register(xmm_operand(modrm.reg));
            let (rm, xmm_reg) = resolve_rm_xmm(&modrm, rm, xmm_reg);
            let mnemonic = sse_arith_mnemonic(opcode, pp);
            Ok((mnemonic, vec![xmm_reg, rm], None, false, rip, total_len(ctx, pos)))
        }
        0x80..=0x8F => {
            let cond = Condition::from_nibble(opcode - 0x80);
            let (rel, n) = read_rel32(bytes, pos)?;
            pos += n;
            Ok((
                Mnemonic::JmpCc,
                vec![Operand::Relative { offset: rel }],
                Some(cond),
                false,
                false,
                total_len(ctx, pos),
            ))
        }
        0x90..=0x9F => {
            let cond = Condition::from_nibble(opcode - 0x90);
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, OperandSize::Byte, rex);
            Ok((Mnemonic::Setcc, vec![rm], Some(cond), false, rip, total_len(ctx, pos)))
        }
        0xAF => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, ctx.operand_size, rex);
            let reg = Operand::Register(gpr_operand(modrm.reg, ctx.operand_size, rex));
            Ok((Mnemonic::Imul, vec![reg, rm], None, false, rip, total_len(ctx, pos)))
        }
        0xB6 | 0xB7 | 0xBE | 0xBF => {
            let src_width = if opcode == 0xB6 || opcode == 0xBE { OperandSize::Byte } else { OperandSize::Word };
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, src_width, rex);
            let reg = Operand::Register(gpr_operand(modrm.reg, ctx.operand_size, rex));
            let mnemonic = if opcode == 0xB6 || opcode == 0xB7 { Mnemonic::MovZx } else { Mnemonic::MovSx };
            Ok((mnemonic, vec![reg, rm], None, false, rip, total_len(ctx, pos)))
        }
        0xD4 | 0xFC | 0xFD | 0xFE => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, OperandSize::Qword, rex);
            let xmm_reg = Operand::Register(xmm_operand(modrm.reg));
            let (rm, xmm_reg) = resolve_rm_xmm(&modrm, rm, xmm_reg);
            let mnemonic = match opcode {
                0xFC => Mnemonic::Paddb,
                0xFD => Mnemonic::Paddw,
                0xFE => Mnemonic::Paddd,
                _ => Mnemonic::Paddq,
            };
            Ok((mnemonic, vec![xmm_reg, rm], None, false, rip, total_len(ctx, pos)))
        }
        0xF8 | 0xF9 | 0xFA | 0xFB => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, OperandSize::Qword, rex);
            let xmm_reg = Operand::Register(xmm_operand(modrm.reg));
            let (rm, xmm_reg) = resolve_rm_xmm(&modrm, rm, xmm_reg);
            let mnemonic = match opcode {
                0xF8 => Mnemonic::Psubb,
                0xF9 => Mnemonic::Psubw,
                0xFA => Mnemonic::Psubd,
                _ => Mnemonic::Psubq,
            };
            Ok((mnemonic, vec![xmm_reg, rm], None, false, rip, total_len(ctx, pos)))
        }
        0xEF => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, OperandSize::Qword, rex);
            let xmm_reg = Operand::Register(xmm_operand(modrm.reg));
            let (rm, xmm_reg) = resolve_rm_xmm(&modrm, rm, xmm_reg);
            Ok((Mnemonic::Pxor, vec![xmm_reg, rm], None, false, rip, total_len(ctx, pos)))
        }
        other => Err(DecodeError::UnknownOpcode { byte: other, map: OpcodeMap::TwoByte }),
    }
}

fn decode_three_byte(ctx: &mut Ctx, map_byte: u8, opcode: u8, mut pos: usize) -> DecodeResult {
    let bytes = ctx.bytes;
    let rex = ctx.scan.has_rex();
    let (rex_r, rex_x, rex_b) = (ctx.scan.rex_r, ctx.scan.rex_x, ctx.scan.rex_b);
    let map = if map_byte == 0x38 { OpcodeMap::ThreeByte38 } else { OpcodeMap::ThreeByte3A };

    match (map_byte, opcode) {
        (0x38, 0x00) => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, OperandSize::Qword, rex);
            let xmm_reg = Operand::Register(xmm_operand(modrm.reg));
            let (rm, xmm_reg) = resolve_rm_xmm(&modrm, rm, xmm_reg);
            Ok((Mnemonic::Pshufb, vec![xmm_reg, rm], None, false, rip, total_len(ctx, pos)))
        }
        (0x3A, 0x0F) => {
            let modrm = decode_modrm(bytes, pos, rex_r, rex_x, rex_b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, OperandSize::Qword, rex);
            let xmm_reg = Operand::Register(xmm_operand(modrm.reg));
            let (rm, xmm_reg) = resolve_rm_xmm(&modrm, rm, xmm_reg);
            let (imm, n) = read_imm8(bytes, pos)?;
            pos += n;
            Ok((
                Mnemonic::Palignr,
                vec![xmm_reg, rm, Operand::Immediate { value: imm, width: OperandSize::Byte }],
                None,
                false,
                rip,
                total_len(ctx, pos),
            ))
        }
        (_, other) => Err(DecodeError::UnknownOpcode { byte: other, map }),
    }
}

/// VEX/EVEX-encoded instructions this milestone covers: a small slice of the
/// 0F-map packed/scalar arithmetic, selected by the `pp` field the same way
/// `legacy_pp` selects it for the non-VEX encodings.
fn decode_vex(ctx: &mut Ctx, vex: crate::decode::prefix::VexInfo) -> DecodeResult {
    let bytes = ctx.bytes;
    let mut pos = ctx.scan.consumed;
    let opcode = byte_at(bytes, pos)?;
    pos += 1;
    let pp = match vex.pp {
        1 => LegacyPp::Op66,
        2 => LegacyPp::RepF3,
        3 => LegacyPp::RepneF2,
        _ => LegacyPp::None,
    };
    if vex.map != 1 {
        return Err(DecodeError::UnknownOpcode { byte: opcode, map: OpcodeMap::TwoByte });
    }
    match opcode {
        0x58 | 0x59 | 0x5C | 0x5E => {
            let modrm = decode_modrm(bytes, pos, vex.r, vex.x, vex.b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, OperandSize::Qword, true);
            let xmm_reg = Operand::Register(xmm_operand(modrm.reg));
            let (rm, xmm_reg) = resolve_rm_xmm(&modrm, rm, xmm_reg);
            let mnemonic = sse_arith_mnemonic(opcode, pp);
            Ok((mnemonic, vec![xmm_reg, rm], None, false, rip, total_len(ctx, pos)))
        }
        0xEF => {
            let modrm = decode_modrm(bytes, pos, vex.r, vex.x, vex.b, ctx.address_size)?;
            pos += modrm.consumed;
            let (rm, rip) = rm_operand(&modrm, OperandSize::Qword, true);
            let xmm_reg = Operand::Register(xmm_operand(modrm.reg));
            let (rm, xmm_reg) = resolve_rm_xmm(&modrm, rm, xmm_reg);
            Ok((Mnemonic::Pxor, vec![xmm_reg, rm], None, false, rip, total_len(ctx, pos)))
        }
        other => Err(DecodeError::EmptyVexCell { pp: vex.pp, map: OpcodeMap::TwoByte, opcode: other }),
    }
}

fn sse_arith_mnemonic(opcode: u8, pp: LegacyPp) -> Mnemonic {
    match (opcode, pp) {
        (0x58, LegacyPp::RepF3) => Mnemonic::Addss,
        (0x58, LegacyPp::RepneF2) => Mnemonic::Addsd,
        (0x58, _) => Mnemonic::Addps,
        (0x59, LegacyPp::RepF3) => Mnemonic::Mulss,
        (0x59, LegacyPp::RepneF2) => Mnemonic::Mulsd,
        (0x59, _) => Mnemonic::Mulps,
        (0x5C, LegacyPp::RepF3) => Mnemonic::Subss,
        (0x5C, LegacyPp::RepneF2) => Mnemonic::Subsd,
        (0x5C, _) => Mnemonic::Subps,
        (0x5E, LegacyPp::RepF3) => Mnemonic::Divss,
        (0x5E, LegacyPp::RepneF2) => Mnemonic::Divsd,
        (_, _) => Mnemonic::Divps,
    }
}

fn xmm_operand(index: u8) -> RegisterOperand {
    // XMM names are synthesized, not table-driven (xmm0..xmm15), matching
    // the schema's `"xmm{n}"` lookup convention. `OperandSize` has no
    // vector-width variant, so `Qword` is a placeholder here; lifting code
    // never reads an XMM `RegisterOperand`'s `width`, only its `name`.
    const NAMES: [&str; 16] = [
        "xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7", "xmm8", "xmm9", "xmm10",
        "xmm11", "xmm12", "xmm13", "xmm14", "xmm15",
    ];
    RegisterOperand {
        name: NAMES[index as usize & 0xF],
        width: OperandSize::Qword,
    }
}

/// When `rm` names a register, it must also be read as an XMM operand
/// rather than a GPR — `rm_operand` always builds GPR names, so memory
/// operands pass through untouched and register-direct ones get relabeled.
fn resolve_rm_xmm(modrm: &ModRm, rm: Operand, xmm_reg: Operand) -> (Operand, Operand) {
    match modrm.memory {
        Some(_) => (rm, xmm_reg),
        None => (Operand::Register(xmm_operand(modrm.rm_reg)), xmm_reg),
    }
}

fn total_len(_ctx: &Ctx, end_pos: usize) -> usize {
    end_pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mov_reg_to_reg() {
        // mov eax, ebx -> 89 D8
        let instr = decode(&[0x89, 0xD8], 0x1000).unwrap();
        assert_eq!(instr.mnemonic, Mnemonic::Mov);
        assert_eq!(instr.length, 2);
        assert_eq!(instr.address, 0x1000);
    }

    #[test]
    fn decodes_rex_w_mov_reg_to_reg_as_64_bit() {
        // mov rax, rbx -> 48 89 D8
        let instr = decode(&[0x48, 0x89, 0xD8], 0x1000).unwrap();
        assert_eq!(instr.mnemonic, Mnemonic::Mov);
        assert_eq!(instr.operand_size, OperandSize::Qword);
        assert_eq!(instr.length, 3);
    }

    #[test]
    fn decodes_add_eax_imm32() {
        // add eax, 0x11223344 -> 05 44 33 22 11
        let instr = decode(&[0x05, 0x44, 0x33, 0x22, 0x11], 0).unwrap();
        assert_eq!(instr.mnemonic, Mnemonic::Add);
        assert_eq!(instr.length, 5);
    }

    #[test]
    fn decodes_ret() {
        let instr = decode(&[0xC3], 0).unwrap();
        assert_eq!(instr.mnemonic, Mnemonic::Ret);
        assert!(Mnemonic::Ret.is_block_terminator());
        assert_eq!(instr.length, 1);
    }

    #[test]
    fn decodes_conditional_jump_with_condition_code() {
        // je +8 -> 74 08
        let instr = decode(&[0x74, 0x08], 0).unwrap();
        assert_eq!(instr.mnemonic, Mnemonic::JmpCc);
        assert_eq!(instr.condition, Some(Condition::Equal));
        assert!(!Mnemonic::JmpCc.is_block_terminator());
    }

    #[test]
    fn decodes_rip_relative_lea() {
        // lea rax, [rip+0x10] -> 48 8D 05 10 00 00 00
        let instr = decode(&[0x48, 0x8D, 0x05, 0x10, 0x00, 0x00, 0x00], 0x2000).unwrap();
        assert_eq!(instr.mnemonic, Mnemonic::Lea);
        assert!(instr.uses_rip_relative);
        assert_eq!(instr.length, 7);
    }

    #[test]
    fn unknown_opcode_yields_none_not_a_panic() {
        assert!(decode(&[0x0F, 0xFF], 0).is_none());
    }

    #[test]
    fn truncated_stream_yields_none() {
        assert!(decode(&[0x48], 0).is_none());
    }

    #[test]
    fn decodes_push_reg_with_rex_b_extension() {
        // push r8 -> 41 50
        let instr = decode(&[0x41, 0x50], 0).unwrap();
        assert_eq!(instr.mnemonic, Mnemonic::Push);
        assert_eq!(instr.length, 2);
    }
}
