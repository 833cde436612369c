//! ModR/M, SIB, and displacement decoding (spec §4.3 step 5), including the
//! `mod=00,rm=101` RIP-relative special case and the `rm=100` SIB-required
//! case.

use crate::decode::instr::{AddressSize, MemoryOperand, OperandSize, RegisterOperand};
use crate::error::DecodeError;
use crate::guest::Amd64Schema;

/// A decoded ModR/M (plus any SIB and displacement bytes it pulled in).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRm {
    /// Full 4-bit register index for the `reg` field (REX.R/VEX.R already folded in).
    pub reg: u8,
    /// Full 4-bit register index for `rm` when `mod == 3` (register-direct).
    pub rm_reg: u8,
    /// Present when `mod != 3`: the memory operand the `rm` field names.
    pub memory: Option<MemoryOperand>,
    /// Bytes consumed by ModR/M + SIB + displacement.
    pub consumed: usize,
}

pub fn decode_modrm(
    bytes: &[u8],
    pos: usize,
    rex_r: bool,
    rex_x: bool,
    rex_b: bool,
    address_size: AddressSize,
) -> Result<ModRm, DecodeError> {
    let modrm = *bytes.get(pos).ok_or(DecodeError::Truncated { offset: pos })?;
    let mode = modrm >> 6;
    let reg_field = (modrm >> 3) & 0b111;
    let rm_field = modrm & 0b111;
    let reg = reg_field | if rex_r { 0b1000 } else { 0 };

    if mode == 0b11 {
        let rm_reg = rm_field | if rex_b { 0b1000 } else { 0 };
        return Ok(ModRm {
            reg,
            rm_reg,
            memory: None,
            consumed: 1,
        });
    }

    let mut offset = pos + 1;
    let mut base_index: Option<u8> = Some(rm_field | if rex_b { 0b1000 } else { 0 });
    let mut index_index: Option<u8> = None;
    let mut scale: u8 = 1;
    let mut is_rip_relative = false;

    if rm_field == 0b100 {
        // SIB byte required regardless of `mod`.
        let sib = *bytes
            .get(offset)
            .ok_or(DecodeError::Truncated { offset })?;
        offset += 1;
        let sib_scale = sib >> 6;
        let sib_index = (sib >> 3) & 0b111;
        let sib_base = sib & 0b111;
        scale = 1u8 << sib_scale;
        if sib_index == 0b100 && !rex_x {
            index_index = None;
        } else {
            index_index = Some(sib_index | if rex_x { 0b1000 } else { 0 });
        }
        if sib_base == 0b101 && mode == 0b00 {
            base_index = None; // disp32, no base
        } else {
            base_index = Some(sib_base | if rex_b { 0b1000 } else { 0 });
        }
    } else if rm_field == 0b101 && mode == 0b00 {
        base_index = None;
        is_rip_relative = true;
    }

    let displacement = if is_rip_relative || (base_index.is_none() && rm_field == 0b101 && mode == 0b00) {
        let d = read_i32(bytes, offset)?;
        offset += 4;
        d
    } else {
        match mode {
            0b00 => {
                if base_index.is_none() {
                    let d = read_i32(bytes, offset)?;
                    offset += 4;
                    d
                } else {
                    0
                }
            }
            0b01 => {
                let d = *bytes.get(offset).ok_or(DecodeError::Truncated { offset })? as i8;
                offset += 1;
                d as i32
            }
            0b10 => {
                let d = read_i32(bytes, offset)?;
                offset += 4;
                d
            }
            _ => unreachable!("mod == 3 handled above"),
        }
    };

    let reg_name_for = |index: u8| -> RegisterOperand {
        match address_size {
            AddressSize::Qword => RegisterOperand {
                name: Amd64Schema::gpr64_name(index),
                width: OperandSize::Qword,
            },
            AddressSize::Dword => RegisterOperand {
                name: Amd64Schema::gpr32_name(index),
                width: OperandSize::Dword,
            },
        }
    };

    let memory = MemoryOperand {
        base: base_index.map(reg_name_for),
        index: index_index.map(reg_name_for),
        scale,
        displacement,
        is_rip_relative,
        // Placeholder; `rm_operand` overwrites this with the opcode's actual
        // operand width once `decode_modrm` returns.
        width: OperandSize::Qword,
    };

    Ok(ModRm {
        reg,
        rm_reg: 0,
        memory: Some(memory),
        consumed: offset - pos,
    })
}

fn read_i32(bytes: &[u8], offset: usize) -> Result<i32, DecodeError> {
    let b = bytes
        .get(offset..offset + 4)
        .ok_or(DecodeError::Truncated { offset })?;
    Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_direct_mode_consumes_one_byte() {
        // mod=11, reg=000, rm=011 -> eax/ebx direct
        let m = decode_modrm(&[0b11_000_011], 0, false, false, false, AddressSize::Qword).unwrap();
        assert_eq!(m.consumed, 1);
        assert!(m.memory.is_none());
        assert_eq!(m.rm_reg, 0b011);
    }

    #[test]
    fn rip_relative_reads_disp32_with_no_base() {
        // mod=00, reg=000, rm=101 -> RIP-relative, disp32 = 0x10
        let bytes = [0b00_000_101, 0x10, 0x00, 0x00, 0x00];
        let m = decode_modrm(&bytes, 0, false, false, false, AddressSize::Qword).unwrap();
        let mem = m.memory.unwrap();
        assert!(mem.is_rip_relative);
        assert!(mem.base.is_none());
        assert_eq!(mem.displacement, 0x10);
        assert_eq!(m.consumed, 5);
    }

    #[test]
    fn sib_byte_is_consumed_when_rm_is_100() {
        // mod=01, reg=000, rm=100 (SIB follows), SIB: scale=00,index=001,base=011, disp8=0x7f
        let bytes = [0b01_000_100, 0b00_001_011, 0x7f];
        let m = decode_modrm(&bytes, 0, false, false, false, AddressSize::Qword).unwrap();
        let mem = m.memory.unwrap();
        assert_eq!(mem.scale, 1);
        assert!(mem.index.is_some());
        assert!(mem.base.is_some());
        assert_eq!(mem.displacement, 0x7f);
        assert_eq!(m.consumed, 3);
    }

    #[test]
    fn rex_r_extends_reg_field_into_high_half() {
        let m = decode_modrm(&[0b11_111_000], 0, true, false, false, AddressSize::Qword).unwrap();
        assert_eq!(m.reg, 0b1111);
    }

    #[test]
    fn truncated_displacement_is_an_error() {
        let bytes = [0b00_000_101, 0x10];
        assert!(decode_modrm(&bytes, 0, false, false, false, AddressSize::Qword).is_err());
    }
}
