//! Prefix group parsing, REX, and VEX/EVEX detection (spec §4.3 step 1).

use crate::decode::instr::EncodedPrefixes;
use crate::error::DecodeError;

/// VEX/EVEX payload, normalized to the fields the rest of the decoder
/// needs regardless of which of the three wire encodings produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VexInfo {
    /// Which opcode map the trailing opcode byte is read from: 1 = 0F, 2 = 0F38, 3 = 0F3A.
    pub map: u8,
    /// `pp` field: 0 = none, 1 = 66, 2 = F3, 3 = F2.
    pub pp: u8,
    /// Vector-length bit(s): false = 128-bit, true = 256-bit (512-bit for EVEX handled by `width512`).
    pub l: bool,
    pub width512: bool,
    pub r: bool,
    pub x: bool,
    pub b: bool,
    pub w: bool,
    pub vvvv: u8,
    pub is_evex: bool,
    /// Bytes consumed by the VEX/EVEX prefix itself (2, 3, or 4).
    pub consumed: usize,
}

/// Result of scanning everything before the opcode byte(s): legacy prefix
/// groups, then either a REX prefix or a VEX/EVEX prefix (mutually
/// exclusive — VEX/EVEX replace the legacy prefix slots per spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixScan {
    pub prefixes: EncodedPrefixes,
    pub rex_r: bool,
    pub rex_x: bool,
    pub rex_b: bool,
    pub rex_w: bool,
    pub vex: Option<VexInfo>,
    /// Total bytes consumed by this scan, i.e. the offset of the opcode byte.
    pub consumed: usize,
}

impl PrefixScan {
    pub fn has_rex(&self) -> bool {
        self.prefixes.contains(EncodedPrefixes::REX)
    }
}

pub fn scan_prefixes(bytes: &[u8]) -> Result<PrefixScan, DecodeError> {
    let mut prefixes = EncodedPrefixes::empty();
    let mut pos = 0usize;
    let mut seen_rep_group = false;
    let mut seen_seg_group = false;
    let mut seen_opsize = false;
    let mut seen_addrsize = false;

    loop {
        let byte = *bytes
            .get(pos)
            .ok_or(DecodeError::Truncated { offset: pos })?;
        match byte {
            0xF0 => {
                prefixes |= EncodedPrefixes::LOCK;
                pos += 1;
            }
            0xF2 if !seen_rep_group => {
                prefixes |= EncodedPrefixes::REPNE;
                seen_rep_group = true;
                pos += 1;
            }
            0xF3 if !seen_rep_group => {
                prefixes |= EncodedPrefixes::REP;
                seen_rep_group = true;
                pos += 1;
            }
            0x2E if !seen_seg_group => {
                prefixes |= EncodedPrefixes::SEGMENT_CS;
                seen_seg_group = true;
                pos += 1;
            }
            0x36 if !seen_seg_group => {
                prefixes |= EncodedPrefixes::SEGMENT_SS;
                seen_seg_group = true;
                pos += 1;
            }
            0x3E if !seen_seg_group => {
                prefixes |= EncodedPrefixes::SEGMENT_DS;
                seen_seg_group = true;
                pos += 1;
            }
            0x26 if !seen_seg_group => {
                prefixes |= EncodedPrefixes::SEGMENT_ES;
                seen_seg_group = true;
                pos += 1;
            }
            0x64 if !seen_seg_group => {
                prefixes |= EncodedPrefixes::SEGMENT_FS;
                seen_seg_group = true;
                pos += 1;
            }
            0x65 if !seen_seg_group => {
                prefixes |= EncodedPrefixes::SEGMENT_GS;
                seen_seg_group = true;
                pos += 1;
            }
            0x66 if !seen_opsize => {
                prefixes |= EncodedPrefixes::OPERAND_SIZE;
                seen_opsize = true;
                pos += 1;
            }
            0x67 if !seen_addrsize => {
                prefixes |= EncodedPrefixes::ADDRESS_SIZE;
                seen_addrsize = true;
                pos += 1;
            }
            _ => break,
        }
    }

    let opcode_byte = *bytes
        .get(pos)
        .ok_or(DecodeError::Truncated { offset: pos })?;

    // VEX/EVEX replace the legacy prefix slots entirely; they cannot be
    // combined with a REX byte (REX is expressed through VEX's own R/X/B/W
    // bit fields instead).
    if opcode_byte == 0xC4 || opcode_byte == 0xC5 {
        let vex = parse_vex(bytes, pos)?;
        prefixes |= EncodedPrefixes::VEX;
        if vex.w {
            prefixes |= EncodedPrefixes::REX_W;
        }
        let consumed = pos + vex.consumed;
        return Ok(PrefixScan {
            prefixes,
            rex_r: vex.r,
            rex_x: vex.x,
            rex_b: vex.b,
            rex_w: vex.w,
            vex: Some(vex),
            consumed,
        });
    }
    if opcode_byte == 0x62 {
        // EVEX's P0 byte reserved bits [1:0] must read 0 to disambiguate
        // from the legacy BOUND instruction, which also starts with 0x62
        // in 32-bit mode (not reachable here since BOUND is invalid in
        // 64-bit mode; AMD64-only decoder treats 0x62 as EVEX unconditionally).
        let evex = parse_evex(bytes, pos)?;
        prefixes |= EncodedPrefixes::EVEX;
        if evex.w {
            prefixes |= EncodedPrefixes::REX_W;
        }
        let consumed = pos + evex.consumed;
        return Ok(PrefixScan {
            prefixes,
            rex_r: evex.r,
            rex_x: evex.x,
            rex_b: evex.b,
            rex_w: evex.w,
            vex: Some(evex),
            consumed,
        });
    }
    if (0x40..=0x4F).contains(&opcode_byte) {
        prefixes |= EncodedPrefixes::REX;
        let rex_w = opcode_byte & 0b1000 != 0;
        let rex_r = opcode_byte & 0b0100 != 0;
        let rex_x = opcode_byte & 0b0010 != 0;
        let rex_b = opcode_byte & 0b0001 != 0;
        if rex_w {
            prefixes |= EncodedPrefixes::REX_W;
        }
        return Ok(PrefixScan {
            prefixes,
            rex_r,
            rex_x,
            rex_b,
            rex_w,
            vex: None,
            consumed: pos + 1,
        });
    }

    Ok(PrefixScan {
        prefixes,
        rex_r: false,
        rex_x: false,
        rex_b: false,
        rex_w: false,
        vex: None,
        consumed: pos,
    })
}

fn parse_vex(bytes: &[u8], pos: usize) -> Result<VexInfo, DecodeError> {
    let lead = bytes[pos];
    if lead == 0xC5 {
        // 2-byte VEX: C5 [R vvvv L pp]
        let b1 = *bytes
            .get(pos + 1)
            .ok_or(DecodeError::Truncated { offset: pos + 1 })?;
        let r = (b1 >> 7) & 1 == 0; // stored inverted
        let vvvv = (!(b1 >> 3) & 0b1111) as u8;
        let l = (b1 >> 2) & 1 != 0;
        let pp = b1 & 0b11;
        Ok(VexInfo {
            map: 1,
            pp,
            l,
            width512: false,
            r,
            x: true,
            b: true,
            w: false,
            vvvv,
            is_evex: false,
            consumed: 2,
        })
    } else {
        // 3-byte VEX: C4 [R X B mmmmm] [W vvvv L pp]
        let b1 = *bytes
            .get(pos + 1)
            .ok_or(DecodeError::Truncated { offset: pos + 1 })?;
        let b2 = *bytes
            .get(pos + 2)
            .ok_or(DecodeError::Truncated { offset: pos + 2 })?;
        let r = (b1 >> 7) & 1 == 0;
        let x = (b1 >> 6) & 1 == 0;
        let b = (b1 >> 5) & 1 == 0;
        let map = b1 & 0b1_1111;
        let w = (b2 >> 7) & 1 != 0;
        let vvvv = (!(b2 >> 3) & 0b1111) as u8;
        let l = (b2 >> 2) & 1 != 0;
        let pp = b2 & 0b11;
        if !(1..=3).contains(&map) {
            return Err(DecodeError::InvalidModRm);
        }
        Ok(VexInfo {
            map,
            pp,
            l,
            width512: false,
            r,
            x,
            b,
            w,
            vvvv,
            is_evex: false,
            consumed: 3,
        })
    }
}

fn parse_evex(bytes: &[u8], pos: usize) -> Result<VexInfo, DecodeError> {
    // 4-byte EVEX: 62 [R X B R' mm] [W vvvv 1 pp] [z L'L b V' aaa]
    let b1 = *bytes
        .get(pos + 1)
        .ok_or(DecodeError::Truncated { offset: pos + 1 })?;
    let b2 = *bytes
        .get(pos + 2)
        .ok_or(DecodeError::Truncated { offset: pos + 2 })?;
    let b3 = *bytes
        .get(pos + 3)
        .ok_or(DecodeError::Truncated { offset: pos + 3 })?;
    if b1 & 0b0000_1100 != 0 {
        // P0[3:2] must be 0 in the reference encoding used here.
        return Err(DecodeError::InvalidModRm);
    }
    let r = (b1 >> 7) & 1 == 0;
    let x = (b1 >> 6) & 1 == 0;
    let b = (b1 >> 5) & 1 == 0;
    let map = b1 & 0b11;
    let w = (b2 >> 7) & 1 != 0;
    let vvvv = (!(b2 >> 3) & 0b1111) as u8;
    let pp = b2 & 0b11;
    let l = (b3 >> 5) & 1 != 0;
    let width512 = (b3 >> 6) & 1 != 0;
    if !(1..=3).contains(&map) {
        return Err(DecodeError::InvalidModRm);
    }
    Ok(VexInfo {
        map,
        pp,
        l,
        width512,
        r,
        x,
        b,
        w,
        vvvv,
        is_evex: true,
        consumed: 4,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_opcode_has_no_prefixes() {
        let scan = scan_prefixes(&[0x89, 0xD8]).unwrap();
        assert!(scan.prefixes.is_empty());
        assert_eq!(scan.consumed, 0);
    }

    #[test]
    fn rex_w_sets_both_flags() {
        let scan = scan_prefixes(&[0x48, 0x89, 0xC3]).unwrap();
        assert!(scan.prefixes.contains(EncodedPrefixes::REX));
        assert!(scan.prefixes.contains(EncodedPrefixes::REX_W));
        assert_eq!(scan.consumed, 1);
    }

    #[test]
    fn operand_size_override_is_recognized() {
        let scan = scan_prefixes(&[0x66, 0x89, 0xD8]).unwrap();
        assert!(scan.prefixes.contains(EncodedPrefixes::OPERAND_SIZE));
        assert_eq!(scan.consumed, 1);
    }

    #[test]
    fn two_byte_vex_decodes_pp_and_inverted_register_bit() {
        // VEX.128.66.0F - C5 F9 (R=1 inverted -> 0, vvvv=1111 -> 0, L=0, pp=01)
        let scan = scan_prefixes(&[0xC5, 0xF9, 0x58]).unwrap();
        assert!(scan.prefixes.contains(EncodedPrefixes::VEX));
        let vex = scan.vex.unwrap();
        assert_eq!(vex.pp, 1);
        assert_eq!(vex.map, 1);
    }

    #[test]
    fn truncated_rex_with_no_opcode_byte_is_an_error() {
        assert!(scan_prefixes(&[0x48]).is_err());
    }
}
