//! The AMD64 guest-state schema: register layout, aliasing, and the
//! lazy-flag / scalar-flag reserved offsets.

use crate::error::LiftBug;
use crate::guest::schema::{unknown_register, GuestSchema};
use crate::ir::ty::IrType;

const GPR_NAMES_64: [&str; 16] = [
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12",
    "r13", "r14", "r15",
];
const GPR_NAMES_32: [&str; 16] = [
    "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi", "r8d", "r9d", "r10d", "r11d", "r12d",
    "r13d", "r14d", "r15d",
];
const GPR_NAMES_16: [&str; 16] = [
    "ax", "cx", "dx", "bx", "sp", "bp", "si", "di", "r8w", "r9w", "r10w", "r11w", "r12w", "r13w",
    "r14w", "r15w",
];
const GPR_NAMES_8L: [&str; 16] = [
    "al", "cl", "dl", "bl", "spl", "bpl", "sil", "dil", "r8b", "r9b", "r10b", "r11b", "r12b",
    "r13b", "r14b", "r15b",
];
/// Legacy high-byte views, only defined for the first four GPRs, and only
/// reachable by instructions with no REX prefix.
const GPR_NAMES_8H: [&str; 4] = ["ah", "ch", "dh", "bh"];

/// Byte offset of GPR 0 (`rax`) within the state region.
pub const GPR_BASE: u32 = 0;
const GPR_STRIDE: u32 = 8;

/// Byte offset of `rip`.
pub const OFFSET_RIP: u32 = GPR_BASE + 16 * GPR_STRIDE;

/// Lazy-flag quadruple, in the normative order from spec §6.
pub const OFFSET_CC_OP: u32 = OFFSET_RIP + 8;
pub const OFFSET_CC_DEP1: u32 = OFFSET_CC_OP + 8;
pub const OFFSET_CC_DEP2: u32 = OFFSET_CC_DEP1 + 8;
pub const OFFSET_CC_NDEP: u32 = OFFSET_CC_DEP2 + 8;

/// Scalar sticky flags not expressible in the lazy-flag quadruple.
pub const OFFSET_DFLAG: u32 = OFFSET_CC_NDEP + 8;
pub const OFFSET_ACFLAG: u32 = OFFSET_DFLAG + 8;
pub const OFFSET_IDFLAG: u32 = OFFSET_ACFLAG + 8;

/// Faulting/syscall `rip` snapshot: `SYSCALL` records the pre-transfer
/// address here before handing control to the kernel entry point.
pub const OFFSET_IP_AT_SYSCALL: u32 = OFFSET_IDFLAG + 8;

const XMM_BASE: u32 = OFFSET_IP_AT_SYSCALL + 8;
const XMM_STRIDE: u32 = 16;
const XMM_COUNT: u32 = 16;

/// Total size of the AMD64 guest-state region, in bytes.
pub const STATE_SIZE: u32 = XMM_BASE + XMM_COUNT * XMM_STRIDE;

/// The AMD64 register→(offset, type) table, as a value object with no
/// mutable state — safe to share across threads, as required by §5.
#[derive(Debug, Clone, Copy, Default)]
pub struct Amd64Schema;

impl Amd64Schema {
    /// Offset of the 64-bit view of GPR `index` (0 = rax .. 15 = r15).
    pub const fn gpr64_offset(index: u8) -> u32 {
        GPR_BASE + index as u32 * GPR_STRIDE
    }

    /// Offset of the XMM register `index` (0..16).
    pub const fn xmm_offset(index: u8) -> u32 {
        XMM_BASE + index as u32 * XMM_STRIDE
    }

    fn lookup(name: &str) -> Option<(u32, IrType)> {
        if let Some(i) = GPR_NAMES_64.iter().position(|n| *n == name) {
            return Some((Self::gpr64_offset(i as u8), IrType::I64));
        }
        if let Some(i) = GPR_NAMES_32.iter().position(|n| *n == name) {
            return Some((Self::gpr64_offset(i as u8), IrType::I32));
        }
        if let Some(i) = GPR_NAMES_16.iter().position(|n| *n == name) {
            return Some((Self::gpr64_offset(i as u8), IrType::I16));
        }
        if let Some(i) = GPR_NAMES_8L.iter().position(|n| *n == name) {
            return Some((Self::gpr64_offset(i as u8), IrType::I8));
        }
        if let Some(i) = GPR_NAMES_8H.iter().position(|n| *n == name) {
            return Some((Self::gpr64_offset(i as u8) + 1, IrType::I8));
        }
        if name.starts_with("xmm") {
            if let Ok(i) = name[3..].parse::<u8>() {
                if i < XMM_COUNT as u8 {
                    return Some((Self::xmm_offset(i), IrType::V128));
                }
            }
        }
        match name {
            "rip" => Some((OFFSET_RIP, IrType::I64)),
            "cc_op" => Some((OFFSET_CC_OP, IrType::I64)),
            "cc_dep1" => Some((OFFSET_CC_DEP1, IrType::I64)),
            "cc_dep2" => Some((OFFSET_CC_DEP2, IrType::I64)),
            "cc_ndep" => Some((OFFSET_CC_NDEP, IrType::I64)),
            "dflag" => Some((OFFSET_DFLAG, IrType::I64)),
            "acflag" => Some((OFFSET_ACFLAG, IrType::I64)),
            "idflag" => Some((OFFSET_IDFLAG, IrType::I64)),
            "ip_at_syscall" => Some((OFFSET_IP_AT_SYSCALL, IrType::I64)),
            _ => None,
        }
    }

    /// Name of the 64-bit GPR at `index`, for diagnostics and disassembly.
    pub fn gpr64_name(index: u8) -> &'static str {
        GPR_NAMES_64[index as usize]
    }

    /// Name of the 32-bit view of GPR `index`.
    pub fn gpr32_name(index: u8) -> &'static str {
        GPR_NAMES_32[index as usize]
    }

    /// Name of the 16-bit view of GPR `index`.
    pub fn gpr16_name(index: u8) -> &'static str {
        GPR_NAMES_16[index as usize]
    }

    /// Name of the low-8-bit view of GPR `index`.
    pub fn gpr8_name(index: u8) -> &'static str {
        GPR_NAMES_8L[index as usize]
    }

    /// Name of the legacy high-byte view (`ah`/`ch`/`dh`/`bh`), valid only
    /// for `index < 4` and only reachable when no REX prefix is present.
    pub fn gpr8_high_name(index: u8) -> &'static str {
        GPR_NAMES_8H[index as usize]
    }
}

impl GuestSchema for Amd64Schema {
    fn offset_of(&self, name: &str) -> Result<u32, LiftBug> {
        Self::lookup(name)
            .map(|(off, _)| off)
            .ok_or_else(|| unknown_register(name))
    }

    fn type_of(&self, name: &str) -> Result<IrType, LiftBug> {
        Self::lookup(name)
            .map(|(_, ty)| ty)
            .ok_or_else(|| unknown_register(name))
    }

    fn requires_precise_exceptions(&self, lo: u32, hi: u32) -> bool {
        let overlaps = |a_lo: u32, a_hi: u32| lo < a_hi && a_lo < hi;
        overlaps(Self::gpr64_offset(4), Self::gpr64_offset(4) + 8) // rsp
            || overlaps(Self::gpr64_offset(5), Self::gpr64_offset(5) + 8) // rbp
            || overlaps(OFFSET_RIP, OFFSET_RIP + 8)
    }

    fn state_size(&self) -> u32 {
        STATE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliased_subregisters_share_the_base_offset() {
        let schema = Amd64Schema;
        assert_eq!(schema.offset_of("rax").unwrap(), schema.offset_of("eax").unwrap());
        assert_eq!(schema.offset_of("eax").unwrap(), schema.offset_of("ax").unwrap());
        assert_eq!(schema.offset_of("ax").unwrap(), schema.offset_of("al").unwrap());
        assert_eq!(schema.type_of("rax").unwrap(), IrType::I64);
        assert_eq!(schema.type_of("eax").unwrap(), IrType::I32);
        assert_eq!(schema.type_of("al").unwrap(), IrType::I8);
    }

    #[test]
    fn legacy_high_byte_is_offset_by_one() {
        let schema = Amd64Schema;
        let al = schema.offset_of("al").unwrap();
        let ah = schema.offset_of("ah").unwrap();
        assert_eq!(ah, al + 1);
    }

    #[test]
    fn unknown_register_is_an_error() {
        let schema = Amd64Schema;
        assert!(schema.offset_of("rzz").is_err());
        assert!(schema.offset_of("r16").is_err());
    }

    #[test]
    fn sp_bp_ip_require_precise_exceptions() {
        let schema = Amd64Schema;
        let rsp = schema.offset_of("rsp").unwrap();
        assert!(schema.requires_precise_exceptions(rsp, rsp + 8));
        let rip = schema.offset_of("rip").unwrap();
        assert!(schema.requires_precise_exceptions(rip, rip + 1));
        assert!(!schema.requires_precise_exceptions(
            schema.offset_of("rax").unwrap(),
            schema.offset_of("rax").unwrap() + 8
        ));
    }

    #[test]
    fn xmm_registers_are_v128() {
        let schema = Amd64Schema;
        assert_eq!(schema.type_of("xmm0").unwrap(), IrType::V128);
        assert_eq!(schema.type_of("xmm15").unwrap(), IrType::V128);
        assert!(schema.offset_of("xmm16").is_err());
    }
}
