//! Decoded-instruction data model (component C's output type).

use bitflags::bitflags;

bitflags! {
    /// Which legacy/REX/vector prefixes were present on the encoding,
    /// recorded for diagnostics and for lifter rules that key off a prefix
    /// (e.g. `REP`-prefixed string instructions).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EncodedPrefixes: u16 {
        const LOCK        = 1 << 0;
        const REP         = 1 << 1;
        const REPNE       = 1 << 2;
        const SEGMENT_CS  = 1 << 3;
        const SEGMENT_SS  = 1 << 4;
        const SEGMENT_DS  = 1 << 5;
        const SEGMENT_ES  = 1 << 6;
        const SEGMENT_FS  = 1 << 7;
        const SEGMENT_GS  = 1 << 8;
        const OPERAND_SIZE = 1 << 9;
        const ADDRESS_SIZE = 1 << 10;
        const REX          = 1 << 11;
        const REX_W        = 1 << 12;
        const VEX          = 1 << 13;
        const EVEX         = 1 << 14;
    }
}

/// Effective operand width selected by prefixes/REX/VEX.L, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSize {
    Byte = 1,
    Word = 2,
    Dword = 4,
    Qword = 8,
}

impl OperandSize {
    pub const fn bytes(self) -> u32 {
        self as u32
    }
}

/// Effective address-computation width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSize {
    Dword = 4,
    Qword = 8,
}

/// A register operand: name plus its bit width, matching the guest-state
/// schema's naming so the lifter can hand `name` straight to
/// [`crate::guest::GuestSchema::offset_of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterOperand {
    pub name: &'static str,
    pub width: OperandSize,
}

/// A memory operand's addressing components, pre-ModR/M-decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryOperand {
    pub base: Option<RegisterOperand>,
    pub index: Option<RegisterOperand>,
    pub scale: u8,
    pub displacement: i32,
    pub is_rip_relative: bool,
    /// The load/store width this reference is used at. `decode_modrm` has no
    /// opcode context to set this correctly; the opcode-level caller
    /// (`rm_operand`) stamps in the real value once it knows it.
    pub width: OperandSize,
}

/// One instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Register(RegisterOperand),
    Immediate { value: i64, width: OperandSize },
    Memory(MemoryOperand),
    /// A PC-relative branch target, already resolved to an absolute
    /// address using the instruction's own length (available once decode
    /// completes).
    Relative { offset: i64 },
}

/// Closed mnemonic enumeration for the decoder's first-milestone coverage
/// (see `SPEC_FULL.md` §4.3 ambient addition). Widening coverage only adds
/// variants here and a matching lowering in [`crate::lift`]; it never
/// changes an existing mnemonic's contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Mnemonic {
    Mov,
    MovZx,
    MovSx,
    Lea,
    Push,
    Pop,
    Xchg,
    Add,
    Adc,
    Sub,
    Sbb,
    And,
    Or,
    Xor,
    Cmp,
    Test,
    Inc,
    Dec,
    Neg,
    Not,
    Mul,
    Imul,
    Div,
    Idiv,
    Shl,
    Shr,
    Sar,
    Rol,
    Ror,
    Jmp,
    JmpCc,
    Call,
    Ret,
    Retf,
    Leave,
    Cmovcc,
    Setcc,
    Int3,
    Into,
    Int,
    Ud2,
    Syscall,
    Hlt,
    Swapgs,
    Nop,
    Cld,
    Std,
    Clc,
    Stc,
    Movaps,
    Movups,
    Movss,
    Movsd,
    Addps,
    Addsd,
    Addss,
    Subps,
    Subsd,
    Subss,
    Mulps,
    Mulsd,
    Mulss,
    Divps,
    Divsd,
    Divss,
    Pxor,
    Paddb,
    Paddw,
    Paddd,
    Paddq,
    Psubb,
    Psubw,
    Psubd,
    Psubq,
    Pshufb,
    Palignr,
}

impl Mnemonic {
    /// Whether this mnemonic's lift unconditionally transfers control and
    /// therefore terminates the current block (spec §4.4 termination set).
    /// `JmpCc`/`Cmovcc`/`Setcc` do not terminate: a conditional branch falls
    /// through to the next instruction in the not-taken case.
    pub const fn is_block_terminator(self) -> bool {
        matches!(
            self,
            Mnemonic::Jmp
                | Mnemonic::Call
                | Mnemonic::Ret
                | Mnemonic::Retf
                | Mnemonic::Int3
                | Mnemonic::Into
                | Mnemonic::Int
                | Mnemonic::Ud2
                | Mnemonic::Syscall
                | Mnemonic::Hlt
                | Mnemonic::Swapgs
        )
    }
}

/// The decoder's structured output: one fully parsed instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedInstr {
    pub mnemonic: Mnemonic,
    /// Total bytes consumed by this encoding, including all prefixes.
    pub length: u8,
    /// Absolute address of the first byte of this encoding.
    pub address: u64,
    pub operands: Vec<Operand>,
    pub prefixes: EncodedPrefixes,
    pub operand_size: OperandSize,
    pub address_size: AddressSize,
    /// Condition code for `Jcc`/`Setcc`/`Cmovcc`; `None` otherwise.
    pub condition: Option<crate::guest::ccop::Condition>,
    pub is_arch_specific: bool,
    pub uses_rip_relative: bool,
}
