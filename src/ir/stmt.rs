//! IR statement algebra.

use crate::ir::expr::{Expr, TempId};
use crate::ir::ty::IrType;

/// Classifies the control transfer a block terminates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JumpKind {
    /// Ordinary fall-through or unconditional/conditional jump.
    Boring,
    /// `call`.
    Call,
    /// `ret`/`retf`.
    Ret,
    /// `syscall`/`sysenter`.
    Syscall,
    /// `ud2` or another illegal-instruction trap.
    SigIll,
    /// `int3`/`into`, a debug/overflow trap.
    SigTrap,
    /// `syscall` return path, `sysret`/`sysexit`, or `swapgs`: a privileged
    /// transition the downstream consumer must not execute natively.
    Privileged,
    /// `hlt`.
    NoDecode,
}

/// Guarded side effect that a pure expression cannot represent (e.g. a
/// helper call with memory effects). No `Dirty` helper is invoked for any
/// mnemonic currently lowered by [`crate::lift`]; the variant exists so the
/// IR model matches the reference and downstream consumers that share it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DirtyCall {
    pub callee: &'static str,
    pub guard: Expr,
    pub args: Vec<Expr>,
    /// Guest-state byte range the helper may write, if any.
    pub writes_state: Option<(u32, u32)>,
}

/// A single IR statement.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stmt {
    /// Marks the start of a guest instruction. Exactly one per lifted instruction.
    IMark { addr: u64, len: u32, delta: i32 },
    /// Write to guest state.
    Put { offset: u32, value: Expr },
    /// Define temp `t` with `expr`. Each temp is defined exactly once.
    WrTmp { tmp: TempId, expr: Expr },
    /// Little-endian store to guest memory.
    StoreLE { addr: Expr, value: Expr },
    /// Impure, optionally guarded side effect.
    Dirty(DirtyCall),
    /// Conditional block exit. `guard` must be `I1`; `target` a `Const`.
    Exit {
        guard: Expr,
        jump_kind: JumpKind,
        target: Expr,
    },
}

impl Stmt {
    /// The [`IrType`] `StoreLE`/`LoadLE` addresses must have: the guest word size.
    pub const ADDRESS_TYPE: IrType = IrType::I64;
}
