//! `vex-lift`: an x86/AMD64 decoder and VEX-style IR lifter front-end.
//!
//! Three subsystems, as components A-E:
//!
//! - [`ir`] — the typed IR model: expressions, statements, super-blocks.
//! - [`guest`] — the AMD64 guest-state schema and lazy condition-code model.
//! - [`decode`] — the instruction decoder.
//! - [`lift`] — per-mnemonic lowering from a decoded instruction into IR.
//! - [`driver`] — the block driver tying decode and lift together.
//!
//! Out of scope (spec Non-goals): a public embedding API beyond this
//! surface, optimizer passes over the produced IR, native code generation,
//! whole-program CPU emulation, and self-modifying code support.

pub mod decode;
pub mod driver;
pub mod error;
pub mod guest;
pub mod ir;
pub mod lift;

/// Re-exports for the types external collaborators most often need,
/// following the teacher's own `pub mod prelude` convention.
pub mod prelude {
    pub use crate::decode::decode;
    pub use crate::decode::instr::{DecodedInstr, Mnemonic};
    pub use crate::driver::{lift_block, Budgets};
    pub use crate::error::{DecodeError, LiftBug};
    pub use crate::guest::{Amd64Schema, CcOp, Condition, GuestSchema};
    pub use crate::ir::expr::Expr;
    pub use crate::ir::irsb::Irsb;
    pub use crate::ir::op::{BinaryOp, Callee, QuaternaryOp, TernaryOp, UnaryOp};
    pub use crate::ir::stmt::{JumpKind, Stmt};
    pub use crate::ir::ty::IrType;
}
