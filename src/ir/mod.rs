//! Component A: the typed, side-effect-free IR model.
//!
//! A small expression language ([`expr`]) and imperative statement language
//! ([`stmt`]) over an explicit guest-state byte region and flat guest-memory
//! address space, collected per basic block into an [`irsb::Irsb`].

pub mod expr;
pub mod irsb;
pub mod op;
pub mod stmt;
pub mod temps;
pub mod ty;

pub use expr::{ConstValue, Expr, TempId};
pub use irsb::Irsb;
pub use op::{BinaryOp, Callee, QuaternaryOp, TernaryOp, UnaryOp};
pub use stmt::{DirtyCall, JumpKind, Stmt};
pub use temps::TempTable;
pub use ty::IrType;
