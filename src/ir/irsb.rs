//! The super-block (IRSB) container.

use std::collections::HashSet;

use crate::error::{InvariantViolation, LiftBug};
use crate::ir::expr::{Expr, TempId};
use crate::ir::stmt::{JumpKind, Stmt};
use crate::ir::temps::TempTable;
use crate::ir::ty::IrType;

/// A straight-line sequence of IR statements modeling one decoded basic
/// block, terminated by a typed exit.
///
/// Created empty when the block driver enters a new byte range, mutated
/// append-only by the lifter, then handed to downstream consumers as
/// immutable. Temps live for the block only; the statement sequence and
/// temp table are owned together and released together when the `IRSB` is
/// dropped.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Irsb {
    stmts: Vec<Stmt>,
    temps: TempTable,
    /// Fall-through / dynamic target of the block's terminating transfer.
    pub next: Expr,
    pub jump_kind: JumpKind,
    #[cfg_attr(feature = "serde", serde(skip))]
    defined: HashSet<TempId>,
    saw_first_imark: bool,
}

impl Irsb {
    /// An empty block, addressed at `base_addr`. `next`/`jump_kind` default
    /// to falling through to `base_addr` itself until the driver overwrites
    /// them; an empty block with no statements is a legitimate result (zero
    /// bytes decoded, or the first instruction failed to decode).
    pub fn new(base_addr: u64) -> Self {
        Irsb {
            stmts: Vec::new(),
            temps: TempTable::new(),
            next: Expr::konst(crate::ir::expr::ConstValue::I64(base_addr)),
            jump_kind: JumpKind::Boring,
            defined: HashSet::new(),
            saw_first_imark: false,
        }
    }

    /// Allocate a new temp of type `ty`.
    pub fn new_temp(&mut self, ty: IrType) -> TempId {
        self.temps.alloc(ty)
    }

    /// The temp-type table, exposed read-only for O(1) `type_of` queries.
    pub fn temps(&self) -> &TempTable {
        &self.temps
    }

    /// The statement stream accumulated so far, in order.
    pub fn stmts(&self) -> &[Stmt] {
        &self.stmts
    }

    /// Append a statement, enforcing invariants 2 (SSA-within-block), 3
    /// (IMark coverage), and the addressing-width rules for `Exit`/loads
    /// and stores embedded in the statement's expressions.
    pub fn add(&mut self, stmt: Stmt) -> Result<(), LiftBug> {
        match &stmt {
            Stmt::IMark { .. } => {
                self.saw_first_imark = true;
            }
            other => {
                if !self.saw_first_imark {
                    return Err(InvariantViolation::MissingImark.into());
                }
                self.check_rdtmps_defined(other)?;
            }
        }
        if let Stmt::WrTmp { tmp, expr } = &stmt {
            if !self.defined.insert(*tmp) {
                return Err(InvariantViolation::DoubleDefinition(tmp.0).into());
            }
            let declared = self.temps.type_of(*tmp);
            let found = expr.ty(&self.temps);
            if declared != found {
                return Err(LiftBug::IrTypeError {
                    expected: declared,
                    found,
                });
            }
        }
        if let Stmt::Exit { guard, target, .. } = &stmt {
            require(guard.ty(&self.temps), IrType::I1)?;
            require(target.ty(&self.temps), Stmt::ADDRESS_TYPE)?;
            if !matches!(target, Expr::Const(_)) {
                return Err(LiftBug::IrTypeError {
                    expected: Stmt::ADDRESS_TYPE,
                    found: target.ty(&self.temps),
                });
            }
        }
        if let Stmt::StoreLE { addr, .. } = &stmt {
            require(addr.ty(&self.temps), Stmt::ADDRESS_TYPE)?;
        }
        self.stmts.push(stmt);
        Ok(())
    }

    fn check_rdtmps_defined(&self, stmt: &Stmt) -> Result<(), LiftBug> {
        fn walk(e: &Expr, defined: &HashSet<TempId>) -> Result<(), LiftBug> {
            match e {
                Expr::RdTmp(t) => {
                    if !defined.contains(t) {
                        return Err(InvariantViolation::ReadBeforeDefinition(t.0).into());
                    }
                    Ok(())
                }
                Expr::Const(_) | Expr::Get { .. } => Ok(()),
                Expr::LoadLE { addr, .. } => walk(addr, defined),
                Expr::Unop(_, a) => walk(a, defined),
                Expr::Binop(_, a, b) => {
                    walk(a, defined)?;
                    walk(b, defined)
                }
                Expr::Triop(_, a, b, c) => {
                    walk(a, defined)?;
                    walk(b, defined)?;
                    walk(c, defined)
                }
                Expr::Qop(_, a, b, c, d) => {
                    walk(a, defined)?;
                    walk(b, defined)?;
                    walk(c, defined)?;
                    walk(d, defined)
                }
                Expr::ITE { cond, then, els } => {
                    walk(cond, defined)?;
                    walk(then, defined)?;
                    walk(els, defined)
                }
                Expr::CCall { args, .. } => {
                    for a in args {
                        walk(a, defined)?;
                    }
                    Ok(())
                }
            }
        }
        match stmt {
            Stmt::Put { value, .. } => walk(value, &self.defined),
            Stmt::WrTmp { expr, .. } => walk(expr, &self.defined),
            Stmt::StoreLE { addr, value } => {
                walk(addr, &self.defined)?;
                walk(value, &self.defined)
            }
            Stmt::Exit { guard, target, .. } => {
                walk(guard, &self.defined)?;
                walk(target, &self.defined)
            }
            Stmt::Dirty(d) => {
                walk(&d.guard, &self.defined)?;
                for a in &d.args {
                    walk(a, &self.defined)?;
                }
                Ok(())
            }
            Stmt::IMark { .. } => Ok(()),
        }
    }

    /// Count of `IMark` statements emitted so far — equal to the number of
    /// guest instructions lifted into this block.
    pub fn instruction_count(&self) -> usize {
        self.stmts
            .iter()
            .filter(|s| matches!(s, Stmt::IMark { .. }))
            .count()
    }
}

fn require(found: IrType, expected: IrType) -> Result<(), LiftBug> {
    if found == expected {
        Ok(())
    } else {
        Err(LiftBug::IrTypeError { expected, found })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::expr::ConstValue;
    use crate::ir::op::BinaryOp;

    #[test]
    fn rejects_statement_before_first_imark() {
        let mut irsb = Irsb::new(0x1000);
        let err = irsb
            .add(Stmt::Put {
                offset: 0,
                value: Expr::konst(ConstValue::I64(1)),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            LiftBug::InvariantViolation(InvariantViolation::MissingImark)
        ));
    }

    #[test]
    fn rejects_double_definition_of_a_temp() {
        let mut irsb = Irsb::new(0x1000);
        irsb.add(Stmt::IMark {
            addr: 0x1000,
            len: 3,
            delta: 0,
        })
        .unwrap();
        let t = irsb.new_temp(IrType::I64);
        irsb.add(Stmt::WrTmp {
            tmp: t,
            expr: Expr::konst(ConstValue::I64(1)),
        })
        .unwrap();
        let err = irsb
            .add(Stmt::WrTmp {
                tmp: t,
                expr: Expr::konst(ConstValue::I64(2)),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            LiftBug::InvariantViolation(InvariantViolation::DoubleDefinition(_))
        ));
    }

    #[test]
    fn rejects_read_of_undefined_temp() {
        let mut irsb = Irsb::new(0x1000);
        irsb.add(Stmt::IMark {
            addr: 0x1000,
            len: 3,
            delta: 0,
        })
        .unwrap();
        let bogus = TempId(7);
        let err = irsb
            .add(Stmt::Put {
                offset: 0,
                value: Expr::RdTmp(bogus),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            LiftBug::InvariantViolation(InvariantViolation::ReadBeforeDefinition(_))
        ));
    }

    #[test]
    fn accepts_well_formed_add_sequence() {
        let mut irsb = Irsb::new(0x1000);
        irsb.add(Stmt::IMark {
            addr: 0x1000,
            len: 3,
            delta: 0,
        })
        .unwrap();
        let t0 = irsb.new_temp(IrType::I64);
        let lhs = Expr::get(0, IrType::I64);
        let rhs = Expr::get(8, IrType::I64);
        let sum = Expr::binop(BinaryOp::Add64, lhs, rhs, irsb.temps()).unwrap();
        irsb.add(Stmt::WrTmp { tmp: t0, expr: sum }).unwrap();
        irsb.add(Stmt::Put {
            offset: 0,
            value: Expr::RdTmp(t0),
        })
        .unwrap();
        assert_eq!(irsb.instruction_count(), 1);
        assert_eq!(irsb.stmts().len(), 3);
    }

    #[test]
    fn exit_requires_i1_guard_and_const_target() {
        let mut irsb = Irsb::new(0x2000);
        irsb.add(Stmt::IMark {
            addr: 0x2000,
            len: 2,
            delta: 0,
        })
        .unwrap();
        let bad = irsb.add(Stmt::Exit {
            guard: Expr::konst(ConstValue::I64(1)),
            jump_kind: JumpKind::Boring,
            target: Expr::konst(ConstValue::I64(0x2007)),
        });
        assert!(bad.is_err());

        let ok = irsb.add(Stmt::Exit {
            guard: Expr::konst(ConstValue::I1(true)),
            jump_kind: JumpKind::Boring,
            target: Expr::konst(ConstValue::I64(0x2007)),
        });
        assert!(ok.is_ok());
    }
}
