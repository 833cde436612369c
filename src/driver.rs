//! Component E: the block driver — decodes and lifts consecutive
//! instructions into one [`Irsb`] until a terminator or a budget is hit.

use tracing::{debug, trace};

use crate::decode::decode;
use crate::decode::instr::DecodedInstr;
use crate::error::LiftBug;
use crate::guest::GuestSchema;
use crate::ir::expr::{ConstValue, Expr};
use crate::ir::irsb::Irsb;
use crate::ir::stmt::{JumpKind, Stmt};
use crate::lift::lift_instruction;

/// Resource limits on one `lift_block` call, mirroring the teacher's small
/// `Copy` configuration structs passed by value into an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budgets {
    pub max_instructions: usize,
    pub max_bytes: usize,
}

impl Default for Budgets {
    fn default() -> Self {
        Budgets {
            max_instructions: 50,
            max_bytes: 500,
        }
    }
}

/// Decode and lift consecutive instructions starting at `base_addr` into a
/// single [`Irsb`], stopping at the first block-terminating mnemonic
/// (`Mnemonic::is_block_terminator`), a failed decode, or an exhausted
/// budget. Returns the block and the number of bytes consumed from `bytes`.
///
/// A block that ends via budget exhaustion or a failed decode falls through
/// to the address immediately past the last successfully lifted
/// instruction — `lift_jmp`/`lift_call`/etc. only set `next`/`jump_kind` for
/// an actual terminator, so the driver owns this fall-through case.
#[tracing::instrument(level = "trace", skip(bytes, schema), fields(base_addr))]
pub fn lift_block(
    bytes: &[u8],
    base_addr: u64,
    schema: &dyn GuestSchema,
    budgets: Budgets,
) -> Result<(Irsb, usize), LiftBug> {
    let mut irsb = Irsb::new(base_addr);
    let mut consumed: usize = 0;
    let mut instructions: usize = 0;

    while instructions < budgets.max_instructions && consumed < budgets.max_bytes {
        let remaining = &bytes[consumed..];
        let addr = base_addr + consumed as u64;
        let instr = match decode(remaining, addr) {
            Some(instr) => instr,
            None => {
                debug!(address = addr, "decode failed, ending block at fall-through");
                break;
            }
        };
        if consumed + instr.length as usize > budgets.max_bytes {
            debug!(address = addr, "instruction would exceed byte budget, stopping short");
            break;
        }

        mark_and_lift(&mut irsb, schema, &instr)?;
        consumed += instr.length as usize;
        instructions += 1;

        if instr.mnemonic.is_block_terminator() {
            trace!(mnemonic = %instr.mnemonic, "block terminator, stopping");
            return Ok((irsb, consumed));
        }
    }

    set_fallthrough(&mut irsb, base_addr + consumed as u64);
    Ok((irsb, consumed))
}

fn mark_and_lift(irsb: &mut Irsb, schema: &dyn GuestSchema, instr: &DecodedInstr) -> Result<(), LiftBug> {
    irsb.add(Stmt::IMark {
        addr: instr.address,
        len: instr.length as u32,
        delta: 0,
    })?;
    lift_instruction(irsb, schema, instr)
}

fn set_fallthrough(irsb: &mut Irsb, addr: u64) {
    irsb.next = Expr::konst(ConstValue::I64(addr));
    irsb.jump_kind = JumpKind::Boring;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guest::Amd64Schema;

    #[test]
    fn stops_at_a_terminator_and_reports_call_jump_kind() {
        // mov eax, 1 ; call +0
        let bytes = [0xB8, 0x01, 0x00, 0x00, 0x00, 0xE8, 0x00, 0x00, 0x00, 0x00];
        let (irsb, consumed) = lift_block(&bytes, 0x1000, &Amd64Schema, Budgets::default()).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(irsb.jump_kind, JumpKind::Call);
        assert_eq!(irsb.instruction_count(), 2);
    }

    #[test]
    fn stops_at_instruction_budget_and_falls_through() {
        let bytes = [0x90u8; 10]; // nop * 10
        let budgets = Budgets { max_instructions: 3, max_bytes: 500 };
        let (irsb, consumed) = lift_block(&bytes, 0x2000, &Amd64Schema, budgets).unwrap();
        assert_eq!(consumed, 3);
        assert_eq!(irsb.instruction_count(), 3);
        assert_eq!(irsb.jump_kind, JumpKind::Boring);
        match irsb.next {
            Expr::Const(ConstValue::I64(addr)) => assert_eq!(addr, 0x2003),
            other => panic!("expected resolved fall-through, got {other:?}"),
        }
    }

    #[test]
    fn stops_cleanly_on_a_bad_opcode_byte() {
        let bytes = [0x90, 0x0F, 0xFF]; // nop, then an undefined two-byte opcode
        let (irsb, consumed) = lift_block(&bytes, 0x3000, &Amd64Schema, Budgets::default()).unwrap();
        assert_eq!(consumed, 1);
        assert_eq!(irsb.instruction_count(), 1);
    }
}
